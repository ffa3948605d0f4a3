use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use webmon_core::traits::WatchStore;
use webmon_core::watch::{NewValue, NewWatch};
use webmon_db::WatchRepository;

use crate::integration::common::{seed_user, setup_test_db};

async fn seed_watch(repo: &WatchRepository, owner: Uuid) -> Uuid {
    let new = NewWatch::new(
        "releases",
        "https://example.com/releases",
        "//*[@class='version']/text()",
        TimeDelta::minutes(30),
        false,
        owner,
        Utc::now(),
    )
    .unwrap();
    repo.create_watch(new).await.unwrap().id
}

#[tokio::test]
async fn save_and_retrieve_latest_value() {
    let (pool, _container) = setup_test_db().await;
    let owner = seed_user(&pool, "alice").await;
    let repo = WatchRepository::new(pool);
    let watch_id = seed_watch(&repo, owner).await;

    let created = Utc::now();
    let value = repo
        .save_value(NewValue {
            watch_id,
            created,
            content: "2.3.7".into(),
        })
        .await
        .unwrap();

    assert_eq!(value.watch_id, watch_id);
    assert_eq!(value.content, "2.3.7");

    let latest = repo
        .get_latest_value(watch_id)
        .await
        .unwrap()
        .expect("should find the value");
    assert_eq!(latest.id, value.id);
    assert_eq!(latest.content, "2.3.7");
}

#[tokio::test]
async fn latest_value_is_the_one_with_max_created() {
    let (pool, _container) = setup_test_db().await;
    let owner = seed_user(&pool, "alice").await;
    let repo = WatchRepository::new(pool);
    let watch_id = seed_watch(&repo, owner).await;

    let base = Utc::now();
    for (offset, content) in [(0, "1.0"), (60, "1.1"), (120, "2.0")] {
        repo.save_value(NewValue {
            watch_id,
            created: base + TimeDelta::seconds(offset),
            content: content.into(),
        })
        .await
        .unwrap();
    }

    let latest = repo.get_latest_value(watch_id).await.unwrap().unwrap();
    assert_eq!(latest.content, "2.0");
}

#[tokio::test]
async fn latest_value_on_empty_history_is_none() {
    let (pool, _container) = setup_test_db().await;
    let owner = seed_user(&pool, "alice").await;
    let repo = WatchRepository::new(pool);
    let watch_id = seed_watch(&repo, owner).await;

    assert!(repo.get_latest_value(watch_id).await.unwrap().is_none());
}

#[tokio::test]
async fn list_values_returns_oldest_first() {
    let (pool, _container) = setup_test_db().await;
    let owner = seed_user(&pool, "alice").await;
    let repo = WatchRepository::new(pool);
    let watch_id = seed_watch(&repo, owner).await;

    let base = Utc::now();
    for (offset, content) in [(120, "2.0"), (0, "1.0"), (60, "1.1")] {
        repo.save_value(NewValue {
            watch_id,
            created: base + TimeDelta::seconds(offset),
            content: content.into(),
        })
        .await
        .unwrap();
    }

    let values = repo.list_values(watch_id).await.unwrap();
    let contents: Vec<_> = values.iter().map(|v| v.content.as_str()).collect();
    assert_eq!(contents, vec!["1.0", "1.1", "2.0"]);
}

#[tokio::test]
async fn empty_content_is_a_valid_value() {
    let (pool, _container) = setup_test_db().await;
    let owner = seed_user(&pool, "alice").await;
    let repo = WatchRepository::new(pool);
    let watch_id = seed_watch(&repo, owner).await;

    let value = repo
        .save_value(NewValue {
            watch_id,
            created: Utc::now(),
            content: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(value.content, "");
}

#[tokio::test]
async fn deleting_a_watch_cascades_to_its_values() {
    let (pool, _container) = setup_test_db().await;
    let owner = seed_user(&pool, "alice").await;
    let repo = WatchRepository::new(pool.clone());
    let watch_id = seed_watch(&repo, owner).await;
    let other_watch = seed_watch(&repo, owner).await;

    for offset in 0..3 {
        repo.save_value(NewValue {
            watch_id,
            created: Utc::now() + TimeDelta::seconds(offset),
            content: format!("v{offset}"),
        })
        .await
        .unwrap();
    }
    repo.save_value(NewValue {
        watch_id: other_watch,
        created: Utc::now(),
        content: "kept".into(),
    })
    .await
    .unwrap();

    assert!(repo.delete_watch(watch_id).await.unwrap());

    // No dangling values for the deleted watch.
    let (count,): (i64,) =
        sqlx::query_as(r#"SELECT COUNT(*) FROM watch_values WHERE watch_id = $1"#)
            .bind(watch_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);

    // The other watch's history is untouched.
    assert_eq!(repo.list_values(other_watch).await.unwrap().len(), 1);
}

#[tokio::test]
async fn saving_a_value_for_a_deleted_watch_fails() {
    let (pool, _container) = setup_test_db().await;
    let owner = seed_user(&pool, "alice").await;
    let repo = WatchRepository::new(pool);
    let watch_id = seed_watch(&repo, owner).await;

    assert!(repo.delete_watch(watch_id).await.unwrap());

    let err = repo
        .save_value(NewValue {
            watch_id,
            created: Utc::now(),
            content: "orphan".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, webmon_core::AppError::StorageError(_)));
}
