use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use uuid::Uuid;

use webmon_db::{Database, token_hash};
use webmon_server::routes;
use webmon_server::state::AppState;

pub const ALICE_TOKEN: &str = "alice-secret-token";
pub const BOB_TOKEN: &str = "bob-secret-token";

/// SQL migration statements, executed one at a time.
/// Mirrors migrations/0001_init.sql.
const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        username VARCHAR(100) NOT NULL UNIQUE,
        token_hash VARCHAR(64) NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS watches (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name VARCHAR(100) NOT NULL,
        url VARCHAR NOT NULL,
        xpath VARCHAR(500) NOT NULL,
        period_seconds BIGINT NOT NULL CHECK (period_seconds > 0),
        next_check TIMESTAMPTZ NOT NULL,
        notify BOOLEAN NOT NULL DEFAULT FALSE,
        in_flight BOOLEAN NOT NULL DEFAULT FALSE,
        in_flight_since TIMESTAMPTZ,
        owner UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS watch_values (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        watch_id UUID NOT NULL REFERENCES watches(id) ON DELETE CASCADE,
        created TIMESTAMPTZ NOT NULL,
        content TEXT NOT NULL DEFAULT ''
    )"#,
];

pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    _container: ContainerAsync<GenericImage>,
}

/// Spin up PostgreSQL, run migrations, seed two users (alice and bob), and
/// build the app router.
pub async fn setup_test_app() -> TestApp {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "webmon_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let url = format!("postgresql://postgres:postgres@{host}:{port}/webmon_test");
    let pool = retry_connect(&url).await;

    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    seed_user(&pool, "alice", ALICE_TOKEN).await;
    seed_user(&pool, "bob", BOB_TOKEN).await;

    let db = Database::from_pool(pool.clone());
    let state = Arc::new(AppState { db });

    TestApp {
        router: routes::router(state),
        pool,
        _container: container,
    }
}

pub async fn seed_user(pool: &PgPool, username: &str, token: &str) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"INSERT INTO users (username, token_hash) VALUES ($1, $2) RETURNING id"#,
    )
    .bind(username)
    .bind(token_hash(token))
    .fetch_one(pool)
    .await
    .expect("Failed to seed user");

    id
}

/// Insert a value row directly; the API has no write path for values.
pub async fn seed_value(
    pool: &PgPool,
    watch_id: Uuid,
    created: DateTime<Utc>,
    content: &str,
) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"INSERT INTO watch_values (watch_id, created, content) VALUES ($1, $2, $3) RETURNING id"#,
    )
    .bind(watch_id)
    .bind(created)
    .bind(content)
    .fetch_one(pool)
    .await
    .expect("Failed to seed value");

    id
}

async fn retry_connect(url: &str) -> PgPool {
    for _ in 0..30 {
        if let Ok(pool) = PgPoolOptions::new().max_connections(5).connect(url).await {
            return pool;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test database");
}
