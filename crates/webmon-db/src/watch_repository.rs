use chrono::{DateTime, TimeDelta, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use webmon_core::error::AppError;
use webmon_core::traits::WatchStore;
use webmon_core::watch::{NewValue, NewWatch, Value, Watch, WatchUpdate};

/// PostgreSQL-backed watch store.
///
/// `try_mark_in_flight` relies on a single conditional `UPDATE` for its
/// compare-and-set, so concurrent schedulers cannot claim the same watch.
#[derive(Clone)]
pub struct WatchRepository {
    pool: Pool<Postgres>,
}

impl WatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct WatchRow {
    id: Uuid,
    name: String,
    url: String,
    xpath: String,
    period_seconds: i64,
    next_check: DateTime<Utc>,
    notify: bool,
    in_flight: bool,
    in_flight_since: Option<DateTime<Utc>>,
    owner: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WatchRow> for Watch {
    fn from(row: WatchRow) -> Self {
        Watch {
            id: row.id,
            name: row.name,
            url: row.url,
            xpath: row.xpath,
            period: TimeDelta::seconds(row.period_seconds),
            next_check: row.next_check,
            notify: row.notify,
            in_flight: row.in_flight,
            in_flight_since: row.in_flight_since,
            owner: row.owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ValueRow {
    id: Uuid,
    watch_id: Uuid,
    created: DateTime<Utc>,
    content: String,
}

impl From<ValueRow> for Value {
    fn from(row: ValueRow) -> Self {
        Value {
            id: row.id,
            watch_id: row.watch_id,
            created: row.created,
            content: row.content,
        }
    }
}

impl WatchStore for WatchRepository {
    async fn create_watch(&self, new: NewWatch) -> Result<Watch, AppError> {
        let row = sqlx::query_as::<_, WatchRow>(
            r#"
            INSERT INTO watches (name, url, xpath, period_seconds, next_check, notify, owner)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&new.name)
        .bind(&new.url)
        .bind(&new.xpath)
        .bind(new.period.num_seconds())
        .bind(new.next_check)
        .bind(new.notify)
        .bind(new.owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(row.into())
    }

    async fn get_watch(&self, id: Uuid) -> Result<Option<Watch>, AppError> {
        let row = sqlx::query_as::<_, WatchRow>(r#"SELECT * FROM watches WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn list_watches(&self, owner: Uuid) -> Result<Vec<Watch>, AppError> {
        let rows = sqlx::query_as::<_, WatchRow>(
            r#"
            SELECT * FROM watches
            WHERE owner = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_watch(&self, id: Uuid, update: WatchUpdate) -> Result<Option<Watch>, AppError> {
        // Partial update: absent fields keep their value. The schedule
        // columns are not part of this statement at all.
        let row = sqlx::query_as::<_, WatchRow>(
            r#"
            UPDATE watches SET
                name = COALESCE($2, name),
                url = COALESCE($3, url),
                xpath = COALESCE($4, xpath),
                period_seconds = COALESCE($5, period_seconds),
                notify = COALESCE($6, notify),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.url)
        .bind(update.xpath)
        .bind(update.period.map(|p| p.num_seconds()))
        .bind(update.notify)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn delete_watch(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(r#"DELETE FROM watches WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_due_watches(&self, now: DateTime<Utc>) -> Result<Vec<Watch>, AppError> {
        let rows = sqlx::query_as::<_, WatchRow>(
            r#"
            SELECT * FROM watches
            WHERE next_check <= $1 AND in_flight = FALSE
            ORDER BY next_check ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn try_mark_in_flight(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE watches
            SET in_flight = TRUE, in_flight_since = NOW()
            WHERE id = $1 AND in_flight = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_watch_schedule(
        &self,
        id: Uuid,
        next_check: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(r#"UPDATE watches SET next_check = $2 WHERE id = $1"#)
            .bind(id)
            .bind(next_check)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn clear_in_flight(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE watches SET in_flight = FALSE, in_flight_since = NULL WHERE id = $1"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn release_stale_checks(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE watches
            SET in_flight = FALSE, in_flight_since = NULL
            WHERE in_flight = TRUE AND in_flight_since <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn save_value(&self, new: NewValue) -> Result<Value, AppError> {
        let row = sqlx::query_as::<_, ValueRow>(
            r#"
            INSERT INTO watch_values (watch_id, created, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new.watch_id)
        .bind(new.created)
        .bind(&new.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(row.into())
    }

    async fn get_latest_value(&self, watch_id: Uuid) -> Result<Option<Value>, AppError> {
        let row = sqlx::query_as::<_, ValueRow>(
            r#"
            SELECT * FROM watch_values
            WHERE watch_id = $1
            ORDER BY created DESC
            LIMIT 1
            "#,
        )
        .bind(watch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn list_values(&self, watch_id: Uuid) -> Result<Vec<Value>, AppError> {
        let rows = sqlx::query_as::<_, ValueRow>(
            r#"
            SELECT * FROM watch_values
            WHERE watch_id = $1
            ORDER BY created ASC
            "#,
        )
        .bind(watch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
