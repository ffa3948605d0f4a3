use sha2::{Digest, Sha256};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use webmon_core::error::AppError;

/// A registered API user. Watches reference users by id; the API layer
/// resolves bearer tokens to users through `token_hash`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub token_hash: String,
}

/// Compute the SHA-256 hex digest of an API token. Only digests are stored
/// or compared; the raw token never reaches the database.
pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Repository for API users.
#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, username: &str, token: &str) -> Result<UserRecord, AppError> {
        let row = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (username, token_hash)
            VALUES ($1, $2)
            RETURNING id, username, token_hash
            "#,
        )
        .bind(username)
        .bind(token_hash(token))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(row)
    }

    pub async fn get_by_token_hash(&self, hash: &str) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, token_hash FROM users WHERE token_hash = $1"#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(row)
    }
}
