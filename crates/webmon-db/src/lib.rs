//! PostgreSQL persistence for WebMon.

pub mod config;
pub mod database;
pub mod user_repository;
pub mod watch_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use user_repository::{UserRecord, UserRepository, token_hash};
pub use watch_repository::WatchRepository;
