use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::watch::{NewValue, NewWatch, Value, Watch, WatchUpdate};

/// Fetches raw page content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Extracts a textual value from page content using an XPath expression.
///
/// Pure and synchronous: no I/O, deterministic for given inputs.
pub trait Extractor: Send + Sync + Clone {
    fn extract(&self, content: &str, xpath: &str) -> Result<String, AppError>;
}

/// Persists watches and their recorded values.
///
/// Implementations must make `try_mark_in_flight` atomic (compare-and-set):
/// it is the only thing standing between a watch and a concurrent
/// double-check when multiple cycles or scheduler instances overlap.
pub trait WatchStore: Send + Sync + Clone {
    fn create_watch(&self, new: NewWatch) -> impl Future<Output = Result<Watch, AppError>> + Send;

    fn get_watch(&self, id: Uuid) -> impl Future<Output = Result<Option<Watch>, AppError>> + Send;

    fn list_watches(&self, owner: Uuid)
    -> impl Future<Output = Result<Vec<Watch>, AppError>> + Send;

    /// Apply a partial update to user-editable fields. Returns `None` if the
    /// watch no longer exists. Never touches `next_check` or `in_flight`.
    fn update_watch(
        &self,
        id: Uuid,
        update: WatchUpdate,
    ) -> impl Future<Output = Result<Option<Watch>, AppError>> + Send;

    /// Delete a watch and, by cascade, all of its values.
    fn delete_watch(&self, id: Uuid) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// All watches with `next_check <= now` that are not already in flight.
    fn get_due_watches(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Watch>, AppError>> + Send;

    /// Atomically claim a watch for checking. Returns false if it is already
    /// in flight or has been deleted.
    fn try_mark_in_flight(&self, id: Uuid) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn update_watch_schedule(
        &self,
        id: Uuid,
        next_check: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn clear_in_flight(&self, id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Release in-flight claims taken at or before `cutoff`. Recovery path
    /// for claims orphaned by a crash; returns how many were released.
    fn release_stale_checks(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    fn save_value(&self, new: NewValue) -> impl Future<Output = Result<Value, AppError>> + Send;

    /// The value with the greatest `created` for a watch, if any.
    fn get_latest_value(
        &self,
        watch_id: Uuid,
    ) -> impl Future<Output = Result<Option<Value>, AppError>> + Send;

    /// All values for a watch, oldest first.
    fn list_values(
        &self,
        watch_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Value>, AppError>> + Send;
}

/// Delivers a notification for a freshly recorded value.
///
/// Best-effort: the scheduler logs and swallows errors, and watch state is
/// never affected by a delivery failure.
pub trait Notifier: Send + Sync + Clone {
    fn notify(
        &self,
        watch: &Watch,
        value: &Value,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op notifier for deployments without a delivery channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    async fn notify(&self, _watch: &Watch, _value: &Value) -> Result<(), AppError> {
        Ok(())
    }
}
