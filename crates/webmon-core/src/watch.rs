use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::schedule;

/// A monitoring definition: poll `url` every `period`, extract a value with
/// `xpath`, record it.
#[derive(Debug, Clone)]
pub struct Watch {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub xpath: String,
    pub period: TimeDelta,
    /// When this watch is next due. Set once at creation and advanced only
    /// by the scheduler after a completed check — owner edits never touch it.
    pub next_check: DateTime<Utc>,
    pub notify: bool,
    /// True while a check for this watch is outstanding. At most one check
    /// per watch runs at any time.
    pub in_flight: bool,
    /// When the current claim was taken; lets a startup sweep release claims
    /// orphaned by a crash.
    pub in_flight_since: Option<DateTime<Utc>>,
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a watch. `next_check` is computed here, at
/// construction time, so storage never has to backfill it.
#[derive(Debug, Clone)]
pub struct NewWatch {
    pub name: String,
    pub url: String,
    pub xpath: String,
    pub period: TimeDelta,
    pub next_check: DateTime<Utc>,
    pub notify: bool,
    pub owner: Uuid,
}

impl NewWatch {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        xpath: impl Into<String>,
        period: TimeDelta,
        notify: bool,
        owner: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let name = name.into();
        let url = url.into();
        let xpath = xpath.into();

        if name.trim().is_empty() {
            return Err(AppError::ValidationError("name must not be blank".into()));
        }
        if url.trim().is_empty() {
            return Err(AppError::ValidationError("url must not be blank".into()));
        }
        if xpath.trim().is_empty() {
            return Err(AppError::ValidationError("xpath must not be blank".into()));
        }
        if !schedule::period_is_valid(period) {
            return Err(AppError::ValidationError("period must be positive".into()));
        }

        Ok(Self {
            name,
            url,
            xpath,
            period,
            next_check: schedule::first_due(created_at, period),
            notify,
            owner,
        })
    }
}

/// Partial update to a watch's user-editable fields. The schedule fields
/// (`next_check`, `in_flight`) are deliberately not representable here.
#[derive(Debug, Clone, Default)]
pub struct WatchUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub xpath: Option<String>,
    pub period: Option<TimeDelta>,
    pub notify: Option<bool>,
}

impl WatchUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(AppError::ValidationError("name must not be blank".into()));
        }
        if let Some(url) = &self.url
            && url.trim().is_empty()
        {
            return Err(AppError::ValidationError("url must not be blank".into()));
        }
        if let Some(xpath) = &self.xpath
            && xpath.trim().is_empty()
        {
            return Err(AppError::ValidationError("xpath must not be blank".into()));
        }
        if let Some(period) = self.period
            && !schedule::period_is_valid(period)
        {
            return Err(AppError::ValidationError("period must be positive".into()));
        }
        Ok(())
    }
}

/// One historical extraction result for a watch. Created only by the
/// scheduler after a successful check; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub created: DateTime<Utc>,
    pub content: String,
}

/// Payload for inserting a value.
#[derive(Debug, Clone)]
pub struct NewValue {
    pub watch_id: Uuid,
    pub created: DateTime<Utc>,
    pub content: String,
}
