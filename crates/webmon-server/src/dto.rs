use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use webmon_core::error::AppError;
use webmon_core::watch::{Value, Watch, WatchUpdate};

// ---------------------------------------------------------------------------
// Watches
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateWatchRequest {
    /// Display name
    pub name: String,
    /// Page to monitor
    pub url: String,
    /// Extraction expression applied to the fetched page
    pub xpath: String,
    /// Polling period in seconds (must be positive)
    pub period_seconds: i64,
    /// Emit a notification after each successful check (default: false)
    pub notify: Option<bool>,
}

/// Ten years. Anything above this is a typo, and extreme values would
/// overflow the duration arithmetic.
const MAX_PERIOD_SECONDS: i64 = 10 * 365 * 24 * 3600;

fn validate_period_field(period_seconds: i64) -> Result<(), AppError> {
    if period_seconds <= 0 || period_seconds > MAX_PERIOD_SECONDS {
        return Err(AppError::ValidationError(format!(
            "period_seconds must be between 1 and {MAX_PERIOD_SECONDS}"
        )));
    }
    Ok(())
}

impl CreateWatchRequest {
    /// Field-level validation beyond what `NewWatch` enforces: the URL must
    /// parse and the XPath must compile, so broken watches are rejected at
    /// the door instead of failing on every check.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_url_field(&self.url)?;
        validate_period_field(self.period_seconds)?;
        webmon_core::extract::compile(&self.xpath)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateWatchRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub xpath: Option<String>,
    pub period_seconds: Option<i64>,
    pub notify: Option<bool>,
}

impl UpdateWatchRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(url) = &self.url {
            validate_url_field(url)?;
        }
        if let Some(period_seconds) = self.period_seconds {
            validate_period_field(period_seconds)?;
        }
        if let Some(xpath) = &self.xpath {
            webmon_core::extract::compile(xpath)?;
        }
        Ok(())
    }

    pub fn into_update(self) -> WatchUpdate {
        WatchUpdate {
            name: self.name,
            url: self.url,
            xpath: self.xpath,
            period: self.period_seconds.map(TimeDelta::seconds),
            notify: self.notify,
        }
    }
}

fn validate_url_field(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::InvalidUrl(format!(
            "scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WatchResponse {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub xpath: String,
    pub period_seconds: i64,
    pub next_check: DateTime<Utc>,
    pub notify: bool,
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Watch> for WatchResponse {
    fn from(watch: Watch) -> Self {
        Self {
            id: watch.id,
            name: watch.name,
            url: watch.url,
            xpath: watch.xpath,
            period_seconds: watch.period.num_seconds(),
            next_check: watch.next_check,
            notify: watch.notify,
            owner: watch.owner,
            created_at: watch.created_at,
            updated_at: watch.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WatchListResponse {
    pub watches: Vec<WatchResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ValueResponse {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub created: DateTime<Utc>,
    pub content: String,
}

impl From<Value> for ValueResponse {
    fn from(value: Value) -> Self {
        Self {
            id: value.id,
            watch_id: value.watch_id,
            created: value.created,
            content: value.content,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ValueListResponse {
    pub values: Vec<ValueResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
