//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing test assertions on
//! recorded calls. `MockWatchStore` is a full in-memory store whose
//! `try_mark_in_flight` is atomic under its lock, so concurrency properties
//! hold under real parallel execution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::traits::{Extractor, Fetcher, Notifier, WatchStore};
use crate::watch::{NewValue, NewWatch, Value, Watch, WatchUpdate};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(html.to_string())])),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns a configured value regardless of input.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
}

impl MockExtractor {
    pub fn new(value: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(value.to_string())])),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
        }
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, _content: &str, _xpath: &str) -> Result<String, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("default".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Mock notifier recording (watch_id, value_id) pairs.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<(Uuid, Uuid)>>>,
    fail: bool,
}

impl MockNotifier {
    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(Uuid, Uuid)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    async fn notify(&self, watch: &Watch, value: &Value) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Generic("notifier unavailable".into()));
        }
        self.sent.lock().unwrap().push((watch.id, value.id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockWatchStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    watches: HashMap<Uuid, Watch>,
    values: Vec<Value>,
    save_value_error: Option<AppError>,
    due_query_error: Option<AppError>,
    /// Remaining number of times `update_watch_schedule` fails.
    schedule_write_failures: u32,
    schedule_write_attempts: u32,
    mark_attempts: u32,
    marks_won: u32,
}

/// In-memory watch store. A single lock covers all state, which makes
/// `try_mark_in_flight` a true compare-and-set.
#[derive(Clone, Default)]
pub struct MockWatchStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockWatchStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_watch(watch: Watch) -> Self {
        Self::with_watches(vec![watch])
    }

    pub fn with_watches(watches: Vec<Watch>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            for watch in watches {
                state.watches.insert(watch.id, watch);
            }
        }
        store
    }

    pub fn with_save_value_error(self, error: AppError) -> Self {
        self.state.lock().unwrap().save_value_error = Some(error);
        self
    }

    pub fn with_due_query_error(self, error: AppError) -> Self {
        self.state.lock().unwrap().due_query_error = Some(error);
        self
    }

    pub fn with_schedule_write_failures(self, failures: u32) -> Self {
        self.state.lock().unwrap().schedule_write_failures = failures;
        self
    }

    pub fn watch(&self, id: Uuid) -> Option<Watch> {
        self.state.lock().unwrap().watches.get(&id).cloned()
    }

    pub fn values(&self) -> Vec<Value> {
        self.state.lock().unwrap().values.clone()
    }

    pub fn mark_attempts(&self) -> u32 {
        self.state.lock().unwrap().mark_attempts
    }

    pub fn marks_won(&self) -> u32 {
        self.state.lock().unwrap().marks_won
    }

    pub fn schedule_write_attempts(&self) -> u32 {
        self.state.lock().unwrap().schedule_write_attempts
    }
}

impl WatchStore for MockWatchStore {
    async fn create_watch(&self, new: NewWatch) -> Result<Watch, AppError> {
        let now = Utc::now();
        let watch = Watch {
            id: Uuid::new_v4(),
            name: new.name,
            url: new.url,
            xpath: new.xpath,
            period: new.period,
            next_check: new.next_check,
            notify: new.notify,
            in_flight: false,
            in_flight_since: None,
            owner: new.owner,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .watches
            .insert(watch.id, watch.clone());
        Ok(watch)
    }

    async fn get_watch(&self, id: Uuid) -> Result<Option<Watch>, AppError> {
        Ok(self.state.lock().unwrap().watches.get(&id).cloned())
    }

    async fn list_watches(&self, owner: Uuid) -> Result<Vec<Watch>, AppError> {
        let state = self.state.lock().unwrap();
        let mut watches: Vec<_> = state
            .watches
            .values()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect();
        watches.sort_by_key(|w| w.created_at);
        Ok(watches)
    }

    async fn update_watch(&self, id: Uuid, update: WatchUpdate) -> Result<Option<Watch>, AppError> {
        let mut state = self.state.lock().unwrap();
        let Some(watch) = state.watches.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            watch.name = name;
        }
        if let Some(url) = update.url {
            watch.url = url;
        }
        if let Some(xpath) = update.xpath {
            watch.xpath = xpath;
        }
        if let Some(period) = update.period {
            watch.period = period;
        }
        if let Some(notify) = update.notify {
            watch.notify = notify;
        }
        watch.updated_at = Utc::now();
        Ok(Some(watch.clone()))
    }

    async fn delete_watch(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let existed = state.watches.remove(&id).is_some();
        if existed {
            state.values.retain(|v| v.watch_id != id);
        }
        Ok(existed)
    }

    async fn get_due_watches(&self, now: DateTime<Utc>) -> Result<Vec<Watch>, AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.due_query_error.take() {
            return Err(e);
        }
        let mut due: Vec<_> = state
            .watches
            .values()
            .filter(|w| w.next_check <= now && !w.in_flight)
            .cloned()
            .collect();
        due.sort_by_key(|w| w.next_check);
        Ok(due)
    }

    async fn try_mark_in_flight(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        state.mark_attempts += 1;
        match state.watches.get_mut(&id) {
            Some(watch) if !watch.in_flight => {
                watch.in_flight = true;
                watch.in_flight_since = Some(Utc::now());
                state.marks_won += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_watch_schedule(
        &self,
        id: Uuid,
        next_check: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.schedule_write_attempts += 1;
        if state.schedule_write_failures > 0 {
            state.schedule_write_failures -= 1;
            return Err(AppError::StorageError("injected write failure".into()));
        }
        if let Some(watch) = state.watches.get_mut(&id) {
            watch.next_check = next_check;
        }
        Ok(())
    }

    async fn clear_in_flight(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(watch) = state.watches.get_mut(&id) {
            watch.in_flight = false;
            watch.in_flight_since = None;
        }
        Ok(())
    }

    async fn release_stale_checks(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        let mut released = 0;
        for watch in state.watches.values_mut() {
            if watch.in_flight && watch.in_flight_since.is_some_and(|since| since <= cutoff) {
                watch.in_flight = false;
                watch.in_flight_since = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn save_value(&self, new: NewValue) -> Result<Value, AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.save_value_error.take() {
            return Err(e);
        }
        let value = Value {
            id: Uuid::new_v4(),
            watch_id: new.watch_id,
            created: new.created,
            content: new.content,
        };
        state.values.push(value.clone());
        Ok(value)
    }

    async fn get_latest_value(&self, watch_id: Uuid) -> Result<Option<Value>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .values
            .iter()
            .filter(|v| v.watch_id == watch_id)
            .max_by_key(|v| v.created)
            .cloned())
    }

    async fn list_values(&self, watch_id: Uuid) -> Result<Vec<Value>, AppError> {
        let state = self.state.lock().unwrap();
        let mut values: Vec<_> = state
            .values
            .iter()
            .filter(|v| v.watch_id == watch_id)
            .cloned()
            .collect();
        values.sort_by_key(|v| v.created);
        Ok(values)
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock scheduler reporter that records event labels.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl crate::scheduler::SchedulerReporter for MockReporter {
    fn report(&self, event: crate::scheduler::SchedulerEvent<'_>) {
        use crate::scheduler::SchedulerEvent as E;
        let label = match &event {
            E::Started { .. } => "Started",
            E::StaleChecksReleased { .. } => "StaleChecksReleased",
            E::CycleCompleted { .. } => "CycleCompleted",
            E::CheckStarted { .. } => "CheckStarted",
            E::CheckSucceeded { .. } => "CheckSucceeded",
            E::CheckFailed { .. } => "CheckFailed",
            E::CheckStuck { .. } => "CheckStuck",
            E::NotifyFailed { .. } => "NotifyFailed",
            E::ShuttingDown { .. } => "ShuttingDown",
            E::Stopped => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a watch that is due immediately.
pub fn make_test_watch(period: TimeDelta) -> Watch {
    let now = Utc::now();
    Watch {
        id: Uuid::new_v4(),
        name: "releases".to_string(),
        url: "https://example.com/releases".to_string(),
        xpath: "//*[@class='version']/text()".to_string(),
        period,
        next_check: now,
        notify: false,
        in_flight: false,
        in_flight_since: None,
        owner: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
    }
}
