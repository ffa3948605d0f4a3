//! Core domain types and the watch scheduling engine for WebMon.

pub mod check;
pub mod error;
pub mod extract;
pub mod schedule;
pub mod scheduler;
pub mod testutil;
pub mod traits;
pub mod watch;

pub use check::CheckService;
pub use error::AppError;
pub use extract::XPathExtractor;
pub use scheduler::{SchedulerConfig, SchedulerService, TracingSchedulerReporter};
pub use traits::{Extractor, Fetcher, Notifier, NullNotifier, WatchStore};
pub use watch::{NewValue, NewWatch, Value, Watch, WatchUpdate};
