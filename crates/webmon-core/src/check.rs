use chrono::Utc;

use crate::error::AppError;
use crate::traits::{Extractor, Fetcher, WatchStore};
use crate::watch::{NewValue, Value, Watch};

/// One watch check: fetch → extract → persist.
///
/// Generic over its collaborators via traits, enabling dependency injection
/// and testability without real HTTP.
#[derive(Clone)]
pub struct CheckService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: WatchStore,
{
    fetcher: F,
    extractor: E,
    store: S,
}

impl<F, E, S> CheckService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: WatchStore,
{
    pub fn new(fetcher: F, extractor: E, store: S) -> Self {
        Self {
            fetcher,
            extractor,
            store,
        }
    }

    /// Run a single check for a watch and record the extracted value.
    ///
    /// Any failure (fetch, extract, value write) propagates to the caller;
    /// nothing is recorded on failure. Scheduling is the caller's concern.
    pub async fn run_check(&self, watch: &Watch) -> Result<Value, AppError> {
        tracing::debug!(watch_id = %watch.id, url = %watch.url, "Fetching");
        let content = self.fetcher.fetch(&watch.url).await?;
        tracing::debug!(watch_id = %watch.id, bytes = content.len(), "Fetched");

        let extracted = self.extractor.extract(&content, &watch.xpath)?;

        let value = self
            .store
            .save_value(NewValue {
                watch_id: watch.id,
                created: Utc::now(),
                content: extracted,
            })
            .await?;

        Ok(value)
    }
}
