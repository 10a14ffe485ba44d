//! # Download Stage
//!
//! Takes one cache miss per unit and starts an asynchronous fetch for it.
//! The unit returns as soon as the fetch is spawned; the completion task
//! attaches the bytes and forwards the request.
//!
//! Failed fetches are logged and dropped, never retried. Shutdown clears the
//! in-flight set, and any fetch that completes afterwards is discarded.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use assetflow_core::{Stage, WorkResult};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::asset::{AssetId, AssetKind};
use crate::error::FetchError;
use crate::stats::{bump, LaneStats};
use crate::topology::LaneQueues;

/// Future returned by a [`Fetcher`].
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, FetchError>> + Send>>;

/// Transport capability: fetches an asset's bytes by id.
pub trait Fetcher<K: AssetKind>: Send + Sync + 'static {
    /// Starts fetching `id`.
    fn fetch(&self, id: AssetId) -> FetchFuture;
}

/// Ids with a fetch outstanding. A multiset: the same id may be in flight
/// more than once, since requests are not deduplicated.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashMap<AssetId, usize>>,
}

impl InFlight {
    fn insert(&self, id: AssetId) {
        *self.ids.lock().entry(id).or_insert(0) += 1;
    }

    /// Removes one occurrence. Returns false if `id` was not tracked, which
    /// means the fetch was cancelled.
    fn complete(&self, id: AssetId) -> bool {
        let mut ids = self.ids.lock();
        match ids.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                ids.remove(&id);
                true
            }
            None => false,
        }
    }

    fn clear(&self) -> usize {
        let mut ids = self.ids.lock();
        let dropped = ids.values().sum();
        ids.clear();
        dropped
    }

    /// Returns true if a fetch for `id` is outstanding.
    #[must_use]
    pub fn contains(&self, id: AssetId) -> bool {
        self.ids.lock().contains_key(&id)
    }

    /// Outstanding fetches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().values().sum()
    }

    /// Returns true if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

/// Download stage for one lane.
pub struct DownloadStage<K: AssetKind> {
    name: String,
    queues: Arc<LaneQueues<K>>,
    fetcher: Arc<dyn Fetcher<K>>,
    in_flight: Arc<InFlight>,
    runtime: Handle,
    stats: Arc<LaneStats>,
}

impl<K: AssetKind> DownloadStage<K> {
    /// Creates the stage. Fetches run on `runtime`.
    #[must_use]
    pub fn new(
        queues: Arc<LaneQueues<K>>,
        fetcher: Arc<dyn Fetcher<K>>,
        runtime: Handle,
        stats: Arc<LaneStats>,
    ) -> Self {
        Self {
            name: format!("{}.download", K::NAME),
            queues,
            fetcher,
            in_flight: Arc::default(),
            runtime,
            stats,
        }
    }

    /// The in-flight set.
    #[must_use]
    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }
}

impl<K: AssetKind> Stage for DownloadStage<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_work(&self) -> WorkResult {
        let Some(mut request) = self.queues.download_requests.try_dequeue() else {
            return Ok(false);
        };
        let id = request.id;

        if id.is_nil() {
            bump(&self.stats.invalid_ids);
            tracing::warn!(lane = K::NAME, "dropping request with nil asset id");
            return Ok(self.has_pending_input());
        }

        self.in_flight.insert(id);
        bump(&self.stats.downloads_started);
        tracing::debug!(lane = K::NAME, %id, "download started");

        let fetch = self.fetcher.fetch(id);
        let in_flight = Arc::clone(&self.in_flight);
        let output = Arc::clone(self.queues.download_output());
        let stats = Arc::clone(&self.stats);

        drop(self.runtime.spawn(async move {
            let result = fetch.await;
            if !in_flight.complete(id) {
                tracing::debug!(lane = K::NAME, %id, "download finished after cancellation");
                return;
            }
            match result {
                Ok(bytes) => {
                    bump(&stats.downloads_completed);
                    tracing::debug!(lane = K::NAME, %id, bytes = bytes.len(), "download complete");
                    request.raw = Some(bytes);
                    output.enqueue(request);
                }
                Err(error) => {
                    bump(&stats.downloads_failed);
                    tracing::warn!(lane = K::NAME, %id, %error, "download failed, dropping request");
                }
            }
        }));

        Ok(self.has_pending_input())
    }

    fn output_backlogged(&self) -> bool {
        self.queues.backlogged()
    }

    fn has_pending_input(&self) -> bool {
        !self.queues.download_requests.is_empty()
    }

    fn on_shutdown(&self) {
        let dropped = self.in_flight.clear();
        if dropped > 0 {
            tracing::debug!(lane = K::NAME, dropped, "cleared in-flight downloads");
        }
    }
}
