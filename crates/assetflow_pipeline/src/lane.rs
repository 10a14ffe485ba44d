//! # Asset Lane
//!
//! One lane = five queues + three workers, wired by wake-up hints:
//!
//! ```text
//!            Enqueued                 Enqueued               Enqueued
//! requests ──────────> Cache    download_requests ──> Download   to_decode ──> Decode
//! to_cache ──────────> Cache
//!
//! every worker also wakes on Dequeued from `ready`: a full ready queue
//! pauses the whole lane and the consumer draining it resumes all three
//! ```
//!
//! The same engine runs every asset kind; only the [`AssetKind`] marker and
//! the injected services differ.

use std::sync::Arc;

use assetflow_core::{QueueEvent, ShutdownBroadcast, WorkerHandle, WorkerStats};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::asset::{AssetId, AssetKind, AssetRequest, RequesterId};
use crate::config::LaneConfig;
use crate::error::{ConfigError, PipelineResult};
use crate::stages::{AssetDecoder, CacheMode, CacheStage, DecodeStage, DownloadStage, Fetcher};
use crate::stats::{bump, LaneStats, LaneStatsSnapshot};
use crate::topology::{LaneQueues, RequestQueue};

/// Collaborators a lane needs.
pub struct LaneServices<K: AssetKind> {
    /// Transport.
    pub fetcher: Arc<dyn Fetcher<K>>,
    /// Kind-specific decoder.
    pub decoder: Arc<dyn AssetDecoder<K>>,
    /// Cache backend. Must be [`CacheMode::Caching`] when the lane config
    /// enables caching; ignored otherwise.
    pub cache: CacheMode,
}

/// Worker counters of one lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneWorkerStats {
    /// Cache worker.
    pub cache: WorkerStats,
    /// Download worker.
    pub download: WorkerStats,
    /// Decode worker.
    pub decode: WorkerStats,
}

struct Watch<K: AssetKind> {
    queue: Arc<RequestQueue<K>>,
    event: QueueEvent,
    waker: Arc<Notify>,
}

/// A running lane for asset kind `K`.
pub struct Lane<K: AssetKind> {
    queues: Arc<LaneQueues<K>>,
    stats: Arc<LaneStats>,
    cache: WorkerHandle<CacheStage<K>>,
    download: WorkerHandle<DownloadStage<K>>,
    decode: WorkerHandle<DecodeStage<K>>,
    watches: Vec<Watch<K>>,
}

impl<K: AssetKind> Lane<K> {
    /// Builds the lane's queues and starts its three workers on `runtime`.
    ///
    /// The caching flag is read once here; the cache mode cannot change
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` enables caching but no
    /// cache backend was supplied.
    pub fn new(
        config: &LaneConfig,
        services: LaneServices<K>,
        runtime: &Handle,
        shutdown: &ShutdownBroadcast,
    ) -> PipelineResult<Self> {
        let mode = match (config.caching_enabled, services.cache) {
            (true, CacheMode::PassThrough) => {
                return Err(ConfigError::Invalid(format!(
                    "{} lane enables caching without a cache backend",
                    K::NAME
                ))
                .into());
            }
            (true, mode) => mode,
            (false, _) => CacheMode::PassThrough,
        };

        let queues = Arc::new(LaneQueues::<K>::new(config.max_ready_queue_depth));
        let stats = Arc::new(LaneStats::default());

        let cache = WorkerHandle::spawn(
            CacheStage::new(queues.clone(), mode, stats.clone()),
            config.cache_concurrency,
            runtime,
            shutdown,
        );
        let download = WorkerHandle::spawn(
            DownloadStage::new(queues.clone(), services.fetcher, runtime.clone(), stats.clone()),
            config.download_concurrency,
            runtime,
            shutdown,
        );
        let decode = WorkerHandle::spawn(
            DecodeStage::new(queues.clone(), services.decoder, stats.clone()),
            config.decode_concurrency,
            runtime,
            shutdown,
        );

        let mut lane = Self {
            queues,
            stats,
            cache,
            download,
            decode,
            watches: Vec::new(),
        };
        lane.wire();

        tracing::info!(
            lane = K::NAME,
            caching = lane.caching_enabled(),
            max_ready_depth = config.max_ready_queue_depth,
            "lane started"
        );
        Ok(lane)
    }

    fn wire(&mut self) {
        let q = Arc::clone(&self.queues);
        let cache = Arc::clone(self.cache.waker());
        let download = Arc::clone(self.download.waker());
        let decode = Arc::clone(self.decode.waker());

        let wiring = [
            (&q.requests, QueueEvent::Enqueued, &cache),
            (&q.to_cache, QueueEvent::Enqueued, &cache),
            (&q.ready, QueueEvent::Dequeued, &cache),
            (&q.download_requests, QueueEvent::Enqueued, &download),
            (&q.ready, QueueEvent::Dequeued, &download),
            (&q.to_decode, QueueEvent::Enqueued, &decode),
            (&q.ready, QueueEvent::Dequeued, &decode),
        ];

        for (queue, event, waker) in wiring {
            queue.watch(event, waker);
            self.watches.push(Watch {
                queue: Arc::clone(queue),
                event,
                waker: Arc::clone(waker),
            });
        }
    }

    /// Lane name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        K::NAME
    }

    /// Requests `id` with default decode parameters.
    pub fn request(&self, id: AssetId, requester: Option<RequesterId>) {
        self.request_with(id, requester, K::Params::default());
    }

    /// Requests `id`. Fire-and-forget: the result, if any, shows up on
    /// [`ready`](Self::ready). Duplicate requests are not merged.
    pub fn request_with(&self, id: AssetId, requester: Option<RequesterId>, params: K::Params) {
        bump(&self.stats.requested);
        tracing::debug!(lane = K::NAME, %id, "requested");
        self.queues.requests.enqueue(AssetRequest::new(id, requester, params));
    }

    /// Finished items for the consumer to drain.
    #[must_use]
    pub fn ready(&self) -> &Arc<RequestQueue<K>> {
        &self.queues.ready
    }

    /// Takes the next finished item, if any.
    #[must_use]
    pub fn try_next_ready(&self) -> Option<AssetRequest<K>> {
        self.queues.ready.try_dequeue()
    }

    /// All of the lane's queues.
    #[must_use]
    pub fn queues(&self) -> &Arc<LaneQueues<K>> {
        &self.queues
    }

    /// Event counters.
    #[must_use]
    pub fn stats(&self) -> LaneStatsSnapshot {
        self.stats.snapshot()
    }

    /// Worker counters.
    #[must_use]
    pub fn worker_stats(&self) -> LaneWorkerStats {
        LaneWorkerStats {
            cache: self.cache.worker().stats(),
            download: self.download.worker().stats(),
            decode: self.decode.worker().stats(),
        }
    }

    /// Returns true if the lane loads from and stores to the cache.
    #[must_use]
    pub fn caching_enabled(&self) -> bool {
        self.cache.stage().is_caching()
    }

    /// Outstanding fetches.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.download.stage().in_flight().len()
    }

    /// Returns true if a fetch for `id` is outstanding.
    #[must_use]
    pub fn is_in_flight(&self, id: AssetId) -> bool {
        self.download.stage().in_flight().contains(id)
    }
}

impl<K: AssetKind> Drop for Lane<K> {
    fn drop(&mut self) {
        for watch in self.watches.drain(..) {
            watch.queue.unwatch(watch.event, &watch.waker);
        }
        tracing::debug!(lane = K::NAME, "lane disposed");
    }
}
