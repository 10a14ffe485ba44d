//! # Lane Topology
//!
//! The five queues of one lane and where each stage sends its output.
//!
//! ```text
//!                       ┌──────── cache hit ────────┐
//!                       │                           ▼
//! requests ──> Cache ──miss──> download_requests ──> Download ──> ...
//!
//! RawBytes lanes (mesh, animation):
//!   Download ──> to_cache ──> Cache(store) ──> to_decode ──> Decode ──> ready
//!   cache hit ──> to_decode
//!
//! Decoded lanes (texture):
//!   Download ──> to_decode ──> Decode ──> to_cache ──> Cache(store) ──> ready
//!   cache hit ──> ready
//! ```

use std::sync::Arc;

use assetflow_core::ConcurrentQueue;

use crate::asset::{AssetKind, AssetRequest, CachePoint};

/// Queue of requests for one kind.
pub type RequestQueue<K> = ConcurrentQueue<AssetRequest<K>>;

/// The queues of one lane.
pub struct LaneQueues<K: AssetKind> {
    /// New requests from the consumer.
    pub requests: Arc<RequestQueue<K>>,
    /// Cache misses waiting for a fetch.
    pub download_requests: Arc<RequestQueue<K>>,
    /// Items waiting to be stored in the cache.
    pub to_cache: Arc<RequestQueue<K>>,
    /// Items waiting to be decoded.
    pub to_decode: Arc<RequestQueue<K>>,
    /// Finished items for the consumer.
    pub ready: Arc<RequestQueue<K>>,
    max_ready_depth: usize,
}

impl<K: AssetKind> LaneQueues<K> {
    /// Creates empty queues. `max_ready_depth` of 0 disables backpressure.
    #[must_use]
    pub fn new(max_ready_depth: usize) -> Self {
        let queue = |stage: &str| Arc::new(ConcurrentQueue::new(format!("{}.{stage}", K::NAME)));
        Self {
            requests: queue("requests"),
            download_requests: queue("download_requests"),
            to_cache: queue("to_cache"),
            to_decode: queue("to_decode"),
            ready: queue("ready"),
            max_ready_depth,
        }
    }

    /// Depth at which stages pause.
    #[must_use]
    pub fn max_ready_depth(&self) -> usize {
        self.max_ready_depth
    }

    /// Where fetched items go.
    #[must_use]
    pub fn download_output(&self) -> &Arc<RequestQueue<K>> {
        match K::CACHE_POINT {
            CachePoint::RawBytes => &self.to_cache,
            CachePoint::Decoded => &self.to_decode,
        }
    }

    /// Where decoded items go.
    #[must_use]
    pub fn decode_output(&self) -> &Arc<RequestQueue<K>> {
        match K::CACHE_POINT {
            CachePoint::RawBytes => &self.ready,
            CachePoint::Decoded => &self.to_cache,
        }
    }

    /// Where items go after the cache store step, and on a cache hit.
    #[must_use]
    pub fn cache_output(&self) -> &Arc<RequestQueue<K>> {
        match K::CACHE_POINT {
            CachePoint::RawBytes => &self.to_decode,
            CachePoint::Decoded => &self.ready,
        }
    }

    /// Returns true once the ready queue has reached the configured depth.
    ///
    /// Every stage of the lane pauses on the same signal, so only the
    /// consumer draining `ready` can release it. Intermediate queues are
    /// never a pause condition: the cache and download stages feed each
    /// other and would otherwise wait on one another.
    ///
    /// Counts are read without locking, so the answer is advisory.
    #[must_use]
    pub fn backlogged(&self) -> bool {
        self.max_ready_depth != 0 && self.ready.count() >= self.max_ready_depth
    }

    /// Items anywhere in the lane's queues.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.requests.count()
            + self.download_requests.count()
            + self.to_cache.count()
            + self.to_decode.count()
            + self.ready.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetId, Mesh};
    use crate::texture::Texture;

    #[test]
    fn test_raw_bytes_routing() {
        let queues = LaneQueues::<Mesh>::new(4);
        assert!(Arc::ptr_eq(queues.download_output(), &queues.to_cache));
        assert!(Arc::ptr_eq(queues.cache_output(), &queues.to_decode));
        assert!(Arc::ptr_eq(queues.decode_output(), &queues.ready));
        assert_eq!(queues.ready.name(), "mesh.ready");
    }

    #[test]
    fn test_decoded_routing() {
        let queues = LaneQueues::<Texture>::new(4);
        assert!(Arc::ptr_eq(queues.download_output(), &queues.to_decode));
        assert!(Arc::ptr_eq(queues.decode_output(), &queues.to_cache));
        assert!(Arc::ptr_eq(queues.cache_output(), &queues.ready));
    }

    #[test]
    fn test_backlog_thresholds() {
        let queues = LaneQueues::<Texture>::new(2);
        let item = || AssetRequest::<Texture>::new(AssetId::from_u128(1), None, ());

        assert!(!queues.backlogged());
        for _ in 0..5 {
            queues.to_decode.enqueue(item());
            queues.download_requests.enqueue(item());
            queues.to_cache.enqueue(item());
        }
        assert!(!queues.backlogged());

        queues.ready.enqueue(item());
        assert!(!queues.backlogged());
        queues.ready.enqueue(item());
        assert!(queues.backlogged());
        assert_eq!(queues.queued(), 17);

        queues.ready.try_dequeue();
        assert!(!queues.backlogged());
    }

    #[test]
    fn test_zero_depth_disables_backpressure() {
        let queues = LaneQueues::<Texture>::new(0);
        for _ in 0..100 {
            queues.ready.enqueue(AssetRequest::new(AssetId::from_u128(1), None, ()));
        }
        assert!(!queues.backlogged());
    }
}
