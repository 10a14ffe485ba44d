//! # Cache Stage
//!
//! Sits in front of the download stage (load side) and after the cache
//! point (store side). The mode is fixed when the stage is built.
//!
//! - **Pass-through**: move at most one item `requests → download_requests`
//!   and one item `to_cache → cache_output` per unit.
//! - **Caching**: load side looks up one request on disk and either forwards
//!   it to `download_requests` (miss) or attaches the payload and forwards it
//!   to `cache_output` (hit). An entry that exists but cannot be loaded is
//!   deleted and the request downloaded, so the store side rewrites it.
//!   Store side writes one item's payload if no entry exists yet, then
//!   forwards it regardless.
//!
//! Every item is dequeued before any I/O, so a failure never leaves a queue
//! wedged.

use std::sync::Arc;

use assetflow_core::{Stage, WorkResult};

use crate::asset::{AssetKind, AssetRequest};
use crate::crypto::{open_payload, seal_payload, CacheCipher};
use crate::error::CacheResult;
use crate::stats::{bump, LaneStats};
use crate::storage::CacheStorage;
use crate::topology::LaneQueues;

/// How the cache stage treats items.
#[derive(Clone)]
pub enum CacheMode {
    /// Forward without touching the disk.
    PassThrough,
    /// Encrypted load and store.
    Caching {
        /// Entry store.
        storage: Arc<dyn CacheStorage>,
        /// Blob cipher.
        cipher: Arc<dyn CacheCipher>,
    },
}

impl std::fmt::Debug for CacheMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PassThrough => f.write_str("PassThrough"),
            Self::Caching { .. } => f.write_str("Caching"),
        }
    }
}

/// Cache stage for one lane.
pub struct CacheStage<K: AssetKind> {
    name: String,
    queues: Arc<LaneQueues<K>>,
    mode: CacheMode,
    stats: Arc<LaneStats>,
}

impl<K: AssetKind> CacheStage<K> {
    /// Creates the stage.
    #[must_use]
    pub fn new(queues: Arc<LaneQueues<K>>, mode: CacheMode, stats: Arc<LaneStats>) -> Self {
        Self {
            name: format!("{}.cache", K::NAME),
            queues,
            mode,
            stats,
        }
    }

    /// Returns true in caching mode.
    #[must_use]
    pub fn is_caching(&self) -> bool {
        matches!(self.mode, CacheMode::Caching { .. })
    }

    fn pass_through(&self) -> bool {
        let q = &self.queues;
        if let Some(request) = q.requests.try_dequeue() {
            q.download_requests.enqueue(request);
        }
        if let Some(request) = q.to_cache.try_dequeue() {
            q.cache_output().enqueue(request);
        }
        !q.requests.is_empty() || !q.to_cache.is_empty()
    }

    /// Returns true if a load failed; the request was forwarded as a miss.
    fn load_one(&self, storage: &dyn CacheStorage, cipher: &dyn CacheCipher) -> bool {
        let Some(mut request) = self.queues.requests.try_dequeue() else {
            return false;
        };
        let id = request.id;

        if !storage.exists(id) {
            bump(&self.stats.cache_misses);
            tracing::debug!(lane = K::NAME, %id, "cache miss");
            self.queues.download_requests.enqueue(request);
            return false;
        }

        match Self::load(storage, cipher, &mut request) {
            Ok(()) => {
                request.cache_hit = true;
                bump(&self.stats.cache_hits);
                tracing::debug!(lane = K::NAME, %id, "cache hit");
                self.queues.cache_output().enqueue(request);
                false
            }
            Err(error) => {
                bump(&self.stats.cache_failures);
                tracing::warn!(lane = K::NAME, %id, %error, "cache load failed, downloading instead");
                if let Err(error) = storage.remove(id) {
                    tracing::warn!(lane = K::NAME, %id, %error, "could not remove bad cache entry");
                }
                self.queues.download_requests.enqueue(request);
                true
            }
        }
    }

    fn load(
        storage: &dyn CacheStorage,
        cipher: &dyn CacheCipher,
        request: &mut AssetRequest<K>,
    ) -> CacheResult<()> {
        let blob = storage.read(request.id)?;
        let payload = open_payload(cipher, &blob)?;
        K::restore_cached(request, payload)
    }

    fn store_one(&self, storage: &dyn CacheStorage, cipher: &dyn CacheCipher) {
        let Some(request) = self.queues.to_cache.try_dequeue() else {
            return;
        };
        let id = request.id;

        if !storage.exists(id) {
            match Self::store(storage, cipher, &request) {
                Ok(true) => {
                    bump(&self.stats.cache_stores);
                    tracing::debug!(lane = K::NAME, %id, "cached");
                }
                Ok(false) => {}
                Err(error) => {
                    bump(&self.stats.cache_failures);
                    tracing::warn!(lane = K::NAME, %id, %error, "cache store failed");
                }
            }
        }

        self.queues.cache_output().enqueue(request);
    }

    fn store(
        storage: &dyn CacheStorage,
        cipher: &dyn CacheCipher,
        request: &AssetRequest<K>,
    ) -> CacheResult<bool> {
        let Some(payload) = K::cache_payload(request)? else {
            return Ok(false);
        };
        let blob = seal_payload(cipher, &payload)?;
        Ok(storage.write_new(request.id, &blob)?)
    }
}

impl<K: AssetKind> Stage for CacheStage<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_work(&self) -> WorkResult {
        match &self.mode {
            CacheMode::PassThrough => Ok(self.pass_through()),
            CacheMode::Caching { storage, cipher } => {
                let load_failed = self.load_one(storage.as_ref(), cipher.as_ref());
                self.store_one(storage.as_ref(), cipher.as_ref());
                Ok(load_failed || self.has_pending_input())
            }
        }
    }

    fn output_backlogged(&self) -> bool {
        self.queues.backlogged()
    }

    fn has_pending_input(&self) -> bool {
        !self.queues.requests.is_empty() || !self.queues.to_cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetId, Mesh};
    use crate::crypto::AesGcmCipher;
    use crate::storage::MemoryCacheStorage;
    use crate::texture::{DecodedTexture, PixelFormat, Texture};
    use assetflow_codecs::MeshParams;

    fn caching<K: AssetKind>(storage: &Arc<MemoryCacheStorage>) -> (CacheStage<K>, Arc<LaneQueues<K>>) {
        let queues = Arc::new(LaneQueues::<K>::new(0));
        let mode = CacheMode::Caching {
            storage: storage.clone(),
            cipher: Arc::new(AesGcmCipher::from_passphrase("test")),
        };
        (CacheStage::new(queues.clone(), mode, Arc::default()), queues)
    }

    fn mesh_request(id: u128) -> AssetRequest<Mesh> {
        AssetRequest::new(AssetId::from_u128(id), None, MeshParams::default())
    }

    #[test]
    fn test_pass_through_moves_one_of_each() {
        let queues = Arc::new(LaneQueues::<Mesh>::new(0));
        let stage = CacheStage::new(queues.clone(), CacheMode::PassThrough, Arc::default());
        assert!(!stage.is_caching());

        queues.requests.enqueue(mesh_request(1));
        queues.requests.enqueue(mesh_request(2));
        queues.to_cache.enqueue(mesh_request(3));

        assert!(stage.do_work().unwrap());
        assert_eq!(queues.download_requests.count(), 1);
        assert_eq!(queues.to_decode.count(), 1);

        assert!(!stage.do_work().unwrap());
        assert_eq!(queues.download_requests.count(), 2);
        assert!(queues.requests.is_empty());
    }

    #[test]
    fn test_miss_then_store_then_hit() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let (stage, queues) = caching::<Mesh>(&storage);

        queues.requests.enqueue(mesh_request(7));
        stage.do_work().unwrap();
        let mut request = queues.download_requests.try_dequeue().unwrap();
        assert_eq!(stage.stats.snapshot().cache_misses, 1);

        let payload: Vec<u8> = (0..=255).cycle().take(5000).collect();
        request.raw = Some(payload.clone());
        queues.to_cache.enqueue(request);
        stage.do_work().unwrap();
        assert_eq!(storage.len(), 1);
        let stored = queues.to_decode.try_dequeue().unwrap();
        assert!(!stored.cache_hit);

        queues.requests.enqueue(mesh_request(7));
        stage.do_work().unwrap();
        let hit = queues.to_decode.try_dequeue().unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.raw, Some(payload));
        assert_eq!(stage.stats.snapshot().cache_hits, 1);
        assert!(queues.download_requests.is_empty());
    }

    #[test]
    fn test_existing_entry_is_not_rewritten() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let (stage, queues) = caching::<Mesh>(&storage);
        storage.insert(AssetId::from_u128(1), vec![9]);

        let mut request = mesh_request(1);
        request.raw = Some(vec![1, 2, 3]);
        queues.to_cache.enqueue(request);
        stage.do_work().unwrap();

        assert_eq!(storage.read(AssetId::from_u128(1)).unwrap(), vec![9]);
        assert_eq!(queues.to_decode.count(), 1);
        assert_eq!(stage.stats.snapshot().cache_stores, 0);
    }

    #[test]
    fn test_corrupt_entry_falls_back_to_download() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let (stage, queues) = caching::<Mesh>(&storage);
        storage.insert(AssetId::from_u128(4), vec![0; 64]);

        queues.requests.enqueue(mesh_request(4));
        assert!(stage.do_work().unwrap());

        let request = queues.download_requests.try_dequeue().unwrap();
        assert!(request.raw.is_none());
        assert_eq!(stage.stats.snapshot().cache_failures, 1);
        assert!(!storage.exists(AssetId::from_u128(4)));
    }

    #[test]
    fn test_corrupt_entry_is_rewritten_after_download() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let (stage, queues) = caching::<Mesh>(&storage);
        let id = AssetId::from_u128(8);
        storage.insert(id, vec![0xEE; 48]);

        queues.requests.enqueue(mesh_request(8));
        stage.do_work().unwrap();
        let mut request = queues.download_requests.try_dequeue().unwrap();

        let payload = vec![42u8; 300];
        request.raw = Some(payload.clone());
        queues.to_cache.enqueue(request);
        stage.do_work().unwrap();
        queues.to_decode.try_dequeue().unwrap();
        assert_eq!(stage.stats.snapshot().cache_stores, 1);

        queues.requests.enqueue(mesh_request(8));
        stage.do_work().unwrap();
        let hit = queues.to_decode.try_dequeue().unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.raw, Some(payload));
        assert_eq!(stage.stats.snapshot().cache_failures, 1);
        assert!(queues.download_requests.is_empty());
    }

    #[test]
    fn test_texture_hit_skips_decode() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let (stage, queues) = caching::<Texture>(&storage);
        let texture = DecodedTexture {
            width: 1,
            height: 1,
            format: PixelFormat::R8,
            pixels: vec![200],
        };

        let mut decoded = AssetRequest::<Texture>::new(AssetId::from_u128(5), None, ());
        decoded.decoded = Some(texture.clone());
        queues.to_cache.enqueue(decoded);
        stage.do_work().unwrap();
        assert_eq!(queues.ready.count(), 1);

        queues.requests.enqueue(AssetRequest::new(AssetId::from_u128(5), None, ()));
        stage.do_work().unwrap();
        assert_eq!(queues.ready.count(), 2);
        queues.ready.try_dequeue().unwrap();
        let hit = queues.ready.try_dequeue().unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.decoded, Some(texture));
        assert!(queues.to_decode.is_empty());
    }

    #[test]
    fn test_pauses_only_on_full_ready_queue() {
        let queues = Arc::new(LaneQueues::<Mesh>::new(1));
        let stage = CacheStage::new(queues.clone(), CacheMode::PassThrough, Arc::default());
        assert!(!stage.output_backlogged());

        queues.download_requests.enqueue(mesh_request(1));
        queues.to_decode.enqueue(mesh_request(2));
        assert!(!stage.output_backlogged());

        queues.ready.enqueue(mesh_request(3));
        assert!(stage.output_backlogged());
    }
}
