//! Integration tests for requests flowing through a lane.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use assetflow_codecs::mesh::FaceData;
use assetflow_codecs::{
    AnimationCodec, AnimationHeader, DecodedAnimation, JointMotion, Keyframe, LodLevel,
    MeshBuilder, MeshParams,
};
use assetflow_core::ShutdownBroadcast;
use assetflow_pipeline::stages::{AnimationDecoder, AssetDecoder, MeshDecoder, TextureDecoder};
use assetflow_pipeline::{
    AesGcmCipher, Animation, AssetId, AssetKind, CacheMode, DecodedTexture, FetchError,
    FetchFuture, Fetcher, Lane, LaneConfig, LaneServices, MemoryCacheStorage, Mesh, PixelFormat,
    RawTextureCodec, Texture,
};
use rand::Rng;

/// Serves a fixed blob per id; unknown ids fail.
struct TableFetcher {
    assets: HashMap<AssetId, Vec<u8>>,
}

impl<K: AssetKind> Fetcher<K> for TableFetcher {
    fn fetch(&self, id: AssetId) -> FetchFuture {
        let bytes = self.assets.get(&id).cloned();
        Box::pin(async move { bytes.ok_or(FetchError::NotFound(id)) })
    }
}

/// Like [`TableFetcher`], but every fetch takes 5 to 35 ms.
struct SlowFetcher {
    assets: HashMap<AssetId, Vec<u8>>,
}

impl<K: AssetKind> Fetcher<K> for SlowFetcher {
    fn fetch(&self, id: AssetId) -> FetchFuture {
        let bytes = self.assets.get(&id).cloned();
        let latency = Duration::from_millis(rand::thread_rng().gen_range(5..35));
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            bytes.ok_or(FetchError::NotFound(id))
        })
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn triangle_mesh() -> Vec<u8> {
    let face = FaceData {
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
        uvs: Some(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
        indices: vec![0, 1, 2],
        influences: None,
    };
    MeshBuilder::new()
        .with_lod(LodLevel::High, vec![face])
        .build()
        .unwrap()
}

fn wave_animation() -> Vec<u8> {
    let animation = DecodedAnimation {
        header: AnimationHeader {
            duration: 1.0,
            ..AnimationHeader::default()
        },
        joints: vec![JointMotion {
            name: "wrist".to_string(),
            priority: 1,
            rotation_keys: vec![
                Keyframe::from_rotation(0.0, 1.0, [0.0, 0.0, 0.0, 1.0]),
                Keyframe::from_rotation(1.0, 1.0, [0.0, 0.0, 0.707, 0.707]),
            ],
            position_keys: Vec::new(),
        }],
        constraints: Vec::new(),
    };
    AnimationCodec::encode(&animation).unwrap()
}

fn small_texture(seed: u8) -> Vec<u8> {
    RawTextureCodec::encode(&DecodedTexture {
        width: 2,
        height: 2,
        format: PixelFormat::Rgba8,
        pixels: vec![seed; 16],
    })
}

fn caching_lane<K: AssetKind>(
    rt: &tokio::runtime::Runtime,
    shutdown: &ShutdownBroadcast,
    decoder: Arc<dyn AssetDecoder<K>>,
    assets: HashMap<AssetId, Vec<u8>>,
) -> Lane<K> {
    let config = LaneConfig {
        caching_enabled: true,
        max_ready_queue_depth: 2,
        ..LaneConfig::default()
    };
    let services = LaneServices {
        fetcher: Arc::new(SlowFetcher { assets }),
        decoder,
        cache: CacheMode::Caching {
            storage: Arc::new(MemoryCacheStorage::new()),
            cipher: Arc::new(AesGcmCipher::from_passphrase("lane-flow")),
        },
    };
    Lane::new(&config, services, rt.handle(), shutdown).unwrap()
}

/// Requests two batches against a shallow ready queue, the second after the
/// lane has had time to pause, and drains until every id came out.
fn assert_two_batches_complete<K: AssetKind>(lane: &Lane<K>, ids: &[AssetId]) {
    let (first, second) = ids.split_at(ids.len() / 2);
    for id in first {
        lane.request(*id, None);
    }
    std::thread::sleep(Duration::from_millis(300));
    for id in second {
        lane.request(*id, None);
    }

    let mut received = Vec::new();
    let done = wait_until(Duration::from_secs(10), || {
        while let Some(item) = lane.try_next_ready() {
            received.push(item.id);
        }
        received.len() == ids.len()
    });
    assert!(
        done,
        "received {} of {} items, {} still queued",
        received.len(),
        ids.len(),
        lane.queues().queued()
    );

    let mut expected = ids.to_vec();
    expected.sort();
    received.sort();
    assert_eq!(received, expected);
    assert_eq!(lane.in_flight_count(), 0);
}

fn mesh_lane(
    rt: &tokio::runtime::Runtime,
    shutdown: &ShutdownBroadcast,
    assets: HashMap<AssetId, Vec<u8>>,
) -> Lane<Mesh> {
    let services = LaneServices {
        fetcher: Arc::new(TableFetcher { assets }),
        decoder: Arc::new(MeshDecoder),
        cache: CacheMode::PassThrough,
    };
    Lane::new(&LaneConfig::default(), services, rt.handle(), shutdown).unwrap()
}

fn animation_lane(
    rt: &tokio::runtime::Runtime,
    shutdown: &ShutdownBroadcast,
    config: &LaneConfig,
    assets: HashMap<AssetId, Vec<u8>>,
) -> Lane<Animation> {
    let services = LaneServices {
        fetcher: Arc::new(TableFetcher { assets }),
        decoder: Arc::new(AnimationDecoder),
        cache: CacheMode::PassThrough,
    };
    Lane::new(config, services, rt.handle(), shutdown).unwrap()
}

#[test]
fn test_request_reaches_ready_without_caching() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let id = AssetId::from_u128(0x1234);
    let bytes = triangle_mesh();
    let n = bytes.len();
    let lane = mesh_lane(&rt, &shutdown, HashMap::from([(id, bytes)]));

    lane.request_with(id, None, MeshParams::default());
    assert!(wait_until(Duration::from_secs(5), || lane.ready().count() == 1));

    let item = lane.try_next_ready().unwrap();
    assert_eq!(item.id, id);
    assert_eq!(item.raw_len(), n);
    assert!(!item.cache_hit);
    let mesh = item.decoded.unwrap();
    assert_eq!(mesh.lod(LodLevel::High).unwrap().faces.len(), 1);

    let stats = lane.stats();
    assert_eq!(stats.requested, 1);
    assert_eq!(stats.downloads_completed, 1);
    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.cache_hits + stats.cache_misses, 0);
}

#[test]
fn test_failed_fetch_never_reaches_ready() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let lane = mesh_lane(&rt, &shutdown, HashMap::new());
    let id = AssetId::from_u128(0x5959);

    lane.request(id, None);
    assert!(wait_until(Duration::from_secs(5), || lane.stats().downloads_failed == 1));

    std::thread::sleep(Duration::from_millis(50));
    assert!(lane.ready().is_empty());
    assert!(!lane.is_in_flight(id));
    assert_eq!(lane.in_flight_count(), 0);
    assert_eq!(lane.queues().queued(), 0);
}

#[test]
fn test_duplicate_requests_are_not_merged() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let id = AssetId::from_u128(7);
    let lane = mesh_lane(&rt, &shutdown, HashMap::from([(id, triangle_mesh())]));

    lane.request(id, None);
    lane.request(id, None);
    assert!(wait_until(Duration::from_secs(5), || lane.ready().count() == 2));
    assert_eq!(lane.stats().downloads_started, 2);
}

#[test]
fn test_nil_id_is_dropped() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let lane = mesh_lane(&rt, &shutdown, HashMap::new());

    lane.request(AssetId::nil(), None);
    assert!(wait_until(Duration::from_secs(5), || lane.stats().invalid_ids == 1));
    assert_eq!(lane.stats().downloads_started, 0);
}

#[test]
fn test_malformed_animation_is_dropped_and_lane_keeps_going() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let bad = AssetId::from_u128(1);
    let good = AssetId::from_u128(2);
    let assets = HashMap::from([(bad, vec![1, 0, 0, 0, 0xFF]), (good, wave_animation())]);
    let lane = animation_lane(&rt, &shutdown, &LaneConfig::default(), assets);

    lane.request(bad, None);
    assert!(wait_until(Duration::from_secs(5), || lane.stats().decode_failures == 1));

    lane.request(good, None);
    assert!(wait_until(Duration::from_secs(5), || lane.ready().count() == 1));

    let item = lane.try_next_ready().unwrap();
    assert_eq!(item.id, good);
    assert_eq!(item.decoded.unwrap().joints[0].rotation_keys.len(), 2);
    assert_eq!(lane.stats().decode_failures, 1);
    assert!(lane.worker_stats().decode.unit_errors >= 1);
}

#[test]
fn test_full_ready_queue_pauses_and_draining_resumes() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let config = LaneConfig {
        max_ready_queue_depth: 2,
        download_concurrency: 1,
        decode_concurrency: 1,
        ..LaneConfig::default()
    };
    let ids: Vec<AssetId> = (1..=10).map(AssetId::from_u128).collect();
    let assets = ids.iter().map(|id| (*id, wave_animation())).collect();
    let lane = animation_lane(&rt, &shutdown, &config, assets);

    for id in &ids {
        lane.request(*id, None);
    }
    assert!(wait_until(Duration::from_secs(5), || lane.ready().count() >= 2));
    std::thread::sleep(Duration::from_millis(100));

    // Counts are advisory, so allow one in-flight unit of overshoot.
    assert!(lane.ready().count() <= 3);
    assert!(lane.stats().decoded < 10);

    let mut received = Vec::new();
    let done = wait_until(Duration::from_secs(10), || {
        while let Some(item) = lane.try_next_ready() {
            received.push(item.id);
        }
        received.len() == ids.len()
    });
    assert!(done, "received only {} items", received.len());
    received.sort();
    assert_eq!(received, ids);
}

#[test]
fn test_caching_raw_bytes_lane_under_backpressure_delivers_every_request() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let ids: Vec<AssetId> = (1..=40).map(AssetId::from_u128).collect();
    let assets = ids.iter().map(|id| (*id, wave_animation())).collect();
    let lane = caching_lane::<Animation>(&rt, &shutdown, Arc::new(AnimationDecoder), assets);

    assert_two_batches_complete(&lane, &ids);
    let stats = lane.stats();
    assert_eq!(stats.cache_misses, 40);
    assert_eq!(stats.cache_stores, 40);
    assert_eq!(stats.decoded, 40);
}

#[test]
fn test_caching_texture_lane_under_backpressure_delivers_every_request() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let ids: Vec<AssetId> = (1..=40).map(AssetId::from_u128).collect();
    let assets = ids
        .iter()
        .zip(0u8..)
        .map(|(id, seed)| (*id, small_texture(seed)))
        .collect();
    let decoder = Arc::new(TextureDecoder::new(Arc::new(RawTextureCodec)));
    let lane = caching_lane::<Texture>(&rt, &shutdown, decoder, assets);

    assert_two_batches_complete(&lane, &ids);
    let stats = lane.stats();
    assert_eq!(stats.cache_stores, 40);
    assert_eq!(stats.decoded, 40);
}

#[test]
fn test_shutdown_stops_new_work() {
    let rt = runtime();
    let shutdown = ShutdownBroadcast::new();
    let id = AssetId::from_u128(3);
    let lane = mesh_lane(&rt, &shutdown, HashMap::from([(id, triangle_mesh())]));

    assert!(shutdown.fire());
    lane.request(id, None);
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(lane.queues().requests.count(), 1);
    assert!(lane.ready().is_empty());
    assert_eq!(lane.stats().downloads_started, 0);
}
