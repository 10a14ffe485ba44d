//! # ASSETFLOW Demo
//!
//! Runs the pipeline against an in-memory asset server.
//!
//! ```text
//! assetflow_demo [config.toml]
//! RUST_LOG=debug assetflow_demo
//! ```
//!
//! Without a config file every lane caches under the system temp directory.
//! Each asset is requested twice; the second pass is served from the cache.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use assetflow_codecs::mesh::FaceData;
use assetflow_codecs::{
    AnimationCodec, AnimationHeader, DecodedAnimation, JointMotion, Keyframe, LodLevel,
    MeshBuilder, MeshParams,
};
use assetflow_pipeline::{
    AssetId, AssetKind, AssetPipeline, AssetServices, DecodedTexture, FetchError, FetchFuture,
    Fetcher, Lane, PipelineConfig, PixelFormat, RawTextureCodec,
};
use tracing_subscriber::EnvFilter;

const MESH_ID: u128 = 0x6d65_7368;
const TEXTURE_ID: u128 = 0x7465_7874;
const ANIMATION_ID: u128 = 0x616e_696d;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves fixed byte blobs after a short simulated latency.
#[derive(Clone)]
struct MemoryFetcher {
    assets: Arc<HashMap<AssetId, Vec<u8>>>,
    latency: Duration,
}

impl<K: AssetKind> Fetcher<K> for MemoryFetcher {
    fn fetch(&self, id: AssetId) -> FetchFuture {
        let bytes = self.assets.get(&id).cloned();
        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            bytes.ok_or(FetchError::NotFound(id))
        })
    }
}

fn demo_mesh() -> Result<Vec<u8>, Box<dyn Error>> {
    let quad = FaceData {
        positions: vec![
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ],
        normals: Some(vec![[0.0, 0.0, 1.0]; 4]),
        uvs: Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
        indices: vec![0, 1, 2, 0, 2, 3],
        influences: None,
    };
    Ok(MeshBuilder::new()
        .with_lod(LodLevel::High, vec![quad.clone()])
        .with_lod(LodLevel::Low, vec![quad])
        .build()?)
}

fn demo_texture() -> Vec<u8> {
    let pixels = (0..16u8).flat_map(|i| [i * 16, 255 - i * 16, 128, 255]).collect();
    RawTextureCodec::encode(&DecodedTexture {
        width: 4,
        height: 4,
        format: PixelFormat::Rgba8,
        pixels,
    })
}

fn demo_animation() -> Result<Vec<u8>, Box<dyn Error>> {
    let duration = 2.0;
    let animation = DecodedAnimation {
        header: AnimationHeader {
            base_priority: 3,
            duration,
            emote_name: "smile".to_string(),
            loop_out_point: duration,
            looping: true,
            ..AnimationHeader::default()
        },
        joints: vec![JointMotion {
            name: "head".to_string(),
            priority: 3,
            rotation_keys: vec![
                Keyframe::from_rotation(0.0, duration, [0.0, 0.0, 0.0, 1.0]),
                Keyframe::from_rotation(1.0, duration, [0.0, 0.383, 0.0, 0.924]),
                Keyframe::from_rotation(2.0, duration, [0.0, 0.0, 0.0, 1.0]),
            ],
            position_keys: vec![Keyframe::from_position(0.0, duration, [0.0, 0.0, 0.1])],
        }],
        constraints: Vec::new(),
    };
    Ok(AnimationCodec::encode(&animation)?)
}

fn init_logging() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Waits until `lane` produced `expected` items or the timeout passed.
fn drain<K: AssetKind>(lane: &Lane<K>, expected: usize) -> usize {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    let mut received = 0;
    while received < expected && Instant::now() < deadline {
        match lane.try_next_ready() {
            Some(item) => {
                received += 1;
                tracing::info!(
                    lane = K::NAME,
                    id = %item.id,
                    bytes = item.raw_len(),
                    decoded = item.is_decoded(),
                    cache_hit = item.cache_hit,
                    "ready"
                );
            }
            None => std::thread::sleep(Duration::from_millis(5)),
        }
    }
    received
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default()
            .with_caching(std::env::temp_dir().join("assetflow-demo"), "demo"),
    };

    let mut assets = HashMap::new();
    assets.insert(AssetId::from_u128(MESH_ID), demo_mesh()?);
    assets.insert(AssetId::from_u128(TEXTURE_ID), demo_texture());
    assets.insert(AssetId::from_u128(ANIMATION_ID), demo_animation()?);
    let fetcher = MemoryFetcher {
        assets: Arc::new(assets),
        latency: Duration::from_millis(20),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let services = AssetServices::new(
        Arc::new(fetcher.clone()),
        Arc::new(fetcher.clone()),
        Arc::new(fetcher),
    );
    let pipeline = AssetPipeline::new(&config, services, runtime.handle())?;

    for pass in 1..=2 {
        tracing::info!(pass, "requesting assets");
        pipeline.request_mesh(
            AssetId::from_u128(MESH_ID),
            None,
            MeshParams::for_lods(&[LodLevel::High, LodLevel::Low]),
        );
        pipeline.request_texture(AssetId::from_u128(TEXTURE_ID), None);
        pipeline.request_animation(AssetId::from_u128(ANIMATION_ID), None);

        let received = drain(pipeline.mesh(), 1)
            + drain(pipeline.texture(), 1)
            + drain(pipeline.animation(), 1);
        if received < 3 {
            tracing::warn!(pass, received, "timed out waiting for assets");
        }
    }

    for (lane, stats) in [
        ("mesh", pipeline.mesh().stats()),
        ("texture", pipeline.texture().stats()),
        ("animation", pipeline.animation().stats()),
    ] {
        tracing::info!(
            lane,
            requested = stats.requested,
            cache_hits = stats.cache_hits,
            downloads = stats.downloads_completed,
            decoded = stats.decoded,
            "lane stats"
        );
    }

    pipeline.shutdown();
    Ok(())
}
