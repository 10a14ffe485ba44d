//! # ASSETFLOW Pipeline
//!
//! Acquires meshes, textures and animations by content id:
//! cache lookup, download on miss, decode, and hand-off on a ready queue.
//!
//! ```text
//! request ──> Cache ──miss──> Download ──> Cache(store) ──> Decode ──> ready
//!               └──────────── hit ─────────────┘
//! ```
//!
//! Each lane is a [`Lane<K>`](Lane) driven by three self-scaling workers from
//! `assetflow_core`. [`AssetPipeline`] bundles the three lanes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use assetflow_pipeline::{AssetPipeline, AssetServices, PipelineConfig};
//!
//! let config = PipelineConfig::load("assetflow.toml")?;
//! let pipeline = AssetPipeline::new(&config, services, runtime.handle())?;
//! pipeline.request_texture(id, None);
//! while let Some(texture) = pipeline.texture().try_next_ready() {
//!     upload(texture);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod asset;
pub mod config;
pub mod crypto;
pub mod error;
pub mod lane;
pub mod pipeline;
pub mod stages;
pub mod stats;
pub mod storage;
pub mod texture;
pub mod topology;

pub use asset::{Animation, AssetId, AssetKind, AssetRequest, CachePoint, Mesh, RequesterId};
pub use config::{CacheConfig, LaneConfig, PipelineConfig};
pub use crypto::{AesGcmCipher, CacheCipher};
pub use error::{
    CacheError, CacheResult, ConfigError, DecodeError, FetchError, PipelineError, PipelineResult,
    TextureDecodeError,
};
pub use lane::{Lane, LaneServices, LaneWorkerStats};
pub use pipeline::{AssetPipeline, AssetServices};
pub use stages::{AssetDecoder, CacheMode, FetchFuture, Fetcher};
pub use stats::LaneStatsSnapshot;
pub use storage::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use texture::{DecodedTexture, PixelFormat, RawTextureCodec, Texture, TextureCodec};
