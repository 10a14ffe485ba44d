//! # Asset Pipeline
//!
//! Three lanes behind one facade, sharing a shutdown broadcast and a cache
//! cipher:
//!
//! ```text
//!                  ┌── Lane<Mesh>      ──> mesh().ready()
//! AssetPipeline ───┼── Lane<Texture>   ──> texture().ready()
//!                  └── Lane<Animation> ──> animation().ready()
//! ```
//!
//! Lanes are independent: a stuck or failing asset in one never affects the
//! other two.

use std::sync::Arc;

use assetflow_codecs::MeshParams;
use assetflow_core::ShutdownBroadcast;
use tokio::runtime::Handle;

use crate::asset::{Animation, AssetId, AssetKind, Mesh, RequesterId};
use crate::config::{LaneConfig, PipelineConfig};
use crate::crypto::{AesGcmCipher, CacheCipher};
use crate::error::{CacheError, ConfigError, PipelineResult};
use crate::lane::{Lane, LaneServices};
use crate::stages::{AnimationDecoder, AssetDecoder, CacheMode, Fetcher, MeshDecoder, TextureDecoder};
use crate::storage::DiskCacheStorage;
use crate::texture::{RawTextureCodec, Texture, TextureCodec};

/// External capabilities the pipeline consumes.
pub struct AssetServices {
    /// Mesh transport.
    pub mesh_fetcher: Arc<dyn Fetcher<Mesh>>,
    /// Texture transport.
    pub texture_fetcher: Arc<dyn Fetcher<Texture>>,
    /// Animation transport.
    pub animation_fetcher: Arc<dyn Fetcher<Animation>>,
    /// Image decoder.
    pub texture_codec: Arc<dyn TextureCodec>,
}

impl AssetServices {
    /// Services with the built-in [`RawTextureCodec`].
    #[must_use]
    pub fn new(
        mesh_fetcher: Arc<dyn Fetcher<Mesh>>,
        texture_fetcher: Arc<dyn Fetcher<Texture>>,
        animation_fetcher: Arc<dyn Fetcher<Animation>>,
    ) -> Self {
        Self {
            mesh_fetcher,
            texture_fetcher,
            animation_fetcher,
            texture_codec: Arc::new(RawTextureCodec),
        }
    }

    /// Replaces the image decoder.
    #[must_use]
    pub fn with_texture_codec(mut self, codec: Arc<dyn TextureCodec>) -> Self {
        self.texture_codec = codec;
        self
    }
}

/// The mesh, texture and animation lanes.
pub struct AssetPipeline {
    mesh: Lane<Mesh>,
    texture: Lane<Texture>,
    animation: Lane<Animation>,
    shutdown: ShutdownBroadcast,
}

impl AssetPipeline {
    /// Validates `config`, opens the cache directories of caching lanes and
    /// starts every worker on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config or an uncreatable cache
    /// directory.
    pub fn new(config: &PipelineConfig, services: AssetServices, runtime: &Handle) -> PipelineResult<Self> {
        config.validate()?;

        let cipher = config.any_caching().then(|| {
            Arc::new(AesGcmCipher::from_passphrase(&config.cache.passphrase)) as Arc<dyn CacheCipher>
        });
        let shutdown = ShutdownBroadcast::new();

        let mesh = Self::lane(
            config,
            &config.mesh,
            services.mesh_fetcher,
            Arc::new(MeshDecoder),
            cipher.as_ref(),
            runtime,
            &shutdown,
        )?;
        let texture = Self::lane(
            config,
            &config.texture,
            services.texture_fetcher,
            Arc::new(TextureDecoder::new(services.texture_codec)),
            cipher.as_ref(),
            runtime,
            &shutdown,
        )?;
        let animation = Self::lane(
            config,
            &config.animation,
            services.animation_fetcher,
            Arc::new(AnimationDecoder),
            cipher.as_ref(),
            runtime,
            &shutdown,
        )?;

        tracing::info!(
            cache_root = %config.cache.root.display(),
            caching = config.any_caching(),
            "asset pipeline started"
        );

        Ok(Self {
            mesh,
            texture,
            animation,
            shutdown,
        })
    }

    fn lane<K: AssetKind>(
        config: &PipelineConfig,
        lane: &LaneConfig,
        fetcher: Arc<dyn Fetcher<K>>,
        decoder: Arc<dyn AssetDecoder<K>>,
        cipher: Option<&Arc<dyn CacheCipher>>,
        runtime: &Handle,
        shutdown: &ShutdownBroadcast,
    ) -> PipelineResult<Lane<K>> {
        let cache = if lane.caching_enabled {
            let cipher = cipher
                .cloned()
                .ok_or_else(|| ConfigError::Invalid(format!("{} lane caches without a cipher", K::NAME)))?;
            let dir = config.lane_cache_dir(K::NAME, lane);
            let storage = DiskCacheStorage::open(&dir).map_err(CacheError::from)?;
            tracing::debug!(lane = K::NAME, dir = %dir.display(), "cache directory ready");
            CacheMode::Caching {
                storage: Arc::new(storage),
                cipher,
            }
        } else {
            CacheMode::PassThrough
        };

        Lane::new(
            lane,
            LaneServices {
                fetcher,
                decoder,
                cache,
            },
            runtime,
            shutdown,
        )
    }

    /// Requests a mesh.
    pub fn request_mesh(&self, id: AssetId, requester: Option<RequesterId>, params: MeshParams) {
        self.mesh.request_with(id, requester, params);
    }

    /// Requests a texture.
    pub fn request_texture(&self, id: AssetId, requester: Option<RequesterId>) {
        self.texture.request(id, requester);
    }

    /// Requests an animation.
    pub fn request_animation(&self, id: AssetId, requester: Option<RequesterId>) {
        self.animation.request(id, requester);
    }

    /// Mesh lane.
    #[must_use]
    pub fn mesh(&self) -> &Lane<Mesh> {
        &self.mesh
    }

    /// Texture lane.
    #[must_use]
    pub fn texture(&self) -> &Lane<Texture> {
        &self.texture
    }

    /// Animation lane.
    #[must_use]
    pub fn animation(&self) -> &Lane<Animation> {
        &self.animation
    }

    /// Stops every worker. Running units finish; nothing new starts and
    /// outstanding fetches are discarded. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.fire() {
            tracing::info!("asset pipeline shut down");
        }
    }

    /// Returns true once [`shutdown`](Self::shutdown) ran.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_fired()
    }
}

impl Drop for AssetPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
