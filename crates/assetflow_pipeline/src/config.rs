//! # Pipeline Configuration
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! [cache]
//! root = "cache"
//! passphrase = "change me"
//!
//! [mesh]
//! caching_enabled = true
//! max_ready_queue_depth = 64
//! download_concurrency = 0   # 0 = half the hardware threads, min 1
//!
//! [texture]
//! caching_enabled = true
//! cache_dir = "textures"     # relative to cache.root
//!
//! [animation]
//! caching_enabled = false
//! ```
//!
//! Every field has a default; an empty file is a valid config with caching
//! disabled.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Shared cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one subdirectory per lane.
    pub root: PathBuf,
    /// Key material for the cache cipher.
    pub passphrase: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cache"),
            passphrase: String::new(),
        }
    }
}

/// Per-lane tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Load from and store to the on-disk cache. Fixed for the lane's lifetime.
    pub caching_enabled: bool,
    /// Cache directory, relative to [`CacheConfig::root`]. Defaults to the lane name.
    pub cache_dir: Option<PathBuf>,
    /// Ready-queue depth at which stages pause. 0 disables backpressure.
    pub max_ready_queue_depth: usize,
    /// Cache stage concurrency. 1 keeps disk access serialized.
    pub cache_concurrency: usize,
    /// Download stage concurrency. 0 = auto.
    pub download_concurrency: usize,
    /// Decode stage concurrency. 0 = auto.
    pub decode_concurrency: usize,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            caching_enabled: false,
            cache_dir: None,
            max_ready_queue_depth: 64,
            cache_concurrency: 1,
            download_concurrency: 0,
            decode_concurrency: 0,
        }
    }
}

/// Whole-pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cache settings.
    pub cache: CacheConfig,
    /// Mesh lane.
    pub mesh: LaneConfig,
    /// Texture lane.
    pub texture: LaneConfig,
    /// Animation lane.
    pub animation: LaneConfig,
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML or inconsistent values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a lane caches without a passphrase.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.any_caching() && self.cache.passphrase.is_empty() {
            return Err(ConfigError::Invalid(
                "cache.passphrase must be set when a lane enables caching".into(),
            ));
        }
        Ok(())
    }

    /// Returns true if any lane caches.
    #[must_use]
    pub fn any_caching(&self) -> bool {
        [&self.mesh, &self.texture, &self.animation]
            .iter()
            .any(|lane| lane.caching_enabled)
    }

    /// Enables caching on every lane under `root` with the given passphrase.
    #[must_use]
    pub fn with_caching(mut self, root: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        self.cache.root = root.into();
        self.cache.passphrase = passphrase.into();
        for lane in [&mut self.mesh, &mut self.texture, &mut self.animation] {
            lane.caching_enabled = true;
        }
        self
    }

    /// Cache directory for a lane.
    #[must_use]
    pub fn lane_cache_dir(&self, lane_name: &str, lane: &LaneConfig) -> PathBuf {
        match &lane.cache_dir {
            Some(dir) => self.cache.root.join(dir),
            None => self.cache.root.join(lane_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(!config.any_caching());
        assert_eq!(config.mesh.cache_concurrency, 1);
        assert_eq!(config.mesh.download_concurrency, 0);
    }

    #[test]
    fn test_partial_tables() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [cache]
            root = "/var/cache/assets"
            passphrase = "hunter2"

            [texture]
            caching_enabled = true
            cache_dir = "tex"
            max_ready_queue_depth = 8
            "#,
        )
        .unwrap();

        assert!(config.texture.caching_enabled);
        assert!(!config.mesh.caching_enabled);
        assert_eq!(config.texture.max_ready_queue_depth, 8);
        assert_eq!(config.mesh.max_ready_queue_depth, 64);
        assert_eq!(
            config.lane_cache_dir("texture", &config.texture),
            PathBuf::from("/var/cache/assets/tex")
        );
        assert_eq!(
            config.lane_cache_dir("mesh", &config.mesh),
            PathBuf::from("/var/cache/assets/mesh")
        );
    }

    #[test]
    fn test_caching_requires_passphrase() {
        let err = PipelineConfig::from_toml_str("[animation]\ncaching_enabled = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = PipelineConfig::from_toml_str("[mesh]\nmax_ready_queue_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::load("/definitely/not/here/assetflow.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig::default().with_caching("c", "k");
        let text = toml::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }
}
