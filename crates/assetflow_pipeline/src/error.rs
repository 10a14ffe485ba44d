//! # Pipeline Error Types
//!
//! Errors raised while configuring lanes, touching the cache, fetching
//! and decoding assets.

use std::io;
use std::path::PathBuf;

use assetflow_codecs::{AnimationDecodeError, MeshDecodeError, ReadError};
use thiserror::Error;

use crate::asset::AssetId;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for [`PipelineConfig`](crate::PipelineConfig).
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values are well-formed but inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Cache errors. Never fatal to a lane.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem error.
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// A blob too short to hold a nonce and tag.
    #[error("cache blob of {0} bytes is truncated")]
    BlobTooShort(usize),

    /// Encryption failed.
    #[error("cache encryption failed")]
    Encrypt,

    /// Decryption failed: wrong key or tampered blob.
    #[error("cache blob failed authentication")]
    Authentication,

    /// The decrypted payload is not valid LZ4.
    #[error("cache payload failed to decompress: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// A decoded structure failed to (de)serialize.
    #[error("cache payload serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Transport errors reported by a [`Fetcher`](crate::Fetcher).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The remote has no such asset.
    #[error("asset {0} not found")]
    NotFound(AssetId),

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The fetch was abandoned.
    #[error("fetch cancelled")]
    Cancelled,
}

/// Errors from a [`TextureCodec`](crate::TextureCodec).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureDecodeError {
    /// Stream error.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Wrong magic number.
    #[error("not a texture container: bad magic {0:?}")]
    BadMagic([u8; 4]),

    /// Unknown pixel format tag.
    #[error("unknown pixel format {0}")]
    UnknownFormat(u8),

    /// Pixel data length does not match the dimensions.
    #[error("expected {expected} pixel bytes, found {actual}")]
    PixelLength {
        /// Bytes implied by width, height and format.
        expected: u64,
        /// Bytes present.
        actual: usize,
    },
}

/// Errors from the decode stage.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The request reached decoding without raw bytes.
    #[error("request has no raw payload to decode")]
    MissingPayload,

    /// Mesh container error.
    #[error(transparent)]
    Mesh(#[from] MeshDecodeError),

    /// Animation stream error.
    #[error(transparent)]
    Animation(#[from] AnimationDecodeError),

    /// Texture error.
    #[error(transparent)]
    Texture(#[from] TextureDecodeError),
}

/// Errors raised while building a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cache setup error.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type for pipeline construction.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
