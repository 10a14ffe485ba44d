//! # Lane Stages
//!
//! The three [`Stage`](assetflow_core::Stage) implementations every lane runs.
//! Each unit of work moves at most one item per input queue.

pub mod cache;
pub mod decode;
pub mod download;

pub use cache::{CacheMode, CacheStage};
pub use decode::{AnimationDecoder, AssetDecoder, DecodeFailure, DecodeStage, MeshDecoder, TextureDecoder};
pub use download::{DownloadStage, FetchFuture, Fetcher, InFlight};
