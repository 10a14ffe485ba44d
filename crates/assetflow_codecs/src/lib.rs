//! # ASSETFLOW Codecs
//!
//! Decoders for the binary asset formats carried by the pipeline:
//! - [`mesh`]: quantized multi-LOD meshes with optional skinning
//! - [`animation`]: keyframed joint animations with constraints
//!
//! Both decoders are pure functions over a byte slice. Hostile input yields
//! an error, never a panic or an unbounded allocation.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod animation;
pub mod error;
pub mod mesh;
pub mod quantize;
pub mod reader;

pub use animation::{
    AnimationCodec, AnimationHeader, DecodedAnimation, HandPose, JointConstraint, JointMotion,
    Keyframe,
};
pub use error::{
    AnimationDecodeError, AnimationResult, EncodeError, MeshDecodeError, MeshResult, ReadError,
};
pub use mesh::{
    DecodedFace, DecodedLod, DecodedMesh, LodLevel, MappingMode, MeshBuilder, MeshCodec,
    MeshParams, SkinInfo, TextureEntry, VertexWeights,
};
pub use reader::ByteReader;
