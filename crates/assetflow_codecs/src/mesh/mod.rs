//! # Mesh Codec
//!
//! Decoder for the quantized, optionally rigged mesh container.
//!
//! ## Container Layout
//!
//! ```text
//! Mesh container (little-endian):
//! ├── "AFMS" (4 bytes) - Magic number
//! ├── Version (2 bytes) - Container version (1)
//! ├── Flags (2 bytes) - bit 0: skin section present
//! ├── LOD table - 4 × {offset u32, size u32} (Lowest, Low, Medium, High)
//! ├── Skin entry - {offset u32, size u32}
//! ├── LOD sections - faces of quantized vertices
//! └── Skin section - joints, inverse bind matrices, optional transforms
//! ```
//!
//! Vertex positions, normals and texture coordinates are 16-bit values
//! mapped linearly onto a per-face domain. Per-vertex joint influences are a
//! byte stream of up to four `(joint u8, weight u16)` entries per vertex,
//! ended early by `0xFF`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assetflow_codecs::mesh::{LodLevel, MeshCodec, MeshParams};
//!
//! let params = MeshParams::for_lods(&[LodLevel::High, LodLevel::Low]);
//! let mesh = MeshCodec::decode(&bytes, &params)?;
//! ```
//!
//! Each requested level of detail decodes independently: one that fails is
//! logged and left out of the result rather than failing the whole mesh.

mod container;
mod encode;
mod geometry;
mod skin;
mod uv;

pub use container::{MeshHeader, SectionRef, MESH_HEADER_LEN, MESH_MAGIC, MESH_VERSION};
pub use encode::{FaceData, MeshBuilder, SkinData};
pub use skin::{decode_influences, END_OF_INFLUENCES, MAX_INFLUENCES};
pub use uv::{apply_texture_transform, planar_projection};

use crate::error::{MeshDecodeError, MeshResult};

/// Level of detail stored in a mesh container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LodLevel {
    /// Coarsest geometry.
    Lowest = 0,
    /// Low detail.
    Low = 1,
    /// Medium detail.
    Medium = 2,
    /// Full detail.
    High = 3,
}

impl LodLevel {
    /// Every level, coarsest first (container table order).
    pub const ALL: [LodLevel; 4] = [Self::Lowest, Self::Low, Self::Medium, Self::High];

    /// Position in the container's LOD table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Section name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lowest => "lowest_lod",
            Self::Low => "low_lod",
            Self::Medium => "medium_lod",
            Self::High => "high_lod",
        }
    }
}

/// How a face's texture coordinates are generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MappingMode {
    /// Use the decoded coordinates.
    #[default]
    Default,
    /// Project from the vertex position along the dominant normal axis.
    Planar,
}

/// Per-face texture placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureEntry {
    /// Coordinate generation mode.
    pub mapping: MappingMode,
    /// Horizontal repeats.
    pub repeat_u: f32,
    /// Vertical repeats.
    pub repeat_v: f32,
    /// Horizontal offset.
    pub offset_u: f32,
    /// Vertical offset.
    pub offset_v: f32,
    /// Rotation in radians.
    pub rotation: f32,
}

impl Default for TextureEntry {
    fn default() -> Self {
        Self {
            mapping: MappingMode::Default,
            repeat_u: 1.0,
            repeat_v: 1.0,
            offset_u: 0.0,
            offset_v: 0.0,
            rotation: 0.0,
        }
    }
}

/// What to decode and how to place textures.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshParams {
    /// Levels of detail to decode.
    pub lods: Vec<LodLevel>,
    /// Object scale, used by planar projection.
    pub scale: [f32; 3],
    /// Texture entry per face; faces past the end use the default entry.
    pub texture_entries: Vec<TextureEntry>,
}

impl MeshParams {
    /// Parameters for the given levels with unit scale and default texturing.
    #[must_use]
    pub fn for_lods(lods: &[LodLevel]) -> Self {
        Self {
            lods: lods.to_vec(),
            ..Self::default()
        }
    }

    /// Texture entry for face `index`.
    #[must_use]
    pub fn texture_entry(&self, index: usize) -> TextureEntry {
        self.texture_entries.get(index).copied().unwrap_or_default()
    }
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            lods: vec![LodLevel::High],
            scale: [1.0, 1.0, 1.0],
            texture_entries: Vec::new(),
        }
    }
}

/// Joint influences on one vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VertexWeights {
    /// Joint indices; unused slots are 0.
    pub joints: [u8; 4],
    /// Weights; unused slots are 0.
    pub weights: [f32; 4],
    /// Number of used slots.
    pub count: u8,
}

impl VertexWeights {
    /// Scales the used weights so they sum to 1. A zero sum is left alone.
    pub fn normalize(&mut self) {
        let used = usize::from(self.count).min(MAX_INFLUENCES);
        let sum: f32 = self.weights[..used].iter().sum();
        if sum > 0.0 {
            for weight in &mut self.weights[..used] {
                *weight /= sum;
            }
        }
    }

    /// Sum of all four weights.
    #[must_use]
    pub fn total(&self) -> f32 {
        self.weights.iter().sum()
    }
}

/// One decoded face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedFace {
    /// Vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals, if stored.
    pub normals: Option<Vec<[f32; 3]>>,
    /// Final texture coordinates (after projection and transform).
    pub uvs: Vec<[f32; 2]>,
    /// Triangle list.
    pub indices: Vec<u16>,
    /// Joint influences, if stored.
    pub weights: Option<Vec<VertexWeights>>,
}

impl DecodedFace {
    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// All faces of one level of detail.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedLod {
    /// Which level this is.
    pub level: LodLevel,
    /// The faces.
    pub faces: Vec<DecodedFace>,
}

/// Skeleton binding data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinInfo {
    /// Joint names, indexed by the influence joint byte.
    pub joint_names: Vec<String>,
    /// One inverse bind matrix per joint (column-major).
    pub inverse_bind_matrices: Vec<[f32; 16]>,
    /// Alternate inverse bind matrices, one per joint.
    pub alt_inverse_bind_matrices: Option<Vec<[f32; 16]>>,
    /// Bind shape matrix.
    pub bind_shape_matrix: Option<[f32; 16]>,
    /// Pelvis offset transform.
    pub pelvis_offset: Option<[f32; 16]>,
}

/// Decoded mesh: the levels that decoded successfully plus skin data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedMesh {
    /// Successfully decoded levels, in request order.
    pub lods: Vec<DecodedLod>,
    /// Skeleton binding, if present and valid.
    pub skin: Option<SkinInfo>,
}

impl DecodedMesh {
    /// Returns the decoded level, if it was requested and decoded.
    #[must_use]
    pub fn lod(&self, level: LodLevel) -> Option<&DecodedLod> {
        self.lods.iter().find(|lod| lod.level == level)
    }

    /// Returns true when no level decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lods.is_empty()
    }
}

/// Mesh container decoder.
pub struct MeshCodec;

impl MeshCodec {
    /// Decodes the requested levels of detail and the skin section.
    ///
    /// # Errors
    ///
    /// Only a malformed container header is an error. Failed levels are
    /// logged and omitted; a malformed skin section is logged and dropped.
    pub fn decode(data: &[u8], params: &MeshParams) -> MeshResult<DecodedMesh> {
        let header = MeshHeader::parse(data)?;

        let mut lods = Vec::with_capacity(params.lods.len());
        for &level in &params.lods {
            match Self::decode_lod_with_header(data, &header, level, params) {
                Ok(lod) => lods.push(lod),
                Err(error) => {
                    tracing::warn!(lod = level.name(), %error, "mesh level of detail failed to decode");
                }
            }
        }

        let skin = match Self::decode_skin_with_header(data, &header) {
            Ok(skin) => skin,
            Err(error) => {
                tracing::warn!(%error, "mesh skin section failed to decode");
                None
            }
        };

        Ok(DecodedMesh { lods, skin })
    }

    /// Decodes one level of detail.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad header, a missing level or malformed faces.
    pub fn decode_lod(data: &[u8], level: LodLevel, params: &MeshParams) -> MeshResult<DecodedLod> {
        let header = MeshHeader::parse(data)?;
        Self::decode_lod_with_header(data, &header, level, params)
    }

    /// Decodes the skin section, if the container has one.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad header or a malformed skin section.
    pub fn decode_skin(data: &[u8]) -> MeshResult<Option<SkinInfo>> {
        let header = MeshHeader::parse(data)?;
        Self::decode_skin_with_header(data, &header)
    }

    fn decode_lod_with_header(
        data: &[u8],
        header: &MeshHeader,
        level: LodLevel,
        params: &MeshParams,
    ) -> MeshResult<DecodedLod> {
        let section = header.lods[level.index()].ok_or(MeshDecodeError::MissingLod(level))?;
        let bytes = section.slice(data, level.name())?;
        let faces = geometry::decode_faces(bytes, params)?;
        Ok(DecodedLod { level, faces })
    }

    fn decode_skin_with_header(data: &[u8], header: &MeshHeader) -> MeshResult<Option<SkinInfo>> {
        match header.skin {
            Some(section) => {
                let bytes = section.slice(data, "skin")?;
                skin::decode_skin(bytes).map(Some)
            }
            None => Ok(None),
        }
    }
}
