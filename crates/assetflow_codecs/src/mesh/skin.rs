//! Joint influences and the skin section.
//!
//! ```text
//! Influence stream, per vertex:
//! └── up to 4 × {joint u8, weight u16}   joint 0xFF ends the vertex early
//!
//! Skin section:
//! ├── joint_count u16
//! ├── joint × joint_count: name (NUL-terminated), inverse bind [f32; 16]
//! ├── flags u8
//! ├── bind shape matrix [f32; 16]                  (flag bit 0)
//! ├── pelvis offset [f32; 16]                      (flag bit 1)
//! └── alternate inverse bind [f32; 16] × joints    (flag bit 2)
//! ```

use crate::error::{MeshDecodeError, MeshResult};
use crate::quantize::U16_MAX_F;
use crate::reader::ByteReader;

use super::{SkinInfo, VertexWeights};

/// Joint byte that ends a vertex's influence list early.
pub const END_OF_INFLUENCES: u8 = 0xFF;

/// Influences stored per vertex at most.
pub const MAX_INFLUENCES: usize = 4;

pub(crate) const SKIN_BIND_SHAPE: u8 = 1 << 0;
pub(crate) const SKIN_PELVIS_OFFSET: u8 = 1 << 1;
pub(crate) const SKIN_ALT_INVERSE_BIND: u8 = 1 << 2;

/// Decodes an influence stream that must describe exactly `vertex_count`
/// vertices. Each vertex's weights are normalized to sum to one unless they
/// are all zero.
///
/// # Errors
///
/// Returns [`MeshDecodeError::WeightCountMismatch`] if the stream ends early
/// or has bytes left over, and a read error if it ends mid-entry.
pub fn decode_influences(
    stream: &[u8],
    vertex_count: usize,
    face: usize,
) -> MeshResult<Vec<VertexWeights>> {
    let mut reader = ByteReader::new(stream);
    let mut out = Vec::with_capacity(vertex_count);

    while out.len() < vertex_count && !reader.is_at_end() {
        let mut vertex = VertexWeights::default();
        let mut used = 0;
        while used < MAX_INFLUENCES {
            let joint = reader.read_u8()?;
            if joint == END_OF_INFLUENCES {
                break;
            }
            let raw = reader.read_u16()?;
            vertex.joints[used] = joint;
            vertex.weights[used] = f32::from(raw) / U16_MAX_F;
            used += 1;
        }
        // used <= MAX_INFLUENCES
        #[allow(clippy::cast_possible_truncation)]
        {
            vertex.count = used as u8;
        }
        vertex.normalize();
        out.push(vertex);
    }

    if out.len() != vertex_count || !reader.is_at_end() {
        return Err(MeshDecodeError::WeightCountMismatch {
            face,
            decoded: out.len(),
            expected: vertex_count,
        });
    }
    Ok(out)
}

/// Decodes the skin section.
pub(crate) fn decode_skin(section: &[u8]) -> MeshResult<SkinInfo> {
    let mut reader = ByteReader::new(section);
    let joint_count = usize::from(reader.read_u16()?);

    let mut joint_names = Vec::with_capacity(joint_count);
    let mut inverse_bind_matrices = Vec::with_capacity(joint_count);
    for _ in 0..joint_count {
        joint_names.push(reader.read_cstr()?.to_owned());
        inverse_bind_matrices.push(reader.read_f32_array::<16>()?);
    }

    let flags = reader.read_u8()?;

    let bind_shape_matrix = if flags & SKIN_BIND_SHAPE != 0 {
        Some(reader.read_f32_array::<16>()?)
    } else {
        None
    };

    let pelvis_offset = if flags & SKIN_PELVIS_OFFSET != 0 {
        Some(reader.read_f32_array::<16>()?)
    } else {
        None
    };

    let alt_inverse_bind_matrices = if flags & SKIN_ALT_INVERSE_BIND != 0 {
        let mut matrices = Vec::with_capacity(joint_count);
        for _ in 0..joint_count {
            matrices.push(reader.read_f32_array::<16>()?);
        }
        Some(matrices)
    } else {
        None
    };

    Ok(SkinInfo {
        joint_names,
        inverse_bind_matrices,
        alt_inverse_bind_matrices,
        bind_shape_matrix,
        pelvis_offset,
    })
}
