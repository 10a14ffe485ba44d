//! Face decoding for one LOD section.
//!
//! ```text
//! LOD section:
//! ├── face_count u16
//! └── face × face_count
//!     ├── vertex_count u16
//!     ├── position domain: min [f32; 3], max [f32; 3]
//!     ├── positions: [u16; 3] × vertex_count
//!     ├── attribute flags u8 (normals, uvs, weights)
//!     ├── normals: [u16; 3] × vertex_count          (domain [-1, 1])
//!     ├── uv domain min [f32; 2], max [f32; 2]
//!     │   + uvs: [u16; 2] × vertex_count
//!     ├── index_count u32 + indices: u16 × index_count
//!     └── weight stream length u32 + influence stream
//! ```

use crate::error::{MeshDecodeError, MeshResult};
use crate::quantize::{dequantize_vec2, dequantize_vec3};
use crate::reader::ByteReader;

use super::skin::decode_influences;
use super::uv::project_face_uvs;
use super::{DecodedFace, MeshParams};

pub(crate) const ATTR_NORMALS: u8 = 1 << 0;
pub(crate) const ATTR_UVS: u8 = 1 << 1;
pub(crate) const ATTR_WEIGHTS: u8 = 1 << 2;

pub(crate) const NORMAL_MIN: [f32; 3] = [-1.0, -1.0, -1.0];
pub(crate) const NORMAL_MAX: [f32; 3] = [1.0, 1.0, 1.0];

/// Decodes every face in a LOD section and applies texture placement.
pub(crate) fn decode_faces(section: &[u8], params: &MeshParams) -> MeshResult<Vec<DecodedFace>> {
    let mut reader = ByteReader::new(section);
    let face_count = usize::from(reader.read_u16()?);

    let mut faces = Vec::with_capacity(face_count);
    for index in 0..face_count {
        let mut face = decode_face(&mut reader, index)?;
        project_face_uvs(&mut face, &params.texture_entry(index), params.scale);
        faces.push(face);
    }
    Ok(faces)
}

fn decode_face(reader: &mut ByteReader<'_>, face: usize) -> MeshResult<DecodedFace> {
    let vertex_count = usize::from(reader.read_u16()?);

    let pos_min = reader.read_f32_array::<3>()?;
    let pos_max = reader.read_f32_array::<3>()?;
    let positions = read_vec3s(reader, vertex_count, pos_min, pos_max)?;

    let attributes = reader.read_u8()?;

    let normals = if attributes & ATTR_NORMALS != 0 {
        Some(read_vec3s(reader, vertex_count, NORMAL_MIN, NORMAL_MAX)?)
    } else {
        None
    };

    let uvs = if attributes & ATTR_UVS != 0 {
        let uv_min = reader.read_f32_array::<2>()?;
        let uv_max = reader.read_f32_array::<2>()?;
        let raw = reader.read_bytes(vertex_count * 4)?;
        raw.chunks_exact(4)
            .map(|c| {
                let q = [u16::from_le_bytes([c[0], c[1]]), u16::from_le_bytes([c[2], c[3]])];
                dequantize_vec2(q, uv_min, uv_max)
            })
            .collect()
    } else {
        vec![[0.0, 0.0]; vertex_count]
    };

    let index_count = reader.read_u32()? as usize;
    let raw = reader.read_bytes(index_count.saturating_mul(2))?;
    let indices: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    if let Some(&index) = indices.iter().find(|&&i| usize::from(i) >= vertex_count) {
        return Err(MeshDecodeError::IndexOutOfRange { face, index, vertex_count });
    }

    let weights = if attributes & ATTR_WEIGHTS != 0 {
        let len = reader.read_u32()? as usize;
        let stream = reader.read_bytes(len)?;
        Some(decode_influences(stream, vertex_count, face)?)
    } else {
        None
    };

    Ok(DecodedFace { positions, normals, uvs, indices, weights })
}

fn read_vec3s(
    reader: &mut ByteReader<'_>,
    count: usize,
    min: [f32; 3],
    max: [f32; 3],
) -> MeshResult<Vec<[f32; 3]>> {
    let raw = reader.read_bytes(count * 6)?;
    Ok(raw
        .chunks_exact(6)
        .map(|c| {
            let q = [
                u16::from_le_bytes([c[0], c[1]]),
                u16::from_le_bytes([c[2], c[3]]),
                u16::from_le_bytes([c[4], c[5]]),
            ];
            dequantize_vec3(q, min, max)
        })
        .collect())
}
