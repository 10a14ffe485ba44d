//! Mesh container writer.
//!
//! Produces containers the decoder reads back. Used by tests, benches and
//! the demo asset server.

use crate::error::EncodeError;
use crate::quantize::quantize_u16;

use super::container::{FLAG_SKIN, MESH_HEADER_LEN, MESH_MAGIC, MESH_VERSION};
use super::geometry::{ATTR_NORMALS, ATTR_UVS, ATTR_WEIGHTS, NORMAL_MAX, NORMAL_MIN};
use super::skin::{
    END_OF_INFLUENCES, MAX_INFLUENCES, SKIN_ALT_INVERSE_BIND, SKIN_BIND_SHAPE, SKIN_PELVIS_OFFSET,
};
use super::LodLevel;

/// Unquantized geometry for one face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceData {
    /// Vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals.
    pub normals: Option<Vec<[f32; 3]>>,
    /// Texture coordinates.
    pub uvs: Option<Vec<[f32; 2]>>,
    /// Triangle list.
    pub indices: Vec<u16>,
    /// Per-vertex `(joint, weight)` lists. Entries past the fourth and
    /// joints equal to `0xFF` are not encodable and are skipped.
    pub influences: Option<Vec<Vec<(u8, f32)>>>,
}

/// Unencoded skin section.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinData {
    /// Joint names.
    pub joint_names: Vec<String>,
    /// One inverse bind matrix per joint.
    pub inverse_bind_matrices: Vec<[f32; 16]>,
    /// Optional alternate inverse bind matrices, one per joint.
    pub alt_inverse_bind_matrices: Option<Vec<[f32; 16]>>,
    /// Optional bind shape matrix.
    pub bind_shape_matrix: Option<[f32; 16]>,
    /// Optional pelvis offset.
    pub pelvis_offset: Option<[f32; 16]>,
}

/// Builds a mesh container.
#[derive(Clone, Debug, Default)]
pub struct MeshBuilder {
    lods: [Option<Vec<FaceData>>; 4],
    skin: Option<SkinData>,
}

impl MeshBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the faces for one level of detail.
    #[must_use]
    pub fn with_lod(mut self, level: LodLevel, faces: Vec<FaceData>) -> Self {
        self.lods[level.index()] = Some(faces);
        self
    }

    /// Attaches a skin section.
    #[must_use]
    pub fn with_skin(mut self, skin: SkinData) -> Self {
        self.skin = Some(skin);
        self
    }

    /// Serializes the container.
    ///
    /// # Errors
    ///
    /// Returns an error when a count does not fit its field or a per-vertex
    /// array length differs from the position count.
    pub fn build(&self) -> Result<Vec<u8>, EncodeError> {
        let mut sections: Vec<Option<Vec<u8>>> = Vec::with_capacity(5);
        for lod in &self.lods {
            sections.push(lod.as_deref().map(encode_lod).transpose()?);
        }
        sections.push(self.skin.as_ref().map(encode_skin).transpose()?);

        let mut out = Vec::with_capacity(
            MESH_HEADER_LEN + sections.iter().flatten().map(Vec::len).sum::<usize>(),
        );
        out.extend_from_slice(&MESH_MAGIC);
        out.extend_from_slice(&MESH_VERSION.to_le_bytes());
        let flags = if self.skin.is_some() { FLAG_SKIN } else { 0 };
        out.extend_from_slice(&flags.to_le_bytes());

        let mut offset = MESH_HEADER_LEN;
        for section in &sections {
            let size = section.as_ref().map_or(0, Vec::len);
            let entry_offset = if size == 0 { 0 } else { offset };
            out.extend_from_slice(&to_u32(entry_offset, "container bytes")?.to_le_bytes());
            out.extend_from_slice(&to_u32(size, "section bytes")?.to_le_bytes());
            offset += size;
        }

        for section in sections.into_iter().flatten() {
            out.extend_from_slice(&section);
        }
        Ok(out)
    }
}

fn to_u16(count: usize, what: &'static str) -> Result<u16, EncodeError> {
    u16::try_from(count).map_err(|_| EncodeError::TooMany {
        what,
        count,
        max: usize::from(u16::MAX),
    })
}

fn to_u32(count: usize, what: &'static str) -> Result<u32, EncodeError> {
    u32::try_from(count).map_err(|_| EncodeError::TooMany {
        what,
        count,
        max: u32::MAX as usize,
    })
}

fn push_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn check_len(face: usize, what: &'static str, count: usize, expected: usize) -> Result<(), EncodeError> {
    if count == expected {
        Ok(())
    } else {
        Err(EncodeError::LengthMismatch { face, what, count, expected })
    }
}

fn bounds<const N: usize>(points: impl Iterator<Item = [f32; N]>) -> ([f32; N], [f32; N]) {
    let mut min = [f32::INFINITY; N];
    let mut max = [f32::NEG_INFINITY; N];
    let mut any = false;
    for point in points {
        any = true;
        for axis in 0..N {
            min[axis] = min[axis].min(point[axis]);
            max[axis] = max[axis].max(point[axis]);
        }
    }
    if any {
        (min, max)
    } else {
        ([0.0; N], [0.0; N])
    }
}

fn encode_lod(faces: &[FaceData]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    out.extend_from_slice(&to_u16(faces.len(), "faces")?.to_le_bytes());
    for (index, face) in faces.iter().enumerate() {
        encode_face(&mut out, index, face)?;
    }
    Ok(out)
}

fn encode_face(out: &mut Vec<u8>, index: usize, face: &FaceData) -> Result<(), EncodeError> {
    let vertex_count = face.positions.len();
    out.extend_from_slice(&to_u16(vertex_count, "vertices")?.to_le_bytes());

    let (min, max) = bounds(face.positions.iter().copied());
    push_f32s(out, &min);
    push_f32s(out, &max);
    for p in &face.positions {
        for axis in 0..3 {
            out.extend_from_slice(&quantize_u16(p[axis], min[axis], max[axis]).to_le_bytes());
        }
    }

    let mut attributes = 0u8;
    if face.normals.is_some() {
        attributes |= ATTR_NORMALS;
    }
    if face.uvs.is_some() {
        attributes |= ATTR_UVS;
    }
    if face.influences.is_some() {
        attributes |= ATTR_WEIGHTS;
    }
    out.push(attributes);

    if let Some(normals) = &face.normals {
        check_len(index, "normals", normals.len(), vertex_count)?;
        for n in normals {
            for axis in 0..3 {
                out.extend_from_slice(
                    &quantize_u16(n[axis], NORMAL_MIN[axis], NORMAL_MAX[axis]).to_le_bytes(),
                );
            }
        }
    }

    if let Some(uvs) = &face.uvs {
        check_len(index, "uvs", uvs.len(), vertex_count)?;
        let (min, max) = bounds(uvs.iter().copied());
        push_f32s(out, &min);
        push_f32s(out, &max);
        for uv in uvs {
            for axis in 0..2 {
                out.extend_from_slice(&quantize_u16(uv[axis], min[axis], max[axis]).to_le_bytes());
            }
        }
    }

    out.extend_from_slice(&to_u32(face.indices.len(), "indices")?.to_le_bytes());
    for i in &face.indices {
        out.extend_from_slice(&i.to_le_bytes());
    }

    if let Some(influences) = &face.influences {
        check_len(index, "influences", influences.len(), vertex_count)?;
        let stream = encode_influences(influences);
        out.extend_from_slice(&to_u32(stream.len(), "weight bytes")?.to_le_bytes());
        out.extend_from_slice(&stream);
    }
    Ok(())
}

fn encode_influences(influences: &[Vec<(u8, f32)>]) -> Vec<u8> {
    let mut stream = Vec::new();
    for vertex in influences {
        let mut written = 0;
        for &(joint, weight) in vertex.iter().filter(|(joint, _)| *joint != END_OF_INFLUENCES) {
            if written == MAX_INFLUENCES {
                break;
            }
            stream.push(joint);
            stream.extend_from_slice(&quantize_u16(weight, 0.0, 1.0).to_le_bytes());
            written += 1;
        }
        if written < MAX_INFLUENCES {
            stream.push(END_OF_INFLUENCES);
        }
    }
    stream
}

fn encode_skin(skin: &SkinData) -> Result<Vec<u8>, EncodeError> {
    let joint_count = skin.joint_names.len();
    let mut out = Vec::new();
    out.extend_from_slice(&to_u16(joint_count, "joints")?.to_le_bytes());

    check_len(0, "inverse bind matrices", skin.inverse_bind_matrices.len(), joint_count)?;
    for (name, matrix) in skin.joint_names.iter().zip(&skin.inverse_bind_matrices) {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        push_f32s(&mut out, matrix);
    }

    let mut flags = 0u8;
    if skin.bind_shape_matrix.is_some() {
        flags |= SKIN_BIND_SHAPE;
    }
    if skin.pelvis_offset.is_some() {
        flags |= SKIN_PELVIS_OFFSET;
    }
    if skin.alt_inverse_bind_matrices.is_some() {
        flags |= SKIN_ALT_INVERSE_BIND;
    }
    out.push(flags);

    if let Some(matrix) = &skin.bind_shape_matrix {
        push_f32s(&mut out, matrix);
    }
    if let Some(matrix) = &skin.pelvis_offset {
        push_f32s(&mut out, matrix);
    }
    if let Some(matrices) = &skin.alt_inverse_bind_matrices {
        check_len(0, "alternate inverse bind matrices", matrices.len(), joint_count)?;
        for matrix in matrices {
            push_f32s(&mut out, matrix);
        }
    }
    Ok(out)
}
