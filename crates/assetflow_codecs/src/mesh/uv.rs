//! Texture coordinate placement: planar projection and the
//! rotate/repeat/offset transform.

use super::{DecodedFace, MappingMode, TextureEntry};

/// Normal used for planar projection when a face stores none.
const FALLBACK_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

#[inline]
fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalized(v: [f32; 3]) -> [f32; 3] {
    let len = dot(v, v).sqrt();
    if len > f32::EPSILON {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        v
    }
}

/// Projects a vertex onto the plane facing its normal.
///
/// The binormal is the Y axis when the normal leans mostly along X, and the
/// X axis otherwise, flipped to keep a consistent handedness. The tangent is
/// `binormal × normal`, and the position is scaled by the object scale
/// before projecting.
#[must_use]
pub fn planar_projection(normal: [f32; 3], position: [f32; 3], scale: [f32; 3]) -> [f32; 2] {
    let d = normal[0];
    let binormal = if d >= 0.5 || d <= -0.5 {
        if d < 0.0 {
            [0.0, -1.0, 0.0]
        } else {
            [0.0, 1.0, 0.0]
        }
    } else if normal[1] > 0.0 {
        [-1.0, 0.0, 0.0]
    } else {
        [1.0, 0.0, 0.0]
    };
    let tangent = normalized(cross(binormal, normal));

    let vec = [position[0] * scale[0], position[1] * scale[1], position[2] * scale[2]];
    let u = 1.0 + (dot(binormal, vec) * 2.0 - 0.5);
    let v = -(dot(tangent, vec) * 2.0 - 0.5);
    [u, v]
}

/// Applies rotation, repeats and offset around the texture centre.
#[must_use]
pub fn apply_texture_transform(uv: [f32; 2], entry: &TextureEntry) -> [f32; 2] {
    let s = uv[0] - 0.5;
    let t = uv[1] - 0.5;

    let (sin, cos) = entry.rotation.sin_cos();
    let rs = s * cos + t * sin;
    let rt = -s * sin + t * cos;

    [
        rs * entry.repeat_u + entry.offset_u + 0.5,
        rt * entry.repeat_v + entry.offset_v + 0.5,
    ]
}

/// Re-projects a decoded face's coordinates in place.
pub(crate) fn project_face_uvs(face: &mut DecodedFace, entry: &TextureEntry, scale: [f32; 3]) {
    if entry.mapping == MappingMode::Planar {
        for (i, uv) in face.uvs.iter_mut().enumerate() {
            let normal = face
                .normals
                .as_ref()
                .and_then(|normals| normals.get(i).copied())
                .unwrap_or(FALLBACK_NORMAL);
            *uv = planar_projection(normal, face.positions[i], scale);
        }
    }

    if *entry != TextureEntry::default() {
        for uv in &mut face.uvs {
            *uv = apply_texture_transform(*uv, entry);
        }
    }
}
