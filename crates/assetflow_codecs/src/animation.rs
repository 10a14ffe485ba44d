//! # Animation Codec
//!
//! Sequential decoder for keyframed joint animations.
//!
//! ## Stream Layout
//!
//! ```text
//! Animation stream (little-endian, read front to back, no seeking):
//! ├── version u16, subversion u16        (1, 0)
//! ├── base priority i32, duration f32
//! ├── emote name (NUL-terminated)
//! ├── loop in f32, loop out f32, loop flag i32
//! ├── ease in f32, ease out f32
//! ├── hand pose u32                      (< 14)
//! ├── joint count u32
//! ├── joint × count
//! │   ├── name (NUL-terminated), priority i32
//! │   ├── rotation key count u32 + {time, x, y, z: u16} × count
//! │   └── position key count u32 + {time, x, y, z: u16} × count
//! ├── constraint count u32
//! └── constraint × count (86 bytes each)
//!     ├── chain length u8, type u8
//!     ├── source volume [u8; 16], source offset [f32; 3]
//!     ├── target volume [u8; 16], target offset [f32; 3], target dir [f32; 3]
//!     └── ease in start/stop, ease out start/stop: f32
//! ```
//!
//! Every count is checked against the bytes left before anything is
//! allocated for it.

use crate::error::{AnimationDecodeError, AnimationResult, EncodeError};
use crate::quantize::{dequantize_u16, quantize_u16};
use crate::reader::ByteReader;

/// Supported stream version.
pub const ANIMATION_VERSION: u16 = 1;

/// Supported stream subversion.
pub const ANIMATION_SUBVERSION: u16 = 0;

/// Number of known hand poses.
pub const HAND_POSE_COUNT: u32 = 14;

/// Width of the fixed collision-volume name fields.
pub const VOLUME_NAME_LEN: usize = 16;

/// Rotation components are stored on this symmetric range.
pub const ROTATION_RANGE: f32 = 1.0;

/// Position components are stored on this symmetric range, in metres.
pub const POSITION_RANGE: f32 = 5.0;

const KEYFRAME_LEN: usize = 8;
const CONSTRAINT_LEN: usize = 2 + VOLUME_NAME_LEN + 12 + VOLUME_NAME_LEN + 12 + 12 + 16;
/// Empty name, priority and two zero key counts.
const MIN_JOINT_LEN: usize = 1 + 4 + 4 + 4;

/// Hand shape held while the animation plays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HandPose {
    /// Open hands, fingers apart. Wire value 0.
    #[default]
    Spread = 0,
    /// Both hands loose.
    Relaxed,
    /// Both index fingers extended.
    Point,
    /// Both hands closed.
    Fist,
    /// Left hand loose.
    RelaxedLeft,
    /// Left index finger extended.
    PointLeft,
    /// Left hand closed.
    FistLeft,
    /// Right hand loose.
    RelaxedRight,
    /// Right index finger extended.
    PointRight,
    /// Right hand closed.
    FistRight,
    /// Right hand flat at the brow.
    SaluteRight,
    /// Both hands over a keyboard.
    Typing,
    /// Right index and middle fingers in a V.
    PeaceRight,
    /// Right palm open and facing out.
    PalmRight,
}

impl HandPose {
    const ALL: [HandPose; HAND_POSE_COUNT as usize] = [
        Self::Spread,
        Self::Relaxed,
        Self::Point,
        Self::Fist,
        Self::RelaxedLeft,
        Self::PointLeft,
        Self::FistLeft,
        Self::RelaxedRight,
        Self::PointRight,
        Self::FistRight,
        Self::SaluteRight,
        Self::Typing,
        Self::PeaceRight,
        Self::PalmRight,
    ];
}

impl TryFrom<u32> for HandPose {
    type Error = AnimationDecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(AnimationDecodeError::InvalidHandPose(value))
    }
}

/// Fixed header fields.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationHeader {
    /// Stream version.
    pub version: u16,
    /// Stream subversion.
    pub subversion: u16,
    /// Priority for joints that do not override it.
    pub base_priority: i32,
    /// Length in seconds.
    pub duration: f32,
    /// Facial emote played alongside, empty for none.
    pub emote_name: String,
    /// Loop start, seconds.
    pub loop_in_point: f32,
    /// Loop end, seconds.
    pub loop_out_point: f32,
    /// Whether the animation loops.
    pub looping: bool,
    /// Blend-in time, seconds.
    pub ease_in_duration: f32,
    /// Blend-out time, seconds.
    pub ease_out_duration: f32,
    /// Hand shape.
    pub hand_pose: HandPose,
}

impl Default for AnimationHeader {
    fn default() -> Self {
        Self {
            version: ANIMATION_VERSION,
            subversion: ANIMATION_SUBVERSION,
            base_priority: 0,
            duration: 0.0,
            emote_name: String::new(),
            loop_in_point: 0.0,
            loop_out_point: 0.0,
            looping: false,
            ease_in_duration: 0.0,
            ease_out_duration: 0.0,
            hand_pose: HandPose::Spread,
        }
    }
}

/// One quantized keyframe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keyframe {
    /// Time, quantized over the animation duration.
    pub time: u16,
    /// X component.
    pub x: u16,
    /// Y component.
    pub y: u16,
    /// Z component.
    pub z: u16,
}

impl Keyframe {
    /// Keyframe time in seconds.
    #[must_use]
    pub fn time_seconds(&self, duration: f32) -> f32 {
        dequantize_u16(self.time, 0.0, duration)
    }

    /// Rotation as a unit quaternion `[x, y, z, w]` with non-negative `w`.
    #[must_use]
    pub fn rotation(&self) -> [f32; 4] {
        let x = dequantize_u16(self.x, -ROTATION_RANGE, ROTATION_RANGE);
        let y = dequantize_u16(self.y, -ROTATION_RANGE, ROTATION_RANGE);
        let z = dequantize_u16(self.z, -ROTATION_RANGE, ROTATION_RANGE);
        let w = (1.0 - (x * x + y * y + z * z)).max(0.0).sqrt();
        [x, y, z, w]
    }

    /// Position offset in metres.
    #[must_use]
    pub fn position(&self) -> [f32; 3] {
        [
            dequantize_u16(self.x, -POSITION_RANGE, POSITION_RANGE),
            dequantize_u16(self.y, -POSITION_RANGE, POSITION_RANGE),
            dequantize_u16(self.z, -POSITION_RANGE, POSITION_RANGE),
        ]
    }

    /// Quantizes a rotation keyframe. Only `x`, `y`, `z` are stored.
    #[must_use]
    pub fn from_rotation(time: f32, duration: f32, rotation: [f32; 4]) -> Self {
        // Store the quaternion with w >= 0 so w can be rebuilt from the rest.
        let sign = if rotation[3] < 0.0 { -1.0 } else { 1.0 };
        Self {
            time: quantize_u16(time, 0.0, duration),
            x: quantize_u16(rotation[0] * sign, -ROTATION_RANGE, ROTATION_RANGE),
            y: quantize_u16(rotation[1] * sign, -ROTATION_RANGE, ROTATION_RANGE),
            z: quantize_u16(rotation[2] * sign, -ROTATION_RANGE, ROTATION_RANGE),
        }
    }

    /// Quantizes a position keyframe.
    #[must_use]
    pub fn from_position(time: f32, duration: f32, position: [f32; 3]) -> Self {
        Self {
            time: quantize_u16(time, 0.0, duration),
            x: quantize_u16(position[0], -POSITION_RANGE, POSITION_RANGE),
            y: quantize_u16(position[1], -POSITION_RANGE, POSITION_RANGE),
            z: quantize_u16(position[2], -POSITION_RANGE, POSITION_RANGE),
        }
    }

    fn read(reader: &mut ByteReader<'_>) -> AnimationResult<Self> {
        let [time, x, y, z] = reader.read_u16_array::<4>()?;
        Ok(Self { time, x, y, z })
    }

    fn write(&self, out: &mut Vec<u8>) {
        for value in [self.time, self.x, self.y, self.z] {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Motion for one joint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointMotion {
    /// Joint name.
    pub name: String,
    /// Blend priority.
    pub priority: i32,
    /// Rotation track.
    pub rotation_keys: Vec<Keyframe>,
    /// Position track.
    pub position_keys: Vec<Keyframe>,
}

/// Inverse-kinematics style constraint between two collision volumes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointConstraint {
    /// Number of joints in the chain.
    pub chain_length: u8,
    /// Constraint kind (0 = point, 1 = plane).
    pub constraint_type: u8,
    /// Source collision volume.
    pub source_volume: String,
    /// Offset from the source volume.
    pub source_offset: [f32; 3],
    /// Target collision volume.
    pub target_volume: String,
    /// Offset from the target volume.
    pub target_offset: [f32; 3],
    /// Target direction.
    pub target_dir: [f32; 3],
    /// Ease-in start, seconds.
    pub ease_in_start: f32,
    /// Ease-in stop, seconds.
    pub ease_in_stop: f32,
    /// Ease-out start, seconds.
    pub ease_out_start: f32,
    /// Ease-out stop, seconds.
    pub ease_out_stop: f32,
}

/// Fully decoded animation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedAnimation {
    /// Header fields.
    pub header: AnimationHeader,
    /// Per-joint tracks.
    pub joints: Vec<JointMotion>,
    /// Constraints.
    pub constraints: Vec<JointConstraint>,
}

impl DecodedAnimation {
    /// Total keyframes across all joints.
    #[must_use]
    pub fn keyframe_count(&self) -> usize {
        self.joints
            .iter()
            .map(|j| j.rotation_keys.len() + j.position_keys.len())
            .sum()
    }
}

/// Animation stream codec.
pub struct AnimationCodec;

impl AnimationCodec {
    /// Decodes a complete animation.
    ///
    /// # Errors
    ///
    /// Any malformed field fails the whole decode.
    pub fn decode(data: &[u8]) -> AnimationResult<DecodedAnimation> {
        let mut reader = ByteReader::new(data);
        let header = read_header(&mut reader)?;

        let joint_count = read_count(&mut reader, "joint", MIN_JOINT_LEN)?;
        let mut joints = Vec::with_capacity(joint_count);
        for _ in 0..joint_count {
            joints.push(read_joint(&mut reader)?);
        }

        let constraint_count = read_count(&mut reader, "constraint", CONSTRAINT_LEN)?;
        let mut constraints = Vec::with_capacity(constraint_count);
        for _ in 0..constraint_count {
            constraints.push(read_constraint(&mut reader)?);
        }

        Ok(DecodedAnimation { header, joints, constraints })
    }

    /// Decodes only the header.
    ///
    /// # Errors
    ///
    /// Returns an error for a truncated or unsupported header.
    pub fn decode_header(data: &[u8]) -> AnimationResult<AnimationHeader> {
        read_header(&mut ByteReader::new(data))
    }

    /// Serializes an animation.
    ///
    /// # Errors
    ///
    /// Returns an error if a volume name is wider than its field.
    pub fn encode(animation: &DecodedAnimation) -> Result<Vec<u8>, EncodeError> {
        let h = &animation.header;
        let mut out = Vec::new();
        out.extend_from_slice(&h.version.to_le_bytes());
        out.extend_from_slice(&h.subversion.to_le_bytes());
        out.extend_from_slice(&h.base_priority.to_le_bytes());
        out.extend_from_slice(&h.duration.to_le_bytes());
        push_cstr(&mut out, &h.emote_name);
        out.extend_from_slice(&h.loop_in_point.to_le_bytes());
        out.extend_from_slice(&h.loop_out_point.to_le_bytes());
        out.extend_from_slice(&i32::from(h.looping).to_le_bytes());
        out.extend_from_slice(&h.ease_in_duration.to_le_bytes());
        out.extend_from_slice(&h.ease_out_duration.to_le_bytes());
        out.extend_from_slice(&(h.hand_pose as u32).to_le_bytes());

        out.extend_from_slice(&count_u32(animation.joints.len(), "joints")?.to_le_bytes());
        for joint in &animation.joints {
            push_cstr(&mut out, &joint.name);
            out.extend_from_slice(&joint.priority.to_le_bytes());
            for track in [&joint.rotation_keys, &joint.position_keys] {
                out.extend_from_slice(&count_u32(track.len(), "keyframes")?.to_le_bytes());
                for key in track {
                    key.write(&mut out);
                }
            }
        }

        out.extend_from_slice(&count_u32(animation.constraints.len(), "constraints")?.to_le_bytes());
        for c in &animation.constraints {
            out.push(c.chain_length);
            out.push(c.constraint_type);
            push_fixed_str(&mut out, &c.source_volume)?;
            push_f32s(&mut out, &c.source_offset);
            push_fixed_str(&mut out, &c.target_volume)?;
            push_f32s(&mut out, &c.target_offset);
            push_f32s(&mut out, &c.target_dir);
            push_f32s(
                &mut out,
                &[c.ease_in_start, c.ease_in_stop, c.ease_out_start, c.ease_out_stop],
            );
        }
        Ok(out)
    }
}

fn read_header(reader: &mut ByteReader<'_>) -> AnimationResult<AnimationHeader> {
    let version = reader.read_u16()?;
    let subversion = reader.read_u16()?;
    if (version, subversion) != (ANIMATION_VERSION, ANIMATION_SUBVERSION) {
        if (version.swap_bytes(), subversion.swap_bytes()) == (ANIMATION_VERSION, ANIMATION_SUBVERSION) {
            return Err(AnimationDecodeError::BigEndian);
        }
        return Err(AnimationDecodeError::UnsupportedVersion { version, subversion });
    }

    let base_priority = reader.read_i32()?;
    let duration = reader.read_f32()?;
    let emote_name = reader.read_cstr()?.to_owned();
    let loop_in_point = reader.read_f32()?;
    let loop_out_point = reader.read_f32()?;
    let looping = reader.read_i32()? != 0;
    let ease_in_duration = reader.read_f32()?;
    let ease_out_duration = reader.read_f32()?;
    let hand_pose = HandPose::try_from(reader.read_u32()?)?;

    Ok(AnimationHeader {
        version,
        subversion,
        base_priority,
        duration,
        emote_name,
        loop_in_point,
        loop_out_point,
        looping,
        ease_in_duration,
        ease_out_duration,
        hand_pose,
    })
}

/// Reads a u32 count and rejects it if `count * min_item_len` exceeds the
/// bytes left.
fn read_count(reader: &mut ByteReader<'_>, what: &'static str, min_item_len: usize) -> AnimationResult<usize> {
    let offset = reader.offset();
    let count = reader.read_u32()?;
    let remaining = reader.remaining();
    let needed = u64::from(count) * min_item_len as u64;
    if needed > remaining as u64 {
        return Err(AnimationDecodeError::CountOutOfRange {
            what,
            count: u64::from(count),
            offset,
            remaining,
        });
    }
    Ok(count as usize)
}

fn read_keys(reader: &mut ByteReader<'_>, what: &'static str) -> AnimationResult<Vec<Keyframe>> {
    let count = read_count(reader, what, KEYFRAME_LEN)?;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(Keyframe::read(reader)?);
    }
    Ok(keys)
}

fn read_joint(reader: &mut ByteReader<'_>) -> AnimationResult<JointMotion> {
    let name = reader.read_cstr()?.to_owned();
    let priority = reader.read_i32()?;
    let rotation_keys = read_keys(reader, "rotation keyframe")?;
    let position_keys = read_keys(reader, "position keyframe")?;
    Ok(JointMotion { name, priority, rotation_keys, position_keys })
}

fn read_constraint(reader: &mut ByteReader<'_>) -> AnimationResult<JointConstraint> {
    let chain_length = reader.read_u8()?;
    let constraint_type = reader.read_u8()?;
    let source_volume = reader.read_fixed_str(VOLUME_NAME_LEN)?.to_owned();
    let source_offset = reader.read_f32_array::<3>()?;
    let target_volume = reader.read_fixed_str(VOLUME_NAME_LEN)?.to_owned();
    let target_offset = reader.read_f32_array::<3>()?;
    let target_dir = reader.read_f32_array::<3>()?;
    let [ease_in_start, ease_in_stop, ease_out_start, ease_out_stop] = reader.read_f32_array::<4>()?;
    Ok(JointConstraint {
        chain_length,
        constraint_type,
        source_volume,
        source_offset,
        target_volume,
        target_offset,
        target_dir,
        ease_in_start,
        ease_in_stop,
        ease_out_start,
        ease_out_stop,
    })
}

fn count_u32(count: usize, what: &'static str) -> Result<u32, EncodeError> {
    u32::try_from(count).map_err(|_| EncodeError::TooMany {
        what,
        count,
        max: u32::MAX as usize,
    })
}

fn push_cstr(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(text.as_bytes());
    out.push(0);
}

fn push_fixed_str(out: &mut Vec<u8>, text: &str) -> Result<(), EncodeError> {
    let bytes = text.as_bytes();
    if bytes.len() > VOLUME_NAME_LEN {
        return Err(EncodeError::TooMany {
            what: "volume name bytes",
            count: bytes.len(),
            max: VOLUME_NAME_LEN,
        });
    }
    let mut field = [0u8; VOLUME_NAME_LEN];
    field[..bytes.len()].copy_from_slice(bytes);
    out.extend_from_slice(&field);
    Ok(())
}

fn push_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}
