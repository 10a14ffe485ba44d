//! # Codec Error Types
//!
//! All errors that can occur while decoding asset binaries.

use thiserror::Error;

/// Low-level stream errors shared by every codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// A read would run past the end of the buffer.
    #[error("unexpected end of data at offset {offset}: need {needed} bytes, {remaining} left")]
    UnexpectedEnd {
        /// Offset of the failed read.
        offset: usize,
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A NUL-terminated string ran to the end of the buffer.
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {0}")]
    InvalidUtf8(usize),
}

/// Errors from the mesh container codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshDecodeError {
    /// Stream error.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Wrong magic number.
    #[error("not a mesh container: bad magic {0:?}")]
    BadMagic([u8; 4]),

    /// Container version this decoder does not know.
    #[error("unsupported mesh container version {0}")]
    UnsupportedVersion(u16),

    /// A section table entry points outside the buffer.
    #[error("{section} section [{offset}, +{size}) exceeds buffer of {len} bytes")]
    SectionOutOfBounds {
        /// Section name.
        section: &'static str,
        /// Section offset.
        offset: u32,
        /// Section size.
        size: u32,
        /// Buffer length.
        len: usize,
    },

    /// The requested level of detail is not present.
    #[error("level of detail {0:?} not present")]
    MissingLod(crate::mesh::LodLevel),

    /// A triangle index references a vertex that does not exist.
    #[error("face {face}: index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Face number.
        face: usize,
        /// Offending index.
        index: u16,
        /// Vertices in the face.
        vertex_count: usize,
    },

    /// The influence stream does not describe every vertex, or has bytes left over.
    #[error("face {face}: weight stream covers {decoded} of {expected} vertices")]
    WeightCountMismatch {
        /// Face number.
        face: usize,
        /// Vertices decoded from the stream.
        decoded: usize,
        /// Vertices in the face.
        expected: usize,
    },
}

/// Errors from the animation codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationDecodeError {
    /// Stream error.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The header only makes sense byte-swapped.
    #[error("big-endian animation data is not supported")]
    BigEndian,

    /// Unknown version/subversion pair.
    #[error("unsupported animation version {version}.{subversion}")]
    UnsupportedVersion {
        /// Header version.
        version: u16,
        /// Header subversion.
        subversion: u16,
    },

    /// Hand pose outside the known enumeration.
    #[error("hand pose {0} out of range")]
    InvalidHandPose(u32),

    /// A count field implies more data than the buffer holds.
    #[error("{what} count {count} at offset {offset} exceeds remaining {remaining} bytes")]
    CountOutOfRange {
        /// What was being counted.
        what: &'static str,
        /// The count read.
        count: u64,
        /// Offset of the count field.
        offset: usize,
        /// Bytes left after the count field.
        remaining: usize,
    },
}

/// Errors from the container encoders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A collection does not fit its length field.
    #[error("too many {what}: {count} exceeds {max}")]
    TooMany {
        /// What was being counted.
        what: &'static str,
        /// Items supplied.
        count: usize,
        /// Largest encodable count.
        max: usize,
    },

    /// A face references data it does not carry.
    #[error("face {face}: {what} has {count} entries, expected {expected}")]
    LengthMismatch {
        /// Face number.
        face: usize,
        /// Which per-vertex array.
        what: &'static str,
        /// Entries supplied.
        count: usize,
        /// Vertices in the face.
        expected: usize,
    },
}

/// Result type for mesh decoding.
pub type MeshResult<T> = Result<T, MeshDecodeError>;

/// Result type for animation decoding.
pub type AnimationResult<T> = Result<T, AnimationDecodeError>;
