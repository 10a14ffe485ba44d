//! Container header and section table.

use crate::error::{MeshDecodeError, MeshResult};
use crate::reader::ByteReader;

use super::LodLevel;

/// Container magic.
pub const MESH_MAGIC: [u8; 4] = *b"AFMS";

/// Supported container version.
pub const MESH_VERSION: u16 = 1;

/// Header size: magic, version, flags, four LOD entries and the skin entry.
pub const MESH_HEADER_LEN: usize = 4 + 2 + 2 + 4 * 8 + 8;

/// Header flag: a skin section is present.
pub(crate) const FLAG_SKIN: u16 = 1 << 0;

/// Location of one section within the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionRef {
    /// Byte offset from the start of the container.
    pub offset: u32,
    /// Section length in bytes.
    pub size: u32,
}

impl SectionRef {
    /// Borrows the section out of `data`, checking bounds.
    pub fn slice<'a>(&self, data: &'a [u8], section: &'static str) -> MeshResult<&'a [u8]> {
        let start = self.offset as usize;
        let end = start.checked_add(self.size as usize);
        match end {
            Some(end) if end <= data.len() => Ok(&data[start..end]),
            _ => Err(MeshDecodeError::SectionOutOfBounds {
                section,
                offset: self.offset,
                size: self.size,
                len: data.len(),
            }),
        }
    }

    fn read(reader: &mut ByteReader<'_>) -> MeshResult<Option<Self>> {
        let offset = reader.read_u32()?;
        let size = reader.read_u32()?;
        // A zero-sized entry marks an absent section.
        Ok((size > 0).then_some(Self { offset, size }))
    }
}

/// Parsed container header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshHeader {
    /// Container version.
    pub version: u16,
    /// Raw flag bits.
    pub flags: u16,
    /// LOD sections, indexed by [`LodLevel::index`].
    pub lods: [Option<SectionRef>; 4],
    /// Skin section, when flagged and non-empty.
    pub skin: Option<SectionRef>,
}

impl MeshHeader {
    /// Parses and validates the header at the start of `data`.
    pub fn parse(data: &[u8]) -> MeshResult<Self> {
        let mut reader = ByteReader::new(data);

        let magic = reader.read_array::<4>()?;
        if magic != MESH_MAGIC {
            return Err(MeshDecodeError::BadMagic(magic));
        }

        let version = reader.read_u16()?;
        if version != MESH_VERSION {
            return Err(MeshDecodeError::UnsupportedVersion(version));
        }
        let flags = reader.read_u16()?;

        let mut lods = [None; 4];
        for slot in &mut lods {
            *slot = SectionRef::read(&mut reader)?;
        }

        let skin_entry = SectionRef::read(&mut reader)?;
        let skin = if flags & FLAG_SKIN != 0 { skin_entry } else { None };

        Ok(Self { version, flags, lods, skin })
    }

    /// Returns true if the container stores `level`.
    #[must_use]
    pub fn has_lod(&self, level: LodLevel) -> bool {
        self.lods[level.index()].is_some()
    }
}
