//! # Textures
//!
//! Image decoding is a pluggable capability: the lane only knows the
//! [`TextureCodec`] trait. [`RawTextureCodec`] handles the uncompressed
//! container below and is what tests and the demo use.
//!
//! ```text
//! Raw texture container (little-endian):
//! ├── "AFTX" (4 bytes)
//! ├── width u32, height u32
//! ├── format u8
//! └── pixels: width × height × bytes_per_pixel
//! ```
//!
//! The texture lane caches the decoded structure, so a cache hit skips
//! decoding entirely.

use assetflow_codecs::ByteReader;
use serde::{Deserialize, Serialize};

use crate::asset::{AssetKind, AssetRequest, CachePoint};
use crate::error::{CacheResult, TextureDecodeError};

/// Raw texture container magic.
pub const TEXTURE_MAGIC: [u8; 4] = *b"AFTX";

/// Pixel layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PixelFormat {
    /// One 8-bit channel.
    R8 = 0,
    /// Two 8-bit channels.
    Rg8 = 1,
    /// Three 8-bit channels.
    Rgb8 = 2,
    /// Four 8-bit channels.
    Rgba8 = 3,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::R8 => 1,
            Self::Rg8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    /// Parses a format tag.
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::R8),
            1 => Some(Self::Rg8),
            2 => Some(Self::Rgb8),
            3 => Some(Self::Rgba8),
            _ => None,
        }
    }
}

/// A decoded image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTexture {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Tightly packed rows, top to bottom.
    pub pixels: Vec<u8>,
}

/// Image decoding capability.
pub trait TextureCodec: Send + Sync + 'static {
    /// Decodes a complete image.
    ///
    /// # Errors
    ///
    /// Returns an error for anything the codec cannot decode.
    fn decode(&self, data: &[u8]) -> Result<DecodedTexture, TextureDecodeError>;
}

/// Codec for the uncompressed `AFTX` container.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawTextureCodec;

impl RawTextureCodec {
    /// Serializes a texture into the `AFTX` container.
    #[must_use]
    pub fn encode(texture: &DecodedTexture) -> Vec<u8> {
        let mut out = Vec::with_capacity(13 + texture.pixels.len());
        out.extend_from_slice(&TEXTURE_MAGIC);
        out.extend_from_slice(&texture.width.to_le_bytes());
        out.extend_from_slice(&texture.height.to_le_bytes());
        out.push(texture.format as u8);
        out.extend_from_slice(&texture.pixels);
        out
    }
}

impl TextureCodec for RawTextureCodec {
    fn decode(&self, data: &[u8]) -> Result<DecodedTexture, TextureDecodeError> {
        let mut reader = ByteReader::new(data);
        let magic = reader.read_array::<4>()?;
        if magic != TEXTURE_MAGIC {
            return Err(TextureDecodeError::BadMagic(magic));
        }
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let tag = reader.read_u8()?;
        let format = PixelFormat::from_u8(tag).ok_or(TextureDecodeError::UnknownFormat(tag))?;

        // u32 × u32 × 4 fits in u64.
        let expected = u64::from(width) * u64::from(height) * format.bytes_per_pixel();
        let actual = reader.remaining();
        if expected != actual as u64 {
            return Err(TextureDecodeError::PixelLength { expected, actual });
        }

        Ok(DecodedTexture {
            width,
            height,
            format,
            pixels: reader.read_bytes(actual)?.to_vec(),
        })
    }
}

/// Raster texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Texture;

impl AssetKind for Texture {
    type Params = ();
    type Decoded = DecodedTexture;
    const NAME: &'static str = "texture";
    const CACHE_POINT: CachePoint = CachePoint::Decoded;

    fn cache_payload(request: &AssetRequest<Self>) -> CacheResult<Option<Vec<u8>>> {
        request
            .decoded
            .as_ref()
            .map(bincode::serialize)
            .transpose()
            .map_err(Into::into)
    }

    fn restore_cached(request: &mut AssetRequest<Self>, payload: Vec<u8>) -> CacheResult<()> {
        let texture: DecodedTexture = bincode::deserialize(&payload)?;
        request.decoded = Some(texture);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;

    fn checker() -> DecodedTexture {
        DecodedTexture {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8,
            pixels: vec![
                255, 255, 255, 255, 0, 0, 0, 255, //
                0, 0, 0, 255, 255, 255, 255, 255,
            ],
        }
    }

    #[test]
    fn test_raw_container() {
        let data = RawTextureCodec::encode(&checker());
        assert_eq!(data.len(), 13 + 16);
        assert_eq!(RawTextureCodec.decode(&data).unwrap(), checker());
    }

    #[test]
    fn test_pixel_length_checked() {
        let mut data = RawTextureCodec::encode(&checker());
        data.pop();
        assert_eq!(
            RawTextureCodec.decode(&data),
            Err(TextureDecodeError::PixelLength { expected: 16, actual: 15 })
        );
    }

    #[test]
    fn test_bad_format_and_magic() {
        let mut data = RawTextureCodec::encode(&checker());
        data[12] = 9;
        assert_eq!(RawTextureCodec.decode(&data), Err(TextureDecodeError::UnknownFormat(9)));

        data[0] = b'X';
        assert!(matches!(RawTextureCodec.decode(&data), Err(TextureDecodeError::BadMagic(_))));
    }

    #[test]
    fn test_huge_dimensions_do_not_allocate() {
        let mut data = TEXTURE_MAGIC.to_vec();
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.push(3);
        assert!(matches!(
            RawTextureCodec.decode(&data),
            Err(TextureDecodeError::PixelLength { actual: 0, .. })
        ));
    }

    #[test]
    fn test_texture_caches_decoded_structure() {
        let mut request = AssetRequest::<Texture>::new(AssetId::from_u128(3), None, ());
        assert_eq!(Texture::cache_payload(&request).unwrap(), None);

        request.decoded = Some(checker());
        let payload = Texture::cache_payload(&request).unwrap().unwrap();

        let mut restored = AssetRequest::<Texture>::new(AssetId::from_u128(3), None, ());
        Texture::restore_cached(&mut restored, payload).unwrap();
        assert_eq!(restored.decoded, Some(checker()));
        assert!(restored.raw.is_none());
    }

    #[test]
    fn test_corrupt_cached_texture_leaves_request_alone() {
        let mut request = AssetRequest::<Texture>::new(AssetId::from_u128(3), None, ());
        assert!(Texture::restore_cached(&mut request, vec![1, 2]).is_err());
        assert!(request.decoded.is_none());
    }
}
