//! # Asset Model
//!
//! Content ids, asset kinds and the request record that moves through a
//! lane's queues.
//!
//! ```text
//! AssetRequest<K>
//! ├── id          content id (128-bit)
//! ├── requester   opaque back-reference for the consumer
//! ├── params      per-kind decode parameters
//! ├── raw         set by Download (or a raw-bytes cache hit)
//! └── decoded     set by Decode (or a decoded-structure cache hit)
//! ```
//!
//! A request is owned by exactly one queue or stage at a time. Two requests
//! for the same id are independent.

use std::fmt;
use std::str::FromStr;

use assetflow_codecs::{DecodedAnimation, DecodedMesh, MeshParams};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CacheResult;

/// 128-bit content identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    /// The all-zero id, never a valid asset.
    #[inline]
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Wraps a UUID.
    #[inline]
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Builds an id from its 128-bit value.
    #[inline]
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// A fresh random id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns true for the all-zero id.
    #[inline]
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// The underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// File name of this id's cache entry.
    #[must_use]
    pub fn cache_file_name(&self) -> String {
        format!("{}.cache", self.0.hyphenated())
    }
}

impl From<Uuid> for AssetId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Opaque reference back to whoever asked for an asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequesterId(pub u64);

/// Which payload a lane stores in its cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePoint {
    /// Cache the downloaded bytes; the store sits between Download and Decode.
    RawBytes,
    /// Cache the decoded structure; the store sits after Decode.
    Decoded,
}

/// One kind of asset carried by a lane.
pub trait AssetKind: Sized + Send + Sync + 'static {
    /// Per-request decode parameters.
    type Params: Clone + Default + fmt::Debug + Send + Sync + 'static;

    /// Decoded structure.
    type Decoded: fmt::Debug + Send + Sync + 'static;

    /// Lane name, used in logs and as the default cache subdirectory.
    const NAME: &'static str;

    /// Where the cache sits in this lane.
    const CACHE_POINT: CachePoint;

    /// Bytes to persist for `request`, or `None` if there is nothing to store.
    fn cache_payload(request: &AssetRequest<Self>) -> CacheResult<Option<Vec<u8>>> {
        Ok(request.raw.clone())
    }

    /// Applies a cached payload to `request`. Leaves it untouched on error.
    fn restore_cached(request: &mut AssetRequest<Self>, payload: Vec<u8>) -> CacheResult<()> {
        request.raw = Some(payload);
        Ok(())
    }
}

/// Rigged, multi-LOD mesh geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mesh;

impl AssetKind for Mesh {
    type Params = MeshParams;
    type Decoded = DecodedMesh;
    const NAME: &'static str = "mesh";
    const CACHE_POINT: CachePoint = CachePoint::RawBytes;
}

/// Skeletal animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Animation;

impl AssetKind for Animation {
    type Params = ();
    type Decoded = DecodedAnimation;
    const NAME: &'static str = "animation";
    const CACHE_POINT: CachePoint = CachePoint::RawBytes;
}

/// A request travelling through one lane.
pub struct AssetRequest<K: AssetKind> {
    /// Content id.
    pub id: AssetId,
    /// Who asked.
    pub requester: Option<RequesterId>,
    /// Decode parameters.
    pub params: K::Params,
    /// Downloaded or cached bytes.
    pub raw: Option<Vec<u8>>,
    /// Decoded structure.
    pub decoded: Option<K::Decoded>,
    /// Set when the payload came from the on-disk cache.
    pub cache_hit: bool,
}

impl<K: AssetKind> AssetRequest<K> {
    /// A fresh request with no payloads.
    #[must_use]
    pub fn new(id: AssetId, requester: Option<RequesterId>, params: K::Params) -> Self {
        Self {
            id,
            requester,
            params,
            raw: None,
            decoded: None,
            cache_hit: false,
        }
    }

    /// Length of the raw payload, 0 if absent.
    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.raw.as_ref().map_or(0, Vec::len)
    }

    /// Returns true once a decoded structure is attached.
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        self.decoded.is_some()
    }
}

impl<K: AssetKind> fmt::Debug for AssetRequest<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRequest")
            .field("kind", &K::NAME)
            .field("id", &self.id)
            .field("requester", &self.requester)
            .field("raw_len", &self.raw_len())
            .field("decoded", &self.is_decoded())
            .field("cache_hit", &self.cache_hit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_id() {
        assert!(AssetId::nil().is_nil());
        assert!(!AssetId::from_u128(1).is_nil());
    }

    #[test]
    fn test_display_and_parse() {
        let id = AssetId::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        let text = id.to_string();
        assert_eq!(text, "01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(text.parse::<AssetId>().unwrap(), id);
        assert_eq!(id.cache_file_name(), "01234567-89ab-cdef-0123-456789abcdef.cache");
    }

    #[test]
    fn test_raw_cache_payload_defaults() {
        let mut request = AssetRequest::<Animation>::new(AssetId::from_u128(9), None, ());
        assert_eq!(Animation::cache_payload(&request).unwrap(), None);

        Animation::restore_cached(&mut request, vec![1, 2, 3]).unwrap();
        assert_eq!(request.raw_len(), 3);
        assert_eq!(Animation::cache_payload(&request).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_debug_hides_payloads() {
        let mut request = AssetRequest::<Mesh>::new(AssetId::from_u128(5), Some(RequesterId(7)), MeshParams::default());
        request.raw = Some(vec![0; 4096]);
        let text = format!("{request:?}");
        assert!(text.contains("raw_len: 4096"));
        assert!(text.contains("mesh"));
    }
}
