//! # Decode Stage
//!
//! Takes one downloaded item per unit and turns its raw bytes into the
//! kind's decoded structure.
//!
//! What happens on failure is the decoder's call:
//! - [`DecodeFailure::Forward`]: log and pass the item on undecoded (meshes)
//! - [`DecodeFailure::Drop`]: hand the error to the worker's error policy;
//!   the item is already off the queue, so the next unit moves on

use std::sync::Arc;

use assetflow_codecs::{AnimationCodec, DecodedAnimation, DecodedMesh, MeshCodec, MeshParams};
use assetflow_core::{Stage, WorkError, WorkResult};

use crate::asset::{Animation, AssetKind, Mesh};
use crate::error::DecodeError;
use crate::stats::{bump, LaneStats};
use crate::texture::{DecodedTexture, Texture, TextureCodec};
use crate::topology::LaneQueues;

/// What the decode stage does with an item that failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Forward it without a decoded structure.
    Forward,
    /// Drop it and report the error.
    Drop,
}

/// Kind-specific decoding.
pub trait AssetDecoder<K: AssetKind>: Send + Sync + 'static {
    /// Decodes `raw` with the request's parameters.
    ///
    /// # Errors
    ///
    /// Returns the codec's error for malformed input.
    fn decode(&self, raw: &[u8], params: &K::Params) -> Result<K::Decoded, DecodeError>;

    /// Failure handling for this decoder.
    fn on_failure(&self) -> DecodeFailure {
        DecodeFailure::Drop
    }
}

/// Mesh container decoder. Individual levels of detail that fail are
/// omitted inside the codec; a bad header forwards the item undecoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeshDecoder;

impl AssetDecoder<Mesh> for MeshDecoder {
    fn decode(&self, raw: &[u8], params: &MeshParams) -> Result<DecodedMesh, DecodeError> {
        Ok(MeshCodec::decode(raw, params)?)
    }

    fn on_failure(&self) -> DecodeFailure {
        DecodeFailure::Forward
    }
}

/// Animation stream decoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnimationDecoder;

impl AssetDecoder<Animation> for AnimationDecoder {
    fn decode(&self, raw: &[u8], _params: &()) -> Result<DecodedAnimation, DecodeError> {
        Ok(AnimationCodec::decode(raw)?)
    }
}

/// Adapts a [`TextureCodec`] to the decode stage.
#[derive(Clone)]
pub struct TextureDecoder {
    codec: Arc<dyn TextureCodec>,
}

impl TextureDecoder {
    /// Wraps a codec.
    #[must_use]
    pub fn new(codec: Arc<dyn TextureCodec>) -> Self {
        Self { codec }
    }
}

impl AssetDecoder<Texture> for TextureDecoder {
    fn decode(&self, raw: &[u8], _params: &()) -> Result<DecodedTexture, DecodeError> {
        Ok(self.codec.decode(raw)?)
    }
}

/// Decode stage for one lane.
pub struct DecodeStage<K: AssetKind> {
    name: String,
    queues: Arc<LaneQueues<K>>,
    decoder: Arc<dyn AssetDecoder<K>>,
    stats: Arc<LaneStats>,
}

impl<K: AssetKind> DecodeStage<K> {
    /// Creates the stage.
    #[must_use]
    pub fn new(queues: Arc<LaneQueues<K>>, decoder: Arc<dyn AssetDecoder<K>>, stats: Arc<LaneStats>) -> Self {
        Self {
            name: format!("{}.decode", K::NAME),
            queues,
            decoder,
            stats,
        }
    }
}

impl<K: AssetKind> Stage for DecodeStage<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_work(&self) -> WorkResult {
        let Some(mut request) = self.queues.to_decode.try_dequeue() else {
            return Ok(false);
        };
        let id = request.id;

        let result = match request.raw.as_deref() {
            Some(raw) => self.decoder.decode(raw, &request.params),
            None => Err(DecodeError::MissingPayload),
        };

        match result {
            Ok(decoded) => {
                request.decoded = Some(decoded);
                bump(&self.stats.decoded);
                tracing::debug!(lane = K::NAME, %id, "decoded");
                self.queues.decode_output().enqueue(request);
            }
            Err(error) => {
                bump(&self.stats.decode_failures);
                match self.decoder.on_failure() {
                    DecodeFailure::Forward => {
                        tracing::warn!(lane = K::NAME, %id, %error, "decode failed, forwarding without output");
                        self.queues.decode_output().enqueue(request);
                    }
                    DecodeFailure::Drop => return Err(WorkError::failed(error)),
                }
            }
        }

        Ok(self.has_pending_input())
    }

    fn output_backlogged(&self) -> bool {
        self.queues.backlogged()
    }

    fn has_pending_input(&self) -> bool {
        !self.queues.to_decode.is_empty()
    }
}
