//! # Cache Encryption
//!
//! ```text
//! cache blob = nonce (12 bytes) || AES-256-GCM( lz4(payload) )
//! ```
//!
//! A fresh random nonce is drawn for every blob. The GCM tag makes a wrong
//! key or a corrupted file fail loudly instead of yielding garbage.

use std::fmt;
use std::hash::Hasher;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use siphasher::sip128::{Hasher128, SipHasher24};

use crate::error::{CacheError, CacheResult};

/// Nonce length prepended to every blob.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Symmetric encryption for cache blobs.
pub trait CacheCipher: Send + Sync + 'static {
    /// Encrypts `plaintext` into a self-contained blob.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encrypt`] if the cipher fails.
    fn encrypt(&self, plaintext: &[u8]) -> CacheResult<Vec<u8>>;

    /// Decrypts a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns an error for truncated or unauthenticated blobs.
    fn decrypt(&self, blob: &[u8]) -> CacheResult<Vec<u8>>;
}

/// AES-256-GCM cipher.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    /// Creates a cipher from a raw 256-bit key.
    #[must_use]
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Derives the key from a passphrase with two differently keyed
    /// SipHash-2-4-128 digests.
    #[must_use]
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self::new(&derive_key(passphrase))
    }
}

impl fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl CacheCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> CacheResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CacheError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn decrypt(&self, blob: &[u8]) -> CacheResult<Vec<u8>> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CacheError::BlobTooShort(blob.len()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CacheError::Authentication)
    }
}

const KEY_DOMAIN_LO: (u64, u64) = (0x6173_7365_7466_6c6f, 0x6361_6368_652d_6b30);
const KEY_DOMAIN_HI: (u64, u64) = (0x6173_7365_7466_6c6f, 0x6361_6368_652d_6b31);

fn derive_key(passphrase: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    for (half, (k0, k1)) in key.chunks_exact_mut(16).zip([KEY_DOMAIN_LO, KEY_DOMAIN_HI]) {
        let mut hasher = SipHasher24::new_with_keys(k0, k1);
        hasher.write(passphrase.as_bytes());
        let digest = hasher.finish128();
        half[..8].copy_from_slice(&digest.h1.to_le_bytes());
        half[8..].copy_from_slice(&digest.h2.to_le_bytes());
    }
    key
}

/// Compresses and encrypts a cache payload.
///
/// # Errors
///
/// Propagates cipher failures.
pub fn seal_payload(cipher: &dyn CacheCipher, payload: &[u8]) -> CacheResult<Vec<u8>> {
    cipher.encrypt(&compress_prepend_size(payload))
}

/// Decrypts and decompresses a cache blob.
///
/// # Errors
///
/// Returns an error if the blob fails authentication or decompression.
pub fn open_payload(cipher: &dyn CacheCipher, blob: &[u8]) -> CacheResult<Vec<u8>> {
    let compressed = cipher.decrypt(blob)?;
    Ok(decompress_size_prepended(&compressed)?)
}
