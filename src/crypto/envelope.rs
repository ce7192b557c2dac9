//! AES-256-GCM envelope sealing and opening.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Byte length of the derived AES-256 key.
pub const KEY_LEN: usize = 32;

/// Byte length of the GCM nonce.
pub const NONCE_LEN: usize = 12;

/// Wire encoding of a single ciphertext.
///
/// Serialized compact, both fields standard base64; the ciphertext carries the
/// 16-byte authentication tag at the end.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    nonce: String,
    ciphertext: String,
}

/// Errors produced by the envelope codec.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The secret word was empty; callers must check for transparent mode first.
    #[error("empty word")]
    EmptyWord,

    /// The OS CSPRNG failed to produce a nonce.
    #[error("nonce generation failed")]
    Entropy,

    /// The underlying cipher rejected the operation.
    #[error("encryption failed")]
    Encrypt,

    /// The payload was not a valid JSON envelope.
    #[error("invalid encrypted payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// The nonce field did not decode to a usable nonce.
    #[error("invalid nonce")]
    InvalidNonce,

    /// The ciphertext field was not valid base64.
    #[error("invalid ciphertext")]
    InvalidCiphertext,

    /// Authentication failed: wrong word or tampered envelope.
    #[error("decryption failed")]
    Decrypt,
}

/// Derive the symmetric key from the secret word.
fn derive_key(word: &str) -> Result<[u8; KEY_LEN], CryptoError> {
    if word.is_empty() {
        return Err(CryptoError::EmptyWord);
    }
    Ok(Sha256::digest(word.as_bytes()).into())
}

/// Encrypt `plaintext` under `word`, returning the serialized JSON envelope.
///
/// Every call samples a fresh nonce, so sealing the same input twice yields
/// different envelopes.
pub fn seal(word: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = derive_key(word)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|_| CryptoError::Entropy)?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let envelope = Envelope {
        nonce: BASE64.encode(nonce),
        ciphertext: BASE64.encode(&ciphertext),
    };
    serde_json::to_vec(&envelope).map_err(|_| CryptoError::Encrypt)
}

/// Decrypt a serialized envelope back to the plaintext.
pub fn open(word: &str, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let envelope: Envelope =
        serde_json::from_slice(payload).map_err(CryptoError::InvalidPayload)?;

    let nonce = BASE64
        .decode(&envelope.nonce)
        .map_err(|_| CryptoError::InvalidNonce)?;
    let ciphertext = BASE64
        .decode(&envelope.ciphertext)
        .map_err(|_| CryptoError::InvalidCiphertext)?;
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Decrypt);
    }

    let key = derive_key(word)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| CryptoError::Decrypt)
}
