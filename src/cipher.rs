//! Text field encryption under a content key
//!
//! AES-256 in ECB mode with PKCS#7 padding; ciphertext is hex. The mode is
//! deterministic (equal plaintext blocks give equal ciphertext blocks) and carries
//! no integrity tag, so it is kept only for compatibility with content already
//! encrypted this way.
//!
//! A wrong key is not reliably detected. Decrypting under the wrong key returns
//! [`Error::Crypto`] when the padding or UTF-8 check fails, and otherwise returns
//! garbled text. Either way the result is a pure function of its inputs.
//!
//! ```rust
//! use paperlock::cipher;
//! use paperlock::keys::SecretKey;
//!
//! # fn main() -> paperlock::Result<()> {
//! let key = SecretKey::generate();
//! let sealed = cipher::encrypt("What is 2 + 2?", key.as_bytes())?;
//! assert_eq!(cipher::decrypt(&sealed, key.as_bytes())?, "What is 2 + 2?");
//! # Ok(())
//! # }
//! ```

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use tracing::warn;
use zeroize::Zeroizing;

use crate::codec;
use crate::error::{Error, Result};
use crate::keys::KEY_LENGTH;

type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Fits any key blob to [`KEY_LENGTH`] bytes
///
/// Longer blobs are truncated and shorter ones are zero-padded on the right.
/// A padded key has less entropy than a real one, so the adjustment is logged.
#[must_use]
pub fn normalize_key(key: &[u8]) -> Zeroizing<[u8; KEY_LENGTH]> {
    if key.len() != KEY_LENGTH {
        warn!(
            from = key.len(),
            to = KEY_LENGTH,
            "adjusting key length before use"
        );
    }
    let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
    let take = key.len().min(KEY_LENGTH);
    out[..take].copy_from_slice(&key[..take]);
    out
}

/// Encrypts UTF-8 text, returning hex ciphertext
///
/// # Errors
/// Returns [`Error::Crypto`] if the cipher cannot be keyed
pub fn encrypt(text: &str, key: &[u8]) -> Result<String> {
    let key = normalize_key(key);
    let cipher = Aes256EcbEnc::new_from_slice(&key[..])
        .map_err(|e| Error::crypto(format!("cannot key cipher: {e}")))?;
    let sealed = cipher.encrypt_padded_vec_mut::<Pkcs7>(text.as_bytes());
    Ok(codec::encode_ciphertext(&sealed))
}

/// Decrypts hex ciphertext back to text
///
/// # Errors
/// Returns [`Error::Crypto`] if the ciphertext is not hex, not block aligned,
/// fails the padding check, or does not decrypt to UTF-8
pub fn decrypt(ciphertext: &str, key: &[u8]) -> Result<String> {
    let sealed = codec::decode_ciphertext(ciphertext)?;
    if sealed.is_empty() || sealed.len() % BLOCK_SIZE != 0 {
        return Err(Error::crypto(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
            sealed.len()
        )));
    }

    let key = normalize_key(key);
    let cipher = Aes256EcbDec::new_from_slice(&key[..])
        .map_err(|e| Error::crypto(format!("cannot key cipher: {e}")))?;
    let plain = Zeroizing::new(
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&sealed)
            .map_err(|_| Error::crypto("bad decrypt: padding check failed"))?,
    );

    String::from_utf8(plain.to_vec())
        .map_err(|_| Error::crypto("bad decrypt: plaintext is not UTF-8"))
}
