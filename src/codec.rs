//! Hex encoding at every boundary
//!
//! Shares, reconstructed keys and ciphertext cross every external boundary
//! (storage, notifications, CLI) as lowercase hex strings. A share is encoded as
//! `hex(index || data)`, so the 2-of-3 shares of a 32-byte key are 66 hex characters.
//!
//! ```rust
//! use paperlock::codec::{decode_share, encode_share};
//! use paperlock::domain::SplitConfig;
//! use paperlock::keys::KeyManager;
//!
//! # fn main() -> paperlock::Result<()> {
//! let manager = KeyManager::new(SplitConfig::default());
//! let shares = manager.split_key(&manager.generate_key())?;
//!
//! let hex = encode_share(&shares[0]);
//! assert_eq!(hex.len(), 66);
//! assert_eq!(decode_share(&hex)?, shares[0]);
//! # Ok(())
//! # }
//! ```

use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::keys::{SecretKey, Share};

/// Encodes a share as `hex(index || data)`
#[must_use]
pub fn encode_share(share: &Share) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(share.to_bytes().as_slice()))
}

/// Decodes a share from hex; surrounding whitespace is ignored
///
/// # Errors
/// Returns [`Error::InvalidShare`] if the text is not hex or not a well-formed share
pub fn decode_share(text: &str) -> Result<Share> {
    let bytes = Zeroizing::new(
        hex::decode(text.trim()).map_err(|e| Error::InvalidShare(format!("not hex: {e}")))?,
    );
    Share::from_bytes(&bytes)
}

/// Encodes a reconstructed key for display
#[must_use]
pub fn encode_key(key: &SecretKey) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(key.as_bytes()))
}

/// # Errors
/// Returns [`Error::Crypto`] if the text is not hex or not exactly 32 bytes
pub fn decode_key(text: &str) -> Result<SecretKey> {
    let bytes = Zeroizing::new(
        hex::decode(text.trim()).map_err(|e| Error::crypto(format!("key is not hex: {e}")))?,
    );
    SecretKey::from_bytes(&bytes)
}

/// Decodes stored ciphertext
///
/// # Errors
/// Returns [`Error::Crypto`] if the text is not hex
pub fn decode_ciphertext(text: &str) -> Result<Vec<u8>> {
    hex::decode(text.trim()).map_err(|e| Error::crypto(format!("ciphertext is not hex: {e}")))
}

#[must_use]
pub fn encode_ciphertext(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
