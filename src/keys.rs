//! Content-key generation and threshold splitting
//!
//! A content key is a 32-byte random value. It is split into shares with a
//! [`SecretSharing`] scheme so that any `threshold` of the shares rebuild it exactly
//! while fewer reveal nothing. The default scheme is Shamir's polynomial sharing
//! over GF(256) provided by the blahaj crate; callers only ever see the trait.
//!
//! # Examples
//!
//! ```rust
//! use paperlock::domain::SplitConfig;
//! use paperlock::keys::KeyManager;
//!
//! # fn main() -> paperlock::Result<()> {
//! let manager = KeyManager::new(SplitConfig::default());
//! let key = manager.generate_key();
//! let shares = manager.split_key(&key)?;
//! assert_eq!(shares.len(), 3);
//!
//! // Any two of the three shares are enough
//! let recovered = manager.reconstruct_key(&[shares[2].clone(), shares[0].clone()])?;
//! assert_eq!(key, recovered);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use blahaj::Sharks;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::domain::{ShareIndex, SplitConfig, Threshold};
use crate::error::{Error, Result};

/// Length of a content key in bytes (AES-256)
pub const KEY_LENGTH: usize = 32;

/// A 256-bit content-encryption key
///
/// The bytes are wiped from memory when the key is dropped. `Debug` never prints them.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<[u8; KEY_LENGTH]>);

impl SecretKey {
    /// Generates a key from the operating system's CSPRNG
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    /// Wraps exactly [`KEY_LENGTH`] bytes as a key
    ///
    /// # Errors
    /// Returns [`Error::Crypto`] if `bytes` has any other length
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(Error::crypto(format!(
                "invalid key length: expected {KEY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// One indexed piece of a split key; meaningless on its own
///
/// `data` is the polynomial evaluated at `index`, one byte per key byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    index: ShareIndex,
    data: Zeroizing<Vec<u8>>,
}

impl Share {
    /// # Errors
    /// Returns [`Error::InvalidShare`] if `data` is empty
    pub fn new(index: ShareIndex, data: Vec<u8>) -> Result<Self> {
        let data = Zeroizing::new(data);
        if data.is_empty() {
            return Err(Error::InvalidShare("share carries no data".into()));
        }
        Ok(Self { index, data })
    }

    /// Parses the `index || data` byte layout
    ///
    /// # Errors
    /// Returns [`Error::InvalidShare`] if the blob is too short or the index is 0
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some((&index, data)) = bytes.split_first() else {
            return Err(Error::InvalidShare("empty share".into()));
        };
        let index = ShareIndex::new(index).map_err(|e| Error::InvalidShare(e.to_string()))?;
        Self::new(index, data.to_vec())
    }

    /// Serializes as `index || data`
    #[must_use]
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(1 + self.data.len()));
        out.push(*self.index);
        out.extend_from_slice(&self.data);
        out
    }

    #[must_use]
    pub fn index(&self) -> ShareIndex {
        self.index
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &*self.index)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A threshold secret-sharing primitive
///
/// Implementations must guarantee that any `threshold` distinct shares produced by one
/// `split` call rebuild the secret exactly, whichever subset is chosen.
pub trait SecretSharing: Send + Sync {
    /// Splits `secret` into `config.share_count()` shares
    ///
    /// # Errors
    /// Returns an error if the secret cannot be split under `config`
    fn split(&self, secret: &[u8], config: SplitConfig) -> Result<Vec<Share>>;

    /// Rebuilds the secret from at least `threshold` distinct shares
    ///
    /// # Errors
    /// Returns an error if the shares are malformed or too few
    fn combine(&self, shares: &[Share], threshold: Threshold) -> Result<Zeroizing<Vec<u8>>>;
}

/// Shamir's scheme over GF(256)
#[derive(Debug, Clone, Copy, Default)]
pub struct ShamirGf256;

impl SecretSharing for ShamirGf256 {
    fn split(&self, secret: &[u8], config: SplitConfig) -> Result<Vec<Share>> {
        if secret.is_empty() {
            return Err(Error::validation("cannot split an empty secret"));
        }
        let sharks = Sharks(*config.threshold());
        let dealer = sharks.dealer(secret);

        dealer
            .take(*config.share_count() as usize)
            .map(|share| {
                let bytes = Zeroizing::new(Vec::from(&share));
                Share::from_bytes(&bytes)
            })
            .collect()
    }

    fn combine(&self, shares: &[Share], threshold: Threshold) -> Result<Zeroizing<Vec<u8>>> {
        let parsed = shares
            .iter()
            .map(|share| {
                let bytes = share.to_bytes();
                blahaj::Share::try_from(bytes.as_slice())
                    .map_err(|e| Error::InvalidShare(format!("{e:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let sharks = Sharks(*threshold);
        let recovered = sharks
            .recover(&parsed)
            .map_err(|e| Error::InvalidShare(format!("failed to recover secret: {e:?}")))?;
        Ok(Zeroizing::new(recovered))
    }
}

/// Generates, splits and reconstructs content keys
#[derive(Debug, Clone)]
pub struct KeyManager<S = ShamirGf256> {
    scheme: S,
    config: SplitConfig,
}

impl KeyManager<ShamirGf256> {
    #[must_use]
    pub fn new(config: SplitConfig) -> Self {
        Self::with_scheme(ShamirGf256, config)
    }
}

/// Shamir over GF(256), 3 shares, threshold 2
impl Default for KeyManager<ShamirGf256> {
    fn default() -> Self {
        Self::new(SplitConfig::default())
    }
}

impl<S: SecretSharing> KeyManager<S> {
    /// Uses a custom sharing scheme
    pub fn with_scheme(scheme: S, config: SplitConfig) -> Self {
        Self { scheme, config }
    }

    #[must_use]
    pub fn config(&self) -> SplitConfig {
        self.config
    }

    #[must_use]
    pub fn threshold(&self) -> Threshold {
        self.config.threshold()
    }

    /// Fresh random content key
    #[must_use]
    pub fn generate_key(&self) -> SecretKey {
        SecretKey::generate()
    }

    /// Splits `key` into `share_count` shares, ordered by index
    ///
    /// # Errors
    /// Returns an error if the underlying scheme fails
    pub fn split_key(&self, key: &SecretKey) -> Result<Vec<Share>> {
        let shares = self.scheme.split(key.as_bytes(), self.config)?;
        if shares.len() != *self.config.share_count() as usize {
            return Err(Error::crypto(format!(
                "scheme produced {} shares, expected {}",
                shares.len(),
                *self.config.share_count()
            )));
        }
        Ok(shares)
    }

    /// Rebuilds a key from any `threshold` of its shares
    ///
    /// Shares repeating an index count once. Two shares with the same index but
    /// different data are rejected.
    ///
    /// # Errors
    /// - [`Error::Quorum`] if fewer than `threshold` distinct shares are given
    /// - [`Error::InvalidShare`] if a share has the wrong length or conflicts with another
    pub fn reconstruct_key(&self, shares: &[Share]) -> Result<SecretKey> {
        let mut distinct: BTreeMap<ShareIndex, &Share> = BTreeMap::new();
        for share in shares {
            if share.data().len() != KEY_LENGTH {
                return Err(Error::InvalidShare(format!(
                    "share {} carries {} bytes, expected {KEY_LENGTH}",
                    *share.index(),
                    share.data().len()
                )));
            }
            if let Some(existing) = distinct.insert(share.index(), share) {
                if existing.data() != share.data() {
                    return Err(Error::InvalidShare(format!(
                        "conflicting shares for index {}",
                        *share.index()
                    )));
                }
            }
        }

        let threshold = self.config.threshold();
        if distinct.len() < *threshold as usize {
            return Err(Error::Quorum {
                needed: *threshold,
                got: distinct.len(),
            });
        }

        let unique: Vec<Share> = distinct.into_values().cloned().collect();
        let secret = self.scheme.combine(&unique, threshold)?;
        SecretKey::from_bytes(&secret)
    }
}
