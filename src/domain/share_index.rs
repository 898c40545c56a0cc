//! `ShareIndex` newtype: the evaluation point of a share

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Share index (1..=255)
///
/// This is the x-coordinate the share polynomial was evaluated at.
/// Index 0 is the secret itself and never appears in a legitimate share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ShareIndex(u8);

impl ShareIndex {
    /// Creates a new share index
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if index is 0
    ///
    /// # Examples
    ///
    /// ```rust
    /// use paperlock::domain::ShareIndex;
    ///
    /// let index = ShareIndex::new(1).unwrap();
    /// assert_eq!(*index, 1);
    ///
    /// assert!(ShareIndex::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value == 0 {
            return Err(Error::validation(
                "Share index 0 is the secret's evaluation point",
            ));
        }
        Ok(Self(value))
    }
}

impl TryFrom<u8> for ShareIndex {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ShareIndex> for u8 {
    fn from(index: ShareIndex) -> Self {
        index.0
    }
}

impl std::ops::Deref for ShareIndex {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
