//! `ShareCount` newtype for key splitting

use crate::error::{Error, Result};

/// Number of shares to create (1..=254)
///
/// The maximum is 254 due to GF256 limitations in the blahaj crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShareCount(u8);

impl ShareCount {
    /// Minimum valid share count
    pub const MIN: u8 = 1;

    /// Maximum valid share count (254)
    pub const MAX: u8 = 254;

    /// One share per guardian bound to an item
    pub const DEFAULT: u8 = 3;

    /// Creates a new share count
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if count is 0 or 255
    ///
    /// # Examples
    ///
    /// ```rust
    /// use paperlock::domain::ShareCount;
    ///
    /// let count = ShareCount::new(3).unwrap();
    /// assert_eq!(*count, 3);
    ///
    /// assert!(ShareCount::new(0).is_err());
    /// assert!(ShareCount::new(255).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value == 0 {
            return Err(Error::validation("Share count must be at least 1"));
        }
        if value == 255 {
            return Err(Error::validation(
                "Share count maximum is 254 due to GF256 limitations",
            ));
        }
        Ok(Self(value))
    }
}

impl Default for ShareCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl std::ops::Deref for ShareCount {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
