//! Threshold newtype for key splitting

use crate::error::{Error, Result};

/// Reconstruction threshold (2..=255)
///
/// Invariant: threshold >= 2 (enforced at construction)
/// A threshold of 1 would let any single guardian recover the content key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threshold(u8);

impl Threshold {
    /// Threshold used for every exam content key
    pub const DEFAULT: u8 = 2;

    /// Creates a new threshold, returning an error if value < 2
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the threshold is less than 2
    ///
    /// # Examples
    ///
    /// ```rust
    /// use paperlock::domain::Threshold;
    ///
    /// let threshold = Threshold::new(2).unwrap();
    /// assert_eq!(*threshold, 2);
    ///
    /// assert!(Threshold::new(1).is_err());
    /// assert!(Threshold::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value < 2 {
            return Err(Error::validation(format!(
                "Threshold must be at least 2 (got {value})"
            )));
        }
        Ok(Self(value))
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl std::ops::Deref for Threshold {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
