//! Configuration validation for key splits

use crate::error::{Error, Result};

use super::{ShareCount, Threshold};

/// Validated pair of threshold and share count
///
/// Enforces the invariant that threshold <= `share_count` at the type level.
/// This prevents creating configurations where more shares are required
/// than actually exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
    threshold: Threshold,
    share_count: ShareCount,
}

impl SplitConfig {
    /// Creates a new split configuration
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if threshold exceeds share count
    ///
    /// # Examples
    ///
    /// ```rust
    /// use paperlock::domain::{SplitConfig, Threshold, ShareCount};
    ///
    /// let config = SplitConfig::new(
    ///     Threshold::new(2).unwrap(),
    ///     ShareCount::new(3).unwrap()
    /// ).unwrap();
    ///
    /// assert_eq!(*config.threshold(), 2);
    /// assert_eq!(*config.share_count(), 3);
    ///
    /// let result = SplitConfig::new(
    ///     Threshold::new(5).unwrap(),
    ///     ShareCount::new(3).unwrap()
    /// );
    /// assert!(result.is_err());
    /// ```
    pub fn new(threshold: Threshold, share_count: ShareCount) -> Result<Self> {
        if *threshold > *share_count {
            return Err(Error::validation(format!(
                "Threshold {} cannot exceed share count {}",
                *threshold, *share_count
            )));
        }
        Ok(Self {
            threshold,
            share_count,
        })
    }

    /// Builds a config from raw numbers, validating both halves
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if either value or the pair is invalid
    pub fn from_raw(threshold: u8, share_count: u8) -> Result<Self> {
        Self::new(Threshold::new(threshold)?, ShareCount::new(share_count)?)
    }

    /// Gets the threshold value
    #[must_use]
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Gets the share count value
    #[must_use]
    pub fn share_count(&self) -> ShareCount {
        self.share_count
    }
}

/// 3 shares, any 2 reconstruct
impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            threshold: Threshold::default(),
            share_count: ShareCount::default(),
        }
    }
}
