//! Identifier newtypes for guardians, items and events

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Longest accepted guardian id
pub const MAX_GUARDIAN_ID_LEN: usize = 64;

/// Identifier of a guardian as known to the roster
///
/// Ids are ASCII letters, digits and `-_.@`. They end up in outbox file names,
/// so path separators are never accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuardianId(String);

impl GuardianId {
    /// # Errors
    /// Returns [`Error::Validation`] if the id is blank, too long, or has a
    /// character outside the accepted set
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("Guardian id must not be empty"));
        }
        if trimmed.len() > MAX_GUARDIAN_ID_LEN {
            return Err(Error::validation(format!(
                "Guardian id must be at most {MAX_GUARDIAN_ID_LEN} characters"
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@')))
        {
            return Err(Error::validation(format!(
                "Guardian id {trimmed:?} contains {bad:?}; use letters, digits and -_.@"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GuardianId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<GuardianId> for String {
    fn from(id: GuardianId) -> Self {
        id.0
    }
}

impl std::str::FromStr for GuardianId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| Error::validation(format!("invalid {}: {e}", stringify!($name))))
            }
        }
    };
}

uuid_id!(
    /// Identifier of one encrypted question
    ItemId
);

uuid_id!(
    /// Identifier of a scheduled exam
    EventId
);
