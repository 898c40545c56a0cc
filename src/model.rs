//! Records shared by the registry, lifecycle and decoder

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cipher;
use crate::domain::{EventId, GuardianId, ItemId};
use crate::error::{Error, Result};
use crate::keys::SecretKey;

/// Number of guardians every encrypted item is bound to
pub const GUARDIANS_PER_ITEM: usize = 3;

/// A rostered guardian
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
    pub id: GuardianId,
    /// Where key shares and schedule notices are delivered
    pub contact: String,
}

/// A question in plaintext, as authored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub statement: String,
    pub options: Vec<String>,
    pub correct_option: String,
}

impl Question {
    /// # Errors
    /// Returns [`Error::Validation`] if the statement or marker is blank or there are no options
    pub fn validate(&self) -> Result<()> {
        if self.statement.trim().is_empty() {
            return Err(Error::validation("question statement must not be empty"));
        }
        if self.options.is_empty() {
            return Err(Error::validation("question needs at least one option"));
        }
        if self.correct_option.trim().is_empty() {
            return Err(Error::validation("correct option marker must not be empty"));
        }
        Ok(())
    }
}

/// A question whose every field is hex ciphertext under one content key
///
/// The guardian set is fixed when the item is sealed and has no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedItem {
    id: ItemId,
    author: String,
    statement: String,
    options: Vec<String>,
    correct_option: String,
    guardians: [GuardianId; GUARDIANS_PER_ITEM],
    created_at: DateTime<Utc>,
}

impl EncryptedItem {
    /// Encrypts `question` under `key` and binds it to `guardians`
    ///
    /// # Errors
    /// - [`Error::Validation`] if the question is malformed or the guardians are not 3 distinct ids
    /// - [`Error::Crypto`] if encryption fails
    pub fn seal(
        author: &str,
        question: &Question,
        key: &SecretKey,
        guardians: &[GuardianId],
    ) -> Result<Self> {
        question.validate()?;
        let guardians = guardian_triple(guardians)?;
        let key = key.as_bytes();

        Ok(Self {
            id: ItemId::generate(),
            author: author.to_string(),
            statement: cipher::encrypt(&question.statement, key)?,
            options: question
                .options
                .iter()
                .map(|option| cipher::encrypt(option, key))
                .collect::<Result<_>>()?,
            correct_option: cipher::encrypt(&question.correct_option, key)?,
            guardians,
            created_at: Utc::now(),
        })
    }

    /// Decrypts every field; any failing field fails the whole item
    ///
    /// # Errors
    /// Returns [`Error::Crypto`] if a field does not decrypt
    pub fn open(&self, key: &[u8]) -> Result<DecodedItem> {
        Ok(DecodedItem {
            item_id: self.id,
            statement: cipher::decrypt(&self.statement, key)?,
            options: self
                .options
                .iter()
                .map(|option| cipher::decrypt(option, key))
                .collect::<Result<_>>()?,
            correct_option: cipher::decrypt(&self.correct_option, key)?,
        })
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    #[must_use]
    pub fn guardians(&self) -> &[GuardianId] {
        &self.guardians
    }

    #[must_use]
    pub fn is_bound_to(&self, guardian: &GuardianId) -> bool {
        self.guardians.contains(guardian)
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn guardian_triple(guardians: &[GuardianId]) -> Result<[GuardianId; GUARDIANS_PER_ITEM]> {
    let invalid = || {
        Error::validation(format!(
            "exactly {GUARDIANS_PER_ITEM} distinct guardians are required, got {}",
            guardians.len()
        ))
    };
    let distinct: HashSet<&GuardianId> = guardians.iter().collect();
    if distinct.len() != guardians.len() {
        return Err(invalid());
    }
    guardians.to_vec().try_into().map_err(|_| invalid())
}

/// One guardian's share slot for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianShareRecord {
    guardian: GuardianId,
    submitted: bool,
    share: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

impl GuardianShareRecord {
    #[must_use]
    pub fn pending(guardian: GuardianId) -> Self {
        Self {
            guardian,
            submitted: false,
            share: None,
            submitted_at: None,
        }
    }

    /// Stores the share once; a submitted record never changes again
    ///
    /// # Errors
    /// Returns [`Error::Conflict`] if the guardian already submitted
    pub fn submit(&mut self, share_hex: String, at: DateTime<Utc>) -> Result<()> {
        if self.submitted {
            return Err(Error::conflict(format!(
                "guardian {} has already submitted a share",
                self.guardian
            )));
        }
        self.submitted = true;
        self.share = Some(share_hex);
        self.submitted_at = Some(at);
        Ok(())
    }

    #[must_use]
    pub fn guardian(&self) -> &GuardianId {
        &self.guardian
    }

    #[must_use]
    pub fn has_submitted(&self) -> bool {
        self.submitted
    }

    /// Hex share, present only once submitted
    #[must_use]
    pub fn share(&self) -> Option<&str> {
        self.share.as_deref()
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }
}

/// Lifecycle of a protected event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl EventStatus {
    /// Scheduled or in progress; at most one event may be active
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, EventStatus::Scheduled | EventStatus::InProgress)
    }

    #[must_use]
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Scheduled, EventStatus::InProgress)
                | (EventStatus::Scheduled, EventStatus::Cancelled)
                | (EventStatus::InProgress, EventStatus::Completed)
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::InProgress => "in-progress",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        })
    }
}

/// Plaintext of one item after reconstruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedItem {
    pub item_id: ItemId,
    pub statement: String,
    pub options: Vec<String>,
    pub correct_option: String,
}

/// What an exam center is shown: no correct-option marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperQuestion {
    pub id: ItemId,
    pub statement: String,
    pub options: Vec<String>,
}

/// Public metadata of an event; never carries shares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: EventId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: EventStatus,
    pub has_decoded_items: bool,
}

/// A scheduled exam and everything needed to decode its paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedEvent {
    pub(crate) id: EventId,
    pub(crate) date: NaiveDate,
    pub(crate) start_time: NaiveTime,
    pub(crate) end_time: NaiveTime,
    pub(crate) status: EventStatus,
    pub(crate) guardian_keys: Vec<GuardianShareRecord>,
    pub(crate) items: Vec<ItemId>,
    pub(crate) decoded: Vec<DecodedItem>,
    pub(crate) created_at: DateTime<Utc>,
}

impl ProtectedEvent {
    /// A Scheduled event with no share records yet
    pub(crate) fn new(
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        items: Vec<ItemId>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            date,
            start_time,
            end_time,
            status: EventStatus::Scheduled,
            guardian_keys: Vec::new(),
            items,
            decoded: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> EventStatus {
        self.status
    }

    /// Start instant, reading date and start time as UTC
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.start_time).and_utc()
    }

    #[must_use]
    pub fn guardian_keys(&self) -> &[GuardianShareRecord] {
        &self.guardian_keys
    }

    #[must_use]
    pub fn record_for(&self, guardian: &GuardianId) -> Option<&GuardianShareRecord> {
        self.guardian_keys.iter().find(|r| r.guardian() == guardian)
    }

    pub(crate) fn record_for_mut(
        &mut self,
        guardian: &GuardianId,
    ) -> Option<&mut GuardianShareRecord> {
        self.guardian_keys
            .iter_mut()
            .find(|r| r.guardian() == guardian)
    }

    #[must_use]
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    #[must_use]
    pub fn decoded(&self) -> &[DecodedItem] {
        &self.decoded
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            id: self.id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            has_decoded_items: !self.decoded.is_empty(),
        }
    }

    /// Decoded questions without their answers
    #[must_use]
    pub fn published_paper(&self) -> Vec<PaperQuestion> {
        self.decoded
            .iter()
            .map(|d| PaperQuestion {
                id: d.item_id,
                statement: d.statement.clone(),
                options: d.options.clone(),
            })
            .collect()
    }
}
