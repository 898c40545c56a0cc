//! Per-event tracking of guardian share submissions

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::codec;
use crate::domain::{EventId, GuardianId};
use crate::error::{Error, Result};
use crate::model::{EventSummary, Guardian, GuardianShareRecord, ProtectedEvent};
use crate::store::{Store, VaultState};

/// What a guardian may learn about its own submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareStatus {
    pub has_submitted: bool,
    pub event: EventSummary,
}

/// Accepts each guardian's share at most once per event
#[derive(Debug)]
pub struct ShareRegistry<S> {
    store: Arc<S>,
}

impl<S: Store> ShareRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Seeds one pending record per rostered guardian
    ///
    /// Repeated roster entries produce a single record.
    pub fn initialize(event: &mut ProtectedEvent, roster: &[Guardian]) {
        let mut seen = HashSet::new();
        event.guardian_keys = roster
            .iter()
            .filter(|g| seen.insert(g.id.clone()))
            .map(|g| GuardianShareRecord::pending(g.id.clone()))
            .collect();
    }

    /// Records `guardian`'s share for `event_id`
    ///
    /// # Errors
    /// - [`Error::Validation`] if `share_hex` is not a well-formed hex share
    /// - [`Error::NotFound`] if the event is unknown or the guardian is not on it
    /// - [`Error::State`] if the event is neither Scheduled nor InProgress
    /// - [`Error::Conflict`] if the guardian already submitted
    pub fn submit_share(
        &self,
        event_id: EventId,
        guardian: &GuardianId,
        share_hex: &str,
    ) -> Result<()> {
        let share = canonical_share(share_hex)?;
        self.store
            .transact(|state| submit_in(state, event_id, guardian, share))?;
        info!(event = %event_id, guardian = %guardian, "key share submitted");
        Ok(())
    }

    /// Submits to whichever active event lists `guardian`
    ///
    /// # Errors
    /// Same as [`ShareRegistry::submit_share`]; [`Error::NotFound`] if no active event lists the guardian
    pub fn submit_for_active(&self, guardian: &GuardianId, share_hex: &str) -> Result<EventId> {
        let share = canonical_share(share_hex)?;
        let event_id = self.store.transact(|state| {
            let event_id = active_event_for(state, guardian)
                .ok_or_else(|| Error::not_found("no active exam lists this guardian"))?;
            submit_in(state, event_id, guardian, share)?;
            Ok(event_id)
        })?;
        info!(event = %event_id, guardian = %guardian, "key share submitted");
        Ok(event_id)
    }

    /// Whether `guardian` has submitted, plus public event metadata
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the event is unknown or the guardian is not on it
    pub fn query_status(&self, event_id: EventId, guardian: &GuardianId) -> Result<ShareStatus> {
        self.store.read(|state| {
            let event = state.event(event_id)?;
            status_of(event, guardian)
        })?
    }

    /// Status against the active event, or `None` when no active event lists `guardian`
    ///
    /// # Errors
    /// Returns a storage error if the state cannot be read
    pub fn status_for_active(&self, guardian: &GuardianId) -> Result<Option<ShareStatus>> {
        self.store.read(|state| {
            active_event_for(state, guardian)
                .map(|id| state.event(id).and_then(|event| status_of(event, guardian)))
                .transpose()
        })?
    }
}

fn canonical_share(share_hex: &str) -> Result<String> {
    let share = codec::decode_share(share_hex)
        .map_err(|e| Error::validation(format!("malformed share: {e}")))?;
    Ok(codec::encode_share(&share).to_string())
}

fn active_event_for(state: &VaultState, guardian: &GuardianId) -> Option<EventId> {
    state
        .events
        .values()
        .find(|e| e.status().is_active() && e.record_for(guardian).is_some())
        .map(ProtectedEvent::id)
}

fn submit_in(
    state: &mut VaultState,
    event_id: EventId,
    guardian: &GuardianId,
    share: String,
) -> Result<()> {
    let event = state.event_mut(event_id)?;
    if !event.status().is_active() {
        return Err(Error::state(format!(
            "event {event_id} is {} and no longer accepts shares",
            event.status()
        )));
    }
    let record = event
        .record_for_mut(guardian)
        .ok_or_else(|| Error::not_found(format!("guardian {guardian} on event {event_id}")))?;
    record.submit(share, Utc::now())
}

fn status_of(event: &ProtectedEvent, guardian: &GuardianId) -> Result<ShareStatus> {
    let record = event
        .record_for(guardian)
        .ok_or_else(|| Error::not_found(format!("guardian {guardian} on event {}", event.id())))?;
    Ok(ShareStatus {
        has_submitted: record.has_submitted(),
        event: event.summary(),
    })
}
