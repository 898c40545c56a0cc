//! Scheduling and state transitions of protected events

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::domain::{EventId, ItemId};
use crate::error::{Error, Result};
use crate::model::{EventStatus, EventSummary, ProtectedEvent};
use crate::notify::{DispatchReport, Dispatcher, Notice};
use crate::registry::ShareRegistry;
use crate::store::Store;

/// Items drawn for every paper unless configured otherwise
pub const DEFAULT_PAPER_SIZE: usize = 25;

/// When an exam runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Result of a successful [`EventLifecycle::schedule`]
#[derive(Debug, Clone)]
pub struct Scheduled {
    pub event: EventSummary,
    pub notices: DispatchReport,
}

/// Owns the single-active-event invariant
#[derive(Debug)]
pub struct EventLifecycle<S> {
    store: Arc<S>,
    dispatcher: Dispatcher,
    paper_size: usize,
}

impl<S: Store> EventLifecycle<S> {
    pub fn new(store: Arc<S>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            paper_size: DEFAULT_PAPER_SIZE,
        }
    }

    #[must_use]
    pub fn with_paper_size(mut self, paper_size: usize) -> Self {
        self.paper_size = paper_size;
        self
    }

    #[must_use]
    pub fn paper_size(&self) -> usize {
        self.paper_size
    }

    /// Creates a Scheduled event over a fresh sample of the item pool
    ///
    /// The active-event check, the sampling and the insert happen in one
    /// transaction. Guardians are told about the exam afterwards; a failed
    /// notice does not undo the event.
    ///
    /// # Errors
    /// - [`Error::Validation`] if the slot ends before it starts
    /// - [`Error::Conflict`] if another event is Scheduled or InProgress
    /// - [`Error::NoGuardians`] if the roster is empty
    /// - [`Error::InsufficientItems`] if the pool is smaller than the paper
    pub fn schedule(&self, slot: ExamSlot) -> Result<Scheduled> {
        if slot.end_time <= slot.start_time {
            return Err(Error::validation("end time must be after start time"));
        }
        let paper_size = self.paper_size;

        let (event, roster) = self.store.transact(|state| {
            if let Some(active) = state.active_event() {
                return Err(Error::conflict(format!(
                    "event {} is already {}",
                    active.id(),
                    active.status()
                )));
            }
            if state.guardians.is_empty() {
                return Err(Error::NoGuardians);
            }
            if state.items.len() < paper_size {
                return Err(Error::InsufficientItems {
                    needed: paper_size,
                    available: state.items.len(),
                });
            }

            let pool: Vec<ItemId> = state.items.keys().copied().collect();
            let sample = pool
                .choose_multiple(&mut rand::thread_rng(), paper_size)
                .copied()
                .collect();
            let mut event =
                ProtectedEvent::new(slot.date, slot.start_time, slot.end_time, sample);
            ShareRegistry::<S>::initialize(&mut event, &state.guardians);

            let summary = event.summary();
            state.events.insert(event.id(), event);
            Ok((summary, state.guardians.clone()))
        })?;
        info!(
            event = %event.id,
            date = %event.date,
            start = %event.start_time,
            items = paper_size,
            guardians = roster.len(),
            "exam scheduled"
        );

        let notices: Vec<Notice> = roster
            .into_iter()
            .map(|g| Notice::Schedule {
                guardian: g.id,
                contact: g.contact,
                summary: event.clone(),
            })
            .collect();
        let report = self.dispatcher.send_all(&notices);
        if !report.failed.is_empty() {
            warn!(
                event = %event.id,
                failed = report.failed.len(),
                "some schedule notices were not delivered"
            );
        }

        Ok(Scheduled {
            event,
            notices: report,
        })
    }

    /// Scheduled to InProgress
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown id, [`Error::State`] from any other status
    pub fn start(&self, id: EventId) -> Result<EventSummary> {
        self.transition(id, EventStatus::InProgress)
    }

    /// InProgress to Completed
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown id, [`Error::State`] from any other status
    pub fn complete(&self, id: EventId) -> Result<EventSummary> {
        self.transition(id, EventStatus::Completed)
    }

    /// Scheduled to Cancelled
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown id, [`Error::State`] from any other status
    pub fn cancel(&self, id: EventId) -> Result<EventSummary> {
        self.transition(id, EventStatus::Cancelled)
    }

    fn transition(&self, id: EventId, next: EventStatus) -> Result<EventSummary> {
        let (from, summary) = self.store.transact(|state| {
            let event = state.event_mut(id)?;
            let from = event.status();
            if !from.can_transition_to(next) {
                return Err(Error::state(format!(
                    "event {id} cannot move from {from} to {next}"
                )));
            }
            event.status = next;
            Ok((from, event.summary()))
        })?;
        info!(event = %id, %from, to = %next, "event status changed");
        Ok(summary)
    }

    /// Removes the event and empties the whole candidate item pool
    ///
    /// Every item goes, including ones never drawn for this event. Returns the
    /// number of items removed.
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown id, [`Error::State`] while the event is InProgress
    pub fn delete(&self, id: EventId) -> Result<usize> {
        let removed = self.store.transact(|state| {
            let status = state.event(id)?.status();
            if status == EventStatus::InProgress {
                return Err(Error::state(format!(
                    "event {id} is in progress and cannot be deleted"
                )));
            }
            state.events.remove(&id);
            let removed = state.items.len();
            state.items.clear();
            Ok(removed)
        })?;
        info!(event = %id, items_removed = removed, "event deleted with the item pool");
        Ok(removed)
    }

    /// The Scheduled or InProgress event, if any
    ///
    /// # Errors
    /// Returns a storage error if the state cannot be read
    pub fn active_event(&self) -> Result<Option<ProtectedEvent>> {
        self.store.read(|state| state.active_event().cloned())
    }

    /// # Errors
    /// [`Error::NotFound`] for an unknown id
    pub fn event(&self, id: EventId) -> Result<ProtectedEvent> {
        self.store.read(|state| state.event(id).cloned())?
    }
}
