//! Reconstructs content keys and decrypts an event's paper
//!
//! Each item is decoded on its own from the shares its three guardians have
//! submitted. Items short of quorum, or whose shares or ciphertext do not check
//! out, are skipped; the batch only fails when nothing decodes at all.
//!
//! Decoding is serialized per event, and the decoded set is written once inside
//! a transaction that re-checks it is still empty, so concurrent manual and
//! periodic triggers cannot produce two different papers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::codec;
use crate::domain::EventId;
use crate::error::{Error, Result};
use crate::keys::{KeyManager, SecretSharing, ShamirGf256, Share};
use crate::model::{DecodedItem, EncryptedItem, EventStatus, ProtectedEvent};
use crate::store::Store;
use crate::timegate::TimeGate;

/// What a successful decode call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The decoded set was written with `count` items
    Decoded { count: usize },
    /// The event already had `count` decoded items; nothing changed
    AlreadyDecoded { count: usize },
}

impl DecodeOutcome {
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            DecodeOutcome::Decoded { count } | DecodeOutcome::AlreadyDecoded { count } => count,
        }
    }
}

/// One event handled by [`PaperDecoder::run_periodic`]
#[derive(Debug)]
pub struct TickEntry {
    pub event: EventId,
    pub result: Result<DecodeOutcome>,
}

pub struct PaperDecoder<S, K = ShamirGf256> {
    store: Arc<S>,
    keys: KeyManager<K>,
    gate: TimeGate,
    locks: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
}

impl<S: Store> PaperDecoder<S> {
    /// Shamir over GF(256) with threshold 2
    pub fn new(store: Arc<S>, gate: TimeGate) -> Self {
        Self::with_key_manager(store, KeyManager::default(), gate)
    }
}

impl<S: Store, K: SecretSharing> PaperDecoder<S, K> {
    pub fn with_key_manager(store: Arc<S>, keys: KeyManager<K>, gate: TimeGate) -> Self {
        Self {
            store,
            keys,
            gate,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn gate(&self) -> TimeGate {
        self.gate
    }

    /// Decodes on request, without consulting the time gate
    ///
    /// # Errors
    /// - [`Error::NotFound`] for an unknown event
    /// - [`Error::State`] unless the event is Scheduled or InProgress
    /// - [`Error::NoItemsDecoded`] if no item reached quorum and decrypted; the event is unchanged
    pub fn decode_manual(&self, id: EventId) -> Result<DecodeOutcome> {
        self.with_event_lock(id, || self.decode_locked(id, EventStatus::is_active))
    }

    /// One pass of the automatic trigger
    ///
    /// Every Scheduled event with nothing decoded yet whose start lies inside
    /// the window is decoded. Failures are logged and reported, never raised.
    pub fn run_periodic(&self, now: DateTime<Utc>) -> Vec<TickEntry> {
        let due = match self.store.read(|state| {
            state
                .events
                .values()
                .filter(|e| is_pending(e) && self.gate.is_within_window(e, now))
                .map(ProtectedEvent::id)
                .collect::<Vec<_>>()
        }) {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "could not scan events for decoding");
                return Vec::new();
            }
        };
        debug!(due = due.len(), %now, "periodic decode pass");

        due.into_iter()
            .map(|id| {
                let result = self.with_event_lock(id, || {
                    self.decode_locked(id, |status| status == EventStatus::Scheduled)
                });
                if let Err(e) = &result {
                    warn!(event = %id, error = %e, "periodic decode failed");
                }
                TickEntry { event: id, result }
            })
            .collect()
    }

    /// Runs `f` holding the event's decode lock
    ///
    /// The map entry is dropped again once no other caller holds or waits on it.
    fn with_event_lock<R>(&self, id: EventId, f: impl FnOnce() -> R) -> R {
        let lock = Arc::clone(self.locks.lock().entry(id).or_default());
        let out = {
            let _guard = lock.lock();
            f()
        };

        let mut locks = self.locks.lock();
        // The map and `lock` are the only owners left.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&id);
        }
        out
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().len()
    }

    fn decode_locked(
        &self,
        id: EventId,
        accepts: impl Fn(EventStatus) -> bool,
    ) -> Result<DecodeOutcome> {
        let (event, items) = self.store.read(|state| {
            let event = state.event(id)?.clone();
            let items: Vec<Option<EncryptedItem>> = event
                .items()
                .iter()
                .map(|item| state.items.get(item).cloned())
                .collect();
            Ok::<_, Error>((event, items))
        })??;

        if !accepts(event.status()) {
            return Err(Error::state(format!(
                "event {id} is {} and cannot be decoded",
                event.status()
            )));
        }
        if !event.decoded().is_empty() {
            debug!(event = %id, "already decoded");
            return Ok(DecodeOutcome::AlreadyDecoded {
                count: event.decoded().len(),
            });
        }

        let decoded: Vec<DecodedItem> = event
            .items()
            .iter()
            .zip(items)
            .filter_map(|(item_id, item)| match item {
                Some(item) => self.decode_item(&event, &item),
                None => {
                    warn!(event = %id, item = %item_id, "item no longer in the pool, skipping");
                    None
                }
            })
            .collect();

        if decoded.is_empty() {
            warn!(event = %id, items = event.items().len(), "no item could be decoded");
            return Err(Error::NoItemsDecoded);
        }
        let skipped = event.items().len() - decoded.len();

        let outcome = self.store.transact(|state| {
            let event = state.event_mut(id)?;
            if !event.decoded.is_empty() {
                return Ok(DecodeOutcome::AlreadyDecoded {
                    count: event.decoded.len(),
                });
            }
            if !accepts(event.status()) {
                return Err(Error::state(format!(
                    "event {id} became {} while decoding",
                    event.status()
                )));
            }
            let count = decoded.len();
            event.decoded = decoded;
            Ok(DecodeOutcome::Decoded { count })
        })?;

        if let DecodeOutcome::Decoded { count } = outcome {
            info!(event = %id, decoded = count, skipped, "paper decoded");
        }
        Ok(outcome)
    }

    fn decode_item(&self, event: &ProtectedEvent, item: &EncryptedItem) -> Option<DecodedItem> {
        let shares: Vec<Share> = item
            .guardians()
            .iter()
            .filter_map(|g| {
                let hex = event.record_for(g).and_then(|r| r.share())?;
                match codec::decode_share(hex) {
                    Ok(share) => Some(share),
                    Err(e) => {
                        warn!(
                            item = %item.id(),
                            guardian = %g,
                            error = %e,
                            "stored share is malformed, ignoring it"
                        );
                        None
                    }
                }
            })
            .collect();

        let needed = *self.keys.threshold() as usize;
        if shares.len() < needed {
            debug!(item = %item.id(), have = shares.len(), needed, "below quorum, skipping");
            return None;
        }

        // A bad share spoils interpolation over the full set, so fall back to
        // every quorum-sized subset in roster order.
        let fallback = if shares.len() > needed {
            subsets(&shares, needed)
        } else {
            Vec::new()
        };
        for candidate in std::iter::once(shares).chain(fallback) {
            match self.open_with(item, &candidate) {
                Ok(decoded) => return Some(decoded),
                Err(e) => debug!(
                    item = %item.id(),
                    shares = candidate.len(),
                    error = %e,
                    "share set did not open item"
                ),
            }
        }
        warn!(item = %item.id(), "no share combination opens the item, skipping");
        None
    }

    fn open_with(&self, item: &EncryptedItem, shares: &[Share]) -> Result<DecodedItem> {
        let key = self.keys.reconstruct_key(shares)?;
        item.open(key.as_bytes())
    }
}

/// Every `k`-element subset of `shares`, keeping their order
fn subsets(shares: &[Share], k: usize) -> Vec<Vec<Share>> {
    fn walk(
        shares: &[Share],
        k: usize,
        start: usize,
        picked: &mut Vec<Share>,
        out: &mut Vec<Vec<Share>>,
    ) {
        if picked.len() == k {
            out.push(picked.clone());
            return;
        }
        for (i, share) in shares.iter().enumerate().skip(start) {
            picked.push(share.clone());
            walk(shares, k, i + 1, picked, out);
            picked.pop();
        }
    }

    let mut out = Vec::new();
    walk(shares, k, 0, &mut Vec::with_capacity(k), &mut out);
    out
}

impl<S, K> std::fmt::Debug for PaperDecoder<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperDecoder")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

fn is_pending(event: &ProtectedEvent) -> bool {
    event.status() == EventStatus::Scheduled && event.decoded().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GuardianId, SplitConfig};
    use crate::keys::SecretKey;
    use crate::model::{Guardian, Question};
    use crate::registry::ShareRegistry;
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate, NaiveTime};

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: ShareRegistry<MemoryStore>,
        event: EventId,
        /// hex shares per guardian, by guardian id
        shares: HashMap<String, String>,
    }

    fn gid(id: &str) -> GuardianId {
        GuardianId::new(id).unwrap()
    }

    fn question(n: usize) -> Question {
        Question {
            statement: format!("What is {n} + {n}?"),
            options: vec![format!("{}", n * 2), format!("{}", n * 3)],
            correct_option: "A".into(),
        }
    }

    /// Two batches: items 0..2 guarded by a,b,c and items 2..4 by d,e,f
    fn fixture(starts_at: DateTime<Utc>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let manager = KeyManager::new(SplitConfig::default());
        let mut shares = HashMap::new();

        let event = store
            .transact(|state| {
                let mut items = Vec::new();
                for (batch, ids) in [["a", "b", "c"], ["d", "e", "f"]].iter().enumerate() {
                    let guardians: Vec<GuardianId> = ids.iter().map(|id| gid(id)).collect();
                    for g in &guardians {
                        state.guardians.push(Guardian {
                            id: g.clone(),
                            contact: format!("{g}@example.org"),
                        });
                    }
                    let key = SecretKey::generate();
                    for n in 0..2 {
                        let item =
                            EncryptedItem::seal("setter", &question(batch * 2 + n), &key, &guardians)?;
                        items.push(item.id());
                        state.items.insert(item.id(), item);
                    }
                    for (g, share) in guardians.iter().zip(manager.split_key(&key)?) {
                        shares.insert(g.to_string(), codec::encode_share(&share).to_string());
                    }
                }
                let mut event = ProtectedEvent::new(
                    starts_at.date_naive(),
                    starts_at.time(),
                    starts_at.time() + Duration::hours(2),
                    items,
                );
                ShareRegistry::<MemoryStore>::initialize(&mut event, &state.guardians);
                let id = event.id();
                state.events.insert(id, event);
                Ok(id)
            })
            .unwrap();

        Fixture {
            registry: ShareRegistry::new(Arc::clone(&store)),
            store,
            event,
            shares,
        }
    }

    impl Fixture {
        fn submit(&self, guardian: &str) {
            self.registry
                .submit_share(self.event, &gid(guardian), &self.shares[guardian])
                .unwrap();
        }

        fn decoder(&self) -> PaperDecoder<MemoryStore> {
            PaperDecoder::new(Arc::clone(&self.store), TimeGate::default())
        }

        fn decoded(&self) -> Vec<DecodedItem> {
            self.store
                .read(|s| s.events[&self.event].decoded().to_vec())
                .unwrap()
        }
    }

    fn later() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
            .and_utc()
    }

    #[test]
    fn items_below_quorum_are_skipped() {
        let fx = fixture(later());
        fx.submit("a");
        fx.submit("b");
        fx.submit("d");

        let outcome = fx.decoder().decode_manual(fx.event).unwrap();

        assert_eq!(outcome, DecodeOutcome::Decoded { count: 2 });
        let statements: Vec<_> = fx.decoded().into_iter().map(|d| d.statement).collect();
        assert_eq!(statements, vec!["What is 0 + 0?", "What is 1 + 1?"]);
    }

    #[test]
    fn nothing_decoded_leaves_event_retryable() {
        let fx = fixture(later());
        fx.submit("a");
        fx.submit("d");
        let decoder = fx.decoder();

        assert!(matches!(
            decoder.decode_manual(fx.event),
            Err(Error::NoItemsDecoded)
        ));
        assert!(fx.decoded().is_empty());

        fx.submit("e");
        assert_eq!(
            decoder.decode_manual(fx.event).unwrap(),
            DecodeOutcome::Decoded { count: 2 }
        );
    }

    #[test]
    fn second_decode_is_a_no_op() {
        let fx = fixture(later());
        fx.submit("a");
        fx.submit("c");
        let decoder = fx.decoder();
        decoder.decode_manual(fx.event).unwrap();
        let first = fx.decoded();

        fx.submit("e");
        fx.submit("f");
        assert_eq!(
            decoder.decode_manual(fx.event).unwrap(),
            DecodeOutcome::AlreadyDecoded { count: 2 }
        );
        assert_eq!(fx.decoded(), first);
    }

    #[test]
    fn corrupted_share_only_costs_its_item() {
        let fx = fixture(later());
        for g in ["a", "b", "d"] {
            fx.submit(g);
        }
        // Well-formed, but not a share of e's key.
        let forged = format!("02{}", "00".repeat(32));
        fx.registry
            .submit_share(fx.event, &gid("e"), &forged)
            .unwrap();

        let outcome = fx.decoder().decode_manual(fx.event).unwrap();
        assert!(outcome.count() >= 2);
        assert!(
            fx.decoded()
                .iter()
                .any(|d| d.statement == "What is 0 + 0?")
        );
    }

    #[test]
    fn honest_pair_outvotes_a_forged_third_share() {
        let fx = fixture(later());
        for g in ["a", "b", "d", "e"] {
            fx.submit(g);
        }
        // Well-formed and at c's own index, but not c's share.
        let forged = format!("03{}", "00".repeat(32));
        fx.registry
            .submit_share(fx.event, &gid("c"), &forged)
            .unwrap();

        let outcome = fx.decoder().decode_manual(fx.event).unwrap();

        assert_eq!(outcome, DecodeOutcome::Decoded { count: 4 });
        let statements: Vec<_> = fx.decoded().into_iter().map(|d| d.statement).collect();
        assert_eq!(
            statements,
            vec![
                "What is 0 + 0?",
                "What is 1 + 1?",
                "What is 2 + 2?",
                "What is 3 + 3?"
            ]
        );
    }

    #[test]
    fn subsets_keep_roster_order() {
        let manager = KeyManager::new(SplitConfig::default());
        let shares = manager.split_key(&SecretKey::generate()).unwrap();

        let pairs: Vec<Vec<u8>> = subsets(&shares, 2)
            .iter()
            .map(|pair| pair.iter().map(|s| *s.index()).collect())
            .collect();
        assert_eq!(pairs, vec![vec![1, 2], vec![1, 3], vec![2, 3]]);
        assert_eq!(subsets(&shares, 3).len(), 1);
    }

    #[test]
    fn event_locks_are_released_after_decoding() {
        let fx = fixture(later());
        fx.submit("a");
        fx.submit("b");
        let decoder = fx.decoder();

        decoder.decode_manual(fx.event).unwrap();
        assert!(decoder.decode_manual(EventId::generate()).is_err());
        decoder.run_periodic(later() - Duration::minutes(1));

        assert_eq!(decoder.tracked_locks(), 0);
    }

    #[test]
    fn closed_events_are_not_decoded() {
        let fx = fixture(later());
        fx.submit("a");
        fx.submit("b");
        fx.store
            .transact(|s| {
                s.event_mut(fx.event)?.status = EventStatus::Cancelled;
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            fx.decoder().decode_manual(fx.event),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn periodic_pass_respects_the_window() {
        let fx = fixture(later());
        fx.submit("a");
        fx.submit("b");
        let decoder = fx.decoder();

        assert!(decoder.run_periodic(later() - Duration::minutes(30)).is_empty());
        assert!(decoder.run_periodic(later() + Duration::minutes(1)).is_empty());

        let report = decoder.run_periodic(later() - Duration::minutes(3));
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].event, fx.event);
        assert!(matches!(
            report[0].result,
            Ok(DecodeOutcome::Decoded { count: 2 })
        ));

        assert!(decoder.run_periodic(later() - Duration::minutes(2)).is_empty());
    }

    #[test]
    fn periodic_failures_are_reported_not_raised() {
        let fx = fixture(later());
        let report = fx.decoder().run_periodic(later() - Duration::minutes(1));
        assert_eq!(report.len(), 1);
        assert!(matches!(report[0].result, Err(Error::NoItemsDecoded)));
    }

    #[test]
    fn racing_triggers_write_one_paper() {
        let fx = fixture(later());
        for g in ["a", "b", "d", "e"] {
            fx.submit(g);
        }
        let decoder = Arc::new(fx.decoder());

        let handles: Vec<_> = (0..6)
            .map(|n| {
                let decoder = Arc::clone(&decoder);
                let event = fx.event;
                std::thread::spawn(move || {
                    if n % 2 == 0 {
                        decoder.decode_manual(event).unwrap()
                    } else {
                        decoder.run_periodic(later() - Duration::minutes(1));
                        decoder.decode_manual(event).unwrap()
                    }
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(outcomes.iter().all(|o| o.count() == 4));
        assert!(
            outcomes
                .iter()
                .filter(|o| matches!(o, DecodeOutcome::Decoded { .. }))
                .count()
                <= 1
        );
        assert_eq!(fx.decoded().len(), 4);
        assert_eq!(decoder.tracked_locks(), 0);
    }
}
