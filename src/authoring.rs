//! Paper-setter flow: encrypt a batch of questions and hand out the key shares

use std::sync::Arc;

use tracing::{info, warn};

use crate::codec;
use crate::domain::{GuardianId, ItemId};
use crate::error::{Error, Result};
use crate::keys::{KeyManager, SecretSharing, ShamirGf256};
use crate::model::{EncryptedItem, Guardian, Question};
use crate::notify::{DispatchReport, Dispatcher, Notice};
use crate::store::Store;

/// Result of [`ItemAuthoring::publish`]
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub items: Vec<ItemId>,
    pub notices: DispatchReport,
}

#[derive(Debug)]
pub struct ItemAuthoring<S, K = ShamirGf256> {
    store: Arc<S>,
    keys: KeyManager<K>,
    dispatcher: Dispatcher,
}

impl<S: Store> ItemAuthoring<S> {
    pub fn new(store: Arc<S>, dispatcher: Dispatcher) -> Self {
        Self::with_key_manager(store, KeyManager::default(), dispatcher)
    }
}

impl<S: Store, K: SecretSharing> ItemAuthoring<S, K> {
    pub fn with_key_manager(store: Arc<S>, keys: KeyManager<K>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            keys,
            dispatcher,
        }
    }

    /// Encrypts `questions` under one fresh key bound to `guardian_ids`
    ///
    /// Share `i` of the key goes to guardian `i`. The key itself is dropped
    /// before returning and the shares are only ever sent, never stored here.
    /// Undelivered shares are reported in the receipt; the items stay.
    ///
    /// # Errors
    /// - [`Error::Validation`] for a blank author, no questions, a malformed question, or
    ///   anything other than 3 distinct guardians
    /// - [`Error::NotFound`] if a guardian is not on the roster
    /// - [`Error::Conflict`] if `author` already published or a guardian already holds a share
    pub fn publish(
        &self,
        author: &str,
        questions: &[Question],
        guardian_ids: &[GuardianId],
    ) -> Result<PublishReceipt> {
        let author = author.trim();
        if author.is_empty() {
            return Err(Error::validation("author must not be empty"));
        }
        if questions.is_empty() {
            return Err(Error::validation("at least one question is required"));
        }

        let key = self.keys.generate_key();
        let items = questions
            .iter()
            .map(|q| EncryptedItem::seal(author, q, &key, guardian_ids))
            .collect::<Result<Vec<_>>>()?;
        let shares = self.keys.split_key(&key)?;
        drop(key);
        if shares.len() != guardian_ids.len() {
            return Err(Error::validation(format!(
                "key is split into {} shares but {} guardians were named",
                shares.len(),
                guardian_ids.len()
            )));
        }

        let item_ids: Vec<ItemId> = items.iter().map(EncryptedItem::id).collect();
        let guardians = self.store.transact(|state| {
            let guardians = guardian_ids
                .iter()
                .map(|id| {
                    state
                        .guardian(id)
                        .cloned()
                        .ok_or_else(|| Error::not_found(format!("guardian {id}")))
                })
                .collect::<Result<Vec<Guardian>>>()?;
            if state.items.values().any(|item| item.author() == author) {
                return Err(Error::conflict(format!("{author} has already published questions")));
            }
            if let Some(bound) = guardian_ids
                .iter()
                .find(|id| state.items.values().any(|item| item.is_bound_to(id)))
            {
                return Err(Error::conflict(format!("guardian {bound} already holds a key share")));
            }
            for item in items {
                state.items.insert(item.id(), item);
            }
            Ok(guardians)
        })?;
        info!(author, items = item_ids.len(), "questions published");

        let notices: Vec<Notice> = guardians
            .into_iter()
            .zip(&shares)
            .map(|(guardian, share)| Notice::KeyShare {
                guardian: guardian.id,
                contact: guardian.contact,
                share: codec::encode_share(share).to_string(),
                author: author.to_string(),
            })
            .collect();
        let report = self.dispatcher.send_all(&notices);
        if !report.failed.is_empty() {
            warn!(author, failed = ?report.failed, "key shares not delivered");
        }

        Ok(PublishReceipt {
            items: item_ids,
            notices: report,
        })
    }

    /// Rostered guardians not yet holding a share of any pooled item
    ///
    /// # Errors
    /// Returns a storage error if the state cannot be read
    pub fn available_guardians(&self) -> Result<Vec<Guardian>> {
        self.store.read(|state| {
            state
                .guardians
                .iter()
                .filter(|g| !state.items.values().any(|item| item.is_bound_to(&g.id)))
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SplitConfig;
    use crate::notify::MemoryOutbox;
    use crate::store::MemoryStore;

    fn gid(id: &str) -> GuardianId {
        GuardianId::new(id).unwrap()
    }

    fn setup(roster: &[&str]) -> (Arc<MemoryStore>, Arc<MemoryOutbox>, ItemAuthoring<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .transact(|state| {
                state.guardians.extend(roster.iter().map(|id| Guardian {
                    id: gid(id),
                    contact: format!("{id}@example.org"),
                }));
                Ok(())
            })
            .unwrap();
        let outbox = Arc::new(MemoryOutbox::new());
        let authoring = ItemAuthoring::new(Arc::clone(&store), Dispatcher::new(outbox.clone()));
        (store, outbox, authoring)
    }

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                statement: format!("Q{i}"),
                options: vec!["x".into(), "y".into()],
                correct_option: "x".into(),
            })
            .collect()
    }

    fn triple(ids: [&str; 3]) -> Vec<GuardianId> {
        ids.iter().map(|id| gid(id)).collect()
    }

    #[test]
    fn publish_stores_items_and_sends_one_share_each() {
        let (store, outbox, authoring) = setup(&["a", "b", "c", "d"]);
        let receipt = authoring
            .publish("setter", &questions(3), &triple(["a", "b", "c"]))
            .unwrap();

        assert_eq!(receipt.items.len(), 3);
        assert_eq!(receipt.notices.delivered, 3);
        assert_eq!(store.read(|s| s.items.len()).unwrap(), 3);

        let sent = outbox.sent();
        let shares: Vec<_> = sent
            .iter()
            .map(|n| match n {
                Notice::KeyShare { share, .. } => codec::decode_share(share).unwrap(),
                Notice::Schedule { .. } => panic!("unexpected notice"),
            })
            .collect();
        let key = KeyManager::new(SplitConfig::default())
            .reconstruct_key(&shares[1..])
            .unwrap();
        let item = store.read(|s| s.items[&receipt.items[0]].clone()).unwrap();
        assert_eq!(item.open(key.as_bytes()).unwrap().statement, "Q0");

        let available: Vec<_> = authoring
            .available_guardians()
            .unwrap()
            .into_iter()
            .map(|g| g.id.to_string())
            .collect();
        assert_eq!(available, vec!["d"]);
    }

    #[test]
    fn guardians_must_be_rostered_and_unbound() {
        let (_, _, authoring) = setup(&["a", "b", "c", "d", "e"]);
        let err = authoring
            .publish("setter", &questions(1), &triple(["a", "b", "z"]))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        authoring
            .publish("setter", &questions(1), &triple(["a", "b", "c"]))
            .unwrap();
        let err = authoring
            .publish("other", &questions(1), &triple(["c", "d", "e"]))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn one_batch_per_author() {
        let (_, _, authoring) = setup(&["a", "b", "c", "d", "e", "f"]);
        authoring
            .publish("setter", &questions(1), &triple(["a", "b", "c"]))
            .unwrap();
        let err = authoring
            .publish("setter", &questions(1), &triple(["d", "e", "f"]))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn malformed_input_is_rejected_before_storing() {
        let (store, _, authoring) = setup(&["a", "b", "c"]);
        let two = vec![gid("a"), gid("b")];
        assert!(matches!(
            authoring.publish("setter", &questions(1), &two),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            authoring.publish("setter", &[], &triple(["a", "b", "c"])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            authoring.publish("  ", &questions(1), &triple(["a", "b", "c"])),
            Err(Error::Validation(_))
        ));
        assert!(store.read(|s| s.items.is_empty()).unwrap());
    }

    #[test]
    fn undelivered_share_keeps_the_items() {
        let (store, outbox, authoring) = setup(&["a", "b", "c"]);
        outbox.fail_for("b@example.org");

        let receipt = authoring
            .publish("setter", &questions(2), &triple(["a", "b", "c"]))
            .unwrap();

        assert_eq!(receipt.notices.failed, vec![gid("b")]);
        assert_eq!(store.read(|s| s.items.len()).unwrap(), 2);
    }
}
