//! All components wired over one store

use std::sync::Arc;

use tracing::info;

use crate::authoring::ItemAuthoring;
use crate::config::Config;
use crate::decoder::{DecodeOutcome, PaperDecoder};
use crate::domain::GuardianId;
use crate::error::{Error, Result};
use crate::keys::KeyManager;
use crate::lifecycle::EventLifecycle;
use crate::model::{Guardian, PaperQuestion};
use crate::notify::{DirOutbox, Dispatcher, Notifier};
use crate::registry::ShareRegistry;
use crate::store::{FileStore, Store};

#[derive(Debug)]
pub struct Vault<S> {
    store: Arc<S>,
    authoring: ItemAuthoring<S>,
    registry: ShareRegistry<S>,
    lifecycle: EventLifecycle<S>,
    decoder: PaperDecoder<S>,
}

impl Vault<FileStore> {
    /// File-backed vault delivering notices into `config.outbox_dir`
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the state file cannot be loaded
    pub fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(FileStore::open(&config.state_path)?);
        let outbox = Arc::new(DirOutbox::new(&config.outbox_dir));
        Self::new(store, outbox, config)
    }
}

impl<S: Store> Vault<S> {
    /// # Errors
    /// Returns [`Error::Validation`] if the config is inconsistent
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, config: &Config) -> Result<Self> {
        config.validate()?;
        let keys = KeyManager::new(config.split_config()?);
        let dispatcher = Dispatcher::with_attempts(notifier, config.notify_attempts);

        Ok(Self {
            authoring: ItemAuthoring::with_key_manager(
                Arc::clone(&store),
                keys.clone(),
                dispatcher.clone(),
            ),
            registry: ShareRegistry::new(Arc::clone(&store)),
            lifecycle: EventLifecycle::new(Arc::clone(&store), dispatcher)
                .with_paper_size(config.paper_size),
            decoder: PaperDecoder::with_key_manager(Arc::clone(&store), keys, config.time_gate()),
            store,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn authoring(&self) -> &ItemAuthoring<S> {
        &self.authoring
    }

    #[must_use]
    pub fn registry(&self) -> &ShareRegistry<S> {
        &self.registry
    }

    #[must_use]
    pub fn lifecycle(&self) -> &EventLifecycle<S> {
        &self.lifecycle
    }

    #[must_use]
    pub fn decoder(&self) -> &PaperDecoder<S> {
        &self.decoder
    }

    /// Adds a guardian to the end of the roster
    ///
    /// # Errors
    /// - [`Error::Validation`] for a blank contact
    /// - [`Error::Conflict`] if the id is already rostered
    pub fn register_guardian(&self, id: GuardianId, contact: &str) -> Result<Guardian> {
        let contact = contact.trim();
        if contact.is_empty() {
            return Err(Error::validation("guardian contact must not be empty"));
        }
        let guardian = Guardian {
            id,
            contact: contact.to_string(),
        };
        self.store.transact(|state| {
            if state.guardian(&guardian.id).is_some() {
                return Err(Error::conflict(format!("guardian {} already exists", guardian.id)));
            }
            state.guardians.push(guardian.clone());
            Ok(())
        })?;
        info!(guardian = %guardian.id, "guardian registered");
        Ok(guardian)
    }

    /// Roster in registration order
    ///
    /// # Errors
    /// Returns a storage error if the state cannot be read
    pub fn list_guardians(&self) -> Result<Vec<Guardian>> {
        self.store.read(|state| state.guardians.clone())
    }

    /// Exam-center request: decode the active event now and return its paper
    ///
    /// # Errors
    /// - [`Error::NotFound`] if there is no active event
    /// - anything [`PaperDecoder::decode_manual`] returns
    pub fn request_paper(&self) -> Result<(DecodeOutcome, Vec<PaperQuestion>)> {
        let event = self
            .lifecycle
            .active_event()?
            .ok_or_else(|| Error::not_found("no active exam"))?;
        let outcome = self.decoder.decode_manual(event.id())?;
        let paper = self.lifecycle.event(event.id())?.published_paper();
        Ok((outcome, paper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryOutbox;
    use crate::store::MemoryStore;

    fn vault() -> Vault<MemoryStore> {
        Vault::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryOutbox::new()),
            &Config::default(),
        )
        .unwrap()
    }

    #[test]
    fn roster_keeps_registration_order_and_rejects_duplicates() {
        let vault = vault();
        for id in ["g2", "g1", "g3"] {
            vault
                .register_guardian(GuardianId::new(id).unwrap(), &format!("{id}@example.org"))
                .unwrap();
        }
        let err = vault
            .register_guardian(GuardianId::new("g1").unwrap(), "other@example.org")
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let ids: Vec<_> = vault
            .list_guardians()
            .unwrap()
            .into_iter()
            .map(|g| g.id.to_string())
            .collect();
        assert_eq!(ids, vec!["g2", "g1", "g3"]);
    }

    #[test]
    fn blank_contact_is_rejected() {
        let err = vault()
            .register_guardian(GuardianId::new("g").unwrap(), "  ")
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn paper_request_needs_an_active_exam() {
        assert!(matches!(vault().request_paper(), Err(Error::NotFound(_))));
    }

    #[test]
    fn inconsistent_config_is_refused() {
        let config = Config {
            threshold: 9,
            ..Config::default()
        };
        let result = Vault::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryOutbox::new()),
            &config,
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
