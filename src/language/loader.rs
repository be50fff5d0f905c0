// Makes a language usable: resolves its registry entry, loads the vendor
// resources it names, and tracks per-language readiness

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Result, TinkerError};
use crate::vendor::VendorResolver;

use super::registry::LanguageRegistry;
use super::traits::{vendor_keys, LanguageError};

type SharedOutcome = std::result::Result<(), String>;

/// Loads languages exactly once, de-duplicating concurrent requests
///
/// A name with no registry entry is "nothing to load": the absence is
/// recorded for UI affordances but `ensure_language` still resolves, since
/// plain-text slots work without a plugin. A known language whose vendor
/// resources fail is a real error and propagates.
pub struct LanguageLoader {
    registry: Arc<LanguageRegistry>,
    resolver: Arc<VendorResolver>,
    loaded: DashMap<String, ()>,
    errors: DashMap<String, String>,
    inflight: DashMap<String, watch::Receiver<Option<SharedOutcome>>>,
}

impl LanguageLoader {
    pub fn new(registry: Arc<LanguageRegistry>, resolver: Arc<VendorResolver>) -> Self {
        Self {
            registry,
            resolver,
            loaded: DashMap::new(),
            errors: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    pub fn is_language_loaded(&self, name: &str) -> bool {
        let name = self.registry.normalize(name);
        self.loaded.contains_key(&name)
    }

    /// Last recorded load problem for a language, if any
    pub fn get_language_error(&self, name: &str) -> Option<String> {
        let name = self.registry.normalize(name);
        self.errors.get(&name).map(|entry| entry.value().clone())
    }

    /// Ensure a language's external resources are loaded
    pub async fn ensure_language(&self, raw_name: &str) -> Result<()> {
        let name = self.registry.normalize(raw_name);

        if self.loaded.contains_key(&name) {
            return Ok(());
        }

        // Join an in-flight load for the same language
        if let Some(entry) = self.inflight.get(&name) {
            let receiver = entry.value().clone();
            drop(entry);
            return self.await_outcome(&name, receiver).await;
        }

        let (sender, receiver) = watch::channel(None);
        match self.inflight.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let receiver = existing.get().clone();
                drop(existing);
                return self.await_outcome(&name, receiver).await;
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(receiver);
            }
        }

        let outcome = self.drive_load(&name).await;

        let shared = match &outcome {
            Ok(()) => Ok(()),
            Err(error) => Err(error.to_string()),
        };
        let _ = sender.send(Some(shared));
        self.inflight.remove(&name);

        outcome
    }

    async fn drive_load(&self, name: &str) -> Result<()> {
        let language = match self.registry.get(name) {
            Some(language) => language,
            None => {
                // Nothing to load; remember the absence but do not fail
                debug!(language = %name, "No registry entry, treating as native");
                self.errors
                    .insert(name.to_string(), format!("no registry entry for {name}"));
                return Ok(());
            }
        };

        let keys = vendor_keys(language.as_ref());
        if keys.is_empty() {
            self.loaded.insert(name.to_string(), ());
            self.errors.remove(name);
            return Ok(());
        }

        let loads = keys.iter().map(|key| self.resolver.load_vendor(key));
        let results = futures::future::join_all(loads).await;

        for (key, result) in keys.iter().zip(results) {
            if let Err(error) = result {
                warn!(language = %name, vendor = %key, error = %error, "Language load failed");
                self.errors.insert(name.to_string(), error.to_string());
                return Err(error);
            }
        }

        debug!(language = %name, vendors = keys.len(), "Language loaded");
        self.loaded.insert(name.to_string(), ());
        self.errors.remove(name);
        Ok(())
    }

    async fn await_outcome(
        &self,
        name: &str,
        mut receiver: watch::Receiver<Option<SharedOutcome>>,
    ) -> Result<()> {
        loop {
            if let Some(outcome) = receiver.borrow().clone() {
                return outcome.map_err(|error| {
                    TinkerError::Language(Box::new(LanguageError::LoadFailed {
                        language: name.to_string(),
                        error,
                    }))
                });
            }
            if receiver.changed().await.is_err() {
                return Err(TinkerError::Language(Box::new(LanguageError::LoadFailed {
                    language: name.to_string(),
                    error: "load abandoned before completion".to_string(),
                })));
            }
        }
    }
}
