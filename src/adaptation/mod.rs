//! Adaptation pipeline: detection, execution under cooldowns, and impact
//! monitoring with rollback.

pub mod cooldown;
pub mod detector;
pub mod executor;
pub mod monitor;

use std::sync::{Arc, Mutex};

use log::warn;
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::models::{Adaptation, AdaptationState};
use crate::store::{keys, KeyValueStore};

pub use cooldown::{CooldownKey, CooldownRegistry};
pub use detector::OpportunityDetector;
pub use executor::AdaptationExecutor;
pub use monitor::ImpactMonitor;

/// All adaptations ever applied, newest last. Terminal records are history,
/// never deleted; transitions swap in new immutable values.
#[derive(Default)]
pub struct AdaptationLedger {
    entries: Mutex<Vec<Adaptation>>,
}

impl AdaptationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the ledger from the results persisted at last shutdown, so
    /// still-Active adaptations resume monitoring.
    pub fn restore(store: &dyn KeyValueStore) -> Self {
        let raw = store.load_or(keys::FINAL_ADAPTATION_RESULTS, json!([]));
        let entries: Vec<Adaptation> = match serde_json::from_value(raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("persisted adaptation results unreadable, starting empty: {err}");
                Vec::new()
            }
        };
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn push(&self, adaptation: Adaptation) {
        match self.entries.lock() {
            Ok(mut guard) => guard.push(adaptation),
            Err(poisoned) => poisoned.into_inner().push(adaptation),
        }
    }

    pub fn all(&self) -> Vec<Adaptation> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn active(&self) -> Vec<Adaptation> {
        self.all()
            .into_iter()
            .filter(|a| a.state == AdaptationState::Active)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Adaptation> {
        self.all().into_iter().find(|a| a.id == id)
    }

    /// Swap in the post-transition value for its id.
    pub fn replace(&self, updated: Adaptation) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(slot) = guard.iter_mut().find(|a| a.id == updated.id) {
            *slot = updated;
        } else {
            guard.push(updated);
        }
    }

    /// Written once at shutdown under `finalAdaptationResults`.
    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<(), EngineError> {
        let value = serde_json::to_value(self.all())?;
        store.save(keys::FINAL_ADAPTATION_RESULTS, &value)
    }
}

/// Merge one field into a small preference blob.
pub(crate) fn merge_preference(
    store: &dyn KeyValueStore,
    key: &str,
    field: &str,
    value: Value,
) -> Result<(), EngineError> {
    let mut blob = store.load_or(key, json!({}));
    if !blob.is_object() {
        blob = json!({});
    }
    blob[field] = value;
    store.save(key, &blob)
}

/// Clear one field from a preference blob; the whole key is removed once
/// the blob is empty.
pub(crate) fn clear_preference(
    store: &dyn KeyValueStore,
    key: &str,
    field: &str,
) -> Result<(), EngineError> {
    let mut blob = store.load_or(key, json!({}));
    let Some(map) = blob.as_object_mut() else {
        return store.remove(key);
    };
    map.remove(field);
    if map.is_empty() {
        store.remove(key)
    } else {
        store.save(key, &blob)
    }
}
