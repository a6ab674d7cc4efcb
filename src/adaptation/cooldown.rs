//! Cooldown registry: one executed opportunity suppresses identical ones
//! until its kind's window expires.
//!
//! Keys are (kind, stable payload fingerprint) rather than serialized
//! payload strings, so key identity cannot depend on field ordering.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::models::{AdaptationAction, OpportunityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub kind: OpportunityKind,
    pub fingerprint: u64,
}

impl CooldownKey {
    pub fn for_action(action: &AdaptationAction) -> Self {
        Self {
            kind: action.kind(),
            fingerprint: action.fingerprint(),
        }
    }
}

#[derive(Default)]
pub struct CooldownRegistry {
    entries: Mutex<HashMap<CooldownKey, DateTime<Utc>>>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cooling(&self, key: CooldownKey, now: DateTime<Utc>) -> bool {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(&key).is_some_and(|until| *until > now)
    }

    /// Register the key's cooldown window and opportunistically prune
    /// expired entries so the map stays small.
    pub fn register(&self, key: CooldownKey, now: DateTime<Utc>) {
        let until = now + key.kind.cooldown();
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, expiry| *expiry > now);
        entries.insert(key, until);
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn switch_action(to: &str) -> AdaptationAction {
        AdaptationAction::SwitchModel {
            from: Some("balanced".into()),
            to: to.into(),
        }
    }

    #[test]
    fn identical_payloads_share_a_window() {
        let registry = CooldownRegistry::new();
        let now = Utc::now();

        let key = CooldownKey::for_action(&switch_action("sustainedFlow"));
        assert!(!registry.is_cooling(key, now));

        registry.register(key, now);
        assert!(registry.is_cooling(key, now));
        // Second detection of the same switch is suppressed for 24h...
        assert!(registry.is_cooling(key, now + Duration::hours(23)));
        // ...and eligible again once the window expires.
        assert!(!registry.is_cooling(key, now + Duration::hours(25)));
    }

    #[test]
    fn different_payloads_do_not_collide() {
        let registry = CooldownRegistry::new();
        let now = Utc::now();

        registry.register(CooldownKey::for_action(&switch_action("sustainedFlow")), now);
        let other = CooldownKey::for_action(&switch_action("shortIterations"));
        assert!(!registry.is_cooling(other, now));
    }

    #[test]
    fn registration_prunes_expired_entries() {
        let registry = CooldownRegistry::new();
        let now = Utc::now();

        registry.register(CooldownKey::for_action(&switch_action("a")), now);
        assert_eq!(registry.len(), 1);

        // Registering after the first window lapsed drops the stale entry.
        let later = now + Duration::hours(30);
        registry.register(CooldownKey::for_action(&switch_action("b")), later);
        assert_eq!(registry.len(), 1);
    }
}
