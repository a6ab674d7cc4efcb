//! The persisted analytics blob under `usageAnalyticsData`.
//!
//! Both the event flush and the learning synthesizer update parts of the
//! same blob; this wrapper serializes their read-modify-write cycles so one
//! writer cannot clobber the other's half.

use std::sync::{Arc, Mutex};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{keys, KeyValueStore};
use crate::error::EngineError;
use crate::models::{LearningDataPoint, UsageEvent};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    #[serde(default)]
    pub events: Vec<UsageEvent>,
    /// Reserved for host-written session records; carried through untouched.
    #[serde(default)]
    pub sessions: Vec<Value>,
    #[serde(default)]
    pub learning_data: Vec<LearningDataPoint>,
}

pub struct AnalyticsArchive {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl AnalyticsArchive {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> AnalyticsData {
        let raw = self
            .store
            .load_or(keys::USAGE_ANALYTICS, Value::Null);
        if raw.is_null() {
            return AnalyticsData::default();
        }
        match serde_json::from_value(raw) {
            Ok(data) => data,
            Err(err) => {
                warn!("analytics blob unreadable, starting fresh: {err}");
                AnalyticsData::default()
            }
        }
    }

    /// Append flushed events, keeping only the most recent `cap`.
    pub fn append_events(&self, events: &[UsageEvent], cap: usize) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().map_err(|_| {
            EngineError::Store("analytics archive lock poisoned".into())
        })?;

        let mut data = self.load();
        data.events.extend_from_slice(events);
        if data.events.len() > cap {
            let excess = data.events.len() - cap;
            data.events.drain(..excess);
        }
        self.save(&data)
    }

    /// Replace the persisted learning tail (most recent points, capped by
    /// the caller per the ≤20-entry contract).
    pub fn write_learning(&self, points: &[LearningDataPoint]) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().map_err(|_| {
            EngineError::Store("analytics archive lock poisoned".into())
        })?;

        let mut data = self.load();
        data.learning_data = points.to_vec();
        self.save(&data)
    }

    fn save(&self, data: &AnalyticsData) -> Result<(), EngineError> {
        let value = serde_json::to_value(data)?;
        self.store.save(keys::USAGE_ANALYTICS, &value)
    }
}
