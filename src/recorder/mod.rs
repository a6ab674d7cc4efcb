//! Event recorder: one method per behavioral event kind.
//!
//! Ingestion runs on the caller's thread and only ever takes a short-lived
//! std mutex, so foreground actions never wait on tick work. A background
//! flush drains the buffer into the persistent analytics blob; critical
//! kinds flush synchronously because they anchor downstream aggregation.

pub mod context;

use std::sync::{Arc, Mutex};

use anyhow::{bail, Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::{ContextSnapshot, SessionOutcome, UsageEvent, UsageEventKind};
use crate::store::AnalyticsArchive;

pub use context::{capture_snapshot, ContextSource, StaticContextSource};

#[derive(Clone)]
pub struct EventRecorder {
    buffer: Arc<Mutex<Vec<UsageEvent>>>,
    archive: Arc<AnalyticsArchive>,
    source: Arc<dyn ContextSource>,
    last_break: Arc<Mutex<Option<DateTime<Utc>>>>,
    persisted_event_cap: usize,
}

impl EventRecorder {
    pub fn new(
        archive: Arc<AnalyticsArchive>,
        source: Arc<dyn ContextSource>,
        persisted_event_cap: usize,
    ) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
            archive,
            source,
            last_break: Arc::new(Mutex::new(None)),
            persisted_event_cap,
        }
    }

    pub fn record_model_selected(&self, model_id: &str) -> ContextSnapshot {
        self.record(
            UsageEventKind::ModelSelected,
            Some(model_id.to_string()),
            serde_json::Value::Null,
        )
    }

    pub fn record_session_started(&self, model_id: Option<&str>) -> ContextSnapshot {
        self.record(
            UsageEventKind::SessionStarted,
            model_id.map(str::to_string),
            serde_json::Value::Null,
        )
    }

    pub fn record_session_ended(
        &self,
        model_id: Option<&str>,
        outcome: &SessionOutcome,
    ) -> ContextSnapshot {
        let metadata = serde_json::to_value(outcome).unwrap_or(serde_json::Value::Null);
        self.record(
            UsageEventKind::SessionEnded,
            model_id.map(str::to_string),
            metadata,
        )
    }

    pub fn record_break_taken(&self) -> ContextSnapshot {
        let snapshot = self.record(
            UsageEventKind::BreakTaken,
            None,
            serde_json::Value::Null,
        );
        if let Ok(mut guard) = self.last_break.lock() {
            *guard = Some(Utc::now());
        }
        snapshot
    }

    pub fn record_break_skipped(&self) -> ContextSnapshot {
        self.record(
            UsageEventKind::BreakSkipped,
            None,
            serde_json::Value::Null,
        )
    }

    pub fn record_distraction(&self, detail: &str) -> ContextSnapshot {
        self.record(
            UsageEventKind::DistractionDetected,
            None,
            serde_json::json!({ "detail": detail }),
        )
    }

    pub fn record_feedback(&self, model_id: Option<&str>, rating: u8) -> ContextSnapshot {
        self.record(
            UsageEventKind::FeedbackGiven,
            model_id.map(str::to_string),
            serde_json::json!({ "rating": rating.clamp(1, 5) }),
        )
    }

    fn record(
        &self,
        kind: UsageEventKind,
        model_id: Option<String>,
        metadata: serde_json::Value,
    ) -> ContextSnapshot {
        let snapshot = capture_snapshot(self.source.as_ref(), self.minutes_since_break());
        let event = UsageEvent::new(kind, model_id, snapshot.clone(), metadata);

        match self.buffer.lock() {
            Ok(mut buffer) => buffer.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }

        if kind.is_critical() {
            self.flush();
        }

        snapshot
    }

    fn minutes_since_break(&self) -> u32 {
        let last = match self.last_break.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        match last {
            Some(at) => (Utc::now() - at).num_minutes().max(0) as u32,
            None => 0,
        }
    }

    /// Events recorded but not yet flushed. Aggregation unions these with
    /// the persisted blob so nothing is invisible between flushes.
    pub fn buffered(&self) -> Vec<UsageEvent> {
        match self.buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drain the buffer into the persistent store. Bounded effort: a
    /// persistence failure is logged and the drained events are dropped
    /// rather than retried forever.
    pub fn flush(&self) {
        let drained: Vec<UsageEvent> = {
            let mut buffer = match self.buffer.lock() {
                Ok(buffer) => buffer,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *buffer)
        };

        if drained.is_empty() {
            return;
        }

        if let Err(err) = self
            .archive
            .append_events(&drained, self.persisted_event_cap)
        {
            error!(
                "event flush failed; dropping {} events: {err}",
                drained.len()
            );
        }
    }
}

/// Owns the background flush task: start/stop with a cancellation token,
/// one final flush on shutdown.
pub struct FlushController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl FlushController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(&mut self, recorder: EventRecorder, flush_interval_secs: u64) -> Result<()> {
        if self.handle.is_some() {
            bail!("flush worker already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(flush_loop(recorder, flush_interval_secs, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("flush worker task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for FlushController {
    fn default() -> Self {
        Self::new()
    }
}

async fn flush_loop(
    recorder: EventRecorder,
    flush_interval_secs: u64,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(flush_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                recorder.flush();
            }
            _ = cancel_token.cancelled() => {
                info!("flush worker shutting down");
                recorder.flush();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionOutcome;
    use crate::store::{keys, KeyValueStore, MemoryStore};

    fn recorder_with_store() -> (EventRecorder, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let archive = Arc::new(AnalyticsArchive::new(store.clone()));
        let recorder = EventRecorder::new(archive, Arc::new(StaticContextSource), 500);
        (recorder, store)
    }

    fn outcome() -> SessionOutcome {
        SessionOutcome {
            completion_rate: 0.8,
            interruptions: 1,
            breaks_taken: 2,
            focus_periods: 3,
            manual_overrides: 0,
            session_minutes: 50,
        }
    }

    #[test]
    fn noncritical_events_stay_buffered_until_flush() {
        let (recorder, store) = recorder_with_store();

        recorder.record_break_taken();
        recorder.record_distraction("notification burst");

        assert_eq!(recorder.buffered().len(), 2);
        assert!(store.load(keys::USAGE_ANALYTICS).unwrap().is_none());

        recorder.flush();
        assert!(recorder.buffered().is_empty());
        let blob = store.load(keys::USAGE_ANALYTICS).unwrap().unwrap();
        assert_eq!(blob["events"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn critical_events_persist_synchronously() {
        let (recorder, store) = recorder_with_store();

        recorder.record_session_ended(Some("balanced"), &outcome());

        // No explicit flush: the critical kind forced one.
        assert!(recorder.buffered().is_empty());
        let blob = store.load(keys::USAGE_ANALYTICS).unwrap().unwrap();
        let events = blob["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["kind"], "sessionEnded");
    }

    #[test]
    fn each_event_gets_its_own_snapshot() {
        let (recorder, _) = recorder_with_store();

        recorder.record_break_taken();
        let after_break = recorder.record_break_skipped();

        // A break just happened, so the follow-up event's snapshot restarts
        // the since-break clock.
        assert_eq!(after_break.minutes_since_break, 0);
        let buffered = recorder.buffered();
        assert_eq!(buffered.len(), 2);
        assert_ne!(buffered[0].id, buffered[1].id);
    }
}
