//! Engine facade and periodic scheduler.
//!
//! `PersonalizationEngine` wires the components together with explicit
//! dependency injection: one instance per process or test, no hidden
//! globals. `EngineController` drives the adaptation cycle on a coarse
//! periodic tick that can be paused and resumed without double-scheduling.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::adaptation::{
    AdaptationExecutor, AdaptationLedger, CooldownRegistry, ImpactMonitor, OpportunityDetector,
};
use crate::analytics::PerformanceAggregator;
use crate::config::EngineConfig;
use crate::generator::{GenerationSignals, ModelGenerator};
use crate::learning::LearningSynthesizer;
use crate::models::{
    Adaptation, BaselineMetrics, ContextSnapshot, ModelCandidates, PerformanceReport,
    SessionOutcome, UserAssessment,
};
use crate::notify::NotificationSink;
use crate::recorder::{ContextSource, EventRecorder, FlushController};
use crate::settings::ConfigProvider;
use crate::store::{AnalyticsArchive, KeyValueStore};

/// Outcome of one adaptation cycle, for logging and host dashboards.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub productivity_score: f64,
    pub opportunities_detected: usize,
    pub adaptations_applied: usize,
    pub rollbacks_executed: usize,
    pub candidates_refreshed: bool,
}

pub struct PersonalizationEngine {
    config: EngineConfig,
    provider: Arc<dyn ConfigProvider>,
    recorder: EventRecorder,
    archive: Arc<AnalyticsArchive>,
    learning: LearningSynthesizer,
    aggregator: PerformanceAggregator,
    detector: OpportunityDetector,
    executor: Arc<AdaptationExecutor>,
    monitor: ImpactMonitor,
    ledger: Arc<AdaptationLedger>,
    generator: ModelGenerator,
    assessment: Mutex<Option<UserAssessment>>,
    candidates: Mutex<Option<ModelCandidates>>,
}

impl PersonalizationEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn ConfigProvider>,
        notifier: Arc<dyn NotificationSink>,
        source: Arc<dyn ContextSource>,
        config: EngineConfig,
    ) -> Self {
        let archive = Arc::new(AnalyticsArchive::new(store.clone()));
        let recorder = EventRecorder::new(
            archive.clone(),
            source,
            config.persisted_event_cap,
        );
        let learning = LearningSynthesizer::new(
            archive.clone(),
            config.learning_history_cap,
            config.learning_history_trim,
            config.persisted_learning_cap,
        );

        // Adaptations persisted at last shutdown resume monitoring here.
        let ledger = Arc::new(AdaptationLedger::restore(store.as_ref()));
        let cooldowns = Arc::new(CooldownRegistry::new());
        let executor = Arc::new(AdaptationExecutor::new(
            provider.clone(),
            store.clone(),
            cooldowns.clone(),
            ledger.clone(),
            notifier.clone(),
            config.monitoring_hours,
        ));
        let monitor = ImpactMonitor::new(
            ledger.clone(),
            cooldowns.clone(),
            notifier,
            executor.clone(),
        );

        Self {
            aggregator: PerformanceAggregator::new(config.model_catalog.clone()),
            detector: OpportunityDetector::new(&config),
            generator: ModelGenerator::new(config.generation_budget_ms),
            config,
            provider,
            recorder,
            archive,
            learning,
            executor,
            monitor,
            ledger,
            assessment: Mutex::new(None),
            candidates: Mutex::new(None),
        }
    }

    /// Foreground ingestion surface. Never blocks on tick work.
    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    pub fn adaptations(&self) -> Vec<Adaptation> {
        self.ledger.all()
    }

    /// Record the session-end event and reduce it into learning data in
    /// one step.
    pub fn complete_session(
        &self,
        model_id: Option<&str>,
        outcome: &SessionOutcome,
    ) -> ContextSnapshot {
        let snapshot = self.recorder.record_session_ended(model_id, outcome);
        self.learning.synthesize(outcome, snapshot.clone());
        snapshot
    }

    /// Recompute the performance report from everything currently known:
    /// the persisted blob plus the not-yet-flushed buffer.
    pub fn build_report(&self, now: DateTime<Utc>) -> PerformanceReport {
        let mut events = self.archive.load().events;
        events.extend(self.recorder.buffered());
        let learning = self.learning.history();
        self.aggregator.build_report(&events, &learning, now)
    }

    /// Store the assessment the periodic cycle regenerates candidates
    /// from.
    pub fn set_assessment(&self, assessment: UserAssessment) {
        match self.assessment.lock() {
            Ok(mut guard) => *guard = Some(assessment),
            Err(poisoned) => *poisoned.into_inner() = Some(assessment),
        }
    }

    /// Generate candidates now, outside the tick, under the generator's own
    /// latency budget.
    pub fn generate_models(&self, assessment: &UserAssessment) -> ModelCandidates {
        let now = Utc::now();
        let mut events = self.archive.load().events;
        events.extend(self.recorder.buffered());
        let signals = GenerationSignals::from_observations(&events, &self.learning.history(), now);
        let candidates = self.generator.generate(assessment, &signals);

        match self.candidates.lock() {
            Ok(mut guard) => *guard = Some(candidates.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(candidates.clone()),
        }
        candidates
    }

    pub fn latest_candidates(&self) -> Option<ModelCandidates> {
        match self.candidates.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// One full adaptation cycle: aggregate, regenerate candidates,
    /// detect, execute, monitor, then run any scheduled rollbacks.
    pub fn run_cycle(&self, now: DateTime<Utc>) -> CycleSummary {
        let report = self.build_report(now);

        let candidates_refreshed = {
            let assessment = match self.assessment.lock() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            match assessment {
                Some(assessment) => {
                    self.generate_models(&assessment);
                    true
                }
                None => false,
            }
        };

        let active_model = self.provider.active_model();
        let opportunities = self.detector.detect(
            &report,
            active_model.as_deref(),
            self.executor.cooldowns(),
            now,
        );

        let baseline = BaselineMetrics {
            productivity_score: report.summary.productivity_score,
            satisfaction: report.satisfaction_rating(),
        };
        let applied = self.executor.execute_batch(&opportunities, baseline, now);

        let pending = self.monitor.evaluate_all(&report, now);
        // Rollbacks run after the evaluation pass completes, so a slow
        // revert cannot stall monitoring of the other adaptations.
        self.monitor.execute_rollbacks(&pending, now);

        CycleSummary {
            productivity_score: report.summary.productivity_score,
            opportunities_detected: opportunities.len(),
            adaptations_applied: applied.len(),
            rollbacks_executed: pending.len(),
            candidates_refreshed,
        }
    }

    /// Final flush plus the shutdown write of `finalAdaptationResults`.
    pub fn persist_final_state(&self) {
        self.recorder.flush();
        if let Err(err) = self.ledger.persist(self.executor.store()) {
            error!("failed to persist final adaptation results: {err}");
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Drives the periodic cycle and the background flush. Pausable and
/// resumable; re-enabling checks for an existing task before spawning so
/// the loop can never be double-scheduled.
pub struct EngineController {
    engine: Arc<PersonalizationEngine>,
    cycle: tokio::sync::Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
    flush: tokio::sync::Mutex<FlushController>,
}

impl EngineController {
    pub fn new(engine: Arc<PersonalizationEngine>) -> Self {
        Self {
            engine,
            cycle: tokio::sync::Mutex::new(None),
            flush: tokio::sync::Mutex::new(FlushController::new()),
        }
    }

    pub fn engine(&self) -> &Arc<PersonalizationEngine> {
        &self.engine
    }

    /// Start (or resume) the loop. A no-op when already running.
    pub async fn start(&self) -> Result<()> {
        {
            let mut flush = self.flush.lock().await;
            let recorder = self.engine.recorder().clone();
            let interval_secs = self.engine.config().flush_interval_secs;
            // Already-running flush worker is kept as-is.
            if flush.start(recorder, interval_secs).is_err() {
                info!("flush worker already running");
            }
        }

        let mut cycle = self.cycle.lock().await;
        if cycle.is_some() {
            info!("adaptation loop already scheduled; not starting another");
            return Ok(());
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(cycle_loop(
            self.engine.clone(),
            self.engine.config().tick_interval_secs,
            cancel_token.clone(),
        ));
        *cycle = Some((handle, cancel_token));
        info!("adaptation loop started");
        Ok(())
    }

    /// Stop the periodic cycle; ingestion and flushing continue.
    pub async fn pause(&self) -> Result<()> {
        let mut cycle = self.cycle.lock().await;
        if let Some((handle, token)) = cycle.take() {
            token.cancel();
            handle.await.context("cycle loop task failed to join")?;
            info!("adaptation loop paused");
        }
        Ok(())
    }

    /// Entry point for the host's configuration-change signal.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.start().await
        } else {
            self.pause().await
        }
    }

    pub async fn is_running(&self) -> bool {
        self.cycle.lock().await.is_some()
    }

    /// Cancel both workers, drain the buffer, and write the final
    /// adaptation results.
    pub async fn shutdown(&self) -> Result<()> {
        self.pause().await?;
        self.flush.lock().await.stop().await?;
        self.engine.persist_final_state();
        info!("engine shut down");
        Ok(())
    }
}

async fn cycle_loop(
    engine: Arc<PersonalizationEngine>,
    tick_interval_secs: u64,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(tick_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The interval fires immediately once; skip that so the first real
    // cycle happens a full period after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = engine.run_cycle(Utc::now());
                info!(
                    "cycle complete: score {:.0}, {} opportunities, {} applied, {} rollbacks",
                    summary.productivity_score,
                    summary.opportunities_detected,
                    summary.adaptations_applied,
                    summary.rollbacks_executed
                );
            }
            _ = cancel_token.cancelled() => {
                info!("adaptation loop shutting down");
                break;
            }
        }
    }
}
