//! Impact monitor and rollback controller.
//!
//! Each tick, every Active adaptation past its monitoring interval is
//! compared against current metrics. Positive overall improvement settles
//! it; anything else flags it for rollback. Rollback execution is a
//! separate pass so one slow revert cannot stall evaluation of the rest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::error::EngineError;
use crate::models::{AdaptationState, ImpactMetrics, OpportunityKind, PerformanceReport};
use crate::notify::{EngineNotice, NotificationSink};

use super::cooldown::{CooldownKey, CooldownRegistry};
use super::executor::AdaptationExecutor;
use super::AdaptationLedger;

pub struct ImpactMonitor {
    ledger: Arc<AdaptationLedger>,
    cooldowns: Arc<CooldownRegistry>,
    notifier: Arc<dyn NotificationSink>,
    executor: Arc<AdaptationExecutor>,
}

impl ImpactMonitor {
    pub fn new(
        ledger: Arc<AdaptationLedger>,
        cooldowns: Arc<CooldownRegistry>,
        notifier: Arc<dyn NotificationSink>,
        executor: Arc<AdaptationExecutor>,
    ) -> Self {
        Self {
            ledger,
            cooldowns,
            notifier,
            executor,
        }
    }

    /// Evaluate every due adaptation against the current report. Returns
    /// the ids flagged for rollback; executing those is the caller's
    /// scheduled follow-up, not part of this pass.
    pub fn evaluate_all(&self, report: &PerformanceReport, now: DateTime<Utc>) -> Vec<String> {
        let mut pending_rollback = Vec::new();

        for adaptation in self.ledger.active() {
            if !adaptation.due_for_evaluation(now) {
                continue;
            }

            if !report.has_session_data() {
                // No current metrics: retry next tick instead of guessing.
                debug!(
                    "{}",
                    EngineError::EvaluationDataMissing(adaptation.id.clone())
                );
                continue;
            }

            let impact = ImpactMetrics::from_deltas(
                report.summary.productivity_score - adaptation.baseline.productivity_score,
                report.satisfaction_rating() - adaptation.baseline.satisfaction,
            );

            let id = adaptation.id.clone();
            match adaptation.evaluated(impact) {
                Ok(updated) => {
                    let needs_rollback = updated.state == AdaptationState::NeedsRollback;
                    info!(
                        "adaptation {id} evaluated: improvement {:+.1} -> {}",
                        impact.overall_improvement,
                        updated.state.as_str()
                    );
                    self.ledger.replace(updated);
                    if needs_rollback {
                        pending_rollback.push(id);
                    }
                }
                Err(err) => warn!("adaptation {id} evaluation rejected: {err}"),
            }
        }

        pending_rollback
    }

    /// Run the queued rollbacks. A failed revert stays in NeedsRollback so
    /// the next tick retries it or a host can surface it.
    pub fn execute_rollbacks(&self, ids: &[String], now: DateTime<Utc>) {
        for id in ids {
            let Some(adaptation) = self.ledger.get(id) else {
                continue;
            };
            if adaptation.state != AdaptationState::NeedsRollback {
                continue;
            }

            match self.executor.revert_action(&adaptation.action, 0) {
                Ok(()) => {
                    self.cooldowns.register(
                        CooldownKey {
                            kind: OpportunityKind::Rollback,
                            fingerprint: adaptation.action.fingerprint(),
                        },
                        now,
                    );
                    match adaptation.rolled_back(now) {
                        Ok(reverted) => {
                            self.notifier.notify(EngineNotice::AdaptationReverted {
                                adaptation_id: reverted.id.clone(),
                                description: reverted.description.clone(),
                            });
                            self.ledger.replace(reverted);
                        }
                        Err(err) => warn!("rollback transition rejected for {id}: {err}"),
                    }
                }
                Err(err) => {
                    error!("rollback failed for {id}, will retry: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Adaptation, AdaptationAction, AdaptationOpportunity, BaselineMetrics,
        OpportunityPriority, PredictiveMetrics, ProductivitySummary, TrendAnalysis,
    };
    use crate::notify::LogNotifier;
    use crate::settings::{ConfigProvider, MemoryConfig};
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn report_with(productivity: f64, satisfaction_rating: f64, sessions: usize) -> PerformanceReport {
        PerformanceReport {
            generated_at: Utc::now(),
            summary: ProductivitySummary {
                productivity_score: productivity,
                completion_rate: 0.7,
                session_frequency: 5.0,
                satisfaction: (satisfaction_rating - 1.0) / 4.0,
                sessions_analyzed: sessions,
                events_analyzed: sessions * 4,
            },
            model_comparisons: Vec::new(),
            most_effective_model: None,
            insights: Vec::new(),
            trends: TrendAnalysis {
                productivity_trend: 0.0,
                completion_trend: 0.0,
                satisfaction_trend: 0.0,
                baseline_delta: 0.0,
                current_week_score: productivity,
                previous_week_score: productivity,
            },
            shifts: Vec::new(),
            recommendations: Vec::new(),
            forecast: PredictiveMetrics {
                next_week_score: productivity,
            },
        }
    }

    struct Harness {
        monitor: ImpactMonitor,
        ledger: Arc<AdaptationLedger>,
        config: Arc<MemoryConfig>,
    }

    fn harness() -> Harness {
        let config = Arc::new(MemoryConfig::new());
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(AdaptationLedger::new());
        let cooldowns = Arc::new(CooldownRegistry::new());
        let notifier: Arc<dyn NotificationSink> = Arc::new(LogNotifier);
        let executor = Arc::new(AdaptationExecutor::new(
            config.clone(),
            store,
            cooldowns.clone(),
            ledger.clone(),
            notifier.clone(),
            168,
        ));
        Harness {
            monitor: ImpactMonitor::new(ledger.clone(), cooldowns, notifier, executor),
            ledger,
            config,
        }
    }

    fn switch_adaptation(applied_hours_ago: i64, baseline: BaselineMetrics) -> Adaptation {
        let opportunity = AdaptationOpportunity {
            priority: OpportunityPriority::High,
            confidence: 0.87,
            description: "switch to sustainedFlow".into(),
            action: AdaptationAction::SwitchModel {
                from: Some("balanced".into()),
                to: "sustainedFlow".into(),
            },
            trigger: "test".into(),
            rollback_plan: "restore balanced".into(),
        };
        Adaptation::new(
            &opportunity,
            baseline,
            Utc::now() - Duration::hours(applied_hours_ago),
            168,
        )
    }

    #[test]
    fn not_due_adaptations_stay_active() {
        let h = harness();
        h.ledger.push(switch_adaptation(
            100,
            BaselineMetrics {
                productivity_score: 70.0,
                satisfaction: 3.5,
            },
        ));

        let pending = h.monitor.evaluate_all(&report_with(75.0, 3.5, 10), Utc::now());
        assert!(pending.is_empty());
        assert_eq!(h.ledger.active().len(), 1);
    }

    #[test]
    fn improvement_settles_successful() {
        let h = harness();
        h.ledger.push(switch_adaptation(
            169,
            BaselineMetrics {
                productivity_score: 70.0,
                satisfaction: 3.5,
            },
        ));

        let pending = h.monitor.evaluate_all(&report_with(75.0, 3.5, 10), Utc::now());
        assert!(pending.is_empty());

        let record = &h.ledger.all()[0];
        assert_eq!(record.state, AdaptationState::Successful);
        let impact = record.impact.unwrap();
        assert!((impact.overall_improvement - 3.0).abs() < 1e-9);
    }

    #[test]
    fn regression_flags_and_rollback_restores_config() {
        let h = harness();
        h.config.set_active_model("sustainedFlow").unwrap();
        h.ledger.push(switch_adaptation(
            169,
            BaselineMetrics {
                productivity_score: 70.0,
                satisfaction: 4.0,
            },
        ));

        let pending = h.monitor.evaluate_all(&report_with(68.0, 3.0, 10), Utc::now());
        assert_eq!(pending.len(), 1);

        let flagged = h.ledger.get(&pending[0]).unwrap();
        assert_eq!(flagged.state, AdaptationState::NeedsRollback);
        let impact = flagged.impact.unwrap();
        assert!((impact.overall_improvement - (-9.2)).abs() < 1e-9);

        // The scheduled follow-up pass reverts the configuration exactly.
        h.monitor.execute_rollbacks(&pending, Utc::now());
        let reverted = h.ledger.get(&pending[0]).unwrap();
        assert_eq!(reverted.state, AdaptationState::RolledBack);
        assert!(reverted.rolled_back_at.is_some());
        assert_eq!(h.config.active_model(), Some("balanced".into()));
    }

    #[test]
    fn missing_metrics_defer_evaluation() {
        let h = harness();
        h.ledger.push(switch_adaptation(
            169,
            BaselineMetrics {
                productivity_score: 70.0,
                satisfaction: 3.5,
            },
        ));

        // Report with zero sessions carries no usable current metrics.
        let pending = h.monitor.evaluate_all(&report_with(15.0, 3.0, 0), Utc::now());
        assert!(pending.is_empty());
        // Still Active: retried next tick, never misclassified.
        assert_eq!(h.ledger.active().len(), 1);
    }
}
