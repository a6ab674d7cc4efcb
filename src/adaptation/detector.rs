//! Opportunity detector.
//!
//! Five independent rules run against the latest report every tick. Each
//! rule carries a fixed confidence; the post-filter then drops anything at
//! or below the floor or currently in cooldown, and sorts survivors by
//! priority weight (stable on ties).

use chrono::{DateTime, Utc};
use log::debug;

use crate::config::EngineConfig;
use crate::models::{
    AdaptationAction, AdaptationOpportunity, DayPart, EnergyLevel, InsightDimension,
    OpportunityPriority, PerformanceReport,
};

use super::cooldown::{CooldownKey, CooldownRegistry};

const MODEL_SWITCH_CONFIDENCE: f64 = 0.87;
const CONTEXT_OPTIMIZATION_CONFIDENCE: f64 = 0.92;
const ENERGY_ADAPTATION_CONFIDENCE: f64 = 0.89;
const TREND_RESPONSE_CONFIDENCE: f64 = 0.95;
const BEHAVIOR_ADAPTATION_CONFIDENCE: f64 = 0.82;

/// Fallback recommendation when a struggling energy bucket has no model
/// signal of its own: shorter iterations lower the cost of a bad block.
const LOW_ENERGY_FALLBACK_MODEL: &str = "shortIterations";

pub struct OpportunityDetector {
    confidence_floor: f64,
    context_effectiveness_threshold: f64,
    energy_outcome_threshold: f64,
    trend_decline_threshold: f64,
}

impl OpportunityDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            confidence_floor: config.confidence_floor,
            context_effectiveness_threshold: config.context_effectiveness_threshold,
            energy_outcome_threshold: config.energy_outcome_threshold,
            trend_decline_threshold: config.trend_decline_threshold,
        }
    }

    pub fn detect(
        &self,
        report: &PerformanceReport,
        active_model: Option<&str>,
        cooldowns: &CooldownRegistry,
        now: DateTime<Utc>,
    ) -> Vec<AdaptationOpportunity> {
        if !report.has_session_data() {
            debug!("no session data behind report; skipping detection");
            return Vec::new();
        }

        let mut opportunities = Vec::new();
        self.detect_model_switch(report, active_model, &mut opportunities);
        self.detect_context_optimizations(report, &mut opportunities);
        self.detect_energy_adaptations(report, &mut opportunities);
        self.detect_trend_response(report, &mut opportunities);
        self.detect_behavior_adaptations(report, &mut opportunities);

        self.filter_and_rank(opportunities, cooldowns, now)
    }

    fn detect_model_switch(
        &self,
        report: &PerformanceReport,
        active_model: Option<&str>,
        out: &mut Vec<AdaptationOpportunity>,
    ) {
        let Some(best) = report.most_effective_model.as_deref() else {
            return;
        };
        if active_model == Some(best) {
            return;
        }

        out.push(AdaptationOpportunity {
            priority: OpportunityPriority::High,
            confidence: MODEL_SWITCH_CONFIDENCE,
            description: format!(
                "'{best}' is outperforming the active scheduling model; switch to it"
            ),
            action: AdaptationAction::SwitchModel {
                from: active_model.map(str::to_string),
                to: best.to_string(),
            },
            trigger: "most effective model differs from the active model".into(),
            rollback_plan: "restore the previously active model".into(),
        });
    }

    fn detect_context_optimizations(
        &self,
        report: &PerformanceReport,
        out: &mut Vec<AdaptationOpportunity>,
    ) {
        for insight in &report.insights {
            if insight.dimension != InsightDimension::TimeOfDay {
                continue;
            }
            if insight.effectiveness <= self.context_effectiveness_threshold {
                continue;
            }
            let Some(day_part) = DayPart::parse(&insight.label) else {
                continue;
            };
            let Some(model) = insight.recommended_model.clone() else {
                continue;
            };

            out.push(AdaptationOpportunity {
                priority: OpportunityPriority::Medium,
                confidence: CONTEXT_OPTIMIZATION_CONFIDENCE,
                description: format!(
                    "{} sessions run at {:.0}% effectiveness; prefer '{}' in that window",
                    insight.label, insight.effectiveness, model
                ),
                action: AdaptationAction::ContextPreference {
                    day_part,
                    recommended_model: model,
                    effectiveness: insight.effectiveness,
                },
                trigger: format!(
                    "time-of-day effectiveness above {:.0}",
                    self.context_effectiveness_threshold
                ),
                rollback_plan: "clear the stored contextual preference".into(),
            });
        }
    }

    fn detect_energy_adaptations(
        &self,
        report: &PerformanceReport,
        out: &mut Vec<AdaptationOpportunity>,
    ) {
        for insight in &report.insights {
            if insight.dimension != InsightDimension::EnergyLevel {
                continue;
            }
            if insight.expected_outcome >= self.energy_outcome_threshold {
                continue;
            }
            let Some(level) = EnergyLevel::parse(&insight.label) else {
                continue;
            };

            let recommended_model = insight
                .recommended_model
                .clone()
                .unwrap_or_else(|| LOW_ENERGY_FALLBACK_MODEL.to_string());

            out.push(AdaptationOpportunity {
                priority: OpportunityPriority::High,
                confidence: ENERGY_ADAPTATION_CONFIDENCE,
                description: format!(
                    "{}-energy sessions land at {:.0}%; adjust scheduling for that state",
                    insight.label, insight.expected_outcome
                ),
                action: AdaptationAction::EnergyAdjustment {
                    level,
                    recommended_model,
                    expected_outcome: insight.expected_outcome,
                },
                trigger: format!(
                    "energy-level outcome below {:.0}",
                    self.energy_outcome_threshold
                ),
                rollback_plan: "clear the stored energy adjustment".into(),
            });
        }
    }

    fn detect_trend_response(
        &self,
        report: &PerformanceReport,
        out: &mut Vec<AdaptationOpportunity>,
    ) {
        // A trend needs a previous week to exist; a flat zero from an empty
        // window is not a decline.
        if report.trends.previous_week_score <= 0.0 {
            return;
        }
        if report.trends.productivity_trend >= self.trend_decline_threshold {
            return;
        }

        let mut causes = Vec::new();
        if report.trends.completion_trend < 0.0 {
            causes.push("completion rate falling week over week".to_string());
        }
        if report.trends.satisfaction_trend < 0.0 {
            causes.push("satisfaction falling week over week".to_string());
        }
        for shift in &report.shifts {
            causes.push(format!("behavioral shift: {}", shift.signal));
        }
        if causes.is_empty() {
            causes.push("productivity score falling week over week".to_string());
        }

        // Corrective sub-solutions drawn from the same report.
        let mut remedies = Vec::new();
        if let Some(insight) = report
            .insights
            .iter()
            .filter(|i| i.dimension == InsightDimension::EnergyLevel)
            .find(|i| i.expected_outcome < self.energy_outcome_threshold)
        {
            if let Some(level) = EnergyLevel::parse(&insight.label) {
                remedies.push(AdaptationAction::EnergyAdjustment {
                    level,
                    recommended_model: insight
                        .recommended_model
                        .clone()
                        .unwrap_or_else(|| LOW_ENERGY_FALLBACK_MODEL.to_string()),
                    expected_outcome: insight.expected_outcome,
                });
            }
        }
        if let Some(insight) = report
            .insights
            .iter()
            .filter(|i| i.dimension == InsightDimension::TimeOfDay)
            .max_by(|a, b| a.effectiveness.total_cmp(&b.effectiveness))
        {
            if let (Some(day_part), Some(model)) = (
                DayPart::parse(&insight.label),
                insight.recommended_model.clone(),
            ) {
                remedies.push(AdaptationAction::ContextPreference {
                    day_part,
                    recommended_model: model,
                    effectiveness: insight.effectiveness,
                });
            }
        }

        out.push(AdaptationOpportunity {
            priority: OpportunityPriority::High,
            confidence: TREND_RESPONSE_CONFIDENCE,
            description: format!(
                "productivity declining ({:+.1} points/day); apply corrective changes",
                report.trends.productivity_trend
            ),
            action: AdaptationAction::TrendCorrection { causes, remedies },
            trigger: format!(
                "productivity trend below {:.1}",
                self.trend_decline_threshold
            ),
            rollback_plan: "revert the corrective changes".into(),
        });
    }

    fn detect_behavior_adaptations(
        &self,
        report: &PerformanceReport,
        out: &mut Vec<AdaptationOpportunity>,
    ) {
        for shift in &report.shifts {
            let adjustment = match shift.signal.as_str() {
                "sessionLength" => "re-align work block length with recent sessions",
                "breakDiscipline" => "tighten break reminders",
                "distractionLoad" => "shorten focus blocks to reduce exposure",
                _ => "review scheduling against the new pattern",
            };

            out.push(AdaptationOpportunity {
                priority: OpportunityPriority::Medium,
                confidence: BEHAVIOR_ADAPTATION_CONFIDENCE,
                description: format!("behavioral shift detected: {}", shift.detail),
                action: AdaptationAction::BehaviorShift {
                    shift: shift.signal.clone(),
                    adjustment: adjustment.to_string(),
                },
                trigger: "week-over-week behavioral comparison".into(),
                rollback_plan: "clear the stored behavioral adjustment".into(),
            });
        }
    }

    /// Drop anything at or below the confidence floor or in cooldown, then
    /// order by priority weight. The sort is stable, so equal priorities
    /// keep their detection order.
    pub fn filter_and_rank(
        &self,
        opportunities: Vec<AdaptationOpportunity>,
        cooldowns: &CooldownRegistry,
        now: DateTime<Utc>,
    ) -> Vec<AdaptationOpportunity> {
        let mut survivors: Vec<AdaptationOpportunity> = opportunities
            .into_iter()
            .filter(|op| op.confidence > self.confidence_floor)
            .filter(|op| !cooldowns.is_cooling(CooldownKey::for_action(&op.action), now))
            .collect();

        survivors.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()));
        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BehavioralShift, ContextualInsight, PredictiveMetrics, ProductivitySummary,
        TrendAnalysis,
    };

    fn base_report() -> PerformanceReport {
        PerformanceReport {
            generated_at: Utc::now(),
            summary: ProductivitySummary {
                productivity_score: 70.0,
                completion_rate: 0.8,
                session_frequency: 5.0,
                satisfaction: 0.6,
                sessions_analyzed: 10,
                events_analyzed: 40,
            },
            model_comparisons: Vec::new(),
            most_effective_model: Some("sustainedFlow".into()),
            insights: Vec::new(),
            trends: TrendAnalysis {
                productivity_trend: 1.0,
                completion_trend: 0.0,
                satisfaction_trend: 0.0,
                baseline_delta: 0.0,
                current_week_score: 70.0,
                previous_week_score: 65.0,
            },
            shifts: Vec::new(),
            recommendations: Vec::new(),
            forecast: PredictiveMetrics {
                next_week_score: 72.0,
            },
        }
    }

    fn detector() -> OpportunityDetector {
        OpportunityDetector::new(&EngineConfig::default())
    }

    #[test]
    fn model_switch_fires_when_active_differs() {
        let report = base_report();
        let registry = CooldownRegistry::new();

        let ops = detector().detect(&report, Some("balanced"), &registry, Utc::now());
        assert_eq!(ops.len(), 1);
        assert!((ops[0].confidence - 0.87).abs() < 1e-9);
        assert!(matches!(
            &ops[0].action,
            AdaptationAction::SwitchModel { to, .. } if to == "sustainedFlow"
        ));

        // Already on the best model: nothing to do.
        let quiet = detector().detect(&report, Some("sustainedFlow"), &registry, Utc::now());
        assert!(quiet.is_empty());
    }

    #[test]
    fn empty_report_detects_nothing() {
        let mut report = base_report();
        report.summary.sessions_analyzed = 0;
        let registry = CooldownRegistry::new();

        let ops = detector().detect(&report, Some("balanced"), &registry, Utc::now());
        assert!(ops.is_empty());
    }

    #[test]
    fn confidence_at_or_below_floor_never_survives() {
        let registry = CooldownRegistry::new();
        let make = |confidence: f64| AdaptationOpportunity {
            priority: OpportunityPriority::High,
            confidence,
            description: "test".into(),
            action: AdaptationAction::BehaviorShift {
                shift: format!("shift-{confidence}"),
                adjustment: "none".into(),
            },
            trigger: "test".into(),
            rollback_plan: "none".into(),
        };

        let survivors = detector().filter_and_rank(
            vec![make(0.79), make(0.80), make(0.81)],
            &registry,
            Utc::now(),
        );
        assert_eq!(survivors.len(), 1);
        assert!((survivors[0].confidence - 0.81).abs() < 1e-9);
    }

    #[test]
    fn cooldown_suppresses_identical_payloads() {
        let report = base_report();
        let registry = CooldownRegistry::new();
        let now = Utc::now();

        let first = detector().detect(&report, Some("balanced"), &registry, now);
        assert_eq!(first.len(), 1);
        registry.register(CooldownKey::for_action(&first[0].action), now);

        let second = detector().detect(&report, Some("balanced"), &registry, now);
        assert!(second.is_empty());
    }

    #[test]
    fn survivors_sort_by_priority_weight() {
        let mut report = base_report();
        report.most_effective_model = Some("sustainedFlow".into());
        report.insights = vec![ContextualInsight {
            dimension: InsightDimension::TimeOfDay,
            label: "morning".into(),
            effectiveness: 92.0,
            recommended_model: Some("sustainedFlow".into()),
            expected_outcome: 93.0,
            sample_count: 5,
        }];
        report.shifts = vec![BehavioralShift {
            signal: "breakDiscipline".into(),
            detail: "skipping more breaks".into(),
            magnitude: 0.3,
        }];

        let ops = detector().detect(&report, Some("balanced"), &CooldownRegistry::new(), Utc::now());
        assert!(ops.len() >= 3);
        // High-priority model switch first, medium entries after.
        assert_eq!(ops[0].priority, OpportunityPriority::High);
        assert!(ops[1..]
            .iter()
            .all(|op| op.priority.weight() <= ops[0].priority.weight()));
        let weights: Vec<u8> = ops.iter().map(|o| o.priority.weight()).collect();
        let mut sorted = weights.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(weights, sorted);
    }

    #[test]
    fn declining_trend_carries_causes_and_remedies() {
        let mut report = base_report();
        report.trends.productivity_trend = -1.5;
        report.trends.completion_trend = -0.1;
        report.insights = vec![ContextualInsight {
            dimension: InsightDimension::EnergyLevel,
            label: "low".into(),
            effectiveness: 45.0,
            recommended_model: None,
            expected_outcome: 45.0,
            sample_count: 4,
        }];

        let ops = detector().detect(&report, Some("sustainedFlow"), &CooldownRegistry::new(), Utc::now());
        let trend_op = ops
            .iter()
            .find(|op| matches!(op.action, AdaptationAction::TrendCorrection { .. }))
            .unwrap();
        assert!((trend_op.confidence - 0.95).abs() < 1e-9);

        let AdaptationAction::TrendCorrection { causes, remedies } = &trend_op.action else {
            panic!("expected trend correction");
        };
        assert!(causes.iter().any(|c| c.contains("completion")));
        assert!(matches!(
            remedies.first(),
            Some(AdaptationAction::EnergyAdjustment { .. })
        ));
    }
}
