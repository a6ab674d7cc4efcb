//! Model generator.
//!
//! Given one user assessment plus observed usage signals, synthesizes a
//! candidate scheduling model per predefined scenario, scores each with a
//! closed-form confidence heuristic, and buckets the survivors into
//! recommended vs alternative. Runs under a soft latency budget: when
//! exceeded it stops producing further scenarios instead of failing.

pub mod profiles;

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::error::EngineError;
use crate::models::{
    schedule::{MAX_REST_MINUTES, MAX_WORK_MINUTES, MIN_REST_MINUTES, MIN_WORK_MINUTES},
    GeneratedModel, LearningDataPoint, ModelCandidates, Scenario, UsageEvent, UsageEventKind,
    UserAssessment,
};

pub use profiles::{apply_scenario_offsets, base_profile, BaseProfile};

/// Candidates below this confidence are discarded outright.
const CONFIDENCE_DISCARD_FLOOR: f64 = 0.3;
/// Confidence at or above this is eligible for the recommended bucket.
const RECOMMENDED_CONFIDENCE: f64 = 0.7;
/// Confidence at or above this (but below recommended) is an alternative.
const ALTERNATIVE_CONFIDENCE: f64 = 0.5;
/// At most this many candidates are recommended.
const RECOMMENDED_LIMIT: usize = 3;

/// Observed usage signals feeding confidence and duration adjustment.
#[derive(Debug, Clone, Default)]
pub struct GenerationSignals {
    /// Average completed-session length in minutes; 0 when unknown.
    pub avg_session_minutes: f64,
    /// Distinct behavioral signal kinds observed.
    pub activity_signal_count: usize,
    /// Completed sessions on record.
    pub usage_history_sessions: usize,
    /// Distinct hours of day with at least one observation.
    pub hourly_energy_samples: usize,
    /// High-severity burnout indicator within the last 7 days.
    pub recent_high_burnout: bool,
}

impl GenerationSignals {
    /// Derive signals from the engine's buffers.
    pub fn from_observations(
        events: &[UsageEvent],
        learning: &[LearningDataPoint],
        now: DateTime<Utc>,
    ) -> Self {
        let session_minutes: Vec<f64> = events
            .iter()
            .filter(|e| e.kind == UsageEventKind::SessionEnded)
            .filter_map(|e| e.metadata.get("sessionMinutes").and_then(|v| v.as_f64()))
            .collect();
        let avg_session_minutes = if session_minutes.is_empty() {
            0.0
        } else {
            session_minutes.iter().sum::<f64>() / session_minutes.len() as f64
        };

        let mut kinds = std::collections::HashSet::new();
        let mut hours = std::collections::HashSet::new();
        for event in events {
            kinds.insert(event.kind);
            hours.insert(event.context.hour_of_day);
        }

        let week_ago = now - Duration::days(7);
        let recent_high_burnout = learning.iter().any(|p| {
            p.recorded_at >= week_ago
                && p.metrics.completion_rate < 0.4
                && p.metrics.breaks_taken == 0
        });

        Self {
            avg_session_minutes,
            activity_signal_count: kinds.len(),
            usage_history_sessions: learning.len(),
            hourly_energy_samples: hours.len(),
            recent_high_burnout,
        }
    }
}

pub struct ModelGenerator {
    budget_ms: u64,
}

impl ModelGenerator {
    pub fn new(budget_ms: u64) -> Self {
        Self { budget_ms }
    }

    pub fn generate(
        &self,
        assessment: &UserAssessment,
        signals: &GenerationSignals,
    ) -> ModelCandidates {
        let started = Instant::now();
        let confidence = confidence_score(assessment, signals);

        let mut candidates: Vec<GeneratedModel> = Vec::new();
        for (index, scenario) in Scenario::ALL.iter().enumerate() {
            if index > 0 && started.elapsed().as_millis() as u64 >= self.budget_ms {
                let err = EngineError::GenerationTimeout {
                    budget_ms: self.budget_ms,
                    generated: candidates.len(),
                };
                warn!("{err}; returning partial candidate set");
                break;
            }

            let candidate = self.generate_for_scenario(*scenario, assessment, signals, confidence);
            if candidate.confidence >= CONFIDENCE_DISCARD_FLOOR {
                candidates.push(candidate);
            }
        }

        bucket_candidates(candidates)
    }

    fn generate_for_scenario(
        &self,
        scenario: Scenario,
        assessment: &UserAssessment,
        signals: &GenerationSignals,
        confidence: f64,
    ) -> GeneratedModel {
        let profile = base_profile(assessment.preferred_style);
        let mut work = profile.work_minutes;
        let mut rest = profile.rest_minutes;
        let mut long_rest = profile.long_rest_minutes;

        // Session-length adjustment from observed behavior.
        if signals.avg_session_minutes > 60.0 {
            work = (work + 15.0).min(90.0);
            rest = (rest + 3.0).min(20.0);
        } else if signals.avg_session_minutes > 0.0 && signals.avg_session_minutes < 30.0 {
            work = (work - 10.0).max(20.0);
            rest = (rest - 2.0).max(5.0);
        }

        let (adjusted_work, adjusted_rest) = apply_scenario_offsets(scenario, work, rest);
        work = adjusted_work;
        rest = adjusted_rest;

        let mut notes = Vec::new();
        if signals.recent_high_burnout {
            rest += 5.0;
            long_rest = long_rest.map(|lr| lr + 10.0);
            notes.push("rest extended after recent burnout indicator".to_string());
        }

        let work_minutes = round_to_five(work).clamp(MIN_WORK_MINUTES, MAX_WORK_MINUTES);
        let rest_minutes =
            (rest.round() as u32).clamp(MIN_REST_MINUTES, MAX_REST_MINUTES);

        let mut model = GeneratedModel::new(
            scenario,
            work_minutes,
            rest_minutes,
            profile.cycles,
            long_rest.map(|lr| lr.round() as u32),
            confidence,
            &assessment.id,
        );
        model.adaptation_notes = notes;
        model
    }
}

/// Closed-form confidence over bounded signal counts, clamped to
/// [0.1, 1.0].
pub fn confidence_score(assessment: &UserAssessment, signals: &GenerationSignals) -> f64 {
    let mut confidence: f64 = 0.5;

    if assessment.completion_score >= 0.8 {
        confidence += 0.2;
    }

    if signals.activity_signal_count >= 5 {
        confidence += 0.15;
    } else if signals.activity_signal_count >= 3 {
        confidence += 0.1;
    }

    if signals.usage_history_sessions >= 5 {
        confidence += 0.1;
    }

    if signals.hourly_energy_samples >= 12 {
        confidence += 0.05;
    }

    confidence.clamp(0.1, 1.0)
}

fn round_to_five(minutes: f64) -> u32 {
    ((minutes / 5.0).round() * 5.0) as u32
}

fn bucket_candidates(mut candidates: Vec<GeneratedModel>) -> ModelCandidates {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut result = ModelCandidates::default();
    for candidate in candidates {
        if candidate.confidence >= RECOMMENDED_CONFIDENCE
            && result.recommended.len() < RECOMMENDED_LIMIT
        {
            result.recommended.push(candidate);
        } else if candidate.confidence >= ALTERNATIVE_CONFIDENCE {
            // High-confidence overflow beyond the top three still surfaces,
            // just not as a recommendation.
            result.alternatives.push(candidate);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkStyle;

    fn assessment(style: WorkStyle, completion_score: f64) -> UserAssessment {
        UserAssessment {
            id: "assessment-1".into(),
            preferred_style: style,
            completion_score,
            adaptability_score: 0.6,
        }
    }

    fn strong_signals() -> GenerationSignals {
        GenerationSignals {
            avg_session_minutes: 75.0,
            activity_signal_count: 6,
            usage_history_sessions: 6,
            hourly_energy_samples: 15,
            recent_high_burnout: false,
        }
    }

    #[test]
    fn confidence_saturates_at_one() {
        let score = confidence_score(&assessment(WorkStyle::Balanced, 0.9), &strong_signals());
        assert_eq!(score, 1.0);
    }

    #[test]
    fn confidence_tiers_follow_signal_counts() {
        let weak = GenerationSignals::default();
        assert_eq!(
            confidence_score(&assessment(WorkStyle::Balanced, 0.5), &weak),
            0.5
        );

        let three_signals = GenerationSignals {
            activity_signal_count: 3,
            ..GenerationSignals::default()
        };
        assert!(
            (confidence_score(&assessment(WorkStyle::Balanced, 0.5), &three_signals) - 0.6)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn long_sessions_cap_at_ninety_twenty() {
        let generator = ModelGenerator::new(4000);
        let candidates = generator.generate(
            &assessment(WorkStyle::SustainedFlow, 0.9),
            &strong_signals(),
        );

        let general = candidates
            .recommended
            .iter()
            .chain(candidates.alternatives.iter())
            .find(|m| m.scenario == Scenario::GeneralFocus)
            .unwrap();
        assert_eq!(general.work_minutes, 90);
        assert_eq!(general.rest_minutes, 20);
        assert_eq!(general.cycles, Some(3));
    }

    #[test]
    fn all_candidates_respect_duration_invariants() {
        let generator = ModelGenerator::new(4000);
        for style in [
            WorkStyle::SustainedFlow,
            WorkStyle::ShortIterations,
            WorkStyle::Balanced,
            WorkStyle::ClassicCycles,
        ] {
            for avg in [0.0, 20.0, 45.0, 75.0] {
                let signals = GenerationSignals {
                    avg_session_minutes: avg,
                    recent_high_burnout: avg == 20.0,
                    ..strong_signals()
                };
                let candidates = generator.generate(&assessment(style, 0.9), &signals);
                for model in candidates
                    .recommended
                    .iter()
                    .chain(candidates.alternatives.iter())
                {
                    assert!(model.work_minutes >= MIN_WORK_MINUTES);
                    assert!(model.work_minutes <= MAX_WORK_MINUTES);
                    assert_eq!(model.work_minutes % 5, 0);
                    assert!(model.rest_minutes >= MIN_REST_MINUTES);
                    assert!(model.rest_minutes <= MAX_REST_MINUTES);
                    assert!(model.confidence >= 0.1 && model.confidence <= 1.0);
                }
            }
        }
    }

    #[test]
    fn recommended_bucket_holds_top_three() {
        let generator = ModelGenerator::new(4000);
        let candidates = generator.generate(
            &assessment(WorkStyle::ClassicCycles, 0.9),
            &strong_signals(),
        );

        // All seven scenarios share the saturated confidence here.
        assert_eq!(candidates.recommended.len(), 3);
        assert_eq!(candidates.alternatives.len(), 4);
    }

    #[test]
    fn exhausted_budget_degrades_to_partial_output() {
        let generator = ModelGenerator::new(0);
        let candidates = generator.generate(
            &assessment(WorkStyle::Balanced, 0.9),
            &strong_signals(),
        );

        // The first scenario is always produced; the budget check only
        // gates further ones.
        let total = candidates.recommended.len() + candidates.alternatives.len();
        assert_eq!(total, 1);
    }

    #[test]
    fn base_confidence_candidates_are_alternatives_only() {
        // 0.5 base only: eligible as alternatives, never recommended.
        let generator = ModelGenerator::new(4000);
        let candidates = generator.generate(
            &assessment(WorkStyle::Balanced, 0.4),
            &GenerationSignals::default(),
        );
        assert!(candidates.recommended.is_empty());
        assert_eq!(candidates.alternatives.len(), 7);
    }

    #[test]
    fn burnout_extends_rest_and_long_rest() {
        let generator = ModelGenerator::new(4000);
        let calm = GenerationSignals {
            avg_session_minutes: 45.0,
            ..strong_signals()
        };
        let tired = GenerationSignals {
            recent_high_burnout: true,
            ..calm.clone()
        };

        let baseline = generator.generate(&assessment(WorkStyle::Balanced, 0.9), &calm);
        let eased = generator.generate(&assessment(WorkStyle::Balanced, 0.9), &tired);

        let base_general = baseline
            .recommended
            .iter()
            .chain(baseline.alternatives.iter())
            .find(|m| m.scenario == Scenario::GeneralFocus)
            .unwrap();
        let eased_general = eased
            .recommended
            .iter()
            .chain(eased.alternatives.iter())
            .find(|m| m.scenario == Scenario::GeneralFocus)
            .unwrap();

        assert_eq!(eased_general.rest_minutes, base_general.rest_minutes + 5);
        assert_eq!(
            eased_general.long_rest_minutes.unwrap(),
            base_general.long_rest_minutes.unwrap() + 10
        );
        assert!(!eased_general.adaptation_notes.is_empty());
    }
}
