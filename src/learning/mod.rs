//! Learning data synthesizer.
//!
//! On session end, reduces the session's accumulated counters into one
//! `LearningDataPoint` and appends it to a bounded, recency-biased history.
//! The most recent tail of the history is mirrored into the persisted
//! analytics blob.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, error};

use crate::models::{
    learning::SUCCESS_COMPLETION_THRESHOLD, BreakPattern, ContextSnapshot, LearningDataPoint,
    LearningHints, SessionMetrics, SessionOutcome,
};
use crate::store::AnalyticsArchive;

/// Baseline minutes between breaks, nudged by the observed interruption
/// rate.
const BREAK_FREQUENCY_BASELINE_MIN: u32 = 30;

pub struct LearningSynthesizer {
    history: Mutex<Vec<LearningDataPoint>>,
    archive: Arc<AnalyticsArchive>,
    history_cap: usize,
    history_trim: usize,
    persisted_cap: usize,
}

impl LearningSynthesizer {
    /// Restores the persisted learning tail so aggregation has continuity
    /// across restarts.
    pub fn new(
        archive: Arc<AnalyticsArchive>,
        history_cap: usize,
        history_trim: usize,
        persisted_cap: usize,
    ) -> Self {
        let seeded = archive.load().learning_data;
        Self {
            history: Mutex::new(seeded),
            archive,
            history_cap,
            history_trim,
            persisted_cap,
        }
    }

    pub fn synthesize(
        &self,
        outcome: &SessionOutcome,
        context: ContextSnapshot,
    ) -> LearningDataPoint {
        let point = LearningDataPoint {
            recorded_at: Utc::now(),
            success: outcome.completion_rate > SUCCESS_COMPLETION_THRESHOLD,
            context,
            metrics: SessionMetrics {
                completion_rate: outcome.completion_rate,
                interruptions: outcome.interruptions,
                breaks_taken: outcome.breaks_taken,
                focus_periods: outcome.focus_periods,
                manual_overrides: outcome.manual_overrides,
            },
            hints: LearningHints {
                ideal_duration_delta_min: ideal_duration_delta(outcome.completion_rate),
                preferred_break_pattern: classify_break_pattern(outcome.breaks_taken),
                optimal_break_frequency_min: optimal_break_frequency(outcome.interruptions),
            },
        };

        self.append(point.clone());
        point
    }

    fn append(&self, point: LearningDataPoint) {
        let tail: Vec<LearningDataPoint> = {
            let mut history = match self.history.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            history.push(point);

            if history.len() > self.history_cap {
                let excess = history.len() - self.history_trim;
                history.drain(..excess);
                debug!(
                    "learning history trimmed to most recent {}",
                    self.history_trim
                );
            }

            let start = history.len().saturating_sub(self.persisted_cap);
            history[start..].to_vec()
        };

        if let Err(err) = self.archive.write_learning(&tail) {
            error!("failed to persist learning tail: {err}");
        }
    }

    pub fn history(&self) -> Vec<LearningDataPoint> {
        match self.history.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Minutes to shift the next work block by, from the completion bands.
fn ideal_duration_delta(completion_rate: f64) -> i32 {
    if completion_rate < 0.5 {
        -15
    } else if completion_rate < 0.7 {
        -5
    } else if completion_rate > 0.9 {
        10
    } else {
        0
    }
}

fn classify_break_pattern(breaks_taken: u32) -> BreakPattern {
    match breaks_taken {
        0 | 1 => BreakPattern::Minimal,
        2 | 3 => BreakPattern::Regular,
        _ => BreakPattern::Frequent,
    }
}

/// ±10 minutes around the baseline: interruption-heavy sessions get more
/// frequent breaks, interruption-free sessions fewer.
fn optimal_break_frequency(interruptions: u32) -> u32 {
    if interruptions >= 3 {
        BREAK_FREQUENCY_BASELINE_MIN - 10
    } else if interruptions == 0 {
        BREAK_FREQUENCY_BASELINE_MIN + 10
    } else {
        BREAK_FREQUENCY_BASELINE_MIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnergyLevel, TaskCategory};
    use crate::store::MemoryStore;

    fn context() -> ContextSnapshot {
        ContextSnapshot {
            hour_of_day: 10,
            day_of_week: 3,
            task_category: TaskCategory::Writing,
            screen_activity: 6,
            notification_load: 2,
            energy: EnergyLevel::High,
            minutes_since_break: 25,
            open_documents: 4,
        }
    }

    fn outcome(completion_rate: f64, interruptions: u32, breaks_taken: u32) -> SessionOutcome {
        SessionOutcome {
            completion_rate,
            interruptions,
            breaks_taken,
            focus_periods: 2,
            manual_overrides: 0,
            session_minutes: 45,
        }
    }

    fn synthesizer() -> LearningSynthesizer {
        let archive = Arc::new(AnalyticsArchive::new(Arc::new(MemoryStore::new())));
        LearningSynthesizer::new(archive, 100, 50, 20)
    }

    #[test]
    fn duration_delta_follows_completion_bands() {
        assert_eq!(ideal_duration_delta(0.4), -15);
        assert_eq!(ideal_duration_delta(0.6), -5);
        assert_eq!(ideal_duration_delta(0.7), 0);
        assert_eq!(ideal_duration_delta(0.85), 0);
        assert_eq!(ideal_duration_delta(0.95), 10);
    }

    #[test]
    fn success_label_is_strictly_above_threshold() {
        let synth = synthesizer();
        assert!(!synth.synthesize(&outcome(0.7, 1, 2), context()).success);
        assert!(synth.synthesize(&outcome(0.71, 1, 2), context()).success);
    }

    #[test]
    fn break_pattern_and_frequency_hints() {
        let synth = synthesizer();

        let busy = synth.synthesize(&outcome(0.8, 4, 5), context());
        assert_eq!(busy.hints.preferred_break_pattern, BreakPattern::Frequent);
        assert_eq!(busy.hints.optimal_break_frequency_min, 20);

        let calm = synth.synthesize(&outcome(0.8, 0, 1), context());
        assert_eq!(calm.hints.preferred_break_pattern, BreakPattern::Minimal);
        assert_eq!(calm.hints.optimal_break_frequency_min, 40);

        let steady = synth.synthesize(&outcome(0.8, 1, 2), context());
        assert_eq!(steady.hints.preferred_break_pattern, BreakPattern::Regular);
        assert_eq!(steady.hints.optimal_break_frequency_min, 30);
    }

    #[test]
    fn history_trims_to_recent_half_on_overflow() {
        let synth = synthesizer();
        for i in 0..101 {
            let rate = if i % 2 == 0 { 0.8 } else { 0.6 };
            synth.synthesize(&outcome(rate, 1, 2), context());
        }

        let history = synth.history();
        assert_eq!(history.len(), 50);
    }

    #[test]
    fn persisted_tail_is_capped() {
        let store = Arc::new(MemoryStore::new());
        let archive = Arc::new(AnalyticsArchive::new(store));
        let synth = LearningSynthesizer::new(archive.clone(), 100, 50, 20);

        for _ in 0..30 {
            synth.synthesize(&outcome(0.8, 1, 2), context());
        }

        assert_eq!(archive.load().learning_data.len(), 20);
    }
}
