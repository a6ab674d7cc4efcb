//! Base duration profiles and scenario offsets for model generation.

use crate::models::{Scenario, WorkStyle};

#[derive(Debug, Clone, Copy)]
pub struct BaseProfile {
    pub work_minutes: f64,
    pub rest_minutes: f64,
    pub cycles: Option<u32>,
    pub long_rest_minutes: Option<f64>,
}

/// Base (work, rest) minutes keyed by preferred work style.
pub fn base_profile(style: WorkStyle) -> BaseProfile {
    match style {
        WorkStyle::SustainedFlow => BaseProfile {
            work_minutes: 75.0,
            rest_minutes: 18.0,
            cycles: Some(3),
            long_rest_minutes: Some(25.0),
        },
        WorkStyle::ShortIterations => BaseProfile {
            work_minutes: 20.0,
            rest_minutes: 6.0,
            cycles: None,
            long_rest_minutes: None,
        },
        WorkStyle::Balanced => BaseProfile {
            work_minutes: 45.0,
            rest_minutes: 12.0,
            cycles: Some(3),
            long_rest_minutes: Some(20.0),
        },
        WorkStyle::ClassicCycles => BaseProfile {
            work_minutes: 25.0,
            rest_minutes: 5.0,
            cycles: Some(4),
            long_rest_minutes: Some(15.0),
        },
    }
}

/// Scenario-specific offsets, applied after the session-length adjustment.
pub fn apply_scenario_offsets(scenario: Scenario, work: f64, rest: f64) -> (f64, f64) {
    match scenario {
        Scenario::MorningFocus | Scenario::AfternoonFocus => (work + 5.0, rest),
        Scenario::EveningWindDown => (work * 0.8, rest * 0.8),
        Scenario::CreativeSession | Scenario::DebuggingSession => (work, rest + 3.0),
        Scenario::LearningSession => (work * 0.9, rest + 2.0),
        Scenario::GeneralFocus => (work, rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sustained_flow_base_matches_profile() {
        let profile = base_profile(WorkStyle::SustainedFlow);
        assert_eq!(profile.work_minutes, 75.0);
        assert_eq!(profile.rest_minutes, 18.0);
        assert_eq!(profile.cycles, Some(3));
        assert_eq!(profile.long_rest_minutes, Some(25.0));
    }

    #[test]
    fn evening_scales_both_durations_down() {
        let (work, rest) = apply_scenario_offsets(Scenario::EveningWindDown, 50.0, 10.0);
        assert_eq!(work, 40.0);
        assert_eq!(rest, 8.0);
    }

    #[test]
    fn learning_shortens_work_and_pads_rest() {
        let (work, rest) = apply_scenario_offsets(Scenario::LearningSession, 50.0, 10.0);
        assert_eq!(work, 45.0);
        assert_eq!(rest, 12.0);
    }
}
