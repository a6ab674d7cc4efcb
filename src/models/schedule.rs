//! Scheduling model types: scenarios, work styles, assessments, and the
//! generated candidate models themselves.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work duration bounds for any generated model, in minutes.
pub const MIN_WORK_MINUTES: u32 = 15;
pub const MAX_WORK_MINUTES: u32 = 120;
/// Rest duration bounds for any generated model, in minutes.
pub const MIN_REST_MINUTES: u32 = 3;
pub const MAX_REST_MINUTES: u32 = 30;

/// The seven predefined work contexts a candidate model is generated for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Scenario {
    MorningFocus,
    AfternoonFocus,
    EveningWindDown,
    CreativeSession,
    DebuggingSession,
    LearningSession,
    GeneralFocus,
}

impl Scenario {
    pub const ALL: [Scenario; 7] = [
        Scenario::MorningFocus,
        Scenario::AfternoonFocus,
        Scenario::EveningWindDown,
        Scenario::CreativeSession,
        Scenario::DebuggingSession,
        Scenario::LearningSession,
        Scenario::GeneralFocus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::MorningFocus => "morningFocus",
            Scenario::AfternoonFocus => "afternoonFocus",
            Scenario::EveningWindDown => "eveningWindDown",
            Scenario::CreativeSession => "creativeSession",
            Scenario::DebuggingSession => "debuggingSession",
            Scenario::LearningSession => "learningSession",
            Scenario::GeneralFocus => "generalFocus",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum WorkStyle {
    SustainedFlow,
    ShortIterations,
    Balanced,
    ClassicCycles,
}

impl WorkStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStyle::SustainedFlow => "sustainedFlow",
            WorkStyle::ShortIterations => "shortIterations",
            WorkStyle::Balanced => "balanced",
            WorkStyle::ClassicCycles => "classicCycles",
        }
    }
}

/// A user's self-assessment, the primary input to model generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssessment {
    pub id: String,
    pub preferred_style: WorkStyle,
    /// How much of the assessment the user completed, 0-1.
    pub completion_score: f64,
    pub adaptability_score: f64,
}

/// Observed performance attached to a model once it has been used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPerformance {
    pub sessions: u32,
    pub avg_completion: f64,
    pub avg_satisfaction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedModel {
    pub id: String,
    pub scenario: Scenario,
    pub work_minutes: u32,
    pub rest_minutes: u32,
    pub cycles: Option<u32>,
    pub long_rest_minutes: Option<u32>,
    /// Heuristic reliability estimate, clamped to [0.1, 1.0].
    pub confidence: f64,
    /// Id of the assessment this model was generated from.
    pub source_assessment: String,
    pub adaptation_notes: Vec<String>,
    pub performance: Option<ModelPerformance>,
}

impl GeneratedModel {
    pub fn new(
        scenario: Scenario,
        work_minutes: u32,
        rest_minutes: u32,
        cycles: Option<u32>,
        long_rest_minutes: Option<u32>,
        confidence: f64,
        source_assessment: &str,
    ) -> Self {
        Self {
            id: format!("{}-{}", scenario.as_str(), Uuid::new_v4()),
            scenario,
            work_minutes,
            rest_minutes,
            cycles,
            long_rest_minutes,
            confidence,
            source_assessment: source_assessment.to_string(),
            adaptation_notes: Vec::new(),
            performance: None,
        }
    }
}

/// Ranked output of one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCandidates {
    /// Top candidates with confidence >= 0.7, at most three.
    pub recommended: Vec<GeneratedModel>,
    /// Candidates with confidence in [0.5, 0.7).
    pub alternatives: Vec<GeneratedModel>,
}
