//! Learning data models.
//!
//! A `LearningDataPoint` is the compact, labeled summary of one completed
//! work session. Points are derived once at session end and kept in a
//! bounded, recency-biased history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::ContextSnapshot;

/// Completion rate above which a session counts as a success.
pub const SUCCESS_COMPLETION_THRESHOLD: f64 = 0.7;

/// Counters accumulated over one session, reported by the host at session
/// end. Input to the synthesizer, not persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    /// Fraction of the planned work actually completed, 0-1.
    pub completion_rate: f64,
    pub interruptions: u32,
    pub breaks_taken: u32,
    pub focus_periods: u32,
    pub manual_overrides: u32,
    pub session_minutes: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BreakPattern {
    Frequent,
    Regular,
    Minimal,
}

impl BreakPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakPattern::Frequent => "frequent",
            BreakPattern::Regular => "regular",
            BreakPattern::Minimal => "minimal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub completion_rate: f64,
    pub interruptions: u32,
    pub breaks_taken: u32,
    pub focus_periods: u32,
    pub manual_overrides: u32,
}

/// Derived tuning hints carried alongside the raw metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningHints {
    /// Minutes the next work block should shift by, relative to the current
    /// model. Negative when sessions are being abandoned early.
    pub ideal_duration_delta_min: i32,
    pub preferred_break_pattern: BreakPattern,
    pub optimal_break_frequency_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningDataPoint {
    pub recorded_at: DateTime<Utc>,
    pub success: bool,
    pub context: ContextSnapshot,
    pub metrics: SessionMetrics,
    pub hints: LearningHints,
}
