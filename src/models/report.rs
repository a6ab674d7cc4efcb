//! The performance report: a fully derived, disposable snapshot recomputed
//! on demand from the current buffers. Never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivitySummary {
    /// 0-100, rounded.
    pub productivity_score: f64,
    pub completion_rate: f64,
    /// Sessions per week over the analysis window.
    pub session_frequency: f64,
    /// Average satisfaction normalized to 0-1.
    pub satisfaction: f64,
    pub sessions_analyzed: usize,
    pub events_analyzed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelComparison {
    pub model_id: String,
    /// successRate*0.8 + min(usage,10)/10*0.2, 0-1.
    pub performance_score: f64,
    pub success_rate: f64,
    pub completion_rate: f64,
    /// Average satisfaction on the 1-5 scale.
    pub avg_satisfaction: f64,
    pub usage_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InsightDimension {
    TimeOfDay,
    TaskCategory,
    EnergyLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualInsight {
    pub dimension: InsightDimension,
    pub label: String,
    /// 0-100 effectiveness of work done under this context.
    pub effectiveness: f64,
    pub recommended_model: Option<String>,
    /// 0-100 expected outcome when following the recommendation.
    pub expected_outcome: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    /// Productivity points per day, week over week.
    pub productivity_trend: f64,
    pub completion_trend: f64,
    pub satisfaction_trend: f64,
    /// Current week score minus the 28-day baseline score.
    pub baseline_delta: f64,
    pub current_week_score: f64,
    pub previous_week_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictiveMetrics {
    /// clamp(current + productivity_trend * 7, 0, 100).
    pub next_week_score: f64,
}

/// A detected change in how the user works, week over week.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralShift {
    pub signal: String,
    pub detail: String,
    /// Relative magnitude of the change, dimensionless.
    pub magnitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ProductivitySummary,
    pub model_comparisons: Vec<ModelComparison>,
    pub most_effective_model: Option<String>,
    pub insights: Vec<ContextualInsight>,
    pub trends: TrendAnalysis,
    pub shifts: Vec<BehavioralShift>,
    pub recommendations: Vec<String>,
    pub forecast: PredictiveMetrics,
}

impl PerformanceReport {
    /// Detection rules are skipped entirely when no sessions back the
    /// report; an empty engine must not manufacture opportunities.
    pub fn has_session_data(&self) -> bool {
        self.summary.sessions_analyzed > 0
    }

    /// Average satisfaction mapped back onto the 1-5 rating scale, for
    /// baseline/impact comparisons.
    pub fn satisfaction_rating(&self) -> f64 {
        self.summary.satisfaction * 4.0 + 1.0
    }
}
