//! Performance aggregator.
//!
//! A pure function of the buffered events and learning history: every call
//! recomputes the full `PerformanceReport` from scratch. There is no
//! incremental state to invalidate, which keeps the report trustworthy no
//! matter how the buffers changed since the last tick.

pub mod insights;
pub mod scoring;
pub mod trends;

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    InsightDimension, LearningDataPoint, ModelComparison, PerformanceReport, PredictiveMetrics,
    ProductivitySummary, UsageEvent, UsageEventKind,
};

pub use insights::extract_insights;
pub use scoring::{
    forecast_next_week, model_performance_score, normalize_satisfaction, productivity_score,
    success_rate,
};
pub use trends::{analyze_trends, detect_shifts};

use insights::session_outcome;

pub struct PerformanceAggregator {
    model_catalog: Vec<String>,
}

impl PerformanceAggregator {
    pub fn new(model_catalog: Vec<String>) -> Self {
        Self { model_catalog }
    }

    pub fn build_report(
        &self,
        events: &[UsageEvent],
        learning: &[LearningDataPoint],
        now: DateTime<Utc>,
    ) -> PerformanceReport {
        let summary = self.summarize(events, learning, now);
        let model_comparisons = self.compare_models(events);

        let most_effective_model = model_comparisons
            .iter()
            .filter(|c| c.usage_count > 0)
            .max_by(|a, b| a.performance_score.total_cmp(&b.performance_score))
            .map(|c| c.model_id.clone());

        let insights = extract_insights(events);
        let trends = analyze_trends(events, learning, now);
        let shifts = detect_shifts(events, now);
        let forecast = PredictiveMetrics {
            next_week_score: forecast_next_week(
                summary.productivity_score,
                trends.productivity_trend,
            ),
        };
        let recommendations = self.recommend(&summary, &trends, &insights);

        PerformanceReport {
            generated_at: now,
            summary,
            model_comparisons,
            most_effective_model,
            insights,
            trends,
            shifts,
            recommendations,
            forecast,
        }
    }

    fn summarize(
        &self,
        events: &[UsageEvent],
        learning: &[LearningDataPoint],
        now: DateTime<Utc>,
    ) -> ProductivitySummary {
        let completion_rate = if learning.is_empty() {
            0.0
        } else {
            learning
                .iter()
                .map(|p| p.metrics.completion_rate)
                .sum::<f64>()
                / learning.len() as f64
        };

        let week_ago = now - Duration::days(7);
        let session_frequency = learning
            .iter()
            .filter(|p| p.recorded_at >= week_ago)
            .count() as f64;

        let ratings: Vec<f64> = events
            .iter()
            .filter(|e| e.kind == UsageEventKind::FeedbackGiven)
            .filter_map(|e| e.feedback_rating())
            .collect();
        let satisfaction = if ratings.is_empty() {
            // Neutral until the user has said anything.
            0.5
        } else {
            normalize_satisfaction(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        ProductivitySummary {
            productivity_score: productivity_score(
                completion_rate,
                session_frequency,
                satisfaction,
            ),
            completion_rate,
            session_frequency,
            satisfaction,
            sessions_analyzed: learning.len(),
            events_analyzed: events.len(),
        }
    }

    fn compare_models(&self, events: &[UsageEvent]) -> Vec<ModelComparison> {
        // Candidate set: the built-in catalog plus anything observed.
        let mut candidates: BTreeSet<String> = self.model_catalog.iter().cloned().collect();
        for event in events {
            if let Some(model_id) = &event.model_id {
                candidates.insert(model_id.clone());
            }
        }

        candidates
            .into_iter()
            .map(|model_id| {
                let completions: Vec<f64> = events
                    .iter()
                    .filter(|e| e.model_id.as_deref() == Some(model_id.as_str()))
                    .filter_map(session_outcome)
                    .map(|o| o.completion_rate)
                    .collect();

                let ratings: Vec<f64> = events
                    .iter()
                    .filter(|e| {
                        e.kind == UsageEventKind::FeedbackGiven
                            && e.model_id.as_deref() == Some(model_id.as_str())
                    })
                    .filter_map(|e| e.feedback_rating())
                    .collect();

                let usage_count = completions.len() as u32;
                let completion_rate = if completions.is_empty() {
                    0.0
                } else {
                    completions.iter().sum::<f64>() / completions.len() as f64
                };
                let avg_satisfaction = if ratings.is_empty() {
                    3.0
                } else {
                    ratings.iter().sum::<f64>() / ratings.len() as f64
                };

                let success = success_rate(completion_rate, avg_satisfaction);
                ModelComparison {
                    model_id,
                    performance_score: model_performance_score(success, usage_count),
                    success_rate: success,
                    completion_rate,
                    avg_satisfaction,
                    usage_count,
                }
            })
            .collect()
    }

    fn recommend(
        &self,
        summary: &ProductivitySummary,
        trends: &crate::models::TrendAnalysis,
        insights: &[crate::models::ContextualInsight],
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if summary.sessions_analyzed > 0 && summary.completion_rate < 0.5 {
            recommendations
                .push("Sessions are ending early; try a shorter work block for a week.".into());
        }

        if trends.previous_week_score > 0.0 && trends.productivity_trend < 0.0 {
            recommendations
                .push("Productivity is trending down week over week; a reassessment may help.".into());
        }

        if let Some(best_window) = insights
            .iter()
            .filter(|i| i.dimension == InsightDimension::TimeOfDay && i.effectiveness > 85.0)
            .max_by(|a, b| a.effectiveness.total_cmp(&b.effectiveness))
        {
            recommendations.push(format!(
                "Your {} sessions are your strongest; protect that window.",
                best_window.label
            ));
        }

        if summary.sessions_analyzed > 0 && summary.satisfaction < 0.4 {
            recommendations
                .push("Recent feedback is low; switching scheduling models may help.".into());
        }

        recommendations
    }
}
