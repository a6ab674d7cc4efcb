//! Contextual insight extraction: effectiveness grouped by time-of-day
//! bucket, task category, and energy level, each annotated with a
//! recommended model and an expected outcome.

use std::collections::HashMap;

use crate::models::{
    ContextualInsight, InsightDimension, SessionOutcome, UsageEvent, UsageEventKind,
};

/// Minimum sessions in a bucket before it counts as a pattern. A single
/// lucky session must not become an optimization opportunity.
const MIN_BUCKET_SAMPLES: usize = 2;

struct Bucket {
    completions: Vec<f64>,
    by_model: HashMap<String, Vec<f64>>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            completions: Vec::new(),
            by_model: HashMap::new(),
        }
    }

    fn push(&mut self, model_id: Option<&String>, completion: f64) {
        self.completions.push(completion);
        if let Some(model) = model_id {
            self.by_model
                .entry(model.clone())
                .or_default()
                .push(completion);
        }
    }
}

pub fn extract_insights(events: &[UsageEvent]) -> Vec<ContextualInsight> {
    let mut time_buckets: HashMap<String, Bucket> = HashMap::new();
    let mut task_buckets: HashMap<String, Bucket> = HashMap::new();
    let mut energy_buckets: HashMap<String, Bucket> = HashMap::new();

    for event in events {
        if event.kind != UsageEventKind::SessionEnded {
            continue;
        }
        let Some(outcome) = session_outcome(event) else {
            continue;
        };

        time_buckets
            .entry(event.context.day_part().as_str().to_string())
            .or_insert_with(Bucket::new)
            .push(event.model_id.as_ref(), outcome.completion_rate);
        task_buckets
            .entry(event.context.task_category.as_str().to_string())
            .or_insert_with(Bucket::new)
            .push(event.model_id.as_ref(), outcome.completion_rate);
        energy_buckets
            .entry(event.context.energy.as_str().to_string())
            .or_insert_with(Bucket::new)
            .push(event.model_id.as_ref(), outcome.completion_rate);
    }

    let mut insights = Vec::new();
    collect(&mut insights, InsightDimension::TimeOfDay, time_buckets);
    collect(&mut insights, InsightDimension::TaskCategory, task_buckets);
    collect(&mut insights, InsightDimension::EnergyLevel, energy_buckets);

    // Stable output order: dimension first, then label.
    insights.sort_by(|a, b| a.label.cmp(&b.label));
    insights
}

fn collect(
    insights: &mut Vec<ContextualInsight>,
    dimension: InsightDimension,
    buckets: HashMap<String, Bucket>,
) {
    for (label, bucket) in buckets {
        if bucket.completions.len() < MIN_BUCKET_SAMPLES {
            continue;
        }

        let effectiveness = mean(&bucket.completions) * 100.0;

        // Best model inside this bucket, by average completion.
        let best = bucket
            .by_model
            .iter()
            .map(|(model, completions)| (model.clone(), mean(completions)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let (recommended_model, expected_outcome) = match best {
            Some((model, completion)) => (Some(model), completion * 100.0),
            None => (None, effectiveness),
        };

        insights.push(ContextualInsight {
            dimension,
            label,
            effectiveness,
            recommended_model,
            expected_outcome,
            sample_count: bucket.completions.len(),
        });
    }
}

pub(crate) fn session_outcome(event: &UsageEvent) -> Option<SessionOutcome> {
    if event.kind != UsageEventKind::SessionEnded {
        return None;
    }
    serde_json::from_value(event.metadata.clone()).ok()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
