//! Pure score functions for the aggregator.

/// Overall productivity on a 0-100 scale, rounded:
/// completion*40 + min(frequency/10, 1)*30 + satisfaction*30.
pub fn productivity_score(
    completion_rate: f64,
    session_frequency: f64,
    satisfaction: f64,
) -> f64 {
    let frequency_component = (session_frequency / 10.0).min(1.0);
    (completion_rate * 40.0 + frequency_component * 30.0 + satisfaction * 30.0).round()
}

/// Normalize a 1-5 satisfaction rating onto 0-1.
pub fn normalize_satisfaction(rating: f64) -> f64 {
    ((rating - 1.0) / 4.0).clamp(0.0, 1.0)
}

/// Success rate of a model: completion*0.7 + normalized satisfaction*0.3.
pub fn success_rate(completion_rate: f64, satisfaction: f64) -> f64 {
    completion_rate * 0.7 + normalize_satisfaction(satisfaction) * 0.3
}

/// Per-model performance: successRate*0.8 + min(usage, 10)/10*0.2.
pub fn model_performance_score(success_rate: f64, usage_count: u32) -> f64 {
    let usage_component = (usage_count.min(10) as f64) / 10.0;
    success_rate * 0.8 + usage_component * 0.2
}

/// Next-week forecast: clamp(current + trend*7, 0, 100).
pub fn forecast_next_week(current_score: f64, productivity_trend_per_day: f64) -> f64 {
    (current_score + productivity_trend_per_day * 7.0).clamp(0.0, 100.0)
}
