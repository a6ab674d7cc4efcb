//! Week-over-week trend analysis and behavioral shift detection.

use chrono::{DateTime, Duration, Utc};

use super::insights::session_outcome;
use super::scoring::{normalize_satisfaction, productivity_score};
use crate::models::{
    BehavioralShift, LearningDataPoint, TrendAnalysis, UsageEvent, UsageEventKind,
};

/// Days in the long comparison window behind the weekly trend.
const BASELINE_WINDOW_DAYS: i64 = 28;

/// Relative session-length change that counts as a behavioral shift.
const SESSION_LENGTH_SHIFT_RATIO: f64 = 0.25;
/// Break-skip ratio increase that counts as a behavioral shift.
const BREAK_SKIP_SHIFT_DELTA: f64 = 0.2;
/// Distraction events required before a doubling counts as a shift.
const DISTRACTION_SHIFT_FLOOR: usize = 4;

struct WindowStats {
    sessions: usize,
    completion: f64,
    /// 1-5 rating space.
    satisfaction: f64,
    score: f64,
}

fn window_stats(
    events: &[UsageEvent],
    learning: &[LearningDataPoint],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    weeks: f64,
) -> WindowStats {
    let points: Vec<&LearningDataPoint> = learning
        .iter()
        .filter(|p| p.recorded_at >= start && p.recorded_at < end)
        .collect();

    let completion = if points.is_empty() {
        0.0
    } else {
        points.iter().map(|p| p.metrics.completion_rate).sum::<f64>() / points.len() as f64
    };

    let ratings: Vec<f64> = events
        .iter()
        .filter(|e| {
            e.kind == UsageEventKind::FeedbackGiven && e.timestamp >= start && e.timestamp < end
        })
        .filter_map(|e| e.feedback_rating())
        .collect();
    let satisfaction = if ratings.is_empty() {
        3.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };

    let frequency = points.len() as f64 / weeks.max(1.0 / 7.0);
    let score = productivity_score(completion, frequency, normalize_satisfaction(satisfaction));

    WindowStats {
        sessions: points.len(),
        completion,
        satisfaction,
        score,
    }
}

pub fn analyze_trends(
    events: &[UsageEvent],
    learning: &[LearningDataPoint],
    now: DateTime<Utc>,
) -> TrendAnalysis {
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);
    let baseline_start = now - Duration::days(BASELINE_WINDOW_DAYS);

    let current = window_stats(events, learning, week_ago, now, 1.0);
    let previous = window_stats(events, learning, two_weeks_ago, week_ago, 1.0);
    let baseline = window_stats(
        events,
        learning,
        baseline_start,
        now,
        BASELINE_WINDOW_DAYS as f64 / 7.0,
    );

    // Without a previous week there is no trend to report; zero keeps an
    // empty engine from manufacturing a decline.
    if previous.sessions == 0 {
        return TrendAnalysis {
            productivity_trend: 0.0,
            completion_trend: 0.0,
            satisfaction_trend: 0.0,
            baseline_delta: 0.0,
            current_week_score: current.score,
            previous_week_score: 0.0,
        };
    }

    TrendAnalysis {
        productivity_trend: (current.score - previous.score) / 7.0,
        completion_trend: current.completion - previous.completion,
        satisfaction_trend: current.satisfaction - previous.satisfaction,
        baseline_delta: current.score - baseline.score,
        current_week_score: current.score,
        previous_week_score: previous.score,
    }
}

struct BehaviorWindow {
    session_minutes: Vec<f64>,
    breaks_taken: usize,
    breaks_skipped: usize,
    distractions: usize,
}

fn behavior_window(events: &[UsageEvent], start: DateTime<Utc>, end: DateTime<Utc>) -> BehaviorWindow {
    let mut window = BehaviorWindow {
        session_minutes: Vec::new(),
        breaks_taken: 0,
        breaks_skipped: 0,
        distractions: 0,
    };

    for event in events {
        if event.timestamp < start || event.timestamp >= end {
            continue;
        }
        match event.kind {
            UsageEventKind::SessionEnded => {
                if let Some(outcome) = session_outcome(event) {
                    window.session_minutes.push(outcome.session_minutes as f64);
                }
            }
            UsageEventKind::BreakTaken => window.breaks_taken += 1,
            UsageEventKind::BreakSkipped => window.breaks_skipped += 1,
            UsageEventKind::DistractionDetected => window.distractions += 1,
            _ => {}
        }
    }

    window
}

impl BehaviorWindow {
    fn avg_session_minutes(&self) -> f64 {
        if self.session_minutes.is_empty() {
            return 0.0;
        }
        self.session_minutes.iter().sum::<f64>() / self.session_minutes.len() as f64
    }

    fn skip_ratio(&self) -> f64 {
        let total = self.breaks_taken + self.breaks_skipped;
        if total == 0 {
            return 0.0;
        }
        self.breaks_skipped as f64 / total as f64
    }
}

/// Detect week-over-week changes in how the user works.
pub fn detect_shifts(events: &[UsageEvent], now: DateTime<Utc>) -> Vec<BehavioralShift> {
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);

    let current = behavior_window(events, week_ago, now);
    let previous = behavior_window(events, two_weeks_ago, week_ago);

    let mut shifts = Vec::new();

    let prev_len = previous.avg_session_minutes();
    let cur_len = current.avg_session_minutes();
    if prev_len > 0.0 && cur_len > 0.0 {
        let ratio = (cur_len - prev_len).abs() / prev_len;
        if ratio > SESSION_LENGTH_SHIFT_RATIO {
            let direction = if cur_len > prev_len { "longer" } else { "shorter" };
            shifts.push(BehavioralShift {
                signal: "sessionLength".into(),
                detail: format!(
                    "average session moved from {prev_len:.0} to {cur_len:.0} minutes ({direction})"
                ),
                magnitude: ratio,
            });
        }
    }

    let skip_delta = current.skip_ratio() - previous.skip_ratio();
    if skip_delta > BREAK_SKIP_SHIFT_DELTA {
        shifts.push(BehavioralShift {
            signal: "breakDiscipline".into(),
            detail: format!(
                "break-skip ratio rose from {:.2} to {:.2}",
                previous.skip_ratio(),
                current.skip_ratio()
            ),
            magnitude: skip_delta,
        });
    }

    if current.distractions >= DISTRACTION_SHIFT_FLOOR
        && current.distractions >= previous.distractions.saturating_mul(2)
    {
        shifts.push(BehavioralShift {
            signal: "distractionLoad".into(),
            detail: format!(
                "distraction events went from {} to {} in a week",
                previous.distractions, current.distractions
            ),
            magnitude: current.distractions as f64
                / previous.distractions.max(1) as f64,
        });
    }

    shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContextSnapshot, EnergyLevel, LearningHints, SessionMetrics, SessionOutcome,
        TaskCategory, BreakPattern,
    };

    fn context() -> ContextSnapshot {
        ContextSnapshot {
            hour_of_day: 9,
            day_of_week: 1,
            task_category: TaskCategory::Coding,
            screen_activity: 5,
            notification_load: 0,
            energy: EnergyLevel::Medium,
            minutes_since_break: 10,
            open_documents: 2,
        }
    }

    fn point(days_ago: i64, completion: f64, now: DateTime<Utc>) -> LearningDataPoint {
        LearningDataPoint {
            recorded_at: now - Duration::days(days_ago),
            success: completion > 0.7,
            context: context(),
            metrics: SessionMetrics {
                completion_rate: completion,
                interruptions: 1,
                breaks_taken: 2,
                focus_periods: 2,
                manual_overrides: 0,
            },
            hints: LearningHints {
                ideal_duration_delta_min: 0,
                preferred_break_pattern: BreakPattern::Regular,
                optimal_break_frequency_min: 30,
            },
        }
    }

    fn timed_event(kind: UsageEventKind, days_ago: i64, now: DateTime<Utc>, minutes: u32) -> UsageEvent {
        let metadata = if kind == UsageEventKind::SessionEnded {
            serde_json::to_value(SessionOutcome {
                completion_rate: 0.8,
                interruptions: 0,
                breaks_taken: 1,
                focus_periods: 1,
                manual_overrides: 0,
                session_minutes: minutes,
            })
            .unwrap()
        } else {
            serde_json::Value::Null
        };
        let mut event = UsageEvent::new(kind, None, context(), metadata);
        event.timestamp = now - Duration::days(days_ago);
        event
    }

    #[test]
    fn no_previous_week_means_flat_trend() {
        let now = Utc::now();
        let learning = vec![point(1, 0.9, now), point(2, 0.8, now)];
        let trends = analyze_trends(&[], &learning, now);
        assert_eq!(trends.productivity_trend, 0.0);
        assert_eq!(trends.previous_week_score, 0.0);
        assert!(trends.current_week_score > 0.0);
    }

    #[test]
    fn declining_week_produces_negative_trend() {
        let now = Utc::now();
        let mut learning = Vec::new();
        // Strong previous week, weak current week.
        for day in 8..13 {
            learning.push(point(day, 0.9, now));
        }
        for day in 1..3 {
            learning.push(point(day, 0.4, now));
        }

        let trends = analyze_trends(&[], &learning, now);
        assert!(trends.productivity_trend < 0.0);
        assert!(trends.completion_trend < 0.0);
    }

    #[test]
    fn session_length_shift_detected_over_threshold() {
        let now = Utc::now();
        let events = vec![
            timed_event(UsageEventKind::SessionEnded, 10, now, 60),
            timed_event(UsageEventKind::SessionEnded, 9, now, 60),
            timed_event(UsageEventKind::SessionEnded, 2, now, 25),
            timed_event(UsageEventKind::SessionEnded, 1, now, 25),
        ];

        let shifts = detect_shifts(&events, now);
        assert!(shifts.iter().any(|s| s.signal == "sessionLength"));
    }

    #[test]
    fn distraction_doubling_needs_a_floor() {
        let now = Utc::now();
        // 1 -> 2 doubles but stays under the floor: not a shift.
        let events = vec![
            timed_event(UsageEventKind::DistractionDetected, 10, now, 0),
            timed_event(UsageEventKind::DistractionDetected, 2, now, 0),
            timed_event(UsageEventKind::DistractionDetected, 1, now, 0),
        ];
        assert!(detect_shifts(&events, now).is_empty());
    }
}
