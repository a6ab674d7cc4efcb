//! Behavioral event models.
//!
//! A `UsageEvent` is an immutable record of one user action paired with a
//! `ContextSnapshot` taken at creation time. Snapshots are value types and
//! are never shared by reference across events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum UsageEventKind {
    ModelSelected,
    SessionStarted,
    SessionEnded,
    BreakTaken,
    BreakSkipped,
    DistractionDetected,
    FeedbackGiven,
}

impl UsageEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageEventKind::ModelSelected => "modelSelected",
            UsageEventKind::SessionStarted => "sessionStarted",
            UsageEventKind::SessionEnded => "sessionEnded",
            UsageEventKind::BreakTaken => "breakTaken",
            UsageEventKind::BreakSkipped => "breakSkipped",
            UsageEventKind::DistractionDetected => "distractionDetected",
            UsageEventKind::FeedbackGiven => "feedbackGiven",
        }
    }

    /// Kinds that anchor downstream aggregation and are persisted
    /// synchronously instead of waiting for the background flush.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            UsageEventKind::ModelSelected
                | UsageEventKind::SessionEnded
                | UsageEventKind::FeedbackGiven
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskCategory {
    Coding,
    Writing,
    Research,
    Communication,
    Planning,
    Unknown,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Coding => "coding",
            TaskCategory::Writing => "writing",
            TaskCategory::Research => "research",
            TaskCategory::Communication => "communication",
            TaskCategory::Planning => "planning",
            TaskCategory::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

impl EnergyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyLevel::Low => "low",
            EnergyLevel::Medium => "medium",
            EnergyLevel::High => "high",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "low" => Some(EnergyLevel::Low),
            "medium" => Some(EnergyLevel::Medium),
            "high" => Some(EnergyLevel::High),
            _ => None,
        }
    }
}

/// Coarse time-of-day bucket used for contextual grouping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            5..=11 => DayPart::Morning,
            12..=16 => DayPart::Afternoon,
            17..=21 => DayPart::Evening,
            _ => DayPart::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayPart::Morning => "morning",
            DayPart::Afternoon => "afternoon",
            DayPart::Evening => "evening",
            DayPart::Night => "night",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "morning" => Some(DayPart::Morning),
            "afternoon" => Some(DayPart::Afternoon),
            "evening" => Some(DayPart::Evening),
            "night" => Some(DayPart::Night),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub hour_of_day: u8,
    pub day_of_week: u8,
    pub task_category: TaskCategory,
    /// 1-10 scale of recent on-screen activity.
    pub screen_activity: u8,
    pub notification_load: u32,
    pub energy: EnergyLevel,
    pub minutes_since_break: u32,
    pub open_documents: u32,
}

impl ContextSnapshot {
    pub fn day_part(&self) -> DayPart {
        DayPart::from_hour(self.hour_of_day)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: String,
    pub kind: UsageEventKind,
    pub timestamp: DateTime<Utc>,
    pub model_id: Option<String>,
    pub context: ContextSnapshot,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl UsageEvent {
    pub fn new(
        kind: UsageEventKind,
        model_id: Option<String>,
        context: ContextSnapshot,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
            model_id,
            context,
            metadata,
        }
    }

    /// Rating attached to a feedback event, on the 1-5 scale.
    pub fn feedback_rating(&self) -> Option<f64> {
        self.metadata.get("rating").and_then(|v| v.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(hour: u8) -> ContextSnapshot {
        ContextSnapshot {
            hour_of_day: hour,
            day_of_week: 2,
            task_category: TaskCategory::Coding,
            screen_activity: 5,
            notification_load: 1,
            energy: EnergyLevel::Medium,
            minutes_since_break: 20,
            open_documents: 3,
        }
    }

    #[test]
    fn critical_kinds_match_aggregation_anchors() {
        assert!(UsageEventKind::ModelSelected.is_critical());
        assert!(UsageEventKind::SessionEnded.is_critical());
        assert!(UsageEventKind::FeedbackGiven.is_critical());
        assert!(!UsageEventKind::BreakTaken.is_critical());
        assert!(!UsageEventKind::DistractionDetected.is_critical());
    }

    #[test]
    fn day_part_buckets_cover_all_hours() {
        assert_eq!(DayPart::from_hour(9), DayPart::Morning);
        assert_eq!(DayPart::from_hour(14), DayPart::Afternoon);
        assert_eq!(DayPart::from_hour(19), DayPart::Evening);
        assert_eq!(DayPart::from_hour(23), DayPart::Night);
        assert_eq!(DayPart::from_hour(3), DayPart::Night);
    }

    #[test]
    fn feedback_rating_reads_metadata() {
        let event = UsageEvent::new(
            UsageEventKind::FeedbackGiven,
            Some("balanced".into()),
            snapshot(10),
            serde_json::json!({ "rating": 4 }),
        );
        assert_eq!(event.feedback_rating(), Some(4.0));

        let bare = UsageEvent::new(
            UsageEventKind::BreakTaken,
            None,
            snapshot(10),
            serde_json::Value::Null,
        );
        assert_eq!(bare.feedback_rating(), None);
    }
}
