//! Adaptation models: detected opportunities, applied adaptation records,
//! and the success/rollback lifecycle.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{DayPart, EnergyLevel};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OpportunityKind {
    ModelSwitch,
    ContextOptimization,
    EnergyAdaptation,
    TrendResponse,
    BehaviorAdaptation,
    Rollback,
}

impl OpportunityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityKind::ModelSwitch => "modelSwitch",
            OpportunityKind::ContextOptimization => "contextOptimization",
            OpportunityKind::EnergyAdaptation => "energyAdaptation",
            OpportunityKind::TrendResponse => "trendResponse",
            OpportunityKind::BehaviorAdaptation => "behaviorAdaptation",
            OpportunityKind::Rollback => "rollback",
        }
    }

    /// Fixed suppression window after an opportunity of this kind executes.
    pub fn cooldown(&self) -> Duration {
        match self {
            OpportunityKind::ModelSwitch => Duration::hours(24),
            OpportunityKind::ContextOptimization => Duration::hours(12),
            OpportunityKind::EnergyAdaptation => Duration::hours(6),
            OpportunityKind::TrendResponse => Duration::hours(168),
            OpportunityKind::BehaviorAdaptation => Duration::hours(48),
            OpportunityKind::Rollback => Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OpportunityPriority {
    High,
    Medium,
    Low,
}

impl OpportunityPriority {
    pub fn weight(&self) -> u8 {
        match self {
            OpportunityPriority::High => 3,
            OpportunityPriority::Medium => 2,
            OpportunityPriority::Low => 1,
        }
    }
}

/// The typed payload of an opportunity: one variant per kind, dispatched by
/// exhaustive match. `TrendCorrection` carries corrective sub-actions that
/// the executor applies as a small recursive batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdaptationAction {
    SwitchModel {
        from: Option<String>,
        to: String,
    },
    ContextPreference {
        day_part: DayPart,
        recommended_model: String,
        effectiveness: f64,
    },
    EnergyAdjustment {
        level: EnergyLevel,
        recommended_model: String,
        expected_outcome: f64,
    },
    TrendCorrection {
        causes: Vec<String>,
        remedies: Vec<AdaptationAction>,
    },
    BehaviorShift {
        shift: String,
        adjustment: String,
    },
}

impl AdaptationAction {
    pub fn kind(&self) -> OpportunityKind {
        match self {
            AdaptationAction::SwitchModel { .. } => OpportunityKind::ModelSwitch,
            AdaptationAction::ContextPreference { .. } => OpportunityKind::ContextOptimization,
            AdaptationAction::EnergyAdjustment { .. } => OpportunityKind::EnergyAdaptation,
            AdaptationAction::TrendCorrection { .. } => OpportunityKind::TrendResponse,
            AdaptationAction::BehaviorShift { .. } => OpportunityKind::BehaviorAdaptation,
        }
    }

    /// Stable hash over the identifying fields only. Metric-like numbers
    /// (effectiveness, expected outcome) are excluded so that two detections
    /// of the same change collide even when their scores drift between
    /// ticks.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self {
            AdaptationAction::SwitchModel { from, to } => {
                0u8.hash(&mut hasher);
                from.hash(&mut hasher);
                to.hash(&mut hasher);
            }
            AdaptationAction::ContextPreference {
                day_part,
                recommended_model,
                ..
            } => {
                1u8.hash(&mut hasher);
                day_part.hash(&mut hasher);
                recommended_model.hash(&mut hasher);
            }
            AdaptationAction::EnergyAdjustment {
                level,
                recommended_model,
                ..
            } => {
                2u8.hash(&mut hasher);
                level.hash(&mut hasher);
                recommended_model.hash(&mut hasher);
            }
            AdaptationAction::TrendCorrection { causes, .. } => {
                3u8.hash(&mut hasher);
                causes.hash(&mut hasher);
            }
            AdaptationAction::BehaviorShift { shift, adjustment } => {
                4u8.hash(&mut hasher);
                shift.hash(&mut hasher);
                adjustment.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// A detected, not-yet-applied candidate change. Transient: only the
/// resulting `Adaptation` is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationOpportunity {
    pub priority: OpportunityPriority,
    /// Heuristic reliability estimate in (0, 1].
    pub confidence: f64,
    pub description: String,
    pub action: AdaptationAction,
    pub trigger: String,
    pub rollback_plan: String,
}

impl AdaptationOpportunity {
    pub fn kind(&self) -> OpportunityKind {
        self.action.kind()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AdaptationState {
    Active,
    Successful,
    NeedsRollback,
    RolledBack,
}

impl AdaptationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdaptationState::Active => "active",
            AdaptationState::Successful => "successful",
            AdaptationState::NeedsRollback => "needsRollback",
            AdaptationState::RolledBack => "rolledBack",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AdaptationState::Successful | AdaptationState::RolledBack
        )
    }
}

/// Performance snapshot captured the moment an adaptation is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaselineMetrics {
    /// 0-100 productivity score.
    pub productivity_score: f64,
    /// Average satisfaction on the 1-5 scale.
    pub satisfaction: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImpactMetrics {
    pub productivity_delta: f64,
    pub satisfaction_delta: f64,
    pub overall_improvement: f64,
}

impl ImpactMetrics {
    /// Satisfaction deltas are scaled into percentage space before
    /// weighting so the two terms are comparable.
    pub fn from_deltas(productivity_delta: f64, satisfaction_delta: f64) -> Self {
        let overall_improvement =
            productivity_delta * 0.6 + satisfaction_delta * 20.0 * 0.4;
        Self {
            productivity_delta,
            satisfaction_delta,
            overall_improvement,
        }
    }
}

/// The persisted record of an executed opportunity, tracked through the
/// success/rollback lifecycle. Transitions consume the record and return a
/// new value; terminal records are retained as history, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adaptation {
    pub id: String,
    pub action: AdaptationAction,
    pub description: String,
    pub applied_at: DateTime<Utc>,
    pub state: AdaptationState,
    pub baseline: BaselineMetrics,
    pub monitoring_hours: i64,
    pub impact: Option<ImpactMetrics>,
    pub rolled_back_at: Option<DateTime<Utc>>,
}

impl Adaptation {
    pub fn new(
        opportunity: &AdaptationOpportunity,
        baseline: BaselineMetrics,
        applied_at: DateTime<Utc>,
        monitoring_hours: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: opportunity.action.clone(),
            description: opportunity.description.clone(),
            applied_at,
            state: AdaptationState::Active,
            baseline,
            monitoring_hours,
            impact: None,
            rolled_back_at: None,
        }
    }

    pub fn kind(&self) -> OpportunityKind {
        self.action.kind()
    }

    /// True once the monitoring interval has fully elapsed for an Active
    /// record. Anything earlier must stay Active.
    pub fn due_for_evaluation(&self, now: DateTime<Utc>) -> bool {
        self.state == AdaptationState::Active
            && now - self.applied_at >= Duration::hours(self.monitoring_hours)
    }

    /// Apply an impact evaluation: positive improvement settles the record
    /// as Successful, anything else marks it NeedsRollback.
    pub fn evaluated(self, impact: ImpactMetrics) -> Result<Adaptation, EngineError> {
        if self.state != AdaptationState::Active {
            return Err(EngineError::InvalidTransition {
                from: self.state.as_str(),
                to: "successful|needsRollback",
            });
        }
        let state = if impact.overall_improvement > 0.0 {
            AdaptationState::Successful
        } else {
            AdaptationState::NeedsRollback
        };
        Ok(Adaptation {
            state,
            impact: Some(impact),
            ..self
        })
    }

    pub fn rolled_back(self, at: DateTime<Utc>) -> Result<Adaptation, EngineError> {
        if self.state != AdaptationState::NeedsRollback {
            return Err(EngineError::InvalidTransition {
                from: self.state.as_str(),
                to: AdaptationState::RolledBack.as_str(),
            });
        }
        Ok(Adaptation {
            state: AdaptationState::RolledBack,
            rolled_back_at: Some(at),
            ..self
        })
    }
}
