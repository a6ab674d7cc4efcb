//! Adaptation executor.
//!
//! For each surviving opportunity, in order: register its cooldown,
//! dispatch the type-specific handler (exactly one side effect), then
//! append an Active adaptation record with the baseline snapshot. A handler
//! failure is logged and the batch continues.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde_json::json;

use crate::error::EngineError;
use crate::models::{
    Adaptation, AdaptationAction, AdaptationOpportunity, BaselineMetrics,
};
use crate::notify::{EngineNotice, NotificationSink};
use crate::settings::ConfigProvider;
use crate::store::{keys, KeyValueStore};

use super::cooldown::{CooldownKey, CooldownRegistry};
use super::{clear_preference, merge_preference, AdaptationLedger};

/// Trend-response remedies never nest further than this.
const MAX_REMEDY_DEPTH: u8 = 1;

pub struct AdaptationExecutor {
    config: Arc<dyn ConfigProvider>,
    store: Arc<dyn KeyValueStore>,
    cooldowns: Arc<CooldownRegistry>,
    ledger: Arc<AdaptationLedger>,
    notifier: Arc<dyn NotificationSink>,
    monitoring_hours: i64,
}

impl AdaptationExecutor {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        store: Arc<dyn KeyValueStore>,
        cooldowns: Arc<CooldownRegistry>,
        ledger: Arc<AdaptationLedger>,
        notifier: Arc<dyn NotificationSink>,
        monitoring_hours: i64,
    ) -> Self {
        Self {
            config,
            store,
            cooldowns,
            ledger,
            notifier,
            monitoring_hours,
        }
    }

    pub fn cooldowns(&self) -> &CooldownRegistry {
        self.cooldowns.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Apply a batch in priority order. Returns the adaptations actually
    /// created; failed handlers are skipped, not fatal.
    pub fn execute_batch(
        &self,
        opportunities: &[AdaptationOpportunity],
        baseline: BaselineMetrics,
        now: DateTime<Utc>,
    ) -> Vec<Adaptation> {
        let mut applied = Vec::new();

        for opportunity in opportunities {
            self.cooldowns
                .register(CooldownKey::for_action(&opportunity.action), now);

            match self.apply_action(&opportunity.action, 0) {
                Ok(()) => {
                    let adaptation =
                        Adaptation::new(opportunity, baseline, now, self.monitoring_hours);
                    info!(
                        "adaptation {} applied ({})",
                        adaptation.id,
                        opportunity.kind().as_str()
                    );
                    self.notifier.notify(EngineNotice::AdaptationApplied {
                        adaptation_id: adaptation.id.clone(),
                        description: adaptation.description.clone(),
                    });
                    self.ledger.push(adaptation.clone());
                    applied.push(adaptation);
                }
                Err(err) => {
                    error!(
                        "handler failed for {} opportunity, continuing batch: {err}",
                        opportunity.kind().as_str()
                    );
                }
            }
        }

        applied
    }

    fn apply_action(&self, action: &AdaptationAction, depth: u8) -> Result<(), EngineError> {
        match action {
            AdaptationAction::SwitchModel { to, .. } => {
                self.config.set_active_model(to).map_err(|err| {
                    self.notifier.notify(EngineNotice::SettingsSaveFailed {
                        detail: err.to_string(),
                    });
                    EngineError::ExecutionFailure(format!("model switch to '{to}': {err}"))
                })
            }
            AdaptationAction::ContextPreference {
                day_part,
                recommended_model,
                effectiveness,
            } => merge_preference(
                self.store.as_ref(),
                keys::CONTEXTUAL_PREFERENCES,
                day_part.as_str(),
                json!({
                    "recommendedModel": recommended_model,
                    "effectiveness": effectiveness,
                }),
            ),
            AdaptationAction::EnergyAdjustment {
                level,
                recommended_model,
                expected_outcome,
            } => merge_preference(
                self.store.as_ref(),
                keys::ENERGY_ADAPTATIONS,
                level.as_str(),
                json!({
                    "recommendedModel": recommended_model,
                    "expectedOutcome": expected_outcome,
                }),
            ),
            AdaptationAction::BehaviorShift { shift, adjustment } => merge_preference(
                self.store.as_ref(),
                keys::BEHAVIORAL_ADAPTATIONS,
                shift,
                json!({ "adjustment": adjustment }),
            ),
            AdaptationAction::TrendCorrection { remedies, .. } => {
                if depth >= MAX_REMEDY_DEPTH {
                    return Err(EngineError::ExecutionFailure(
                        "nested trend correction rejected".into(),
                    ));
                }
                // Each remedy is its own cooldown-tracked side effect;
                // one failing remedy does not abort its siblings.
                let mut applied_any = remedies.is_empty();
                for remedy in remedies {
                    self.cooldowns
                        .register(CooldownKey::for_action(remedy), Utc::now());
                    match self.apply_action(remedy, depth + 1) {
                        Ok(()) => applied_any = true,
                        Err(err) => {
                            error!("trend remedy failed, continuing: {err}")
                        }
                    }
                }
                if applied_any {
                    Ok(())
                } else {
                    Err(EngineError::ExecutionFailure(
                        "every trend remedy failed".into(),
                    ))
                }
            }
        }
    }

    /// Inverse of `apply_action`, used by the rollback controller.
    pub(crate) fn revert_action(
        &self,
        action: &AdaptationAction,
        depth: u8,
    ) -> Result<(), EngineError> {
        match action {
            AdaptationAction::SwitchModel { from, .. } => {
                let restored = match from {
                    Some(previous) => serde_json::Value::String(previous.clone()),
                    None => serde_json::Value::Null,
                };
                self.config
                    .update(crate::settings::ACTIVE_MODEL_KEY, restored)
                    .map_err(|err| {
                        EngineError::ExecutionFailure(format!("model restore: {err}"))
                    })
            }
            AdaptationAction::ContextPreference { day_part, .. } => clear_preference(
                self.store.as_ref(),
                keys::CONTEXTUAL_PREFERENCES,
                day_part.as_str(),
            ),
            AdaptationAction::EnergyAdjustment { level, .. } => clear_preference(
                self.store.as_ref(),
                keys::ENERGY_ADAPTATIONS,
                level.as_str(),
            ),
            AdaptationAction::BehaviorShift { shift, .. } => {
                clear_preference(self.store.as_ref(), keys::BEHAVIORAL_ADAPTATIONS, shift)
            }
            AdaptationAction::TrendCorrection { remedies, .. } => {
                if depth >= MAX_REMEDY_DEPTH {
                    return Err(EngineError::ExecutionFailure(
                        "nested trend correction rejected".into(),
                    ));
                }
                // Undo in reverse application order.
                for remedy in remedies.iter().rev() {
                    if let Err(err) = self.revert_action(remedy, depth + 1) {
                        error!("trend remedy rollback failed, continuing: {err}");
                    }
                }
                Ok(())
            }
        }
    }
}
