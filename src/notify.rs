//! Notification seam: fire-and-forget notices to the host's presentation
//! layer. Responses, if any, arrive asynchronously and never gate the
//! pipeline. Only two failure classes are user-visible at all; internal
//! pipeline errors stay in the logs.

use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineNotice {
    AdaptationApplied {
        adaptation_id: String,
        description: String,
    },
    AdaptationReverted {
        adaptation_id: String,
        description: String,
    },
    SettingsSaveFailed {
        detail: String,
    },
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: EngineNotice);
}

/// Default sink: writes notices to the log. Hosts replace this with their
/// own dialog/toast surface.
#[derive(Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notice: EngineNotice) {
        match &notice {
            EngineNotice::AdaptationApplied {
                adaptation_id,
                description,
            } => info!("adaptation {adaptation_id} applied: {description}"),
            EngineNotice::AdaptationReverted {
                adaptation_id,
                description,
            } => info!("adaptation {adaptation_id} reverted: {description}"),
            EngineNotice::SettingsSaveFailed { detail } => {
                warn!("settings could not be saved: {detail}")
            }
        }
    }
}
