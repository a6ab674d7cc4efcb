//! Context signal seam.
//!
//! Snapshots need signals the engine cannot observe itself: screen
//! activity, notification pressure, open documents, the inferred task. A
//! host wires its sensors in through `ContextSource`; the static default is
//! fully deterministic and exists so the engine works (conservatively)
//! without any sensor integration.

use chrono::{Datelike, Local, Timelike};

use crate::models::{ContextSnapshot, EnergyLevel, TaskCategory};

pub trait ContextSource: Send + Sync {
    /// 1-10 scale of recent on-screen activity.
    fn screen_activity(&self) -> u8;
    fn notification_load(&self) -> u32;
    fn open_documents(&self) -> u32;
    fn task_category(&self) -> TaskCategory;
    /// Inferred energy for the given local hour.
    fn energy_level(&self, hour: u8) -> EnergyLevel;
}

/// Deterministic default signals: mid-scale activity, a circadian energy
/// curve, nothing else inferred.
#[derive(Default)]
pub struct StaticContextSource;

impl ContextSource for StaticContextSource {
    fn screen_activity(&self) -> u8 {
        5
    }

    fn notification_load(&self) -> u32 {
        0
    }

    fn open_documents(&self) -> u32 {
        1
    }

    fn task_category(&self) -> TaskCategory {
        TaskCategory::Unknown
    }

    fn energy_level(&self, hour: u8) -> EnergyLevel {
        match hour {
            8..=11 => EnergyLevel::High,
            13..=15 => EnergyLevel::Low,
            22..=23 | 0..=5 => EnergyLevel::Low,
            _ => EnergyLevel::Medium,
        }
    }
}

/// Build a fresh snapshot from the source and the local clock. Called once
/// per event; snapshots are never reused.
pub fn capture_snapshot(source: &dyn ContextSource, minutes_since_break: u32) -> ContextSnapshot {
    let now = Local::now();
    let hour = now.hour() as u8;

    ContextSnapshot {
        hour_of_day: hour,
        day_of_week: now.weekday().num_days_from_sunday() as u8,
        task_category: source.task_category(),
        screen_activity: source.screen_activity().clamp(1, 10),
        notification_load: source.notification_load(),
        energy: source.energy_level(hour),
        minutes_since_break,
        open_documents: source.open_documents(),
    }
}
