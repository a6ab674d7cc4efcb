pub mod adaptation;
pub mod event;
pub mod learning;
pub mod report;
pub mod schedule;

pub use adaptation::{
    Adaptation, AdaptationAction, AdaptationOpportunity, AdaptationState, BaselineMetrics,
    ImpactMetrics, OpportunityKind, OpportunityPriority,
};
pub use event::{
    ContextSnapshot, DayPart, EnergyLevel, TaskCategory, UsageEvent, UsageEventKind,
};
pub use learning::{
    BreakPattern, LearningDataPoint, LearningHints, SessionMetrics, SessionOutcome,
};
pub use report::{
    BehavioralShift, ContextualInsight, InsightDimension, ModelComparison, PerformanceReport,
    PredictiveMetrics, ProductivitySummary, TrendAnalysis,
};
pub use schedule::{
    GeneratedModel, ModelCandidates, ModelPerformance, Scenario, UserAssessment, WorkStyle,
};
