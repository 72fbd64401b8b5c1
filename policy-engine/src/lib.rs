mod clock;
mod config;
mod engine;
mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    Compounding, DisputeTypeRules, DocumentRule, DocumentSet, EligibilityRules, InterestRules,
    MandatoryDocsConfig, MsmedActRules, NegotiationRules, PolicyConfig, TimelineRules,
    ValidationRules,
};
pub use engine::{
    EligibilityVerdict, NegotiationTimeline, PolicyEngine, PolicyPaths, PolicySnapshot,
    SettlementRange,
};
pub use error::PolicyError;
