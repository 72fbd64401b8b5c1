pub mod analysis;
pub mod factory;
mod mediator;
pub mod reasoning;

pub use mediator::{
    audit_record_for_counter, audit_record_for_suggestion, CounterBasis, CounterStrategy,
    CounterSuggestion, MediatorError, NegotiationMediator, OfferSuggestion, SuggestionBasis,
    DEFAULT_PAYMENT_TERMS,
};

pub use analysis::{RecommendedAction, SettlementAnalysis};

pub use samadhaan_audit::{
    AuditAction, AuditLevel, AuditRecord, AuditTrail, DecisionType, ExplainabilityArtifact,
};
pub use samadhaan_dispute_model::{
    CounterOffer, Dispute, DisputeStatus, DisputeType, Document, DomainError, EventKind,
    Negotiation, NegotiationEvent, NegotiationState, Offer, OfferStatus, Party, PartyRole,
};
pub use samadhaan_policy_engine::{
    Clock, EligibilityVerdict, FixedClock, PolicyConfig, PolicyEngine, PolicyError, PolicyPaths,
    PolicySnapshot, SettlementRange, SystemClock,
};

pub mod policy {
    pub use samadhaan_policy_engine::{
        Compounding, DisputeTypeRules, DocumentRule, DocumentSet, EligibilityRules, InterestRules,
        MandatoryDocsConfig, MsmedActRules, NegotiationRules, NegotiationTimeline, TimelineRules,
        ValidationRules,
    };
}
