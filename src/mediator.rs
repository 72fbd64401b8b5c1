use chrono::{DateTime, Duration, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use samadhaan_audit::{
    AuditAction, AuditError, AuditLevel, AuditRecord, AuditTrail, DecisionType,
    ExplainabilityArtifact,
};
use samadhaan_dispute_model::{
    CounterOffer, Dispute, DomainError, Negotiation, NegotiationState, Offer, OfferStatus,
    PartyRole,
};
use samadhaan_policy_engine::{
    Clock, EligibilityVerdict, PolicyEngine, PolicyError, SettlementRange, SystemClock,
};

use crate::analysis::{self, round2, SettlementAnalysis};
use crate::reasoning::{self, format_inr};

/// Payment terms attached to every generated offer until a human edits
/// them.
pub const DEFAULT_PAYMENT_TERMS: &str = "30 days from acceptance";

#[derive(Error, Debug)]
pub enum MediatorError {
    #[error("Dispute amount is required to mediate")]
    MissingDisputeAmount,
    #[error("Dispute has no identifier yet")]
    MissingDisputeId,
    #[error("Offer [{id}] not found in negotiation [{negotiation_id}]")]
    OfferNotFound { id: String, negotiation_id: String },
    #[error("Counteroffer [{id}] not found in negotiation [{negotiation_id}]")]
    CounterofferNotFound { id: String, negotiation_id: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// How a counteroffer amount was derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterStrategy {
    /// No usable history yet: midpoint between the current offer and
    /// the corridor ceiling, shaded down 5%.
    #[display(fmt = "midpoint_opening")]
    MidpointOpening,
    /// Own previous position moved halfway toward the other side's
    /// current offer.
    #[display(fmt = "halfway_convergence")]
    HalfwayConvergence,
}

/// Inputs behind an opening suggestion, kept so audit records and
/// explainability artifacts can be built without recomputation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestionBasis {
    pub interest_amount: f64,
    pub delay_factor: f64,
    pub interest_factor: f64,
    pub strength_score: f64,
    /// Amount before corridor clamping, already rounded to paise.
    pub raw_amount: f64,
    pub clamped: bool,
    pub policy_version: String,
}

/// An AI-generated opening offer together with the basis it was
/// computed from. The offer starts in `PendingApproval`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OfferSuggestion {
    pub offer: Offer,
    pub basis: SuggestionBasis,
}

impl OfferSuggestion {
    /// Explainability artifact for this suggestion. Callers decorate it
    /// with the negotiation id and cited rules before filing.
    pub fn to_artifact(&self) -> Result<ExplainabilityArtifact, AuditError> {
        let mut artifact = ExplainabilityArtifact::new(
            DecisionType::SettlementSuggestion,
            format!(
                "Opening offer at {:.2}% of the disputed amount",
                self.offer.offered_percentage
            ),
            self.offer.ai_reasoning.clone().unwrap_or_default(),
            self.offer.ai_confidence.unwrap_or(0.0),
            self.offer.created_at,
        )?
        .on_dispute(&self.offer.dispute_id)
        .on_offer(&self.offer.offer_id)
        .weighted_factor("payment_delay", 0.6)
        .weighted_factor("accrued_interest", 0.4)
        .data_source("dispute record")
        .data_source("policy rules");
        if self.basis.clamped {
            artifact = artifact.uncertainty("raw suggestion fell outside the settlement corridor");
        }
        Ok(artifact)
    }
}

/// Inputs behind a counteroffer suggestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CounterBasis {
    pub strategy: CounterStrategy,
    /// Own previous position the halfway move started from, if any.
    pub reference_amount: Option<f64>,
    pub raw_amount: f64,
    pub clamped: bool,
    pub history_len: usize,
    pub policy_version: String,
}

/// An AI-generated counteroffer with its basis. Starts in
/// `PendingApproval` like any other suggestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CounterSuggestion {
    pub counter: CounterOffer,
    pub basis: CounterBasis,
}

impl CounterSuggestion {
    pub fn to_artifact(&self) -> Result<ExplainabilityArtifact, AuditError> {
        let mut artifact = ExplainabilityArtifact::new(
            DecisionType::CounterofferSuggestion,
            format!(
                "Counteroffer of ₹{} via {}",
                format_inr(self.counter.counter_amount),
                self.basis.strategy
            ),
            self.counter.ai_reasoning.clone().unwrap_or_default(),
            self.counter.ai_confidence.unwrap_or(0.0),
            self.counter.created_at,
        )?
        .on_offer(&self.counter.original_offer_id)
        .factor("current offer position")
        .factor("settlement corridor")
        .data_source("negotiation history")
        .data_source("policy rules");
        if self.basis.reference_amount.is_some() {
            artifact = artifact.factor("own previous position");
        }
        if self.basis.history_len < 2 {
            artifact = artifact.uncertainty("no negotiation history yet");
        }
        if self.basis.clamped {
            artifact = artifact.uncertainty("raw suggestion fell outside the settlement corridor");
        }
        Ok(artifact)
    }
}

/// Audit record for a generated opening suggestion. `rules` are the
/// policy citations backing the reasoning.
pub fn audit_record_for_suggestion(
    suggestion: &OfferSuggestion,
    negotiation: &Negotiation,
    rules: Vec<String>,
    at: DateTime<Utc>,
) -> Result<AuditRecord, AuditError> {
    Ok(AuditRecord::new(
        AuditAction::AiSuggestionGenerated,
        format!(
            "Suggested opening offer of ₹{} ({:.2}% of the disputed amount)",
            format_inr(suggestion.offer.offered_amount),
            suggestion.offer.offered_percentage
        ),
        at,
    )
    .on_dispute(&suggestion.offer.dispute_id)
    .on_negotiation(&negotiation.negotiation_id)
    .as_ai_action(
        suggestion.offer.ai_reasoning.clone().unwrap_or_default(),
        suggestion.offer.ai_confidence.unwrap_or(0.0),
    )?
    .with_details(json!({
        "offer_id": suggestion.offer.offer_id,
        "raw_amount": suggestion.basis.raw_amount,
        "clamped": suggestion.basis.clamped,
        "delay_factor": suggestion.basis.delay_factor,
        "interest_factor": suggestion.basis.interest_factor,
        "strength_score": suggestion.basis.strength_score,
        "interest_amount": suggestion.basis.interest_amount,
    }))
    .under_policy(&suggestion.basis.policy_version, rules))
}

/// Audit record for a generated counteroffer suggestion.
pub fn audit_record_for_counter(
    suggestion: &CounterSuggestion,
    negotiation: &Negotiation,
    rules: Vec<String>,
    at: DateTime<Utc>,
) -> Result<AuditRecord, AuditError> {
    Ok(AuditRecord::new(
        AuditAction::AiSuggestionGenerated,
        format!(
            "Suggested counteroffer of ₹{} answering offer [{}]",
            format_inr(suggestion.counter.counter_amount),
            suggestion.counter.original_offer_id
        ),
        at,
    )
    .on_dispute(&negotiation.dispute_id)
    .on_negotiation(&negotiation.negotiation_id)
    .as_ai_action(
        suggestion.counter.ai_reasoning.clone().unwrap_or_default(),
        suggestion.counter.ai_confidence.unwrap_or(0.0),
    )?
    .with_details(json!({
        "counteroffer_id": suggestion.counter.counteroffer_id,
        "strategy": suggestion.basis.strategy,
        "reference_amount": suggestion.basis.reference_amount,
        "raw_amount": suggestion.basis.raw_amount,
        "clamped": suggestion.basis.clamped,
        "history_len": suggestion.basis.history_len,
    }))
    .under_policy(&suggestion.basis.policy_version, rules))
}

/// Policy-driven mediator for MSME payment disputes. Generates offer
/// and counteroffer suggestions bounded by the loaded policy, grades
/// settlement likelihood and writes every decision to its audit trail.
///
/// Suggestions are never self-executing: each one starts in
/// `PendingApproval` and enters the negotiation only after a human
/// approves and sends it.
pub struct NegotiationMediator {
    policy: Arc<PolicyEngine>,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
}

impl NegotiationMediator {
    pub fn new(policy: Arc<PolicyEngine>) -> NegotiationMediator {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: Arc<PolicyEngine>, clock: Arc<dyn Clock>) -> NegotiationMediator {
        let audit = AuditTrail::new();
        let snapshot = policy.snapshot();
        audit.record(
            AuditRecord::new(
                AuditAction::PolicyLoaded,
                format!("Mediator started under policy version {}", snapshot.version()),
                clock.now(),
            )
            .under_policy(snapshot.version(), vec![]),
        );
        NegotiationMediator {
            policy,
            clock,
            audit,
        }
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Shared handle; clones observe the same trail.
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Re-reads the policy files. On failure the previous snapshot
    /// keeps serving and the error is returned.
    pub fn reload_policies(&self) -> Result<(), MediatorError> {
        let now = self.clock.now();
        self.policy.reload(now)?;
        let snapshot = self.policy.snapshot();
        self.audit.record(
            AuditRecord::new(
                AuditAction::PolicyUpdated,
                format!("Policy rules reloaded, now at version {}", snapshot.version()),
                now,
            )
            .under_policy(snapshot.version(), vec![]),
        );
        Ok(())
    }

    /// MSMED Act eligibility screen for a dispute: registration, amount
    /// limits, filing window and minimum delay. Collects every
    /// violation instead of failing on the first.
    pub fn assess_eligibility(&self, dispute: &Dispute) -> Result<EligibilityVerdict, MediatorError> {
        let now = self.clock.now();
        let snapshot = self.policy.snapshot();
        let amount = dispute.dispute_amount.unwrap_or(0.0);

        let (has_registration, registration_type) = match &dispute.msme_party {
            Some(party) => (party.has_registration(), party.registration_type.clone()),
            None => (false, None),
        };

        let mut verdict =
            snapshot.check_eligibility(amount, has_registration, registration_type.as_deref());
        match dispute.invoice_date {
            Some(invoice_date) => {
                verdict =
                    verdict.merge(snapshot.check_timeline(invoice_date, dispute.payment_due_date, now));
            }
            None => {
                verdict = verdict.merge(EligibilityVerdict::from_errors(vec![
                    "Invoice date is required for timeline validation".to_string(),
                ]));
            }
        }

        let description = if verdict.eligible {
            "Dispute meets MSMED Act eligibility criteria".to_string()
        } else {
            format!("Dispute fails {} eligibility check(s)", verdict.errors.len())
        };
        let mut record = AuditRecord::new(AuditAction::EligibilityChecked, description, now)
            .with_details(json!({ "errors": verdict.errors }))
            .under_policy(snapshot.version(), vec![]);
        if let Some(id) = &dispute.dispute_id {
            record = record.on_dispute(id);
        }
        if !verdict.eligible {
            record = record.level(AuditLevel::Warning);
        }
        self.audit.record(record);

        let mut artifact = ExplainabilityArtifact::new(
            DecisionType::EligibilityCheck,
            if verdict.eligible {
                "Eligible under the MSMED Act".to_string()
            } else {
                format!("Not eligible: {} check(s) failed", verdict.errors.len())
            },
            if verdict.eligible {
                "All configured eligibility and timeline rules passed.".to_string()
            } else {
                verdict.errors.join("; ")
            },
            1.0,
            now,
        )?
        .factor("msme registration")
        .factor("dispute amount limits")
        .factor("filing window")
        .data_source("dispute record")
        .data_source("policy rules");
        if let Some(id) = &dispute.dispute_id {
            artifact = artifact.on_dispute(id);
        }
        self.audit.explain(artifact);

        Ok(verdict)
    }

    /// Opens a negotiation for a dispute with the settlement corridor,
    /// round limit and expiry taken from the current policy snapshot.
    pub fn open_negotiation(&self, dispute: &Dispute) -> Result<Negotiation, MediatorError> {
        let now = self.clock.now();
        let snapshot = self.policy.snapshot();
        let dispute_id = require_id(dispute)?;
        let amount = require_amount(dispute)?;

        let range = snapshot.settlement_range(amount);
        let rules = &snapshot.config.negotiation;
        let timeline = snapshot.negotiation_timeline();
        let negotiation = Negotiation::open(
            dispute_id,
            range.min,
            range.max,
            snapshot.max_negotiation_rounds(),
            now,
        )?
        .with_percentage_bounds(rules.min_settlement_percentage, rules.max_settlement_percentage)?
        .expiring_at(now + Duration::days(i64::from(timeline.max_days)));

        self.audit.record(
            AuditRecord::new(
                AuditAction::NegotiationOpened,
                format!(
                    "Negotiation opened with settlement corridor ₹{} - ₹{}",
                    format_inr(range.min),
                    format_inr(range.max)
                ),
                now,
            )
            .on_dispute(dispute_id)
            .on_negotiation(&negotiation.negotiation_id)
            .under_policy(snapshot.version(), vec![]),
        );
        log::info!(
            "Opened negotiation [{}] for dispute [{}], corridor [{:.2}, {:.2}], {} rounds.",
            negotiation.negotiation_id,
            dispute_id,
            range.min,
            range.max,
            negotiation.max_rounds
        );
        Ok(negotiation)
    }

    /// Opening settlement suggestion for the MSME. Interest accrued and
    /// payment delay are folded into a case-strength score that places
    /// the starting position between 80% and 95% of the disputed
    /// amount, then the amount is clamped to the negotiation corridor.
    pub fn suggest_initial_offer(
        &self,
        dispute: &Dispute,
        negotiation: &Negotiation,
    ) -> Result<OfferSuggestion, MediatorError> {
        let now = self.clock.now();
        let snapshot = self.policy.snapshot();
        let dispute_id = require_id(dispute)?;
        let amount = require_amount(dispute)?;

        let interest_amount = match dispute.payment_due_date {
            Some(due_date) => snapshot.calculate_interest(amount, due_date, now),
            None => 0.0,
        };

        let days_delayed = dispute.days_delayed.unwrap_or(0);
        let delay_factor = (f64::from(days_delayed) / 180.0).min(1.0);
        let interest_factor = (interest_amount / amount / 0.2).min(1.0);
        let strength_score = delay_factor * 0.6 + interest_factor * 0.4;

        let starting_percentage = 80.0 + strength_score * 15.0;
        let raw_amount = round2(amount * starting_percentage / 100.0);

        let bounds = corridor(negotiation);
        let suggested_amount = bounds.clamp(raw_amount);
        let clamped = !bounds.contains(raw_amount);
        if clamped {
            log::warn!(
                "Opening suggestion {:.2} for dispute [{}] fell outside the corridor [{:.2}, {:.2}], clamped.",
                raw_amount,
                dispute_id,
                bounds.min,
                bounds.max
            );
        }

        let percentage = round2(suggested_amount / amount * 100.0);
        let confidence = round2(0.7 + strength_score * 0.2);

        let required_documents = match dispute.dispute_type {
            Some(dispute_type) => snapshot.mandatory_documents(&dispute_type.to_string()),
            None => vec![],
        };
        let reasoning =
            reasoning::initial_offer(dispute, suggested_amount, interest_amount, &required_documents);

        let offer = Offer::suggested(dispute_id, suggested_amount, percentage, PartyRole::Msme, now)?
            .with_reasoning(&reasoning, confidence)?
            .with_payment_terms(DEFAULT_PAYMENT_TERMS);

        let suggestion = OfferSuggestion {
            offer,
            basis: SuggestionBasis {
                interest_amount,
                delay_factor,
                interest_factor,
                strength_score,
                raw_amount,
                clamped,
                policy_version: snapshot.version().to_string(),
            },
        };

        let cited = reasoning::cited_rules(days_delayed, interest_amount);
        self.audit.record(audit_record_for_suggestion(
            &suggestion,
            negotiation,
            cited.clone(),
            now,
        )?);
        self.audit.explain(
            suggestion
                .to_artifact()?
                .on_negotiation(&negotiation.negotiation_id)
                .under_rules(cited),
        );
        log::info!(
            "Suggested opening offer of {:.2} ({:.2}%) for dispute [{}] with confidence {:.2}.",
            suggestion.offer.offered_amount,
            suggestion.offer.offered_percentage,
            dispute_id,
            confidence
        );
        Ok(suggestion)
    }

    /// Counteroffer suggestion answering `current_offer`, made on
    /// behalf of the party the offer was addressed to. With no usable
    /// history the move is a shaded midpoint toward the corridor
    /// ceiling; afterwards it converges halfway from the own previous
    /// position.
    pub fn suggest_counter_offer(
        &self,
        dispute: &Dispute,
        negotiation: &Negotiation,
        current_offer: &Offer,
    ) -> Result<CounterSuggestion, MediatorError> {
        let now = self.clock.now();
        let snapshot = self.policy.snapshot();
        let amount = require_amount(dispute)?;

        let history = negotiation.history();
        let bounds = corridor(negotiation);
        let counter_by = current_offer.offered_by.other();

        let (raw_amount, confidence, strategy, reference_amount) = if history.len() < 2 {
            let raw = round2(opening_midpoint(current_offer.offered_amount, bounds.max));
            (raw, 0.65, CounterStrategy::MidpointOpening, None)
        } else {
            let last_own = history
                .iter()
                .rev()
                .find(|event| event.by == counter_by)
                .map(|event| event.amount);
            let raw = match last_own {
                Some(last) => {
                    let gap = (current_offer.offered_amount - last).abs();
                    if last > current_offer.offered_amount {
                        last - gap * 0.5
                    } else {
                        last + gap * 0.5
                    }
                }
                None => opening_midpoint(current_offer.offered_amount, bounds.max),
            };
            let confidence = round2(0.7 + 0.1 * (history.len() as f64 / 5.0).min(1.0));
            let strategy = if last_own.is_some() {
                CounterStrategy::HalfwayConvergence
            } else {
                CounterStrategy::MidpointOpening
            };
            (round2(raw), confidence, strategy, last_own)
        };

        let counter_amount = bounds.clamp(raw_amount);
        let clamped = !bounds.contains(raw_amount);
        if clamped {
            log::warn!(
                "Counter suggestion {:.2} for negotiation [{}] fell outside the corridor [{:.2}, {:.2}], clamped.",
                raw_amount,
                negotiation.negotiation_id,
                bounds.min,
                bounds.max
            );
        }

        let percentage = round2(counter_amount / amount * 100.0);
        let reasoning = reasoning::counter_offer(dispute, current_offer, counter_amount, history.len());

        let counter = CounterOffer::suggested(
            &current_offer.offer_id,
            counter_amount,
            percentage,
            counter_by,
            now,
        )?
        .with_reasoning(&reasoning, confidence)?
        .with_payment_terms(DEFAULT_PAYMENT_TERMS);

        let suggestion = CounterSuggestion {
            counter,
            basis: CounterBasis {
                strategy,
                reference_amount,
                raw_amount,
                clamped,
                history_len: history.len(),
                policy_version: snapshot.version().to_string(),
            },
        };

        let cited = reasoning::cited_rules(dispute.days_delayed.unwrap_or(0), 0.0);
        self.audit
            .record(audit_record_for_counter(&suggestion, negotiation, cited.clone(), now)?);
        self.audit.explain(
            suggestion
                .to_artifact()?
                .on_dispute(&negotiation.dispute_id)
                .on_negotiation(&negotiation.negotiation_id)
                .under_rules(cited),
        );
        log::info!(
            "Suggested counteroffer of {:.2} ({}) for negotiation [{}] with confidence {:.2}.",
            suggestion.counter.counter_amount,
            suggestion.basis.strategy,
            negotiation.negotiation_id,
            confidence
        );
        Ok(suggestion)
    }

    /// Grades how likely the negotiation is to settle and what to do
    /// next. Advisory only; leaves an explainability trace but changes
    /// nothing.
    pub fn analyze_settlement_probability(
        &self,
        negotiation: &Negotiation,
    ) -> Result<SettlementAnalysis, MediatorError> {
        let analysis = analysis::analyze(negotiation);
        let now = self.clock.now();
        self.audit.explain(
            ExplainabilityArtifact::new(
                DecisionType::SettlementAnalysis,
                format!(
                    "Settlement probability {:.2}, recommended action '{}'",
                    analysis.probability, analysis.recommended_action
                ),
                &analysis.reasoning,
                analysis.confidence,
                now,
            )?
            .on_dispute(&negotiation.dispute_id)
            .on_negotiation(&negotiation.negotiation_id)
            .factor("convergence rate")
            .factor("rounds remaining")
            .data_source("negotiation history"),
        );
        Ok(analysis)
    }

    /// Records an offer that arrived from a party directly and advances
    /// the negotiation state to await the other side's response.
    pub fn receive_offer(
        &self,
        negotiation: &mut Negotiation,
        offer: Offer,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let offer_id = offer.offer_id.clone();
        let offered_by = offer.offered_by;
        let amount = offer.offered_amount;
        negotiation.record_offer(offer)?;
        self.advance_state_for(negotiation, offered_by, now)?;
        self.audit.record(
            AuditRecord::new(
                AuditAction::OfferCreated,
                format!("{} offered ₹{}", offered_by, format_inr(amount)),
                now,
            )
            .on_dispute(&negotiation.dispute_id)
            .on_negotiation(&negotiation.negotiation_id)
            .with_details(json!({ "offer_id": offer_id })),
        );
        Ok(())
    }

    /// Counteroffer counterpart of [`receive_offer`].
    ///
    /// [`receive_offer`]: NegotiationMediator::receive_offer
    pub fn receive_counteroffer(
        &self,
        negotiation: &mut Negotiation,
        counter: CounterOffer,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let counteroffer_id = counter.counteroffer_id.clone();
        let offered_by = counter.offered_by;
        let amount = counter.counter_amount;
        negotiation.record_counteroffer(counter)?;
        self.advance_state_for(negotiation, offered_by, now)?;
        self.audit.record(
            AuditRecord::new(
                AuditAction::CounterofferCreated,
                format!("{} countered with ₹{}", offered_by, format_inr(amount)),
                now,
            )
            .on_dispute(&negotiation.dispute_id)
            .on_negotiation(&negotiation.negotiation_id)
            .with_details(json!({ "counteroffer_id": counteroffer_id })),
        );
        Ok(())
    }

    /// Human approval of a pending suggestion. Must happen before the
    /// offer can be sent.
    pub fn approve_offer(
        &self,
        negotiation: &mut Negotiation,
        offer_id: &str,
        approved_by: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let negotiation_id = negotiation.negotiation_id.clone();
        let dispute_id = negotiation.dispute_id.clone();
        let is_ai = {
            let offer = negotiation
                .offer_mut(offer_id)
                .ok_or_else(|| MediatorError::OfferNotFound {
                    id: offer_id.to_string(),
                    negotiation_id: negotiation_id.clone(),
                })?;
            offer.approve(approved_by, now)?;
            offer.is_ai_suggested
        };
        let action = if is_ai {
            negotiation.record_suggestion_decision(true);
            AuditAction::AiSuggestionApproved
        } else {
            AuditAction::OfferApproved
        };
        self.audit.record(
            AuditRecord::new(action, format!("Offer [{}] approved", offer_id), now)
                .on_dispute(&dispute_id)
                .on_negotiation(&negotiation_id)
                .by_user(approved_by)
                .approved(approved_by, now),
        );
        Ok(())
    }

    /// Human rejection of a pending suggestion, with the reason kept on
    /// both the offer and the audit record.
    pub fn reject_offer(
        &self,
        negotiation: &mut Negotiation,
        offer_id: &str,
        rejected_by: &str,
        reason: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let negotiation_id = negotiation.negotiation_id.clone();
        let dispute_id = negotiation.dispute_id.clone();
        let is_ai = {
            let offer = negotiation
                .offer_mut(offer_id)
                .ok_or_else(|| MediatorError::OfferNotFound {
                    id: offer_id.to_string(),
                    negotiation_id: negotiation_id.clone(),
                })?;
            offer.reject(reason)?;
            offer.is_ai_suggested
        };
        let action = if is_ai {
            negotiation.record_suggestion_decision(false);
            AuditAction::AiSuggestionRejected
        } else {
            AuditAction::OfferRejected
        };
        self.audit.record(
            AuditRecord::new(action, format!("Offer [{}] rejected", offer_id), now)
                .on_dispute(&dispute_id)
                .on_negotiation(&negotiation_id)
                .by_user(rejected_by)
                .with_override_reason(reason)
                .level(AuditLevel::Warning),
        );
        Ok(())
    }

    /// Puts an approved offer on the wire and advances the negotiation
    /// state to await the other side's response.
    pub fn send_offer(
        &self,
        negotiation: &mut Negotiation,
        offer_id: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let negotiation_id = negotiation.negotiation_id.clone();
        let dispute_id = negotiation.dispute_id.clone();
        let (offered_by, amount) = {
            let offer = negotiation
                .offer_mut(offer_id)
                .ok_or_else(|| MediatorError::OfferNotFound {
                    id: offer_id.to_string(),
                    negotiation_id: negotiation_id.clone(),
                })?;
            offer.mark_sent()?;
            (offer.offered_by, offer.offered_amount)
        };
        self.advance_state_for(negotiation, offered_by, now)?;
        self.audit.record(
            AuditRecord::new(
                AuditAction::OfferSent,
                format!("Offer of ₹{} sent to {}", format_inr(amount), offered_by.other()),
                now,
            )
            .on_dispute(&dispute_id)
            .on_negotiation(&negotiation_id)
            .with_details(json!({ "offer_id": offer_id })),
        );
        Ok(())
    }

    pub fn approve_counteroffer(
        &self,
        negotiation: &mut Negotiation,
        counteroffer_id: &str,
        approved_by: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let negotiation_id = negotiation.negotiation_id.clone();
        let dispute_id = negotiation.dispute_id.clone();
        let is_ai = {
            let counter = negotiation.counteroffer_mut(counteroffer_id).ok_or_else(|| {
                MediatorError::CounterofferNotFound {
                    id: counteroffer_id.to_string(),
                    negotiation_id: negotiation_id.clone(),
                }
            })?;
            counter.approve(approved_by, now)?;
            counter.is_ai_suggested
        };
        let action = if is_ai {
            negotiation.record_suggestion_decision(true);
            AuditAction::AiSuggestionApproved
        } else {
            AuditAction::OfferApproved
        };
        self.audit.record(
            AuditRecord::new(
                action,
                format!("Counteroffer [{}] approved", counteroffer_id),
                now,
            )
            .on_dispute(&dispute_id)
            .on_negotiation(&negotiation_id)
            .by_user(approved_by)
            .approved(approved_by, now),
        );
        Ok(())
    }

    pub fn send_counteroffer(
        &self,
        negotiation: &mut Negotiation,
        counteroffer_id: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let negotiation_id = negotiation.negotiation_id.clone();
        let dispute_id = negotiation.dispute_id.clone();
        let (offered_by, amount) = {
            let counter = negotiation.counteroffer_mut(counteroffer_id).ok_or_else(|| {
                MediatorError::CounterofferNotFound {
                    id: counteroffer_id.to_string(),
                    negotiation_id: negotiation_id.clone(),
                }
            })?;
            counter.mark_sent()?;
            (counter.offered_by, counter.counter_amount)
        };
        self.advance_state_for(negotiation, offered_by, now)?;
        self.audit.record(
            AuditRecord::new(
                AuditAction::OfferSent,
                format!(
                    "Counteroffer of ₹{} sent to {}",
                    format_inr(amount),
                    offered_by.other()
                ),
                now,
            )
            .on_dispute(&dispute_id)
            .on_negotiation(&negotiation_id)
            .with_details(json!({ "counteroffer_id": counteroffer_id })),
        );
        Ok(())
    }

    /// The receiving party accepts a sent offer. Settles the
    /// negotiation at the offered amount.
    pub fn accept_offer(
        &self,
        negotiation: &mut Negotiation,
        offer_id: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let negotiation_id = negotiation.negotiation_id.clone();
        let dispute_id = negotiation.dispute_id.clone();
        let (amount, percentage, terms) = {
            let offer = negotiation
                .offer_mut(offer_id)
                .ok_or_else(|| MediatorError::OfferNotFound {
                    id: offer_id.to_string(),
                    negotiation_id: negotiation_id.clone(),
                })?;
            offer.record_response(OfferStatus::Accepted, now, None)?;
            (
                offer.offered_amount,
                offer.offered_percentage,
                offer.payment_terms.clone(),
            )
        };
        negotiation.mark_settled(amount, percentage, terms, now)?;
        self.audit.record(
            AuditRecord::new(
                AuditAction::OfferAccepted,
                format!("Offer [{}] accepted", offer_id),
                now,
            )
            .on_dispute(&dispute_id)
            .on_negotiation(&negotiation_id),
        );
        self.audit.record(
            AuditRecord::new(
                AuditAction::SettlementReached,
                format!(
                    "Settlement reached at ₹{} ({:.2}% of the disputed amount)",
                    format_inr(amount),
                    percentage
                ),
                now,
            )
            .on_dispute(&dispute_id)
            .on_negotiation(&negotiation_id)
            .with_details(json!({ "amount": amount, "percentage": percentage })),
        );
        Ok(())
    }

    /// Accepts a counteroffer and settles the negotiation at its amount.
    pub fn accept_counteroffer(
        &self,
        negotiation: &mut Negotiation,
        counteroffer_id: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        let negotiation_id = negotiation.negotiation_id.clone();
        let dispute_id = negotiation.dispute_id.clone();
        let (amount, percentage, terms) = {
            let counter = negotiation.counteroffer_mut(counteroffer_id).ok_or_else(|| {
                MediatorError::CounterofferNotFound {
                    id: counteroffer_id.to_string(),
                    negotiation_id: negotiation_id.clone(),
                }
            })?;
            counter.record_response(OfferStatus::Accepted, now, None)?;
            (
                counter.counter_amount,
                counter.counter_percentage,
                counter.payment_terms.clone(),
            )
        };
        negotiation.mark_settled(amount, percentage, terms, now)?;
        self.audit.record(
            AuditRecord::new(
                AuditAction::OfferAccepted,
                format!("Counteroffer [{}] accepted", counteroffer_id),
                now,
            )
            .on_dispute(&dispute_id)
            .on_negotiation(&negotiation_id),
        );
        self.audit.record(
            AuditRecord::new(
                AuditAction::SettlementReached,
                format!(
                    "Settlement reached at ₹{} ({:.2}% of the disputed amount)",
                    format_inr(amount),
                    percentage
                ),
                now,
            )
            .on_dispute(&dispute_id)
            .on_negotiation(&negotiation_id)
            .with_details(json!({ "amount": amount, "percentage": percentage })),
        );
        Ok(())
    }

    /// Ends the negotiation without settlement and routes the dispute
    /// toward formal MSMED Act resolution.
    pub fn escalate(
        &self,
        negotiation: &mut Negotiation,
        reason: &str,
    ) -> Result<(), MediatorError> {
        let now = self.clock.now();
        negotiation.transition_to(NegotiationState::NegotiationFailed, now)?;
        self.audit.record(
            AuditRecord::new(
                AuditAction::NegotiationEscalated,
                format!("Negotiation escalated to formal resolution: {}", reason),
                now,
            )
            .on_dispute(&negotiation.dispute_id)
            .on_negotiation(&negotiation.negotiation_id)
            .level(AuditLevel::Warning),
        );
        log::warn!(
            "Negotiation [{}] escalated: {}",
            negotiation.negotiation_id,
            reason
        );
        Ok(())
    }

    /// After `sender` put an amount on the wire the negotiation waits
    /// on the other party. No-op when already in that state.
    fn advance_state_for(
        &self,
        negotiation: &mut Negotiation,
        sender: PartyRole,
        now: DateTime<Utc>,
    ) -> Result<(), MediatorError> {
        if negotiation.state == NegotiationState::NotStarted {
            negotiation.transition_to(NegotiationState::InitialOfferPending, now)?;
        }
        let next = match sender {
            PartyRole::Msme => NegotiationState::BuyerResponsePending,
            PartyRole::Buyer => NegotiationState::MsmeResponsePending,
        };
        if negotiation.state != next {
            negotiation.transition_to(next, now)?;
        }
        Ok(())
    }
}

fn require_amount(dispute: &Dispute) -> Result<f64, MediatorError> {
    match dispute.dispute_amount {
        Some(amount) if amount > 0.0 => Ok(amount),
        _ => Err(MediatorError::MissingDisputeAmount),
    }
}

fn require_id(dispute: &Dispute) -> Result<&str, MediatorError> {
    dispute
        .dispute_id
        .as_deref()
        .ok_or(MediatorError::MissingDisputeId)
}

fn corridor(negotiation: &Negotiation) -> SettlementRange {
    SettlementRange {
        min: negotiation.min_settlement_amount,
        max: negotiation.max_settlement_amount,
    }
}

fn opening_midpoint(current: f64, ceiling: f64) -> f64 {
    (current + ceiling) / 2.0 * 0.95
}
