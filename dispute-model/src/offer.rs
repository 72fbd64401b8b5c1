use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{check_confidence, check_non_negative, check_percentage, DomainError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    #[display(fmt = "msme")]
    Msme,
    #[display(fmt = "buyer")]
    Buyer,
}

impl PartyRole {
    pub fn other(self) -> PartyRole {
        match self {
            PartyRole::Msme => PartyRole::Buyer,
            PartyRole::Buyer => PartyRole::Msme,
        }
    }
}

/// Lifecycle of a single offer. Every AI suggestion starts in
/// `PendingApproval` and reaches the other party only through an
/// explicit human approval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    #[display(fmt = "pending_approval")]
    PendingApproval,
    #[display(fmt = "approved")]
    Approved,
    #[display(fmt = "rejected")]
    Rejected,
    #[display(fmt = "sent")]
    Sent,
    #[display(fmt = "accepted")]
    Accepted,
    #[display(fmt = "rejected_by_other")]
    RejectedByOther,
    #[display(fmt = "expired")]
    Expired,
}

impl OfferStatus {
    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        use OfferStatus::*;
        matches!(
            (self, next),
            (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, Sent)
                | (Sent, Accepted)
                | (Sent, RejectedByOther)
                | (Sent, Expired)
        )
    }

    pub fn is_terminal(self) -> bool {
        use OfferStatus::*;
        matches!(self, Rejected | Accepted | RejectedByOther | Expired)
    }
}

/// A settlement offer on a dispute.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: String,
    pub dispute_id: String,
    pub created_at: DateTime<Utc>,
    /// Settlement amount offered (INR).
    pub offered_amount: f64,
    /// Offered amount as a percentage of the disputed amount.
    pub offered_percentage: f64,
    pub payment_terms: Option<String>,
    pub offered_by: PartyRole,
    pub status: OfferStatus,
    pub is_ai_suggested: bool,
    pub ai_reasoning: Option<String>,
    pub ai_confidence: Option<f64>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_notes: Option<String>,
}

impl Offer {
    /// AI-suggested offer. Starts in `PendingApproval` and must be
    /// approved before it can be sent.
    pub fn suggested(
        dispute_id: impl ToString,
        amount: f64,
        percentage: f64,
        by: PartyRole,
        at: DateTime<Utc>,
    ) -> Result<Offer, DomainError> {
        check_non_negative("offered_amount", amount)?;
        check_percentage("offered_percentage", percentage)?;
        Ok(Offer {
            offer_id: Uuid::new_v4().to_string(),
            dispute_id: dispute_id.to_string(),
            created_at: at,
            offered_amount: amount,
            offered_percentage: percentage,
            payment_terms: None,
            offered_by: by,
            status: OfferStatus::PendingApproval,
            is_ai_suggested: true,
            ai_reasoning: None,
            ai_confidence: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            responded_at: None,
            response_notes: None,
        })
    }

    /// Offer received from a party directly, already on the wire.
    pub fn received(
        dispute_id: impl ToString,
        amount: f64,
        percentage: f64,
        by: PartyRole,
        at: DateTime<Utc>,
    ) -> Result<Offer, DomainError> {
        let mut offer = Offer::suggested(dispute_id, amount, percentage, by, at)?;
        offer.is_ai_suggested = false;
        offer.status = OfferStatus::Sent;
        Ok(offer)
    }

    pub fn with_reasoning(
        mut self,
        reasoning: impl ToString,
        confidence: f64,
    ) -> Result<Offer, DomainError> {
        check_confidence(confidence)?;
        self.ai_reasoning = Some(reasoning.to_string());
        self.ai_confidence = Some(confidence);
        Ok(self)
    }

    pub fn with_payment_terms(mut self, terms: impl ToString) -> Offer {
        self.payment_terms = Some(terms.to_string());
        self
    }

    pub fn transition_to(&mut self, next: OfferStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidOfferTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Human approval. Records who approved and when.
    pub fn approve(&mut self, by: impl ToString, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition_to(OfferStatus::Approved)?;
        self.approved_by = Some(by.to_string());
        self.approved_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self, reason: impl ToString) -> Result<(), DomainError> {
        self.transition_to(OfferStatus::Rejected)?;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn mark_sent(&mut self) -> Result<(), DomainError> {
        self.transition_to(OfferStatus::Sent)
    }

    pub fn record_response(
        &mut self,
        next: OfferStatus,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<(), DomainError> {
        self.transition_to(next)?;
        self.responded_at = Some(at);
        self.response_notes = notes;
        Ok(())
    }
}

/// A counteroffer answering a previous offer. Carries the id of the
/// offer it responds to; otherwise mirrors [`Offer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CounterOffer {
    pub counteroffer_id: String,
    pub original_offer_id: String,
    pub created_at: DateTime<Utc>,
    pub counter_amount: f64,
    pub counter_percentage: f64,
    pub payment_terms: Option<String>,
    pub offered_by: PartyRole,
    pub status: OfferStatus,
    pub is_ai_suggested: bool,
    pub ai_reasoning: Option<String>,
    pub ai_confidence: Option<f64>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_notes: Option<String>,
}

impl CounterOffer {
    pub fn suggested(
        original_offer_id: impl ToString,
        amount: f64,
        percentage: f64,
        by: PartyRole,
        at: DateTime<Utc>,
    ) -> Result<CounterOffer, DomainError> {
        check_non_negative("counter_amount", amount)?;
        check_percentage("counter_percentage", percentage)?;
        Ok(CounterOffer {
            counteroffer_id: Uuid::new_v4().to_string(),
            original_offer_id: original_offer_id.to_string(),
            created_at: at,
            counter_amount: amount,
            counter_percentage: percentage,
            payment_terms: None,
            offered_by: by,
            status: OfferStatus::PendingApproval,
            is_ai_suggested: true,
            ai_reasoning: None,
            ai_confidence: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            responded_at: None,
            response_notes: None,
        })
    }

    pub fn with_reasoning(
        mut self,
        reasoning: impl ToString,
        confidence: f64,
    ) -> Result<CounterOffer, DomainError> {
        check_confidence(confidence)?;
        self.ai_reasoning = Some(reasoning.to_string());
        self.ai_confidence = Some(confidence);
        Ok(self)
    }

    pub fn with_payment_terms(mut self, terms: impl ToString) -> CounterOffer {
        self.payment_terms = Some(terms.to_string());
        self
    }

    pub fn transition_to(&mut self, next: OfferStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidOfferTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn approve(&mut self, by: impl ToString, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition_to(OfferStatus::Approved)?;
        self.approved_by = Some(by.to_string());
        self.approved_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self, reason: impl ToString) -> Result<(), DomainError> {
        self.transition_to(OfferStatus::Rejected)?;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn mark_sent(&mut self) -> Result<(), DomainError> {
        self.transition_to(OfferStatus::Sent)
    }

    pub fn record_response(
        &mut self,
        next: OfferStatus,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<(), DomainError> {
        self.transition_to(next)?;
        self.responded_at = Some(at);
        self.response_notes = notes;
        Ok(())
    }
}
