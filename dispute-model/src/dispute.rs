use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{check_non_negative, DomainError};
use crate::party::{Document, Party};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    #[display(fmt = "payment_delay")]
    PaymentDelay,
    #[display(fmt = "partial_payment")]
    PartialPayment,
    #[display(fmt = "quality_dispute")]
    QualityDispute,
}

impl DisputeType {
    /// Documents every dispute of this type needs, before any policy
    /// configuration adds more.
    pub fn baseline_documents(self) -> Vec<&'static str> {
        let mut docs = vec!["invoice", "msme_registration"];
        match self {
            DisputeType::PaymentDelay => docs.push("delivery_proof"),
            DisputeType::PartialPayment => docs.extend(vec!["delivery_proof", "payment_proof"]),
            DisputeType::QualityDispute => docs.extend(vec!["delivery_proof", "purchase_order"]),
        }
        docs
    }
}

/// Lifecycle of a dispute case. Transitions outside the table below are
/// rejected with [`DomainError::InvalidDisputeTransition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    #[display(fmt = "draft")]
    Draft,
    #[display(fmt = "pending_validation")]
    PendingValidation,
    #[display(fmt = "validated")]
    Validated,
    #[display(fmt = "rejected")]
    Rejected,
    #[display(fmt = "under_review")]
    UnderReview,
    #[display(fmt = "negotiation_in_progress")]
    NegotiationInProgress,
    #[display(fmt = "settled")]
    Settled,
    #[display(fmt = "escalated")]
    Escalated,
    #[display(fmt = "closed")]
    Closed,
}

impl DisputeStatus {
    pub fn can_transition_to(self, next: DisputeStatus) -> bool {
        use DisputeStatus::*;
        matches!(
            (self, next),
            (Draft, PendingValidation)
                | (PendingValidation, Validated)
                | (PendingValidation, Rejected)
                | (Validated, UnderReview)
                | (UnderReview, NegotiationInProgress)
                | (NegotiationInProgress, Settled)
                | (NegotiationInProgress, Escalated)
                | (Settled, Closed)
                | (Escalated, Closed)
                | (Rejected, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DisputeStatus::Closed)
    }
}

/// A payment-dispute case as it moves from intake to settlement.
///
/// Most fields are optional because a case starts as an empty draft and is
/// filled in over several intake steps. [`Dispute::submission_blockers`]
/// reports what still prevents submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dispute {
    pub dispute_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub dispute_type: Option<DisputeType>,
    pub status: DisputeStatus,
    pub msme_party: Option<Party>,
    pub buyer_party: Option<Party>,
    /// Amount in dispute (INR).
    pub dispute_amount: Option<f64>,
    /// Original invoice amount, which can exceed the disputed part.
    pub invoice_amount: Option<f64>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub payment_due_date: Option<DateTime<Utc>>,
    pub days_delayed: Option<u32>,
    #[serde(default)]
    pub documents: Vec<Document>,
    pub is_eligible: Option<bool>,
    #[serde(default)]
    pub eligibility_errors: Vec<String>,
    /// MSMED Act provisions the policy engine found applicable.
    #[serde(default)]
    pub applicable_rules: Vec<String>,
    pub description: Option<String>,
}

impl Dispute {
    pub fn draft(at: DateTime<Utc>) -> Dispute {
        Dispute {
            dispute_id: None,
            created_at: at,
            updated_at: at,
            dispute_type: None,
            status: DisputeStatus::Draft,
            msme_party: None,
            buyer_party: None,
            dispute_amount: None,
            invoice_amount: None,
            invoice_number: None,
            invoice_date: None,
            payment_due_date: None,
            days_delayed: None,
            documents: vec![],
            is_eligible: None,
            eligibility_errors: vec![],
            applicable_rules: vec![],
            description: None,
        }
    }

    pub fn with_id(mut self, id: impl ToString) -> Dispute {
        self.dispute_id = Some(id.to_string());
        self
    }

    pub fn with_type(mut self, dispute_type: DisputeType) -> Dispute {
        self.dispute_type = Some(dispute_type);
        self
    }

    pub fn with_parties(mut self, msme: Party, buyer: Party) -> Dispute {
        self.msme_party = Some(msme);
        self.buyer_party = Some(buyer);
        self
    }

    pub fn with_amounts(
        mut self,
        dispute_amount: f64,
        invoice_amount: f64,
    ) -> Result<Dispute, DomainError> {
        check_non_negative("dispute_amount", dispute_amount)?;
        check_non_negative("invoice_amount", invoice_amount)?;
        self.dispute_amount = Some(dispute_amount);
        self.invoice_amount = Some(invoice_amount);
        Ok(self)
    }

    pub fn with_invoice(
        mut self,
        number: impl ToString,
        date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Dispute {
        self.invoice_number = Some(number.to_string());
        self.invoice_date = Some(date);
        self.payment_due_date = Some(due_date);
        self
    }

    pub fn with_delay(mut self, days: u32) -> Dispute {
        self.days_delayed = Some(days);
        self
    }

    pub fn with_document(mut self, document: Document) -> Dispute {
        self.documents.push(document);
        self
    }

    pub fn with_description(mut self, description: impl ToString) -> Dispute {
        self.description = Some(description.to_string());
        self
    }

    /// Moves the case to `next`, refusing transitions outside the
    /// lifecycle table.
    pub fn transition_to(
        &mut self,
        next: DisputeStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidDisputeTransition {
                from: self.status,
                to: next,
            });
        }
        log::debug!(
            "Dispute [{}] moved from '{}' to '{}'.",
            self.dispute_id.as_deref().unwrap_or("draft"),
            self.status,
            next
        );
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Stores the outcome of an eligibility assessment on the case.
    pub fn apply_eligibility(&mut self, eligible: bool, errors: Vec<String>, at: DateTime<Utc>) {
        self.is_eligible = Some(eligible);
        self.eligibility_errors = errors;
        self.updated_at = at;
    }

    pub fn verified_document_names(&self) -> HashSet<&str> {
        self.documents
            .iter()
            .filter(|doc| doc.is_verified)
            .map(|doc| doc.name.as_str())
            .collect()
    }

    /// Documents from `required` that are not yet provided and verified.
    /// Order follows `required`.
    pub fn missing_documents(&self, required: &[String]) -> Vec<String> {
        let provided = self.verified_document_names();
        required
            .iter()
            .filter(|name| !provided.contains(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn has_all_mandatory_documents(&self, required: &[String]) -> bool {
        self.missing_documents(required).is_empty()
    }

    /// Everything that still blocks submission, in intake-form order.
    /// An empty result means the case can be submitted.
    pub fn submission_blockers(&self, required_documents: &[String]) -> Vec<String> {
        let mut errors = vec![];
        if self.dispute_type.is_none() {
            errors.push("Dispute type must be selected".to_string());
        }
        if self.msme_party.is_none() {
            errors.push("MSME party information is required".to_string());
        }
        if self.buyer_party.is_none() {
            errors.push("Buyer party information is required".to_string());
        }
        match self.dispute_amount {
            Some(amount) if amount > 0.0 => {}
            _ => errors.push("Valid dispute amount is required".to_string()),
        }
        if self.invoice_number.is_none() {
            errors.push("Invoice number is required".to_string());
        }
        if self.invoice_date.is_none() {
            errors.push("Invoice date is required".to_string());
        }

        let missing = self.missing_documents(required_documents);
        if !missing.is_empty() {
            errors.push(format!("Missing mandatory documents: {}", missing.join(", ")));
        }

        if self.is_eligible == Some(false) {
            errors.extend(self.eligibility_errors.iter().cloned());
        }
        errors
    }

    pub fn can_submit(&self, required_documents: &[String]) -> bool {
        self.submission_blockers(required_documents).is_empty()
    }
}
