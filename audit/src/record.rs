use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("Confidence must be between 0.0 and 1.0, got {0}")]
    ConfidenceOutOfRange(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    #[display(fmt = "info")]
    Info,
    #[display(fmt = "warning")]
    Warning,
    #[display(fmt = "error")]
    Error,
    #[display(fmt = "critical")]
    Critical,
}

/// Everything the system records about itself. One variant per kind of
/// action, so queries and retention rules can match on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Dispute lifecycle
    #[display(fmt = "dispute_created")]
    DisputeCreated,
    #[display(fmt = "dispute_submitted")]
    DisputeSubmitted,
    #[display(fmt = "dispute_validated")]
    DisputeValidated,
    #[display(fmt = "dispute_rejected")]
    DisputeRejected,
    // Documents
    #[display(fmt = "document_uploaded")]
    DocumentUploaded,
    #[display(fmt = "document_verified")]
    DocumentVerified,
    #[display(fmt = "document_rejected")]
    DocumentRejected,
    // AI mediation
    #[display(fmt = "ai_suggestion_generated")]
    AiSuggestionGenerated,
    #[display(fmt = "ai_suggestion_approved")]
    AiSuggestionApproved,
    #[display(fmt = "ai_suggestion_rejected")]
    AiSuggestionRejected,
    // Negotiation
    #[display(fmt = "negotiation_opened")]
    NegotiationOpened,
    #[display(fmt = "offer_created")]
    OfferCreated,
    #[display(fmt = "offer_approved")]
    OfferApproved,
    #[display(fmt = "offer_rejected")]
    OfferRejected,
    #[display(fmt = "offer_sent")]
    OfferSent,
    #[display(fmt = "offer_accepted")]
    OfferAccepted,
    #[display(fmt = "offer_rejected_by_party")]
    OfferRejectedByParty,
    #[display(fmt = "counteroffer_created")]
    CounterofferCreated,
    #[display(fmt = "settlement_reached")]
    SettlementReached,
    #[display(fmt = "negotiation_escalated")]
    NegotiationEscalated,
    // Policy
    #[display(fmt = "policy_loaded")]
    PolicyLoaded,
    #[display(fmt = "policy_updated")]
    PolicyUpdated,
    // System
    #[display(fmt = "eligibility_checked")]
    EligibilityChecked,
    #[display(fmt = "human_override")]
    HumanOverride,
    #[display(fmt = "error_occurred")]
    ErrorOccurred,
}

/// One audit entry. Built through the `with_*`/`on_*` methods so call
/// sites read as a sentence and optional context stays optional.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub log_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub level: AuditLevel,
    pub dispute_id: Option<String>,
    pub negotiation_id: Option<String>,
    pub user_id: Option<String>,
    pub description: String,
    /// Structured payload, action specific.
    #[serde(default)]
    pub details: serde_json::Value,
    pub is_ai_action: bool,
    pub ai_reasoning: Option<String>,
    pub ai_confidence: Option<f64>,
    pub requires_approval: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub override_reason: Option<String>,
    /// Policy version in effect when the action happened.
    pub policy_version: Option<String>,
    #[serde(default)]
    pub policy_rules_applied: Vec<String>,
    pub error_message: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, description: impl ToString, at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            log_id: Uuid::new_v4().to_string(),
            timestamp: at,
            action,
            level: AuditLevel::Info,
            dispute_id: None,
            negotiation_id: None,
            user_id: None,
            description: description.to_string(),
            details: serde_json::Value::Null,
            is_ai_action: false,
            ai_reasoning: None,
            ai_confidence: None,
            requires_approval: false,
            approved_by: None,
            approved_at: None,
            override_reason: None,
            policy_version: None,
            policy_rules_applied: vec![],
            error_message: None,
        }
    }

    pub fn level(mut self, level: AuditLevel) -> AuditRecord {
        self.level = level;
        self
    }

    pub fn on_dispute(mut self, dispute_id: impl ToString) -> AuditRecord {
        self.dispute_id = Some(dispute_id.to_string());
        self
    }

    pub fn on_negotiation(mut self, negotiation_id: impl ToString) -> AuditRecord {
        self.negotiation_id = Some(negotiation_id.to_string());
        self
    }

    pub fn by_user(mut self, user_id: impl ToString) -> AuditRecord {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Marks the entry as an AI action. AI actions always require human
    /// approval before they take effect.
    pub fn as_ai_action(
        mut self,
        reasoning: impl ToString,
        confidence: f64,
    ) -> Result<AuditRecord, AuditError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(AuditError::ConfidenceOutOfRange(confidence));
        }
        self.is_ai_action = true;
        self.requires_approval = true;
        self.ai_reasoning = Some(reasoning.to_string());
        self.ai_confidence = Some(confidence);
        Ok(self)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> AuditRecord {
        self.details = details;
        self
    }

    pub fn under_policy(
        mut self,
        version: impl ToString,
        rules_applied: Vec<String>,
    ) -> AuditRecord {
        self.policy_version = Some(version.to_string());
        self.policy_rules_applied = rules_applied;
        self
    }

    pub fn approved(mut self, by: impl ToString, at: DateTime<Utc>) -> AuditRecord {
        self.approved_by = Some(by.to_string());
        self.approved_at = Some(at);
        self
    }

    pub fn with_override_reason(mut self, reason: impl ToString) -> AuditRecord {
        self.override_reason = Some(reason.to_string());
        self
    }

    pub fn with_error(mut self, message: impl ToString) -> AuditRecord {
        self.level = AuditLevel::Error;
        self.error_message = Some(message.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn ai_actions_require_approval() {
        let record = AuditRecord::new(
            AuditAction::AiSuggestionGenerated,
            "Suggested opening offer",
            now(),
        )
        .on_dispute("dispute-1")
        .as_ai_action("Strong case due to 120 days delay", 0.8)
        .unwrap();

        assert!(record.is_ai_action);
        assert!(record.requires_approval);
        assert_eq!(record.level, AuditLevel::Info);
        assert_eq!(record.ai_confidence, Some(0.8));
    }

    #[test]
    fn confidence_outside_unit_interval_is_rejected() {
        let result = AuditRecord::new(AuditAction::AiSuggestionGenerated, "broken", now())
            .as_ai_action("reasoning", 1.5);

        assert_eq!(result.unwrap_err(), AuditError::ConfidenceOutOfRange(1.5));
    }

    #[test]
    fn error_builder_raises_level() {
        let record = AuditRecord::new(AuditAction::ErrorOccurred, "Reload failed", now())
            .with_error("Parse error at line 3");

        assert_eq!(record.level, AuditLevel::Error);
        assert_eq!(
            record.error_message.as_deref(),
            Some("Parse error at line 3")
        );
    }

    #[test]
    fn serializes_with_snake_case_actions() {
        let record = AuditRecord::new(AuditAction::SettlementReached, "Settled", now())
            .with_details(json!({ "amount": 200000.0 }));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["action"], "settlement_reached");
        assert_eq!(value["level"], "info");
        assert_eq!(value["details"]["amount"], 200000.0);
    }
}
