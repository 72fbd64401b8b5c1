use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::record::AuditError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    #[display(fmt = "settlement_suggestion")]
    SettlementSuggestion,
    #[display(fmt = "counteroffer_suggestion")]
    CounterofferSuggestion,
    #[display(fmt = "settlement_analysis")]
    SettlementAnalysis,
    #[display(fmt = "eligibility_check")]
    EligibilityCheck,
}

/// Answers "why did the system suggest this?" for one decision.
/// Stored next to the audit trail so every AI output can be traced back
/// to its inputs and weights.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExplainabilityArtifact {
    pub artifact_id: String,
    pub created_at: DateTime<Utc>,
    pub dispute_id: Option<String>,
    pub negotiation_id: Option<String>,
    pub offer_id: Option<String>,
    pub decision_type: DecisionType,
    pub decision_summary: String,
    pub detailed_reasoning: String,
    /// Factors that influenced the decision, with their relative weight
    /// where one applies.
    #[serde(default)]
    pub factors_considered: Vec<String>,
    #[serde(default)]
    pub factor_weights: HashMap<String, f64>,
    /// Where the inputs came from (dispute record, policy files, offer
    /// history).
    #[serde(default)]
    pub data_sources: Vec<String>,
    pub confidence_score: f64,
    #[serde(default)]
    pub uncertainty_factors: Vec<String>,
    #[serde(default)]
    pub policy_rules_applied: Vec<String>,
}

impl ExplainabilityArtifact {
    pub fn new(
        decision_type: DecisionType,
        summary: impl ToString,
        reasoning: impl ToString,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<ExplainabilityArtifact, AuditError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(AuditError::ConfidenceOutOfRange(confidence));
        }
        Ok(ExplainabilityArtifact {
            artifact_id: Uuid::new_v4().to_string(),
            created_at: at,
            dispute_id: None,
            negotiation_id: None,
            offer_id: None,
            decision_type,
            decision_summary: summary.to_string(),
            detailed_reasoning: reasoning.to_string(),
            factors_considered: vec![],
            factor_weights: HashMap::new(),
            data_sources: vec![],
            confidence_score: confidence,
            uncertainty_factors: vec![],
            policy_rules_applied: vec![],
        })
    }

    pub fn on_dispute(mut self, dispute_id: impl ToString) -> ExplainabilityArtifact {
        self.dispute_id = Some(dispute_id.to_string());
        self
    }

    pub fn on_negotiation(mut self, negotiation_id: impl ToString) -> ExplainabilityArtifact {
        self.negotiation_id = Some(negotiation_id.to_string());
        self
    }

    pub fn on_offer(mut self, offer_id: impl ToString) -> ExplainabilityArtifact {
        self.offer_id = Some(offer_id.to_string());
        self
    }

    /// Adds a factor with its relative weight.
    pub fn weighted_factor(mut self, name: impl ToString, weight: f64) -> ExplainabilityArtifact {
        let name = name.to_string();
        self.factors_considered.push(name.clone());
        self.factor_weights.insert(name, weight);
        self
    }

    pub fn factor(mut self, name: impl ToString) -> ExplainabilityArtifact {
        self.factors_considered.push(name.to_string());
        self
    }

    pub fn data_source(mut self, name: impl ToString) -> ExplainabilityArtifact {
        self.data_sources.push(name.to_string());
        self
    }

    pub fn uncertainty(mut self, name: impl ToString) -> ExplainabilityArtifact {
        self.uncertainty_factors.push(name.to_string());
        self
    }

    pub fn under_rules(mut self, rules: Vec<String>) -> ExplainabilityArtifact {
        self.policy_rules_applied = rules;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn artifact_links_and_weights_are_kept() {
        let artifact = ExplainabilityArtifact::new(
            DecisionType::SettlementSuggestion,
            "Opening offer at 87.78%",
            "Delay of 120 days and accrued interest support a strong opening position.",
            0.8,
            now(),
        )
        .unwrap()
        .on_dispute("dispute-1")
        .on_offer("offer-1")
        .weighted_factor("payment_delay", 0.6)
        .weighted_factor("accrued_interest", 0.4)
        .data_source("dispute record")
        .uncertainty("buyer response unknown");

        assert_eq!(artifact.factors_considered.len(), 2);
        assert_eq!(artifact.factor_weights["payment_delay"], 0.6);
        assert_eq!(artifact.data_sources, vec!["dispute record".to_string()]);
        assert_eq!(artifact.uncertainty_factors.len(), 1);
        assert_eq!(artifact.offer_id.as_deref(), Some("offer-1"));
    }

    #[test]
    fn confidence_is_validated() {
        let result = ExplainabilityArtifact::new(
            DecisionType::SettlementAnalysis,
            "summary",
            "reasoning",
            -0.1,
            now(),
        );
        assert!(result.is_err());
    }
}
