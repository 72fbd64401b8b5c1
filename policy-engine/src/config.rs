use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PolicyError;

/// Free-form per-type policy block. The engine routes it, callers
/// interpret it.
pub type DisputeTypeRules = serde_yaml::Mapping;

/// Root of `policy_rules.yaml`. Every section falls back to the
/// statutory defaults when omitted, so a minimal file stays valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub msmed_act: MsmedActRules,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub negotiation: NegotiationRules,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MsmedActRules {
    #[serde(default)]
    pub eligibility: EligibilityRules,
    #[serde(default)]
    pub timelines: TimelineRules,
    #[serde(default)]
    pub interest: InterestRules,
    #[serde(default)]
    pub dispute_types: HashMap<String, DisputeTypeRules>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EligibilityRules {
    #[serde(default = "default_true")]
    pub requires_msme_registration: bool,
    /// Registration certificates accepted as proof of MSME status.
    /// Empty means any type is accepted.
    #[serde(default)]
    pub valid_registration_types: Vec<String>,
    #[serde(default = "default_minimum_dispute_amount")]
    pub minimum_dispute_amount: f64,
    #[serde(default)]
    pub maximum_dispute_amount: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineRules {
    /// Filing window counted from the invoice date.
    #[serde(default = "default_max_days_from_invoice")]
    pub max_days_from_invoice: i64,
    /// Statutory grace period after the due date before a dispute can
    /// be filed.
    #[serde(default = "default_min_payment_delay_days")]
    pub min_payment_delay_days: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compounding {
    Simple,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterestRules {
    #[serde(default = "default_annual_rate")]
    pub annual_rate: f64,
    /// Recorded for the award stage. Pre-settlement estimates always
    /// use simple interest.
    #[serde(default = "default_compounding")]
    pub compounding: Compounding,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub hard_blocks: Vec<String>,
    #[serde(default)]
    pub soft_warnings: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NegotiationRules {
    #[serde(default = "default_min_settlement_percentage")]
    pub min_settlement_percentage: f64,
    #[serde(default = "default_max_settlement_percentage")]
    pub max_settlement_percentage: f64,
    #[serde(default = "default_max_negotiation_rounds")]
    pub max_negotiation_rounds: u32,
    #[serde(default = "default_min_days_between_rounds")]
    pub min_days_between_rounds: u32,
    #[serde(default = "default_max_days_between_rounds")]
    pub max_days_between_rounds: u32,
}

impl PolicyConfig {
    /// Fails fast on values that would break every later computation.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let eligibility = &self.msmed_act.eligibility;
        if eligibility.minimum_dispute_amount < 0.0 {
            return Err(PolicyError::Invalid(format!(
                "minimum_dispute_amount can't be negative, got {}",
                eligibility.minimum_dispute_amount
            )));
        }
        if let Some(max) = eligibility.maximum_dispute_amount {
            if max < eligibility.minimum_dispute_amount {
                return Err(PolicyError::Invalid(format!(
                    "maximum_dispute_amount {} is below minimum_dispute_amount {}",
                    max, eligibility.minimum_dispute_amount
                )));
            }
        }

        let timelines = &self.msmed_act.timelines;
        if timelines.max_days_from_invoice <= 0 {
            return Err(PolicyError::Invalid(format!(
                "max_days_from_invoice must be positive, got {}",
                timelines.max_days_from_invoice
            )));
        }
        if timelines.min_payment_delay_days < 0 {
            return Err(PolicyError::Invalid(format!(
                "min_payment_delay_days can't be negative, got {}",
                timelines.min_payment_delay_days
            )));
        }

        let interest = &self.msmed_act.interest;
        if !interest.annual_rate.is_finite() || interest.annual_rate < 0.0 {
            return Err(PolicyError::Invalid(format!(
                "annual_rate must be a non-negative number, got {}",
                interest.annual_rate
            )));
        }

        let negotiation = &self.negotiation;
        for (name, value) in &[
            (
                "min_settlement_percentage",
                negotiation.min_settlement_percentage,
            ),
            (
                "max_settlement_percentage",
                negotiation.max_settlement_percentage,
            ),
        ] {
            if !(0.0..=100.0).contains(value) {
                return Err(PolicyError::Invalid(format!(
                    "{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }
        if negotiation.min_settlement_percentage > negotiation.max_settlement_percentage {
            return Err(PolicyError::Invalid(format!(
                "min_settlement_percentage {} exceeds max_settlement_percentage {}",
                negotiation.min_settlement_percentage, negotiation.max_settlement_percentage
            )));
        }
        if negotiation.max_negotiation_rounds == 0 {
            return Err(PolicyError::Invalid(
                "max_negotiation_rounds must be at least 1".to_string(),
            ));
        }
        if negotiation.min_days_between_rounds > negotiation.max_days_between_rounds {
            return Err(PolicyError::Invalid(format!(
                "min_days_between_rounds {} exceeds max_days_between_rounds {}",
                negotiation.min_days_between_rounds, negotiation.max_days_between_rounds
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub helpful_for: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentSet {
    #[serde(default)]
    pub mandatory: Vec<DocumentRule>,
    #[serde(default)]
    pub optional: Vec<DocumentRule>,
}

/// Root of `mandatory_docs.yaml`. Keyed by dispute type, with a
/// `common` set applying to every type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MandatoryDocsConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub documents: HashMap<String, DocumentSet>,
}

impl MandatoryDocsConfig {
    const COMMON: &'static str = "common";

    /// Names of documents required for `dispute_type`: the common set
    /// first, then type-specific ones.
    pub fn mandatory_for(&self, dispute_type: &str) -> Vec<String> {
        self.rule_sets(dispute_type)
            .flat_map(|set| set.mandatory.iter())
            .map(|doc| doc.name.clone())
            .collect()
    }

    pub fn optional_for(&self, dispute_type: &str) -> Vec<DocumentRule> {
        self.rule_sets(dispute_type)
            .flat_map(|set| set.optional.iter())
            .cloned()
            .collect()
    }

    fn rule_sets<'a>(&'a self, dispute_type: &str) -> impl Iterator<Item = &'a DocumentSet> {
        self.documents
            .get(Self::COMMON)
            .into_iter()
            .chain(self.documents.get(dispute_type))
    }
}

impl Default for PolicyConfig {
    fn default() -> PolicyConfig {
        PolicyConfig {
            version: default_version(),
            msmed_act: Default::default(),
            validation: Default::default(),
            negotiation: Default::default(),
        }
    }
}

impl Default for MandatoryDocsConfig {
    fn default() -> MandatoryDocsConfig {
        MandatoryDocsConfig {
            version: default_version(),
            documents: HashMap::new(),
        }
    }
}

impl Default for EligibilityRules {
    fn default() -> EligibilityRules {
        EligibilityRules {
            requires_msme_registration: default_true(),
            valid_registration_types: vec![],
            minimum_dispute_amount: default_minimum_dispute_amount(),
            maximum_dispute_amount: None,
        }
    }
}

impl Default for TimelineRules {
    fn default() -> TimelineRules {
        TimelineRules {
            max_days_from_invoice: default_max_days_from_invoice(),
            min_payment_delay_days: default_min_payment_delay_days(),
        }
    }
}

impl Default for InterestRules {
    fn default() -> InterestRules {
        InterestRules {
            annual_rate: default_annual_rate(),
            compounding: default_compounding(),
        }
    }
}

impl Default for NegotiationRules {
    fn default() -> NegotiationRules {
        NegotiationRules {
            min_settlement_percentage: default_min_settlement_percentage(),
            max_settlement_percentage: default_max_settlement_percentage(),
            max_negotiation_rounds: default_max_negotiation_rounds(),
            min_days_between_rounds: default_min_days_between_rounds(),
            max_days_between_rounds: default_max_days_between_rounds(),
        }
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_minimum_dispute_amount() -> f64 {
    1.0
}

fn default_max_days_from_invoice() -> i64 {
    365
}

fn default_min_payment_delay_days() -> i64 {
    45
}

fn default_annual_rate() -> f64 {
    18.0
}

fn default_compounding() -> Compounding {
    Compounding::Monthly
}

fn default_min_settlement_percentage() -> f64 {
    50.0
}

fn default_max_settlement_percentage() -> f64 {
    100.0
}

fn default_max_negotiation_rounds() -> u32 {
    5
}

fn default_min_days_between_rounds() -> u32 {
    3
}

fn default_max_days_between_rounds() -> u32 {
    30
}
