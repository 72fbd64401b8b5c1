use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::{DisputeTypeRules, DocumentRule, MandatoryDocsConfig, PolicyConfig};
use crate::error::PolicyError;

/// Locations of the two policy files.
#[derive(Clone, Debug)]
pub struct PolicyPaths {
    pub policy_rules: PathBuf,
    pub mandatory_docs: PathBuf,
}

impl PolicyPaths {
    /// Conventional file names inside a config directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> PolicyPaths {
        PolicyPaths {
            policy_rules: dir.as_ref().join("policy_rules.yaml"),
            mandatory_docs: dir.as_ref().join("mandatory_docs.yaml"),
        }
    }
}

/// Outcome of an eligibility or timeline check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    pub errors: Vec<String>,
}

impl EligibilityVerdict {
    pub fn from_errors(errors: Vec<String>) -> EligibilityVerdict {
        EligibilityVerdict {
            eligible: errors.is_empty(),
            errors,
        }
    }

    /// Combines two verdicts; eligible only when both are.
    pub fn merge(mut self, other: EligibilityVerdict) -> EligibilityVerdict {
        self.eligible = self.eligible && other.eligible;
        self.errors.extend(other.errors);
        self
    }
}

/// Legally bounded settlement corridor for one disputed amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementRange {
    pub min: f64,
    pub max: f64,
}

impl SettlementRange {
    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min && amount <= self.max
    }

    pub fn clamp(&self, amount: f64) -> f64 {
        amount.max(self.min).min(self.max)
    }
}

/// Allowed pacing between negotiation rounds, in days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationTimeline {
    pub min_days: u32,
    pub max_days: u32,
}

/// One consistent view of the policy files. Queries never touch disk,
/// so a whole mediation step sees a single policy version even while
/// another thread reloads.
#[derive(Clone, Debug)]
pub struct PolicySnapshot {
    pub config: PolicyConfig,
    pub documents: MandatoryDocsConfig,
    pub loaded_at: DateTime<Utc>,
}

impl PolicySnapshot {
    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// MSMED Act eligibility screen: registration and amount limits.
    /// Collects every violation instead of stopping at the first.
    pub fn check_eligibility(
        &self,
        dispute_amount: f64,
        has_msme_registration: bool,
        registration_type: Option<&str>,
    ) -> EligibilityVerdict {
        let rules = &self.config.msmed_act.eligibility;
        let mut errors = vec![];

        if rules.requires_msme_registration {
            if !has_msme_registration {
                errors.push("MSME registration is required".to_string());
            } else if let Some(kind) = registration_type {
                let valid = &rules.valid_registration_types;
                if !valid.is_empty() && !valid.iter().any(|accepted| accepted == kind) {
                    errors.push(format!(
                        "Registration type must be one of: {}",
                        valid.join(", ")
                    ));
                }
            }
        }

        if dispute_amount < rules.minimum_dispute_amount {
            errors.push(format!(
                "Dispute amount must be at least ₹{}",
                rules.minimum_dispute_amount
            ));
        }
        if let Some(max) = rules.maximum_dispute_amount {
            if dispute_amount > max {
                errors.push(format!("Dispute amount cannot exceed ₹{}", max));
            }
        }

        EligibilityVerdict::from_errors(errors)
    }

    /// Filing-window and minimum-delay checks, evaluated against an
    /// explicit `now`.
    pub fn check_timeline(
        &self,
        invoice_date: DateTime<Utc>,
        payment_due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> EligibilityVerdict {
        let rules = &self.config.msmed_act.timelines;
        let mut errors = vec![];

        let days_since_invoice = (now - invoice_date).num_days();
        if days_since_invoice > rules.max_days_from_invoice {
            errors.push(format!(
                "Dispute must be filed within {} days of invoice date",
                rules.max_days_from_invoice
            ));
        }

        if let Some(due_date) = payment_due_date {
            let days_delayed = (now - due_date).num_days();
            if days_delayed < rules.min_payment_delay_days {
                errors.push(format!(
                    "Payment must be delayed by at least {} days before filing dispute",
                    rules.min_payment_delay_days
                ));
            }
        }

        EligibilityVerdict::from_errors(errors)
    }

    pub fn mandatory_documents(&self, dispute_type: &str) -> Vec<String> {
        self.documents.mandatory_for(dispute_type)
    }

    pub fn optional_documents(&self, dispute_type: &str) -> Vec<DocumentRule> {
        self.documents.optional_for(dispute_type)
    }

    pub fn hard_block_rules(&self) -> &[String] {
        &self.config.validation.hard_blocks
    }

    pub fn soft_warning_rules(&self) -> &[String] {
        &self.config.validation.soft_warnings
    }

    pub fn settlement_range(&self, original_amount: f64) -> SettlementRange {
        let rules = &self.config.negotiation;
        SettlementRange {
            min: original_amount * (rules.min_settlement_percentage / 100.0),
            max: original_amount * (rules.max_settlement_percentage / 100.0),
        }
    }

    pub fn max_negotiation_rounds(&self) -> u32 {
        self.config.negotiation.max_negotiation_rounds
    }

    pub fn negotiation_timeline(&self) -> NegotiationTimeline {
        let rules = &self.config.negotiation;
        NegotiationTimeline {
            min_days: rules.min_days_between_rounds,
            max_days: rules.max_days_between_rounds,
        }
    }

    /// Simple interest on `principal` between two dates, rounded to
    /// paise. Zero when the period is empty or inverted.
    pub fn calculate_interest(
        &self,
        principal: f64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> f64 {
        let days = (end_date - start_date).num_days();
        if days <= 0 {
            return 0.0;
        }
        let annual_rate = self.config.msmed_act.interest.annual_rate;
        let years = days as f64 / 365.0;
        round2(principal * (annual_rate / 100.0) * years)
    }

    pub fn dispute_type_rules(&self, dispute_type: &str) -> Option<&DisputeTypeRules> {
        self.config.msmed_act.dispute_types.get(dispute_type)
    }
}

/// Loads the policy files and serves immutable snapshots of them.
///
/// Reload parses and validates into a fresh snapshot first and swaps it
/// in atomically; on any error the previous snapshot keeps serving.
pub struct PolicyEngine {
    paths: PolicyPaths,
    snapshot: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyEngine {
    pub fn load(paths: PolicyPaths, now: DateTime<Utc>) -> Result<PolicyEngine, PolicyError> {
        let snapshot = read_snapshot(&paths, now)?;
        log::info!(
            "Loaded policy version [{}] from [{}].",
            snapshot.version(),
            paths.policy_rules.display()
        );
        Ok(PolicyEngine {
            paths,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Re-reads both files. The active snapshot is replaced only after
    /// the new one parses and validates.
    pub fn reload(&self, now: DateTime<Utc>) -> Result<(), PolicyError> {
        let snapshot = read_snapshot(&self.paths, now)?;
        let version = snapshot.version().to_string();
        {
            let mut guard = self
                .snapshot
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Arc::new(snapshot);
        }
        log::info!("Reloaded policy configuration, now at version [{}].", version);
        Ok(())
    }

    /// Current snapshot. Callers keep the `Arc` for the whole operation
    /// so every rule they apply comes from the same policy version.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn paths(&self) -> &PolicyPaths {
        &self.paths
    }
}

fn read_snapshot(paths: &PolicyPaths, now: DateTime<Utc>) -> Result<PolicySnapshot, PolicyError> {
    let config: PolicyConfig = read_yaml(&paths.policy_rules)?;
    config.validate()?;
    let documents: MandatoryDocsConfig = read_yaml(&paths.mandatory_docs)?;
    Ok(PolicySnapshot {
        config,
        documents,
        loaded_at: now,
    })
}

fn read_yaml<T>(path: &Path) -> Result<T, PolicyError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            PolicyError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            PolicyError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    // An empty file means "all defaults", same as an empty mapping.
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&content).map_err(|source| PolicyError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::fs;
    use tempdir::TempDir;

    const POLICY_RULES: &str = r#"
version: "1.2.0"
msmed_act:
    eligibility:
        requires_msme_registration: true
        valid_registration_types:
            - "Udyam Registration"
            - "Udyog Aadhaar"
        minimum_dispute_amount: 1000.0
    timelines:
        max_days_from_invoice: 365
        min_payment_delay_days: 45
    interest:
        annual_rate: 18.0
        compounding: monthly
validation:
    hard_blocks:
        - missing_invoice
    soft_warnings:
        - slow_response
negotiation:
    min_settlement_percentage: 50.0
    max_settlement_percentage: 100.0
    max_negotiation_rounds: 5
    min_days_between_rounds: 3
    max_days_between_rounds: 30
"#;

    const MANDATORY_DOCS: &str = r#"
documents:
    common:
        mandatory:
            - name: invoice
            - name: msme_registration
    payment_delay:
        mandatory:
            - name: delivery_proof
        optional:
            - name: payment_reminder
              helpful_for: "Shows follow-up attempts"
"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn write_policies(dir: &TempDir, policy: &str, docs: &str) -> PolicyPaths {
        let paths = PolicyPaths::in_dir(dir.path());
        fs::write(&paths.policy_rules, policy).unwrap();
        fs::write(&paths.mandatory_docs, docs).unwrap();
        paths
    }

    fn engine(dir: &TempDir) -> PolicyEngine {
        let paths = write_policies(dir, POLICY_RULES, MANDATORY_DOCS);
        PolicyEngine::load(paths, now()).unwrap()
    }

    #[test]
    fn loads_and_serves_snapshot() {
        let dir = TempDir::new("policy").unwrap();
        let engine = engine(&dir);
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.version(), "1.2.0");
        assert_eq!(snapshot.loaded_at, now());
        assert_eq!(snapshot.max_negotiation_rounds(), 5);
        assert_eq!(
            snapshot.mandatory_documents("payment_delay"),
            vec!["invoice", "msme_registration", "delivery_proof"]
        );
        assert_eq!(snapshot.hard_block_rules(), ["missing_invoice".to_string()]);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = TempDir::new("policy").unwrap();
        let paths = PolicyPaths::in_dir(dir.path());

        let result = PolicyEngine::load(paths, now());
        assert!(matches!(result, Err(PolicyError::NotFound { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let dir = TempDir::new("policy").unwrap();
        let paths = write_policies(&dir, "negotiation: [not-a-mapping", MANDATORY_DOCS);

        let result = PolicyEngine::load(paths, now());
        assert!(matches!(result, Err(PolicyError::Parse { .. })));
    }

    #[test]
    fn empty_files_load_defaults() {
        let dir = TempDir::new("policy").unwrap();
        let paths = write_policies(&dir, "", "");
        let engine = PolicyEngine::load(paths, now()).unwrap();
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.version(), "1.0.0");
        assert_eq!(snapshot.max_negotiation_rounds(), 5);
        assert!(snapshot.mandatory_documents("payment_delay").is_empty());
    }

    #[test]
    fn reload_swaps_snapshot() {
        let dir = TempDir::new("policy").unwrap();
        let engine = engine(&dir);
        let before = engine.snapshot();

        let updated = POLICY_RULES.replace("\"1.2.0\"", "\"2.0.0\"");
        fs::write(&engine.paths().policy_rules, updated).unwrap();
        engine.reload(now() + Duration::hours(1)).unwrap();

        // The old snapshot stays usable for operations that hold it.
        assert_eq!(before.version(), "1.2.0");
        assert_eq!(engine.snapshot().version(), "2.0.0");
        assert_eq!(engine.snapshot().loaded_at, now() + Duration::hours(1));
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let dir = TempDir::new("policy").unwrap();
        let engine = engine(&dir);

        let broken = POLICY_RULES.replace("max_negotiation_rounds: 5", "max_negotiation_rounds: 0");
        fs::write(&engine.paths().policy_rules, broken).unwrap();

        assert!(matches!(
            engine.reload(now()),
            Err(PolicyError::Invalid(_))
        ));
        assert_eq!(engine.snapshot().version(), "1.2.0");
        assert_eq!(engine.snapshot().max_negotiation_rounds(), 5);
    }

    #[test]
    fn eligibility_passes_for_registered_msme() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();

        let verdict = snapshot.check_eligibility(10_000.0, true, Some("Udyam Registration"));
        assert!(verdict.eligible);
        assert!(verdict.errors.is_empty());
    }

    #[test]
    fn eligibility_collects_all_violations() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();

        let verdict = snapshot.check_eligibility(500.0, false, None);
        assert!(!verdict.eligible);
        assert_eq!(
            verdict.errors,
            vec![
                "MSME registration is required".to_string(),
                "Dispute amount must be at least ₹1000".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_registration_type_is_rejected() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();

        let verdict = snapshot.check_eligibility(10_000.0, true, Some("Shop Licence"));
        assert!(!verdict.eligible);
        assert_eq!(
            verdict.errors,
            vec!["Registration type must be one of: Udyam Registration, Udyog Aadhaar".to_string()]
        );
    }

    #[test]
    fn timeline_violations_are_reported() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();
        let today = now();

        // Filed in time, delay above the 45 day threshold.
        let verdict = snapshot.check_timeline(
            today - Duration::days(120),
            Some(today - Duration::days(90)),
            today,
        );
        assert!(verdict.eligible);

        // Invoice too old, delay too short.
        let verdict = snapshot.check_timeline(
            today - Duration::days(400),
            Some(today - Duration::days(10)),
            today,
        );
        assert!(!verdict.eligible);
        assert_eq!(verdict.errors.len(), 2);
    }

    #[test]
    fn merged_verdict_requires_both_to_pass() {
        let passing = EligibilityVerdict::from_errors(vec![]);
        let failing = EligibilityVerdict::from_errors(vec!["late".to_string()]);

        let merged = passing.merge(failing);
        assert!(!merged.eligible);
        assert_eq!(merged.errors, vec!["late".to_string()]);
    }

    #[test]
    fn interest_is_simple_and_rounded() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();
        let today = now();

        // One full year at 18%.
        let interest = snapshot.calculate_interest(10_000.0, today - Duration::days(365), today);
        assert_eq!(interest, 1800.0);

        // 120 days on 2.5 lakh: 250000 * 0.18 * 120/365.
        let interest = snapshot.calculate_interest(250_000.0, today - Duration::days(120), today);
        assert_eq!(interest, 14_794.52);

        // Interest never runs backwards.
        assert_eq!(
            snapshot.calculate_interest(10_000.0, today + Duration::days(30), today),
            0.0
        );
        assert_eq!(snapshot.calculate_interest(10_000.0, today, today), 0.0);
    }

    #[test]
    fn interest_grows_with_the_delay() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();
        let today = now();

        let mut previous = 0.0;
        for days in [0, 1, 30, 90, 180, 365, 730] {
            let interest =
                snapshot.calculate_interest(50_000.0, today - Duration::days(days), today);
            assert!(interest >= previous);
            previous = interest;
        }
    }

    #[test]
    fn settlement_range_follows_percentages() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();

        let range = snapshot.settlement_range(10_000.0);
        assert_eq!(range, SettlementRange { min: 5_000.0, max: 10_000.0 });
        assert!(range.contains(5_000.0));
        assert!(range.contains(10_000.0));
        assert!(!range.contains(4_999.99));
        assert_eq!(range.clamp(12_000.0), 10_000.0);
        assert_eq!(range.clamp(1_000.0), 5_000.0);
    }

    #[test]
    fn negotiation_timeline_comes_from_config() {
        let dir = TempDir::new("policy").unwrap();
        let snapshot = engine(&dir).snapshot();

        assert_eq!(
            snapshot.negotiation_timeline(),
            NegotiationTimeline { min_days: 3, max_days: 30 }
        );
    }
}
