use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use samadhaan_dispute_model::{Dispute, DisputeType, Document, Party};
use samadhaan_policy_engine::{Clock, FixedClock, PolicyEngine, PolicyPaths};

use crate::test_directory::test_assets_dir;

/// Instant every scripted negotiation starts at.
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at(start_instant()))
}

/// Copies the default policy assets into `dir` so a test can edit them
/// and trigger reloads without touching the checked-in files.
pub fn copy_policy_assets(dir: &Path) -> anyhow::Result<PolicyPaths> {
    copy_assets(dir, "policy_rules.yaml")
}

/// Strict-policy variant for negative tests.
pub fn copy_strict_policy_assets(dir: &Path) -> anyhow::Result<PolicyPaths> {
    copy_assets(dir, "strict_policy.yaml")
}

fn copy_assets(dir: &Path, rules_asset: &str) -> anyhow::Result<PolicyPaths> {
    let assets = test_assets_dir();
    let paths = PolicyPaths::in_dir(dir);
    fs::copy(assets.join(rules_asset), &paths.policy_rules)
        .with_context(|| format!("Copying {} into {}", rules_asset, dir.display()))?;
    fs::copy(assets.join("mandatory_docs.yaml"), &paths.mandatory_docs)
        .with_context(|| format!("Copying mandatory_docs.yaml into {}", dir.display()))?;
    Ok(paths)
}

/// Engine loaded straight from the checked-in assets, for tests that
/// never reload.
pub fn test_policy_engine(clock: &dyn Clock) -> anyhow::Result<Arc<PolicyEngine>> {
    let paths = PolicyPaths::in_dir(test_assets_dir());
    Ok(Arc::new(PolicyEngine::load(paths, clock.now())?))
}

/// Payment-delay dispute with the given amount and delay. The invoice
/// predates the due date by 30 days; documents are already verified.
pub fn dispute_with(
    amount: f64,
    days_delayed: u32,
    now: DateTime<Utc>,
) -> anyhow::Result<Dispute> {
    let due_date = now - Duration::days(i64::from(days_delayed));
    let invoice_date = due_date - Duration::days(30);
    let dispute = Dispute::draft(now)
        .with_id("dispute-1")
        .with_type(DisputeType::PaymentDelay)
        .with_parties(
            Party::msme("Acme Fabricators Pvt Ltd")
                .with_registration("UDYAM-MH-01-0001234", "Udyam Registration"),
            Party::buyer("BigCorp Industries Ltd"),
        )
        .with_amounts(amount, amount)?
        .with_invoice("INV-2024-0042", invoice_date, due_date)
        .with_delay(days_delayed)
        .with_document(Document::verified("invoice", "uploads/invoice.pdf").mandatory())
        .with_document(Document::verified("msme_registration", "uploads/udyam.pdf").mandatory())
        .with_document(Document::verified("delivery_proof", "uploads/challan.pdf").mandatory())
        .with_description("Payment pending for delivered goods");
    Ok(dispute)
}

/// The 250 000 / 120-day reference case: strong delay, accrued
/// interest, complete documents.
pub fn sample_dispute(now: DateTime<Utc>) -> anyhow::Result<Dispute> {
    Ok(dispute_with(250_000.0, 120, now)?.with_id("dispute-acme-001"))
}
