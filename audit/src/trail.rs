use serde_json::json;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::explain::ExplainabilityArtifact;
use crate::record::{AuditLevel, AuditRecord};

/// Shared, append-only audit sink. Clones hand the same trail to every
/// component; records are never updated or removed once appended.
#[derive(Clone, Debug, Default)]
pub struct AuditTrail(Arc<Mutex<Trail>>);

#[derive(Debug, Default)]
struct Trail {
    records: Vec<AuditRecord>,
    artifacts: Vec<ExplainabilityArtifact>,
}

impl AuditTrail {
    pub fn new() -> AuditTrail {
        AuditTrail::default()
    }

    pub fn record(&self, record: AuditRecord) {
        match record.level {
            AuditLevel::Info => log::info!("[audit] {}: {}", record.action, record.description),
            AuditLevel::Warning => {
                log::warn!("[audit] {}: {}", record.action, record.description)
            }
            AuditLevel::Error | AuditLevel::Critical => {
                log::error!("[audit] {}: {}", record.action, record.description)
            }
        }
        self.lock().records.push(record);
    }

    pub fn explain(&self, artifact: ExplainabilityArtifact) {
        self.lock().artifacts.push(artifact);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().records.clone()
    }

    pub fn artifacts(&self) -> Vec<ExplainabilityArtifact> {
        self.lock().artifacts.clone()
    }

    pub fn for_dispute(&self, dispute_id: &str) -> Vec<AuditRecord> {
        self.lock()
            .records
            .iter()
            .filter(|record| record.dispute_id.as_deref() == Some(dispute_id))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    fn lock(&self) -> MutexGuard<'_, Trail> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Display for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trail = self.lock();
        let dump = json!({
            "records": &trail.records,
            "artifacts": &trail.artifacts,
        });
        let pretty = serde_json::to_string_pretty(&dump).map_err(|_| fmt::Error)?;
        write!(f, "{}", pretty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditAction;
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn clones_share_one_trail() {
        let trail = AuditTrail::new();
        let shared = trail.clone();

        shared.record(AuditRecord::new(
            AuditAction::DisputeCreated,
            "Dispute opened",
            now(),
        ));

        assert_eq!(trail.len(), 1);
        assert_eq!(trail.records()[0].action, AuditAction::DisputeCreated);
    }

    #[test]
    fn filters_by_dispute() {
        let trail = AuditTrail::new();
        trail.record(
            AuditRecord::new(AuditAction::OfferCreated, "Offer A", now()).on_dispute("dispute-1"),
        );
        trail.record(
            AuditRecord::new(AuditAction::OfferCreated, "Offer B", now()).on_dispute("dispute-2"),
        );

        let filtered = trail.for_dispute("dispute-1");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].description, "Offer A");
    }

    #[test]
    fn display_dumps_records_and_artifacts() {
        let trail = AuditTrail::new();
        trail.record(AuditRecord::new(
            AuditAction::SettlementReached,
            "Settled",
            now(),
        ));

        let dump = trail.to_string();
        assert!(dump.contains("settlement_reached"));
        assert!(dump.contains("artifacts"));
    }
}
