mod explain;
mod record;
mod trail;

pub use explain::{DecisionType, ExplainabilityArtifact};
pub use record::{AuditAction, AuditError, AuditLevel, AuditRecord};
pub use trail::AuditTrail;
