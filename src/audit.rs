use serde_json::Value;
use uuid::Uuid;

use crate::stores::{AuditEntry, AuditLog};

/// Records an audit entry. Failures are logged and never reach the caller.
pub async fn log_audit(
    audit: &dyn AuditLog,
    user_id: Option<Uuid>,
    action: &'static str,
    resource: Option<&'static str>,
    metadata: Option<Value>,
) {
    let entry = AuditEntry {
        user_id,
        action,
        resource,
        metadata,
    };
    if let Err(err) = audit.record(entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
