use quoteworks_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use tracing::{error, info, warn};

/// Forwards audit events to the `tracing` pipeline under the `audit` target.
#[derive(Clone, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let quotation_id =
            event.quotation_id.map(|id| id.to_string()).unwrap_or_else(|| "unknown".to_string());
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();

        match event.outcome {
            AuditOutcome::Success => info!(
                target: "audit",
                event_name = %event.event_type,
                event_id = %event.event_id,
                category = event.category.as_str(),
                correlation_id = %event.correlation_id,
                quotation_id = %quotation_id,
                actor_id = %event.actor,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Rejected => warn!(
                target: "audit",
                event_name = %event.event_type,
                event_id = %event.event_id,
                category = event.category.as_str(),
                correlation_id = %event.correlation_id,
                quotation_id = %quotation_id,
                actor_id = %event.actor,
                metadata = %metadata,
                "audit event rejected"
            ),
            AuditOutcome::Failed => error!(
                target: "audit",
                event_name = %event.event_type,
                event_id = %event.event_id,
                category = event.category.as_str(),
                correlation_id = %event.correlation_id,
                quotation_id = %quotation_id,
                actor_id = %event.actor,
                metadata = %metadata,
                "audit event failed"
            ),
        }
    }
}
