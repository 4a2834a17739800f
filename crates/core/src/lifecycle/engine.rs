use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::quotation::QuotationStatus;
use crate::errors::DomainError;
use crate::lifecycle::states::{QuotationAction, TransitionOutcome};

/// Stateless guard over the quotation status table.
#[derive(Clone, Debug, Default)]
pub struct LifecycleEngine;

impl LifecycleEngine {
    pub fn initial_state(&self) -> QuotationStatus {
        QuotationStatus::Draft
    }

    pub fn transition(
        &self,
        current: QuotationStatus,
        requested: QuotationStatus,
    ) -> Result<TransitionOutcome, DomainError> {
        if !current.can_transition_to(requested) {
            return Err(DomainError::InvalidTransition { from: current, to: requested });
        }
        Ok(TransitionOutcome { from: current, to: requested, terminal: requested.is_terminal() })
    }

    pub fn ensure_permitted(
        &self,
        status: QuotationStatus,
        action: QuotationAction,
    ) -> Result<(), DomainError> {
        if action.permitted_in(status) {
            return Ok(());
        }
        Err(DomainError::NotPermittedInState { status, action })
    }

    pub fn apply_with_audit<S>(
        &self,
        current: QuotationStatus,
        requested: QuotationStatus,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, DomainError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.transition(current, requested);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    audit
                        .event(
                            "lifecycle.transition_applied",
                            AuditCategory::Lifecycle,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", outcome.from.as_str())
                        .with_metadata("to", outcome.to.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event(
                            "lifecycle.transition_rejected",
                            AuditCategory::Lifecycle,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("requested", requested.as_str())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}
