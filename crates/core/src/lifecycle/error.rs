use thiserror::Error;

use crate::threads::ThreadApiError;
use crate::ticket::{StoreError, TicketId, TicketStatus};

/// Failure of a single lifecycle operation.
///
/// None of these are fatal to the process; each is scoped to the event that
/// triggered it.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Nothing matched the lookup.
    #[error("Ticket not found: {0}")]
    NotFound(String),

    /// The state machine does not allow the requested move.
    #[error("Cannot {operation} ticket {ticket_id}: current status is {current}")]
    InvalidTransition {
        ticket_id: TicketId,
        current: TicketStatus,
        operation: &'static str,
    },

    /// The store did not confirm the write; nothing was changed in memory.
    #[error("Ticket store unavailable: {0}")]
    StoreUnavailable(String),

    /// The staff thread could not be updated. The ticket status stands.
    #[error("Thread {operation} failed for ticket {ticket_id}: {source}")]
    ThreadSyncFailed {
        ticket_id: TicketId,
        operation: &'static str,
        #[source]
        source: ThreadApiError,
    },
}

impl LifecycleError {
    /// Short machine-readable kind, used for metric labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::NotFound(_) => "not_found",
            LifecycleError::InvalidTransition { .. } => "invalid_transition",
            LifecycleError::StoreUnavailable(_) => "store_unavailable",
            LifecycleError::ThreadSyncFailed { .. } => "thread_sync_failed",
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Missing(id) => LifecycleError::NotFound(format!("ticket {}", id)),
            other => LifecycleError::StoreUnavailable(other.to_string()),
        }
    }
}
