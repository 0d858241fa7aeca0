//! Mirrors ticket lifecycle transitions onto staff-chat threads.
//!
//! Thread state is cosmetic. The synchronizer runs after a transition has
//! been committed to the store and never rolls it back; failures are logged,
//! audited and returned to the caller for reporting only.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::StaffConfig;
use crate::lifecycle::LifecycleError;
use crate::metrics::{THREAD_SYNC_DURATION, THREAD_SYNC_TOTAL};
use crate::ticket::{ThreadId, Ticket};

use super::{ThreadApi, ThreadApiError};

#[derive(Debug, Clone, Copy)]
enum ThreadOp {
    Open,
    Close,
    Reopen,
}

impl ThreadOp {
    fn as_str(&self) -> &'static str {
        match self {
            ThreadOp::Open => "open",
            ThreadOp::Close => "close",
            ThreadOp::Reopen => "reopen",
        }
    }
}

/// Keeps staff threads open or closed in step with ticket status.
pub struct ThreadSynchronizer {
    api: Option<Arc<dyn ThreadApi>>,
    staff: StaffConfig,
    audit: Option<AuditHandle>,
}

impl ThreadSynchronizer {
    pub fn new(api: Option<Arc<dyn ThreadApi>>, staff: StaffConfig) -> Self {
        Self {
            api,
            staff,
            audit: None,
        }
    }

    /// Synchronizer for staff chats without threads.
    pub fn disabled() -> Self {
        Self::new(None, StaffConfig::default())
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// True when the staff chat uses threads and an API is configured.
    pub fn enabled(&self) -> bool {
        self.staff.threads && self.api.is_some()
    }

    fn api(&self) -> Option<&Arc<dyn ThreadApi>> {
        if self.staff.threads {
            self.api.as_ref()
        } else {
            None
        }
    }

    /// Create a thread for a freshly opened ticket.
    ///
    /// Returns `Ok(None)` when threads are disabled.
    pub async fn open_thread(
        &self,
        ticket: &Ticket,
        name: &str,
    ) -> Result<Option<ThreadId>, LifecycleError> {
        let Some(api) = self.api() else {
            return Ok(None);
        };

        let started = Instant::now();
        let result = api.open_group(self.staff.chat_id, name).await;
        self.record(api.as_ref(), ThreadOp::Open, started, result.is_ok());

        match result {
            Ok(thread_id) => {
                debug!(
                    "Opened thread {} for ticket {}",
                    thread_id, ticket.ticket_id
                );
                Ok(Some(thread_id))
            }
            Err(e) => Err(self.failed(ticket, ThreadOp::Open, e)),
        }
    }

    /// Close the ticket's thread after the ticket was closed or banned.
    pub async fn on_close(&self, ticket: &Ticket) -> Result<(), LifecycleError> {
        self.apply(ticket, ThreadOp::Close).await
    }

    /// Reopen the ticket's thread after the ticket was reopened.
    pub async fn on_reopen(&self, ticket: &Ticket) -> Result<(), LifecycleError> {
        self.apply(ticket, ThreadOp::Reopen).await
    }

    async fn apply(&self, ticket: &Ticket, op: ThreadOp) -> Result<(), LifecycleError> {
        let (Some(api), Some(thread_id)) = (self.api(), ticket.thread_id) else {
            return Ok(());
        };

        let started = Instant::now();
        let result = match op {
            ThreadOp::Close => api.close_group(self.staff.chat_id, thread_id).await,
            ThreadOp::Reopen => api.reopen_group(self.staff.chat_id, thread_id).await,
            ThreadOp::Open => return Ok(()),
        };
        self.record(api.as_ref(), op, started, result.is_ok());

        result.map_err(|e| self.failed(ticket, op, e))
    }

    fn record(&self, api: &dyn ThreadApi, op: ThreadOp, started: Instant, ok: bool) {
        let status = if ok { "success" } else { "error" };
        THREAD_SYNC_TOTAL
            .with_label_values(&[api.backend_name(), op.as_str(), status])
            .inc();
        THREAD_SYNC_DURATION
            .with_label_values(&[api.backend_name(), op.as_str()])
            .observe(started.elapsed().as_secs_f64());
    }

    fn failed(&self, ticket: &Ticket, op: ThreadOp, error: ThreadApiError) -> LifecycleError {
        warn!(
            "Thread {} failed for ticket {} (thread {:?}): {}",
            op.as_str(),
            ticket.ticket_id,
            ticket.thread_id,
            error
        );

        if let Some(ref audit) = self.audit {
            audit.try_emit(AuditEvent::ThreadSyncFailed {
                ticket_id: ticket.ticket_id.get(),
                thread_id: ticket.thread_id.map(|t| t.0),
                operation: op.as_str().to_string(),
                error: error.to_string(),
            });
        }

        LifecycleError::ThreadSyncFailed {
            ticket_id: ticket.ticket_id,
            operation: op.as_str(),
            source: error,
        }
    }
}
