use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AuditRecord;
use crate::ticket::{TicketId, UserKey};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit storage error: {0}")]
    Storage(String),

    #[error("Audit event could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Selects audit records. Results come back newest first.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub ticket: Option<TicketId>,
    pub user: Option<UserKey>,
    /// Matches any of the listed event types; empty matches all.
    pub event_types: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            ticket: None,
            user: None,
            event_types: Vec::new(),
            since: None,
            until: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded about one ticket.
    pub fn for_ticket(ticket: TicketId) -> Self {
        Self {
            ticket: Some(ticket),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: UserKey) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    pub fn between(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Append-only storage for audit records.
pub trait AuditStore: Send + Sync {
    /// Persist a batch atomically. Returns how many records were written.
    fn append(&self, records: &[AuditRecord]) -> Result<usize, AuditError>;

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    /// Number of records matching `filter`, ignoring its paging.
    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}
