//! Ticket storage trait and types.

use thiserror::Error;

use crate::ticket::{Messenger, ThreadId, Ticket, TicketId, TicketStatus, UserKey};

/// Error type for ticket store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not commit or answer the request.
    #[error("Ticket store unavailable: {0}")]
    Unavailable(String),

    /// The record addressed by the write does not exist.
    #[error("Ticket not found: {0}")]
    Missing(TicketId),

    /// The ticket already has a different thread attached.
    #[error("Ticket {ticket_id} already has thread {existing}")]
    ThreadAlreadyAssigned {
        ticket_id: TicketId,
        existing: ThreadId,
    },
}

/// Request to create a new ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user: UserKey,
    pub category: String,
    pub thread_id: Option<ThreadId>,
}

impl NewTicket {
    pub fn new(user: UserKey, category: impl Into<String>) -> Self {
        Self {
            user,
            category: category.into(),
            thread_id: None,
        }
    }
}

/// Filter for listing tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub messenger: Option<Messenger>,
    pub category: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_messenger(mut self, messenger: Messenger) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Durable keyed storage of ticket records.
///
/// Every call is atomic on its own. Callers serialize per-user sequences of
/// calls; the store does not.
pub trait TicketStore: Send + Sync {
    /// Insert a new ticket with status `open` and a freshly assigned id.
    fn create(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;

    /// Change a ticket's status.
    fn update_status(&self, id: TicketId, status: TicketStatus) -> Result<Ticket, StoreError>;

    /// Attach a thread to a ticket that has none yet.
    fn assign_thread(&self, id: TicketId, thread_id: ThreadId) -> Result<Ticket, StoreError>;

    /// The open ticket of a user, if any.
    fn find_open_by_user(&self, user: &UserKey) -> Result<Option<Ticket>, StoreError>;

    /// The most recent ticket of a user regardless of status.
    fn find_latest_by_user(&self, user: &UserKey) -> Result<Option<Ticket>, StoreError>;

    fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, StoreError>;

    fn find_by_thread_id(&self, thread_id: ThreadId) -> Result<Option<Ticket>, StoreError>;

    /// Close every open ticket in one batch and return the closed records.
    fn close_all_open(&self) -> Result<Vec<Ticket>, StoreError>;

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError>;

    fn count(&self, filter: &TicketFilter) -> Result<i64, StoreError>;
}
