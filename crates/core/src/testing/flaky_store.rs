//! Ticket store wrapper that can be switched off.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::ticket::{
    NewTicket, SqliteTicketStore, StoreError, ThreadId, Ticket, TicketFilter, TicketId,
    TicketStatus, TicketStore, UserKey,
};

/// In-memory SQLite store whose every call fails while `unavailable` is set.
pub struct FlakyTicketStore {
    inner: SqliteTicketStore,
    unavailable: AtomicBool,
}

impl FlakyTicketStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            inner: SqliteTicketStore::in_memory()?,
            unavailable: AtomicBool::new(false),
        })
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store switched off".to_string()));
        }
        Ok(())
    }
}

impl TicketStore for FlakyTicketStore {
    fn create(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        self.check()?;
        self.inner.create(ticket)
    }

    fn update_status(&self, id: TicketId, status: TicketStatus) -> Result<Ticket, StoreError> {
        self.check()?;
        self.inner.update_status(id, status)
    }

    fn assign_thread(&self, id: TicketId, thread_id: ThreadId) -> Result<Ticket, StoreError> {
        self.check()?;
        self.inner.assign_thread(id, thread_id)
    }

    fn find_open_by_user(&self, user: &UserKey) -> Result<Option<Ticket>, StoreError> {
        self.check()?;
        self.inner.find_open_by_user(user)
    }

    fn find_latest_by_user(&self, user: &UserKey) -> Result<Option<Ticket>, StoreError> {
        self.check()?;
        self.inner.find_latest_by_user(user)
    }

    fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        self.check()?;
        self.inner.find_by_id(id)
    }

    fn find_by_thread_id(&self, thread_id: ThreadId) -> Result<Option<Ticket>, StoreError> {
        self.check()?;
        self.inner.find_by_thread_id(thread_id)
    }

    fn close_all_open(&self) -> Result<Vec<Ticket>, StoreError> {
        self.check()?;
        self.inner.close_all_open()
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        self.check()?;
        self.inner.list(filter)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, StoreError> {
        self.check()?;
        self.inner.count(filter)
    }
}
