//! In-memory mirror of the ticket store, keyed by user.
//!
//! The store stays the source of truth. The index starts empty on every
//! process start and is filled lazily by the lifecycle engine after store
//! reads and confirmed store writes.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::ticket::{Ticket, TicketId, TicketStatus, UserKey};

/// One-shot notifications tracked per ticket so they are not sent twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    TicketOpened,
    TicketClosed,
    TicketReopened,
    UserBanned,
    UserUnbanned,
}

/// What the index knows about one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub ticket_id: TicketId,
    pub status: TicketStatus,
}

#[derive(Debug, Default)]
struct Slots {
    status: HashMap<UserKey, TicketStatus>,
    ticket_ids: HashMap<UserKey, TicketId>,
    delivered: HashMap<UserKey, HashSet<Notice>>,
}

/// Process-wide cache of per-user ticket state.
#[derive(Debug, Default)]
pub struct TicketIndex {
    slots: RwLock<Slots>,
}

impl TicketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state of a user's ticket.
    ///
    /// Moving a user to a different ticket id forgets the notices delivered
    /// for the previous one.
    pub async fn set(&self, user: &UserKey, ticket: &Ticket) {
        let mut slots = self.slots.write().await;
        let previous = slots.ticket_ids.insert(user.clone(), ticket.ticket_id);
        slots.status.insert(user.clone(), ticket.status);
        if previous != Some(ticket.ticket_id) {
            slots.delivered.remove(user);
        }
    }

    pub async fn get(&self, user: &UserKey) -> Option<IndexEntry> {
        let slots = self.slots.read().await;
        let ticket_id = *slots.ticket_ids.get(user)?;
        let status = *slots.status.get(user)?;
        Some(IndexEntry { ticket_id, status })
    }

    /// Record that `notice` went out for `ticket_id`.
    ///
    /// Returns true the first time. Returns false, and records nothing, when
    /// the notice was already recorded or `ticket_id` is not the user's
    /// current ticket in the index.
    pub async fn mark_delivered(
        &self,
        user: &UserKey,
        ticket_id: TicketId,
        notice: Notice,
    ) -> bool {
        let mut slots = self.slots.write().await;
        if slots.ticket_ids.get(user) != Some(&ticket_id) {
            return false;
        }
        slots
            .delivered
            .entry(user.clone())
            .or_default()
            .insert(notice)
    }

    pub async fn was_delivered(&self, user: &UserKey, notice: Notice) -> bool {
        let slots = self.slots.read().await;
        slots
            .delivered
            .get(user)
            .is_some_and(|set| set.contains(&notice))
    }

    /// Drop every slot of one user.
    pub async fn clear(&self, user: &UserKey) {
        let mut slots = self.slots.write().await;
        slots.status.remove(user);
        slots.ticket_ids.remove(user);
        slots.delivered.remove(user);
    }

    /// Drop every slot of every user.
    pub async fn clear_all(&self) {
        let mut slots = self.slots.write().await;
        slots.status.clear();
        slots.ticket_ids.clear();
        slots.delivered.clear();
    }

    /// Number of users with any slot populated.
    pub async fn len(&self) -> usize {
        let slots = self.slots.read().await;
        let mut users: HashSet<&UserKey> = slots.status.keys().collect();
        users.extend(slots.ticket_ids.keys());
        users.extend(slots.delivered.keys());
        users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
