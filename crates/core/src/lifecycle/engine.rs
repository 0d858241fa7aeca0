//! Serialized ticket state transitions.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::index::{Notice, TicketIndex};
use crate::metrics::{BULK_CLOSED_TICKETS, TRANSITIONS_TOTAL};
use crate::threads::ThreadSynchronizer;
use crate::ticket::{
    NewTicket, ThreadId, Ticket, TicketCodec, TicketId, TicketStatus, TicketStore, UserKey,
};

use super::locks::KeyedLocks;
use super::transition::{Operation, Step};
use super::LifecycleError;

/// Outcome of a lifecycle operation that succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Ticket as stored after the operation.
    pub ticket: Ticket,
    /// Status before the operation.
    pub previous: TicketStatus,
    /// False when the ticket already was in the target state.
    pub changed: bool,
    /// False when the staff thread could not be brought in line with the
    /// ticket. The failure is already logged and audited.
    pub thread_synced: bool,
}

/// Owns every ticket status change.
///
/// Operations on one user run one at a time; operations on different users
/// run concurrently. `close_all` excludes all of them while it sweeps.
/// Thread synchronization happens after the store write and after locks are
/// released, so a slow thread API never holds up other users.
pub struct LifecycleEngine {
    store: Arc<dyn TicketStore>,
    index: Arc<TicketIndex>,
    threads: Arc<ThreadSynchronizer>,
    codec: TicketCodec,
    audit: Option<AuditHandle>,
    locks: KeyedLocks<UserKey>,
    sweep: RwLock<()>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn TicketStore>,
        index: Arc<TicketIndex>,
        threads: Arc<ThreadSynchronizer>,
        codec: TicketCodec,
    ) -> Self {
        Self {
            store,
            index,
            threads,
            codec,
            audit: None,
            locks: KeyedLocks::new(),
            sweep: RwLock::new(()),
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn codec(&self) -> &TicketCodec {
        &self.codec
    }

    pub fn index(&self) -> &Arc<TicketIndex> {
        &self.index
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    pub fn threads(&self) -> &Arc<ThreadSynchronizer> {
        &self.threads
    }

    /// Return the user's open ticket, creating one if there is none.
    ///
    /// The returned transition has `changed == true` only when a ticket was
    /// created. Banned users cannot open tickets.
    pub async fn open(&self, user: &UserKey, category: &str) -> Result<Transition, LifecycleError> {
        let (transition, _) = self.open_noting(user, category, None).await?;
        Ok(transition)
    }

    /// `open`, then record `notice` as delivered for the resulting ticket.
    ///
    /// The flag is taken while the user's lock is still held, so it always
    /// belongs to the ticket that was returned. The bool is true the first
    /// time `notice` is recorded for that ticket.
    pub async fn open_with_notice(
        &self,
        user: &UserKey,
        category: &str,
        notice: Notice,
    ) -> Result<(Transition, bool), LifecycleError> {
        self.open_noting(user, category, Some(notice)).await
    }

    async fn open_noting(
        &self,
        user: &UserKey,
        category: &str,
        notice: Option<Notice>,
    ) -> Result<(Transition, bool), LifecycleError> {
        let result = self.open_locked(user, category, notice).await;
        record("open", result.as_ref().map(|(t, _)| t));
        let (transition, first_notice) = result?;

        if !transition.changed || !self.threads.enabled() {
            return Ok((transition, first_notice));
        }

        let (ticket, thread_synced) = self.attach_thread(transition.ticket).await;
        let transition = Transition {
            ticket,
            thread_synced,
            ..transition
        };
        Ok((transition, first_notice))
    }

    async fn open_locked(
        &self,
        user: &UserKey,
        category: &str,
        notice: Option<Notice>,
    ) -> Result<(Transition, bool), LifecycleError> {
        let _sweep = self.sweep.read().await;
        let _user = self.locks.lock(user).await;

        if let Some(open) = self.store.find_open_by_user(user)? {
            self.index.set(user, &open).await;
            let first_notice = self.note(user, &open, notice).await;
            return Ok((
                Transition {
                    previous: open.status,
                    ticket: open,
                    changed: false,
                    thread_synced: true,
                },
                first_notice,
            ));
        }

        let previous = match self.store.find_latest_by_user(user)? {
            Some(latest) if latest.status.is_banned() => {
                return Err(LifecycleError::InvalidTransition {
                    ticket_id: latest.ticket_id,
                    current: latest.status,
                    operation: "open",
                });
            }
            Some(latest) => latest.status,
            None => TicketStatus::Closed,
        };

        let ticket = self.store.create(NewTicket::new(user.clone(), category))?;
        self.index.set(user, &ticket).await;
        let first_notice = self.note(user, &ticket, notice).await;

        info!(
            "Opened ticket {} for {} (category {:?})",
            ticket.ticket_id, user, ticket.category
        );
        self.emit(AuditEvent::TicketOpened {
            ticket_id: ticket.ticket_id.get(),
            user: user.storage_key(),
            category: ticket.category.clone(),
        });

        Ok((
            Transition {
                ticket,
                previous,
                changed: true,
                thread_synced: true,
            },
            first_notice,
        ))
    }

    async fn note(&self, user: &UserKey, ticket: &Ticket, notice: Option<Notice>) -> bool {
        match notice {
            Some(notice) => {
                self.index
                    .mark_delivered(user, ticket.ticket_id, notice)
                    .await
            }
            None => false,
        }
    }

    /// Create the staff thread for a new ticket and persist its id.
    ///
    /// Failures leave the ticket without a thread; they were already logged
    /// and audited by the synchronizer. The bool is false in that case.
    async fn attach_thread(&self, ticket: Ticket) -> (Ticket, bool) {
        let name = self.codec.reference(ticket.ticket_id);
        let thread_id = match self.threads.open_thread(&ticket, &name).await {
            Ok(Some(thread_id)) => thread_id,
            Ok(None) => return (ticket, true),
            Err(_) => return (ticket, false),
        };

        let assigned = {
            let _sweep = self.sweep.read().await;
            let _user = self.locks.lock(&ticket.user).await;
            self.assign_thread(&ticket, thread_id).await
        };

        let Some(updated) = assigned else {
            return (ticket, false);
        };

        // Closed or banned while the thread was being created.
        let synced = updated.is_open() || self.threads.on_close(&updated).await.is_ok();
        (updated, synced)
    }

    async fn assign_thread(&self, ticket: &Ticket, thread_id: ThreadId) -> Option<Ticket> {
        match self.store.assign_thread(ticket.ticket_id, thread_id) {
            Ok(updated) => {
                if updated.is_open() {
                    self.index.set(&updated.user, &updated).await;
                }
                debug!("Attached thread {} to ticket {}", thread_id, updated.ticket_id);
                self.emit(AuditEvent::ThreadAttached {
                    ticket_id: updated.ticket_id.get(),
                    thread_id: thread_id.0,
                });
                Some(updated)
            }
            Err(e) => {
                warn!(
                    "Failed to attach thread {} to ticket {}: {}",
                    thread_id, ticket.ticket_id, e
                );
                None
            }
        }
    }

    /// Close the user's latest ticket.
    pub async fn close(&self, user: &UserKey) -> Result<Transition, LifecycleError> {
        self.apply(user, None, Operation::Close).await
    }

    /// Reopen the user's latest ticket under the same id.
    pub async fn reopen(&self, user: &UserKey) -> Result<Transition, LifecycleError> {
        self.apply(user, None, Operation::Reopen).await
    }

    /// Ban the user. An open ticket is closed on the staff side as well.
    pub async fn ban(&self, user: &UserKey) -> Result<Transition, LifecycleError> {
        self.apply(user, None, Operation::Ban).await
    }

    /// Lift a ban. The ticket ends up closed, never open.
    pub async fn unban(&self, user: &UserKey) -> Result<Transition, LifecycleError> {
        self.apply(user, None, Operation::Unban).await
    }

    /// Apply `op` to a specific ticket rather than the user's latest one.
    ///
    /// Only the latest ticket of a user can change status. Closing a
    /// superseded ticket is a no-op, anything else on it is rejected.
    pub async fn apply_to(
        &self,
        ticket: &Ticket,
        op: Operation,
    ) -> Result<Transition, LifecycleError> {
        self.apply(&ticket.user, Some(ticket.ticket_id), op).await
    }

    async fn apply(
        &self,
        user: &UserKey,
        target: Option<TicketId>,
        op: Operation,
    ) -> Result<Transition, LifecycleError> {
        let result = self.apply_locked(user, target, op).await;
        record(op.as_str(), result.as_ref());
        let mut transition = result?;

        let closes_thread = match op {
            Operation::Close => transition.changed,
            Operation::Ban => transition.previous.is_open(),
            Operation::Reopen | Operation::Unban => false,
        };
        let synced = if closes_thread {
            self.threads.on_close(&transition.ticket).await
        } else if op == Operation::Reopen && transition.changed {
            self.threads.on_reopen(&transition.ticket).await
        } else {
            Ok(())
        };
        transition.thread_synced = synced.is_ok();

        Ok(transition)
    }

    async fn apply_locked(
        &self,
        user: &UserKey,
        target: Option<TicketId>,
        op: Operation,
    ) -> Result<Transition, LifecycleError> {
        let _sweep = self.sweep.read().await;
        let _user = self.locks.lock(user).await;

        let latest = self
            .store
            .find_latest_by_user(user)?
            .ok_or_else(|| LifecycleError::NotFound(format!("no ticket for user {}", user)))?;

        let current = match target {
            Some(id) if id != latest.ticket_id => {
                return self.apply_superseded(user, id, op);
            }
            _ => latest,
        };
        let previous = current.status;

        let (ticket, changed) = match op.step(previous) {
            Step::Rejected => {
                debug!(
                    "Rejected {} of ticket {} in status {}",
                    op.as_str(),
                    current.ticket_id,
                    previous
                );
                return Err(LifecycleError::InvalidTransition {
                    ticket_id: current.ticket_id,
                    current: previous,
                    operation: op.as_str(),
                });
            }
            Step::Unchanged => (current, false),
            Step::MoveTo(status) => {
                let updated = self.store.update_status(current.ticket_id, status)?;
                info!(
                    "Ticket {} of {}: {} -> {} ({})",
                    updated.ticket_id,
                    user,
                    previous,
                    status,
                    op.as_str()
                );
                self.emit(AuditEvent::TicketStatusChanged {
                    ticket_id: updated.ticket_id.get(),
                    user: user.storage_key(),
                    operation: op.as_str().to_string(),
                    from_status: previous.to_string(),
                    to_status: status.to_string(),
                });
                (updated, true)
            }
        };

        if ticket.is_open() {
            self.index.set(user, &ticket).await;
        } else {
            self.index.clear(user).await;
        }

        Ok(Transition {
            ticket,
            previous,
            changed,
            thread_synced: true,
        })
    }

    /// A ticket that is not the user's latest one is never open.
    fn apply_superseded(
        &self,
        user: &UserKey,
        id: TicketId,
        op: Operation,
    ) -> Result<Transition, LifecycleError> {
        let ticket = self
            .store
            .find_by_id(id)?
            .filter(|t| &t.user == user)
            .ok_or_else(|| LifecycleError::NotFound(format!("ticket {}", id)))?;

        match (op, ticket.status) {
            (Operation::Close, TicketStatus::Closed) => Ok(Transition {
                previous: ticket.status,
                ticket,
                changed: false,
                thread_synced: true,
            }),
            (_, status) => Err(LifecycleError::InvalidTransition {
                ticket_id: id,
                current: status,
                operation: op.as_str(),
            }),
        }
    }

    /// Close every open ticket in one sweep.
    ///
    /// Waits for in-flight single-user operations and blocks new ones until
    /// the sweep is committed. Returns the number of tickets closed.
    pub async fn close_all(&self) -> Result<usize, LifecycleError> {
        let closed = {
            let _sweep = self.sweep.write().await;
            match self.store.close_all_open() {
                Ok(closed) => {
                    self.index.clear_all().await;
                    closed
                }
                Err(e) => {
                    let err = LifecycleError::from(e);
                    TRANSITIONS_TOTAL
                        .with_label_values(&["close_all", err.kind()])
                        .inc();
                    return Err(err);
                }
            }
        };

        TRANSITIONS_TOTAL
            .with_label_values(&["close_all", "applied"])
            .inc();
        BULK_CLOSED_TICKETS
            .with_label_values(&[])
            .observe(closed.len() as f64);
        info!("Closed {} open tickets", closed.len());
        self.emit(AuditEvent::TicketsBulkClosed {
            count: closed.len(),
            ticket_ids: closed.iter().map(|t| t.ticket_id.get()).collect(),
        });

        let mut failed = 0;
        for ticket in &closed {
            if self.threads.on_close(ticket).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!("{} of {} threads left open after close-all", failed, closed.len());
        }

        Ok(closed.len())
    }

    /// Look a ticket up by id, optionally requiring a category.
    pub async fn find_by_id(
        &self,
        id: TicketId,
        category: Option<&str>,
    ) -> Result<Ticket, LifecycleError> {
        let ticket = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("ticket {}", id)))?;

        match category {
            Some(category) if ticket.category != category => Err(LifecycleError::NotFound(
                format!("ticket {} in category {:?}", id, category),
            )),
            _ => Ok(ticket),
        }
    }

    /// The user's current ticket.
    ///
    /// Served from the index when it has an entry, from the store otherwise.
    pub async fn find_by_user_id(&self, user: &UserKey) -> Result<Ticket, LifecycleError> {
        if let Some(entry) = self.index.get(user).await {
            if let Some(ticket) = self.store.find_by_id(entry.ticket_id)? {
                return Ok(ticket);
            }
        }

        let ticket = self
            .store
            .find_latest_by_user(user)?
            .ok_or_else(|| LifecycleError::NotFound(format!("no ticket for user {}", user)))?;
        if ticket.is_open() {
            self.index.set(user, &ticket).await;
        }
        Ok(ticket)
    }

    pub async fn find_by_thread_id(&self, thread_id: ThreadId) -> Result<Ticket, LifecycleError> {
        self.store
            .find_by_thread_id(thread_id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("ticket for thread {}", thread_id)))
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }
}

fn record(operation: &str, result: Result<&Transition, &LifecycleError>) {
    let outcome = match result {
        Ok(t) if t.changed => "applied",
        Ok(_) => "unchanged",
        Err(e) => e.kind(),
    };
    TRANSITIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Notice;
    use crate::testing::{fixtures, TestDesk, ThreadCall, TEST_STAFF_CHAT};
    use crate::ticket::TicketFilter;

    fn open_count(desk: &TestDesk) -> i64 {
        desk.store
            .count(&TicketFilter::new().with_status(TicketStatus::Open))
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_then_returns_existing() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");

        let first = desk.engine.open(&user, "").await.unwrap();
        assert!(first.changed);
        assert_eq!(first.ticket.ticket_id, TicketId(1));
        assert_eq!(first.ticket.status, TicketStatus::Open);

        let second = desk.engine.open(&user, "").await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.ticket.ticket_id, TicketId(1));

        let entry = desk.index.get(&user).await.unwrap();
        assert_eq!(entry.ticket_id, TicketId(1));
        assert_eq!(entry.status, TicketStatus::Open);
    }

    #[tokio::test]
    async fn test_open_after_close_gets_fresh_id() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");

        desk.engine.open(&user, "").await.unwrap();
        desk.engine.close(&user).await.unwrap();
        let next = desk.engine.open(&user, "").await.unwrap();

        assert_eq!(next.ticket.ticket_id, TicketId(2));
        assert_eq!(next.previous, TicketStatus::Closed);
    }

    #[tokio::test]
    async fn test_banned_user_cannot_open() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");

        desk.engine.open(&user, "").await.unwrap();
        desk.engine.ban(&user).await.unwrap();

        let result = desk.engine.open(&user, "").await;
        assert!(matches!(
            result,
            Err(LifecycleError::InvalidTransition {
                operation: "open",
                current: TicketStatus::Banned,
                ..
            })
        ));
        assert_eq!(open_count(&desk), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_clears_index() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");

        desk.engine.open(&user, "").await.unwrap();
        let closed = desk.engine.close(&user).await.unwrap();
        assert!(closed.changed);
        assert_eq!(closed.ticket.status, TicketStatus::Closed);
        assert!(desk.index.get(&user).await.is_none());

        let again = desk.engine.close(&user).await.unwrap();
        assert!(!again.changed);
        assert_eq!(again.ticket.ticket_id, closed.ticket.ticket_id);
    }

    #[tokio::test]
    async fn test_close_without_ticket_is_not_found() {
        let desk = TestDesk::plain();
        let result = desk.engine.close(&fixtures::web_user("nobody")).await;
        assert!(matches!(result, Err(LifecycleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_close_then_reopen_keeps_id() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");

        let opened = desk.engine.open(&user, "").await.unwrap();
        desk.engine.close(&user).await.unwrap();
        let reopened = desk.engine.reopen(&user).await.unwrap();

        assert!(reopened.changed);
        assert_eq!(reopened.ticket.ticket_id, opened.ticket.ticket_id);
        assert_eq!(reopened.ticket.status, TicketStatus::Open);
        assert_eq!(
            desk.index.get(&user).await.map(|e| e.status),
            Some(TicketStatus::Open)
        );
    }

    #[tokio::test]
    async fn test_ban_blocks_reopen_until_unban() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");
        desk.engine.open(&user, "").await.unwrap();

        let banned = desk.engine.ban(&user).await.unwrap();
        assert_eq!(banned.ticket.status, TicketStatus::Banned);
        assert!(desk.index.get(&user).await.is_none());

        assert!(matches!(
            desk.engine.reopen(&user).await,
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            desk.engine.ban(&user).await,
            Err(LifecycleError::InvalidTransition { .. })
        ));

        let unbanned = desk.engine.unban(&user).await.unwrap();
        assert_eq!(unbanned.ticket.status, TicketStatus::Closed);
        assert_eq!(unbanned.ticket.ticket_id, banned.ticket.ticket_id);
    }

    #[tokio::test]
    async fn test_unban_of_non_banned_is_rejected() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");
        desk.engine.open(&user, "").await.unwrap();

        assert!(matches!(
            desk.engine.unban(&user).await,
            Err(LifecycleError::InvalidTransition {
                current: TicketStatus::Open,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_store_failure_leaves_index_untouched() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");
        desk.engine.open(&user, "").await.unwrap();
        assert!(
            desk.index
                .mark_delivered(&user, TicketId(1), Notice::TicketOpened)
                .await
        );

        desk.store.set_unavailable(true);
        let result = desk.engine.close(&user).await;
        assert!(matches!(result, Err(LifecycleError::StoreUnavailable(_))));

        let entry = desk.index.get(&user).await.unwrap();
        assert_eq!(entry.status, TicketStatus::Open);
        assert!(desk.index.was_delivered(&user, Notice::TicketOpened).await);

        desk.store.set_unavailable(false);
        assert!(desk.engine.close(&user).await.unwrap().changed);
    }

    #[tokio::test]
    async fn test_close_all_counts_and_empties_index() {
        let desk = TestDesk::plain();
        for raw in ["1", "2", "3"] {
            desk.engine.open(&fixtures::web_user(raw), "").await.unwrap();
        }
        desk.engine.close(&fixtures::web_user("3")).await.unwrap();

        let closed = desk.engine.close_all().await.unwrap();
        assert_eq!(closed, 2);
        assert_eq!(open_count(&desk), 0);
        assert!(desk.index.is_empty().await);

        assert_eq!(desk.engine.close_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_attaches_thread() {
        let desk = TestDesk::threaded();
        let user = fixtures::web_user("42");

        let opened = desk.engine.open(&user, "").await.unwrap();
        assert!(opened.ticket.thread_id.is_some());
        assert_eq!(
            desk.threads.calls().await,
            vec![ThreadCall::Open {
                chat_id: TEST_STAFF_CHAT,
                name: "#T000001 ticket".to_string(),
            }]
        );

        let by_thread = desk
            .engine
            .find_by_thread_id(opened.ticket.thread_id.unwrap())
            .await
            .unwrap();
        assert_eq!(by_thread.ticket_id, opened.ticket.ticket_id);
    }

    #[tokio::test]
    async fn test_thread_follows_close_and_reopen() {
        let desk = TestDesk::threaded();
        let user = fixtures::web_user("42");
        let thread_id = desk
            .engine
            .open(&user, "")
            .await
            .unwrap()
            .ticket
            .thread_id
            .unwrap();
        desk.threads.clear_calls().await;

        desk.engine.close(&user).await.unwrap();
        desk.engine.close(&user).await.unwrap();
        desk.engine.reopen(&user).await.unwrap();

        assert_eq!(
            desk.threads.calls().await,
            vec![
                ThreadCall::Close {
                    chat_id: TEST_STAFF_CHAT,
                    thread_id
                },
                ThreadCall::Reopen {
                    chat_id: TEST_STAFF_CHAT,
                    thread_id
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_ban_closes_thread_only_when_open() {
        let desk = TestDesk::threaded();
        let user = fixtures::web_user("42");
        desk.engine.open(&user, "").await.unwrap();
        desk.engine.close(&user).await.unwrap();
        desk.threads.clear_calls().await;

        desk.engine.ban(&user).await.unwrap();
        desk.engine.unban(&user).await.unwrap();
        assert!(desk.threads.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_thread_failure_does_not_roll_back() {
        let desk = TestDesk::threaded();
        let user = fixtures::web_user("42");
        desk.threads.set_failing(true).await;

        let opened = desk.engine.open(&user, "").await.unwrap();
        assert_eq!(opened.ticket.status, TicketStatus::Open);
        assert!(opened.ticket.thread_id.is_none());
        assert!(!opened.thread_synced);

        desk.threads.set_failing(false).await;
        let opened = desk.engine.open(&user, "").await.unwrap();
        assert!(!opened.changed);
        assert!(opened.ticket.thread_id.is_none());
        assert!(opened.thread_synced);
    }

    #[tokio::test]
    async fn test_failed_thread_close_is_reported() {
        let desk = TestDesk::threaded();
        let user = fixtures::web_user("42");
        assert!(desk.engine.open(&user, "").await.unwrap().thread_synced);
        desk.threads.set_failing(true).await;

        let closed = desk.engine.close(&user).await.unwrap();
        assert!(closed.changed);
        assert_eq!(closed.ticket.status, TicketStatus::Closed);
        assert!(!closed.thread_synced);

        // Banning a closed ticket leaves the thread alone
        let banned = desk.engine.ban(&user).await.unwrap();
        assert!(banned.thread_synced);
    }

    #[tokio::test]
    async fn test_opened_notice_recorded_with_the_ticket() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");

        let (first, notify) = desk
            .engine
            .open_with_notice(&user, "", Notice::TicketOpened)
            .await
            .unwrap();
        assert!(first.changed);
        assert!(notify);

        let (again, notify) = desk
            .engine
            .open_with_notice(&user, "", Notice::TicketOpened)
            .await
            .unwrap();
        assert_eq!(again.ticket.ticket_id, first.ticket.ticket_id);
        assert!(!notify);

        // Plain open never records anything
        desk.index.clear_all().await;
        desk.engine.open(&user, "").await.unwrap();
        assert!(!desk.index.was_delivered(&user, Notice::TicketOpened).await);
    }

    #[tokio::test]
    async fn test_thread_closed_if_ticket_closed_during_creation() {
        let desk = TestDesk::threaded();
        let user = fixtures::web_user("42");
        desk.threads
            .set_delay(Some(std::time::Duration::from_millis(50)))
            .await;

        let engine = Arc::clone(&desk.engine);
        let open_user = user.clone();
        let open = tokio::spawn(async move { engine.open(&open_user, "").await });

        // Let the ticket commit, then close it while the thread is pending.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        desk.engine.close(&user).await.unwrap();

        let opened = open.await.unwrap().unwrap();
        assert_eq!(opened.ticket.status, TicketStatus::Closed);
        let thread_id = opened.ticket.thread_id.unwrap();
        assert!(desk.threads.calls().await.contains(&ThreadCall::Close {
            chat_id: TEST_STAFF_CHAT,
            thread_id
        }));
    }

    #[tokio::test]
    async fn test_apply_to_superseded_ticket() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");
        let old = desk.engine.open(&user, "").await.unwrap().ticket;
        desk.engine.close(&user).await.unwrap();
        let current = desk.engine.open(&user, "").await.unwrap().ticket;

        let closed = desk.engine.apply_to(&old, Operation::Close).await.unwrap();
        assert!(!closed.changed);
        assert_eq!(closed.ticket.ticket_id, old.ticket_id);

        assert!(matches!(
            desk.engine.apply_to(&old, Operation::Reopen).await,
            Err(LifecycleError::InvalidTransition { .. })
        ));

        let still_open = desk.engine.find_by_user_id(&user).await.unwrap();
        assert_eq!(still_open.ticket_id, current.ticket_id);
        assert!(still_open.is_open());
    }

    #[tokio::test]
    async fn test_find_by_id_respects_category() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");
        let ticket = desk.engine.open(&user, "billing").await.unwrap().ticket;

        assert!(desk
            .engine
            .find_by_id(ticket.ticket_id, Some("billing"))
            .await
            .is_ok());
        assert!(desk.engine.find_by_id(ticket.ticket_id, None).await.is_ok());
        assert!(matches!(
            desk.engine.find_by_id(ticket.ticket_id, Some("sales")).await,
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_user_id_fills_empty_index() {
        let desk = TestDesk::plain();
        let user = fixtures::web_user("42");
        desk.engine.open(&user, "").await.unwrap();
        desk.index.clear_all().await;

        let ticket = desk.engine.find_by_user_id(&user).await.unwrap();
        assert_eq!(ticket.ticket_id, TicketId(1));
        assert!(desk.index.get(&user).await.is_some());
    }
}
