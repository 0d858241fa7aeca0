//! Lifecycle integration tests.
//!
//! These run the engine and router against a file-backed SQLite store:
//! open -> close -> reopen, ban -> unban, close-all sweeps, concurrency and
//! restarts with an empty index.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tempfile::TempDir;

use ticketdesk_core::{
    audit::{AuditFilter, AuditStore, SqliteAuditStore},
    create_audit_system,
    testing::fixtures,
    CommandReply, CommandRouter, LifecycleEngine, LifecycleError, SqliteTicketStore, StaffCommand,
    StaffEvent, ThreadSynchronizer, TicketFilter, TicketId, TicketIndex, TicketStatus,
    TicketStore,
};

/// Test helper wiring the engine to a store on disk.
struct TestHarness {
    store: Arc<SqliteTicketStore>,
    index: Arc<TicketIndex>,
    engine: Arc<LifecycleEngine>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::open_in(temp_dir)
    }

    fn open_in(temp_dir: TempDir) -> Self {
        let db_path = temp_dir.path().join("tickets.db");
        let store =
            Arc::new(SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"));
        let index = Arc::new(TicketIndex::new());
        let engine = LifecycleEngine::new(
            Arc::clone(&store) as Arc<dyn TicketStore>,
            Arc::clone(&index),
            Arc::new(ThreadSynchronizer::disabled()),
            fixtures::codec(),
        );

        Self {
            store,
            index,
            engine: Arc::new(engine),
            temp_dir,
        }
    }

    /// Drop the in-memory state and start over on the same database.
    fn restart(self) -> Self {
        Self::open_in(self.temp_dir)
    }

    fn router(&self) -> CommandRouter {
        CommandRouter::new(Arc::clone(&self.engine))
    }

    fn count(&self, status: TicketStatus) -> i64 {
        self.store
            .count(&TicketFilter::new().with_status(status))
            .unwrap()
    }
}

fn admin_reply(text: &str) -> StaffEvent {
    StaffEvent {
        is_admin: true,
        reply_text: Some(text.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_concurrent_opens_yield_one_ticket() {
    let harness = TestHarness::new();
    let user = fixtures::web_user("42");

    let results = join_all((0..32).map(|_| {
        let engine = Arc::clone(&harness.engine);
        let user = user.clone();
        tokio::spawn(async move { engine.open(&user, "").await })
    }))
    .await;

    let tickets: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    assert_eq!(tickets.iter().filter(|t| t.changed).count(), 1);
    assert!(tickets
        .iter()
        .all(|t| t.ticket.ticket_id == tickets[0].ticket.ticket_id));
    assert_eq!(harness.count(TicketStatus::Open), 1);
}

#[tokio::test]
async fn test_different_users_open_in_parallel() {
    let harness = TestHarness::new();

    let results = join_all((0..20).map(|i| {
        let engine = Arc::clone(&harness.engine);
        tokio::spawn(async move { engine.open(&fixtures::web_user(&i.to_string()), "").await })
    }))
    .await;

    let mut ids: Vec<i64> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap().ticket.ticket_id.get())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_close_reopen_preserves_id() {
    let harness = TestHarness::new();
    let user = fixtures::web_user("42");

    let opened = harness.engine.open(&user, "").await.unwrap().ticket;
    let closed = harness.engine.close(&user).await.unwrap().ticket;
    let reopened = harness.engine.reopen(&user).await.unwrap().ticket;

    assert_eq!(closed.ticket_id, opened.ticket_id);
    assert_eq!(reopened.ticket_id, opened.ticket_id);
    assert_eq!(reopened.status, TicketStatus::Open);
}

#[tokio::test]
async fn test_close_all_sweeps_everything() {
    let harness = TestHarness::new();
    for i in 0..5 {
        harness
            .engine
            .open(&fixtures::web_user(&i.to_string()), "")
            .await
            .unwrap();
    }

    let count = harness.engine.close_all().await.unwrap();

    assert_eq!(count, 5);
    assert_eq!(harness.count(TicketStatus::Open), 0);
    assert_eq!(harness.count(TicketStatus::Closed), 5);
    assert!(harness.index.is_empty().await);
}

#[tokio::test]
async fn test_close_all_racing_opens_loses_nothing() {
    let harness = TestHarness::new();
    for i in 0..10 {
        harness
            .engine
            .open(&fixtures::web_user(&format!("before-{}", i)), "")
            .await
            .unwrap();
    }

    let opens = (0..10).map(|i| {
        let engine = Arc::clone(&harness.engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(i)).await;
            engine
                .open(&fixtures::web_user(&format!("during-{}", i)), "")
                .await
        })
    });
    let sweep = {
        let engine = Arc::clone(&harness.engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3)).await;
            engine.close_all().await
        })
    };

    let opened = join_all(opens).await;
    let swept = sweep.await.unwrap().unwrap();
    assert!(opened.into_iter().all(|r| r.unwrap().unwrap().changed));

    // Every ticket was either swept or is still open, none twice.
    let open_now = harness.count(TicketStatus::Open) as usize;
    assert_eq!(swept + open_now, 20);
    assert!(swept >= 10);
    assert_eq!(harness.index.len().await, open_now);
}

#[tokio::test]
async fn test_staff_close_scenario() {
    let harness = TestHarness::new();
    let router = harness.router();
    let user = fixtures::web_user("42");

    let outcome = router.handle_user_message(&user, "").await.unwrap();
    assert_eq!(outcome.ticket.ticket_id, TicketId(1));
    assert_eq!(outcome.ticket.status, TicketStatus::Open);

    let notification = format!("New message {}\nHello, I need help", outcome.reference);
    let reply = router
        .handle_staff_command(StaffCommand::Close, &admin_reply(&notification))
        .await
        .unwrap();

    match reply {
        CommandReply::Ticket {
            ticket, reference, ..
        } => {
            assert_eq!(ticket.ticket_id, TicketId(1));
            assert_eq!(ticket.status, TicketStatus::Closed);
            assert!(reference.contains("#T000001"));
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[tokio::test]
async fn test_ban_scenario_on_ticket_seven() {
    let harness = TestHarness::new();
    let router = harness.router();
    for i in 1..=7 {
        router
            .handle_user_message(&fixtures::web_user(&format!("u{}", i)), "")
            .await
            .unwrap();
    }
    let event = admin_reply("#T000007 ticket");

    let banned = router
        .handle_staff_command(StaffCommand::Ban, &event)
        .await
        .unwrap();
    assert!(matches!(
        banned,
        CommandReply::Ticket { ref ticket, .. }
            if ticket.ticket_id == TicketId(7) && ticket.status == TicketStatus::Banned
    ));

    let reopen = router
        .handle_staff_command(StaffCommand::Reopen, &event)
        .await;
    assert_eq!(reopen.unwrap_err().kind(), "invalid_transition");

    let unbanned = router
        .handle_staff_command(StaffCommand::Unban, &event)
        .await
        .unwrap();
    assert!(matches!(
        unbanned,
        CommandReply::Ticket { ref ticket, .. }
            if ticket.ticket_id == TicketId(7) && ticket.status == TicketStatus::Closed
    ));
}

#[tokio::test]
async fn test_restart_starts_with_empty_index() {
    let harness = TestHarness::new();
    let user = fixtures::web_user("42");
    harness.engine.open(&user, "").await.unwrap();

    let harness = harness.restart();
    assert!(harness.index.is_empty().await);

    let found = harness.engine.find_by_user_id(&user).await.unwrap();
    assert_eq!(found.ticket_id, TicketId(1));
    assert!(harness.index.get(&user).await.is_some());

    let again = harness.engine.open(&user, "").await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.ticket.ticket_id, TicketId(1));
}

#[tokio::test]
async fn test_transitions_are_audited() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tickets.db");
    let store = Arc::new(SqliteTicketStore::new(&db_path).unwrap());
    let audit_store = Arc::new(SqliteAuditStore::new(&db_path).unwrap());
    let (handle, writer) = create_audit_system(Arc::clone(&audit_store) as Arc<dyn AuditStore>, 64);
    let writer_task = tokio::spawn(writer.run());

    let engine = LifecycleEngine::new(
        store as Arc<dyn TicketStore>,
        Arc::new(TicketIndex::new()),
        Arc::new(ThreadSynchronizer::disabled()),
        fixtures::codec(),
    )
    .with_audit(handle);

    let user = fixtures::web_user("42");
    engine.open(&user, "").await.unwrap();
    engine.close(&user).await.unwrap();
    engine.close(&user).await.unwrap();
    assert!(matches!(
        engine.unban(&user).await,
        Err(LifecycleError::InvalidTransition { .. })
    ));

    // Dropping the engine drops the last handle and stops the writer.
    drop(engine);
    writer_task.await.unwrap();

    let records = audit_store
        .query(&AuditFilter::new().with_user(user.clone()))
        .unwrap();
    let types: Vec<&str> = records.iter().map(|r| r.event_type.as_str()).collect();
    assert_eq!(types, vec!["ticket_status_changed", "ticket_opened"]);
}
