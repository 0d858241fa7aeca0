//! Testing utilities and mock implementations.
//!
//! Used by unit tests in this crate and by the integration tests of the
//! server crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketdesk_core::testing::{fixtures, TestDesk};
//!
//! let desk = TestDesk::threaded();
//! let opened = desk.engine.open(&fixtures::web_user("42"), "").await?;
//! assert_eq!(desk.threads.calls().await.len(), 1);
//! ```

mod flaky_store;
mod mock_thread_api;

pub use flaky_store::FlakyTicketStore;
pub use mock_thread_api::{MockThreadApi, ThreadCall};

use std::sync::Arc;

use crate::config::StaffConfig;
use crate::index::TicketIndex;
use crate::lifecycle::LifecycleEngine;
use crate::threads::{ThreadApi, ThreadSynchronizer};

/// Staff chat id used by [`TestDesk::threaded`].
pub const TEST_STAFF_CHAT: i64 = -1001;

/// A lifecycle engine wired to in-memory collaborators.
pub struct TestDesk {
    pub engine: Arc<LifecycleEngine>,
    pub store: Arc<FlakyTicketStore>,
    pub index: Arc<TicketIndex>,
    pub threads: Arc<MockThreadApi>,
}

impl TestDesk {
    /// Staff chat without threads.
    pub fn plain() -> Self {
        Self::build(StaffConfig::default())
    }

    /// Staff chat with one thread per ticket.
    pub fn threaded() -> Self {
        Self::build(StaffConfig {
            chat_id: TEST_STAFF_CHAT,
            threads: true,
        })
    }

    fn build(staff: StaffConfig) -> Self {
        let store = Arc::new(FlakyTicketStore::new().expect("in-memory store"));
        let index = Arc::new(TicketIndex::new());
        let threads = Arc::new(MockThreadApi::new());
        let synchronizer =
            ThreadSynchronizer::new(Some(Arc::clone(&threads) as Arc<dyn ThreadApi>), staff);
        let engine = LifecycleEngine::new(
            Arc::clone(&store) as Arc<dyn crate::ticket::TicketStore>,
            Arc::clone(&index),
            Arc::new(synchronizer),
            fixtures::codec(),
        );

        Self {
            engine: Arc::new(engine),
            store,
            index,
            threads,
        }
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::ticket::{Messenger, Ticket, TicketCodec, TicketId, TicketStatus, UserKey};

    /// Marker used by [`codec`].
    pub const MARKER: &str = "ticket";

    pub fn codec() -> TicketCodec {
        TicketCodec::new(MARKER).expect("valid marker")
    }

    pub fn web_user(raw_id: &str) -> UserKey {
        UserKey::new(Messenger::Web, raw_id)
    }

    /// A ticket record with no thread and an empty category.
    pub fn ticket(id: i64, user: UserKey, status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            ticket_id: TicketId(id),
            user,
            category: String::new(),
            status,
            thread_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
