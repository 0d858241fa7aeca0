//! Mock staff thread API for testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::threads::{ThreadApi, ThreadApiError};
use crate::ticket::ThreadId;

/// A recorded thread API call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadCall {
    Open { chat_id: i64, name: String },
    Close { chat_id: i64, thread_id: ThreadId },
    Reopen { chat_id: i64, thread_id: ThreadId },
}

/// Mock implementation of the ThreadApi trait.
///
/// Records every call, hands out sequential thread ids starting at 100 and
/// can be switched into a failing mode or slowed down.
///
/// # Example
///
/// ```rust,ignore
/// let api = Arc::new(MockThreadApi::new());
/// let sync = ThreadSynchronizer::new(Some(api.clone()), staff);
///
/// sync.on_close(&ticket).await?;
/// assert_eq!(api.calls().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockThreadApi {
    calls: Arc<RwLock<Vec<ThreadCall>>>,
    failing: Arc<RwLock<bool>>,
    delay: Arc<RwLock<Option<Duration>>>,
    next_thread: Arc<RwLock<i64>>,
}

impl Default for MockThreadApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockThreadApi {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(false)),
            delay: Arc::new(RwLock::new(None)),
            next_thread: Arc::new(RwLock::new(100)),
        }
    }

    /// All calls made so far, in order.
    pub async fn calls(&self) -> Vec<ThreadCall> {
        self.calls.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Make every following call fail with a rejection.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    /// Delay every following call.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    async fn enter(&self, call: ThreadCall) -> Result<(), ThreadApiError> {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.write().await.push(call);

        if *self.failing.read().await {
            return Err(ThreadApiError::Rejected("mock failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ThreadApi for MockThreadApi {
    async fn open_group(&self, staff_chat_id: i64, name: &str) -> Result<ThreadId, ThreadApiError> {
        self.enter(ThreadCall::Open {
            chat_id: staff_chat_id,
            name: name.to_string(),
        })
        .await?;

        let mut next = self.next_thread.write().await;
        let id = *next;
        *next += 1;
        Ok(ThreadId(id))
    }

    async fn close_group(
        &self,
        staff_chat_id: i64,
        thread_id: ThreadId,
    ) -> Result<(), ThreadApiError> {
        self.enter(ThreadCall::Close {
            chat_id: staff_chat_id,
            thread_id,
        })
        .await
    }

    async fn reopen_group(
        &self,
        staff_chat_id: i64,
        thread_id: ThreadId,
    ) -> Result<(), ThreadApiError> {
        self.enter(ThreadCall::Reopen {
            chat_id: staff_chat_id,
            thread_id,
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
