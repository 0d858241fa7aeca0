use async_trait::async_trait;
use thiserror::Error;

use crate::ticket::ThreadId;

#[derive(Debug, Error)]
pub enum ThreadApiError {
    #[error("Thread API connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Thread API request timed out")]
    Timeout,

    #[error("Thread API rejected the request: {0}")]
    Rejected(String),

    #[error("Unexpected thread API response: {0}")]
    InvalidResponse(String),
}

/// Forum-style grouping on the staff chat.
#[async_trait]
pub trait ThreadApi: Send + Sync {
    /// Create a new thread in the staff chat and return its id.
    async fn open_group(&self, staff_chat_id: i64, name: &str) -> Result<ThreadId, ThreadApiError>;

    async fn close_group(&self, staff_chat_id: i64, thread_id: ThreadId)
        -> Result<(), ThreadApiError>;

    async fn reopen_group(
        &self,
        staff_chat_id: i64,
        thread_id: ThreadId,
    ) -> Result<(), ThreadApiError>;

    /// Name of this backend, used in logs and metric labels.
    fn backend_name(&self) -> &'static str;
}
