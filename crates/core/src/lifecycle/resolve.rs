//! Mapping staff messages back to the ticket they refer to.

use tracing::debug;

use crate::ticket::{ThreadId, Ticket};

use super::{LifecycleEngine, LifecycleError};

/// What a staff message carries that may identify a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketReference {
    /// Thread the message was posted in, for staff chats with threads.
    pub thread_id: Option<ThreadId>,
    /// Text of the message being replied to.
    pub reply_text: Option<String>,
    /// Category of the staff context the command was issued in.
    pub category: Option<String>,
}

impl TicketReference {
    pub fn from_reply(text: impl Into<String>) -> Self {
        Self {
            reply_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_thread(thread_id: ThreadId) -> Self {
        Self {
            thread_id: Some(thread_id),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// How strictly a token-based lookup matches the staff context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// The ticket must belong to the reference's category, if it names one.
    CategoryScoped,
    /// Any ticket with the decoded id.
    AnyCategory,
}

impl LifecycleEngine {
    /// Find the ticket a staff message refers to.
    ///
    /// The thread id wins when threads are enabled and it maps to a ticket.
    /// Otherwise the first token in the replied-to text is decoded.
    pub async fn resolve(
        &self,
        reference: &TicketReference,
        policy: ResolutionPolicy,
    ) -> Result<Ticket, LifecycleError> {
        if self.threads().enabled() {
            if let Some(thread_id) = reference.thread_id {
                match self.find_by_thread_id(thread_id).await {
                    Ok(ticket) => return Ok(ticket),
                    Err(LifecycleError::NotFound(_)) => {
                        debug!("Thread {} has no ticket, trying reply text", thread_id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let ticket_id = reference
            .reply_text
            .as_deref()
            .and_then(|text| self.codec().decode(text))
            .ok_or_else(|| {
                LifecycleError::NotFound("message does not reference a ticket".to_string())
            })?;

        let category = match policy {
            ResolutionPolicy::CategoryScoped => reference.category.as_deref(),
            ResolutionPolicy::AnyCategory => None,
        };
        self.find_by_id(ticket_id, category).await
    }
}
