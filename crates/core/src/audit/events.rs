use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Ticket lifecycle
    TicketOpened {
        ticket_id: i64,
        /// Storage key of the user (`MESSENGER:raw_id`)
        user: String,
        category: String,
    },
    TicketStatusChanged {
        ticket_id: i64,
        user: String,
        /// Lifecycle operation that caused the change (close, reopen, ban, unban)
        operation: String,
        from_status: String,
        to_status: String,
    },
    TicketsBulkClosed {
        count: usize,
        ticket_ids: Vec<i64>,
    },

    // Staff threads
    ThreadAttached {
        ticket_id: i64,
        thread_id: i64,
    },
    ThreadSyncFailed {
        ticket_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<i64>,
        operation: String,
        error: String,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketOpened { .. } => "ticket_opened",
            Self::TicketStatusChanged { .. } => "ticket_status_changed",
            Self::TicketsBulkClosed { .. } => "tickets_bulk_closed",
            Self::ThreadAttached { .. } => "thread_attached",
            Self::ThreadSyncFailed { .. } => "thread_sync_failed",
        }
    }

    /// Ticket this event is about, if any
    pub fn ticket_id(&self) -> Option<i64> {
        match self {
            Self::TicketOpened { ticket_id, .. }
            | Self::TicketStatusChanged { ticket_id, .. }
            | Self::ThreadAttached { ticket_id, .. }
            | Self::ThreadSyncFailed { ticket_id, .. } => Some(*ticket_id),
            Self::ServiceStarted { .. }
            | Self::ServiceStopped { .. }
            | Self::TicketsBulkClosed { .. } => None,
        }
    }

    /// Storage key of the end user this event is about, if any
    pub fn user_key(&self) -> Option<&str> {
        match self {
            Self::TicketOpened { user, .. } | Self::TicketStatusChanged { user, .. } => {
                Some(user)
            }
            _ => None,
        }
    }
}

/// An audit event as stored, with the columns it is indexed by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Zero until the store assigns one.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub ticket_id: Option<i64>,
    pub user_key: Option<String>,
    pub data: AuditEvent,
}

impl AuditRecord {
    pub fn new(timestamp: DateTime<Utc>, event: AuditEvent) -> Self {
        Self {
            id: 0,
            timestamp,
            event_type: event.event_type().to_string(),
            ticket_id: event.ticket_id(),
            user_key: event.user_key().map(String::from),
            data: event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_service_started() {
        let event = AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        };
        assert_eq!(event.event_type(), "service_started");
        assert_eq!(event.ticket_id(), None);
        assert_eq!(event.user_key(), None);
    }

    #[test]
    fn test_status_changed_metadata() {
        let event = AuditEvent::TicketStatusChanged {
            ticket_id: 7,
            user: "WEB:42".to_string(),
            operation: "ban".to_string(),
            from_status: "open".to_string(),
            to_status: "banned".to_string(),
        };
        assert_eq!(event.event_type(), "ticket_status_changed");
        assert_eq!(event.ticket_id(), Some(7));
        assert_eq!(event.user_key(), Some("WEB:42"));
    }

    #[test]
    fn test_bulk_close_has_no_single_ticket() {
        let event = AuditEvent::TicketsBulkClosed {
            count: 2,
            ticket_ids: vec![1, 2],
        };
        assert_eq!(event.ticket_id(), None);
    }

    #[test]
    fn test_serialization_is_tagged() {
        let event = AuditEvent::ThreadSyncFailed {
            ticket_id: 3,
            thread_id: None,
            operation: "close".to_string(),
            error: "timeout".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "thread_sync_failed");
        assert!(json.get("thread_id").is_none());

        let back: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
