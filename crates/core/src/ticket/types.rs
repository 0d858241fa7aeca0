//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identity Types
// ============================================================================

/// Numeric ticket identifier.
///
/// Assigned by the store, strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub i64);

impl TicketId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TicketId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of a staff-side thread (forum topic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub i64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ThreadId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Transport an end user talks to us through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Messenger {
    Telegram,
    Web,
    Signal,
    Sms,
}

impl Messenger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Messenger::Telegram => "TELEGRAM",
            Messenger::Web => "WEB",
            Messenger::Signal => "SIGNAL",
            Messenger::Sms => "SMS",
        }
    }
}

impl fmt::Display for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Messenger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TELEGRAM" => Ok(Messenger::Telegram),
            "WEB" => Ok(Messenger::Web),
            "SIGNAL" => Ok(Messenger::Signal),
            "SMS" => Ok(Messenger::Sms),
            other => Err(format!("unknown messenger: {}", other)),
        }
    }
}

/// End-user identity, tagged with the messenger it belongs to.
///
/// The same raw id may exist on several transports; the pair is what
/// identifies a user. The storage form is `MESSENGER:raw_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey {
    pub messenger: Messenger,
    pub raw_id: String,
}

impl UserKey {
    pub fn new(messenger: Messenger, raw_id: impl Into<String>) -> Self {
        Self {
            messenger,
            raw_id: raw_id.into(),
        }
    }

    /// Stable string used as the storage and index key.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.messenger.as_str(), self.raw_id)
    }

    /// Parse a storage key back into a `UserKey`.
    ///
    /// Only the first `:` separates the messenger; raw ids may contain colons.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        let (messenger, raw_id) = key.split_once(':')?;
        let messenger = messenger.parse().ok()?;
        Some(Self::new(messenger, raw_id))
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.messenger, self.raw_id)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Closed,
    Banned,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
            TicketStatus::Banned => "banned",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Open)
    }

    pub fn is_banned(&self) -> bool {
        matches!(self, TicketStatus::Banned)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "closed" => Ok(TicketStatus::Closed),
            "banned" => Ok(TicketStatus::Banned),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A support conversation between one end user and staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub user: UserKey,
    /// Grouping tag, may be empty.
    pub category: String,
    pub status: TicketStatus,
    /// Staff-side thread, only for staff chats with forum topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}
