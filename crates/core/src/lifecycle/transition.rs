//! The ticket state machine, free of any I/O.

use crate::index::Notice;
use crate::ticket::TicketStatus;

/// A staff-initiated status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Close,
    Reopen,
    Ban,
    Unban,
}

/// Result of applying an operation to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move to the given status.
    MoveTo(TicketStatus),
    /// Already where the operation would put it.
    Unchanged,
    /// Not allowed from the current status.
    Rejected,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Close => "close",
            Operation::Reopen => "reopen",
            Operation::Ban => "ban",
            Operation::Unban => "unban",
        }
    }

    pub fn step(&self, from: TicketStatus) -> Step {
        use TicketStatus::*;

        match (self, from) {
            (Operation::Close, Open) => Step::MoveTo(Closed),
            (Operation::Close, Closed) => Step::Unchanged,
            (Operation::Close, Banned) => Step::Rejected,

            (Operation::Reopen, Closed) => Step::MoveTo(Open),
            (Operation::Reopen, Open) => Step::Unchanged,
            (Operation::Reopen, Banned) => Step::Rejected,

            (Operation::Ban, Open | Closed) => Step::MoveTo(Banned),
            (Operation::Ban, Banned) => Step::Rejected,

            (Operation::Unban, Banned) => Step::MoveTo(Closed),
            (Operation::Unban, Open | Closed) => Step::Rejected,
        }
    }

    /// Notice the caller sends once the operation is applied.
    pub fn notice(&self) -> Notice {
        match self {
            Operation::Close => Notice::TicketClosed,
            Operation::Reopen => Notice::TicketReopened,
            Operation::Ban => Notice::UserBanned,
            Operation::Unban => Notice::UserUnbanned,
        }
    }
}
