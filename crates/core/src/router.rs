//! Maps normalized inbound events to lifecycle operations.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::index::Notice;
use crate::lifecycle::{
    LifecycleEngine, LifecycleError, Operation, ResolutionPolicy, TicketReference,
};
use crate::ticket::{ThreadId, Ticket, UserKey};

/// Staff command, already parsed from whatever syntax the transport uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaffCommand {
    Close,
    Reopen,
    Ban,
    Unban,
    CloseAll,
}

impl StaffCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffCommand::Close => "close",
            StaffCommand::Reopen => "reopen",
            StaffCommand::Ban => "ban",
            StaffCommand::Unban => "unban",
            StaffCommand::CloseAll => "close-all",
        }
    }
}

impl fmt::Display for StaffCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "close" => Ok(StaffCommand::Close),
            "reopen" => Ok(StaffCommand::Reopen),
            "ban" => Ok(StaffCommand::Ban),
            "unban" => Ok(StaffCommand::Unban),
            "close-all" | "closeall" => Ok(StaffCommand::CloseAll),
            other => Err(format!("unknown command: {}", other)),
        }
    }
}

/// A staff message carrying a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffEvent {
    /// Staff member who sent the command, for logs only.
    #[serde(default)]
    pub user: Option<UserKey>,
    #[serde(default)]
    pub is_admin: bool,
    /// Text of the message the command replies to.
    #[serde(default)]
    pub reply_text: Option<String>,
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    /// Category of the staff context the command was issued in.
    #[serde(default)]
    pub category: Option<String>,
}

impl StaffEvent {
    fn reference(&self) -> TicketReference {
        TicketReference {
            thread_id: self.thread_id,
            reply_text: self.reply_text.clone(),
            category: self.category.clone(),
        }
    }
}

/// What the transport renders back to staff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandReply {
    Ticket {
        ticket: Ticket,
        /// Wire token of the ticket, for the confirmation message.
        reference: String,
        /// False when the ticket already was in the target state.
        changed: bool,
        /// False when the staff thread could not be updated to match.
        thread_synced: bool,
    },
    ClosedAll {
        count: usize,
    },
}

/// Result of routing an end-user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMessageOutcome {
    pub ticket: Ticket,
    pub reference: String,
    /// True when the "ticket opened" notice has not gone out for this ticket.
    pub notify_staff: bool,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command requires admin rights")]
    NotAdmin,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl CommandError {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::NotAdmin => "not_admin",
            CommandError::Lifecycle(e) => e.kind(),
        }
    }
}

/// Thin caller of the lifecycle engine for transports.
pub struct CommandRouter {
    engine: Arc<LifecycleEngine>,
}

impl CommandRouter {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<LifecycleEngine> {
        &self.engine
    }

    /// Run a staff command.
    ///
    /// Close only matches tickets of the event's category; reopen, ban and
    /// unban match any category.
    pub async fn handle_staff_command(
        &self,
        command: StaffCommand,
        event: &StaffEvent,
    ) -> Result<CommandReply, CommandError> {
        if !event.is_admin {
            warn!(
                "Rejected {} from non-admin {}",
                command,
                event
                    .user
                    .as_ref()
                    .map(UserKey::storage_key)
                    .unwrap_or_else(|| "unknown".to_string())
            );
            return Err(CommandError::NotAdmin);
        }

        let transition = match command {
            StaffCommand::CloseAll => {
                let count = self.engine.close_all().await?;
                return Ok(CommandReply::ClosedAll { count });
            }
            StaffCommand::Close => {
                let ticket = self.resolve(command, event, ResolutionPolicy::CategoryScoped).await?;
                self.engine.apply_to(&ticket, Operation::Close).await?
            }
            StaffCommand::Reopen => {
                let ticket = self.resolve(command, event, ResolutionPolicy::AnyCategory).await?;
                self.engine.apply_to(&ticket, Operation::Reopen).await?
            }
            StaffCommand::Ban => {
                let ticket = self.resolve(command, event, ResolutionPolicy::AnyCategory).await?;
                self.engine.ban(&ticket.user).await?
            }
            StaffCommand::Unban => {
                let ticket = self.resolve(command, event, ResolutionPolicy::AnyCategory).await?;
                self.engine.unban(&ticket.user).await?
            }
        };

        Ok(CommandReply::Ticket {
            reference: self.engine.codec().reference(transition.ticket.ticket_id),
            ticket: transition.ticket,
            changed: transition.changed,
            thread_synced: transition.thread_synced,
        })
    }

    async fn resolve(
        &self,
        command: StaffCommand,
        event: &StaffEvent,
        policy: ResolutionPolicy,
    ) -> Result<Ticket, LifecycleError> {
        let ticket = self.engine.resolve(&event.reference(), policy).await?;
        debug!("{} resolved to ticket {}", command, ticket.ticket_id);
        Ok(ticket)
    }

    /// Route a message from an end user to their open ticket.
    pub async fn handle_user_message(
        &self,
        user: &UserKey,
        category: &str,
    ) -> Result<UserMessageOutcome, CommandError> {
        let (transition, notify_staff) = self
            .engine
            .open_with_notice(user, category, Notice::TicketOpened)
            .await?;

        Ok(UserMessageOutcome {
            reference: self.engine.codec().reference(transition.ticket.ticket_id),
            ticket: transition.ticket,
            notify_staff,
        })
    }
}
