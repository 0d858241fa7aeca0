//! Ticket records, their storage contract and the SQLite backend.

mod codec;
mod sqlite_store;
mod store;
mod types;

pub use codec::{TicketCodec, TOKEN_PREFIX, TOKEN_WIDTH};
pub use sqlite_store::SqliteTicketStore;
pub use store::{NewTicket, StoreError, TicketFilter, TicketStore};
pub use types::{Messenger, ThreadId, Ticket, TicketId, TicketStatus, UserKey};
