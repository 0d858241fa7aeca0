pub mod audit;
pub mod config;
pub mod index;
pub mod lifecycle;
pub mod metrics;
pub mod router;
pub mod testing;
pub mod threads;
pub mod ticket;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use index::{IndexEntry, Notice, TicketIndex};
pub use lifecycle::{
    LifecycleEngine, LifecycleError, Operation, ResolutionPolicy, TicketReference, Transition,
};
pub use router::{
    CommandError, CommandReply, CommandRouter, StaffCommand, StaffEvent, UserMessageOutcome,
};
pub use threads::{HttpThreadApi, ThreadApi, ThreadApiError, ThreadSynchronizer};
pub use ticket::{
    Messenger, NewTicket, SqliteTicketStore, StoreError, ThreadId, Ticket, TicketCodec,
    TicketFilter, TicketId, TicketStatus, TicketStore, UserKey,
};
