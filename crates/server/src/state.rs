use std::sync::Arc;

use ticketdesk_core::{
    AuditStore, CommandRouter, Config, LifecycleEngine, SanitizedConfig, TicketStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    router: CommandRouter,
    audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(config: Config, router: CommandRouter, audit_store: Arc<dyn AuditStore>) -> Self {
        Self {
            config,
            router,
            audit_store,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn engine(&self) -> &LifecycleEngine {
        self.router.engine()
    }

    pub fn ticket_store(&self) -> &dyn TicketStore {
        self.engine().store().as_ref()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }
}
