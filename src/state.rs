use sqlx::PgPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::api::BearerToken;
use crate::config::Settings;
use crate::observability::{AuditEntry, AuditLogWriter};
use crate::testing::ReceiverTestingService;

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    pub service: ReceiverTestingService,
    pub tokens: Vec<BearerToken>,
    pub db_pool: Option<PgPool>,
    pub start_time: Instant,
    audit_log: Option<AuditLogWriter>,
    shutting_down: AtomicBool,
}

impl AppState {
    pub fn new(settings: Settings, service: ReceiverTestingService) -> Self {
        Self {
            settings,
            service,
            tokens: Vec::new(),
            db_pool: None,
            start_time: Instant::now(),
            audit_log: None,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn with_tokens(mut self, tokens: Vec<BearerToken>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn with_audit_log(mut self, writer: AuditLogWriter) -> Self {
        self.audit_log = Some(writer);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Record an audit entry. Failures are logged and never fail the request.
    pub fn audit(&self, entry: &AuditEntry) {
        let Some(writer) = &self.audit_log else {
            return;
        };
        if let Err(e) = writer.write(entry) {
            tracing::warn!(error = %e, audit_id = %entry.audit_id, "failed to write audit entry");
        }
    }

    /// Enter the drain period: health reports `draining` and new tests get 503.
    pub fn trigger_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}
