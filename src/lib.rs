//! Tenant scoping, role gating, quota accounting, and usage analytics for
//! a multi-tenant prompt execution platform.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod models;
pub mod quota;
pub mod routes;
pub mod services;
pub mod system;
pub mod tenant;
pub mod usage_buffer;
pub mod usage_sink;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::{
    config::Config,
    db::DbPool,
    executor::PromptExecutor,
    quota::QuotaLedger,
    system::SystemIdCache,
    tenant::ContextResolver,
    usage_buffer::UsageLogBuffer,
};

pub use routes::router;

/// Shared per-process state. Everything here is initialized once at
/// startup; requests only clone cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<DbPool>,
    pub resolver: ContextResolver,
    pub quota: QuotaLedger,
    pub usage_buffer: Arc<UsageLogBuffer>,
    pub executor: Arc<dyn PromptExecutor>,
    pub system_ids: Arc<SystemIdCache>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        db: Arc<DbPool>,
        usage_buffer: Arc<UsageLogBuffer>,
        executor: Arc<dyn PromptExecutor>,
    ) -> Self {
        let resolver = ContextResolver::new(Arc::clone(&db), config.auth.mode);
        let quota = QuotaLedger::new(Arc::clone(&db));
        Self {
            config,
            db,
            resolver,
            quota,
            usage_buffer,
            executor,
            system_ids: Arc::new(SystemIdCache::new()),
        }
    }
}
