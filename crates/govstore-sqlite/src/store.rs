//! Composite store: every sub-store over one shared handler

use std::sync::Arc;

use govstore_core::storage::{
    CircuitBreakerCacheFeed, CircuitBreakerStore, GovernanceStore, ServiceLookup,
};
use tracing::{error, info, warn};

use crate::auth::{StrategyStore, UserStore};
use crate::bootstrap::{self, SeedReport};
use crate::cache::SqliteCircuitBreakerCache;
use crate::circuitbreaker::SqliteCircuitBreakerStore;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::handler::{StoreTx, TxHandler};
use crate::naming::{NamespaceStore, ServiceStore};
use crate::telemetry::component;

/// SQLite-backed governance store
pub struct SqliteStore {
    handler: TxHandler,
    services: Arc<ServiceStore>,
    namespaces: NamespaceStore,
    users: UserStore,
    strategies: StrategyStore,
    circuit_breakers: SqliteCircuitBreakerStore,
    circuit_breaker_cache: SqliteCircuitBreakerCache,
    seed_report: SeedReport,
}

impl SqliteStore {
    /// Open the engine described by `config`, apply migrations and seed it.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let handler = match &config.path {
            Some(path) => TxHandler::open(path, config.busy_timeout())?,
            None => TxHandler::in_memory()?,
        };
        let store = Self::with_handler(handler, config)?;
        info!(
            component = component::STORE,
            path = ?config.path,
            seeded = store.seed_report.inserted(),
            "store opened"
        );
        Ok(store)
    }

    /// Create a new in-memory store with default configuration (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::open(&StoreConfig::default())
    }

    /// Build the sub-stores over an already migrated handler and seed it.
    /// The handler is closed if seeding fails.
    pub fn with_handler(handler: TxHandler, config: &StoreConfig) -> Result<Self> {
        let seed_report = match bootstrap::seed(&handler, &config.seed) {
            Ok(report) => report,
            Err(e) => {
                error!(component = component::BOOTSTRAP, error = %e, "seeding failed");
                if let Err(close_err) = handler.close() {
                    warn!(
                        component = component::STORE,
                        error = %close_err,
                        "close after failed seed failed"
                    );
                }
                return Err(e);
            }
        };

        let services = Arc::new(ServiceStore::new(handler.clone()));
        let circuit_breakers =
            SqliteCircuitBreakerStore::new(handler.clone(), services.clone() as Arc<dyn ServiceLookup>)
                .with_offset_overflow(config.offset_overflow);

        Ok(Self {
            namespaces: NamespaceStore::new(handler.clone()),
            users: UserStore::new(handler.clone()),
            strategies: StrategyStore::new(handler.clone()),
            circuit_breaker_cache: SqliteCircuitBreakerCache::new(handler.clone()),
            circuit_breakers,
            services,
            handler,
            seed_report,
        })
    }

    pub fn circuit_breakers(&self) -> &SqliteCircuitBreakerStore {
        &self.circuit_breakers
    }

    pub fn circuit_breaker_cache(&self) -> &SqliteCircuitBreakerCache {
        &self.circuit_breaker_cache
    }

    pub fn services(&self) -> &ServiceStore {
        &self.services
    }

    pub fn namespaces(&self) -> &NamespaceStore {
        &self.namespaces
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn strategies(&self) -> &StrategyStore {
        &self.strategies
    }

    /// Rows written by the seed when this store was opened.
    pub fn seed_report(&self) -> SeedReport {
        self.seed_report
    }

    /// Shared handler, for query-engine access outside the sub-stores.
    pub fn handler(&self) -> &TxHandler {
        &self.handler
    }

    /// Begin a caller-driven write transaction.
    pub fn start_tx(&self) -> Result<StoreTx> {
        self.handler.start_tx()
    }

    /// Release the engine. Every sub-store fails afterwards.
    pub fn close(&self) -> Result<()> {
        self.handler.close()?;
        info!(component = component::STORE, "store closed");
        Ok(())
    }
}

impl GovernanceStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn circuit_breakers(&self) -> &dyn CircuitBreakerStore {
        &self.circuit_breakers
    }

    fn circuit_breaker_cache(&self) -> &dyn CircuitBreakerCacheFeed {
        &self.circuit_breaker_cache
    }

    fn services(&self) -> &dyn ServiceLookup {
        self.services.as_ref()
    }
}
