//! Embedded SQLite storage backend for govstore
//!
//! The engine is used as a plain key-value store: one table per bucket,
//! each row a JSON-encoded record under its storage key. Queries decode and
//! project records in process (see [`query`]); lifecycle rules for
//! circuit breakers, the cache sync feed and first-start seeding are built
//! on top.
//!
//! # Features
//!
//! - Implements `CircuitBreakerStore`, `CircuitBreakerCacheFeed`,
//!   `ServiceLookup` and `GovernanceStore`
//! - One shared connection; every multi-step operation is one transaction
//! - In-memory databases for testing, WAL file databases otherwise
//! - Idempotent seed of the admin account, default strategy, namespaces
//!   and internal services
//!
//! # Example
//!
//! ```rust,no_run
//! use govstore_core::storage::CircuitBreakerStore;
//! use govstore_core::CircuitBreaker;
//! use govstore_sqlite::SqliteStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::in_memory()?;
//! let rules = store.circuit_breakers();
//!
//! rules.create_circuit_breaker(CircuitBreaker::master("r1", "payments"))?;
//! let stored = rules.get_circuit_breaker("r1", "master")?;
//! assert!(stored.is_some_and(|cb| cb.valid));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod circuitbreaker;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod migrate;
pub mod naming;
pub mod query;
pub mod store;
pub mod telemetry;

// Re-export main types
pub use auth::{StrategyStore, UserStore};
pub use bootstrap::{seed, SeedConfig, SeedReport};
pub use cache::SqliteCircuitBreakerCache;
pub use circuitbreaker::SqliteCircuitBreakerStore;
pub use config::StoreConfig;
pub use error::{Result, SqliteError};
pub use handler::{StoreTx, Tx, TxHandler};
pub use naming::{NamespaceStore, ServiceStore};
pub use store::SqliteStore;
