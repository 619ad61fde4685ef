//! Storage abstraction for governance rules
//!
//! This module defines the traits the control plane programs against.
//! The embedded-engine implementation lives in the `govstore-sqlite`
//! crate; everything here is engine independent.
//!
//! # Example
//!
//! ```rust
//! use govstore_core::storage::{StoreError, StoreResult};
//! use govstore_core::storage::NotFoundKind;
//!
//! fn require<T>(found: StoreResult<Option<T>>) -> StoreResult<T> {
//!     found?.ok_or_else(|| StoreError::not_found(NotFoundKind::CircuitBreaker, "rule"))
//! }
//!
//! assert!(require::<u32>(Ok(None)).unwrap_err().is_not_found());
//! ```

mod error;
mod traits;

pub use error::{BackendKind, NotFoundKind, StoreError, StoreResult};
pub use traits::{CircuitBreakerCacheFeed, CircuitBreakerStore, GovernanceStore, ServiceLookup};
