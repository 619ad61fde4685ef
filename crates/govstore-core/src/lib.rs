//! govstore core
//!
//! Engine-independent half of the governance rule store: the record
//! models, the per-record field accessor tables used for predicate
//! filtering, exact-match filters and pagination, the error taxonomy and
//! the storage traits.
//!
//! # Example
//!
//! ```rust
//! use govstore_core::{CircuitBreaker, Filters, Record};
//! use govstore_core::model::rule_fields;
//!
//! let cb = CircuitBreaker::master("r1", "payments");
//! let projection = cb.project(&cb.key(), &[rule_fields::NAME]);
//!
//! let filters = Filters::new().with(rule_fields::NAME, "payments");
//! assert!(filters.matches(&projection));
//! ```

pub mod model;
pub mod query;
pub mod record;
pub mod storage;

// Re-export main types at crate root
pub use model::{
    CircuitBreaker, CircuitBreakerDetail, CircuitBreakerInfo, CircuitBreakerRelation, Namespace,
    Service, ServiceWithCircuitBreaker, Strategy, User, VERSION_MASTER,
};
pub use query::{paginate, Filters, OffsetOverflow};
pub use record::{Field, FieldValue, Projection, Record, KEY_FIELD};
pub use storage::{
    BackendKind, CircuitBreakerCacheFeed, CircuitBreakerStore, GovernanceStore, NotFoundKind,
    ServiceLookup, StoreError, StoreResult,
};
