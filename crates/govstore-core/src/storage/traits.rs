//! Storage trait definitions

use chrono::{DateTime, Utc};

use crate::model::{
    CircuitBreaker, CircuitBreakerDetail, CircuitBreakerRelation, Service,
    ServiceWithCircuitBreaker, VERSION_MASTER,
};
use crate::query::Filters;
use crate::storage::error::StoreResult;

/// Lifecycle of versioned circuit-breaker rules and their service bindings.
///
/// Point reads return `Ok(None)` when nothing valid exists at the key; an
/// `Err` always means the operation itself failed. Soft deletes are
/// idempotent and never report `NotFound`.
pub trait CircuitBreakerStore: Send + Sync {
    /// Store a master rule, replacing whatever was at `(id, "master")`.
    fn create_circuit_breaker(&self, cb: CircuitBreaker) -> StoreResult<()>;

    /// Store a tag of an existing master rule.
    ///
    /// Returns `StoreError::NotFound` if the master is absent or deleted.
    fn tag_circuit_breaker(&self, cb: CircuitBreaker) -> StoreResult<()>;

    /// Bind a service to a rule version, replacing any previous binding.
    ///
    /// Returns `StoreError::NotFound` if the target rule is not valid; the
    /// previous binding is left untouched in that case.
    fn release_circuit_breaker(&self, relation: CircuitBreakerRelation) -> StoreResult<()>;

    /// Soft-delete the binding of a service.
    fn unbind_circuit_breaker(
        &self,
        service_id: &str,
        rule_id: &str,
        rule_version: &str,
    ) -> StoreResult<()>;

    /// Soft-delete one rule version unless a valid binding still uses it.
    ///
    /// A master is held by any valid binding of its id, a tag only by
    /// bindings at that exact version. A held rule is left as is and the
    /// call still succeeds.
    fn delete_tag_circuit_breaker(&self, id: &str, version: &str) -> StoreResult<()>;

    /// Soft-delete the master version of a rule.
    fn delete_master_circuit_breaker(&self, id: &str) -> StoreResult<()> {
        self.delete_tag_circuit_breaker(id, VERSION_MASTER)
    }

    /// Update the mutable fields of a valid rule version.
    fn update_circuit_breaker(&self, cb: CircuitBreaker) -> StoreResult<()>;

    fn get_circuit_breaker(&self, id: &str, version: &str) -> StoreResult<Option<CircuitBreaker>>;

    /// Versions of a rule that are currently valid, in key order.
    fn get_circuit_breaker_versions(&self, id: &str) -> StoreResult<Vec<String>>;

    /// Valid bindings to the master version of a rule.
    fn get_circuit_breaker_master_relation(
        &self,
        rule_id: &str,
    ) -> StoreResult<Vec<CircuitBreakerRelation>> {
        self.get_circuit_breaker_relation(rule_id, VERSION_MASTER)
    }

    /// Valid bindings to one version of a rule.
    fn get_circuit_breaker_relation(
        &self,
        rule_id: &str,
        rule_version: &str,
    ) -> StoreResult<Vec<CircuitBreakerRelation>>;

    /// Resolve service → binding → rule. `Ok(None)` if any hop is missing.
    fn get_circuit_breakers_by_service(
        &self,
        name: &str,
        namespace: &str,
    ) -> StoreResult<Option<CircuitBreaker>>;

    /// Valid master rules matching every filter, oldest modification first.
    fn list_master_circuit_breakers(
        &self,
        filters: &Filters,
        offset: u32,
        limit: u32,
    ) -> StoreResult<CircuitBreakerDetail>;

    /// Released rules (valid bindings joined with their rule and service)
    /// matching every filter on the binding, oldest rule modification first.
    fn list_release_circuit_breakers(
        &self,
        filters: &Filters,
        offset: u32,
        limit: u32,
    ) -> StoreResult<CircuitBreakerDetail>;
}

/// Incremental pull feed for the in-memory serving cache.
pub trait CircuitBreakerCacheFeed: Send + Sync {
    /// Every binding modified at or after `mtime`, joined with its rule.
    ///
    /// The bound is inclusive, so a binding modified exactly at the cursor
    /// is delivered again on the next poll; consumers upsert. With
    /// `first_update` the whole bucket is returned.
    fn get_circuit_breakers_for_cache(
        &self,
        mtime: DateTime<Utc>,
        first_update: bool,
    ) -> StoreResult<Vec<ServiceWithCircuitBreaker>>;
}

/// Service resolution consumed by the rule store.
pub trait ServiceLookup: Send + Sync {
    /// Valid service with this name in this namespace.
    fn get_service_by_name(&self, name: &str, namespace: &str) -> StoreResult<Option<Service>>;

    /// Valid service with this id.
    fn get_service(&self, id: &str) -> StoreResult<Option<Service>>;
}

/// A complete store: named sub-services sharing one engine.
pub trait GovernanceStore: Send + Sync {
    /// Backend name, e.g. for startup logs.
    fn name(&self) -> &str;

    fn circuit_breakers(&self) -> &dyn CircuitBreakerStore;

    fn circuit_breaker_cache(&self) -> &dyn CircuitBreakerCacheFeed;

    fn services(&self) -> &dyn ServiceLookup;
}
