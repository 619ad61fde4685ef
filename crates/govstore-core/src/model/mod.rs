//! Record models stored by govstore

mod auth;
mod circuitbreaker;
mod naming;

pub use auth::{
    AuthAction, Principal, PrincipalRole, ResourceType, Strategy, StrategyResource, User,
    UserRole, RESOURCE_ANY,
};
pub use circuitbreaker::{
    relation_fields, rule_fields, rule_key, CircuitBreaker, CircuitBreakerDetail,
    CircuitBreakerInfo, CircuitBreakerRelation, ServiceWithCircuitBreaker, VERSION_MASTER,
};
pub use naming::{namespace_fields, service_fields, Namespace, Service};
