//! Pull feed for the serving cache
//!
//! The cache polls with the largest modify time it has seen. The lower
//! bound is inclusive, so the row modified exactly at the cursor comes
//! back on every poll until something newer is written.

use chrono::{DateTime, Utc};
use govstore_core::model::relation_fields;
use govstore_core::storage::{CircuitBreakerCacheFeed, StoreResult};
use govstore_core::{CircuitBreakerRelation, ServiceWithCircuitBreaker};
use tracing::{debug, warn};

use crate::circuitbreaker::{check_relation_key, load_rule};
use crate::error::{report, Result};
use crate::handler::TxHandler;
use crate::telemetry::component;

/// Cache feed over the shared handler.
#[derive(Clone)]
pub struct SqliteCircuitBreakerCache {
    handler: TxHandler,
}

impl SqliteCircuitBreakerCache {
    pub fn new(handler: TxHandler) -> Self {
        Self { handler }
    }

    fn changed_since(
        &self,
        mtime: DateTime<Utc>,
        first_update: bool,
    ) -> Result<Vec<ServiceWithCircuitBreaker>> {
        let entries = self.handler.execute(false, |tx| {
            let relations = if first_update {
                tx.load_all::<CircuitBreakerRelation>()?
            } else {
                tx.load_values_by_filter::<CircuitBreakerRelation, _, _>(
                    &[relation_fields::MODIFY_TIME],
                    |p| p.time(relation_fields::MODIFY_TIME).is_some_and(|t| t >= mtime),
                )?
            };

            let mut entries = Vec::with_capacity(relations.len());
            for (key, relation) in relations {
                let resolved = check_relation_key(&key, &relation)
                    .and_then(|()| load_rule(tx, &relation.rule_id, &relation.rule_version));
                match resolved {
                    Ok(Some(circuit_breaker)) => entries.push(ServiceWithCircuitBreaker {
                        service_id: relation.service_id,
                        circuit_breaker,
                        valid: relation.valid,
                        create_time: relation.create_time,
                        modify_time: relation.modify_time,
                    }),
                    Ok(None) => warn!(
                        component = component::CACHE,
                        service_id = %key,
                        rule = %relation.rule_key(),
                        "bound rule not found, entry dropped"
                    ),
                    Err(e) if e.backend_kind().is_some() => return Err(e),
                    Err(e) => warn!(
                        component = component::CACHE,
                        service_id = %key,
                        error = %e,
                        "bound rule unreadable, entry dropped"
                    ),
                }
            }
            Ok(entries)
        })?;

        debug!(
            component = component::CACHE,
            since = %mtime,
            first_update,
            count = entries.len(),
            "collected cache entries"
        );
        Ok(entries)
    }
}

impl CircuitBreakerCacheFeed for SqliteCircuitBreakerCache {
    fn get_circuit_breakers_for_cache(
        &self,
        mtime: DateTime<Utc>,
        first_update: bool,
    ) -> StoreResult<Vec<ServiceWithCircuitBreaker>> {
        self.changed_since(mtime, first_update)
            .map_err(report(component::CACHE, "get_for_cache"))
    }
}
