//! Circuit-breaker rule store
//!
//! Rules live in `circuitbreaker_rule` under `<id>_<version>`, bindings in
//! `circuitbreaker_rule_relation` under the service id. Every
//! check-then-write sequence runs inside one [`TxHandler::execute`] call.
//!
//! Two different identities can render to the same storage key (`a_b` +
//! `c` and `a` + `b_c`). Writes refuse to overwrite a valid row owned by another
//! identity; reads treat such a row as absent.

use std::sync::Arc;

use chrono::Utc;
use govstore_core::model::{relation_fields, rule_fields, rule_key};
use govstore_core::storage::{
    CircuitBreakerStore, NotFoundKind, ServiceLookup, StoreError, StoreResult,
};
use govstore_core::{
    paginate, CircuitBreaker, CircuitBreakerDetail, CircuitBreakerInfo, CircuitBreakerRelation,
    FieldValue, Filters, OffsetOverflow, Record, VERSION_MASTER,
};
use tracing::{debug, info, warn};

use crate::error::{report, Result};
use crate::handler::{Tx, TxHandler};
use crate::telemetry::component;

/// Rule store over the shared handler.
pub struct SqliteCircuitBreakerStore {
    handler: TxHandler,
    services: Arc<dyn ServiceLookup>,
    offset_overflow: OffsetOverflow,
}

impl SqliteCircuitBreakerStore {
    /// `services` resolves the service side of rule-by-service lookups and
    /// release listings. It is only called outside transactions, so it may
    /// share `handler`.
    pub fn new(handler: TxHandler, services: Arc<dyn ServiceLookup>) -> Self {
        Self {
            handler,
            services,
            offset_overflow: OffsetOverflow::default(),
        }
    }

    /// Set what list calls return when `offset` is past the end.
    pub fn with_offset_overflow(mut self, policy: OffsetOverflow) -> Self {
        self.offset_overflow = policy;
        self
    }

    pub fn offset_overflow(&self) -> OffsetOverflow {
        self.offset_overflow
    }

    fn create(&self, mut cb: CircuitBreaker) -> Result<()> {
        require("id", &cb.id)?;
        if !cb.is_master() {
            return Err(StoreError::InvalidArgument(format!(
                "create expects version `{}`, got `{}`",
                VERSION_MASTER, cb.version
            ))
            .into());
        }

        let now = Utc::now();
        cb.valid = true;
        cb.create_time = now;
        cb.modify_time = now;

        self.handler.execute(true, |tx| {
            ensure_key_owner(tx, &cb)?;
            tx.delete_values::<CircuitBreaker, _>(&[cb.key()])?;
            tx.save_value(&cb)
        })?;
        debug!(
            component = component::CIRCUIT_BREAKER,
            id = %cb.id,
            "created master rule"
        );
        Ok(())
    }

    fn tag(&self, mut cb: CircuitBreaker) -> Result<()> {
        require("id", &cb.id)?;
        require("version", &cb.version)?;
        if cb.is_master() {
            return Err(StoreError::InvalidArgument(format!(
                "tag version must not be `{}`",
                VERSION_MASTER
            ))
            .into());
        }

        let now = Utc::now();
        cb.valid = true;
        cb.create_time = now;
        cb.modify_time = now;

        self.handler.execute(true, |tx| {
            if load_valid_rule(tx, &cb.id, VERSION_MASTER)?.is_none() {
                return Err(StoreError::not_found(
                    NotFoundKind::MasterConfig,
                    format!("not exist master for rule {}", cb.id),
                )
                .into());
            }
            ensure_key_owner(tx, &cb)?;
            tx.delete_values::<CircuitBreaker, _>(&[cb.key()])?;
            tx.save_value(&cb)
        })?;
        debug!(
            component = component::CIRCUIT_BREAKER,
            id = %cb.id,
            version = %cb.version,
            "tagged rule"
        );
        Ok(())
    }

    fn release(&self, mut relation: CircuitBreakerRelation) -> Result<()> {
        require("service_id", &relation.service_id)?;
        require("rule_id", &relation.rule_id)?;
        require("rule_version", &relation.rule_version)?;

        let now = Utc::now();
        relation.valid = true;
        relation.create_time = now;
        relation.modify_time = now;

        self.handler.execute(true, |tx| {
            if load_valid_rule(tx, &relation.rule_id, &relation.rule_version)?.is_none() {
                let kind = if relation.rule_version == VERSION_MASTER {
                    NotFoundKind::MasterConfig
                } else {
                    NotFoundKind::TagConfig
                };
                return Err(StoreError::not_found(
                    kind,
                    format!("not found tag config {}", relation.rule_key()),
                )
                .into());
            }
            tx.save_value(&relation)
        })?;
        debug!(
            component = component::CIRCUIT_BREAKER,
            service_id = %relation.service_id,
            rule = %relation.rule_key(),
            "released rule"
        );
        Ok(())
    }

    fn unbind(&self, service_id: &str, rule_id: &str, rule_version: &str) -> Result<()> {
        let patched = self.handler.update_value::<CircuitBreakerRelation>(
            service_id,
            &[
                (relation_fields::VALID, FieldValue::Bool(false)),
                (relation_fields::MODIFY_TIME, FieldValue::Time(Utc::now())),
            ],
        )?;
        if !patched {
            debug!(
                component = component::CIRCUIT_BREAKER,
                service_id,
                rule = %rule_key(rule_id, rule_version),
                "no binding to unbind"
            );
        }
        Ok(())
    }

    fn delete_tag(&self, id: &str, version: &str) -> Result<()> {
        require("id", id)?;
        require("version", version)?;

        let deleted = self.handler.execute(true, |tx| {
            let holders = bindings_of(tx, id, version)?;
            if !holders.is_empty() {
                info!(
                    component = component::CIRCUIT_BREAKER,
                    id,
                    version,
                    bindings = holders.len(),
                    "rule is still bound, delete skipped"
                );
                return Ok(false);
            }

            if load_valid_rule(tx, id, version)?.is_none() {
                return Ok(false);
            }
            tx.update_value::<CircuitBreaker>(
                &rule_key(id, version),
                &[
                    (rule_fields::VALID, FieldValue::Bool(false)),
                    (rule_fields::MODIFY_TIME, FieldValue::Time(Utc::now())),
                ],
            )
        })?;
        if deleted {
            debug!(
                component = component::CIRCUIT_BREAKER,
                id,
                version,
                "soft-deleted rule"
            );
        }
        Ok(())
    }

    fn update(&self, cb: CircuitBreaker) -> Result<()> {
        require("id", &cb.id)?;
        require("version", &cb.version)?;

        let patch = [
            (rule_fields::NAME, FieldValue::from(cb.name)),
            (rule_fields::NAMESPACE, FieldValue::from(cb.namespace)),
            (rule_fields::BUSINESS, FieldValue::from(cb.business)),
            (rule_fields::DEPARTMENT, FieldValue::from(cb.department)),
            (rule_fields::COMMENT, FieldValue::from(cb.comment)),
            (rule_fields::INBOUNDS, FieldValue::from(cb.inbounds)),
            (rule_fields::OUTBOUNDS, FieldValue::from(cb.outbounds)),
            (rule_fields::TOKEN, FieldValue::from(cb.token)),
            (rule_fields::OWNER, FieldValue::from(cb.owner)),
            (rule_fields::REVISION, FieldValue::from(cb.revision)),
            (rule_fields::MODIFY_TIME, FieldValue::Time(Utc::now())),
        ];

        self.handler.execute(true, |tx| {
            if load_valid_rule(tx, &cb.id, &cb.version)?.is_none() {
                return Err(StoreError::not_found(
                    NotFoundKind::CircuitBreaker,
                    format!("rule {} does not exist", rule_key(&cb.id, &cb.version)),
                )
                .into());
            }
            tx.update_value::<CircuitBreaker>(&rule_key(&cb.id, &cb.version), &patch)?;
            Ok(())
        })
    }

    fn versions(&self, id: &str) -> Result<Vec<String>> {
        let rules = self.handler.load_values_by_filter::<CircuitBreaker, _, _>(
            &[rule_fields::ID, rule_fields::VALID],
            |p| p.flag(rule_fields::VALID) && p.str(rule_fields::ID) == Some(id),
        )?;
        Ok(rules.into_values().map(|cb| cb.version).collect())
    }

    fn relations(&self, rule_id: &str, rule_version: &str) -> Result<Vec<CircuitBreakerRelation>> {
        let relations = self
            .handler
            .load_values_by_filter::<CircuitBreakerRelation, _, _>(
                &[
                    relation_fields::RULE_ID,
                    relation_fields::RULE_VERSION,
                    relation_fields::VALID,
                ],
                |p| {
                    p.flag(relation_fields::VALID)
                        && p.str(relation_fields::RULE_ID) == Some(rule_id)
                        && p.str(relation_fields::RULE_VERSION) == Some(rule_version)
                },
            )?;
        Ok(relations.into_values().collect())
    }

    fn by_service(&self, name: &str, namespace: &str) -> Result<Option<CircuitBreaker>> {
        let Some(service) = self.services.get_service_by_name(name, namespace)? else {
            warn!(
                component = component::CIRCUIT_BREAKER,
                name, namespace, "service not found"
            );
            return Ok(None);
        };

        self.handler.execute(false, |tx| {
            let relation = tx
                .load_value::<CircuitBreakerRelation>(&service.id)?
                .filter(|r| r.valid);
            let Some(relation) = relation else {
                warn!(
                    component = component::CIRCUIT_BREAKER,
                    service_id = %service.id,
                    "service has no released rule"
                );
                return Ok(None);
            };
            check_relation_key(&service.id, &relation)?;
            load_valid_rule(tx, &relation.rule_id, &relation.rule_version)
        })
    }

    fn list_master(&self, filters: &Filters, offset: u32, limit: u32) -> Result<CircuitBreakerDetail> {
        filters.validate::<CircuitBreaker>()?;

        let mut fields = filters.fields();
        fields.extend([rule_fields::VERSION, rule_fields::VALID]);

        let rules = self
            .handler
            .load_values_by_filter::<CircuitBreaker, _, _>(&fields, |p| {
                p.flag(rule_fields::VALID)
                    && p.str(rule_fields::VERSION) == Some(VERSION_MASTER)
                    && filters.matches(p)
            })?;

        // Key order already breaks modify-time ties; the sort is stable.
        let mut rules: Vec<CircuitBreaker> = rules.into_values().collect();
        rules.sort_by_key(|cb| cb.modify_time);

        let total = count(rules.len());
        let infos = paginate(rules, offset, limit, self.offset_overflow)
            .into_iter()
            .map(|circuit_breaker| CircuitBreakerInfo {
                circuit_breaker,
                services: Vec::new(),
            })
            .collect();
        Ok(CircuitBreakerDetail { total, infos })
    }

    fn list_release(&self, filters: &Filters, offset: u32, limit: u32) -> Result<CircuitBreakerDetail> {
        filters.validate::<CircuitBreakerRelation>()?;

        let mut fields = filters.fields();
        fields.push(relation_fields::VALID);

        let bound = self.handler.execute(false, |tx| {
            let relations = tx.load_values_by_filter::<CircuitBreakerRelation, _, _>(
                &fields,
                |p| p.flag(relation_fields::VALID) && filters.matches(p),
            )?;

            let mut bound = Vec::with_capacity(relations.len());
            for (key, relation) in relations {
                check_relation_key(&key, &relation)?;
                match load_valid_rule(tx, &relation.rule_id, &relation.rule_version)? {
                    Some(cb) => bound.push((relation.service_id, cb)),
                    None => warn!(
                        component = component::CIRCUIT_BREAKER,
                        service_id = %key,
                        rule = %relation.rule_key(),
                        "released rule not found, entry dropped"
                    ),
                }
            }
            Ok(bound)
        })?;

        let mut infos = Vec::with_capacity(bound.len());
        for (service_id, circuit_breaker) in bound {
            match self.services.get_service(&service_id)? {
                Some(service) => infos.push(CircuitBreakerInfo {
                    circuit_breaker,
                    services: vec![service],
                }),
                None => warn!(
                    component = component::CIRCUIT_BREAKER,
                    service_id = %service_id,
                    "bound service not found, entry dropped"
                ),
            }
        }

        infos.sort_by(|a, b| {
            let (ra, rb) = (&a.circuit_breaker, &b.circuit_breaker);
            ra.modify_time
                .cmp(&rb.modify_time)
                .then_with(|| ra.key().cmp(&rb.key()))
                .then_with(|| first_service_id(a).cmp(first_service_id(b)))
        });

        let total = count(infos.len());
        let infos = paginate(infos, offset, limit, self.offset_overflow);
        Ok(CircuitBreakerDetail { total, infos })
    }
}

impl CircuitBreakerStore for SqliteCircuitBreakerStore {
    fn create_circuit_breaker(&self, cb: CircuitBreaker) -> StoreResult<()> {
        self.create(cb).map_err(report(component::CIRCUIT_BREAKER, "create"))
    }

    fn tag_circuit_breaker(&self, cb: CircuitBreaker) -> StoreResult<()> {
        self.tag(cb).map_err(report(component::CIRCUIT_BREAKER, "tag"))
    }

    fn release_circuit_breaker(&self, relation: CircuitBreakerRelation) -> StoreResult<()> {
        self.release(relation)
            .map_err(report(component::CIRCUIT_BREAKER, "release"))
    }

    fn unbind_circuit_breaker(
        &self,
        service_id: &str,
        rule_id: &str,
        rule_version: &str,
    ) -> StoreResult<()> {
        self.unbind(service_id, rule_id, rule_version)
            .map_err(report(component::CIRCUIT_BREAKER, "unbind"))
    }

    fn delete_tag_circuit_breaker(&self, id: &str, version: &str) -> StoreResult<()> {
        self.delete_tag(id, version)
            .map_err(report(component::CIRCUIT_BREAKER, "delete"))
    }

    fn update_circuit_breaker(&self, cb: CircuitBreaker) -> StoreResult<()> {
        self.update(cb).map_err(report(component::CIRCUIT_BREAKER, "update"))
    }

    fn get_circuit_breaker(&self, id: &str, version: &str) -> StoreResult<Option<CircuitBreaker>> {
        self.handler
            .execute(false, |tx| load_valid_rule(tx, id, version))
            .map_err(report(component::CIRCUIT_BREAKER, "get"))
    }

    fn get_circuit_breaker_versions(&self, id: &str) -> StoreResult<Vec<String>> {
        self.versions(id)
            .map_err(report(component::CIRCUIT_BREAKER, "versions"))
    }

    fn get_circuit_breaker_relation(
        &self,
        rule_id: &str,
        rule_version: &str,
    ) -> StoreResult<Vec<CircuitBreakerRelation>> {
        self.relations(rule_id, rule_version)
            .map_err(report(component::CIRCUIT_BREAKER, "relations"))
    }

    fn get_circuit_breakers_by_service(
        &self,
        name: &str,
        namespace: &str,
    ) -> StoreResult<Option<CircuitBreaker>> {
        self.by_service(name, namespace)
            .map_err(report(component::CIRCUIT_BREAKER, "by_service"))
    }

    fn list_master_circuit_breakers(
        &self,
        filters: &Filters,
        offset: u32,
        limit: u32,
    ) -> StoreResult<CircuitBreakerDetail> {
        self.list_master(filters, offset, limit)
            .map_err(report(component::CIRCUIT_BREAKER, "list_master"))
    }

    fn list_release_circuit_breakers(
        &self,
        filters: &Filters,
        offset: u32,
        limit: u32,
    ) -> StoreResult<CircuitBreakerDetail> {
        self.list_release(filters, offset, limit)
            .map_err(report(component::CIRCUIT_BREAKER, "list_release"))
    }
}

/// The rule stored under `(id, version)`, whatever its `valid` flag.
///
/// A row owned by a different identity that happens to share the key is
/// reported as absent.
pub(crate) fn load_rule(tx: &Tx<'_>, id: &str, version: &str) -> Result<Option<CircuitBreaker>> {
    let key = rule_key(id, version);
    let Some(cb) = tx.load_value::<CircuitBreaker>(&key)? else {
        return Ok(None);
    };
    if cb.storage_key() != key {
        return Err(StoreError::Invariant(format!(
            "rule stored under `{}` renders to key `{}`",
            key,
            cb.storage_key()
        ))
        .into());
    }
    if cb.id != id || cb.version != version {
        return Ok(None);
    }
    Ok(Some(cb))
}

/// Like [`load_rule`], but only a valid rule counts.
pub(crate) fn load_valid_rule(
    tx: &Tx<'_>,
    id: &str,
    version: &str,
) -> Result<Option<CircuitBreaker>> {
    Ok(load_rule(tx, id, version)?.filter(|cb| cb.valid))
}

/// Refuse to write `cb` over a valid row that belongs to another identity.
/// A soft-deleted foreign row may be replaced.
fn ensure_key_owner(tx: &Tx<'_>, cb: &CircuitBreaker) -> Result<()> {
    let key = cb.key();
    if let Some(stored) = tx.load_value::<CircuitBreaker>(&key)? {
        if stored.valid && (stored.id != cb.id || stored.version != cb.version) {
            return Err(StoreError::InvalidArgument(format!(
                "key `{}` is already used by rule id={} version={}",
                key, stored.id, stored.version
            ))
            .into());
        }
    }
    Ok(())
}

/// Valid bindings that keep `(id, version)` from being deleted. Any binding
/// of the id holds the master; a tag is held only at its exact version.
fn bindings_of(tx: &Tx<'_>, id: &str, version: &str) -> Result<Vec<CircuitBreakerRelation>> {
    let whole_rule = version == VERSION_MASTER;
    let relations = tx.load_values_by_filter::<CircuitBreakerRelation, _, _>(
        &[
            relation_fields::RULE_ID,
            relation_fields::RULE_VERSION,
            relation_fields::VALID,
        ],
        |p| {
            p.flag(relation_fields::VALID)
                && p.str(relation_fields::RULE_ID) == Some(id)
                && (whole_rule || p.str(relation_fields::RULE_VERSION) == Some(version))
        },
    )?;
    Ok(relations.into_values().collect())
}

pub(crate) fn check_relation_key(key: &str, relation: &CircuitBreakerRelation) -> Result<()> {
    if relation.service_id != key {
        return Err(StoreError::Invariant(format!(
            "binding stored under `{}` belongs to service `{}`",
            key, relation.service_id
        ))
        .into());
    }
    Ok(())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidArgument(format!("{} must not be empty", field)).into());
    }
    Ok(())
}

fn first_service_id(info: &CircuitBreakerInfo) -> &str {
    info.services.first().map(|s| s.id.as_str()).unwrap_or_default()
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
