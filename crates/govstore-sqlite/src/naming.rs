//! Namespace and service sub-stores

use chrono::Utc;
use govstore_core::model::{namespace_fields, service_fields};
use govstore_core::storage::{ServiceLookup, StoreError, StoreResult};
use govstore_core::{Namespace, Service};
use tracing::debug;

use crate::error::{report, Result};
use crate::handler::{Tx, TxHandler};
use crate::telemetry::component;

/// Services over the shared handler.
#[derive(Clone)]
pub struct ServiceStore {
    handler: TxHandler,
}

impl ServiceStore {
    pub fn new(handler: TxHandler) -> Self {
        Self { handler }
    }

    /// Store a service. Its name must be unused by any other valid service
    /// of the same namespace.
    pub fn add_service(&self, service: Service) -> StoreResult<()> {
        let id = service.id.clone();
        self.handler
            .execute(true, |tx| insert_service(tx, service))
            .map_err(report(component::SERVICE, "add"))?;
        debug!(component = component::SERVICE, id = %id, "added service");
        Ok(())
    }

    pub fn get_service(&self, id: &str) -> StoreResult<Option<Service>> {
        self.handler
            .execute(false, |tx| load_valid_service(tx, id))
            .map_err(report(component::SERVICE, "get"))
    }

    pub fn get_service_by_name(&self, name: &str, namespace: &str) -> StoreResult<Option<Service>> {
        self.handler
            .execute(false, |tx| find_service_by_name(tx, name, namespace))
            .map_err(report(component::SERVICE, "get_by_name"))
    }
}

impl ServiceLookup for ServiceStore {
    fn get_service_by_name(&self, name: &str, namespace: &str) -> StoreResult<Option<Service>> {
        ServiceStore::get_service_by_name(self, name, namespace)
    }

    fn get_service(&self, id: &str) -> StoreResult<Option<Service>> {
        ServiceStore::get_service(self, id)
    }
}

/// Insert or replace a service inside an open transaction, stamping it
/// valid with fresh timestamps.
pub(crate) fn insert_service(tx: &Tx<'_>, mut service: Service) -> Result<()> {
    if service.id.is_empty() || service.name.is_empty() || service.namespace.is_empty() {
        return Err(StoreError::InvalidArgument(
            "service id, name and namespace must not be empty".to_string(),
        )
        .into());
    }
    if let Some(existing) = find_service_by_name(tx, &service.name, &service.namespace)? {
        if existing.id != service.id {
            return Err(StoreError::InvalidArgument(format!(
                "service {}/{} already exists with id {}",
                service.namespace, service.name, existing.id
            ))
            .into());
        }
    }

    let now = Utc::now();
    service.valid = true;
    service.create_time = now;
    service.modify_time = now;
    tx.save_value(&service)
}

pub(crate) fn load_valid_service(tx: &Tx<'_>, id: &str) -> Result<Option<Service>> {
    Ok(tx.load_value::<Service>(id)?.filter(|s| s.valid))
}

/// The valid service named `name` in `namespace`. More than one match
/// means the uniqueness check on insert was bypassed.
pub(crate) fn find_service_by_name(
    tx: &Tx<'_>,
    name: &str,
    namespace: &str,
) -> Result<Option<Service>> {
    let matches = tx.load_values_by_filter::<Service, _, _>(
        &[
            service_fields::NAME,
            service_fields::NAMESPACE,
            service_fields::VALID,
        ],
        |p| {
            p.flag(service_fields::VALID)
                && p.str(service_fields::NAME) == Some(name)
                && p.str(service_fields::NAMESPACE) == Some(namespace)
        },
    )?;

    if matches.len() > 1 {
        return Err(StoreError::Invariant(format!(
            "{} valid services named {}/{}",
            matches.len(),
            namespace,
            name
        ))
        .into());
    }
    Ok(matches.into_values().next())
}

/// Namespaces over the shared handler.
#[derive(Clone)]
pub struct NamespaceStore {
    handler: TxHandler,
}

impl NamespaceStore {
    pub fn new(handler: TxHandler) -> Self {
        Self { handler }
    }

    pub fn add_namespace(&self, namespace: Namespace) -> StoreResult<()> {
        self.handler
            .execute(true, |tx| insert_namespace(tx, namespace))
            .map_err(report(component::NAMESPACE, "add"))
    }

    pub fn get_namespace(&self, name: &str) -> StoreResult<Option<Namespace>> {
        self.handler
            .execute(false, |tx| {
                Ok(tx.load_value::<Namespace>(name)?.filter(|n| n.valid))
            })
            .map_err(report(component::NAMESPACE, "get"))
    }

    /// Valid namespaces in name order.
    pub fn list_namespaces(&self) -> StoreResult<Vec<Namespace>> {
        self.handler
            .load_values_by_filter::<Namespace, _, _>(&[namespace_fields::VALID], |p| {
                p.flag(namespace_fields::VALID)
            })
            .map(|found| found.into_values().collect())
            .map_err(report(component::NAMESPACE, "list"))
    }
}

pub(crate) fn insert_namespace(tx: &Tx<'_>, mut namespace: Namespace) -> Result<()> {
    if namespace.name.is_empty() {
        return Err(StoreError::InvalidArgument("namespace name must not be empty".to_string()).into());
    }
    let now = Utc::now();
    namespace.valid = true;
    namespace.create_time = now;
    namespace.modify_time = now;
    tx.save_value(&namespace)
}
