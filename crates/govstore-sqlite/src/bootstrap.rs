//! First-start seed data
//!
//! [`seed`] writes the admin account, its default strategy, the fixed
//! namespaces and the internal services in one write transaction. Each row
//! is written only if nothing is stored at its fixed id yet (a soft-deleted
//! row counts as present), so running it again changes nothing.

use chrono::Utc;
use govstore_core::model::{
    AuthAction, Principal, PrincipalRole, ResourceType, StrategyResource, UserRole, RESOURCE_ANY,
};
use govstore_core::{Namespace, Service, Strategy, User};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::handler::{Tx, TxHandler};
use crate::naming::{insert_namespace, insert_service};
use crate::telemetry::component;

pub const DEFAULT_ADMIN_ID: &str = "65e4789a6d5b49669adf1e9e8387549c";
pub const DEFAULT_STRATEGY_ID: &str = "fbca9bfa04ae4ead86e1ecf5811e32a9";
pub const DEFAULT_ADMIN_TOKEN: &str =
    "nu/0WRA4EqSR1FagrjRj0fZwPXuGlMpX+zCuWu4uMqy8xr1vRjisSbA25aAC3mtU8MeeRsKhQiDAynUR09I=";
pub const DEFAULT_STRATEGY_NAME: &str = "(用户) polaris的默认策略";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const SYSTEM_NAMESPACE: &str = "Polaris";

/// The admin account created on first start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedAdmin {
    pub id: String,
    pub name: String,
    /// bcrypt hash of the initial password
    pub password: String,
    pub source: String,
    /// Initial API token; a fresh one is generated when empty
    pub token: String,
    pub comment: String,
}

impl Default for SeedAdmin {
    fn default() -> Self {
        Self {
            id: DEFAULT_ADMIN_ID.to_string(),
            name: "polaris".to_string(),
            password: "$2a$10$3izWuZtE5SBdAtSZci.gs.iZ2pAn9I8hEqYrC6gwJp1dyjqQnrrum".to_string(),
            source: "Polaris".to_string(),
            token: DEFAULT_ADMIN_TOKEN.to_string(),
            comment: "default polaris admin account".to_string(),
        }
    }
}

/// The admin's default strategy, granting read-write on every namespace,
/// service and config group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedStrategy {
    pub id: String,
    pub name: String,
    pub comment: String,
}

impl Default for SeedStrategy {
    fn default() -> Self {
        Self {
            id: DEFAULT_STRATEGY_ID.to_string(),
            name: DEFAULT_STRATEGY_NAME.to_string(),
            comment: "default admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedService {
    pub id: String,
    pub name: String,
    pub namespace: String,
}

/// Everything [`seed`] writes. The default carries the well-known ids
/// clients expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Owner of the seeded namespaces and services
    pub owner: String,
    pub admin: SeedAdmin,
    pub strategy: SeedStrategy,
    pub namespaces: Vec<String>,
    pub services: Vec<SeedService>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            owner: "polaris".to_string(),
            admin: SeedAdmin::default(),
            strategy: SeedStrategy::default(),
            namespaces: vec![DEFAULT_NAMESPACE.to_string(), SYSTEM_NAMESPACE.to_string()],
            services: vec![SeedService {
                id: DEFAULT_STRATEGY_ID.to_string(),
                name: "polaris.checker".to_string(),
                namespace: SYSTEM_NAMESPACE.to_string(),
            }],
        }
    }
}

/// Rows written by one [`seed`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub strategies: usize,
    pub namespaces: usize,
    pub services: usize,
}

impl SeedReport {
    pub fn inserted(&self) -> usize {
        self.users + self.strategies + self.namespaces + self.services
    }

    /// True when the store was already fully seeded.
    pub fn is_noop(&self) -> bool {
        self.inserted() == 0
    }
}

/// Seed `handler` with `config`. Safe to call on every start.
pub fn seed(handler: &TxHandler, config: &SeedConfig) -> Result<SeedReport> {
    let report = handler.execute(true, |tx| {
        let mut report = SeedReport::default();

        if tx.load_value::<User>(&config.admin.id)?.is_none() {
            tx.save_value(&admin_user(&config.admin))?;
            report.users += 1;
        }
        if tx.load_value::<Strategy>(&config.strategy.id)?.is_none() {
            tx.save_value(&default_strategy(&config.strategy, &config.admin))?;
            report.strategies += 1;
        }

        for name in &config.namespaces {
            if tx.load_value::<Namespace>(name)?.is_none() {
                insert_namespace(
                    tx,
                    Namespace {
                        name: name.clone(),
                        token: new_token(),
                        owner: config.owner.clone(),
                        ..Default::default()
                    },
                )?;
                report.namespaces += 1;
            }
        }

        for svc in &config.services {
            if seed_service(tx, svc, &config.owner)? {
                report.services += 1;
            }
        }
        Ok(report)
    })?;

    info!(
        component = component::BOOTSTRAP,
        users = report.users,
        strategies = report.strategies,
        namespaces = report.namespaces,
        services = report.services,
        "store seeded"
    );
    Ok(report)
}

fn seed_service(tx: &Tx<'_>, svc: &SeedService, owner: &str) -> Result<bool> {
    if tx.load_value::<Service>(&svc.id)?.is_some() {
        return Ok(false);
    }
    insert_service(
        tx,
        Service {
            id: svc.id.clone(),
            name: svc.name.clone(),
            namespace: svc.namespace.clone(),
            token: new_token(),
            owner: owner.to_string(),
            revision: new_token(),
            ..Default::default()
        },
    )?;
    Ok(true)
}

fn admin_user(admin: &SeedAdmin) -> User {
    let now = Utc::now();
    User {
        id: admin.id.clone(),
        name: admin.name.clone(),
        password: admin.password.clone(),
        source: admin.source.clone(),
        role: UserRole::Owner,
        token: if admin.token.is_empty() {
            new_token()
        } else {
            admin.token.clone()
        },
        token_enable: true,
        valid: true,
        comment: admin.comment.clone(),
        create_time: now,
        modify_time: now,
        ..Default::default()
    }
}

fn default_strategy(strategy: &SeedStrategy, admin: &SeedAdmin) -> Strategy {
    let now = Utc::now();
    let resources = [
        ResourceType::Namespaces,
        ResourceType::Services,
        ResourceType::ConfigGroups,
    ]
    .into_iter()
    .map(|res_type| StrategyResource {
        strategy_id: strategy.id.clone(),
        res_type,
        res_id: RESOURCE_ANY.to_string(),
    })
    .collect();

    Strategy {
        id: strategy.id.clone(),
        name: strategy.name.clone(),
        action: AuthAction::ReadWrite,
        comment: strategy.comment.clone(),
        principals: vec![Principal {
            strategy_id: strategy.id.clone(),
            principal_id: admin.id.clone(),
            role: PrincipalRole::User,
        }],
        default: true,
        owner: admin.id.clone(),
        resources,
        valid: true,
        revision: strategy.id.clone(),
        create_time: now,
        modify_time: now,
    }
}

fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
