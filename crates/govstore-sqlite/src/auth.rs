//! User and strategy sub-stores
//!
//! Only the reads the control plane needs at startup live here; the seed
//! rows are written by [`crate::bootstrap`].

use govstore_core::storage::StoreResult;
use govstore_core::{Strategy, User};

use crate::error::report;
use crate::handler::TxHandler;
use crate::telemetry::component;

#[derive(Clone)]
pub struct UserStore {
    handler: TxHandler,
}

impl UserStore {
    pub fn new(handler: TxHandler) -> Self {
        Self { handler }
    }

    /// Valid user with this id.
    pub fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        self.handler
            .load_value::<User>(id)
            .map(|user| user.filter(|u| u.valid))
            .map_err(report(component::AUTH, "get_user"))
    }
}

#[derive(Clone)]
pub struct StrategyStore {
    handler: TxHandler,
}

impl StrategyStore {
    pub fn new(handler: TxHandler) -> Self {
        Self { handler }
    }

    /// Valid strategy with this id, principals and resources included.
    pub fn get_strategy(&self, id: &str) -> StoreResult<Option<Strategy>> {
        self.handler
            .load_value::<Strategy>(id)
            .map(|strategy| strategy.filter(|s| s.valid))
            .map_err(report(component::AUTH, "get_strategy"))
    }
}
