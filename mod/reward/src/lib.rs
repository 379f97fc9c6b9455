pub mod api;
pub mod ledger;
pub mod model;
pub mod store;

use std::sync::Arc;

use axum::Router;

use workbridge_account::store::AccountStore;
use workbridge_core::Module;
use workbridge_store::EntityStore;

use ledger::RewardLedger;
use store::RewardStore;

/// The Reward module — the marketplace's money side.
///
/// Owns the append-only reward ledger and the withdrawal pipeline, and
/// settles both against worker balances held by the account module.
pub struct RewardModule {
    ledger: Arc<RewardLedger>,
}

impl RewardModule {
    pub fn new(
        db: Arc<dyn EntityStore>,
        accounts: Arc<AccountStore>,
    ) -> Result<Self, workbridge_core::ServiceError> {
        let store = Arc::new(RewardStore::new(db)?);
        let ledger = RewardLedger::new(store, accounts);
        Ok(Self { ledger })
    }

    /// Ledger handle for the task engine's completion credits.
    pub fn ledger(&self) -> &Arc<RewardLedger> {
        &self.ledger
    }
}

impl Module for RewardModule {
    fn name(&self) -> &str {
        "reward"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.ledger))
    }
}
