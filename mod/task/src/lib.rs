pub mod api;
pub mod engine;
pub mod model;
pub mod store;

use std::sync::Arc;

use axum::Router;

use workbridge_account::store::AccountStore;
use workbridge_core::Module;
use workbridge_reward::ledger::RewardLedger;
use workbridge_store::EntityStore;

use engine::TaskEngine;
use store::TaskStore;

/// The Task module — the marketplace's lifecycle engine.
///
/// Owns task creation, claiming, unit submission, pause/cancel, review
/// and feedback, and hands completion credits to the reward ledger.
pub struct TaskModule {
    engine: Arc<TaskEngine>,
}

impl TaskModule {
    pub fn new(
        db: Arc<dyn EntityStore>,
        accounts: Arc<AccountStore>,
        ledger: Arc<RewardLedger>,
    ) -> Result<Self, workbridge_core::ServiceError> {
        let store = Arc::new(TaskStore::new(db)?);
        let engine = Arc::new(TaskEngine::new(store, accounts, ledger));
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Arc<TaskEngine> {
        &self.engine
    }
}

impl Module for TaskModule {
    fn name(&self) -> &str {
        "task"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.engine))
    }
}
