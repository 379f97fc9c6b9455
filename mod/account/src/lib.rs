pub mod api;
pub mod model;
pub mod password;
pub mod service;
pub mod store;
pub mod token;

use std::sync::Arc;

use axum::Router;

use workbridge_core::Module;
use workbridge_store::EntityStore;

use service::AccountService;
use store::AccountStore;
use token::{TokenConfig, TokenService};

/// The Account module — worker and enterprise identity.
///
/// Owns registration, login, password reset and profile management, and
/// exposes the balance store other modules settle rewards against.
pub struct AccountModule {
    service: Arc<AccountService>,
    store: Arc<AccountStore>,
    tokens: Arc<TokenService>,
}

impl AccountModule {
    pub fn new(
        db: Arc<dyn EntityStore>,
        token_config: TokenConfig,
    ) -> Result<Self, workbridge_core::ServiceError> {
        let store = Arc::new(AccountStore::new(db)?);
        let tokens = Arc::new(TokenService::new(token_config));
        let service = AccountService::new(Arc::clone(&store), Arc::clone(&tokens));

        Ok(Self { service, store, tokens })
    }

    pub fn service(&self) -> &Arc<AccountService> {
        &self.service
    }

    /// Balance-bearing account store, shared with the reward module.
    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    /// Token service, shared with the server's auth middleware.
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }
}

impl Module for AccountModule {
    fn name(&self) -> &str {
        "account"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
