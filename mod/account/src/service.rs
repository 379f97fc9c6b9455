use std::sync::Arc;

use rust_decimal::Decimal;

use workbridge_core::now_rfc3339;
use workbridge_store::FieldValue;

use crate::model::{
    Enterprise, ForgotPasswordRequest, RegisterEnterpriseRequest, RegisterWorkerRequest, Subject,
    UpdateEnterpriseProfileRequest, UpdateWorkerProfileRequest, Worker,
};
use crate::password::{hash_password, verify_password};
use crate::store::{AccountError, AccountStore};
use crate::token::TokenService;

/// Registration, login and profile management for both account kinds.
pub struct AccountService {
    store: Arc<AccountStore>,
    tokens: Arc<TokenService>,
}

impl AccountService {
    pub fn new(store: Arc<AccountStore>, tokens: Arc<TokenService>) -> Arc<Self> {
        Arc::new(Self { store, tokens })
    }

    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.tokens.ttl_secs()
    }

    // ── Workers ─────────────────────────────────────────────────────

    pub fn register_worker(&self, req: RegisterWorkerRequest) -> Result<Worker, AccountError> {
        let username = req.username.trim();
        let phone = req.phone.trim();
        let email = req.email.trim();

        if username.is_empty() {
            return Err(AccountError::Validation("username is required".into()));
        }
        if phone.is_empty() {
            return Err(AccountError::Validation("phone is required".into()));
        }
        if email.is_empty() {
            return Err(AccountError::Validation("email is required".into()));
        }
        if req.password.is_empty() {
            return Err(AccountError::Validation("password is required".into()));
        }

        // Prechecks give readable messages; the unique indexes still
        // catch any registration that races past them.
        if self.store.worker_by_field("username", username)?.is_some() {
            return Err(AccountError::Conflict(format!(
                "username {username} is already registered"
            )));
        }
        if self.store.worker_by_field("phone", phone)?.is_some() {
            return Err(AccountError::Conflict(format!(
                "phone number {phone} is already registered"
            )));
        }
        if self.store.worker_by_field("email", email)?.is_some() {
            return Err(AccountError::Conflict(format!(
                "email {email} is already registered"
            )));
        }

        let hash = hash_password(&req.password).map_err(AccountError::Internal)?;
        let user_id = self.store.next_worker_id()?;
        let now = now_rfc3339();
        let worker = Worker {
            user_id,
            username: username.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            balance: Decimal::ZERO,
            status: "active".to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.create_worker(&worker, &hash)?;

        tracing::info!(user_id, username, "registered worker");
        Ok(worker)
    }

    /// Verify credentials and mint a bearer token. Unknown usernames
    /// and wrong passwords come back as the same error so the response
    /// does not leak which accounts exist.
    pub fn login_worker(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Worker, String), AccountError> {
        let (worker, hash) = self
            .store
            .worker_by_field("username", username.trim())?
            .ok_or_else(bad_credentials)?;
        if !verify_password(password, &hash) {
            return Err(bad_credentials());
        }

        let token = self
            .tokens
            .issue(Subject::worker(worker.user_id))
            .map_err(|e| AccountError::Internal(e.to_string()))?;

        tracing::info!(user_id = worker.user_id, "worker login");
        Ok((worker, token))
    }

    /// Reset a worker password by matching a registered contact. The
    /// contact type picks which field to match against.
    pub fn reset_password(&self, req: ForgotPasswordRequest) -> Result<(), AccountError> {
        let field = match req.contact_type.as_str() {
            "phone" => "phone",
            "email" => "email",
            other => {
                return Err(AccountError::Validation(format!(
                    "contact_type must be phone or email, got {other}"
                )));
            }
        };
        if req.new_password.is_empty() {
            return Err(AccountError::Validation("new password is required".into()));
        }

        let (worker, _) = self
            .store
            .worker_by_field(field, req.contact.trim())?
            .ok_or_else(|| {
                AccountError::NotFound(format!("no worker account matches that {field}"))
            })?;

        let hash = hash_password(&req.new_password).map_err(AccountError::Internal)?;
        self.store.set_worker_password(worker.user_id, &hash)?;

        tracing::info!(user_id = worker.user_id, "worker password reset");
        Ok(())
    }

    pub fn get_worker(&self, user_id: i64) -> Result<Worker, AccountError> {
        self.store
            .worker_by_id(user_id)?
            .ok_or_else(|| AccountError::NotFound(format!("worker {user_id}")))
    }

    pub fn update_worker_profile(
        &self,
        user_id: i64,
        req: UpdateWorkerProfileRequest,
    ) -> Result<Worker, AccountError> {
        let current = self.get_worker(user_id)?;
        let mut fields: Vec<(&str, FieldValue)> = Vec::new();

        if let Some(username) = &req.username {
            let username = username.trim();
            if username.is_empty() {
                return Err(AccountError::Validation("username cannot be blank".into()));
            }
            if username != current.username
                && self.store.worker_by_field("username", username)?.is_some()
            {
                return Err(AccountError::Conflict(format!(
                    "username {username} is already registered"
                )));
            }
            fields.push(("username", FieldValue::text(username)));
        }
        if let Some(phone) = &req.phone {
            let phone = phone.trim();
            if phone.is_empty() {
                return Err(AccountError::Validation("phone cannot be blank".into()));
            }
            if phone != current.phone && self.store.worker_by_field("phone", phone)?.is_some() {
                return Err(AccountError::Conflict(format!(
                    "phone number {phone} is already registered"
                )));
            }
            fields.push(("phone", FieldValue::text(phone)));
        }
        if let Some(email) = &req.email {
            let email = email.trim();
            if email.is_empty() {
                return Err(AccountError::Validation("email cannot be blank".into()));
            }
            if email != current.email && self.store.worker_by_field("email", email)?.is_some() {
                return Err(AccountError::Conflict(format!(
                    "email {email} is already registered"
                )));
            }
            fields.push(("email", FieldValue::text(email)));
        }

        if fields.is_empty() {
            return Ok(current);
        }

        self.store.update_worker_fields(user_id, &fields)?;
        self.get_worker(user_id)
    }

    // ── Enterprises ─────────────────────────────────────────────────

    pub fn register_enterprise(
        &self,
        req: RegisterEnterpriseRequest,
    ) -> Result<Enterprise, AccountError> {
        let email = req.email.trim();
        let name = req.name.trim();

        if email.is_empty() {
            return Err(AccountError::Validation("email is required".into()));
        }
        if name.is_empty() {
            return Err(AccountError::Validation("company name is required".into()));
        }
        if req.password.is_empty() {
            return Err(AccountError::Validation("password is required".into()));
        }

        if self.store.enterprise_by_email(email)?.is_some() {
            return Err(AccountError::Conflict(format!(
                "email {email} is already registered"
            )));
        }

        let hash = hash_password(&req.password).map_err(AccountError::Internal)?;
        let id = self.store.next_enterprise_id()?;
        let now = now_rfc3339();
        let enterprise = Enterprise {
            id,
            email: email.to_string(),
            name: name.to_string(),
            address: req.address.trim().to_string(),
            industry: req.industry.trim().to_string(),
            registration_no: req.registration_no.trim().to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.create_enterprise(&enterprise, &hash)?;

        tracing::info!(enterprise_id = id, name, "registered enterprise");
        Ok(enterprise)
    }

    pub fn login_enterprise(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Enterprise, String), AccountError> {
        let (enterprise, hash) = self
            .store
            .enterprise_by_email(email.trim())?
            .ok_or_else(bad_credentials)?;
        if !verify_password(password, &hash) {
            return Err(bad_credentials());
        }

        let token = self
            .tokens
            .issue(Subject::enterprise(enterprise.id))
            .map_err(|e| AccountError::Internal(e.to_string()))?;

        tracing::info!(enterprise_id = enterprise.id, "enterprise login");
        Ok((enterprise, token))
    }

    pub fn get_enterprise(&self, id: i64) -> Result<Enterprise, AccountError> {
        self.store
            .enterprise_by_id(id)?
            .ok_or_else(|| AccountError::NotFound(format!("enterprise {id}")))
    }

    pub fn update_enterprise_profile(
        &self,
        id: i64,
        req: UpdateEnterpriseProfileRequest,
    ) -> Result<Enterprise, AccountError> {
        let current = self.get_enterprise(id)?;
        let mut fields: Vec<(&str, FieldValue)> = Vec::new();

        if let Some(name) = &req.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AccountError::Validation("company name cannot be blank".into()));
            }
            fields.push(("name", FieldValue::text(name)));
        }
        if let Some(address) = &req.address {
            fields.push(("address", FieldValue::text(address.trim())));
        }
        if let Some(industry) = &req.industry {
            fields.push(("industry", FieldValue::text(industry.trim())));
        }
        if let Some(registration_no) = &req.registration_no {
            fields.push(("registration_no", FieldValue::text(registration_no.trim())));
        }

        if fields.is_empty() {
            return Ok(current);
        }

        self.store.update_enterprise_fields(id, &fields)?;
        self.get_enterprise(id)
    }
}

fn bad_credentials() -> AccountError {
    AccountError::Unauthorized("invalid credentials".into())
}
