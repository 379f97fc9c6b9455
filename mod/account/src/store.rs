use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use workbridge_core::{ServiceError, now_rfc3339};
use workbridge_store::{Entity, EntityStore, FieldValue, StoreError, TableSpec};

use crate::model::{Enterprise, Worker};

pub const WORKERS: TableSpec = TableSpec {
    name: "workers",
    unique_fields: &["username", "phone", "email"],
};

pub const ENTERPRISES: TableSpec = TableSpec {
    name: "enterprises",
    unique_fields: &["email"],
};

/// Balance writes run as read-check-CAS loops; under contention a write
/// retries until it lands. The bound only exists to turn a livelock into
/// a visible storage error.
const BALANCE_CAS_RETRIES: usize = 32;

/// Account module error type.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(m) => AccountError::Conflict(m),
            StoreError::Encoding(m) => AccountError::Internal(m),
            StoreError::Connection(m) | StoreError::Backend(m) => AccountError::Storage(m),
        }
    }
}

impl From<AccountError> for ServiceError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound(m) => ServiceError::NotFound(m),
            AccountError::Conflict(m) => ServiceError::Conflict(m),
            AccountError::Validation(m) => ServiceError::Validation(m),
            AccountError::Unauthorized(m) => ServiceError::Unauthorized(m),
            AccountError::InsufficientFunds(m) => ServiceError::InsufficientFunds(m),
            AccountError::Storage(m) => ServiceError::Storage(m),
            AccountError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

/// Typed persistence for worker and enterprise accounts.
///
/// Password hashes live only at this layer: create/lookup calls carry
/// them as separate values, never on the model structs.
pub struct AccountStore {
    db: Arc<dyn EntityStore>,
}

impl AccountStore {
    /// Create the store and initialise both account tables.
    pub fn new(db: Arc<dyn EntityStore>) -> Result<Self, AccountError> {
        db.ensure_table(&WORKERS)?;
        db.ensure_table(&ENTERPRISES)?;
        Ok(Self { db })
    }

    // ── Workers ─────────────────────────────────────────────────────

    pub fn next_worker_id(&self) -> Result<i64, AccountError> {
        Ok(self.db.next_id_for_partition(WORKERS.name)?)
    }

    /// Insert a new worker. A racing registration on any unique field
    /// fails here with `Conflict`, regardless of earlier prechecks.
    pub fn create_worker(&self, worker: &Worker, password_hash: &str) -> Result<(), AccountError> {
        let key = worker.user_id.to_string();
        let entity = Entity::new(key.as_str(), key.as_str())
            .with_field("user_id", FieldValue::Int(worker.user_id))
            .with_field("username", FieldValue::text(worker.username.as_str()))
            .with_field("phone", FieldValue::text(worker.phone.as_str()))
            .with_field("email", FieldValue::text(worker.email.as_str()))
            .with_field("password", FieldValue::text(password_hash))
            .with_field("balance", FieldValue::text(worker.balance.to_string()))
            .with_field("status", FieldValue::text(worker.status.as_str()))
            .with_field("created_at", FieldValue::text(worker.created_at.as_str()))
            .with_field("updated_at", FieldValue::text(worker.updated_at.as_str()));

        self.db.insert(WORKERS.name, &entity)?;
        Ok(())
    }

    pub fn worker_by_id(&self, user_id: i64) -> Result<Option<Worker>, AccountError> {
        let key = user_id.to_string();
        match self.db.get(WORKERS.name, &key, &key)? {
            Some(entity) => Ok(Some(entity_to_worker(&entity)?)),
            None => Ok(None),
        }
    }

    /// First worker whose field matches, plus the stored password hash.
    /// `field` is one of the indexed contact fields (username/phone/email).
    pub fn worker_by_field(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<(Worker, String)>, AccountError> {
        match self.db.get_by_field(WORKERS.name, field, &FieldValue::text(value))? {
            Some(entity) => {
                let hash = text_field(&entity, "password")?;
                Ok(Some((entity_to_worker(&entity)?, hash)))
            }
            None => Ok(None),
        }
    }

    pub fn set_worker_password(&self, user_id: i64, hash: &str) -> Result<(), AccountError> {
        let key = user_id.to_string();
        let found = self.db.update_fields(
            WORKERS.name,
            &key,
            &key,
            &[
                ("password", FieldValue::text(hash)),
                ("updated_at", FieldValue::text(now_rfc3339())),
            ],
        )?;
        if !found {
            return Err(AccountError::NotFound(format!("worker {user_id}")));
        }
        Ok(())
    }

    /// Merge profile fields; `updated_at` is stamped automatically.
    pub fn update_worker_fields(
        &self,
        user_id: i64,
        fields: &[(&str, FieldValue)],
    ) -> Result<(), AccountError> {
        let key = user_id.to_string();
        let mut all: Vec<(&str, FieldValue)> = fields.to_vec();
        all.push(("updated_at", FieldValue::text(now_rfc3339())));

        let found = self.db.update_fields(WORKERS.name, &key, &key, &all)?;
        if !found {
            return Err(AccountError::NotFound(format!("worker {user_id}")));
        }
        Ok(())
    }

    // ── Balance ─────────────────────────────────────────────────────

    /// Add to a worker's balance. Returns the new balance.
    pub fn credit_balance(&self, user_id: i64, amount: Decimal) -> Result<Decimal, AccountError> {
        self.adjust_balance(user_id, amount, false)
    }

    /// Subtract from a worker's balance, failing with
    /// `InsufficientFunds` when it would go negative. The sufficiency
    /// check re-runs inside the CAS loop, so a racing debit cannot
    /// overdraw. Returns the new balance.
    pub fn debit_balance(&self, user_id: i64, amount: Decimal) -> Result<Decimal, AccountError> {
        self.adjust_balance(user_id, amount, true)
    }

    fn adjust_balance(
        &self,
        user_id: i64,
        amount: Decimal,
        debit: bool,
    ) -> Result<Decimal, AccountError> {
        let key = user_id.to_string();

        for _ in 0..BALANCE_CAS_RETRIES {
            let entity = self
                .db
                .get(WORKERS.name, &key, &key)?
                .ok_or_else(|| AccountError::NotFound(format!("worker {user_id}")))?;
            let balance = decimal_field(&entity, "balance")?;

            let next = if debit {
                if balance < amount {
                    return Err(AccountError::InsufficientFunds(format!(
                        "balance {balance} is less than {amount}"
                    )));
                }
                balance - amount
            } else {
                balance + amount
            };

            let applied = self.db.update_fields_checked(
                WORKERS.name,
                &key,
                &key,
                entity.version,
                &[
                    ("balance", FieldValue::text(next.to_string())),
                    ("updated_at", FieldValue::text(now_rfc3339())),
                ],
            )?;
            if applied {
                return Ok(next);
            }
        }

        Err(AccountError::Storage(format!(
            "balance update for worker {user_id}: too much contention"
        )))
    }

    // ── Enterprises ─────────────────────────────────────────────────

    pub fn next_enterprise_id(&self) -> Result<i64, AccountError> {
        Ok(self.db.next_id_for_partition(ENTERPRISES.name)?)
    }

    pub fn create_enterprise(
        &self,
        enterprise: &Enterprise,
        password_hash: &str,
    ) -> Result<(), AccountError> {
        let key = enterprise.id.to_string();
        let entity = Entity::new(key.as_str(), key.as_str())
            .with_field("id", FieldValue::Int(enterprise.id))
            .with_field("email", FieldValue::text(enterprise.email.as_str()))
            .with_field("password", FieldValue::text(password_hash))
            .with_field("name", FieldValue::text(enterprise.name.as_str()))
            .with_field("address", FieldValue::text(enterprise.address.as_str()))
            .with_field("industry", FieldValue::text(enterprise.industry.as_str()))
            .with_field(
                "registration_no",
                FieldValue::text(enterprise.registration_no.as_str()),
            )
            .with_field("created_at", FieldValue::text(enterprise.created_at.as_str()))
            .with_field("updated_at", FieldValue::text(enterprise.updated_at.as_str()));

        self.db.insert(ENTERPRISES.name, &entity)?;
        Ok(())
    }

    pub fn enterprise_by_id(&self, id: i64) -> Result<Option<Enterprise>, AccountError> {
        let key = id.to_string();
        match self.db.get(ENTERPRISES.name, &key, &key)? {
            Some(entity) => Ok(Some(entity_to_enterprise(&entity)?)),
            None => Ok(None),
        }
    }

    pub fn enterprise_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Enterprise, String)>, AccountError> {
        match self
            .db
            .get_by_field(ENTERPRISES.name, "email", &FieldValue::text(email))?
        {
            Some(entity) => {
                let hash = text_field(&entity, "password")?;
                Ok(Some((entity_to_enterprise(&entity)?, hash)))
            }
            None => Ok(None),
        }
    }

    pub fn update_enterprise_fields(
        &self,
        id: i64,
        fields: &[(&str, FieldValue)],
    ) -> Result<(), AccountError> {
        let key = id.to_string();
        let mut all: Vec<(&str, FieldValue)> = fields.to_vec();
        all.push(("updated_at", FieldValue::text(now_rfc3339())));

        let found = self.db.update_fields(ENTERPRISES.name, &key, &key, &all)?;
        if !found {
            return Err(AccountError::NotFound(format!("enterprise {id}")));
        }
        Ok(())
    }
}

// ── Entity mapping ──────────────────────────────────────────────────

fn text_field(entity: &Entity, name: &str) -> Result<String, AccountError> {
    entity
        .get_str(name)
        .map(str::to_string)
        .ok_or_else(|| AccountError::Internal(format!("account entity missing field {name}")))
}

fn int_field(entity: &Entity, name: &str) -> Result<i64, AccountError> {
    entity
        .get_i64(name)
        .ok_or_else(|| AccountError::Internal(format!("account entity missing field {name}")))
}

fn decimal_field(entity: &Entity, name: &str) -> Result<Decimal, AccountError> {
    text_field(entity, name)?
        .parse::<Decimal>()
        .map_err(|e| AccountError::Internal(format!("bad decimal in field {name}: {e}")))
}

fn entity_to_worker(entity: &Entity) -> Result<Worker, AccountError> {
    Ok(Worker {
        user_id: int_field(entity, "user_id")?,
        username: text_field(entity, "username")?,
        phone: text_field(entity, "phone")?,
        email: text_field(entity, "email")?,
        balance: decimal_field(entity, "balance")?,
        status: text_field(entity, "status")?,
        created_at: text_field(entity, "created_at")?,
        updated_at: text_field(entity, "updated_at")?,
    })
}

fn entity_to_enterprise(entity: &Entity) -> Result<Enterprise, AccountError> {
    Ok(Enterprise {
        id: int_field(entity, "id")?,
        email: text_field(entity, "email")?,
        name: text_field(entity, "name")?,
        address: text_field(entity, "address")?,
        industry: text_field(entity, "industry")?,
        registration_no: text_field(entity, "registration_no")?,
        created_at: text_field(entity, "created_at")?,
        updated_at: text_field(entity, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use workbridge_store::SqliteStore;

    fn test_store() -> AccountStore {
        let db: Arc<dyn EntityStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        AccountStore::new(db).unwrap()
    }

    fn make_worker(user_id: i64, username: &str) -> Worker {
        let now = now_rfc3339();
        Worker {
            user_id,
            username: username.into(),
            phone: format!("+2547001112{user_id:02}"),
            email: format!("{username}@example.org"),
            balance: Decimal::ZERO,
            status: "active".into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn create_and_fetch_worker() {
        let store = test_store();
        store.create_worker(&make_worker(1, "amina"), "hash-1").unwrap();

        let got = store.worker_by_id(1).unwrap().unwrap();
        assert_eq!(got.username, "amina");
        assert_eq!(got.balance, Decimal::ZERO);

        let (by_name, hash) = store.worker_by_field("username", "amina").unwrap().unwrap();
        assert_eq!(by_name.user_id, 1);
        assert_eq!(hash, "hash-1");

        assert!(store.worker_by_id(2).unwrap().is_none());
    }

    #[test]
    fn contact_fields_are_unique() {
        let store = test_store();
        store.create_worker(&make_worker(1, "amina"), "h").unwrap();

        let mut dup = make_worker(2, "besa");
        dup.phone = "+254700111201".into();
        let err = store.create_worker(&dup, "h").unwrap_err();
        assert!(matches!(err, AccountError::Conflict(_)));

        // The first registration is untouched.
        assert_eq!(store.worker_by_id(1).unwrap().unwrap().username, "amina");
        assert!(store.worker_by_id(2).unwrap().is_none());
    }

    #[test]
    fn next_ids_are_sequential() {
        let store = test_store();
        assert_eq!(store.next_worker_id().unwrap(), 1);
        store.create_worker(&make_worker(1, "amina"), "h").unwrap();
        assert_eq!(store.next_worker_id().unwrap(), 2);
        assert_eq!(store.next_enterprise_id().unwrap(), 1);
    }

    #[test]
    fn credit_and_debit_balance() {
        let store = test_store();
        store.create_worker(&make_worker(1, "amina"), "h").unwrap();

        let after = store.credit_balance(1, "10.50".parse().unwrap()).unwrap();
        assert_eq!(after, "10.50".parse().unwrap());

        let after = store.debit_balance(1, "4.25".parse().unwrap()).unwrap();
        assert_eq!(after, "6.25".parse().unwrap());

        let err = store.debit_balance(1, "6.26".parse().unwrap()).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientFunds(_)));

        // Balance unchanged after the refused debit.
        assert_eq!(
            store.worker_by_id(1).unwrap().unwrap().balance,
            "6.25".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn debit_unknown_worker_is_not_found() {
        let store = test_store();
        let err = store.debit_balance(99, Decimal::ONE).unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));
    }

    #[test]
    fn concurrent_credits_all_land() {
        let store = test_store();
        store.create_worker(&make_worker(1, "amina"), "h").unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        store.credit_balance(1, Decimal::ONE).unwrap();
                    }
                });
            }
        });

        assert_eq!(
            store.worker_by_id(1).unwrap().unwrap().balance,
            Decimal::from(40)
        );
    }

    #[test]
    fn enterprise_roundtrip() {
        let store = test_store();
        let now = now_rfc3339();
        let enterprise = Enterprise {
            id: 1,
            email: "ops@acme.test".into(),
            name: "Acme Data Labs".into(),
            address: "12 Harbour Rd".into(),
            industry: "data-services".into(),
            registration_no: "ACME-2019".into(),
            created_at: now.clone(),
            updated_at: now,
        };
        store.create_enterprise(&enterprise, "hash-e").unwrap();

        let got = store.enterprise_by_id(1).unwrap().unwrap();
        assert_eq!(got.name, "Acme Data Labs");

        let (by_email, hash) = store.enterprise_by_email("ops@acme.test").unwrap().unwrap();
        assert_eq!(by_email.id, 1);
        assert_eq!(hash, "hash-e");

        store
            .update_enterprise_fields(1, &[("industry", FieldValue::text("labeling"))])
            .unwrap();
        assert_eq!(store.enterprise_by_id(1).unwrap().unwrap().industry, "labeling");
    }
}
