use std::sync::Arc;

use rust_decimal::Decimal;

use workbridge_core::{ServiceError, now_rfc3339};
use workbridge_store::{Entity, EntityStore, FieldValue, Filter, SortOrder, StoreError, TableSpec};

use crate::model::{PaymentMethod, RewardEntry, WithdrawRequest, WithdrawStatus};

pub const REWARDS: TableSpec = TableSpec {
    name: "reward_requests",
    unique_fields: &[],
};

pub const WITHDRAWALS: TableSpec = TableSpec {
    name: "withdraw_requests",
    unique_fields: &[],
};

/// Persistence for ledger entries and withdrawal requests.
///
/// Reward rows are keyed by task id on both key columns, which is what
/// makes the credit idempotent: a second insert for the same task hits
/// the primary key. Withdrawals are partitioned by worker with a random
/// row id.
pub struct RewardStore {
    db: Arc<dyn EntityStore>,
}

impl RewardStore {
    pub fn new(db: Arc<dyn EntityStore>) -> Result<Self, ServiceError> {
        db.ensure_table(&REWARDS).map_err(storage)?;
        db.ensure_table(&WITHDRAWALS).map_err(storage)?;
        Ok(Self { db })
    }

    // ── Reward entries ──────────────────────────────────────────────

    /// Append a ledger entry. Returns false when an entry for this task
    /// already exists, leaving the original untouched.
    pub fn insert_reward(&self, entry: &RewardEntry) -> Result<bool, ServiceError> {
        let key = entry.task_id.to_string();
        let entity = Entity::new(key.as_str(), key.as_str())
            .with_field("task_id", FieldValue::Int(entry.task_id))
            .with_field("user_id", FieldValue::Int(entry.user_id))
            .with_field("task_title", FieldValue::text(entry.task_title.as_str()))
            .with_field("amount", FieldValue::text(entry.amount.to_string()))
            .with_field("created_at", FieldValue::text(entry.created_at.as_str()));

        match self.db.insert(REWARDS.name, &entity) {
            Ok(()) => Ok(true),
            Err(StoreError::Duplicate(_)) => Ok(false),
            Err(e) => Err(storage(e)),
        }
    }

    pub fn reward_by_task(&self, task_id: i64) -> Result<Option<RewardEntry>, ServiceError> {
        let key = task_id.to_string();
        match self.db.get(REWARDS.name, &key, &key).map_err(storage)? {
            Some(entity) => Ok(Some(entity_to_reward(&entity)?)),
            None => Ok(None),
        }
    }

    pub fn delete_reward(&self, task_id: i64) -> Result<bool, ServiceError> {
        let key = task_id.to_string();
        self.db.delete(REWARDS.name, &key, &key).map_err(storage)
    }

    /// All of a worker's ledger entries, newest first.
    pub fn rewards_for_worker(&self, user_id: i64) -> Result<Vec<RewardEntry>, ServiceError> {
        let order = SortOrder::desc("created_at");
        let entities = self
            .db
            .query(
                REWARDS.name,
                &[Filter::eq("user_id", FieldValue::Int(user_id))],
                Some(&order),
            )
            .map_err(storage)?;
        entities.iter().map(entity_to_reward).collect()
    }

    // ── Withdrawals ─────────────────────────────────────────────────

    pub fn insert_withdrawal(&self, request: &WithdrawRequest) -> Result<(), ServiceError> {
        let partition = request.user_id.to_string();
        let entity = Entity::new(partition.as_str(), request.id.as_str())
            .with_field("id", FieldValue::text(request.id.as_str()))
            .with_field("user_id", FieldValue::Int(request.user_id))
            .with_field("amount", FieldValue::text(request.amount.to_string()))
            .with_field(
                "payment_method",
                FieldValue::text(request.payment_method.as_str()),
            )
            .with_field("status", FieldValue::text(request.status.as_str()))
            .with_field("request_date", FieldValue::text(request.request_date.as_str()))
            .with_field("updated_at", FieldValue::text(request.updated_at.as_str()));

        self.db.insert(WITHDRAWALS.name, &entity).map_err(storage)
    }

    pub fn set_withdrawal_status(
        &self,
        user_id: i64,
        id: &str,
        status: WithdrawStatus,
    ) -> Result<bool, ServiceError> {
        let partition = user_id.to_string();
        self.db
            .update_fields(
                WITHDRAWALS.name,
                &partition,
                id,
                &[
                    ("status", FieldValue::text(status.as_str())),
                    ("updated_at", FieldValue::text(now_rfc3339())),
                ],
            )
            .map_err(storage)
    }

    pub fn delete_withdrawal(&self, user_id: i64, id: &str) -> Result<bool, ServiceError> {
        let partition = user_id.to_string();
        self.db.delete(WITHDRAWALS.name, &partition, id).map_err(storage)
    }

    /// One page of a worker's withdrawals, newest request first.
    pub fn withdrawals_for_worker(
        &self,
        user_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<WithdrawRequest>, usize), ServiceError> {
        let order = SortOrder::desc("request_date");
        let (entities, total) = self
            .db
            .list_paginated(
                WITHDRAWALS.name,
                &[Filter::eq("user_id", FieldValue::Int(user_id))],
                Some(&order),
                page,
                page_size,
            )
            .map_err(storage)?;
        let items = entities
            .iter()
            .map(entity_to_withdrawal)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }
}

fn storage(e: StoreError) -> ServiceError {
    match e {
        StoreError::Duplicate(m) => ServiceError::Conflict(m),
        StoreError::Encoding(m) => ServiceError::Internal(m),
        StoreError::Connection(m) | StoreError::Backend(m) => ServiceError::Storage(m),
    }
}

// ── Entity mapping ──────────────────────────────────────────────────

fn text_field(entity: &Entity, name: &str) -> Result<String, ServiceError> {
    entity
        .get_str(name)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Internal(format!("reward entity missing field {name}")))
}

fn int_field(entity: &Entity, name: &str) -> Result<i64, ServiceError> {
    entity
        .get_i64(name)
        .ok_or_else(|| ServiceError::Internal(format!("reward entity missing field {name}")))
}

fn decimal_field(entity: &Entity, name: &str) -> Result<Decimal, ServiceError> {
    text_field(entity, name)?
        .parse::<Decimal>()
        .map_err(|e| ServiceError::Internal(format!("bad decimal in field {name}: {e}")))
}

fn entity_to_reward(entity: &Entity) -> Result<RewardEntry, ServiceError> {
    Ok(RewardEntry {
        task_id: int_field(entity, "task_id")?,
        user_id: int_field(entity, "user_id")?,
        task_title: text_field(entity, "task_title")?,
        amount: decimal_field(entity, "amount")?,
        created_at: text_field(entity, "created_at")?,
    })
}

fn entity_to_withdrawal(entity: &Entity) -> Result<WithdrawRequest, ServiceError> {
    let method_token = text_field(entity, "payment_method")?;
    let status_token = text_field(entity, "status")?;
    Ok(WithdrawRequest {
        id: text_field(entity, "id")?,
        user_id: int_field(entity, "user_id")?,
        amount: decimal_field(entity, "amount")?,
        payment_method: PaymentMethod::from_str(&method_token).ok_or_else(|| {
            ServiceError::Internal(format!("bad payment method in store: {method_token}"))
        })?,
        status: WithdrawStatus::from_str(&status_token).ok_or_else(|| {
            ServiceError::Internal(format!("bad withdraw status in store: {status_token}"))
        })?,
        request_date: text_field(entity, "request_date")?,
        updated_at: text_field(entity, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use workbridge_store::SqliteStore;

    fn test_store() -> RewardStore {
        let db: Arc<dyn EntityStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        RewardStore::new(db).unwrap()
    }

    fn entry(task_id: i64, user_id: i64, amount: &str, created_at: &str) -> RewardEntry {
        RewardEntry {
            task_id,
            user_id,
            task_title: format!("task {task_id}"),
            amount: amount.parse().unwrap(),
            created_at: created_at.into(),
        }
    }

    #[test]
    fn reward_insert_is_idempotent_per_task() {
        let store = test_store();
        assert!(store.insert_reward(&entry(7, 3, "5.00", "2025-08-01T00:00:00+00:00")).unwrap());
        assert!(!store.insert_reward(&entry(7, 3, "99.00", "2025-08-02T00:00:00+00:00")).unwrap());

        // Original row stands.
        let kept = store.reward_by_task(7).unwrap().unwrap();
        assert_eq!(kept.amount, "5.00".parse().unwrap());
    }

    #[test]
    fn rewards_sorted_newest_first() {
        let store = test_store();
        store.insert_reward(&entry(1, 3, "1.00", "2025-08-01T00:00:00+00:00")).unwrap();
        store.insert_reward(&entry(2, 3, "2.00", "2025-08-03T00:00:00+00:00")).unwrap();
        store.insert_reward(&entry(3, 3, "3.00", "2025-08-02T00:00:00+00:00")).unwrap();
        store.insert_reward(&entry(4, 9, "4.00", "2025-08-04T00:00:00+00:00")).unwrap();

        let mine = store.rewards_for_worker(3).unwrap();
        let ids: Vec<i64> = mine.iter().map(|e| e.task_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn withdrawal_lifecycle_and_paging() {
        let store = test_store();
        for (i, date) in ["2025-08-01", "2025-08-02", "2025-08-03"].iter().enumerate() {
            let request = WithdrawRequest {
                id: format!("w{i}"),
                user_id: 3,
                amount: Decimal::from(10),
                payment_method: PaymentMethod::PayPal,
                status: WithdrawStatus::Pending,
                request_date: format!("{date}T00:00:00+00:00"),
                updated_at: format!("{date}T00:00:00+00:00"),
            };
            store.insert_withdrawal(&request).unwrap();
        }

        assert!(store.set_withdrawal_status(3, "w1", WithdrawStatus::Completed).unwrap());
        assert!(!store.set_withdrawal_status(3, "missing", WithdrawStatus::Completed).unwrap());

        let (page, total) = store.withdrawals_for_worker(3, 1, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "w2");
        assert_eq!(page[1].id, "w1");
        assert_eq!(page[1].status, WithdrawStatus::Completed);

        assert!(store.delete_withdrawal(3, "w0").unwrap());
        let (_, total) = store.withdrawals_for_worker(3, 1, 10).unwrap();
        assert_eq!(total, 2);
    }
}
