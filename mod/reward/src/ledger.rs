use std::sync::Arc;

use rust_decimal::Decimal;

use workbridge_account::store::{AccountError, AccountStore};
use workbridge_core::{ListResult, PageParams, ServiceError, new_id, now_rfc3339};

use crate::model::{
    PaymentMethod, RewardEntry, RewardHistoryPage, WithdrawRequest, WithdrawStatus,
};
use crate::store::RewardStore;

/// Balance mutation and payout flows.
///
/// Credits land as ledger-entry-then-balance; withdrawals as
/// request-then-debit-then-mark. Each flow compensates its first write
/// when a later step fails, so a caller that sees an error can assume
/// nothing happened.
pub struct RewardLedger {
    store: Arc<RewardStore>,
    accounts: Arc<AccountStore>,
}

impl RewardLedger {
    pub fn new(store: Arc<RewardStore>, accounts: Arc<AccountStore>) -> Arc<Self> {
        Arc::new(Self { store, accounts })
    }

    pub fn store(&self) -> &Arc<RewardStore> {
        &self.store
    }

    // ── Credit on completion ────────────────────────────────────────

    /// Pay a worker for a completed task, exactly once per task.
    ///
    /// The ledger entry is keyed by task id, so a repeat call (crash
    /// replay, double-fired transition) finds the existing entry and
    /// returns it without touching the balance again.
    pub fn credit_for_task(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
        amount: Decimal,
    ) -> Result<RewardEntry, ServiceError> {
        let entry = RewardEntry {
            task_id,
            user_id,
            task_title: task_title.to_string(),
            amount,
            created_at: now_rfc3339(),
        };

        if !self.store.insert_reward(&entry)? {
            let existing = self.store.reward_by_task(task_id)?.ok_or_else(|| {
                ServiceError::Internal(format!("reward entry for task {task_id} vanished"))
            })?;
            tracing::debug!(task_id, "task already credited");
            return Ok(existing);
        }

        match self.accounts.credit_balance(user_id, amount) {
            Ok(balance) => {
                tracing::info!(user_id, task_id, amount = %amount, balance = %balance, "reward credited");
                Ok(entry)
            }
            Err(e) => {
                // The entry must not stand without the balance increment.
                if let Err(rollback) = self.store.delete_reward(task_id) {
                    tracing::error!(task_id, error = %rollback, "could not roll back reward entry");
                }
                Err(ServiceError::Storage(format!(
                    "reward credit for task {task_id}: {e}"
                )))
            }
        }
    }

    // ── Withdrawal ──────────────────────────────────────────────────

    /// Convert accrued balance into a payout request.
    ///
    /// Validation happens before any write; the three failure kinds
    /// (non-positive amount, unknown method, insufficient balance) each
    /// surface distinctly and leave balance and history untouched.
    pub fn request_withdrawal(
        &self,
        user_id: i64,
        amount: Decimal,
        payment_method: &str,
    ) -> Result<WithdrawRequest, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::Validation(
                "withdrawal amount must be positive".into(),
            ));
        }
        let method = PaymentMethod::from_str(payment_method).ok_or_else(|| {
            ServiceError::Validation(format!("unsupported payment method: {payment_method}"))
        })?;

        let worker = self
            .accounts
            .worker_by_id(user_id)
            .map_err(ServiceError::from)?
            .ok_or_else(|| ServiceError::NotFound(format!("worker {user_id}")))?;
        if worker.balance < amount {
            return Err(ServiceError::InsufficientFunds(format!(
                "balance {} is less than {amount}",
                worker.balance
            )));
        }

        let now = now_rfc3339();
        let mut request = WithdrawRequest {
            id: new_id(),
            user_id,
            amount,
            payment_method: method,
            status: WithdrawStatus::Pending,
            request_date: now.clone(),
            updated_at: now,
        };
        self.store.insert_withdrawal(&request)?;

        // The debit re-checks sufficiency inside its CAS loop; a racing
        // withdrawal or credit may have moved the balance since the
        // check above.
        if let Err(e) = self.accounts.debit_balance(user_id, amount) {
            if let Err(rollback) = self.store.delete_withdrawal(user_id, &request.id) {
                tracing::error!(user_id, error = %rollback, "could not roll back withdraw request");
            }
            return Err(match e {
                AccountError::InsufficientFunds(m) => ServiceError::InsufficientFunds(m),
                other => ServiceError::Storage(format!(
                    "withdrawal debit for worker {user_id}: {other}"
                )),
            });
        }

        match self
            .store
            .set_withdrawal_status(user_id, &request.id, WithdrawStatus::Completed)
        {
            Ok(true) => {
                request.status = WithdrawStatus::Completed;
                tracing::info!(user_id, amount = %amount, method = %method, "withdrawal completed");
                Ok(request)
            }
            other => {
                let detail = match other {
                    Err(e) => e.to_string(),
                    _ => "request row missing".to_string(),
                };
                if let Err(rollback) = self.accounts.credit_balance(user_id, amount) {
                    tracing::error!(user_id, error = %rollback, "could not re-credit after withdrawal fault");
                }
                if let Err(rollback) = self.store.delete_withdrawal(user_id, &request.id) {
                    tracing::error!(user_id, error = %rollback, "could not remove faulted withdraw request");
                }
                Err(ServiceError::Storage(format!(
                    "withdrawal for worker {user_id} could not be finalised: {detail}"
                )))
            }
        }
    }

    // ── Histories ───────────────────────────────────────────────────

    /// A page of the worker's reward ledger, newest first, plus the
    /// all-time total.
    pub fn reward_history(
        &self,
        user_id: i64,
        page: PageParams,
    ) -> Result<RewardHistoryPage, ServiceError> {
        page.validate()?;

        let all = self.store.rewards_for_worker(user_id)?;
        let total = all.len();
        let total_reward: Decimal = all.iter().map(|e| e.amount).sum();

        let start = ((page.page - 1) * page.page_size) as usize;
        let items = all
            .into_iter()
            .skip(start)
            .take(page.page_size as usize)
            .collect();

        Ok(RewardHistoryPage { items, total, total_reward })
    }

    /// A page of the worker's withdrawal requests, newest first.
    pub fn withdraw_status(
        &self,
        user_id: i64,
        page: PageParams,
    ) -> Result<ListResult<WithdrawRequest>, ServiceError> {
        page.validate()?;
        let (items, total) =
            self.store
                .withdrawals_for_worker(user_id, page.page, page.page_size)?;
        Ok(ListResult { items, total })
    }
}
