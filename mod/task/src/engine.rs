use std::sync::Arc;

use rust_decimal::Decimal;

use workbridge_account::model::{Role, Subject};
use workbridge_account::store::AccountStore;
use workbridge_core::{ListResult, PageParams, ServiceError, now_rfc3339};
use workbridge_reward::ledger::RewardLedger;
use workbridge_store::{FieldValue, Filter, SortOrder};

use crate::model::{
    CreateTaskRequest, PaymentStatus, Task, TaskFilter, TaskProgress, TaskStatus,
};
use crate::store::{TaskStore, build_filters};

/// Claim and submit are read-check-CAS loops; the bound turns a
/// pathological livelock into a visible storage error.
const CAS_RETRIES: usize = 16;

// ---------------------------------------------------------------------------
// TaskEngine — the lifecycle state machine
// ---------------------------------------------------------------------------

/// The core task engine.
///
/// Enforces the task state machine:
///
/// ```text
/// pending → in_progress → completed (units full → reward credit)
/// pending/in_progress → paused
/// pending/in_progress/paused → cancelled
/// ```
///
/// Every mutating operation authorises the caller against the task's
/// controlling party before touching state, and races on claim/submit
/// are settled by the store's version stamp: exactly one writer wins,
/// losers re-read and fail on the precondition.
pub struct TaskEngine {
    store: Arc<TaskStore>,
    accounts: Arc<AccountStore>,
    ledger: Arc<RewardLedger>,
}

impl TaskEngine {
    pub fn new(store: Arc<TaskStore>, accounts: Arc<AccountStore>, ledger: Arc<RewardLedger>) -> Self {
        Self { store, accounts, ledger }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    // =======================================================================
    // Enterprise-facing lifecycle
    // =======================================================================

    /// Create a task in `pending` with zero progress.
    pub fn create_task(
        &self,
        enterprise_id: i64,
        req: CreateTaskRequest,
    ) -> Result<Task, ServiceError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(ServiceError::Validation("title is required".into()));
        }
        if req.reward_per_unit <= Decimal::ZERO {
            return Err(ServiceError::Validation(
                "reward_per_unit must be positive".into(),
            ));
        }
        if req.total_units <= 0 {
            return Err(ServiceError::Validation("total_units must be positive".into()));
        }
        if self
            .accounts
            .enterprise_by_id(enterprise_id)
            .map_err(ServiceError::from)?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!("enterprise {enterprise_id}")));
        }
        if self.store.get_by_title(title)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "task title {title} already exists"
            )));
        }

        let id = self.store.next_task_id()?;
        let now = now_rfc3339();
        let task = Task {
            id,
            enterprise_id,
            user_id: 0,
            title: title.to_string(),
            description: req.description,
            task_type: req.task_type,
            difficulty: req.difficulty,
            resources: req.resources,
            deadline: req.deadline,
            reward_per_unit: req.reward_per_unit,
            total_units: req.total_units,
            completed_units: 0,
            status: TaskStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            review_comment: String::new(),
            rating: None,
            task_comments: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.insert(&task)?;

        tracing::info!(task_id = id, enterprise_id, title, "task created");
        Ok(task)
    }

    /// Pause a pending or in-progress task.
    pub fn pause(&self, task_id: i64, enterprise_id: i64) -> Result<Task, ServiceError> {
        for _ in 0..CAS_RETRIES {
            let (task, version) = self.load_owned(task_id, enterprise_id)?;
            if !matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
                return Err(ServiceError::InvalidState(format!(
                    "task {task_id} cannot be paused (status: {})",
                    task.status
                )));
            }

            let applied = self.store.update_checked(
                task_id,
                version,
                &[
                    ("status", FieldValue::text(TaskStatus::Paused.as_str())),
                    ("updated_at", FieldValue::text(now_rfc3339())),
                ],
            )?;
            if applied {
                tracing::info!(task_id, "task paused");
                return self.reload(task_id);
            }
        }
        Err(contention("pause", task_id))
    }

    /// Cancel a task that has not completed. Paused tasks can still be
    /// cancelled; completed and cancelled ones cannot.
    pub fn cancel(&self, task_id: i64, enterprise_id: i64) -> Result<Task, ServiceError> {
        for _ in 0..CAS_RETRIES {
            let (task, version) = self.load_owned(task_id, enterprise_id)?;
            if task.status.is_terminal() {
                return Err(ServiceError::InvalidState(format!(
                    "task {task_id} cannot be cancelled (status: {})",
                    task.status
                )));
            }

            let applied = self.store.update_checked(
                task_id,
                version,
                &[
                    ("status", FieldValue::text(TaskStatus::Cancelled.as_str())),
                    ("updated_at", FieldValue::text(now_rfc3339())),
                ],
            )?;
            if applied {
                tracing::info!(task_id, "task cancelled");
                return self.reload(task_id);
            }
        }
        Err(contention("cancel", task_id))
    }

    /// Accept or reject delivered work.
    ///
    /// Accepting requires every unit done: on an already-completed task
    /// it is an idempotent confirmation, on a full in-progress task it
    /// drives the completion (and the reward credit) itself. Rejecting
    /// keeps the task in progress; the verdict text goes through
    /// `provide_feedback`.
    pub fn review(
        &self,
        task_id: i64,
        enterprise_id: i64,
        is_accepted: bool,
    ) -> Result<Task, ServiceError> {
        let (task, version) = self.load_owned(task_id, enterprise_id)?;

        if !is_accepted {
            return match task.status {
                TaskStatus::InProgress => Ok(task),
                other => Err(ServiceError::InvalidState(format!(
                    "task {task_id} cannot be rejected (status: {other})"
                ))),
            };
        }

        if task.completed_units < task.total_units {
            return Err(ServiceError::InvalidState(format!(
                "task {task_id} has {}/{} units done",
                task.completed_units, task.total_units
            )));
        }
        match task.status {
            TaskStatus::Completed => Ok(task),
            TaskStatus::InProgress => {
                let applied = self.store.update_checked(
                    task_id,
                    version,
                    &[
                        ("status", FieldValue::text(TaskStatus::Completed.as_str())),
                        (
                            "payment_status",
                            FieldValue::text(PaymentStatus::Processing.as_str()),
                        ),
                        ("updated_at", FieldValue::text(now_rfc3339())),
                    ],
                )?;
                if !applied {
                    // A racing submit finished the task first.
                    return self.reload(task_id);
                }
                self.settle_reward(&task, task.user_id)?;
                self.reload(task_id)
            }
            other => Err(ServiceError::InvalidState(format!(
                "task {task_id} cannot be reviewed (status: {other})"
            ))),
        }
    }

    /// Record the enterprise's verdict text and rating on a completed
    /// task.
    pub fn provide_feedback(
        &self,
        task_id: i64,
        enterprise_id: i64,
        review_comment: &str,
        rating: f64,
    ) -> Result<Task, ServiceError> {
        if !(0.0..=5.0).contains(&rating) {
            return Err(ServiceError::Validation(format!(
                "rating must be between 0 and 5, got {rating}"
            )));
        }

        let (task, _) = self.load_owned(task_id, enterprise_id)?;
        if task.status != TaskStatus::Completed {
            return Err(ServiceError::InvalidState(format!(
                "feedback requires a completed task (status: {})",
                task.status
            )));
        }

        self.store.update(
            task_id,
            &[
                ("review_comment", FieldValue::text(review_comment)),
                ("rating", FieldValue::Real(rating)),
                ("updated_at", FieldValue::text(now_rfc3339())),
            ],
        )?;
        self.reload(task_id)
    }

    // =======================================================================
    // Worker-facing lifecycle
    // =======================================================================

    /// Claim a pending, unclaimed task: pending → in_progress (CAS).
    ///
    /// Of two concurrent claimants exactly one wins; the loser re-reads,
    /// sees the claimant set, and gets the already-assigned error.
    pub fn claim(&self, task_id: i64, worker_id: i64) -> Result<Task, ServiceError> {
        if self
            .accounts
            .worker_by_id(worker_id)
            .map_err(ServiceError::from)?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!("worker {worker_id}")));
        }

        for _ in 0..CAS_RETRIES {
            let (task, version) = self
                .store
                .load(task_id)?
                .ok_or_else(|| not_found(task_id))?;
            if task.is_claimed() {
                return Err(ServiceError::InvalidState(format!(
                    "task {task_id} is already assigned"
                )));
            }
            if task.status != TaskStatus::Pending {
                return Err(ServiceError::InvalidState(format!(
                    "task {task_id} is not claimable (status: {})",
                    task.status
                )));
            }

            let applied = self.store.update_checked(
                task_id,
                version,
                &[
                    ("user_id", FieldValue::Int(worker_id)),
                    ("status", FieldValue::text(TaskStatus::InProgress.as_str())),
                    ("updated_at", FieldValue::text(now_rfc3339())),
                ],
            )?;
            if applied {
                tracing::info!(task_id, worker_id, "task claimed");
                return self.reload(task_id);
            }
        }
        Err(contention("claim", task_id))
    }

    /// Record one finished unit of work.
    ///
    /// The increment rides the version stamp, so concurrent submissions
    /// cannot double-count or overshoot `total_units`, and the caller
    /// whose write reaches the final unit is the unique trigger of the
    /// reward credit.
    pub fn submit_unit(
        &self,
        task_id: i64,
        worker_id: i64,
        comment: &str,
    ) -> Result<Task, ServiceError> {
        for _ in 0..CAS_RETRIES {
            let (task, version) = self
                .store
                .load(task_id)?
                .ok_or_else(|| not_found(task_id))?;
            if task.user_id != worker_id {
                return Err(ServiceError::PermissionDenied(format!(
                    "worker {worker_id} is not the claimant of task {task_id}"
                )));
            }
            if task.status != TaskStatus::InProgress {
                return Err(ServiceError::InvalidState(format!(
                    "task {task_id} is not in progress (status: {})",
                    task.status
                )));
            }

            let units = (task.completed_units + 1).min(task.total_units);
            let finished = units == task.total_units;

            let mut comments = task.task_comments.clone();
            comments.push(comment.to_string());
            let comments_json = serde_json::to_string(&comments)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;

            let mut fields: Vec<(&str, FieldValue)> = vec![
                ("completed_units", FieldValue::Int(units)),
                ("task_comments", FieldValue::text(comments_json)),
                ("updated_at", FieldValue::text(now_rfc3339())),
            ];
            if finished {
                fields.push(("status", FieldValue::text(TaskStatus::Completed.as_str())));
                fields.push((
                    "payment_status",
                    FieldValue::text(PaymentStatus::Processing.as_str()),
                ));
            }

            let applied = self.store.update_checked(task_id, version, &fields)?;
            if !applied {
                continue;
            }

            tracing::info!(
                task_id,
                worker_id,
                completed_units = units,
                total_units = task.total_units,
                "unit submitted"
            );

            if finished {
                self.settle_reward(&task, worker_id)?;
            }
            return self.reload(task_id);
        }
        Err(contention("submit", task_id))
    }

    // =======================================================================
    // Reads
    // =======================================================================

    /// Fetch a task, respecting visibility: the owning enterprise and
    /// the claimant always see it, anyone sees it while it is still
    /// pending and unclaimed.
    pub fn get_task_details(&self, task_id: i64, subject: Subject) -> Result<Task, ServiceError> {
        let (task, _) = self
            .store
            .load(task_id)?
            .ok_or_else(|| not_found(task_id))?;
        if !visible_to(&task, subject) {
            return Err(ServiceError::PermissionDenied(format!(
                "task {task_id} is not visible to this account"
            )));
        }
        Ok(task)
    }

    pub fn progress(&self, task_id: i64, subject: Subject) -> Result<TaskProgress, ServiceError> {
        let task = self.get_task_details(task_id, subject)?;
        Ok(TaskProgress {
            completed_units: task.completed_units,
            total_units: task.total_units,
            progress_percentage: task.progress_percentage(),
            status: task.status,
        })
    }

    /// Unclaimed pending tasks, the worker's shop window.
    pub fn browse_available(
        &self,
        filter: &TaskFilter,
        page: PageParams,
    ) -> Result<ListResult<Task>, ServiceError> {
        page.validate()?;
        let mut filters = build_filters(&TaskFilter { status: None, ..*filter });
        filters.push(Filter::eq("status", FieldValue::text(TaskStatus::Pending.as_str())));
        filters.push(Filter::eq("user_id", FieldValue::Int(0)));

        let (items, total) = self.store.list(&filters, None, page)?;
        Ok(ListResult { items, total })
    }

    /// The enterprise's own tasks, filterable by status as well.
    pub fn list_enterprise_tasks(
        &self,
        enterprise_id: i64,
        filter: &TaskFilter,
        page: PageParams,
    ) -> Result<ListResult<Task>, ServiceError> {
        page.validate()?;
        let mut filters = build_filters(filter);
        filters.push(Filter::eq("enterprise_id", FieldValue::Int(enterprise_id)));

        let (items, total) = self.store.list(&filters, None, page)?;
        Ok(ListResult { items, total })
    }

    /// Tasks the worker has claimed, most recently touched first.
    pub fn my_tasks(
        &self,
        worker_id: i64,
        page: PageParams,
    ) -> Result<ListResult<Task>, ServiceError> {
        page.validate()?;
        let filters = [Filter::eq("user_id", FieldValue::Int(worker_id))];
        let (items, total) =
            self.store
                .list(&filters, Some(SortOrder::desc("updated_at")), page)?;
        Ok(ListResult { items, total })
    }

    // =======================================================================
    // Internal
    // =======================================================================

    /// Load a task and authorise the enterprise caller as its owner.
    fn load_owned(&self, task_id: i64, enterprise_id: i64) -> Result<(Task, i64), ServiceError> {
        let (task, version) = self
            .store
            .load(task_id)?
            .ok_or_else(|| not_found(task_id))?;
        if task.enterprise_id != enterprise_id {
            return Err(ServiceError::PermissionDenied(format!(
                "task {task_id} belongs to another enterprise"
            )));
        }
        Ok((task, version))
    }

    fn reload(&self, task_id: i64) -> Result<Task, ServiceError> {
        Ok(self
            .store
            .load(task_id)?
            .ok_or_else(|| not_found(task_id))?
            .0)
    }

    /// Settle the completion credit. The ledger entry is keyed by task
    /// id, so even a replayed call cannot pay twice; the task's
    /// payment status records the outcome durably.
    fn settle_reward(&self, task: &Task, worker_id: i64) -> Result<(), ServiceError> {
        match self
            .ledger
            .credit_for_task(worker_id, task.id, &task.title, task.reward_per_unit)
        {
            Ok(_) => {
                self.store.update(
                    task.id,
                    &[
                        ("payment_status", FieldValue::text(PaymentStatus::Paid.as_str())),
                        ("updated_at", FieldValue::text(now_rfc3339())),
                    ],
                )?;
                Ok(())
            }
            Err(e) => {
                if let Err(mark) = self.store.update(
                    task.id,
                    &[
                        ("payment_status", FieldValue::text(PaymentStatus::Failed.as_str())),
                        ("updated_at", FieldValue::text(now_rfc3339())),
                    ],
                ) {
                    tracing::error!(task_id = task.id, error = %mark, "could not mark payment failed");
                }
                Err(e)
            }
        }
    }
}

fn visible_to(task: &Task, subject: Subject) -> bool {
    if task.status == TaskStatus::Pending && !task.is_claimed() {
        return true;
    }
    match subject.role {
        Role::Enterprise => subject.id == task.enterprise_id,
        Role::Worker => subject.id == task.user_id,
    }
}

fn not_found(task_id: i64) -> ServiceError {
    ServiceError::NotFound(format!("task {task_id}"))
}

fn contention(op: &str, task_id: i64) -> ServiceError {
    ServiceError::Storage(format!("{op} on task {task_id}: too much contention"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskDifficulty, TaskType};
    use workbridge_account::model::{Enterprise, Worker};
    use workbridge_reward::store::RewardStore;
    use workbridge_store::{EntityStore, SqliteStore};

    struct Fixture {
        engine: TaskEngine,
        accounts: Arc<AccountStore>,
        ledger: Arc<RewardLedger>,
    }

    fn setup() -> Fixture {
        let db: Arc<dyn EntityStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let accounts = Arc::new(AccountStore::new(Arc::clone(&db)).unwrap());
        let rewards = Arc::new(RewardStore::new(Arc::clone(&db)).unwrap());
        let ledger = RewardLedger::new(rewards, Arc::clone(&accounts));
        let store = Arc::new(TaskStore::new(db).unwrap());
        let engine = TaskEngine::new(store, Arc::clone(&accounts), Arc::clone(&ledger));
        Fixture { engine, accounts, ledger }
    }

    fn seed_enterprise(f: &Fixture, id: i64) {
        let now = now_rfc3339();
        let enterprise = Enterprise {
            id,
            email: format!("ops{id}@acme.test"),
            name: format!("Acme {id}"),
            address: String::new(),
            industry: String::new(),
            registration_no: String::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        f.accounts.create_enterprise(&enterprise, "hash").unwrap();
    }

    fn seed_worker(f: &Fixture, id: i64) {
        let now = now_rfc3339();
        let worker = Worker {
            user_id: id,
            username: format!("worker{id}"),
            phone: format!("+2547000000{id:02}"),
            email: format!("worker{id}@example.org"),
            balance: Decimal::ZERO,
            status: "active".into(),
            created_at: now.clone(),
            updated_at: now,
        };
        f.accounts.create_worker(&worker, "hash").unwrap();
    }

    fn create_req(title: &str, units: i64, reward: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.into(),
            description: "desc".into(),
            task_type: TaskType::DataEntry,
            difficulty: TaskDifficulty::Easy,
            deadline: None,
            reward_per_unit: reward.parse().unwrap(),
            total_units: units,
            resources: vec![],
        }
    }

    fn balance_of(f: &Fixture, worker_id: i64) -> Decimal {
        f.accounts.worker_by_id(worker_id).unwrap().unwrap().balance
    }

    #[test]
    fn create_assigns_sequential_ids_and_defaults() {
        let f = setup();
        seed_enterprise(&f, 1);

        let a = f.engine.create_task(1, create_req("First", 3, "10")).unwrap();
        let b = f.engine.create_task(1, create_req("Second", 5, "2.50")).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(a.payment_status, PaymentStatus::Unpaid);
        assert_eq!(a.completed_units, 0);
        assert!(!a.is_claimed());
    }

    #[test]
    fn create_validations_and_conflicts() {
        let f = setup();
        seed_enterprise(&f, 1);

        for req in [
            create_req("  ", 3, "10"),
            create_req("Zero reward", 3, "0"),
            create_req("Negative reward", 3, "-1"),
            create_req("Zero units", 0, "10"),
        ] {
            let err = f.engine.create_task(1, req).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }

        let unknown = f.engine.create_task(9, create_req("Ghost", 3, "10")).unwrap_err();
        assert!(matches!(unknown, ServiceError::NotFound(_)));

        f.engine.create_task(1, create_req("Taken", 3, "10")).unwrap();
        let dup = f.engine.create_task(1, create_req("Taken", 5, "1")).unwrap_err();
        assert!(matches!(dup, ServiceError::Conflict(_)));
    }

    #[test]
    fn full_flow_three_units_pays_flat_reward_once() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);

        let task = f.engine.create_task(1, create_req("Label batch", 3, "10")).unwrap();
        let claimed = f.engine.claim(task.id, 1).unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert_eq!(claimed.user_id, 1);

        let one = f.engine.submit_unit(task.id, 1, "unit 1 done").unwrap();
        assert_eq!(one.completed_units, 1);
        assert_eq!(one.status, TaskStatus::InProgress);

        let two = f.engine.submit_unit(task.id, 1, "unit 2 done").unwrap();
        assert_eq!(two.completed_units, 2);

        let three = f.engine.submit_unit(task.id, 1, "unit 3 done").unwrap();
        assert_eq!(three.completed_units, 3);
        assert_eq!(three.status, TaskStatus::Completed);
        assert_eq!(three.payment_status, PaymentStatus::Paid);
        assert_eq!(three.task_comments.len(), 3);

        // Flat reward, credited exactly once.
        assert_eq!(balance_of(&f, 1), Decimal::from(10));
        let history = f.ledger.reward_history(1, PageParams::default()).unwrap();
        assert_eq!(history.total, 1);
        assert_eq!(history.total_reward, Decimal::from(10));

        // Fourth submission bounces off the terminal state.
        let extra = f.engine.submit_unit(task.id, 1, "again").unwrap_err();
        assert!(matches!(extra, ServiceError::InvalidState(_)));
        assert_eq!(balance_of(&f, 1), Decimal::from(10));
    }

    #[test]
    fn claim_rules() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);
        seed_worker(&f, 2);

        let task = f.engine.create_task(1, create_req("One seat", 3, "1")).unwrap();
        f.engine.claim(task.id, 1).unwrap();

        let second = f.engine.claim(task.id, 2).unwrap_err();
        assert!(matches!(second, ServiceError::InvalidState(_)));
        assert!(second.to_string().contains("already assigned"));

        let missing = f.engine.claim(99, 1).unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));

        let ghost_worker = f.engine.claim(task.id, 42).unwrap_err();
        assert!(matches!(ghost_worker, ServiceError::NotFound(_)));

        let cancelled = f.engine.create_task(1, create_req("Doomed", 3, "1")).unwrap();
        f.engine.cancel(cancelled.id, 1).unwrap();
        let err = f.engine.claim(cancelled.id, 2).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);
        seed_worker(&f, 2);
        let task = f.engine.create_task(1, create_req("Contested", 3, "1")).unwrap();

        let (r1, r2) = std::thread::scope(|scope| {
            let h1 = scope.spawn(|| f.engine.claim(task.id, 1));
            let h2 = scope.spawn(|| f.engine.claim(task.id, 2));
            (h1.join().unwrap(), h2.join().unwrap())
        });

        let wins = usize::from(r1.is_ok()) + usize::from(r2.is_ok());
        assert_eq!(wins, 1);

        let loser = if r1.is_err() { r1.unwrap_err() } else { r2.unwrap_err() };
        assert!(matches!(loser, ServiceError::InvalidState(_)));
        assert!(loser.to_string().contains("already assigned"));

        // The surviving claimant matches the winning call.
        let (task, _) = f.engine.store().load(task.id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.user_id == 1 || task.user_id == 2);
    }

    #[test]
    fn submit_guards_leave_counters_untouched() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);
        seed_worker(&f, 2);

        let task = f.engine.create_task(1, create_req("Guarded", 5, "1")).unwrap();

        // Unclaimed: no caller is the claimant.
        let err = f.engine.submit_unit(task.id, 1, "early").unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        f.engine.claim(task.id, 1).unwrap();
        f.engine.submit_unit(task.id, 1, "one").unwrap();

        let intruder = f.engine.submit_unit(task.id, 2, "mine now").unwrap_err();
        assert!(matches!(intruder, ServiceError::PermissionDenied(_)));

        f.engine.pause(task.id, 1).unwrap();
        let paused = f.engine.submit_unit(task.id, 1, "while paused").unwrap_err();
        assert!(matches!(paused, ServiceError::InvalidState(_)));

        let (current, _) = f.engine.store().load(task.id).unwrap().unwrap();
        assert_eq!(current.completed_units, 1);
        assert_eq!(current.task_comments, vec!["one".to_string()]);
    }

    #[test]
    fn pause_and_cancel_rules() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_enterprise(&f, 2);
        seed_worker(&f, 1);

        let task = f.engine.create_task(1, create_req("Lifecycle", 3, "1")).unwrap();

        let foreign = f.engine.pause(task.id, 2).unwrap_err();
        assert!(matches!(foreign, ServiceError::PermissionDenied(_)));

        let paused = f.engine.pause(task.id, 1).unwrap();
        assert_eq!(paused.status, TaskStatus::Paused);

        let again = f.engine.pause(task.id, 1).unwrap_err();
        assert!(matches!(again, ServiceError::InvalidState(_)));

        // Paused tasks can still be cancelled.
        let cancelled = f.engine.cancel(task.id, 1).unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);

        let twice = f.engine.cancel(task.id, 1).unwrap_err();
        assert!(matches!(twice, ServiceError::InvalidState(_)));

        // Completed tasks cannot be cancelled.
        let done = f.engine.create_task(1, create_req("Finish me", 1, "1")).unwrap();
        f.engine.claim(done.id, 1).unwrap();
        f.engine.submit_unit(done.id, 1, "done").unwrap();
        let err = f.engine.cancel(done.id, 1).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn review_with_partial_units_is_rejected() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);

        let task = f.engine.create_task(1, create_req("Partial", 5, "10")).unwrap();
        f.engine.claim(task.id, 1).unwrap();
        f.engine.submit_unit(task.id, 1, "one").unwrap();
        f.engine.submit_unit(task.id, 1, "two").unwrap();

        let err = f.engine.review(task.id, 1, true).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        // Status, payment and balance are all unchanged.
        let (current, _) = f.engine.store().load(task.id).unwrap().unwrap();
        assert_eq!(current.status, TaskStatus::InProgress);
        assert_eq!(current.payment_status, PaymentStatus::Unpaid);
        assert_eq!(current.completed_units, 2);
        assert_eq!(balance_of(&f, 1), Decimal::ZERO);
    }

    #[test]
    fn review_accept_on_completed_is_idempotent_confirmation() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);

        let task = f.engine.create_task(1, create_req("Confirm", 2, "7")).unwrap();
        f.engine.claim(task.id, 1).unwrap();
        f.engine.submit_unit(task.id, 1, "a").unwrap();
        f.engine.submit_unit(task.id, 1, "b").unwrap();

        let reviewed = f.engine.review(task.id, 1, true).unwrap();
        assert_eq!(reviewed.status, TaskStatus::Completed);

        // No second credit from the confirmation.
        assert_eq!(balance_of(&f, 1), Decimal::from(7));
        assert_eq!(f.ledger.reward_history(1, PageParams::default()).unwrap().total, 1);
    }

    #[test]
    fn review_reject_keeps_task_in_progress() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);

        let task = f.engine.create_task(1, create_req("Redo", 3, "1")).unwrap();
        f.engine.claim(task.id, 1).unwrap();

        let rejected = f.engine.review(task.id, 1, false).unwrap();
        assert_eq!(rejected.status, TaskStatus::InProgress);

        // A completed task cannot be sent back.
        let done = f.engine.create_task(1, create_req("Done deal", 1, "1")).unwrap();
        f.engine.claim(done.id, 1).unwrap();
        f.engine.submit_unit(done.id, 1, "x").unwrap();
        let err = f.engine.review(done.id, 1, false).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn feedback_rules() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_enterprise(&f, 2);
        seed_worker(&f, 1);

        let task = f.engine.create_task(1, create_req("Rate me", 1, "1")).unwrap();
        f.engine.claim(task.id, 1).unwrap();

        let early = f.engine.provide_feedback(task.id, 1, "nice", 4.0).unwrap_err();
        assert!(matches!(early, ServiceError::InvalidState(_)));

        f.engine.submit_unit(task.id, 1, "x").unwrap();

        for bad in [-0.1, 5.1, f64::NAN] {
            let err = f.engine.provide_feedback(task.id, 1, "r", bad).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }

        let foreign = f.engine.provide_feedback(task.id, 2, "not mine", 3.0).unwrap_err();
        assert!(matches!(foreign, ServiceError::PermissionDenied(_)));

        let rated = f.engine.provide_feedback(task.id, 1, "solid work", 4.5).unwrap();
        assert_eq!(rated.review_comment, "solid work");
        assert_eq!(rated.rating, Some(4.5));
        assert_eq!(rated.status, TaskStatus::Completed);
    }

    #[test]
    fn browse_shows_only_unclaimed_pending() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);

        let open = f.engine.create_task(1, create_req("Open", 3, "5")).unwrap();
        let claimed = f.engine.create_task(1, create_req("Claimed", 3, "5")).unwrap();
        let paused = f.engine.create_task(1, create_req("Shelved", 3, "5")).unwrap();
        f.engine.claim(claimed.id, 1).unwrap();
        f.engine.pause(paused.id, 1).unwrap();

        let page = f
            .engine
            .browse_available(&TaskFilter::default(), PageParams::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, open.id);
    }

    #[test]
    fn browse_filters_are_a_conjunction() {
        let f = setup();
        seed_enterprise(&f, 1);

        for (title, ty, diff, reward) in [
            ("A", TaskType::DataEntry, TaskDifficulty::Easy, "1"),
            ("B", TaskType::DataEntry, TaskDifficulty::Easy, "6"),
            ("C", TaskType::Translation, TaskDifficulty::Easy, "6"),
            ("D", TaskType::DataEntry, TaskDifficulty::Hard, "6"),
        ] {
            let mut req = create_req(title, 3, reward);
            req.task_type = ty;
            req.difficulty = diff;
            f.engine.create_task(1, req).unwrap();
        }

        let filter = TaskFilter {
            task_type: Some(TaskType::DataEntry),
            difficulty: Some(TaskDifficulty::Easy),
            min_reward: Some("5".parse().unwrap()),
            max_reward: Some("10".parse().unwrap()),
            ..Default::default()
        };
        let page = f.engine.browse_available(&filter, PageParams::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "B");

        let paged = f
            .engine
            .browse_available(&TaskFilter::default(), PageParams::new(2, 3))
            .unwrap();
        assert_eq!(paged.total, 4);
        assert_eq!(paged.items.len(), 1);

        let bad_page = f
            .engine
            .browse_available(&TaskFilter::default(), PageParams::new(1, 0))
            .unwrap_err();
        assert!(matches!(bad_page, ServiceError::Validation(_)));
    }

    #[test]
    fn enterprise_listing_can_filter_by_status() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_enterprise(&f, 2);
        seed_worker(&f, 1);

        let a = f.engine.create_task(1, create_req("Mine A", 3, "1")).unwrap();
        f.engine.create_task(1, create_req("Mine B", 3, "1")).unwrap();
        f.engine.create_task(2, create_req("Theirs", 3, "1")).unwrap();
        f.engine.claim(a.id, 1).unwrap();

        let all = f
            .engine
            .list_enterprise_tasks(1, &TaskFilter::default(), PageParams::default())
            .unwrap();
        assert_eq!(all.total, 2);

        let working = f
            .engine
            .list_enterprise_tasks(
                1,
                &TaskFilter { status: Some(TaskStatus::InProgress), ..Default::default() },
                PageParams::default(),
            )
            .unwrap();
        assert_eq!(working.total, 1);
        assert_eq!(working.items[0].id, a.id);
    }

    #[test]
    fn my_tasks_sorted_by_recent_activity() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);
        seed_worker(&f, 2);

        let a = f.engine.create_task(1, create_req("Older", 3, "1")).unwrap();
        let b = f.engine.create_task(1, create_req("Newer", 3, "1")).unwrap();
        let other = f.engine.create_task(1, create_req("Other worker", 3, "1")).unwrap();
        f.engine.claim(a.id, 1).unwrap();
        f.engine.claim(b.id, 1).unwrap();
        f.engine.claim(other.id, 2).unwrap();

        // Touch A so it becomes the most recent.
        f.engine.submit_unit(a.id, 1, "unit").unwrap();

        let mine = f.engine.my_tasks(1, PageParams::default()).unwrap();
        assert_eq!(mine.total, 2);
        assert_eq!(mine.items[0].id, a.id);
        assert_eq!(mine.items[1].id, b.id);
    }

    #[test]
    fn details_visibility() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_enterprise(&f, 2);
        seed_worker(&f, 1);
        seed_worker(&f, 2);

        let task = f.engine.create_task(1, create_req("Visible", 3, "1")).unwrap();

        // Pending and unclaimed: anyone may look.
        f.engine.get_task_details(task.id, Subject::worker(2)).unwrap();
        f.engine.get_task_details(task.id, Subject::enterprise(2)).unwrap();

        f.engine.claim(task.id, 1).unwrap();

        f.engine.get_task_details(task.id, Subject::worker(1)).unwrap();
        f.engine.get_task_details(task.id, Subject::enterprise(1)).unwrap();
        let hidden = f
            .engine
            .get_task_details(task.id, Subject::worker(2))
            .unwrap_err();
        assert!(matches!(hidden, ServiceError::PermissionDenied(_)));
        let foreign = f
            .engine
            .get_task_details(task.id, Subject::enterprise(2))
            .unwrap_err();
        assert!(matches!(foreign, ServiceError::PermissionDenied(_)));

        let missing = f
            .engine
            .get_task_details(99, Subject::worker(1))
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));
    }

    #[test]
    fn progress_is_idempotent_and_exact() {
        let f = setup();
        seed_enterprise(&f, 1);
        seed_worker(&f, 1);

        let task = f.engine.create_task(1, create_req("Meter", 5, "1")).unwrap();
        f.engine.claim(task.id, 1).unwrap();
        f.engine.submit_unit(task.id, 1, "one").unwrap();
        f.engine.submit_unit(task.id, 1, "two").unwrap();

        let first = f.engine.progress(task.id, Subject::worker(1)).unwrap();
        let second = f.engine.progress(task.id, Subject::worker(1)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.completed_units, 2);
        assert_eq!(first.total_units, 5);
        assert!((first.progress_percentage - 40.0).abs() < f64::EPSILON);
        assert_eq!(first.status, TaskStatus::InProgress);
    }
}
