use std::sync::Arc;

use rust_decimal::Decimal;

use workbridge_core::{PageParams, ServiceError};
use workbridge_store::{Entity, EntityStore, FieldValue, Filter, SortOrder, StoreError, TableSpec};

use crate::model::{PaymentStatus, Task, TaskDifficulty, TaskFilter, TaskStatus, TaskType};

pub const TASKS: TableSpec = TableSpec {
    name: "tasks",
    unique_fields: &["title"],
};

/// Persistent storage for tasks.
///
/// Every row carries the store's version stamp; the engine's claim and
/// submit paths go through `update_checked` so racing writers cannot
/// clobber each other.
pub struct TaskStore {
    db: Arc<dyn EntityStore>,
}

impl TaskStore {
    pub fn new(db: Arc<dyn EntityStore>) -> Result<Self, ServiceError> {
        db.ensure_table(&TASKS).map_err(storage)?;
        Ok(Self { db })
    }

    pub fn next_task_id(&self) -> Result<i64, ServiceError> {
        self.db.next_id_for_partition(TASKS.name).map_err(storage)
    }

    /// Insert a new task. A racing create with the same title fails
    /// here on the unique index.
    pub fn insert(&self, task: &Task) -> Result<(), ServiceError> {
        let key = task.id.to_string();
        let mut entity = Entity::new(key.as_str(), key.as_str());
        for (name, value) in task_fields(task)? {
            entity = entity.with_field(name, value);
        }
        self.db.insert(TASKS.name, &entity).map_err(storage)
    }

    /// Fetch a task together with its version stamp.
    pub fn load(&self, task_id: i64) -> Result<Option<(Task, i64)>, ServiceError> {
        let key = task_id.to_string();
        match self.db.get(TASKS.name, &key, &key).map_err(storage)? {
            Some(entity) => Ok(Some((entity_to_task(&entity)?, entity.version))),
            None => Ok(None),
        }
    }

    pub fn get_by_title(&self, title: &str) -> Result<Option<Task>, ServiceError> {
        match self
            .db
            .get_by_field(TASKS.name, "title", &FieldValue::text(title))
            .map_err(storage)?
        {
            Some(entity) => Ok(Some(entity_to_task(&entity)?)),
            None => Ok(None),
        }
    }

    /// Conditional field merge; `false` means the version moved and the
    /// caller lost the race.
    pub fn update_checked(
        &self,
        task_id: i64,
        version: i64,
        fields: &[(&str, FieldValue)],
    ) -> Result<bool, ServiceError> {
        let key = task_id.to_string();
        self.db
            .update_fields_checked(TASKS.name, &key, &key, version, fields)
            .map_err(storage)
    }

    /// Unconditional field merge (payment marks, feedback).
    pub fn update(&self, task_id: i64, fields: &[(&str, FieldValue)]) -> Result<bool, ServiceError> {
        let key = task_id.to_string();
        self.db
            .update_fields(TASKS.name, &key, &key, fields)
            .map_err(storage)
    }

    /// One page of tasks matching the given predicates.
    pub fn list(
        &self,
        filters: &[Filter],
        order: Option<SortOrder>,
        page: PageParams,
    ) -> Result<(Vec<Task>, usize), ServiceError> {
        let (entities, total) = self
            .db
            .list_paginated(TASKS.name, filters, order.as_ref(), page.page, page.page_size)
            .map_err(storage)?;
        let items = entities
            .iter()
            .map(entity_to_task)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }
}

/// Translate the optional predicates into store filters. The reward
/// bounds compare by numeric magnitude even though amounts are stored
/// as text.
pub fn build_filters(filter: &TaskFilter) -> Vec<Filter> {
    let mut filters = Vec::new();
    if let Some(t) = filter.task_type {
        filters.push(Filter::eq("type", FieldValue::text(t.as_str())));
    }
    if let Some(d) = filter.difficulty {
        filters.push(Filter::eq("difficulty", FieldValue::text(d.as_str())));
    }
    if let Some(min) = filter.min_reward {
        filters.push(Filter::ge("reward_per_unit", FieldValue::text(min.to_string())));
    }
    if let Some(max) = filter.max_reward {
        filters.push(Filter::le("reward_per_unit", FieldValue::text(max.to_string())));
    }
    if let Some(s) = filter.status {
        filters.push(Filter::eq("status", FieldValue::text(s.as_str())));
    }
    filters
}

fn storage(e: StoreError) -> ServiceError {
    match e {
        StoreError::Duplicate(m) => ServiceError::Conflict(m),
        StoreError::Encoding(m) => ServiceError::Internal(m),
        StoreError::Connection(m) | StoreError::Backend(m) => ServiceError::Storage(m),
    }
}

// ── Entity mapping ──────────────────────────────────────────────────

pub(crate) fn task_fields(task: &Task) -> Result<Vec<(&'static str, FieldValue)>, ServiceError> {
    let resources = serde_json::to_string(&task.resources)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    let comments = serde_json::to_string(&task.task_comments)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut fields = vec![
        ("id", FieldValue::Int(task.id)),
        ("enterprise_id", FieldValue::Int(task.enterprise_id)),
        ("user_id", FieldValue::Int(task.user_id)),
        ("title", FieldValue::text(task.title.as_str())),
        ("description", FieldValue::text(task.description.as_str())),
        ("type", FieldValue::text(task.task_type.as_str())),
        ("difficulty", FieldValue::text(task.difficulty.as_str())),
        ("resources", FieldValue::text(resources)),
        (
            "deadline",
            FieldValue::text(task.deadline.clone().unwrap_or_default()),
        ),
        (
            "reward_per_unit",
            FieldValue::text(task.reward_per_unit.to_string()),
        ),
        ("total_units", FieldValue::Int(task.total_units)),
        ("completed_units", FieldValue::Int(task.completed_units)),
        ("status", FieldValue::text(task.status.as_str())),
        ("payment_status", FieldValue::text(task.payment_status.as_str())),
        ("review_comment", FieldValue::text(task.review_comment.as_str())),
        ("task_comments", FieldValue::text(comments)),
        ("created_at", FieldValue::text(task.created_at.as_str())),
        ("updated_at", FieldValue::text(task.updated_at.as_str())),
    ];
    if let Some(rating) = task.rating {
        fields.push(("rating", FieldValue::Real(rating)));
    }
    Ok(fields)
}

fn text_field(entity: &Entity, name: &str) -> Result<String, ServiceError> {
    entity
        .get_str(name)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Internal(format!("task entity missing field {name}")))
}

fn int_field(entity: &Entity, name: &str) -> Result<i64, ServiceError> {
    entity
        .get_i64(name)
        .ok_or_else(|| ServiceError::Internal(format!("task entity missing field {name}")))
}

fn string_list(entity: &Entity, name: &str) -> Result<Vec<String>, ServiceError> {
    let raw = text_field(entity, name)?;
    serde_json::from_str(&raw)
        .map_err(|e| ServiceError::Internal(format!("bad list in field {name}: {e}")))
}

fn token_field<T>(
    entity: &Entity,
    name: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, ServiceError> {
    let token = text_field(entity, name)?;
    parse(&token)
        .ok_or_else(|| ServiceError::Internal(format!("bad token in field {name}: {token}")))
}

pub(crate) fn entity_to_task(entity: &Entity) -> Result<Task, ServiceError> {
    let deadline = match text_field(entity, "deadline")? {
        s if s.is_empty() => None,
        s => Some(s),
    };
    let reward = text_field(entity, "reward_per_unit")?
        .parse::<Decimal>()
        .map_err(|e| ServiceError::Internal(format!("bad decimal in field reward_per_unit: {e}")))?;

    Ok(Task {
        id: int_field(entity, "id")?,
        enterprise_id: int_field(entity, "enterprise_id")?,
        user_id: int_field(entity, "user_id")?,
        title: text_field(entity, "title")?,
        description: text_field(entity, "description")?,
        task_type: token_field(entity, "type", TaskType::from_str)?,
        difficulty: token_field(entity, "difficulty", TaskDifficulty::from_str)?,
        resources: string_list(entity, "resources")?,
        deadline,
        reward_per_unit: reward,
        total_units: int_field(entity, "total_units")?,
        completed_units: int_field(entity, "completed_units")?,
        status: token_field(entity, "status", TaskStatus::from_str)?,
        payment_status: token_field(entity, "payment_status", PaymentStatus::from_str)?,
        review_comment: text_field(entity, "review_comment")?,
        rating: entity.get_f64("rating"),
        task_comments: string_list(entity, "task_comments")?,
        created_at: text_field(entity, "created_at")?,
        updated_at: text_field(entity, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use workbridge_store::SqliteStore;

    fn test_store() -> TaskStore {
        let db: Arc<dyn EntityStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        TaskStore::new(db).unwrap()
    }

    fn make_task(id: i64, title: &str) -> Task {
        Task {
            id,
            enterprise_id: 1,
            user_id: 0,
            title: title.into(),
            description: "desc".into(),
            task_type: TaskType::DataEntry,
            difficulty: TaskDifficulty::Easy,
            resources: vec!["https://cdn.example/a".into()],
            deadline: None,
            reward_per_unit: "2.50".parse().unwrap(),
            total_units: 3,
            completed_units: 0,
            status: TaskStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            review_comment: String::new(),
            rating: None,
            task_comments: vec![],
            created_at: "2025-08-01T00:00:00+00:00".into(),
            updated_at: "2025-08-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn roundtrip_preserves_every_field() {
        let store = test_store();
        let mut task = make_task(1, "Enter survey data");
        task.deadline = Some("2025-09-01T00:00:00+00:00".into());
        task.task_comments = vec!["first".into()];
        task.rating = Some(4.5);
        store.insert(&task).unwrap();

        let (got, version) = store.load(1).unwrap().unwrap();
        assert_eq!(version, 1);
        assert_eq!(got.title, task.title);
        assert_eq!(got.resources, task.resources);
        assert_eq!(got.deadline, task.deadline);
        assert_eq!(got.reward_per_unit, task.reward_per_unit);
        assert_eq!(got.rating, Some(4.5));
        assert_eq!(got.task_comments, vec!["first".to_string()]);
        assert_eq!(got.status, TaskStatus::Pending);
    }

    #[test]
    fn titles_are_unique() {
        let store = test_store();
        store.insert(&make_task(1, "Same title")).unwrap();
        let err = store.insert(&make_task(2, "Same title")).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(store.load(2).unwrap().is_none());
    }

    #[test]
    fn checked_update_respects_version() {
        let store = test_store();
        store.insert(&make_task(1, "CAS me")).unwrap();
        let (_, version) = store.load(1).unwrap().unwrap();

        assert!(store
            .update_checked(1, version, &[("user_id", FieldValue::Int(7))])
            .unwrap());
        // Stale version loses.
        assert!(!store
            .update_checked(1, version, &[("user_id", FieldValue::Int(8))])
            .unwrap());

        let (task, new_version) = store.load(1).unwrap().unwrap();
        assert_eq!(task.user_id, 7);
        assert_eq!(new_version, version + 1);
    }

    #[test]
    fn filters_compose_as_conjunction() {
        let store = test_store();
        for (id, ty, diff, reward) in [
            (1, TaskType::DataEntry, TaskDifficulty::Easy, "1.00"),
            (2, TaskType::DataEntry, TaskDifficulty::Hard, "5.00"),
            (3, TaskType::Translation, TaskDifficulty::Easy, "10.00"),
            (4, TaskType::DataEntry, TaskDifficulty::Easy, "7.50"),
        ] {
            let mut task = make_task(id, &format!("task {id}"));
            task.task_type = ty;
            task.difficulty = diff;
            task.reward_per_unit = reward.parse().unwrap();
            store.insert(&task).unwrap();
        }

        let filter = TaskFilter {
            task_type: Some(TaskType::DataEntry),
            difficulty: Some(TaskDifficulty::Easy),
            min_reward: Some("2".parse().unwrap()),
            ..Default::default()
        };
        let (items, total) = store
            .list(&build_filters(&filter), None, PageParams::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, 4);

        // Reward range is numeric, not lexicographic: 7.50 <= 10.
        let range_only = TaskFilter {
            min_reward: Some("5".parse().unwrap()),
            max_reward: Some("10".parse().unwrap()),
            ..Default::default()
        };
        let (_, total) = store
            .list(&build_filters(&range_only), None, PageParams::default())
            .unwrap();
        assert_eq!(total, 3);
    }
}
