use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use workbridge_core::PageParams;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle state of a task.
///
/// ```text
/// pending → in_progress → completed
///         → paused
///         → cancelled
/// ```
///
/// `paused` and `cancelled` are reachable from both `pending` and
/// `in_progress`; a paused task can still be cancelled. No state is
/// ever re-entered once `completed` or `cancelled` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Paused,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "paused" => Some(Self::Paused),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of micro-task the marketplace carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    DataEntry,
    ImageLabeling,
    ContentModeration,
    Translation,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataEntry => "data_entry",
            Self::ImageLabeling => "image_labeling",
            Self::ContentModeration => "content_moderation",
            Self::Translation => "translation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "data_entry" => Some(Self::DataEntry),
            "image_labeling" => Some(Self::ImageLabeling),
            "content_moderation" => Some(Self::ContentModeration),
            "translation" => Some(Self::Translation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDifficulty {
    Easy,
    Medium,
    Hard,
}

impl TaskDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// Settlement state of a task's reward. The engine moves this
/// `unpaid → processing → paid` around the completion credit;
/// `failed` marks a credit that could not be settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Processing,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(Self::Unpaid),
            "processing" => Some(Self::Processing),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Task — the core data model
// ---------------------------------------------------------------------------

/// A unit-counted micro-task posted by an enterprise and worked by at
/// most one claimant for its lifetime.
///
/// `user_id == 0` means unclaimed. `completed_units` never exceeds
/// `total_units`, and `status == completed` implies they are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,

    // --- ownership ---
    /// Creating enterprise; controls pause/cancel/review/feedback.
    pub enterprise_id: i64,
    /// Claimant worker; controls submission. Zero until claimed.
    #[serde(default)]
    pub user_id: i64,

    // --- definition ---
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub difficulty: TaskDifficulty,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,

    // --- economics & progress ---
    pub reward_per_unit: Decimal,
    pub total_units: i64,
    #[serde(default)]
    pub completed_units: i64,

    // --- lifecycle ---
    pub status: TaskStatus,
    pub payment_status: PaymentStatus,

    // --- review ---
    #[serde(default)]
    pub review_comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// One entry appended per submission call.
    #[serde(default)]
    pub task_comments: Vec<String>,

    // --- timestamps ---
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn is_claimed(&self) -> bool {
        self.user_id != 0
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.total_units == 0 {
            return 0.0;
        }
        self.completed_units as f64 / self.total_units as f64 * 100.0
    }
}

/// Answer shape for the progress endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub completed_units: i64,
    pub total_units: i64,
    pub progress_percentage: f64,
    pub status: TaskStatus,
}

// ---------------------------------------------------------------------------
// Engine inputs
// ---------------------------------------------------------------------------

/// Body for `POST /task/tasks`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub difficulty: TaskDifficulty,
    #[serde(default)]
    pub deadline: Option<String>,
    pub reward_per_unit: Decimal,
    pub total_units: i64,
    #[serde(default)]
    pub resources: Vec<String>,
}

/// Body for `POST /task/tasks/{id}/@submit`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitUnitRequest {
    #[serde(default)]
    pub comment: String,
}

/// Body for `POST /task/tasks/{id}/@review`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub is_accepted: bool,
}

/// Body for `POST /task/tasks/{id}/@feedback`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub review_comment: String,
    pub rating: f64,
}

/// Filter half of the listing queries. Every predicate is optional;
/// set predicates combine as a conjunction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub task_type: Option<TaskType>,
    pub difficulty: Option<TaskDifficulty>,
    pub min_reward: Option<Decimal>,
    pub max_reward: Option<Decimal>,
    pub status: Option<TaskStatus>,
}

/// Query string for `GET /task/tasks` and `GET /task/browse`.
///
/// Filters and paging in one flat struct; browse ignores `status` (it
/// only ever shows pending tasks).
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub task_type: Option<TaskType>,
    pub difficulty: Option<TaskDifficulty>,
    pub min_reward: Option<Decimal>,
    pub max_reward: Option<Decimal>,
    pub status: Option<TaskStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl TaskListQuery {
    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            task_type: self.task_type,
            difficulty: self.difficulty,
            min_reward: self.min_reward,
            max_reward: self.max_reward,
            status: self.status,
        }
    }

    pub fn page(&self) -> PageParams {
        let defaults = PageParams::default();
        PageParams {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tokens_roundtrip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Paused,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::from_str("running"), None);
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn type_and_difficulty_tokens() {
        assert_eq!(TaskType::ImageLabeling.as_str(), "image_labeling");
        assert_eq!(TaskType::from_str("translation"), Some(TaskType::Translation));
        assert_eq!(TaskDifficulty::from_str("hard"), Some(TaskDifficulty::Hard));
        assert_eq!(TaskDifficulty::from_str("extreme"), None);
    }

    #[test]
    fn create_request_wire_shape() {
        let req: CreateTaskRequest = serde_json::from_str(
            r#"{
                "title": "Translate leaflets",
                "type": "translation",
                "difficulty": "medium",
                "rewardPerUnit": "2.50",
                "totalUnits": 40
            }"#,
        )
        .unwrap();
        assert_eq!(req.task_type, TaskType::Translation);
        assert_eq!(req.reward_per_unit, "2.50".parse().unwrap());
        assert!(req.resources.is_empty());
        assert!(req.deadline.is_none());
    }

    #[test]
    fn progress_percentage_math() {
        let mut task = Task {
            id: 1,
            enterprise_id: 1,
            user_id: 0,
            title: "t".into(),
            description: String::new(),
            task_type: TaskType::DataEntry,
            difficulty: TaskDifficulty::Easy,
            resources: vec![],
            deadline: None,
            reward_per_unit: Decimal::ONE,
            total_units: 5,
            completed_units: 2,
            status: TaskStatus::InProgress,
            payment_status: PaymentStatus::Unpaid,
            review_comment: String::new(),
            rating: None,
            task_comments: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!((task.progress_percentage() - 40.0).abs() < f64::EPSILON);
        task.total_units = 0;
        assert_eq!(task.progress_percentage(), 0.0);
        assert!(!task.is_claimed());
        task.user_id = 9;
        assert!(task.is_claimed());
    }

    #[test]
    fn task_json_hides_empty_options() {
        let task = Task {
            id: 3,
            enterprise_id: 1,
            user_id: 0,
            title: "Moderate posts".into(),
            description: String::new(),
            task_type: TaskType::ContentModeration,
            difficulty: TaskDifficulty::Medium,
            resources: vec!["https://cdn.example/batch1".into()],
            deadline: None,
            reward_per_unit: "0.75".parse().unwrap(),
            total_units: 100,
            completed_units: 0,
            status: TaskStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            review_comment: String::new(),
            rating: None,
            task_comments: vec![],
            created_at: "2025-08-01T00:00:00+00:00".into(),
            updated_at: "2025-08-01T00:00:00+00:00".into(),
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains(r#""type":"content_moderation""#));
        assert!(json.contains(r#""rewardPerUnit":"0.75""#));
        assert!(!json.contains("deadline"));
        assert!(!json.contains("rating"));
    }

    #[test]
    fn list_query_fills_page_defaults() {
        let query: TaskListQuery = serde_json::from_value(serde_json::json!({
            "task_type": "data_entry",
            "min_reward": "0.5",
        }))
        .unwrap();
        assert_eq!(query.filter().task_type, Some(TaskType::DataEntry));
        assert_eq!(query.filter().min_reward, Some("0.5".parse().unwrap()));
        assert!(query.filter().status.is_none());
        assert_eq!(query.page().page, 1);
        assert_eq!(query.page().page_size, 10);

        let paged: TaskListQuery =
            serde_json::from_value(serde_json::json!({ "page": 3, "page_size": 25 })).unwrap();
        assert_eq!(paged.page().page, 3);
        assert_eq!(paged.page().page_size, 25);
    }
}
