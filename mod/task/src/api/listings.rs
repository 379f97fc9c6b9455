use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use workbridge_account::model::Subject;
use workbridge_core::{PageParams, ServiceError};

use crate::engine::TaskEngine;
use crate::model::{TaskListQuery, TaskProgress};

type EngineState = Arc<TaskEngine>;

pub fn router(engine: Arc<TaskEngine>) -> Router {
    Router::new()
        .route("/browse", get(browse_tasks))
        .route("/my-tasks", get(my_tasks))
        .route("/tasks/{id}/progress", get(task_progress))
        .with_state(engine)
}

// ---------------------------------------------------------------------------
// GET /browse
// ---------------------------------------------------------------------------

/// Unclaimed pending tasks. No role guard: everything listed here is
/// visible to any authenticated account.
async fn browse_tasks(
    State(engine): State<EngineState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = engine.browse_available(&query.filter(), query.page())?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

// ---------------------------------------------------------------------------
// GET /my-tasks
// ---------------------------------------------------------------------------

async fn my_tasks(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Query(page): Query<PageParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = engine.my_tasks(subject.worker_id()?, page)?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

// ---------------------------------------------------------------------------
// GET /tasks/:id/progress
// ---------------------------------------------------------------------------

async fn task_progress(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<TaskProgress>, ServiceError> {
    let progress = engine.progress(id, subject)?;
    Ok(Json(progress))
}
