use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use workbridge_account::model::Subject;
use workbridge_core::ServiceError;

use crate::engine::TaskEngine;
use crate::model::{
    CreateTaskRequest, FeedbackRequest, ReviewRequest, SubmitUnitRequest, Task, TaskListQuery,
};

type EngineState = Arc<TaskEngine>;

pub fn router(engine: Arc<TaskEngine>) -> Router {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/@claim", post(claim_task))
        .route("/tasks/{id}/@submit", post(submit_unit))
        .route("/tasks/{id}/@pause", post(pause_task))
        .route("/tasks/{id}/@cancel", post(cancel_task))
        .route("/tasks/{id}/@review", post(review_task))
        .route("/tasks/{id}/@feedback", post(provide_feedback))
        .with_state(engine)
}

// ---------------------------------------------------------------------------
// POST /tasks
// ---------------------------------------------------------------------------

async fn create_task(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.create_task(subject.enterprise_id()?, req)?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// GET /tasks
// ---------------------------------------------------------------------------

async fn list_tasks(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result =
        engine.list_enterprise_tasks(subject.enterprise_id()?, &query.filter(), query.page())?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

// ---------------------------------------------------------------------------
// GET /tasks/:id
// ---------------------------------------------------------------------------

async fn get_task(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.get_task_details(id, subject)?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// POST /tasks/:id/@claim
// ---------------------------------------------------------------------------

async fn claim_task(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.claim(id, subject.worker_id()?)?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// POST /tasks/:id/@submit
// ---------------------------------------------------------------------------

async fn submit_unit(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitUnitRequest>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.submit_unit(id, subject.worker_id()?, &req.comment)?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// POST /tasks/:id/@pause
// ---------------------------------------------------------------------------

async fn pause_task(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.pause(id, subject.enterprise_id()?)?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// POST /tasks/:id/@cancel
// ---------------------------------------------------------------------------

async fn cancel_task(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.cancel(id, subject.enterprise_id()?)?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// POST /tasks/:id/@review
// ---------------------------------------------------------------------------

async fn review_task(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.review(id, subject.enterprise_id()?, req.is_accepted)?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// POST /tasks/:id/@feedback
// ---------------------------------------------------------------------------

async fn provide_feedback(
    State(engine): State<EngineState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<Task>, ServiceError> {
    let task = engine.provide_feedback(id, subject.enterprise_id()?, &req.review_comment, req.rating)?;
    Ok(Json(task))
}
