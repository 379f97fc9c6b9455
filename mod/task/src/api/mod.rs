mod listings;
mod tasks;

use std::sync::Arc;
use axum::Router;

use crate::engine::TaskEngine;

/// Build the complete task module router.
///
/// Routes:
/// - `POST /tasks`                — create task (enterprise)
/// - `GET  /tasks`                — the enterprise's own tasks
/// - `GET  /tasks/{id}`           — task details
/// - `GET  /tasks/{id}/progress`  — completion meter
/// - `POST /tasks/{id}/@claim`    — claim (worker)
/// - `POST /tasks/{id}/@submit`   — submit one finished unit (claimant)
/// - `POST /tasks/{id}/@pause`    — pause (owner)
/// - `POST /tasks/{id}/@cancel`   — cancel (owner)
/// - `POST /tasks/{id}/@review`   — accept or reject delivery (owner)
/// - `POST /tasks/{id}/@feedback` — verdict comment + rating (owner)
/// - `GET  /browse`               — available tasks
/// - `GET  /my-tasks`             — the worker's claimed tasks
pub fn router(engine: Arc<TaskEngine>) -> Router {
    Router::new()
        .merge(tasks::router(Arc::clone(&engine)))
        .merge(listings::router(engine))
}
