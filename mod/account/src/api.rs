use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use workbridge_core::ServiceError;

use crate::model::{
    Enterprise, ForgotPasswordRequest, LoginEnterpriseRequest, LoginResponse, LoginWorkerRequest,
    RegisterEnterpriseRequest, RegisterWorkerRequest, Subject, UpdateEnterpriseProfileRequest,
    UpdateWorkerProfileRequest, Worker,
};
use crate::service::AccountService;

type ServiceState = Arc<AccountService>;

pub fn router(service: Arc<AccountService>) -> Router {
    Router::new()
        .route("/workers/register", post(register_worker))
        .route("/workers/login", post(login_worker))
        .route("/workers/forgot-password", post(forgot_password))
        .route("/workers/profile", get(worker_profile).put(update_worker_profile))
        .route("/enterprises/register", post(register_enterprise))
        .route("/enterprises/login", post(login_enterprise))
        .route(
            "/enterprises/profile",
            get(enterprise_profile).put(update_enterprise_profile),
        )
        .with_state(service)
}

// ---------------------------------------------------------------------------
// POST /workers/register
// ---------------------------------------------------------------------------

async fn register_worker(
    State(service): State<ServiceState>,
    Json(req): Json<RegisterWorkerRequest>,
) -> Result<Json<Worker>, ServiceError> {
    let worker = service.register_worker(req)?;
    Ok(Json(worker))
}

// ---------------------------------------------------------------------------
// POST /workers/login
// ---------------------------------------------------------------------------

async fn login_worker(
    State(service): State<ServiceState>,
    Json(req): Json<LoginWorkerRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let (worker, token) = service.login_worker(&req.username, &req.password)?;
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: service.token_ttl_secs(),
        user_id: worker.user_id,
    }))
}

// ---------------------------------------------------------------------------
// POST /workers/forgot-password
// ---------------------------------------------------------------------------

async fn forgot_password(
    State(service): State<ServiceState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    service.reset_password(req)?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

// ---------------------------------------------------------------------------
// GET /workers/profile
// ---------------------------------------------------------------------------

async fn worker_profile(
    State(service): State<ServiceState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<Worker>, ServiceError> {
    let worker = service.get_worker(subject.worker_id()?)?;
    Ok(Json(worker))
}

// ---------------------------------------------------------------------------
// PUT /workers/profile
// ---------------------------------------------------------------------------

async fn update_worker_profile(
    State(service): State<ServiceState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<UpdateWorkerProfileRequest>,
) -> Result<Json<Worker>, ServiceError> {
    let worker = service.update_worker_profile(subject.worker_id()?, req)?;
    Ok(Json(worker))
}

// ---------------------------------------------------------------------------
// POST /enterprises/register
// ---------------------------------------------------------------------------

async fn register_enterprise(
    State(service): State<ServiceState>,
    Json(req): Json<RegisterEnterpriseRequest>,
) -> Result<Json<Enterprise>, ServiceError> {
    let enterprise = service.register_enterprise(req)?;
    Ok(Json(enterprise))
}

// ---------------------------------------------------------------------------
// POST /enterprises/login
// ---------------------------------------------------------------------------

async fn login_enterprise(
    State(service): State<ServiceState>,
    Json(req): Json<LoginEnterpriseRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let (enterprise, token) = service.login_enterprise(&req.email, &req.password)?;
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: service.token_ttl_secs(),
        user_id: enterprise.id,
    }))
}

// ---------------------------------------------------------------------------
// GET /enterprises/profile
// ---------------------------------------------------------------------------

async fn enterprise_profile(
    State(service): State<ServiceState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<Enterprise>, ServiceError> {
    let enterprise = service.get_enterprise(subject.enterprise_id()?)?;
    Ok(Json(enterprise))
}

// ---------------------------------------------------------------------------
// PUT /enterprises/profile
// ---------------------------------------------------------------------------

async fn update_enterprise_profile(
    State(service): State<ServiceState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<UpdateEnterpriseProfileRequest>,
) -> Result<Json<Enterprise>, ServiceError> {
    let enterprise = service.update_enterprise_profile(subject.enterprise_id()?, req)?;
    Ok(Json(enterprise))
}
