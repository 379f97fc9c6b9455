use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use workbridge_core::ServiceError;

// ---------------------------------------------------------------------------
// Role & Subject — the authenticated caller identity
// ---------------------------------------------------------------------------

/// Which side of the marketplace a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Worker,
    Enterprise,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "worker" => Some(Self::Worker),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified bearer identity, installed in request extensions by the
/// auth middleware and consumed by handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub id: i64,
    pub role: Role,
}

impl Subject {
    pub fn worker(id: i64) -> Self {
        Self { id, role: Role::Worker }
    }

    pub fn enterprise(id: i64) -> Self {
        Self { id, role: Role::Enterprise }
    }

    /// The caller's worker id, or PermissionDenied for enterprise tokens.
    pub fn worker_id(&self) -> Result<i64, ServiceError> {
        match self.role {
            Role::Worker => Ok(self.id),
            Role::Enterprise => {
                Err(ServiceError::PermissionDenied("worker account required".into()))
            }
        }
    }

    /// The caller's enterprise id, or PermissionDenied for worker tokens.
    pub fn enterprise_id(&self) -> Result<i64, ServiceError> {
        match self.role {
            Role::Enterprise => Ok(self.id),
            Role::Worker => {
                Err(ServiceError::PermissionDenied("enterprise account required".into()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker & Enterprise
// ---------------------------------------------------------------------------

/// A worker account. The password hash is persisted alongside but never
/// carried on this struct, so API responses cannot leak it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub user_id: i64,
    pub username: String,
    pub phone: String,
    pub email: String,
    /// Accrued, not-yet-withdrawn rewards.
    pub balance: Decimal,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// An enterprise (task publisher) account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enterprise {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub registration_no: String,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// API request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /account/workers/register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWorkerRequest {
    pub username: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

/// Body for `POST /account/workers/login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginWorkerRequest {
    pub username: String,
    pub password: String,
}

/// Body for `POST /account/workers/forgot-password`.
///
/// `contact_type` selects the lookup field: "phone" or "email".
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub contact: String,
    pub contact_type: String,
    pub new_password: String,
}

/// Body for `PUT /account/workers/profile`. Absent fields are left as-is.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkerProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Body for `POST /account/enterprises/register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEnterpriseRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub registration_no: String,
}

/// Body for `POST /account/enterprises/login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEnterpriseRequest {
    pub email: String,
    pub password: String,
}

/// Body for `PUT /account/enterprises/profile`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnterpriseProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub registration_no: Option<String>,
}

/// Successful login payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
