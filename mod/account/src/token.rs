use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use workbridge_core::ServiceError;

use crate::model::{Role, Subject};

/// Signing configuration for bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC signing secret.
    pub secret: String,
    /// Token lifetime in seconds (default: 24h).
    pub ttl_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "workbridge-dev-secret-change-me".to_string(),
            ttl_secs: 86400,
        }
    }
}

/// JWT claims payload. `sub` carries the account id, `role` which side
/// of the marketplace the token belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies bearer tokens for workers and enterprises.
pub struct TokenService {
    config: TokenConfig,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.config.ttl_secs
    }

    /// Sign a token for the given subject.
    pub fn issue(&self, subject: Subject) -> Result<String, ServiceError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: subject.id.to_string(),
            role: subject.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(self.config.ttl_secs)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(format!("JWT encode failed: {e}")))
    }

    /// Verify a token and resolve the subject it was issued for.
    pub fn verify(&self, token: &str) -> Result<Subject, ServiceError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;

        let claims = token_data.claims;
        let id: i64 = claims
            .sub
            .parse()
            .map_err(|_| ServiceError::Unauthorized("invalid token subject".into()))?;
        let role = Role::from_str(&claims.role)
            .ok_or_else(|| ServiceError::Unauthorized("invalid token role".into()))?;

        Ok(Subject { id, role })
    }
}
