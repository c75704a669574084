//! Authentication and authorization utilities
//!
//! Provides:
//! - API key validation
//! - JWT token generation and validation
//! - Principal extraction (authenticated user + school)

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Role of an authenticated user within a school
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Reviewer,
    Admin,
}

impl Role {
    /// Whether this role may resolve audit records
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Reviewer | Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "teacher" => Ok(Role::Teacher),
            "reviewer" => Ok(Role::Reviewer),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::InvalidFormat {
                message: format!("Unknown role: {}", other),
            }),
        }
    }
}

/// Authenticated principal available to every core operation.
///
/// Core services never read ambient request state; the gateway extracts
/// this once and passes it explicitly.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// School (tenant) the user belongs to
    pub school_id: Uuid,

    /// Role within the school
    pub role: Role,

    /// Request ID for tracing
    pub request_id: String,
}

impl Principal {
    /// Require review permission, returning error if not present
    pub fn require_reviewer(&self) -> Result<()> {
        if self.role.can_review() {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Review permission required".to_string(),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// School ID
    pub school_id: String,

    /// Role within the school
    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, school_id: Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            school_id: school_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidApiKey,
            })
    }
}

/// Hash a school API key for storage
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate an API key against a stored hash
pub fn validate_api_key(api_key: &str, stored_hash: &str) -> bool {
    hash_api_key(api_key) == stored_hash
}

/// Generate a new school API key
pub fn generate_api_key() -> String {
    let random_bytes: [u8; 32] = rand::random();
    format!("sk_{}", hex::encode(random_bytes))
}

/// Extract bearer token from Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Axum extractor for Principal
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        // Extract request ID
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Extract bearer token
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must be a Bearer token".to_string(),
        })?;

        // The signing secret is shared process-wide via env; handlers that
        // need claims beyond user/school re-validate against AppState.
        let secret = std::env::var("APP__AUTH__JWT_SECRET").map_err(|_| AppError::Configuration {
            message: "JWT secret not configured".to_string(),
        })?;

        let manager = JwtManager::new(&secret, 3600);
        let claims = manager.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Invalid subject claim".to_string(),
        })?;

        let school_id = Uuid::parse_str(&claims.school_id).map_err(|_| AppError::Unauthorized {
            message: "Invalid school claim".to_string(),
        })?;

        Ok(Principal {
            user_id,
            school_id,
            role: claims.role,
            request_id,
        })
    }
}

/// Middleware asserting the Authorization header is present
pub async fn auth_middleware(
    request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    if auth_header.is_none() {
        return Err(AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_api_key() {
        let key = "sk_test_12345";
        let hash = hash_api_key(key);
        assert!(validate_api_key(key, &hash));
        assert!(!validate_api_key("wrong_key", &hash));
    }

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert!(key.starts_with("sk_"));
        assert!(key.len() > 10);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("abc"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Reviewer.can_review());
        assert!(Role::Admin.can_review());
        assert!(!Role::Teacher.can_review());
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let user_id = Uuid::new_v4();
        let school_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, school_id, Role::Reviewer)
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.school_id, school_id.to_string());
        assert_eq!(claims.role, Role::Reviewer);
    }
}
