//! JWT authentication module.
//!
//! Handles password hashing, token issuing and the [`AuthUser`] extractor
//! that turns a bearer token into a [`TenantScope`].
//!
//! ## Request Flow
//! ```text
//! Authorization: Bearer <jwt>          X-Branch-Id: <branch> (optional)
//!        │                                     │
//!        ▼                                     ▼
//!  JwtManager::validate_access_token    admin only, branch must belong
//!        │                              to the token's company
//!        └──────────────┬──────────────────────┘
//!                       ▼
//!        AuthUser { user_id, role, scope }
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;
use tambo_core::{Role, TenantScope, User};

/// Header an admin sends to act on another branch of the company.
pub const BRANCH_HEADER: &str = "x-branch-id";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub company_id: String,

    /// Branch the user logged into
    pub branch_id: String,

    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, access_lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            company_id: user.company_id.clone(),
            branch_id: user.branch_id.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against its stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
    pub scope: TenantScope,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("administrators only".to_string()))
        }
    }

    /// Payroll and manual journal entries.
    pub fn require_books(&self) -> Result<(), ApiError> {
        if self.role.can_manage_books() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("administrators or accountants only".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".to_string()))?;
        let claims = state.jwt.validate_access_token(token)?;

        let requested_branch = parts
            .headers
            .get(BRANCH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let branch_id = match requested_branch {
            Some(branch) if branch != claims.branch_id => {
                if claims.role != Role::Admin {
                    return Err(ApiError::Forbidden("only administrators switch branches".to_string()));
                }
                if !state.db.companies().branch_belongs(&claims.company_id, &branch).await? {
                    warn!(user_id = %claims.sub, branch_id = %branch, "Foreign branch requested");
                    return Err(ApiError::NotFound(format!("Branch not found: {}", branch)));
                }
                branch
            }
            _ => claims.branch_id,
        };

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
            scope: TenantScope::new(claims.company_id, branch_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: "user-001".to_string(),
            company_id: "company-001".to_string(),
            branch_id: "branch-001".to_string(),
            username: "caja1".to_string(),
            full_name: "Rosa Quispe".to_string(),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret-0123456789", 3600);

        let token = manager.generate_access_token(&user(Role::Cashier)).unwrap();
        let claims = manager.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, "user-001");
        assert_eq!(claims.company_id, "company-001");
        assert_eq!(claims.branch_id, "branch-001");
        assert_eq!(claims.role, Role::Cashier);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let issuer = JwtManager::new("test-secret-0123456789", 3600);
        let other = JwtManager::new("another-secret-987654", 3600);

        let token = issuer.generate_access_token(&user(Role::Admin)).unwrap();
        assert!(matches!(
            other.validate_access_token(&token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Beyond the default 60 s leeway
        let manager = JwtManager::new("test-secret-0123456789", -120);
        let token = manager.generate_access_token(&user(Role::Admin)).unwrap();
        assert!(manager.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("s3creta-larga").unwrap();
        assert!(verify_password("s3creta-larga", &hash));
        assert!(!verify_password("otra", &hash));
        assert!(!verify_password("s3creta-larga", "not-a-hash"));
    }

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_role_guards() {
        let scope = TenantScope::new("c", "b");
        let waiter = AuthUser {
            user_id: "u".to_string(),
            role: Role::Waiter,
            scope: scope.clone(),
        };
        let accountant = AuthUser {
            user_id: "u".to_string(),
            role: Role::Accountant,
            scope,
        };

        assert!(waiter.require_books().is_err());
        assert!(accountant.require_books().is_ok());
        assert!(accountant.require_admin().is_err());
    }
}
