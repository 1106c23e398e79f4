//! Session auth: argon2 credentials, opaque bearer tokens, and the single
//! role gate every protected handler goes through.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::db::{Account, LoginRequest, LoginResponse, Principal, Role, Session, Student};
use crate::AppState;

use super::error::ApiError;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison against the configured admin token
pub fn is_admin_token(config: &crate::config::Config, token: &str) -> bool {
    let admin = config.auth.admin_token.as_bytes();
    let provided = token.as_bytes();
    admin.len() == provided.len() && bool::from(admin.ct_eq(provided))
}

/// Central capability check: admin passes everything, otherwise the
/// caller's role must be in the allowed set.
pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), ApiError> {
    if principal.role == Role::Admin || allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "This action is not available to the {} role",
            principal.role
        )))
    }
}

/// Login endpoint shared by staff-side accounts and students
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid credentials");

    let account: Option<Account> = sqlx::query_as("SELECT * FROM accounts WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let principal = if let Some(account) = account {
        if !verify_password(&request.password, &account.password_hash) {
            return Err(invalid());
        }
        let role: Role = account.role.parse().map_err(|_| invalid())?;
        Principal {
            id: account.id,
            name: account.name,
            email: account.email,
            role,
        }
    } else {
        let student: Option<Student> = sqlx::query_as("SELECT * FROM students WHERE email = ?")
            .bind(&request.email)
            .fetch_optional(&state.db)
            .await?;
        let student = student.ok_or_else(invalid)?;
        if !verify_password(&request.password, &student.password_hash) {
            return Err(invalid());
        }
        Principal {
            id: student.id,
            name: student.name,
            email: student.email,
            role: Role::Student,
        }
    };

    let token = generate_token();
    let expires_at = chrono::Utc::now() + chrono::Duration::days(state.config.auth.session_days);

    sqlx::query(
        "INSERT INTO sessions (id, principal_id, role, token_hash, expires_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&principal.id)
    .bind(principal.role.to_string())
    .bind(hash_token(&token))
    .bind(expires_at.to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(Json(LoginResponse { token, principal }))
}

/// Who-am-I endpoint for UI session restore
pub async fn me(principal: Principal) -> Json<Principal> {
    Json(principal)
}

/// Extract the bearer token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    headers
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Resolve a token into the calling principal
pub async fn get_current_principal(
    state: &AppState,
    token: &str,
) -> Result<Principal, ApiError> {
    if is_admin_token(&state.config, token) {
        // Synthetic principal for shared-token access
        return Ok(Principal {
            id: "system".to_string(),
            name: "System Admin".to_string(),
            email: state.config.auth.admin_email.clone(),
            role: Role::Admin,
        });
    }

    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(hash_token(token))
    .fetch_optional(&state.db)
    .await?;
    let session = session.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    let role: Role = session
        .role
        .parse()
        .map_err(|_| ApiError::unauthorized("Invalid session role"))?;

    if role == Role::Student {
        let student: Option<Student> = sqlx::query_as("SELECT * FROM students WHERE id = ?")
            .bind(&session.principal_id)
            .fetch_optional(&state.db)
            .await?;
        let student = student.ok_or_else(|| ApiError::unauthorized("Unknown principal"))?;
        Ok(Principal {
            id: student.id,
            name: student.name,
            email: student.email,
            role,
        })
    } else {
        let account: Option<Account> = sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
            .bind(&session.principal_id)
            .fetch_optional(&state.db)
            .await?;
        let account = account.ok_or_else(|| ApiError::unauthorized("Unknown principal"))?;
        Ok(Principal {
            id: account.id,
            name: account.name,
            email: account.email,
            role,
        })
    }
}

/// Auth middleware for the protected route tree; role checks happen in
/// the handlers through `require_role`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    get_current_principal(&state, &token).await?;
    Ok(next.run(request).await)
}

/// Extractor for the current authenticated principal
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        get_current_principal(state, &token).await
    }
}

/// Create the seeded manager account on first start
pub async fn ensure_admin_account(
    pool: &crate::db::DbPool,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    sqlx::query(
        "INSERT INTO accounts (id, name, email, role, password_hash)
         VALUES (?, 'Administrator', ?, 'manager', ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(email)
    .bind(&password_hash)
    .execute(pool)
    .await?;

    tracing::info!("Created initial manager account: {}", email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;

    fn principal(role: Role) -> Principal {
        Principal {
            id: "p-1".to_string(),
            name: "P".to_string(),
            email: "p@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn require_role_allows_listed_and_admin() {
        assert!(require_role(&principal(Role::Staff), &[Role::Staff, Role::Manager]).is_ok());
        assert!(require_role(&principal(Role::Admin), &[Role::Teacher]).is_ok());
        assert!(require_role(&principal(Role::Cashier), &[Role::Staff]).is_err());
    }
}
