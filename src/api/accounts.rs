//! Staff, teacher, manager and cashier account management. The four
//! resource families share one handler set parameterized by role; the
//! router mounts it once per kind.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    Account, AccountResponse, CreateAccountRequest, Principal, Role, UpdateAccountRequest,
};
use crate::utils::now_rfc3339;
use crate::AppState;

use super::auth::{hash_password, require_role};
use super::error::ApiError;
use super::validation::{validate_email, validate_name, validate_password, validate_phone};

const READ_ROLES: &[Role] = &[Role::Staff, Role::Manager];

/// Routes for one account kind (`/staff`, `/teachers`, ...)
pub fn role_router(kind: Role) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(move |state: State<Arc<AppState>>, principal: Principal| {
                list_accounts(state, principal, kind)
            })
            .post(
                move |state: State<Arc<AppState>>,
                      principal: Principal,
                      json: Json<CreateAccountRequest>| {
                    create_account(state, principal, kind, json)
                },
            ),
        )
        .route(
            "/:id",
            get(
                move |state: State<Arc<AppState>>, path: Path<String>, principal: Principal| {
                    get_account(state, path, principal, kind)
                },
            )
            .put(
                move |state: State<Arc<AppState>>,
                      path: Path<String>,
                      principal: Principal,
                      json: Json<UpdateAccountRequest>| {
                    update_account(state, path, principal, kind, json)
                },
            )
            .delete(
                move |state: State<Arc<AppState>>, path: Path<String>, principal: Principal| {
                    delete_account(state, path, principal, kind)
                },
            ),
        )
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    kind: Role,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    require_role(&principal, READ_ROLES)?;

    let accounts: Vec<Account> =
        sqlx::query_as("SELECT * FROM accounts WHERE role = ? ORDER BY created_at DESC")
            .bind(kind.to_string())
            .fetch_all(&state.db)
            .await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    kind: Role,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    require_role(&principal, &[Role::Manager])?;

    validate_name(&request.name).map_err(ApiError::bad_request)?;
    validate_email(&request.email).map_err(ApiError::bad_request)?;
    validate_phone(&request.phone).map_err(ApiError::bad_request)?;
    validate_password(&request.password).map_err(ApiError::bad_request)?;

    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query(
        "INSERT INTO accounts (id, name, email, phone, role, password_hash)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(kind.to_string())
    .bind(&password_hash)
    .execute(&state.db)
    .await?;

    let account: Account = sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(account_id = %id, role = %kind, "Created account");
    Ok(Json(account.into()))
}

async fn fetch_account(
    db: &crate::db::DbPool,
    id: &str,
    kind: Role,
) -> Result<Account, ApiError> {
    let account: Option<Account> =
        sqlx::query_as("SELECT * FROM accounts WHERE id = ? AND role = ?")
            .bind(id)
            .bind(kind.to_string())
            .fetch_optional(db)
            .await?;
    account.ok_or_else(|| ApiError::not_found("Account not found"))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    kind: Role,
) -> Result<Json<AccountResponse>, ApiError> {
    // Accounts may read their own record
    if principal.id != id {
        require_role(&principal, READ_ROLES)?;
    }

    let account = fetch_account(&state.db, &id, kind).await?;
    Ok(Json(account.into()))
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    kind: Role,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    if principal.id != id {
        require_role(&principal, &[Role::Manager])?;
    }

    let mut account = fetch_account(&state.db, &id, kind).await?;

    if let Some(name) = request.name {
        validate_name(&name).map_err(ApiError::bad_request)?;
        account.name = name;
    }
    if let Some(email) = request.email {
        validate_email(&email).map_err(ApiError::bad_request)?;
        account.email = email;
    }
    if request.phone.is_some() {
        validate_phone(&request.phone).map_err(ApiError::bad_request)?;
        account.phone = request.phone;
    }
    if let Some(password) = request.password {
        validate_password(&password).map_err(ApiError::bad_request)?;
        account.password_hash = hash_password(&password)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    }

    sqlx::query(
        "UPDATE accounts SET name = ?, email = ?, phone = ?, password_hash = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&account.name)
    .bind(&account.email)
    .bind(&account.phone)
    .bind(&account.password_hash)
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    let updated = fetch_account(&state.db, &id, kind).await?;
    Ok(Json(updated.into()))
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    kind: Role,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&principal, &[Role::Manager])?;

    // Confirm the id belongs to this kind before deleting
    fetch_account(&state.db, &id, kind).await?;

    sqlx::query("DELETE FROM sessions WHERE principal_id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    tracing::info!(account_id = %id, role = %kind, "Deleted account");
    Ok(Json(serde_json::json!({ "deleted": true })))
}
