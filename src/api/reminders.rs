//! Staff follow-up reminders against students.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateReminderRequest, Principal, Reminder, Role};
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ReminderListQuery {
    pub student_id: Option<String>,
}

pub async fn list_reminders(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ReminderListQuery>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    require_role(&principal, &[Role::Staff, Role::Manager])?;

    let reminders: Vec<Reminder> = match query.student_id {
        Some(student_id) => {
            sqlx::query_as(
                "SELECT * FROM reminders WHERE student_id = ? ORDER BY created_at DESC",
            )
            .bind(&student_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM reminders ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };
    Ok(Json(reminders))
}

pub async fn create_reminder(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(request): Json<CreateReminderRequest>,
) -> Result<Json<Reminder>, ApiError> {
    require_role(&principal, &[Role::Staff, Role::Manager])?;

    if request.kind.trim().is_empty() {
        return Err(ApiError::bad_request("Reminder kind is required"));
    }
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("Reminder content is required"));
    }

    // Reminders belong to a real staff account; the synthetic admin
    // principal has none to attach to.
    let staff: Option<(String,)> = sqlx::query_as("SELECT id FROM accounts WHERE id = ?")
        .bind(&principal.id)
        .fetch_optional(&state.db)
        .await?;
    if staff.is_none() {
        return Err(ApiError::bad_request(
            "Reminders must be created from a staff account",
        ));
    }

    let student: Option<(String,)> = sqlx::query_as("SELECT id FROM students WHERE id = ?")
        .bind(&request.student_id)
        .fetch_optional(&state.db)
        .await?;
    if student.is_none() {
        return Err(ApiError::not_found("Student not found"));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO reminders (id, staff_id, student_id, kind, platform, content)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&principal.id)
    .bind(&request.student_id)
    .bind(&request.kind)
    .bind(&request.platform)
    .bind(&request.content)
    .execute(&state.db)
    .await?;

    let reminder: Reminder = sqlx::query_as("SELECT * FROM reminders WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(reminder))
}

pub async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&principal, &[Role::Staff, Role::Manager])?;

    let deleted = sqlx::query("DELETE FROM reminders WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Reminder not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
