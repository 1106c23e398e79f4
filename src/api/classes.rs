//! Class registry plus the enrollment and attendance endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    AttendanceRequest, Class, ClassWithEnrollment, CreateClassRequest, EnrollRequest,
    EnrollmentResponse, Principal, Role, RosterEntry, UpdateClassRequest,
};
use crate::utils::now_rfc3339;
use crate::workflow::enrollment;
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::validation::{validate_capacity, validate_name, validate_price, validate_session_count};

const SCHOOL_ROLES: &[Role] = &[Role::Staff, Role::Manager, Role::Teacher];
const MANAGE_ROLES: &[Role] = &[Role::Staff, Role::Manager];

/// Name must be unique among active classes; inactive classes may shadow.
async fn check_name_available(
    db: &crate::db::DbPool,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<(), ApiError> {
    let clash: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM classes WHERE name = ? AND active = 1 AND id != ?",
    )
    .bind(name)
    .bind(exclude_id.unwrap_or(""))
    .fetch_one(db)
    .await?;
    if clash.0 > 0 {
        return Err(ApiError::conflict("An active class with this name already exists"));
    }
    Ok(())
}

async fn check_teacher(db: &crate::db::DbPool, teacher_id: &str) -> Result<(), ApiError> {
    let teacher: Option<(String,)> =
        sqlx::query_as("SELECT id FROM accounts WHERE id = ? AND role = 'teacher'")
            .bind(teacher_id)
            .fetch_optional(db)
            .await?;
    if teacher.is_none() {
        return Err(ApiError::bad_request("Unknown teacher"));
    }
    Ok(())
}

pub async fn list_classes(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<ClassWithEnrollment>>, ApiError> {
    require_role(&principal, SCHOOL_ROLES)?;

    let classes: Vec<ClassWithEnrollment> = sqlx::query_as(
        "SELECT c.*,
                (SELECT COUNT(*) FROM enrollments e WHERE e.class_id = c.id) AS enrolled
         FROM classes c
         ORDER BY c.created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(classes))
}

pub async fn create_class(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(request): Json<CreateClassRequest>,
) -> Result<Json<Class>, ApiError> {
    require_role(&principal, MANAGE_ROLES)?;

    validate_name(&request.name).map_err(ApiError::bad_request)?;
    validate_capacity(request.capacity).map_err(ApiError::bad_request)?;
    validate_session_count(request.total_sessions).map_err(ApiError::bad_request)?;
    validate_price(&request.price).map_err(ApiError::bad_request)?;
    check_name_available(&state.db, &request.name, None).await?;
    if let Some(ref teacher_id) = request.teacher_id {
        check_teacher(&state.db, teacher_id).await?;
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO classes (id, name, level, capacity, teacher_id, price, total_sessions)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.level)
    .bind(request.capacity)
    .bind(&request.teacher_id)
    .bind(request.price)
    .bind(request.total_sessions)
    .execute(&state.db)
    .await?;

    let class: Class = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(class))
}

pub async fn get_class(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<Class>, ApiError> {
    require_role(&principal, SCHOOL_ROLES)?;

    let class: Class = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Class not found"))?;
    Ok(Json(class))
}

pub async fn update_class(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<UpdateClassRequest>,
) -> Result<Json<Class>, ApiError> {
    require_role(&principal, MANAGE_ROLES)?;

    let mut class: Class = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Class not found"))?;

    if let Some(name) = request.name {
        validate_name(&name).map_err(ApiError::bad_request)?;
        check_name_available(&state.db, &name, Some(&id)).await?;
        class.name = name;
    }
    if let Some(level) = request.level {
        class.level = level;
    }
    if let Some(capacity) = request.capacity {
        validate_capacity(capacity).map_err(ApiError::bad_request)?;
        class.capacity = capacity;
    }
    if let Some(ref teacher_id) = request.teacher_id {
        check_teacher(&state.db, teacher_id).await?;
        class.teacher_id = request.teacher_id.clone();
    }
    if request.price.is_some() {
        validate_price(&request.price).map_err(ApiError::bad_request)?;
        class.price = request.price;
    }
    if let Some(total_sessions) = request.total_sessions {
        validate_session_count(total_sessions).map_err(ApiError::bad_request)?;
        class.total_sessions = total_sessions;
    }
    if let Some(active) = request.active {
        class.active = active;
    }

    sqlx::query(
        "UPDATE classes SET name = ?, level = ?, capacity = ?, teacher_id = ?, price = ?,
                 total_sessions = ?, active = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&class.name)
    .bind(&class.level)
    .bind(class.capacity)
    .bind(&class.teacher_id)
    .bind(class.price)
    .bind(class.total_sessions)
    .bind(class.active)
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    let updated: Class = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(updated))
}

/// Delete a class. Rejected while any student is enrolled.
pub async fn delete_class(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&principal, MANAGE_ROLES)?;

    let enrolled: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM enrollments WHERE class_id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    if enrolled.0 > 0 {
        return Err(ApiError::conflict(
            "Cannot delete a class with enrolled students",
        ));
    }

    let deleted = sqlx::query("DELETE FROM classes WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Class not found"));
    }

    tracing::info!(class_id = %id, "Deleted class");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn get_roster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<Vec<RosterEntry>>, ApiError> {
    require_role(&principal, SCHOOL_ROLES)?;

    let roster: Vec<RosterEntry> = sqlx::query_as(
        "SELECT e.student_id, s.name AS student_name, s.email AS student_email,
                e.attendance, e.sessions_registered
         FROM enrollments e
         INNER JOIN students s ON s.id = e.student_id
         WHERE e.class_id = ?
         ORDER BY s.name ASC",
    )
    .bind(&id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(roster))
}

/// Enroll a student. Creates the unpaid payment for priced classes in the
/// same transaction.
pub async fn enroll_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<EnrollRequest>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    require_role(&principal, MANAGE_ROLES)?;

    let enrollment = enrollment::add_student(
        &state.db,
        state.config.assignment.strategy,
        &id,
        &request.student_id,
    )
    .await?;

    tracing::info!(class_id = %id, student_id = %request.student_id, "Enrolled student");
    Ok(Json(enrollment.into()))
}

pub async fn unenroll_student(
    State(state): State<Arc<AppState>>,
    Path((id, student_id)): Path<(String, String)>,
    principal: Principal,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&principal, MANAGE_ROLES)?;

    enrollment::remove_student(&state.db, &id, &student_id).await?;

    tracing::info!(class_id = %id, student_id = %student_id, "Removed student from class");
    Ok(Json(serde_json::json!({ "removed": true })))
}

/// Mark one attendance for a student. Always increments; passing the
/// registered session count only raises the advisory flag.
pub async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<AttendanceRequest>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    require_role(&principal, SCHOOL_ROLES)?;

    let enrollment = enrollment::mark_attendance(&state.db, &id, &request.student_id).await?;
    Ok(Json(enrollment.into()))
}
