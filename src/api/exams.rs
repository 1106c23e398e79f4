//! Placement exams and the configurable level thresholds.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreateExamRequest, CreateThresholdRequest, Exam, LevelThreshold, Principal, Role,
    UpdateThresholdRequest,
};
use crate::workflow::placement;
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::validation::validate_score;

const SCHOOL_ROLES: &[Role] = &[Role::Staff, Role::Manager, Role::Teacher];

/// Record a placement exam for a student, deriving the level from the
/// configured thresholds. Exams are immutable once created.
pub async fn create_exam(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
    principal: Principal,
    Json(request): Json<CreateExamRequest>,
) -> Result<Json<Exam>, ApiError> {
    require_role(&principal, &[Role::Staff, Role::Manager, Role::Teacher])?;
    validate_score(request.score).map_err(ApiError::bad_request)?;

    let student_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM students WHERE id = ?")
        .bind(&student_id)
        .fetch_optional(&state.db)
        .await?;
    if student_exists.is_none() {
        return Err(ApiError::not_found("Student not found"));
    }

    let level = placement::placement_level(&state.db, request.score).await?;

    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO exams (id, student_id, score, level, note) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(&student_id)
        .bind(request.score)
        .bind(&level)
        .bind(&request.note)
        .execute(&state.db)
        .await?;

    let exam: Exam = sqlx::query_as("SELECT * FROM exams WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(exam))
}

pub async fn list_student_exams(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
    principal: Principal,
) -> Result<Json<Vec<Exam>>, ApiError> {
    if !(principal.role == Role::Student && principal.id == student_id) {
        require_role(&principal, SCHOOL_ROLES)?;
    }

    let exams: Vec<Exam> =
        sqlx::query_as("SELECT * FROM exams WHERE student_id = ? ORDER BY created_at DESC")
            .bind(&student_id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(exams))
}

// ---------------------------------------------------------------------------
// Level thresholds
// ---------------------------------------------------------------------------

fn validate_band(min_score: i64, max_score: i64) -> Result<(), ApiError> {
    if !(0..=100).contains(&min_score) || !(0..=100).contains(&max_score) {
        return Err(ApiError::bad_request(
            "Threshold bounds must be between 0 and 100",
        ));
    }
    if min_score > max_score {
        return Err(ApiError::bad_request(
            "min_score cannot be greater than max_score",
        ));
    }
    Ok(())
}

pub async fn list_thresholds(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<LevelThreshold>>, ApiError> {
    require_role(&principal, SCHOOL_ROLES)?;

    let thresholds: Vec<LevelThreshold> =
        sqlx::query_as("SELECT * FROM level_thresholds ORDER BY min_score ASC, max_score ASC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(thresholds))
}

pub async fn create_threshold(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(request): Json<CreateThresholdRequest>,
) -> Result<Json<LevelThreshold>, ApiError> {
    require_role(&principal, &[Role::Manager])?;
    validate_band(request.min_score, request.max_score)?;
    if request.level.trim().is_empty() {
        return Err(ApiError::bad_request("Level label is required"));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO level_thresholds (id, level, min_score, max_score) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.level)
    .bind(request.min_score)
    .bind(request.max_score)
    .execute(&state.db)
    .await?;

    let threshold: LevelThreshold = sqlx::query_as("SELECT * FROM level_thresholds WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(threshold))
}

pub async fn update_threshold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<UpdateThresholdRequest>,
) -> Result<Json<LevelThreshold>, ApiError> {
    require_role(&principal, &[Role::Manager])?;

    let mut threshold: LevelThreshold =
        sqlx::query_as("SELECT * FROM level_thresholds WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Threshold not found"))?;

    if let Some(level) = request.level {
        if level.trim().is_empty() {
            return Err(ApiError::bad_request("Level label is required"));
        }
        threshold.level = level;
    }
    if let Some(min_score) = request.min_score {
        threshold.min_score = min_score;
    }
    if let Some(max_score) = request.max_score {
        threshold.max_score = max_score;
    }
    validate_band(threshold.min_score, threshold.max_score)?;

    sqlx::query("UPDATE level_thresholds SET level = ?, min_score = ?, max_score = ? WHERE id = ?")
        .bind(&threshold.level)
        .bind(threshold.min_score)
        .bind(threshold.max_score)
        .bind(&id)
        .execute(&state.db)
        .await?;

    Ok(Json(threshold))
}

pub async fn delete_threshold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&principal, &[Role::Manager])?;

    let deleted = sqlx::query("DELETE FROM level_thresholds WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Threshold not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
