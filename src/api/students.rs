//! Student directory endpoints. Students are never hard-deleted; there is
//! deliberately no delete route.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreateStudentRequest, EnrollmentWithClass, Principal, Role, Student, StudentDetail,
    StudentResponse, UpdateStudentRequest,
};
use crate::utils::now_rfc3339;
use crate::AppState;

use super::auth::{hash_password, require_role};
use super::error::ApiError;
use super::validation::{validate_email, validate_name, validate_password, validate_phone};

const DIRECTORY_ROLES: &[Role] = &[Role::Staff, Role::Manager, Role::Teacher];

#[derive(Debug, Deserialize)]
pub struct StudentListQuery {
    /// Substring match on name or email
    pub q: Option<String>,
}

pub async fn list_students(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<StudentListQuery>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    require_role(&principal, DIRECTORY_ROLES)?;

    let students: Vec<Student> = match query.q {
        Some(q) if !q.is_empty() => {
            let pattern = format!("%{}%", q);
            sqlx::query_as(
                "SELECT * FROM students WHERE name LIKE ? OR email LIKE ?
                 ORDER BY created_at DESC",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&state.db)
            .await?
        }
        _ => {
            sqlx::query_as("SELECT * FROM students ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(students.into_iter().map(Into::into).collect()))
}

pub async fn create_student(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(request): Json<CreateStudentRequest>,
) -> Result<Json<StudentResponse>, ApiError> {
    require_role(&principal, &[Role::Staff, Role::Manager])?;

    validate_name(&request.name).map_err(ApiError::bad_request)?;
    validate_email(&request.email).map_err(ApiError::bad_request)?;
    validate_phone(&request.phone).map_err(ApiError::bad_request)?;
    validate_password(&request.password).map_err(ApiError::bad_request)?;

    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query(
        "INSERT INTO students (id, name, email, phone, school, note, password_hash)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(&request.school)
    .bind(&request.note)
    .bind(&password_hash)
    .execute(&state.db)
    .await?;

    let student: Student = sqlx::query_as("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(student_id = %id, "Registered student");
    Ok(Json(student.into()))
}

pub async fn get_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<StudentDetail>, ApiError> {
    // Students may read their own record; everyone else needs a school role
    if !(principal.role == Role::Student && principal.id == id) {
        require_role(&principal, DIRECTORY_ROLES)?;
    }

    let student: Student = sqlx::query_as("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    let enrollments: Vec<EnrollmentWithClass> = sqlx::query_as(
        "SELECT e.class_id, c.name AS class_name, c.level,
                e.attendance, e.sessions_registered
         FROM enrollments e
         INNER JOIN classes c ON c.id = e.class_id
         WHERE e.student_id = ?
         ORDER BY e.created_at ASC",
    )
    .bind(&id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(StudentDetail {
        student: student.into(),
        enrollments,
    }))
}

pub async fn update_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<UpdateStudentRequest>,
) -> Result<Json<StudentResponse>, ApiError> {
    if !(principal.role == Role::Student && principal.id == id) {
        require_role(&principal, &[Role::Staff, Role::Manager])?;
    }

    let mut student: Student = sqlx::query_as("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    if let Some(name) = request.name {
        validate_name(&name).map_err(ApiError::bad_request)?;
        student.name = name;
    }
    if let Some(email) = request.email {
        validate_email(&email).map_err(ApiError::bad_request)?;
        student.email = email;
    }
    if request.phone.is_some() {
        validate_phone(&request.phone).map_err(ApiError::bad_request)?;
        student.phone = request.phone;
    }
    if request.school.is_some() {
        student.school = request.school;
    }
    if request.note.is_some() {
        student.note = request.note;
    }
    if let Some(password) = request.password {
        validate_password(&password).map_err(ApiError::bad_request)?;
        student.password_hash = hash_password(&password)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    }

    sqlx::query(
        "UPDATE students SET name = ?, email = ?, phone = ?, school = ?, note = ?,
                 password_hash = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&student.name)
    .bind(&student.email)
    .bind(&student.phone)
    .bind(&student.school)
    .bind(&student.note)
    .bind(&student.password_hash)
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    let updated: Student = sqlx::query_as("SELECT * FROM students WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(updated.into()))
}
