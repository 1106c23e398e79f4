//! Payment ledger endpoints. Payments come into existence through
//! enrollment (see `workflow::enrollment`); these routes read and update
//! them.

use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::Connection;
use std::sync::Arc;

use crate::db::{ClassEarnings, Payment, PaymentWithStudent, Principal, Role, UpdatePaymentRequest};
use crate::utils::now_rfc3339;
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::validation::{validate_discount_percent, validate_session_count};

const LEDGER_ROLES: &[Role] = &[Role::Cashier, Role::Staff, Role::Manager];

/// Per-class earnings view: every payment with its student, plus totals.
pub async fn class_earnings(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
    principal: Principal,
) -> Result<Json<ClassEarnings>, ApiError> {
    require_role(&principal, LEDGER_ROLES)?;

    let class_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM classes WHERE id = ?")
        .bind(&class_id)
        .fetch_optional(&state.db)
        .await?;
    if class_exists.is_none() {
        return Err(ApiError::not_found("Class not found"));
    }

    let payments: Vec<PaymentWithStudent> = sqlx::query_as(
        "SELECT p.id, p.student_id, s.name AS student_name, p.amount, p.method, p.paid,
                p.discount_percent, p.discount_reason, p.staff_id, p.created_at, p.updated_at
         FROM payments p
         INNER JOIN students s ON s.id = p.student_id
         WHERE p.class_id = ?
         ORDER BY s.name ASC",
    )
    .bind(&class_id)
    .fetch_all(&state.db)
    .await?;

    let total_amount = payments.iter().map(|p| p.amount).sum();
    let total_collected = payments.iter().filter(|p| p.paid).map(|p| p.amount).sum();

    Ok(Json(ClassEarnings {
        class_id,
        total_amount,
        total_collected,
        payments,
    }))
}

pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<Payment>, ApiError> {
    require_role(&principal, LEDGER_ROLES)?;

    let payment: Payment = sqlx::query_as("SELECT * FROM payments WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;
    Ok(Json(payment))
}

/// Update a payment. A supplied discount percent recomputes the amount
/// from the class price; a supplied `new_session_count` rewrites the
/// matching enrollment's sessions-registered. Both land in the same
/// transaction as the payment row.
pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Payment>, ApiError> {
    require_role(&principal, LEDGER_ROLES)?;

    if let Some(percent) = request.discount_percent {
        validate_discount_percent(percent).map_err(ApiError::bad_request)?;
    }
    if let Some(sessions) = request.new_session_count {
        validate_session_count(sessions).map_err(ApiError::bad_request)?;
    }

    let mut conn = state.db.acquire().await.map_err(ApiError::from)?;
    let mut tx = conn.begin().await.map_err(ApiError::from)?;

    let mut payment: Payment = sqlx::query_as("SELECT * FROM payments WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;

    if request.method.is_some() {
        payment.method = request.method;
    }
    if let Some(paid) = request.paid {
        payment.paid = paid;
    }
    if let Some(percent) = request.discount_percent {
        payment.discount_percent = percent;
        let price: Option<(Option<i64>,)> = sqlx::query_as("SELECT price FROM classes WHERE id = ?")
            .bind(&payment.class_id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some((Some(price),)) = price {
            payment.amount = price * (100 - percent) / 100;
        }
    }
    if request.discount_reason.is_some() {
        payment.discount_reason = request.discount_reason;
    }

    sqlx::query(
        "UPDATE payments SET method = ?, paid = ?, discount_percent = ?, discount_reason = ?,
                 amount = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&payment.method)
    .bind(payment.paid)
    .bind(payment.discount_percent)
    .bind(&payment.discount_reason)
    .bind(payment.amount)
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&mut *tx)
    .await?;

    if let Some(sessions) = request.new_session_count {
        let updated = sqlx::query(
            "UPDATE enrollments SET sessions_registered = ?
             WHERE student_id = ? AND class_id = ?",
        )
        .bind(sessions)
        .bind(&payment.student_id)
        .bind(&payment.class_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ApiError::conflict(
                "No enrollment exists for this payment's student and class",
            ));
        }
    }

    let payment: Payment = sqlx::query_as("SELECT * FROM payments WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await.map_err(ApiError::from)?;
    Ok(Json(payment))
}
