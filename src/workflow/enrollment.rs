//! Enrollment add/remove with payment sync, plus attendance marking.
//!
//! Adding a student to a priced class creates its unpaid payment, and
//! removing the student deletes it, inside the same transaction as the
//! enrollment change so a partial failure cannot leave the ledger and the
//! enrollment link disagreeing.

use sqlx::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AssignmentStrategy;
use crate::db::{Class, DbPool, Enrollment};

use super::assign;

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("Class not found")]
    ClassNotFound,
    #[error("Student not found")]
    StudentNotFound,
    #[error("Class is already at capacity")]
    CapacityExceeded,
    #[error("Student is already enrolled in this class")]
    DuplicateEnrollment,
    #[error("Student is not enrolled in this class")]
    NotEnrolled,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Link a student to a class. Sessions-registered defaults to the class's
/// total session count; a priced class also gets an unpaid payment with
/// the amount copied from the class price and a staff member chosen by
/// the configured strategy.
pub async fn add_student(
    pool: &DbPool,
    strategy: AssignmentStrategy,
    class_id: &str,
    student_id: &str,
) -> Result<Enrollment, EnrollmentError> {
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    let class: Class = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(class_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EnrollmentError::ClassNotFound)?;

    let student_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;
    if student_exists.is_none() {
        return Err(EnrollmentError::StudentNotFound);
    }

    let duplicate: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM enrollments WHERE student_id = ? AND class_id = ?",
    )
    .bind(student_id)
    .bind(class_id)
    .fetch_one(&mut *tx)
    .await?;
    if duplicate.0 > 0 {
        return Err(EnrollmentError::DuplicateEnrollment);
    }

    let enrolled: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM enrollments WHERE class_id = ?")
        .bind(class_id)
        .fetch_one(&mut *tx)
        .await?;
    if enrolled.0 >= class.capacity {
        return Err(EnrollmentError::CapacityExceeded);
    }

    let enrollment_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO enrollments (id, student_id, class_id, attendance, sessions_registered)
         VALUES (?, ?, ?, 0, ?)",
    )
    .bind(&enrollment_id)
    .bind(student_id)
    .bind(class_id)
    .bind(class.total_sessions)
    .execute(&mut *tx)
    .await?;

    if let Some(price) = class.price {
        // One ledger entry per (student, class): replace any stale record
        // before inserting the fresh unpaid one.
        sqlx::query("DELETE FROM payments WHERE student_id = ? AND class_id = ?")
            .bind(student_id)
            .bind(class_id)
            .execute(&mut *tx)
            .await?;

        let staff_id = assign::pick_staff(&mut tx, strategy).await?;
        sqlx::query(
            "INSERT INTO payments (id, student_id, class_id, amount, paid, staff_id)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(student_id)
        .bind(class_id)
        .bind(price)
        .bind(staff_id)
        .execute(&mut *tx)
        .await?;
    }

    let enrollment: Enrollment = sqlx::query_as("SELECT * FROM enrollments WHERE id = ?")
        .bind(&enrollment_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(enrollment)
}

/// Unlink a student from a class, deleting exactly that pair's payment.
pub async fn remove_student(
    pool: &DbPool,
    class_id: &str,
    student_id: &str,
) -> Result<(), EnrollmentError> {
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    let deleted = sqlx::query("DELETE FROM enrollments WHERE student_id = ? AND class_id = ?")
        .bind(student_id)
        .bind(class_id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(EnrollmentError::NotEnrolled);
    }

    sqlx::query("DELETE FROM payments WHERE student_id = ? AND class_id = ?")
        .bind(student_id)
        .bind(class_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Record one attendance. Every call increments by exactly one; there is
/// no de-duplication by session or date, and crossing the registered
/// session count is advisory only.
pub async fn mark_attendance(
    pool: &DbPool,
    class_id: &str,
    student_id: &str,
) -> Result<Enrollment, EnrollmentError> {
    let updated = sqlx::query(
        "UPDATE enrollments SET attendance = attendance + 1
         WHERE student_id = ? AND class_id = ?",
    )
    .bind(student_id)
    .bind(class_id)
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(EnrollmentError::NotEnrolled);
    }

    let enrollment: Enrollment =
        sqlx::query_as("SELECT * FROM enrollments WHERE student_id = ? AND class_id = ?")
            .bind(student_id)
            .bind(class_id)
            .fetch_one(pool)
            .await?;
    Ok(enrollment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, Payment};
    use crate::workflow::testutil::{insert_account, insert_class, insert_student};

    async fn payment_for(pool: &DbPool, student_id: &str, class_id: &str) -> Option<Payment> {
        sqlx::query_as("SELECT * FROM payments WHERE student_id = ? AND class_id = ?")
            .bind(student_id)
            .bind(class_id)
            .fetch_optional(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_creates_enrollment_with_class_defaults() {
        let pool = test_pool().await;
        insert_student(&pool, "stu-1", "One").await;
        insert_class(&pool, "cls-1", 10, None, 24).await;

        let e = add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();
        assert_eq!(e.attendance, 0);
        assert_eq!(e.sessions_registered, 24);
        // Free class: no payment created
        assert!(payment_for(&pool, "stu-1", "cls-1").await.is_none());
    }

    #[tokio::test]
    async fn add_rejects_duplicate_enrollment() {
        let pool = test_pool().await;
        insert_student(&pool, "stu-1", "One").await;
        insert_class(&pool, "cls-1", 10, None, 24).await;

        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();
        let err = add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::DuplicateEnrollment));
    }

    #[tokio::test]
    async fn add_rejects_when_capacity_reached() {
        let pool = test_pool().await;
        insert_student(&pool, "stu-1", "One").await;
        insert_student(&pool, "stu-2", "Two").await;
        insert_class(&pool, "cls-1", 1, None, 24).await;

        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();
        let err = add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-2")
            .await
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::CapacityExceeded));

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM enrollments WHERE class_id = 'cls-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn priced_class_creates_unpaid_payment_with_assigned_staff() {
        let pool = test_pool().await;
        insert_account(&pool, "staff-a", "staff").await;
        insert_student(&pool, "stu-1", "One").await;
        insert_class(&pool, "cls-1", 10, Some(1_500_000), 24).await;

        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();

        let payment = payment_for(&pool, "stu-1", "cls-1").await.unwrap();
        assert_eq!(payment.amount, 1_500_000);
        assert!(!payment.paid);
        assert_eq!(payment.staff_id.as_deref(), Some("staff-a"));
    }

    #[tokio::test]
    async fn add_remove_add_keeps_single_payment() {
        let pool = test_pool().await;
        insert_student(&pool, "stu-1", "One").await;
        insert_class(&pool, "cls-1", 10, Some(500), 24).await;

        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();
        remove_student(&pool, "cls-1", "stu-1").await.unwrap();
        assert!(payment_for(&pool, "stu-1", "cls-1").await.is_none());

        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM payments WHERE student_id = 'stu-1' AND class_id = 'cls-1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn remove_deletes_only_that_pairs_payment() {
        let pool = test_pool().await;
        insert_student(&pool, "stu-1", "One").await;
        insert_class(&pool, "cls-1", 10, Some(500), 24).await;
        insert_class(&pool, "cls-2", 10, Some(700), 24).await;

        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();
        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-2", "stu-1")
            .await
            .unwrap();

        remove_student(&pool, "cls-1", "stu-1").await.unwrap();
        assert!(payment_for(&pool, "stu-1", "cls-1").await.is_none());
        assert!(payment_for(&pool, "stu-1", "cls-2").await.is_some());
    }

    #[tokio::test]
    async fn attendance_increments_and_limit_is_advisory() {
        let pool = test_pool().await;
        insert_student(&pool, "stu-1", "One").await;
        insert_class(&pool, "cls-1", 10, None, 3).await;
        add_student(&pool, AssignmentStrategy::FirstAvailable, "cls-1", "stu-1")
            .await
            .unwrap();

        for expected in 1..=3 {
            let e = mark_attendance(&pool, "cls-1", "stu-1").await.unwrap();
            assert_eq!(e.attendance, expected);
            assert_eq!(e.reached_limit(), expected >= 3);
        }

        // Past the limit the increment still lands
        let e = mark_attendance(&pool, "cls-1", "stu-1").await.unwrap();
        assert_eq!(e.attendance, 4);
        assert!(e.reached_limit());
    }

    #[tokio::test]
    async fn remove_unknown_pair_reports_not_enrolled() {
        let pool = test_pool().await;
        insert_student(&pool, "stu-1", "One").await;
        insert_class(&pool, "cls-1", 10, None, 24).await;

        let err = remove_student(&pool, "cls-1", "stu-1").await.unwrap_err();
        assert!(matches!(err, EnrollmentError::NotEnrolled));
    }
}
