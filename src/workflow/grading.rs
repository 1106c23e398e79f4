//! Submission scoring and teacher re-grading for the online test module.
//!
//! An assignment completes exactly once, at submission. Objective kinds
//! are scored on the spot; constructed-response and mapping answers are
//! stored at zero and flagged for manual review. Re-grading patches
//! individual answer scores and recomputes the assignment total unless an
//! explicit override is supplied.

use std::collections::{HashMap, HashSet};

use sqlx::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{
    AnswerInput, DbPool, GradePatch, Question, QuestionKind, StudentAnswer, TestAssignment,
};
use crate::utils::now_rfc3339;

#[derive(Debug, Error)]
pub enum GradingError {
    #[error("Assignment not found")]
    AssignmentNotFound,
    #[error("Assignment has already been submitted")]
    AlreadyCompleted,
    #[error("Answer references unknown question {0}")]
    UnknownQuestion(String),
    #[error("Unknown answer {0}")]
    UnknownAnswer(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

fn split_parts(response: &str) -> Vec<&str> {
    response.split('|').map(str::trim).collect()
}

/// Full credit iff the selected option set exactly equals the correct set,
/// zero otherwise. Selection order does not matter.
pub fn score_multiple_choice(response: &str, correct: &[String], question_score: i64) -> i64 {
    let selected: HashSet<&str> = split_parts(response)
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    let expected: HashSet<&str> = correct.iter().map(|s| s.as_str()).collect();
    if !expected.is_empty() && selected == expected {
        question_score
    } else {
        0
    }
}

/// Partial credit: positionally matching blanks (trimmed, case-insensitive)
/// over total blanks, scaled by the question score and rounded to the
/// nearest integer.
pub fn score_fill_blank(response: &str, correct: &[String], question_score: i64) -> i64 {
    if correct.is_empty() {
        return 0;
    }
    let given = split_parts(response);
    let matched = correct
        .iter()
        .enumerate()
        .filter(|(i, expected)| {
            given
                .get(*i)
                .map(|g| g.to_lowercase() == expected.trim().to_lowercase())
                .unwrap_or(false)
        })
        .count();
    let ratio = matched as f64 / correct.len() as f64;
    (ratio * question_score as f64).round() as i64
}

/// Correct option ids (multiple choice) or answer texts in position order
/// (fill blank) for one question.
async fn answer_key(
    conn: &mut sqlx::SqliteConnection,
    question_id: &str,
    kind: QuestionKind,
) -> Result<Vec<String>, sqlx::Error> {
    let column = match kind {
        QuestionKind::MultipleChoice => "id",
        _ => "text",
    };
    let rows: Vec<(String,)> = sqlx::query_as(&format!(
        "SELECT {} FROM question_options
         WHERE question_id = ? AND is_correct = 1 ORDER BY position ASC",
        column
    ))
    .bind(question_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

/// Submit a student's answers, scoring each by question type and marking
/// the assignment completed. Answers and the assignment update commit
/// together or not at all.
pub async fn submit_assignment(
    pool: &DbPool,
    assignment_id: &str,
    answers: &[AnswerInput],
) -> Result<(TestAssignment, Vec<StudentAnswer>), GradingError> {
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    let assignment: TestAssignment =
        sqlx::query_as("SELECT * FROM test_assignments WHERE id = ?")
            .bind(assignment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GradingError::AssignmentNotFound)?;
    if assignment.completed_at.is_some() {
        return Err(GradingError::AlreadyCompleted);
    }

    let questions: Vec<Question> = sqlx::query_as("SELECT * FROM questions WHERE test_id = ?")
        .bind(&assignment.test_id)
        .fetch_all(&mut *tx)
        .await?;
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut total = 0i64;
    for answer in answers {
        let question = by_id
            .get(answer.question_id.as_str())
            .ok_or_else(|| GradingError::UnknownQuestion(answer.question_id.clone()))?;
        let kind: QuestionKind = question
            .kind
            .parse()
            .map_err(|_| GradingError::UnknownQuestion(answer.question_id.clone()))?;

        let (score, needs_review) = if kind.auto_scored() {
            let key = answer_key(&mut tx, &question.id, kind).await?;
            let score = match kind {
                QuestionKind::MultipleChoice => {
                    score_multiple_choice(&answer.response, &key, question.score)
                }
                _ => score_fill_blank(&answer.response, &key, question.score),
            };
            (score, false)
        } else {
            (0, true)
        };
        total += score;

        sqlx::query(
            "INSERT INTO student_answers
                 (id, assignment_id, question_id, response, score, needs_review)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(assignment_id)
        .bind(&answer.question_id)
        .bind(&answer.response)
        .bind(score)
        .bind(needs_review)
        .execute(&mut *tx)
        .await?;
    }

    let completed_at = now_rfc3339();
    sqlx::query("UPDATE test_assignments SET completed_at = ?, score = ? WHERE id = ?")
        .bind(&completed_at)
        .bind(total)
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

    let assignment: TestAssignment = sqlx::query_as("SELECT * FROM test_assignments WHERE id = ?")
        .bind(assignment_id)
        .fetch_one(&mut *tx)
        .await?;
    let stored: Vec<StudentAnswer> =
        sqlx::query_as("SELECT * FROM student_answers WHERE assignment_id = ?")
            .bind(assignment_id)
            .fetch_all(&mut *tx)
            .await?;

    tx.commit().await?;
    Ok((assignment, stored))
}

/// Patch individual answer scores and recompute the assignment total as
/// the per-answer sum, unless an explicit override total is supplied.
pub async fn regrade_assignment(
    pool: &DbPool,
    assignment_id: &str,
    patches: &[GradePatch],
    total_override: Option<i64>,
) -> Result<TestAssignment, GradingError> {
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM test_assignments WHERE id = ?")
        .bind(assignment_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(GradingError::AssignmentNotFound);
    }

    for patch in patches {
        let updated = sqlx::query(
            "UPDATE student_answers SET score = ?, feedback = ?, needs_review = 0
             WHERE id = ? AND assignment_id = ?",
        )
        .bind(patch.score)
        .bind(&patch.feedback)
        .bind(&patch.answer_id)
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(GradingError::UnknownAnswer(patch.answer_id.clone()));
        }
    }

    let total = match total_override {
        Some(total) => total,
        None => {
            let sum: (i64,) = sqlx::query_as(
                "SELECT COALESCE(SUM(score), 0) FROM student_answers WHERE assignment_id = ?",
            )
            .bind(assignment_id)
            .fetch_one(&mut *tx)
            .await?;
            sum.0
        }
    };

    sqlx::query("UPDATE test_assignments SET score = ? WHERE id = ?")
        .bind(total)
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

    let assignment: TestAssignment = sqlx::query_as("SELECT * FROM test_assignments WHERE id = ?")
        .bind(assignment_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(assignment)
}

/// A teacher may grade an assignment iff they authored the test or they
/// teach a class the assignee is enrolled in.
pub async fn can_grade(
    pool: &DbPool,
    teacher_id: &str,
    assignment: &TestAssignment,
) -> Result<bool, sqlx::Error> {
    let authored: Option<(String,)> =
        sqlx::query_as("SELECT id FROM tests WHERE id = ? AND teacher_id = ?")
            .bind(&assignment.test_id)
            .bind(teacher_id)
            .fetch_optional(pool)
            .await?;
    if authored.is_some() {
        return Ok(true);
    }

    let teaches: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM classes c
         INNER JOIN enrollments e ON e.class_id = c.id
         WHERE c.teacher_id = ? AND e.student_id = ?",
    )
    .bind(teacher_id)
    .bind(&assignment.student_id)
    .fetch_one(pool)
    .await?;
    Ok(teaches.0 > 0)
}
