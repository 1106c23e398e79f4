//! Online test module: authoring, assignment, submission and grading.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::Connection;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    AssignTestRequest, AssignmentDetail, CreateTestRequest, GradeAssignmentRequest, MappingColumn,
    Principal, Question, QuestionDetail, QuestionInput, QuestionKind, QuestionOption, QuestionView,
    Role, StudentAnswer, SubmitAssignmentRequest, Test, TestAssignment, TestDetail, TestView,
    UpdateTestRequest,
};
use crate::utils::now_rfc3339;
use crate::workflow::grading;
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::validation::validate_score;

async fn fetch_test(db: &crate::db::DbPool, id: &str) -> Result<Test, ApiError> {
    let test: Option<Test> = sqlx::query_as("SELECT * FROM tests WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    test.ok_or_else(|| ApiError::not_found("Test not found"))
}

fn require_author(principal: &Principal, test: &Test) -> Result<(), ApiError> {
    if principal.role == Role::Admin || test.teacher_id == principal.id {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the test author may do this"))
    }
}

fn validate_questions(questions: &[QuestionInput]) -> Result<(), ApiError> {
    for question in questions {
        let kind: QuestionKind = question
            .kind
            .parse()
            .map_err(|e: String| ApiError::bad_request(e))?;
        validate_score(question.score).map_err(ApiError::bad_request)?;
        if question.prompt.trim().is_empty() {
            return Err(ApiError::bad_request("Question prompt is required"));
        }
        if kind.auto_scored() && !question.options.iter().any(|o| o.is_correct) {
            return Err(ApiError::bad_request(
                "Objective questions need at least one correct option",
            ));
        }
        if kind == QuestionKind::Mapping && question.mapping_columns.is_empty() {
            return Err(ApiError::bad_request(
                "Mapping questions need mapping columns",
            ));
        }
    }
    Ok(())
}

async fn insert_questions(
    tx: &mut sqlx::SqliteConnection,
    test_id: &str,
    questions: &[QuestionInput],
) -> Result<(), sqlx::Error> {
    for (position, question) in questions.iter().enumerate() {
        let question_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO questions (id, test_id, kind, prompt, score, position)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&question_id)
        .bind(test_id)
        .bind(&question.kind)
        .bind(&question.prompt)
        .bind(question.score)
        .bind(position as i64 + 1)
        .execute(&mut *tx)
        .await?;

        for (opt_position, option) in question.options.iter().enumerate() {
            sqlx::query(
                "INSERT INTO question_options (id, question_id, text, is_correct, position)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&question_id)
            .bind(&option.text)
            .bind(option.is_correct)
            .bind(opt_position as i64 + 1)
            .execute(&mut *tx)
            .await?;
        }

        for (col_position, column) in question.mapping_columns.iter().enumerate() {
            sqlx::query(
                "INSERT INTO mapping_columns (id, question_id, side, text, position)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&question_id)
            .bind(&column.side)
            .bind(&column.text)
            .bind(col_position as i64 + 1)
            .execute(&mut *tx)
            .await?;
        }
    }
    Ok(())
}

pub async fn list_tests(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<Test>>, ApiError> {
    require_role(&principal, &[Role::Teacher])?;

    let tests: Vec<Test> = if principal.role == Role::Admin {
        sqlx::query_as("SELECT * FROM tests ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as("SELECT * FROM tests WHERE teacher_id = ? ORDER BY created_at DESC")
            .bind(&principal.id)
            .fetch_all(&state.db)
            .await?
    };
    Ok(Json(tests))
}

pub async fn create_test(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(request): Json<CreateTestRequest>,
) -> Result<Json<Test>, ApiError> {
    require_role(&principal, &[Role::Teacher])?;

    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("Test title is required"));
    }
    validate_questions(&request.questions)?;

    let mut conn = state.db.acquire().await.map_err(ApiError::from)?;
    let mut tx = conn.begin().await.map_err(ApiError::from)?;

    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO tests (id, teacher_id, title, description) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&principal.id)
        .bind(&request.title)
        .bind(&request.description)
        .execute(&mut *tx)
        .await?;

    insert_questions(&mut tx, &id, &request.questions).await?;

    let test: Test = sqlx::query_as("SELECT * FROM tests WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await.map_err(ApiError::from)?;

    tracing::info!(test_id = %id, "Created test");
    Ok(Json(test))
}

/// Strip the answer key for test takers: option correctness flags go away,
/// and fill-blank options disappear entirely because their texts are the
/// expected answers.
fn student_view(test: Test, questions: Vec<QuestionDetail>) -> TestView {
    let questions = questions
        .into_iter()
        .map(|q| {
            let hide_options =
                q.question.kind.parse::<QuestionKind>() == Ok(QuestionKind::FillBlank);
            QuestionView {
                question: q.question,
                options: if hide_options {
                    Vec::new()
                } else {
                    q.options.into_iter().map(Into::into).collect()
                },
                mapping_columns: q.mapping_columns,
            }
        })
        .collect();
    TestView { test, questions }
}

pub async fn get_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Response, ApiError> {
    let test = fetch_test(&state.db, &id).await?;

    // Authors and assigned students may read the test
    let is_author = require_author(&principal, &test).is_ok();
    if !is_author {
        let assigned: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM test_assignments WHERE test_id = ? AND student_id = ?",
        )
        .bind(&id)
        .bind(&principal.id)
        .fetch_optional(&state.db)
        .await?;
        if assigned.is_none() {
            return Err(ApiError::forbidden("You do not have access to this test"));
        }
    }

    let questions: Vec<Question> =
        sqlx::query_as("SELECT * FROM questions WHERE test_id = ? ORDER BY position ASC")
            .bind(&id)
            .fetch_all(&state.db)
            .await?;

    let mut details = Vec::with_capacity(questions.len());
    for question in questions {
        let options: Vec<QuestionOption> = sqlx::query_as(
            "SELECT * FROM question_options WHERE question_id = ? ORDER BY position ASC",
        )
        .bind(&question.id)
        .fetch_all(&state.db)
        .await?;
        let mapping_columns: Vec<MappingColumn> = sqlx::query_as(
            "SELECT * FROM mapping_columns WHERE question_id = ? ORDER BY position ASC",
        )
        .bind(&question.id)
        .fetch_all(&state.db)
        .await?;
        details.push(QuestionDetail {
            question,
            options,
            mapping_columns,
        });
    }

    if is_author {
        Ok(Json(TestDetail {
            test,
            questions: details,
        })
        .into_response())
    } else {
        Ok(Json(student_view(test, details)).into_response())
    }
}

/// Update a test; a supplied question list replaces the existing one.
pub async fn update_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<UpdateTestRequest>,
) -> Result<Json<Test>, ApiError> {
    require_role(&principal, &[Role::Teacher])?;
    let mut test = fetch_test(&state.db, &id).await?;
    require_author(&principal, &test)?;

    if let Some(title) = request.title {
        if title.trim().is_empty() {
            return Err(ApiError::bad_request("Test title is required"));
        }
        test.title = title;
    }
    if request.description.is_some() {
        test.description = request.description.clone();
    }
    if let Some(ref questions) = request.questions {
        validate_questions(questions)?;
    }

    let mut conn = state.db.acquire().await.map_err(ApiError::from)?;
    let mut tx = conn.begin().await.map_err(ApiError::from)?;

    sqlx::query("UPDATE tests SET title = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&test.title)
        .bind(&test.description)
        .bind(now_rfc3339())
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    if let Some(ref questions) = request.questions {
        // Submitted answers reference question rows; the set is frozen once
        // any submission exists.
        let submitted: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_answers sa
             INNER JOIN test_assignments ta ON ta.id = sa.assignment_id
             WHERE ta.test_id = ?",
        )
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;
        if submitted.0 > 0 {
            return Err(ApiError::conflict(
                "Cannot replace questions after submissions exist",
            ));
        }

        sqlx::query("DELETE FROM questions WHERE test_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        insert_questions(&mut tx, &id, questions).await?;
    }

    let test: Test = sqlx::query_as("SELECT * FROM tests WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await.map_err(ApiError::from)?;
    Ok(Json(test))
}

pub async fn delete_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&principal, &[Role::Teacher])?;
    let test = fetch_test(&state.db, &id).await?;
    require_author(&principal, &test)?;

    sqlx::query("DELETE FROM tests WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn assign_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<AssignTestRequest>,
) -> Result<Json<TestAssignment>, ApiError> {
    require_role(&principal, &[Role::Teacher])?;
    let test = fetch_test(&state.db, &id).await?;
    require_author(&principal, &test)?;

    let student: Option<(String,)> = sqlx::query_as("SELECT id FROM students WHERE id = ?")
        .bind(&request.student_id)
        .fetch_optional(&state.db)
        .await?;
    if student.is_none() {
        return Err(ApiError::not_found("Student not found"));
    }

    let assignment_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO test_assignments (id, test_id, student_id, due_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&assignment_id)
    .bind(&id)
    .bind(&request.student_id)
    .bind(&request.due_at)
    .execute(&state.db)
    .await?;

    let assignment: TestAssignment =
        sqlx::query_as("SELECT * FROM test_assignments WHERE id = ?")
            .bind(&assignment_id)
            .fetch_one(&state.db)
            .await?;
    Ok(Json(assignment))
}

async fn fetch_assignment(
    db: &crate::db::DbPool,
    id: &str,
) -> Result<TestAssignment, ApiError> {
    let assignment: Option<TestAssignment> =
        sqlx::query_as("SELECT * FROM test_assignments WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
    assignment.ok_or_else(|| ApiError::not_found("Assignment not found"))
}

/// A teacher may view/grade iff they authored the test or teach a class
/// containing the assignee; the assigned student may view their own.
async fn check_assignment_access(
    state: &AppState,
    principal: &Principal,
    assignment: &TestAssignment,
) -> Result<(), ApiError> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Student if principal.id == assignment.student_id => Ok(()),
        Role::Teacher => {
            if grading::can_grade(&state.db, &principal.id, assignment).await? {
                Ok(())
            } else {
                Err(ApiError::forbidden(
                    "You do not have access to this assignment",
                ))
            }
        }
        _ => Err(ApiError::forbidden(
            "You do not have access to this assignment",
        )),
    }
}

pub async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<Json<AssignmentDetail>, ApiError> {
    let assignment = fetch_assignment(&state.db, &id).await?;
    check_assignment_access(&state, &principal, &assignment).await?;

    let answers: Vec<StudentAnswer> =
        sqlx::query_as("SELECT * FROM student_answers WHERE assignment_id = ?")
            .bind(&id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(AssignmentDetail {
        assignment,
        answers,
    }))
}

pub async fn list_student_assignments(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
    principal: Principal,
) -> Result<Json<Vec<TestAssignment>>, ApiError> {
    if !(principal.role == Role::Student && principal.id == student_id) {
        require_role(&principal, &[Role::Teacher, Role::Staff, Role::Manager])?;
    }

    let assignments: Vec<TestAssignment> = sqlx::query_as(
        "SELECT * FROM test_assignments WHERE student_id = ? ORDER BY created_at DESC",
    )
    .bind(&student_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(assignments))
}

/// One-shot submission; a second submit is rejected with a conflict.
pub async fn submit_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<SubmitAssignmentRequest>,
) -> Result<Json<AssignmentDetail>, ApiError> {
    let assignment = fetch_assignment(&state.db, &id).await?;
    if principal.role != Role::Admin
        && !(principal.role == Role::Student && principal.id == assignment.student_id)
    {
        return Err(ApiError::forbidden(
            "Only the assigned student may submit this test",
        ));
    }
    if request.answers.is_empty() {
        return Err(ApiError::bad_request("At least one answer is required"));
    }

    let (assignment, answers) =
        grading::submit_assignment(&state.db, &id, &request.answers).await?;
    Ok(Json(AssignmentDetail {
        assignment,
        answers,
    }))
}

pub async fn grade_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Principal,
    Json(request): Json<GradeAssignmentRequest>,
) -> Result<Json<TestAssignment>, ApiError> {
    require_role(&principal, &[Role::Teacher])?;
    let assignment = fetch_assignment(&state.db, &id).await?;
    if principal.role == Role::Teacher
        && !grading::can_grade(&state.db, &principal.id, &assignment).await?
    {
        return Err(ApiError::forbidden(
            "You may grade only your own tests or your students' assignments",
        ));
    }

    let assignment =
        grading::regrade_assignment(&state.db, &id, &request.answers, request.total_override)
            .await?;
    Ok(Json(assignment))
}

#[cfg(test)]
mod tests {
    use super::super::error::ErrorKind;
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::workflow::testutil::{insert_account, insert_student};

    fn sample_test() -> Test {
        Test {
            id: "test-1".to_string(),
            teacher_id: "teacher-1".to_string(),
            title: "Unit 1".to_string(),
            description: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn question(id: &str, kind: &str) -> Question {
        Question {
            id: id.to_string(),
            test_id: "test-1".to_string(),
            kind: kind.to_string(),
            prompt: "prompt".to_string(),
            score: 10,
            position: 1,
        }
    }

    fn option(id: &str, question_id: &str, text: &str, is_correct: bool) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            question_id: question_id.to_string(),
            text: text.to_string(),
            is_correct,
            position: 1,
        }
    }

    #[test]
    fn student_view_hides_the_answer_key() {
        let questions = vec![
            QuestionDetail {
                question: question("q-mc", "multiple_choice"),
                options: vec![
                    option("opt-a", "q-mc", "alpha", true),
                    option("opt-b", "q-mc", "beta", false),
                ],
                mapping_columns: vec![],
            },
            QuestionDetail {
                question: question("q-fb", "fill_blank"),
                options: vec![option("blank-1", "q-fb", "Paris", true)],
                mapping_columns: vec![],
            },
        ];

        let json = serde_json::to_string(&student_view(sample_test(), questions)).unwrap();

        // Choice texts stay visible, correctness and blank answers do not
        assert!(json.contains("alpha"));
        assert!(json.contains("beta"));
        assert!(!json.contains("is_correct"));
        assert!(!json.contains("Paris"));
    }

    async fn seed_submitted_test(pool: &crate::db::DbPool) {
        insert_account(pool, "teacher-1", "teacher").await;
        insert_student(pool, "stu-1", "One").await;
        sqlx::query(
            "INSERT INTO tests (id, teacher_id, title) VALUES ('test-1', 'teacher-1', 'Unit 1')",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO questions (id, test_id, kind, prompt, score, position)
             VALUES ('q-1', 'test-1', 'constructed', 'prompt', 10, 1)",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO test_assignments (id, test_id, student_id)
             VALUES ('asg-1', 'test-1', 'stu-1')",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO student_answers (id, assignment_id, question_id, response, score)
             VALUES ('ans-1', 'asg-1', 'q-1', 'text', 0)",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    fn author() -> Principal {
        Principal {
            id: "teacher-1".to_string(),
            name: "T".to_string(),
            email: "t@example.com".to_string(),
            role: Role::Teacher,
        }
    }

    #[tokio::test]
    async fn update_rejects_question_replacement_after_submission() {
        let pool = test_pool().await;
        seed_submitted_test(&pool).await;
        let state = Arc::new(crate::AppState::new(Config::default(), pool.clone()));

        let request = UpdateTestRequest {
            title: None,
            description: None,
            questions: Some(vec![QuestionInput {
                kind: "constructed".to_string(),
                prompt: "Replacement".to_string(),
                score: 10,
                options: vec![],
                mapping_columns: vec![],
            }]),
        };
        let err = update_test(State(state), Path("test-1".to_string()), author(), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // The original question set is untouched
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM questions WHERE id = 'q-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn update_without_questions_still_renames_submitted_test() {
        let pool = test_pool().await;
        seed_submitted_test(&pool).await;
        let state = Arc::new(crate::AppState::new(Config::default(), pool.clone()));

        let request = UpdateTestRequest {
            title: Some("Unit 1 (revised)".to_string()),
            description: None,
            questions: None,
        };
        let Json(updated) =
            update_test(State(state), Path("test-1".to_string()), author(), Json(request))
                .await
                .unwrap();
        assert_eq!(updated.title, "Unit 1 (revised)");
    }
}
