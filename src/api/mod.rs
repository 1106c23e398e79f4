pub mod accounts;
pub mod auth;
mod classes;
mod error;
mod exams;
mod maintenance;
mod payments;
mod reminders;
mod students;
mod tests;
mod validation;

pub use error::ApiError;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::Role;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new().route("/login", post(auth::login));

    // Maintenance carries its own admin-token gate in the handler
    let maintenance_routes = Router::new().route(
        "/randomize-sessions",
        post(maintenance::randomize_sessions),
    );

    // Protected API routes
    let api_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Students
        .route("/students", get(students::list_students))
        .route("/students", post(students::create_student))
        .route("/students/:id", get(students::get_student))
        .route("/students/:id", put(students::update_student))
        .route("/students/:id/exams", get(exams::list_student_exams))
        .route("/students/:id/exams", post(exams::create_exam))
        .route(
            "/students/:id/assignments",
            get(tests::list_student_assignments),
        )
        // Classes, enrollment, attendance
        .route("/classes", get(classes::list_classes))
        .route("/classes", post(classes::create_class))
        .route("/classes/:id", get(classes::get_class))
        .route("/classes/:id", put(classes::update_class))
        .route("/classes/:id", delete(classes::delete_class))
        .route("/classes/:id/roster", get(classes::get_roster))
        .route("/classes/:id/enrollments", post(classes::enroll_student))
        .route(
            "/classes/:id/enrollments/:student_id",
            delete(classes::unenroll_student),
        )
        .route("/classes/:id/attendance", post(classes::mark_attendance))
        .route("/classes/:id/earnings", get(payments::class_earnings))
        // Payments
        .route("/payments/:id", get(payments::get_payment))
        .route("/payments/:id", put(payments::update_payment))
        // Placement level thresholds
        .route("/level-thresholds", get(exams::list_thresholds))
        .route("/level-thresholds", post(exams::create_threshold))
        .route("/level-thresholds/:id", put(exams::update_threshold))
        .route("/level-thresholds/:id", delete(exams::delete_threshold))
        // Accounts, one mount per kind
        .nest("/staff", accounts::role_router(Role::Staff))
        .nest("/teachers", accounts::role_router(Role::Teacher))
        .nest("/managers", accounts::role_router(Role::Manager))
        .nest("/cashiers", accounts::role_router(Role::Cashier))
        // Reminders
        .route("/reminders", get(reminders::list_reminders))
        .route("/reminders", post(reminders::create_reminder))
        .route("/reminders/:id", delete(reminders::delete_reminder))
        // Online tests
        .route("/tests", get(tests::list_tests))
        .route("/tests", post(tests::create_test))
        .route("/tests/:id", get(tests::get_test))
        .route("/tests/:id", put(tests::update_test))
        .route("/tests/:id", delete(tests::delete_test))
        .route("/tests/:id/assignments", post(tests::assign_test))
        .route("/assignments/:id", get(tests::get_assignment))
        .route("/assignments/:id/submit", post(tests::submit_assignment))
        .route("/assignments/:id/grades", put(tests::grade_assignment))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/maintenance", maintenance_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
