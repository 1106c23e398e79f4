use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Class entity. Name is unique among active classes (enforced at the
/// handler level). Price is per-student in minor currency units; NULL
/// means a free class and suppresses automatic payment creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub id: String,
    pub name: String,
    pub level: String,
    pub capacity: i64,
    pub teacher_id: Option<String>,
    pub price: Option<i64>,
    pub total_sessions: i64,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Enrollment link between one student and one class
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub attendance: i64,
    pub sessions_registered: i64,
    pub created_at: String,
}

impl Enrollment {
    /// Advisory flag only; attendance past the limit is never blocked.
    pub fn reached_limit(&self) -> bool {
        self.attendance >= self.sessions_registered
    }
}

/// Enrollment with the derived limit flag, as returned by the API
#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub reached_limit: bool,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        let reached_limit = e.reached_limit();
        Self {
            enrollment: e,
            reached_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    pub name: String,
    pub level: String,
    pub capacity: i64,
    pub teacher_id: Option<String>,
    pub price: Option<i64>,
    pub total_sessions: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClassRequest {
    pub name: Option<String>,
    pub level: Option<String>,
    pub capacity: Option<i64>,
    pub teacher_id: Option<String>,
    pub price: Option<i64>,
    pub total_sessions: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub student_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub student_id: String,
}

/// One row of the class roster: enrollment plus student identity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RosterEntry {
    pub student_id: String,
    pub student_name: String,
    pub student_email: String,
    pub attendance: i64,
    pub sessions_registered: i64,
}

/// Class with its current enrollment count, for list views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassWithEnrollment {
    pub id: String,
    pub name: String,
    pub level: String,
    pub capacity: i64,
    pub teacher_id: Option<String>,
    pub price: Option<i64>,
    pub total_sessions: i64,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub enrolled: i64,
}
