use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Student profile entity. Students are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub school: Option<String>,
    pub note: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Student response without credentials
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub school: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Student> for StudentResponse {
    fn from(s: Student) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            phone: s.phone,
            school: s.school,
            note: s.note,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub school: Option<String>,
    pub note: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub school: Option<String>,
    pub note: Option<String>,
    pub password: Option<String>,
}

/// Enrollment joined with class info, for the student detail view
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentWithClass {
    pub class_id: String,
    pub class_name: String,
    pub level: String,
    pub attendance: i64,
    pub sessions_registered: i64,
}

/// Student detail with current enrollments
#[derive(Debug, Serialize)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: StudentResponse,
    pub enrollments: Vec<EnrollmentWithClass>,
}
