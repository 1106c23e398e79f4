use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Follow-up note a staff member keeps against a student
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: String,
    pub staff_id: String,
    pub student_id: String,
    pub kind: String,
    pub platform: Option<String>,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub student_id: String,
    pub kind: String,
    pub platform: Option<String>,
    pub content: String,
}
