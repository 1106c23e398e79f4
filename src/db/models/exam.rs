use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Placement exam record. Immutable once created: there is no update or
/// delete route.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub id: String,
    pub student_id: String,
    pub score: i64,
    pub level: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateExamRequest {
    pub score: i64,
    pub note: Option<String>,
}

/// Score band mapping an exam score to a placement level. Bands are meant
/// to be non-overlapping and partition [0, 100]; overlaps are not
/// structurally prevented and resolve to the first match.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LevelThreshold {
    pub id: String,
    pub level: String,
    pub min_score: i64,
    pub max_score: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateThresholdRequest {
    pub level: String,
    pub min_score: i64,
    pub max_score: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateThresholdRequest {
    pub level: Option<String>,
    pub min_score: Option<i64>,
    pub max_score: Option<i64>,
}
