use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment ledger entry: at most one per (student, class) pair. Created
/// automatically when a student is enrolled into a priced class, deleted
/// when the student is removed from that class.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub amount: i64,
    pub method: Option<String>,
    pub paid: bool,
    pub discount_percent: i64,
    pub discount_reason: Option<String>,
    pub staff_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request to update a payment. `new_session_count`, when present, rewrites
/// the matching enrollment's sessions-registered in the same transaction.
#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub method: Option<String>,
    pub paid: Option<bool>,
    pub discount_percent: Option<i64>,
    pub discount_reason: Option<String>,
    pub new_session_count: Option<i64>,
}

/// Payment joined with student identity, for the earnings view
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentWithStudent {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub amount: i64,
    pub method: Option<String>,
    pub paid: bool,
    pub discount_percent: i64,
    pub discount_reason: Option<String>,
    pub staff_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-class earnings summary
#[derive(Debug, Serialize)]
pub struct ClassEarnings {
    pub class_id: String,
    pub total_amount: i64,
    pub total_collected: i64,
    pub payments: Vec<PaymentWithStudent>,
}
