//! Staff selection for payments created by enrollment. The strategy is
//! picked in the config file rather than hard-coded.

use crate::config::AssignmentStrategy;
use sqlx::SqliteConnection;

/// Pick the staff member to attach to a new payment. Returns None when no
/// staff accounts exist; the payment is still created without an assignee.
pub async fn pick_staff(
    conn: &mut SqliteConnection,
    strategy: AssignmentStrategy,
) -> Result<Option<String>, sqlx::Error> {
    let sql = match strategy {
        AssignmentStrategy::FirstAvailable => {
            "SELECT id FROM accounts WHERE role = 'staff'
             ORDER BY created_at ASC, id ASC LIMIT 1"
        }
        AssignmentStrategy::RoundRobin => {
            // Staff whose most recent assignment is the oldest goes next;
            // never-assigned staff sort first.
            "SELECT a.id FROM accounts a
             WHERE a.role = 'staff'
             ORDER BY (
                 SELECT COALESCE(MAX(p.created_at), '')
                 FROM payments p WHERE p.staff_id = a.id
             ) ASC, a.created_at ASC, a.id ASC LIMIT 1"
        }
        AssignmentStrategy::LeastLoaded => {
            "SELECT a.id FROM accounts a
             WHERE a.role = 'staff'
             ORDER BY (
                 SELECT COUNT(*) FROM payments p
                 WHERE p.staff_id = a.id AND p.paid = 0
             ) ASC, a.created_at ASC, a.id ASC LIMIT 1"
        }
    };

    let row: Option<(String,)> = sqlx::query_as(sql).fetch_optional(conn).await?;
    Ok(row.map(|(id,)| id))
}
