//! Database seeders for built-in data.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Seed the default CEFR placement bands. Runs on every startup but leaves
/// operator-edited rows alone (INSERT OR IGNORE on fixed ids).
pub async fn seed_level_thresholds(pool: &SqlitePool) -> Result<()> {
    info!("Seeding default level thresholds...");

    // (id, level, min_score, max_score) — bands partition [0, 100]
    let bands: Vec<(&str, &str, i64, i64)> = vec![
        ("threshold-a1", "A1", 0, 30),
        ("threshold-a2", "A2", 31, 50),
        ("threshold-b1", "B1", 51, 70),
        ("threshold-b2", "B2", 71, 85),
        ("threshold-c1", "C1", 86, 100),
    ];

    for (id, level, min_score, max_score) in bands {
        sqlx::query(
            "INSERT OR IGNORE INTO level_thresholds (id, level, min_score, max_score)
             VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(level)
        .bind(min_score)
        .bind(max_score)
        .execute(pool)
        .await?;
    }

    Ok(())
}
