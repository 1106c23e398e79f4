//! Exam score → placement level lookup.

use crate::db::{DbPool, LevelThreshold};

/// Find the first band whose [min_score, max_score] contains the score,
/// both ends inclusive. Thresholds are expected to partition [0, 100];
/// under overlap the first match in slice order wins, which is arbitrary.
pub fn place_score<'a>(thresholds: &'a [LevelThreshold], score: i64) -> Option<&'a LevelThreshold> {
    thresholds
        .iter()
        .find(|t| score >= t.min_score && score <= t.max_score)
}

/// Resolve a score against the configured thresholds.
pub async fn placement_level(pool: &DbPool, score: i64) -> Result<Option<String>, sqlx::Error> {
    let thresholds: Vec<LevelThreshold> =
        sqlx::query_as("SELECT * FROM level_thresholds ORDER BY min_score ASC, max_score ASC")
            .fetch_all(pool)
            .await?;
    Ok(place_score(&thresholds, score).map(|t| t.level.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn band(level: &str, min: i64, max: i64) -> LevelThreshold {
        LevelThreshold {
            id: format!("t-{}", level),
            level: level.to_string(),
            min_score: min,
            max_score: max,
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let bands = vec![band("A1", 0, 30), band("A2", 31, 50)];
        assert_eq!(place_score(&bands, 30).unwrap().level, "A1");
        assert_eq!(place_score(&bands, 31).unwrap().level, "A2");
    }

    #[test]
    fn gap_yields_no_level() {
        let bands = vec![band("A1", 0, 30), band("B1", 51, 70)];
        assert!(place_score(&bands, 40).is_none());
    }

    #[test]
    fn overlap_resolves_to_first_match() {
        let bands = vec![band("A1", 0, 50), band("A2", 40, 60)];
        assert_eq!(place_score(&bands, 45).unwrap().level, "A1");
    }

    #[tokio::test]
    async fn seeded_bands_place_75_as_b2() {
        let pool = test_pool().await;
        let level = placement_level(&pool, 75).await.unwrap();
        assert_eq!(level.as_deref(), Some("B2"));
    }
}
