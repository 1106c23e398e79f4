//! Admin-token-gated maintenance endpoint. Not part of the regular
//! session-authenticated surface; the shared secret arrives in a header.

use axum::{extract::State, http::HeaderMap, Json};
use rand::Rng;
use std::sync::Arc;

use crate::AppState;

use super::auth::is_admin_token;
use super::error::ApiError;

const MIN_SESSIONS: i64 = 8;
const MAX_SESSIONS: i64 = 36;

/// Assign every active class a fresh random session count.
pub async fn randomize_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = headers
        .get("X-Admin-Token")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing admin token"))?;
    if !is_admin_token(&state.config, token) {
        return Err(ApiError::unauthorized("Invalid admin token"));
    }

    let classes: Vec<(String,)> = sqlx::query_as("SELECT id FROM classes WHERE active = 1")
        .fetch_all(&state.db)
        .await?;

    // ThreadRng is not Send: finish every draw before the first await below
    let drawn: Vec<(String, i64)> = {
        let mut rng = rand::rng();
        classes
            .into_iter()
            .map(|(id,)| (id, rng.random_range(MIN_SESSIONS..=MAX_SESSIONS)))
            .collect()
    };

    let mut updated = 0u64;
    for (id, sessions) in &drawn {
        let result = sqlx::query("UPDATE classes SET total_sessions = ? WHERE id = ?")
            .bind(sessions)
            .bind(id)
            .execute(&state.db)
            .await?;
        updated += result.rows_affected();
    }

    tracing::warn!(updated, "Randomized session counts via maintenance endpoint");
    Ok(Json(serde_json::json!({ "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::super::error::ErrorKind;
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::workflow::testutil::insert_class;
    use axum::extract::State;

    // Routing requires handler futures to be Send
    fn send_future<F: std::future::Future + Send>(f: F) -> F {
        f
    }

    fn token_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-Admin-Token", token.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn randomizes_active_classes_within_bounds() {
        let pool = test_pool().await;
        insert_class(&pool, "cls-1", 10, None, 500).await;
        insert_class(&pool, "cls-2", 10, None, 500).await;
        sqlx::query("UPDATE classes SET active = 0 WHERE id = 'cls-2'")
            .execute(&pool)
            .await
            .unwrap();

        let config = Config::default();
        let token = config.auth.admin_token.clone();
        let state = Arc::new(crate::AppState::new(config, pool.clone()));

        let Json(body) = send_future(randomize_sessions(State(state), token_headers(&token)))
            .await
            .unwrap();
        assert_eq!(body["updated"], 1);

        let (sessions,): (i64,) =
            sqlx::query_as("SELECT total_sessions FROM classes WHERE id = 'cls-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!((MIN_SESSIONS..=MAX_SESSIONS).contains(&sessions));

        // Inactive class is left alone
        let (untouched,): (i64,) =
            sqlx::query_as("SELECT total_sessions FROM classes WHERE id = 'cls-2'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(untouched, 500);
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_token() {
        let pool = test_pool().await;
        let state = Arc::new(crate::AppState::new(Config::default(), pool));

        let err = randomize_sessions(State(state.clone()), HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = randomize_sessions(State(state), token_headers("not-the-token"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
