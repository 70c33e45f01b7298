//! Health probe handler.
//!
//! `GET /health` answers with a JSON status payload; `OPTIONS /health` is
//! wired for preflight and answers with headers only.

use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tracing::{Instrument, debug, error, info_span};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses (
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health"
)]
pub async fn health(method: Method, pool: Extension<PgPool>) -> impl IntoResponse {
    let db_healthy = database_is_healthy(&pool.0).await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_healthy {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let headers = x_app_headers(&health.name, &health.version, &health.commit);

    if db_healthy {
        debug!("Database connection is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Database connection is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

/// Acquire a connection and ping it, inside `db.*` spans for tracing.
async fn database_is_healthy(pool: &PgPool) -> bool {
    let acquire_span = info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );
    match pool.acquire().instrument(acquire_span).await {
        Ok(mut conn) => {
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            match conn.ping().instrument(ping_span).await {
                Ok(()) => true,
                Err(error) => {
                    error!("Failed to ping database: {}", error);
                    false
                }
            }
        }

        Err(error) => {
            error!("Failed to acquire database connection: {}", error);
            false
        }
    }
}

/// Build the `X-App` header, `name:version:short_hash`.
fn x_app_headers(name: &str, version: &str, commit: &str) -> HeaderMap {
    let short_hash = if commit.len() > 7 { &commit[0..7] } else { "" };

    format!("{name}:{version}:{short_hash}")
        .parse::<HeaderValue>()
        .map(|value| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_app_headers_shortens_commit() {
        let headers = x_app_headers("syncveil", "0.1.0", "0123456789abcdef");
        assert_eq!(
            headers.get("X-App").and_then(|value| value.to_str().ok()),
            Some("syncveil:0.1.0:0123456")
        );
    }

    #[test]
    fn x_app_headers_skips_short_commit() {
        let headers = x_app_headers("syncveil", "0.1.0", "unknown");
        assert_eq!(
            headers.get("X-App").and_then(|value| value.to_str().ok()),
            Some("syncveil:0.1.0:")
        );
    }

    #[test]
    fn x_app_headers_drops_invalid_values() {
        let headers = x_app_headers("syncveil\n", "0.1.0", "0123456789abcdef");
        assert!(headers.get("X-App").is_none());
    }
}
