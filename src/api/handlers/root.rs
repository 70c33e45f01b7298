//! Service banner for the bare origin.

use axum::response::{IntoResponse, Json};
use serde_json::json;

/// Answer `GET /` with the service name and version.
///
/// Kept out of the OpenAPI document on purpose; it exists for humans and
/// uptime checks, not for API clients.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn root_answers_ok() {
        let response = root().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
