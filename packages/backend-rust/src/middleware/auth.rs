use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::response::AppError;
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Identity resolved by the upstream identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

pub fn extract_user_id(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(id) = extract_user_id(req.headers(), &state.config().auth_user_header) else {
        return AppError::unauthorized("Missing authenticated user").into_response();
    };

    req.extensions_mut().insert(AuthUser { id });
    next.run(req).await
}

/// Question import is only reachable with the configured admin key.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config().admin_api_key.as_deref() else {
        return AppError::forbidden("Question import is disabled").into_response();
    };

    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(expected) {
        return AppError::forbidden("Invalid admin key").into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_user_id() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user_id(&headers, "x-user-id"), None);

        headers.insert("x-user-id", HeaderValue::from_static("   "));
        assert_eq!(extract_user_id(&headers, "x-user-id"), None);

        headers.insert("x-user-id", HeaderValue::from_static(" user-42 "));
        assert_eq!(extract_user_id(&headers, "x-user-id"), Some("user-42".to_string()));
    }
}
