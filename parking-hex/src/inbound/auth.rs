//! Bearer token authentication middleware.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use parking_types::{ParkingRepository, PaymentGateway, User};

use super::handlers::AppState;

/// The authenticated caller, inserted as a request extension.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Extracts the token from the Authorization header.
/// Expected format: "Bearer <token>" or just "<token>"
fn extract_token(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;
    Some(header.strip_prefix("Bearer ").unwrap_or(header).trim())
}

/// Routes reachable without a token: health, docs, and the two entry
/// points that hand out credentials.
fn is_public(method: &Method, path: &str) -> bool {
    if path == "/health" || path.starts_with("/swagger-ui") || path.starts_with("/api-docs") {
        return true;
    }

    *method == Method::POST
        && path.starts_with("/api/")
        && (path.ends_with("/register") || path.ends_with("/authenticate"))
}

/// Authentication middleware that resolves bearer tokens.
///
/// This middleware:
/// 1. Extracts the token from the Authorization header
/// 2. Hashes it using SHA-256 and looks the hash up
/// 3. Inserts the owning user as a [`CurrentUser`] extension
/// 4. Returns 401 Unauthorized if resolution fails
pub async fn auth_middleware<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match extract_token(auth_header) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    match state.service.resolve_token(&token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(None) => unauthorized_response("Invalid access token"),
        Err(e) => {
            tracing::error!("Access token verification failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Internal server error",
                    "code": 500
                })),
            )
                .into_response()
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": message,
            "code": 401
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_bearer() {
        assert_eq!(extract_token(Some("Bearer abc123")), Some("abc123"));
    }

    #[test]
    fn test_extract_token_raw() {
        assert_eq!(extract_token(Some("abc123")), Some("abc123"));
    }

    #[test]
    fn test_extract_token_none() {
        assert_eq!(extract_token(None), None);
    }

    #[test]
    fn test_public_routes() {
        assert!(is_public(&Method::GET, "/health"));
        assert!(is_public(&Method::POST, "/api/v1/register"));
        assert!(is_public(&Method::POST, "/api/v1/authenticate"));
        assert!(is_public(&Method::GET, "/swagger-ui/index.html"));
        assert!(!is_public(&Method::GET, "/api/v1/register"));
        assert!(!is_public(&Method::GET, "/api/v1/account"));
    }
}
