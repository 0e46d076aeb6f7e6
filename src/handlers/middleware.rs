//! Middleware: session auth, role checks, security headers, maintenance mode

use crate::handlers::auth::{extract_session_token, hash_token};
use crate::handlers::AppState;
use crate::models::{Profile, Session, UserRole};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;

/// Authenticated back-office user, inserted into request extensions and
/// available to handlers via Extension<Profile>.
pub async fn require_user(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let headers = request.headers();

    let token = match extract_session_token(headers) {
        Some(t) => t,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"success": false, "error": "Not authenticated"})),
            )
                .into_response();
        }
    };

    let token_hash = hash_token(&token);

    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE token_hash = $1 AND expires_at > NOW()",
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await;

    let session = match session {
        Ok(Some(s)) => s,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"success": false, "error": "Session expired or invalid"})),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error during session validation: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"success": false, "error": "Authentication error"})),
            )
                .into_response();
        }
    };

    let user = sqlx::query_as::<_, Profile>(
        "SELECT * FROM profiles WHERE id = $1 AND is_active = true",
    )
    .bind(session.profile_id)
    .fetch_optional(&state.pool)
    .await;

    let user = match user {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"success": false, "error": "User not found or inactive"})),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching profile: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"success": false, "error": "Authentication error"})),
            )
                .into_response();
        }
    };

    let mut request = request;
    request.extensions_mut().insert(user);

    next.run(request).await
}

/// Restrict a route group to the admin role. Must run after `require_user`
/// so the Profile extension is present.
pub async fn require_admin_role(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<Profile>() {
        Some(user) if user.role == UserRole::Admin => next.run(request).await,
        Some(_) => (
            StatusCode::FORBIDDEN,
            axum::Json(json!({"success": false, "error": "Admin role required"})),
        )
            .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"success": false, "error": "Not authenticated"})),
        )
            .into_response(),
    }
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}

const MAINTENANCE_PAGE: &str = "<!doctype html><html><head><title>Mantenimiento</title></head>\
<body><h1>Estamos en mantenimiento</h1>\
<p>Volvemos en unos minutos. Gracias por tu paciencia.</p></body></html>";

/// When maintenance mode is enabled, answer every non-asset path with the
/// static maintenance page. The payment webhook and health check stay open so
/// in-flight checkouts are not lost.
pub async fn maintenance_mode(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.maintenance_mode {
        return next.run(request).await;
    }

    let path = request.uri().path();
    if path == "/health" || path.starts_with("/api/webhooks/") || path.starts_with("/assets/") {
        return next.run(request).await;
    }

    (StatusCode::SERVICE_UNAVAILABLE, Html(MAINTENANCE_PAGE)).into_response()
}
