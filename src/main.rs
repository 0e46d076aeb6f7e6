//! Andaray Tours backend
//!
//! Booking and back-office API for the Andaray Tours website.
//!
//! ## Features
//!
//! - **Booking intake**: multipart form, hosted checkout via Mercado Pago
//! - **Payment webhooks**: idempotent confirmation and voucher email
//! - **Back office**: tours, gallery, testimonials, clients, bookings, users

mod config;
mod db;
mod handlers;
mod models;
mod notifications;
mod payments;
mod validation;

use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use handlers::AppState;
use notifications::Mailer;
use payments::MercadoPago;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "andaray_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Andaray Tours backend");
    tracing::info!("Environment: {:?}", config.environment);
    if config.maintenance_mode {
        tracing::warn!("Maintenance mode is ENABLED");
    }

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Create application state
    let http = reqwest::Client::new();
    let state = AppState {
        pool: pool.clone(),
        mercadopago: MercadoPago::new(http.clone(), config.mp_access_token.clone()),
        mailer: Mailer::new(
            http.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
        ),
        http,
        public_base_url: config.public_base_url.clone(),
        email_owner: config.email_owner.clone(),
        document_lookup_token: config.document_lookup_token.clone(),
        revalidate_url: config.revalidate_url.clone(),
        session_expiry_hours: config.session_expiry_hours,
        maintenance_mode: config.maintenance_mode,
        is_production: config.is_production(),
    };

    let cors = build_cors(config.is_production(), &config.cors_origins);

    // Public booking and catalog endpoints
    let public_routes = Router::new()
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/:id/voucher", get(handlers::get_voucher))
        .route("/verify/:id", get(handlers::verify_booking))
        .route("/tours", get(handlers::list_tours))
        .route("/tours/:slug", get(handlers::get_tour_by_slug))
        .route("/gallery", get(handlers::list_gallery))
        .route("/testimonials", get(handlers::list_testimonials))
        .route("/settings", get(handlers::get_settings))
        // Payment gateway notifications
        .route("/webhooks/mercadopago", post(handlers::mercadopago_webhook))
        // Back-office authentication
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user));

    // Routes restricted to the admin role: user management and site settings
    let admin_role_routes = Router::new()
        .route("/users", get(handlers::list_profiles))
        .route("/users", post(handlers::create_profile))
        .route("/users/:id", put(handlers::update_profile))
        .route("/users/:id", delete(handlers::delete_profile))
        .route("/settings", put(handlers::update_settings))
        .layer(middleware::from_fn(
            handlers::middleware::require_admin_role,
        ));

    // Session-protected back-office routes
    let admin_routes = Router::new()
        .route("/dashboard", get(handlers::get_dashboard_stats))
        // Bookings
        .route("/bookings", get(handlers::list_bookings))
        .route("/bookings/:id", get(handlers::get_booking_admin))
        .route("/bookings/:id/status", put(handlers::update_booking_status))
        .route("/bookings/:id", delete(handlers::delete_booking))
        // Clients
        .route("/clients", get(handlers::list_clients))
        .route("/clients", post(handlers::create_client))
        .route("/clients/lookup", get(handlers::lookup_document))
        .route("/clients/:id", put(handlers::update_client))
        .route("/clients/:id", delete(handlers::delete_client))
        // Tours
        .route("/tours", get(handlers::list_tours_admin))
        .route("/tours", post(handlers::create_tour))
        .route("/tours/:id", put(handlers::update_tour))
        .route("/tours/:id", delete(handlers::delete_tour))
        // Gallery
        .route("/gallery", post(handlers::create_gallery_image))
        .route("/gallery/:id", delete(handlers::delete_gallery_image))
        // Testimonials
        .route("/testimonials", post(handlers::create_testimonial))
        .route("/testimonials/:id", delete(handlers::delete_testimonial))
        .merge(admin_role_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_user,
        ));

    let api_routes = public_routes.nest("/admin", admin_routes);

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .route("/health", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::maintenance_mode,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Production CORS is credentialed (the back office sends session cookies),
/// so methods and headers must be listed explicitly: tower-http refuses
/// wildcards next to `Allow-Credentials: true` and panics on the first
/// preflight otherwise.
fn build_cors(is_production: bool, cors_origins: &[String]) -> CorsLayer {
    if is_production {
        CorsLayer::new()
            .allow_origin(
                cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
    } else {
        CorsLayer::permissive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/tours")
            .header("origin", origin)
            .header("access-control-request-method", "GET")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_production_cors_preflight_with_credentials() {
        let app = Router::new()
            .route("/api/tours", get(|| async { "[]" }))
            .layer(build_cors(true, &["https://andaraytours.pe".to_string()]));

        let response = app
            .oneshot(preflight("https://andaraytours.pe"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("https://andaraytours.pe")
        );
        assert_eq!(
            headers
                .get("access-control-allow-credentials")
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_production_cors_rejects_unlisted_origin() {
        let app = Router::new()
            .route("/api/tours", get(|| async { "[]" }))
            .layer(build_cors(true, &["https://andaraytours.pe".to_string()]));

        let response = app.oneshot(preflight("https://evil.example")).await.unwrap();

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
