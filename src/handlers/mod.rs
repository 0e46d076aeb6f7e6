//! HTTP request handlers

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod middleware;
pub mod webhooks;

pub use admin::*;
pub use auth::*;
pub use bookings::*;
pub use catalog::*;
pub use webhooks::*;

use crate::notifications::Mailer;
use crate::payments::MercadoPago;
use sqlx::PgPool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub mercadopago: MercadoPago,
    pub mailer: Mailer,
    /// Bare client for revalidation signals and the document-lookup proxy
    pub http: reqwest::Client,
    pub public_base_url: String,
    pub email_owner: String,
    pub document_lookup_token: Option<String>,
    pub revalidate_url: Option<String>,
    pub session_expiry_hours: i64,
    pub maintenance_mode: bool,
    pub is_production: bool,
}

impl AppState {
    /// Queue a best-effort cache-invalidation signal for the rendering layer.
    /// Runs after the store write; failures are logged inside and never
    /// surface to the admin response.
    pub fn queue_revalidate(&self, path: &str) {
        let http = self.http.clone();
        let url = self.revalidate_url.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            crate::notifications::signal_revalidate(&http, url.as_deref(), &path).await;
        });
    }
}
