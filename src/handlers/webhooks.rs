//! Payment gateway webhook handler
//!
//! The gateway delivers notifications at-least-once, in any order, through
//! two conventions (query params or JSON body). The payload is only used to
//! learn which transaction to re-check; the authoritative status always comes
//! from a fresh gateway lookup. The endpoint answers 200 unconditionally so
//! the gateway never enters a retry storm over our internal errors.

use crate::models::Booking;
use crate::notifications;
use crate::payments::{extract_payment_id, PROVIDER_NAME};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::AppState;

/// Handle a Mercado Pago payment notification (IPN/webhook).
pub async fn mercadopago_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> impl IntoResponse {
    let body_json = serde_json::from_str::<Value>(&body).ok();

    let Some(payment_id) = extract_payment_id(&params, body_json.as_ref()) else {
        // Not a payment event, or no transaction id: nothing to do
        return ok_response();
    };

    tracing::info!("Webhook received for payment {}", payment_id);

    // Re-query the gateway; the webhook body is never trusted for status
    let payment = match state.mercadopago.get_payment(&payment_id).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to verify payment {}: {}", payment_id, e);
            return ok_response();
        }
    };

    if !payment.is_approved() {
        tracing::info!(
            "Payment {} has status '{}', no booking transition",
            payment_id,
            payment.status
        );
        return ok_response();
    }

    let booking_id = match payment
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r).ok())
    {
        Some(id) => id,
        None => {
            tracing::error!(
                "Approved payment {} carries no usable external reference",
                payment_id
            );
            return ok_response();
        }
    };

    // Single-row idempotent transition: only a pending booking moves to
    // confirmed, so duplicate deliveries are no-ops and trigger no second
    // email.
    let transitioned = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings
        SET status = 'confirmed',
            payment_status = 'approved',
            payment_id = $1,
            payment_provider = $2,
            updated_at = NOW()
        WHERE id = $3 AND status = 'pending_payment'
        RETURNING *
        "#,
    )
    .bind(&payment_id)
    .bind(PROVIDER_NAME)
    .bind(booking_id)
    .fetch_optional(&state.pool)
    .await;

    match transitioned {
        Ok(Some(booking)) => {
            tracing::info!(
                "Booking {} confirmed via payment {}",
                booking.booking_code,
                payment.id
            );

            // Best-effort notification, queued after the write commits. Its
            // failures stay in its own error channel and never reach the
            // gateway's response.
            let mailer = state.mailer.clone();
            let public_base_url = state.public_base_url.clone();
            let email_owner = state.email_owner.clone();
            tokio::spawn(async move {
                notifications::send_booking_confirmation(
                    &mailer,
                    &booking,
                    &public_base_url,
                    &email_owner,
                )
                .await;
            });
        }
        Ok(None) => {
            tracing::info!(
                "Booking {} already confirmed or not found; webhook is a no-op",
                booking_id
            );
        }
        Err(e) => {
            tracing::error!("Failed to confirm booking {}: {}", booking_id, e);
        }
    }

    ok_response()
}

fn ok_response() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
