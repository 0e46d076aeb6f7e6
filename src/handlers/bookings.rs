//! Booking intake, verification, and voucher handlers

use crate::models::*;
use crate::payments::{gross_up, round_cents, GATEWAY_FIXED_FEE, GATEWAY_RATE};
use crate::validation::{validate_booking_form, ParsedBookingForm};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use super::AppState;

/// Literal prefix of human-facing booking codes, e.g. `BO-4821`.
pub const BOOKING_CODE_PREFIX: &str = "BO-";

/// Attempts made to find an unused booking code before giving up and using
/// the last candidate. Codes are not globally unique by contract; this just
/// keeps collisions rare at the current volume.
const BOOKING_CODE_ATTEMPTS: usize = 5;

// =============================================================================
// Booking Intake
// =============================================================================

/// Create a booking from the public reservation form (multipart/form-data).
///
/// The submitted form never carries an authoritative price: the tour is
/// re-read from the store and the total recomputed as price x pax. On
/// success the browser is handed the hosted-checkout URL; the booking row
/// stays `pending_payment` until the payment webhook verifies the charge.
pub async fn create_booking(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let form = match read_booking_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            tracing::error!("Multipart parsing error: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<BookingIntakeResponse>::error(
                    "Invalid form submission",
                )),
            );
        }
    };

    // Validate input, returning one message per failing field
    let parsed = match validate_booking_form(&form) {
        Ok(parsed) => parsed,
        Err(fields) => {
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::invalid(fields)));
        }
    };

    // Re-fetch the tour; the client-supplied title/price is never trusted
    let tour = sqlx::query_as::<_, Tour>("SELECT * FROM tours WHERE id = $1 AND is_active = true")
        .bind(parsed.tour_id)
        .fetch_optional(&state.pool)
        .await;

    let tour = match tour {
        Ok(Some(t)) => t,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Tour not found")),
            );
        }
        Err(e) => {
            tracing::error!("Database error fetching tour: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    let total_price = round_cents(tour.price * parsed.pax as f64);
    let booking_code = unique_booking_code(&state.pool).await;

    // Upsert client by document: refresh contact fields on repeat bookings
    let client = sqlx::query_as::<_, Client>(
        r#"
        INSERT INTO clients (document_type, document_number, first_name, last_name, email, phone, country, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'web')
        ON CONFLICT (document_type, document_number) DO UPDATE SET
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            email = EXCLUDED.email,
            phone = EXCLUDED.phone,
            country = COALESCE(EXCLUDED.country, clients.country),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(parsed.document_type)
    .bind(&parsed.document_number)
    .bind(&parsed.first_name)
    .bind(&parsed.last_name)
    .bind(&parsed.email)
    .bind(&parsed.phone)
    .bind(&parsed.country)
    .fetch_one(&state.pool)
    .await;

    let client = match client {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to upsert client: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create booking")),
            );
        }
    };

    // Insert the booking with tour fields snapshotted at creation time
    let booking = insert_pending_booking(&state.pool, &booking_code, &tour, &client, &parsed, total_price).await;

    let booking = match booking {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to insert booking: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create booking")),
            );
        }
    };

    // Gross up the charged amount so the merchant nets exactly the total
    let charged = gross_up(total_price, GATEWAY_FIXED_FEE, GATEWAY_RATE);

    let preference = state
        .mercadopago
        .create_preference(booking.id, &tour.title, charged, &state.public_base_url)
        .await;

    match preference {
        Ok(pref) => {
            tracing::info!(
                "Booking {} created for tour '{}' ({} pax, S/ {:.2}), preference {}",
                booking.booking_code,
                tour.title,
                parsed.pax,
                total_price,
                pref.id
            );
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(BookingIntakeResponse {
                    booking_id: booking.id,
                    booking_code: booking.booking_code,
                    total_price,
                    checkout_url: pref.init_point,
                })),
            )
        }
        Err(e) => {
            // The pending booking row is left in place; it is orphaned until
            // cleaned up manually or retried by the customer.
            tracing::error!(
                "Failed to create checkout preference for booking {}: {}",
                booking.id,
                e
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(
                    "Could not reach the payment provider. Please try again.",
                )),
            )
        }
    }
}

// =============================================================================
// Verification / Voucher
// =============================================================================

/// Public verification view for a booking. `confirmed` and `pending_payment`
/// render as valid for entry; only `cancelled` is invalid.
pub async fn verify_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let booking = fetch_booking(&state.pool, id).await;

    match booking {
        Ok(Some(booking)) => {
            let response = VerificationResponse {
                booking_code: booking.booking_code,
                tour_title: booking.tour_title,
                tour_date: booking.tour_date,
                tour_time: booking.tour_time,
                pax: booking.pax,
                client_name: booking.client_name,
                valid: is_valid_for_entry(booking.status),
                status: booking.status,
            };
            (StatusCode::OK, Json(ApiResponse::success(response)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Booking not found")),
        ),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Voucher payload for the printable confirmation document. The returned
/// verification URL is what the voucher's scannable code must encode; the
/// frontend renders the code and must not offer the download before it is
/// embedded.
pub async fn get_voucher(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let booking = fetch_booking(&state.pool, id).await;

    match booking {
        Ok(Some(booking)) => {
            let response = VoucherResponse {
                booking_code: booking.booking_code,
                tour_title: booking.tour_title,
                tour_date: booking.tour_date,
                tour_time: booking.tour_time,
                pax: booking.pax,
                total_price: booking.total_price,
                client_name: booking.client_name,
                status: booking.status,
                payment_status: booking.payment_status,
                verification_url: format!("{}/verify/{}", state.public_base_url, id),
            };
            (StatusCode::OK, Json(ApiResponse::success(response)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Booking not found")),
        ),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Entry policy for verification scans: unpaid bookings still admit (pay on
/// arrival is accepted), only cancelled bookings are turned away.
pub(crate) fn is_valid_for_entry(status: BookingStatus) -> bool {
    status != BookingStatus::Cancelled
}

pub(crate) async fn fetch_booking(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

async fn read_booking_form(mut multipart: Multipart) -> Result<BookingForm, axum::extract::multipart::MultipartError> {
    let mut form = BookingForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await?;

        match name.as_str() {
            "tour_id" => form.tour_id = value,
            "date" => form.date = value,
            "time" => form.time = value,
            "pax" => form.pax = value,
            "first_name" => form.first_name = value,
            "last_name" => form.last_name = value,
            "document_type" => form.document_type = value,
            "document_number" => form.document_number = value,
            "email" => form.email = value,
            "phone" => form.phone = value,
            "country" => form.country = Some(value),
            _ => {} // unknown fields (including any client-sent price) are dropped
        }
    }

    Ok(form)
}

async fn insert_pending_booking(
    pool: &PgPool,
    booking_code: &str,
    tour: &Tour,
    client: &Client,
    parsed: &ParsedBookingForm,
    total_price: f64,
) -> Result<Booking, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (
            booking_code, tour_id, tour_title, tour_date, tour_time, pax,
            client_id, client_name, client_email, client_phone,
            total_price, status, payment_status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending_payment', 'pending')
        RETURNING *
        "#,
    )
    .bind(booking_code)
    .bind(tour.id)
    .bind(&tour.title)
    .bind(parsed.date)
    .bind(&parsed.time)
    .bind(parsed.pax)
    .bind(client.id)
    .bind(format!("{} {}", parsed.first_name, parsed.last_name))
    .bind(&parsed.email)
    .bind(&parsed.phone)
    .bind(total_price)
    .fetch_one(pool)
    .await
}

fn generate_booking_code() -> String {
    let number = rand::thread_rng().gen_range(1000..=9999);
    format!("{}{}", BOOKING_CODE_PREFIX, number)
}

/// Pick a booking code that is not already in use. Bounded retry: after a
/// few collisions the last candidate is used anyway, matching the format's
/// no-hard-uniqueness contract.
async fn unique_booking_code(pool: &PgPool) -> String {
    let mut code = generate_booking_code();

    for _ in 0..BOOKING_CODE_ATTEMPTS {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE booking_code = $1)")
                .bind(&code)
                .fetch_one(pool)
                .await
                .unwrap_or(false);

        if !exists {
            return code;
        }
        code = generate_booking_code();
    }

    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_code_format() {
        for _ in 0..100 {
            let code = generate_booking_code();
            assert!(code.starts_with(BOOKING_CODE_PREFIX));
            let digits = &code[BOOKING_CODE_PREFIX.len()..];
            assert_eq!(digits.len(), 4);
            let n: u32 = digits.parse().expect("digits");
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_entry_validity_policy() {
        assert!(is_valid_for_entry(BookingStatus::Confirmed));
        assert!(is_valid_for_entry(BookingStatus::PendingPayment));
        assert!(!is_valid_for_entry(BookingStatus::Cancelled));
    }

    #[test]
    fn test_total_is_price_times_pax() {
        let total = round_cents(100.0 * 2.0);
        assert_eq!(total, 200.0);
        let odd = round_cents(33.33 * 3.0);
        assert_eq!(odd, 99.99);
    }
}
