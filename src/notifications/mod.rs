//! Outbound notifications: transactional email, WhatsApp deep links, and the
//! best-effort cache-revalidation signal sent to the rendering layer.
//!
//! Everything here is fire-and-forget from the caller's point of view. A
//! failed email or revalidation must never fail a booking or a webhook.

use crate::models::Booking;
use serde::Serialize;
use thiserror::Error;

const DEFAULT_EMAIL_API_BASE: &str = "https://api.resend.com";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email provider returned status {status}: {body}")]
    Provider { status: u16, body: String },
}

// =============================================================================
// Email
// =============================================================================

#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    api_key: String,
    from: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct SendEmailPayload<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

impl Mailer {
    pub fn new(http: reqwest::Client, api_key: String, from: String) -> Self {
        Self {
            http,
            api_key,
            from,
            api_base: DEFAULT_EMAIL_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let payload = SendEmailPayload {
            from: &self.from,
            to: vec![to],
            subject,
            html,
        };

        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Provider { status, body });
        }

        Ok(())
    }
}

/// Render the booking confirmation email. Pure so it can be tested without a
/// provider; the voucher link points at the public voucher-download page.
pub fn render_confirmation_email(booking: &Booking, public_base_url: &str) -> (String, String) {
    let subject = format!("Reserva confirmada {} - Andaray Tours", booking.booking_code);
    let voucher_url = format!("{}/voucher/{}", public_base_url, booking.id);

    let html = format!(
        "<h2>¡Tu reserva está confirmada!</h2>\
         <p>Hola {name},</p>\
         <p>Hemos recibido tu pago y tu reserva quedó confirmada.</p>\
         <ul>\
         <li><strong>Código de reserva:</strong> {code}</li>\
         <li><strong>Tour:</strong> {tour}</li>\
         <li><strong>Fecha:</strong> {date}</li>\
         <li><strong>Hora:</strong> {time}</li>\
         <li><strong>Personas:</strong> {pax}</li>\
         <li><strong>Total:</strong> S/ {total:.2}</li>\
         </ul>\
         <p><a href=\"{voucher}\">Descarga tu voucher aquí</a> y preséntalo el día del tour.</p>",
        name = booking.client_name,
        code = booking.booking_code,
        tour = booking.tour_title,
        date = booking.tour_date,
        time = booking.tour_time,
        pax = booking.pax,
        total = booking.total_price,
        voucher = voucher_url,
    );

    (subject, html)
}

/// Render the internal heads-up sent to the site owner on each confirmed
/// booking.
pub fn render_owner_email(booking: &Booking) -> (String, String) {
    let subject = format!(
        "Nueva reserva pagada: {} ({})",
        booking.booking_code, booking.tour_title
    );
    let contact_link = whatsapp_link(
        &booking.client_phone,
        &format!("Hola {}, te escribimos de Andaray Tours por tu reserva {}.",
            booking.client_name, booking.booking_code),
    );
    let html = format!(
        "<p>Reserva {code} confirmada.</p>\
         <ul>\
         <li>Tour: {tour}, {date} {time}</li>\
         <li>Cliente: {name} ({email}, {phone})</li>\
         <li>Personas: {pax}</li>\
         <li>Total: S/ {total:.2}</li>\
         </ul>\
         <p><a href=\"{wa}\">Contactar por WhatsApp</a></p>",
        code = booking.booking_code,
        tour = booking.tour_title,
        date = booking.tour_date,
        time = booking.tour_time,
        name = booking.client_name,
        email = booking.client_email,
        phone = booking.client_phone,
        pax = booking.pax,
        total = booking.total_price,
        wa = contact_link,
    );

    (subject, html)
}

/// Send the confirmation email to the customer and the heads-up to the site
/// owner. Errors are logged and swallowed: a failed email never fails the
/// caller.
pub async fn send_booking_confirmation(
    mailer: &Mailer,
    booking: &Booking,
    public_base_url: &str,
    owner: &str,
) {
    let (subject, html) = render_confirmation_email(booking, public_base_url);
    if let Err(e) = mailer.send(&booking.client_email, &subject, &html).await {
        tracing::error!(
            "Failed to send confirmation email for booking {}: {}",
            booking.booking_code,
            e
        );
    }

    let (subject, html) = render_owner_email(booking);
    if let Err(e) = mailer.send(owner, &subject, &html).await {
        tracing::error!(
            "Failed to send owner notification for booking {}: {}",
            booking.booking_code,
            e
        );
    }
}

// =============================================================================
// WhatsApp deep links
// =============================================================================

/// Build a `wa.me` deep link: digits-only phone, URL-encoded message. This is
/// a plain link handed to the browser, not a delivery-tracked channel.
pub fn whatsapp_link(phone: &str, message: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!(
        "https://wa.me/{}?text={}",
        digits,
        urlencoding::encode(message)
    )
}

// =============================================================================
// Cache revalidation
// =============================================================================

/// Ask the rendering layer to re-render a path after an admin mutation.
/// Best effort: failures are logged and swallowed.
pub async fn signal_revalidate(http: &reqwest::Client, revalidate_url: Option<&str>, path: &str) {
    let Some(url) = revalidate_url else {
        return;
    };

    let result = http
        .post(url)
        .json(&serde_json::json!({ "path": path }))
        .send()
        .await;

    match result {
        Ok(response) if !response.status().is_success() => {
            tracing::warn!(
                "Revalidation of {} returned status {}",
                path,
                response.status()
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("Revalidation of {} failed: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, PaymentStatus};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn confirmed_booking() -> Booking {
        Booking {
            id: Uuid::nil(),
            booking_code: "BO-4821".to_string(),
            tour_id: None,
            tour_title: "Valle Sagrado Full Day".to_string(),
            tour_date: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
            tour_time: "09:00".to_string(),
            pax: 2,
            client_id: None,
            client_name: "Rosa Quispe".to_string(),
            client_email: "rosa@example.com".to_string(),
            client_phone: "+51 984 123 456".to_string(),
            total_price: 200.0,
            status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Approved,
            payment_id: Some("12345".to_string()),
            payment_provider: Some("mercadopago".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_confirmation_email_contents() {
        let booking = confirmed_booking();
        let (subject, html) = render_confirmation_email(&booking, "https://andaraytours.pe");

        assert!(subject.contains("BO-4821"));
        assert!(html.contains("Valle Sagrado Full Day"));
        assert!(html.contains("2026-10-12"));
        assert!(html.contains("S/ 200.00"));
        assert!(html.contains(&format!(
            "https://andaraytours.pe/voucher/{}",
            booking.id
        )));
    }

    #[test]
    fn test_owner_email_contents() {
        let booking = confirmed_booking();
        let (subject, html) = render_owner_email(&booking);
        assert!(subject.contains("BO-4821"));
        assert!(html.contains("rosa@example.com"));
        assert!(html.contains("S/ 200.00"));
        assert!(html.contains("https://wa.me/51984123456?text="));
    }

    #[tokio::test]
    async fn test_revalidate_without_hook_is_a_noop() {
        // No hook configured: returns immediately, no request is attempted
        let http = reqwest::Client::new();
        signal_revalidate(&http, None, "/admin/bookings").await;
    }

    #[test]
    fn test_whatsapp_link_strips_non_digits() {
        let link = whatsapp_link("+51 984-123-456", "Hola, quiero reservar");
        assert!(link.starts_with("https://wa.me/51984123456?text="));
        assert!(!link.contains(' '));
        assert!(link.contains("Hola%2C%20quiero%20reservar"));
    }
}
