//! Mercado Pago integration: hosted-checkout preferences, authoritative
//! payment lookup, and the commission gross-up applied to checkout amounts.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Fixed fee the gateway charges per transaction, in PEN.
pub const GATEWAY_FIXED_FEE: f64 = 1.50;

/// Percentage rate the gateway deducts from the charged amount.
pub const GATEWAY_RATE: f64 = 0.045;

pub const PROVIDER_NAME: &str = "mercadopago";

const DEFAULT_API_BASE: &str = "https://api.mercadopago.com";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway returned status {status}: {body}")]
    Gateway { status: u16, body: String },
}

/// Gross up a merchant amount so that after the gateway deducts its
/// percentage-plus-fixed commission, the merchant nets exactly `base`:
/// charged = (base + F) / (1 - r), rounded to cents.
pub fn gross_up(base: f64, fixed_fee: f64, rate: f64) -> f64 {
    round_cents((base + fixed_fee) / (1.0 - rate))
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// =============================================================================
// Webhook payload extraction
// =============================================================================

/// Pull the payment transaction id out of a gateway notification. The gateway
/// uses two conventions depending on notification type: query parameters
/// (`topic`/`type` + `id`) or a JSON body (`{type|topic, data: {id}}`).
/// Returns the id only when the topic indicates a payment event; the payload
/// is never trusted for anything beyond which transaction to re-check.
pub fn extract_payment_id(
    params: &std::collections::HashMap<String, String>,
    body: Option<&serde_json::Value>,
) -> Option<String> {
    let topic = params
        .get("topic")
        .or_else(|| params.get("type"))
        .cloned()
        .or_else(|| {
            body.and_then(|b| {
                b.get("type")
                    .or_else(|| b.get("topic"))
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
        })?;

    if topic != "payment" {
        return None;
    }

    if let Some(id) = params.get("id").or_else(|| params.get("data.id")) {
        if !id.is_empty() {
            return Some(id.clone());
        }
    }

    body.and_then(|b| b.get("data"))
        .and_then(|d| d.get("id"))
        .and_then(|id| match id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

// =============================================================================
// REST client
// =============================================================================

/// Thin client over the Mercado Pago REST API.
#[derive(Clone)]
pub struct MercadoPago {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct PreferenceItem {
    title: String,
    quantity: u32,
    currency_id: String,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Debug, Serialize)]
struct ExcludedPaymentType {
    id: String,
}

#[derive(Debug, Serialize)]
struct PaymentMethods {
    excluded_payment_types: Vec<ExcludedPaymentType>,
    installments: u32,
}

#[derive(Debug, Serialize)]
struct PreferencePayload {
    items: Vec<PreferenceItem>,
    external_reference: String,
    back_urls: BackUrls,
    notification_url: String,
    payment_methods: PaymentMethods,
    auto_return: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutPreference {
    pub id: String,
    /// Hosted checkout URL the browser is redirected to.
    pub init_point: String,
}

/// Authoritative payment record as returned by GET /v1/payments/{id}.
#[derive(Debug, Deserialize)]
pub struct PaymentInfo {
    pub id: i64,
    pub status: String,
    pub external_reference: Option<String>,
}

impl PaymentInfo {
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

impl MercadoPago {
    pub fn new(http: reqwest::Client, access_token: String) -> Self {
        Self {
            http,
            access_token,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    /// Create a hosted-checkout preference for a booking. The single line
    /// item carries the grossed-up amount; the booking id rides along as the
    /// gateway's external reference so the webhook can find it again.
    pub async fn create_preference(
        &self,
        booking_id: Uuid,
        tour_title: &str,
        charged_amount: f64,
        public_base_url: &str,
    ) -> Result<CheckoutPreference, PaymentError> {
        let payload = PreferencePayload {
            items: vec![PreferenceItem {
                title: tour_title.to_string(),
                quantity: 1,
                currency_id: "PEN".to_string(),
                unit_price: charged_amount,
            }],
            external_reference: booking_id.to_string(),
            back_urls: BackUrls {
                success: format!("{}/booking/success", public_base_url),
                failure: format!("{}/booking/failure", public_base_url),
                pending: format!("{}/booking/pending", public_base_url),
            },
            notification_url: format!("{}/api/webhooks/mercadopago", public_base_url),
            payment_methods: PaymentMethods {
                // Deferred/cash methods would leave bookings pending for days.
                excluded_payment_types: vec![
                    ExcludedPaymentType {
                        id: "ticket".to_string(),
                    },
                    ExcludedPaymentType {
                        id: "atm".to_string(),
                    },
                ],
                installments: 1,
            },
            auto_return: "approved".to_string(),
        };

        let response = self
            .http
            .post(format!("{}/checkout/preferences", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway { status, body });
        }

        Ok(response.json::<CheckoutPreference>().await?)
    }

    /// Re-query the gateway for the authoritative status of a transaction.
    /// This is the sole source of truth for payment state.
    pub async fn get_payment(&self, payment_id: &str) -> Result<PaymentInfo, PaymentError> {
        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.api_base, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway { status, body });
        }

        Ok(response.json::<PaymentInfo>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_gross_up_nets_base_after_commission() {
        for base in [1.0, 50.0, 200.0, 999.99, 12345.67] {
            let charged = gross_up(base, GATEWAY_FIXED_FEE, GATEWAY_RATE);
            let net = charged * (1.0 - GATEWAY_RATE) - GATEWAY_FIXED_FEE;
            // Cent rounding on the charged amount bounds the error at half a
            // cent of merchant take.
            assert!(
                (net - base).abs() < 0.01,
                "base {} -> charged {} -> net {}",
                base,
                charged,
                net
            );
        }
    }

    #[test]
    fn test_gross_up_reference_figure() {
        // Tour at 100.00 x 2 pax: 201.50 / 0.955
        let charged = gross_up(200.0, GATEWAY_FIXED_FEE, GATEWAY_RATE);
        assert!((charged - 210.99).abs() < 0.005, "charged = {}", charged);
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(210.9947), 210.99);
        assert_eq!(round_cents(210.995), 211.0);
        assert_eq!(round_cents(0.0), 0.0);
    }

    #[test]
    fn test_extract_payment_id_from_query_params() {
        let mut params = HashMap::new();
        params.insert("topic".to_string(), "payment".to_string());
        params.insert("id".to_string(), "12345".to_string());
        assert_eq!(extract_payment_id(&params, None).as_deref(), Some("12345"));
    }

    #[test]
    fn test_extract_payment_id_from_json_body() {
        let params = HashMap::new();
        let body = serde_json::json!({
            "type": "payment",
            "data": { "id": "98765" }
        });
        assert_eq!(
            extract_payment_id(&params, Some(&body)).as_deref(),
            Some("98765")
        );
    }

    #[test]
    fn test_extract_payment_id_numeric_body_id() {
        let params = HashMap::new();
        let body = serde_json::json!({
            "type": "payment",
            "data": { "id": 4242 }
        });
        assert_eq!(
            extract_payment_id(&params, Some(&body)).as_deref(),
            Some("4242")
        );
    }

    #[test]
    fn test_extract_payment_id_ignores_other_topics() {
        let mut params = HashMap::new();
        params.insert("topic".to_string(), "merchant_order".to_string());
        params.insert("id".to_string(), "555".to_string());
        assert_eq!(extract_payment_id(&params, None), None);
    }

    #[test]
    fn test_extract_payment_id_missing_id() {
        let mut params = HashMap::new();
        params.insert("type".to_string(), "payment".to_string());
        assert_eq!(extract_payment_id(&params, None), None);
    }

    #[test]
    fn test_payment_info_approved() {
        let info = PaymentInfo {
            id: 1,
            status: "approved".to_string(),
            external_reference: Some("abc".to_string()),
        };
        assert!(info.is_approved());

        let rejected = PaymentInfo {
            id: 2,
            status: "rejected".to_string(),
            external_reference: None,
        };
        assert!(!rejected.is_approved());
    }
}
