//! Data models for the application

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Dni,
    Ce,
    Pasaporte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "client_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClientSource {
    Web,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Worker,
}

// =============================================================================
// Booking
// =============================================================================

/// One reservation attempt. Tour title/date/time/pax are snapshotted at
/// creation time and never re-derived, so historical bookings survive later
/// tour edits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub booking_code: String,
    pub tour_id: Option<Uuid>,
    pub tour_title: String,
    pub tour_date: NaiveDate,
    pub tour_time: String,
    pub pax: i32,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub total_price: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub payment_provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw booking intake form as submitted. Price is deliberately absent: the
/// total is always recomputed from the stored tour price.
#[derive(Debug, Clone, Default)]
pub struct BookingForm {
    pub tour_id: String,
    pub date: String,
    pub time: String,
    pub pax: String,
    pub first_name: String,
    pub last_name: String,
    pub document_type: String,
    pub document_number: String,
    pub email: String,
    pub phone: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingIntakeResponse {
    pub booking_id: Uuid,
    pub booking_code: String,
    pub total_price: f64,
    pub checkout_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResponse {
    pub booking_code: String,
    pub tour_title: String,
    pub tour_date: NaiveDate,
    pub tour_time: String,
    pub pax: i32,
    pub client_name: String,
    pub status: BookingStatus,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoucherResponse {
    pub booking_code: String,
    pub tour_title: String,
    pub tour_date: NaiveDate,
    pub tour_time: String,
    pub pax: i32,
    pub total_price: f64,
    pub client_name: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// URL the voucher's scannable code encodes; points at the public
    /// verification page for this booking.
    pub verification_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
}

// =============================================================================
// Client
// =============================================================================

/// Deduplicated customer identity, keyed by (document_type, document_number).
/// Contact fields are refreshed in place on repeat bookings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub document_type: DocumentType,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: Option<String>,
    pub notes: Option<String>,
    pub source: ClientSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    pub document_type: DocumentType,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateClient {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Tour
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tour {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub category: Option<String>,
    pub price: f64,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub group_size: Option<String>,
    pub schedule: Option<String>,
    pub time_slots: Vec<String>,
    pub itinerary_enabled: bool,
    pub itinerary: Vec<String>,
    pub details_enabled: bool,
    pub details: Vec<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTour {
    pub title: String,
    pub category: Option<String>,
    pub price: f64,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub group_size: Option<String>,
    pub schedule: Option<String>,
    pub time_slots: Option<Vec<String>>,
    pub itinerary_enabled: Option<bool>,
    pub itinerary: Option<Vec<String>>,
    pub details_enabled: Option<bool>,
    pub details: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Tour update. Title changes do not regenerate the slug, so existing links
/// keep working.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTour {
    pub title: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub group_size: Option<String>,
    pub schedule: Option<String>,
    pub time_slots: Option<Vec<String>>,
    pub itinerary_enabled: Option<bool>,
    pub itinerary: Option<Vec<String>>,
    pub details_enabled: Option<bool>,
    pub details: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Gallery / Testimonials
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GalleryImage {
    pub id: Uuid,
    pub title: Option<String>,
    pub image_url: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGalleryImage {
    pub title: Option<String>,
    pub image_url: String,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Testimonial {
    pub id: Uuid,
    pub author_name: String,
    pub content: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTestimonial {
    pub author_name: String,
    pub content: String,
    pub rating: i32,
}

// =============================================================================
// Profile (back-office user)
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            username: p.username,
            email: p.email,
            display_name: p.display_name,
            role: p.role,
            is_active: p.is_active,
            last_login_at: p.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfile {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfile {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct Session {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// Settings (singleton row, id = 1)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settings {
    pub id: i32,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub whatsapp_number: Option<String>,
    pub instagram_handle: Option<String>,
    pub facebook_url: Option<String>,
    pub hero_media_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettings {
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub whatsapp_number: Option<String>,
    pub instagram_handle: Option<String>,
    pub facebook_url: Option<String>,
    pub hero_media_url: Option<String>,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<std::collections::BTreeMap<String, String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            field_errors: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            field_errors: None,
        }
    }

    pub fn invalid(fields: std::collections::BTreeMap<String, String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some("Validation failed".to_string()),
            field_errors: Some(fields),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}
