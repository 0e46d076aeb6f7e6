//! Back-office handlers: bookings, clients, users, dashboard

use crate::handlers::auth::hash_password;
use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<BookingStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListClientsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentLookupQuery {
    pub document_number: String,
}

// =============================================================================
// Bookings
// =============================================================================

/// List bookings with optional status filter and search (admin)
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Query(query): Query<ListBookingsQuery>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let (bookings, total): (Vec<Booking>, i64) = if let Some(status) = query.status {
        let items = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE status = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE status = $1")
            .bind(status)
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

        (items, count)
    } else if let Some(ref search) = query.search {
        let pattern = format!("%{}%", search);
        let items = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE booking_code ILIKE $1
               OR client_name ILIKE $1
               OR client_email ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE booking_code ILIKE $1
               OR client_name ILIKE $1
               OR client_email ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&state.pool)
        .await
        .unwrap_or(0);

        (items, count)
    } else {
        let items = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

        (items, count)
    };

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    tracing::info!(
        "User {} listed bookings (page {}, {} results)",
        user.username,
        page,
        bookings.len()
    );

    (
        StatusCode::OK,
        Json(ApiResponse::success(PaginatedResponse {
            items: bookings,
            total,
            page,
            per_page,
            total_pages,
        })),
    )
}

/// Get one booking (admin)
pub async fn get_booking_admin(
    State(state): State<AppState>,
    Extension(_user): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match super::bookings::fetch_booking(&state.pool, id).await {
        Ok(Some(booking)) => (StatusCode::OK, Json(ApiResponse::success(booking))),
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

/// Manually transition a booking (admin): confirm, mark paid, or cancel.
pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBookingStatusRequest>,
) -> impl IntoResponse {
    if input.status.is_none() && input.payment_status.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Booking>::error("Nothing to update")),
        );
    }

    let current = match super::bookings::fetch_booking(&state.pool, id).await {
        Ok(Some(b)) => b,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Booking not found")),
            );
        }
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    if let Some(requested) = input.status {
        if !status_transition_allowed(current.status, requested) {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::error(
                    "Booking cannot move to the requested status",
                )),
            );
        }
    }

    let result = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings
        SET status = COALESCE($1, status),
            payment_status = COALESCE($2, payment_status),
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(input.status)
    .bind(input.payment_status)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(booking)) => {
            tracing::info!(
                "User {} set booking {} to {:?}/{:?}",
                user.username,
                booking.booking_code,
                booking.status,
                booking.payment_status
            );
            state.queue_revalidate("/admin/bookings");
            (StatusCode::OK, Json(ApiResponse::success(booking)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Booking not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update booking status: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update booking")),
            )
        }
    }
}

/// Delete a booking (admin)
pub async fn delete_booking(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => {
            tracing::info!("User {} deleted booking {}", user.username, id);
            state.queue_revalidate("/admin/bookings");
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Booking not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete booking: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete booking")),
            )
        }
    }
}

// =============================================================================
// Clients
// =============================================================================

/// List clients with optional search (admin)
pub async fn list_clients(
    State(state): State<AppState>,
    Extension(_user): Extension<Profile>,
    Query(query): Query<ListClientsQuery>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let (clients, total): (Vec<Client>, i64) = if let Some(ref search) = query.search {
        let pattern = format!("%{}%", search);
        let items = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE first_name ILIKE $1
               OR last_name ILIKE $1
               OR document_number ILIKE $1
               OR email ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM clients
            WHERE first_name ILIKE $1
               OR last_name ILIKE $1
               OR document_number ILIKE $1
               OR email ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&state.pool)
        .await
        .unwrap_or(0);

        (items, count)
    } else {
        let items = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

        (items, count)
    };

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    (
        StatusCode::OK,
        Json(ApiResponse::success(PaginatedResponse {
            items: clients,
            total,
            page,
            per_page,
            total_pages,
        })),
    )
}

/// Create a client manually (admin); source is recorded as manual.
pub async fn create_client(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Json(input): Json<CreateClient>,
) -> impl IntoResponse {
    if let Err(e) =
        crate::validation::validate_document(input.document_type, input.document_number.trim())
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Client>::error(e.to_string())),
        );
    }

    let result = sqlx::query_as::<_, Client>(
        r#"
        INSERT INTO clients (document_type, document_number, first_name, last_name, email, phone, country, notes, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'manual')
        RETURNING *
        "#,
    )
    .bind(input.document_type)
    .bind(input.document_number.trim())
    .bind(input.first_name.trim())
    .bind(input.last_name.trim())
    .bind(input.email.trim())
    .bind(input.phone.trim())
    .bind(&input.country)
    .bind(&input.notes)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(client) => {
            tracing::info!("User {} created client {}", user.username, client.id);
            state.queue_revalidate("/admin/clients");
            (StatusCode::CREATED, Json(ApiResponse::success(client)))
        }
        Err(e) => {
            tracing::error!("Failed to create client: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(
                    "Failed to create client (document may already exist)",
                )),
            )
        }
    }
}

/// Update a client's contact fields (admin). The document key never changes.
pub async fn update_client(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateClient>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Client>(
        r#"
        UPDATE clients SET
            first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            email = COALESCE($3, email),
            phone = COALESCE($4, phone),
            country = COALESCE($5, country),
            notes = COALESCE($6, notes),
            updated_at = NOW()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.country)
    .bind(&input.notes)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(client)) => {
            tracing::info!("User {} updated client {}", user.username, id);
            state.queue_revalidate("/admin/clients");
            (StatusCode::OK, Json(ApiResponse::success(client)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Client not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update client: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update client")),
            )
        }
    }
}

/// Delete a client (admin). Clients are never deleted automatically.
pub async fn delete_client(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query("DELETE FROM clients WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => {
            tracing::info!("User {} deleted client {}", user.username, id);
            state.queue_revalidate("/admin/clients");
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Client not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete client: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete client")),
            )
        }
    }
}

/// Look up a person by document number through the external registry API.
/// Pure proxy: the provider response is passed through untouched.
pub async fn lookup_document(
    State(state): State<AppState>,
    Extension(_user): Extension<Profile>,
    Query(query): Query<DocumentLookupQuery>,
) -> impl IntoResponse {
    let Some(ref token) = state.document_lookup_token else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<serde_json::Value>::error(
                "Document lookup is not configured",
            )),
        );
    };

    let response = state
        .http
        .get("https://api.apis.net.pe/v2/reniec/dni")
        .query(&[("numero", query.document_number.as_str())])
        .bearer_auth(token)
        .send()
        .await;

    match response {
        Ok(r) if r.status().is_success() => match r.json::<serde_json::Value>().await {
            Ok(body) => (StatusCode::OK, Json(ApiResponse::success(body))),
            Err(e) => {
                tracing::error!("Document lookup returned invalid JSON: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ApiResponse::error("Lookup provider error")),
                )
            }
        },
        Ok(r) => {
            tracing::warn!("Document lookup returned status {}", r.status());
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Document not found")),
            )
        }
        Err(e) => {
            tracing::error!("Document lookup request failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error("Lookup provider unreachable")),
            )
        }
    }
}

// =============================================================================
// Users
// =============================================================================

/// List back-office users (admin role)
pub async fn list_profiles(
    State(state): State<AppState>,
    Extension(_user): Extension<Profile>,
) -> impl IntoResponse {
    let profiles = sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at")
        .fetch_all(&state.pool)
        .await;

    match profiles {
        Ok(profiles) => {
            let items: Vec<ProfileResponse> =
                profiles.into_iter().map(ProfileResponse::from).collect();
            (StatusCode::OK, Json(ApiResponse::success(items)))
        }
        Err(e) => {
            tracing::error!("Database error listing profiles: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Create a back-office user (admin role)
pub async fn create_profile(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Json(input): Json<CreateProfile>,
) -> impl IntoResponse {
    if input.username.trim().is_empty() || input.password.len() < 8 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<ProfileResponse>::error(
                "Username is required and password must be at least 8 characters",
            )),
        );
    }

    let password_hash = match hash_password(&input.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create user")),
            );
        }
    };

    let result = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (username, email, password_hash, display_name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(input.username.trim())
    .bind(input.email.trim())
    .bind(&password_hash)
    .bind(&input.display_name)
    .bind(input.role)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(profile) => {
            tracing::info!(
                "User {} created profile {} ({:?})",
                user.username,
                profile.username,
                profile.role
            );
            state.queue_revalidate("/admin/users");
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(ProfileResponse::from(profile))),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(
                    "Failed to create user (username or email may already exist)",
                )),
            )
        }
    }
}

/// Update a back-office user (admin role)
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProfile>,
) -> impl IntoResponse {
    let password_hash = match input.password.as_deref() {
        Some(p) if p.len() < 8 => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<ProfileResponse>::error(
                    "Password must be at least 8 characters",
                )),
            );
        }
        Some(p) => match hash_password(p) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!("Failed to hash password: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error("Failed to update user")),
                );
            }
        },
        None => None,
    };

    let result = sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles SET
            email = COALESCE($1, email),
            password_hash = COALESCE($2, password_hash),
            display_name = COALESCE($3, display_name),
            role = COALESCE($4, role),
            is_active = COALESCE($5, is_active)
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&input.email)
    .bind(&password_hash)
    .bind(&input.display_name)
    .bind(input.role)
    .bind(input.is_active)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(profile)) => {
            tracing::info!("User {} updated profile {}", user.username, id);
            state.queue_revalidate("/admin/users");
            (
                StatusCode::OK,
                Json(ApiResponse::success(ProfileResponse::from(profile))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update user")),
            )
        }
    }
}

/// Delete a back-office user (admin role). Self-deletion is refused.
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if user.id == id {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error("Cannot delete your own account")),
        );
    }

    let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => {
            tracing::info!("User {} deleted profile {}", user.username, id);
            state.queue_revalidate("/admin/users");
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete user")),
            )
        }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Dashboard statistics. The counts are unrelated reads, so they are issued
/// concurrently.
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    Extension(_user): Extension<Profile>,
) -> impl IntoResponse {
    let bookings_by_status = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status::text, COUNT(*) as count
        FROM bookings
        GROUP BY status
        "#,
    )
    .fetch_all(&state.pool);

    let total_clients =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients").fetch_one(&state.pool);

    let active_tours =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tours WHERE is_active = true")
            .fetch_one(&state.pool);

    let total_testimonials =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM testimonials").fetch_one(&state.pool);

    let (bookings_by_status, total_clients, active_tours, total_testimonials) = tokio::join!(
        bookings_by_status,
        total_clients,
        active_tours,
        total_testimonials
    );

    let stats_map: std::collections::HashMap<String, i64> =
        bookings_by_status.unwrap_or_default().into_iter().collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "bookings_by_status": stats_map,
            "total_clients": total_clients.unwrap_or(0),
            "active_tours": active_tours.unwrap_or(0),
            "total_testimonials": total_testimonials.unwrap_or(0)
        }))),
    )
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Manual transitions follow the booking lifecycle: a pending booking can be
/// confirmed or cancelled, a confirmed one only cancelled, and cancelled is
/// terminal. Writing the current status back is a no-op and passes.
fn status_transition_allowed(current: BookingStatus, requested: BookingStatus) -> bool {
    use BookingStatus::*;
    current == requested
        || matches!(
            (current, requested),
            (PendingPayment, Confirmed) | (PendingPayment, Cancelled) | (Confirmed, Cancelled)
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_status_transitions() {
        use BookingStatus::*;

        assert!(status_transition_allowed(PendingPayment, Confirmed));
        assert!(status_transition_allowed(PendingPayment, Cancelled));
        assert!(status_transition_allowed(Confirmed, Cancelled));
        assert!(status_transition_allowed(Confirmed, Confirmed));
        assert!(status_transition_allowed(Cancelled, Cancelled));

        // No exit from cancelled, and no walking a booking back to pending
        assert!(!status_transition_allowed(Cancelled, Confirmed));
        assert!(!status_transition_allowed(Cancelled, PendingPayment));
        assert!(!status_transition_allowed(Confirmed, PendingPayment));
    }
}
