//! Catalog handlers: tours, gallery, testimonials, and the settings singleton
//!
//! Public endpoints are read-only; the admin endpoints each perform one store
//! write followed by a best-effort revalidation signal to the rendering layer.

use crate::models::*;
use crate::validation::slugify;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use super::AppState;

/// Attempts at a unique slug before giving up with a conflict error.
const SLUG_ATTEMPTS: u32 = 5;

// =============================================================================
// Public Endpoints
// =============================================================================

/// List active tours for the storefront
pub async fn list_tours(State(state): State<AppState>) -> impl IntoResponse {
    let tours = sqlx::query_as::<_, Tour>(
        "SELECT * FROM tours WHERE is_active = true ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await;

    match tours {
        Ok(tours) => (StatusCode::OK, Json(ApiResponse::success(tours))),
        Err(e) => {
            tracing::error!("Database error listing tours: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Get one active tour by slug
pub async fn get_tour_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let tour =
        sqlx::query_as::<_, Tour>("SELECT * FROM tours WHERE slug = $1 AND is_active = true")
            .bind(&slug)
            .fetch_optional(&state.pool)
            .await;

    match tour {
        Ok(Some(tour)) => (StatusCode::OK, Json(ApiResponse::success(tour))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Tour not found")),
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

/// List gallery images for the storefront
pub async fn list_gallery(State(state): State<AppState>) -> impl IntoResponse {
    let images = sqlx::query_as::<_, GalleryImage>(
        "SELECT * FROM gallery_images ORDER BY sort_order, created_at",
    )
    .fetch_all(&state.pool)
    .await;

    match images {
        Ok(images) => (StatusCode::OK, Json(ApiResponse::success(images))),
        Err(e) => {
            tracing::error!("Database error listing gallery: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// List testimonials for the storefront
pub async fn list_testimonials(State(state): State<AppState>) -> impl IntoResponse {
    let testimonials =
        sqlx::query_as::<_, Testimonial>("SELECT * FROM testimonials ORDER BY created_at DESC")
            .fetch_all(&state.pool)
            .await;

    match testimonials {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::success(items))),
        Err(e) => {
            tracing::error!("Database error listing testimonials: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Read the settings singleton. Re-read on every request; the store is the
/// only cache.
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    let settings = sqlx::query_as::<_, Settings>("SELECT * FROM settings WHERE id = 1")
        .fetch_optional(&state.pool)
        .await;

    match settings {
        Ok(Some(settings)) => (StatusCode::OK, Json(ApiResponse::success(settings))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Settings not initialized")),
        ),
        Err(e) => {
            tracing::error!("Database error reading settings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

// =============================================================================
// Admin: Tours
// =============================================================================

/// List all tours, including inactive ones (admin)
pub async fn list_tours_admin(
    State(state): State<AppState>,
    Extension(_user): Extension<Profile>,
) -> impl IntoResponse {
    let tours = sqlx::query_as::<_, Tour>("SELECT * FROM tours ORDER BY created_at DESC")
        .fetch_all(&state.pool)
        .await;

    match tours {
        Ok(tours) => (StatusCode::OK, Json(ApiResponse::success(tours))),
        Err(e) => {
            tracing::error!("Database error listing tours: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Create a tour (admin). The slug is derived from the title here, on create
/// only; later retitles keep the original slug.
pub async fn create_tour(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Json(input): Json<CreateTour>,
) -> impl IntoResponse {
    if input.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Tour>::error("Title is required")),
        );
    }
    if input.price <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Price must be positive")),
        );
    }

    let base_slug = slugify(input.title.trim());
    if base_slug.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Title must contain letters or digits")),
        );
    }

    for attempt in 0..SLUG_ATTEMPTS {
        let slug = slug_candidate(&base_slug, attempt);

        let result = sqlx::query_as::<_, Tour>(
            r#"
            INSERT INTO tours (
                slug, title, category, price, summary, description, duration,
                group_size, schedule, time_slots, itinerary_enabled, itinerary,
                details_enabled, details, image_url, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&slug)
        .bind(input.title.trim())
        .bind(&input.category)
        .bind(input.price)
        .bind(&input.summary)
        .bind(&input.description)
        .bind(&input.duration)
        .bind(&input.group_size)
        .bind(&input.schedule)
        .bind(input.time_slots.clone().unwrap_or_default())
        .bind(input.itinerary_enabled.unwrap_or(false))
        .bind(input.itinerary.clone().unwrap_or_default())
        .bind(input.details_enabled.unwrap_or(false))
        .bind(input.details.clone().unwrap_or_default())
        .bind(&input.image_url)
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&state.pool)
        .await;

        match result {
            Ok(tour) => {
                tracing::info!("User {} created tour '{}' ({})", user.username, tour.title, tour.slug);
                state.queue_revalidate("/tours");
                return (StatusCode::CREATED, Json(ApiResponse::success(tour)));
            }
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => {
                tracing::error!("Failed to create tour: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error("Failed to create tour")),
                );
            }
        }
    }

    (
        StatusCode::CONFLICT,
        Json(ApiResponse::error("A tour with a similar title already exists")),
    )
}

/// Update a tour (admin). Never touches the slug.
pub async fn update_tour(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTour>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Tour>(
        r#"
        UPDATE tours SET
            title = COALESCE($1, title),
            category = COALESCE($2, category),
            price = COALESCE($3, price),
            summary = COALESCE($4, summary),
            description = COALESCE($5, description),
            duration = COALESCE($6, duration),
            group_size = COALESCE($7, group_size),
            schedule = COALESCE($8, schedule),
            time_slots = COALESCE($9, time_slots),
            itinerary_enabled = COALESCE($10, itinerary_enabled),
            itinerary = COALESCE($11, itinerary),
            details_enabled = COALESCE($12, details_enabled),
            details = COALESCE($13, details),
            image_url = COALESCE($14, image_url),
            is_active = COALESCE($15, is_active),
            updated_at = NOW()
        WHERE id = $16
        RETURNING *
        "#,
    )
    .bind(&input.title)
    .bind(&input.category)
    .bind(input.price)
    .bind(&input.summary)
    .bind(&input.description)
    .bind(&input.duration)
    .bind(&input.group_size)
    .bind(&input.schedule)
    .bind(&input.time_slots)
    .bind(input.itinerary_enabled)
    .bind(&input.itinerary)
    .bind(input.details_enabled)
    .bind(&input.details)
    .bind(&input.image_url)
    .bind(input.is_active)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(tour)) => {
            tracing::info!("User {} updated tour {}", user.username, id);
            state.queue_revalidate("/tours");
            (StatusCode::OK, Json(ApiResponse::success(tour)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Tour not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update tour: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update tour")),
            )
        }
    }
}

/// Delete a tour (admin). Existing bookings keep their snapshot fields; the
/// foreign key is set to null by the store.
pub async fn delete_tour(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query("DELETE FROM tours WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => {
            tracing::info!("User {} deleted tour {}", user.username, id);
            state.queue_revalidate("/tours");
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Tour not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete tour: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete tour")),
            )
        }
    }
}

// =============================================================================
// Admin: Gallery
// =============================================================================

pub async fn create_gallery_image(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Json(input): Json<CreateGalleryImage>,
) -> impl IntoResponse {
    if input.image_url.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<GalleryImage>::error("Image URL is required")),
        );
    }

    let result = sqlx::query_as::<_, GalleryImage>(
        r#"
        INSERT INTO gallery_images (title, image_url, sort_order)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&input.title)
    .bind(input.image_url.trim())
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(image) => {
            tracing::info!("User {} added gallery image {}", user.username, image.id);
            state.queue_revalidate("/gallery");
            (StatusCode::CREATED, Json(ApiResponse::success(image)))
        }
        Err(e) => {
            tracing::error!("Failed to add gallery image: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to add gallery image")),
            )
        }
    }
}

pub async fn delete_gallery_image(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query("DELETE FROM gallery_images WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => {
            tracing::info!("User {} deleted gallery image {}", user.username, id);
            state.queue_revalidate("/gallery");
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Image not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete gallery image: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete image")),
            )
        }
    }
}

// =============================================================================
// Admin: Testimonials
// =============================================================================

pub async fn create_testimonial(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Json(input): Json<CreateTestimonial>,
) -> impl IntoResponse {
    if input.author_name.trim().is_empty() || input.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Testimonial>::error(
                "Author and content are required",
            )),
        );
    }
    if !(1..=5).contains(&input.rating) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Rating must be between 1 and 5")),
        );
    }

    let result = sqlx::query_as::<_, Testimonial>(
        r#"
        INSERT INTO testimonials (author_name, content, rating)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(input.author_name.trim())
    .bind(input.content.trim())
    .bind(input.rating)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(testimonial) => {
            tracing::info!("User {} added testimonial {}", user.username, testimonial.id);
            state.queue_revalidate("/");
            (StatusCode::CREATED, Json(ApiResponse::success(testimonial)))
        }
        Err(e) => {
            tracing::error!("Failed to add testimonial: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to add testimonial")),
            )
        }
    }
}

pub async fn delete_testimonial(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query("DELETE FROM testimonials WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => {
            tracing::info!("User {} deleted testimonial {}", user.username, id);
            state.queue_revalidate("/");
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Testimonial not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete testimonial: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete testimonial")),
            )
        }
    }
}

// =============================================================================
// Admin: Settings
// =============================================================================

/// Update the settings singleton (admin role only; enforced by routing).
/// Concurrent edits are last-write-wins, as with every other row.
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<Profile>,
    Json(input): Json<UpdateSettings>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Settings>(
        r#"
        UPDATE settings SET
            contact_phone = COALESCE($1, contact_phone),
            contact_email = COALESCE($2, contact_email),
            whatsapp_number = COALESCE($3, whatsapp_number),
            instagram_handle = COALESCE($4, instagram_handle),
            facebook_url = COALESCE($5, facebook_url),
            hero_media_url = COALESCE($6, hero_media_url),
            updated_at = NOW()
        WHERE id = 1
        RETURNING *
        "#,
    )
    .bind(&input.contact_phone)
    .bind(&input.contact_email)
    .bind(&input.whatsapp_number)
    .bind(&input.instagram_handle)
    .bind(&input.facebook_url)
    .bind(&input.hero_media_url)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(settings)) => {
            tracing::info!("User {} updated settings", user.username);
            state.queue_revalidate("/");
            (StatusCode::OK, Json(ApiResponse::success(settings)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Settings not initialized")),
        ),
        Err(e) => {
            tracing::error!("Failed to update settings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update settings")),
            )
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt + 1)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e.as_database_error().map(|db| db.kind()),
        Some(sqlx::error::ErrorKind::UniqueViolation)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_candidates() {
        assert_eq!(slug_candidate("valle-sagrado", 0), "valle-sagrado");
        assert_eq!(slug_candidate("valle-sagrado", 1), "valle-sagrado-2");
        assert_eq!(slug_candidate("valle-sagrado", 4), "valle-sagrado-5");
    }
}
