use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::app::AppState;
use crate::authz::{ensure_can, Action, Policy, Role, SubjectType};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::pagination::{Page, Pagination};
use crate::models::review::{
    Review, ReviewCreateRequest, ReviewListQuery, ReviewUpdateRequest, MAX_RATING, MIN_RATING,
};
use crate::routes::products::fetch_product;
use crate::utils::utc_now;

const REVIEW_COLUMNS: &str =
    "id, user_id, product_id, rating, comment, is_verified, created_at, updated_at";

pub const ADMIN_ONLY: Policy = Policy::roles(&[Role::Admin]);
pub const CREATE_REVIEWS: Policy = Policy::checks(&[|ability| ability.can(Action::Create, SubjectType::Review)]);
pub const READ_REVIEWS: Policy = Policy::checks(&[|ability| ability.can(Action::Read, SubjectType::Review)]);
pub const UPDATE_REVIEWS: Policy = Policy::checks(&[|ability| ability.can(Action::Update, SubjectType::Review)]);
pub const DELETE_REVIEWS: Policy = Policy::checks(&[|ability| ability.can(Action::Delete, SubjectType::Review)]);

#[utoipa::path(
    get,
    path = "/reviews",
    tag = "Reviews",
    params(ReviewListQuery),
    responses(
        (status = 200, description = "Paginated reviews", body = crate::models::pagination::ReviewPage),
        (status = 403, description = "Admin only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewListQuery>,
) -> AppResult<Json<Page<Review>>> {
    let pagination = Pagination::new(query.page, query.limit);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM reviews");
    push_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&state.pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {REVIEW_COLUMNS} FROM reviews"));
    push_filters(&mut select, &query);
    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let reviews = select.build_query_as::<Review>().fetch_all(&state.pool).await?;

    Ok(Json(Page::new(reviews, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/reviews",
    tag = "Reviews",
    request_body = ReviewCreateRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ReviewCreateRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    validate_rating(payload.rating)?;
    let product = fetch_product(&state.pool, payload.product_id).await?;
    let now = utc_now();

    // The author is always the caller, never taken from the payload
    let review_id = sqlx::query(
        "INSERT INTO reviews (user_id, product_id, rating, comment, is_verified, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(product.id)
    .bind(payload.rating)
    .bind(&payload.comment)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let review = fetch_review(&state.pool, review_id).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/reviews/{id}",
    tag = "Reviews",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review detail", body = Review),
        (status = 404, description = "Review not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_review(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Review>> {
    let review = fetch_review(&state.pool, id).await?;
    Ok(Json(review))
}

#[utoipa::path(
    patch,
    path = "/reviews/{id}",
    tag = "Reviews",
    params(("id" = i64, Path, description = "Review id")),
    request_body = ReviewUpdateRequest,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 403, description = "Not the author of this review"),
        (status = 404, description = "Review not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ReviewUpdateRequest>,
) -> AppResult<Json<Review>> {
    let mut review = fetch_review(&state.pool, id).await?;
    ensure_can(&auth.ability(), Action::Update, &review)?;

    if let Some(rating) = payload.rating {
        validate_rating(rating)?;
        review.rating = rating;
    }
    if payload.comment.is_some() {
        review.comment = payload.comment.clone();
    }

    let now = utc_now();

    sqlx::query("UPDATE reviews SET rating = ?, comment = ?, updated_at = ? WHERE id = ?")
        .bind(review.rating)
        .bind(&review.comment)
        .bind(now)
        .bind(review.id)
        .execute(&state.pool)
        .await?;

    review.updated_at = now;

    Ok(Json(review))
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "Reviews",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author of this review"),
        (status = 404, description = "Review not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let review = fetch_review(&state.pool, id).await?;
    ensure_can(&auth.ability(), Action::Delete, &review)?;

    sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(review.id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_review(pool: &SqlitePool, id: i64) -> AppResult<Review> {
    let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?");
    sqlx::query_as::<_, Review>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("review not found"))
}

fn validate_rating(rating: i64) -> AppResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::bad_request(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ReviewListQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(product_id) = query.product_id {
        builder.push(" AND product_id = ").push_bind(product_id);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
}
