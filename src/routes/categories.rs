use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::app::AppState;
use crate::authz::{Policy, Role};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::category::{
    Category, CategoryCreateRequest, CategoryListQuery, CategorySortBy, CategoryUpdateRequest,
};
use crate::models::pagination::{Page, Pagination, SortOrder};
use crate::utils::{like_pattern, require_non_empty, utc_now, LIKE_ESCAPE};

const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";

pub const CATEGORY_STAFF: Policy = Policy::roles(&[Role::Admin, Role::Staff]);

#[utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    params(CategoryListQuery),
    responses(
        (status = 200, description = "Paginated categories", body = crate::models::pagination::CategoryPage)
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryListQuery>,
) -> AppResult<Json<Page<Category>>> {
    let pagination = Pagination::new(query.page, query.limit);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM categories");
    push_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&state.pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {CATEGORY_COLUMNS} FROM categories"));
    push_filters(&mut select, &query);
    let column = query.sort_by.map_or("name", CategorySortBy::column);
    select
        .push(query.sort_order.unwrap_or(SortOrder::Asc).clause(column))
        .push(" LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let categories = select.build_query_as::<Category>().fetch_all(&state.pool).await?;

    Ok(Json(Page::new(categories, total, pagination)))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "Categories",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category detail", body = Category),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Category>> {
    let category = fetch_category(&state.pool, id).await?;
    Ok(Json(category))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "Categories",
    request_body = CategoryCreateRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 403, description = "Admin or staff only"),
        (status = 409, description = "Name already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CategoryCreateRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    require_non_empty("name", &payload.name)?;
    let name = payload.name.trim();
    ensure_name_available(&state.pool, name, None).await?;
    let now = utc_now();

    let category_id = sqlx::query(
        "INSERT INTO categories (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(&payload.description)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    tracing::info!(category_id, created_by = auth.user_id, "category created");

    let category = fetch_category(&state.pool, category_id).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    patch,
    path = "/categories/{id}",
    tag = "Categories",
    params(("id" = i64, Path, description = "Category id")),
    request_body = CategoryUpdateRequest,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 403, description = "Admin or staff only"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Name already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryUpdateRequest>,
) -> AppResult<Json<Category>> {
    let mut category = fetch_category(&state.pool, id).await?;

    if let Some(name) = payload.name.as_ref() {
        require_non_empty("name", name)?;
        ensure_name_available(&state.pool, name.trim(), Some(category.id)).await?;
        category.name = name.trim().to_string();
    }
    if payload.description.is_some() {
        category.description = payload.description.clone();
    }

    let now = utc_now();

    sqlx::query("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&category.name)
        .bind(&category.description)
        .bind(now)
        .bind(category.id)
        .execute(&state.pool)
        .await?;

    category.updated_at = now;

    Ok(Json(category))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "Categories",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Admin or staff only"),
        (status = 404, description = "Category not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let category = fetch_category(&state.pool, id).await?;

    // products fall back to uncategorized through ON DELETE SET NULL
    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(category.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(category_id = category.id, deleted_by = auth.user_id, "category deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_category(pool: &SqlitePool, id: i64) -> AppResult<Category> {
    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?");
    sqlx::query_as::<_, Category>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("category not found"))
}

async fn ensure_name_available(pool: &SqlitePool, name: &str, except: Option<i64>) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM categories WHERE name = ? AND id != ?")
        .bind(name)
        .bind(except.unwrap_or(0))
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("category name already in use"));
    }

    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &CategoryListQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder
            .push(" AND name LIKE ")
            .push_bind(like_pattern(search))
            .push(LIKE_ESCAPE);
    }
}
