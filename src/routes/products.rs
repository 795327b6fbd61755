use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{Executor, QueryBuilder, Sqlite};

use crate::app::AppState;
use crate::authz::{ensure_can, Action, Policy, Role, SubjectType};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::pagination::{Page, Pagination, SortOrder};
use crate::models::product::{Product, ProductCreateRequest, ProductListQuery, ProductUpdateRequest};
use crate::routes::categories::fetch_category;
use crate::utils::{like_pattern, require_non_empty, round_money, utc_now, LIKE_ESCAPE};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock_quantity, sku, is_active, category_id, created_at, updated_at";

pub const READ_PRODUCTS: Policy = Policy::checks(&[|ability| ability.can(Action::Read, SubjectType::Product)]);
pub const CATALOG_STAFF: Policy = Policy::roles(&[Role::Admin, Role::Staff]);
pub const DELETE_PRODUCTS: Policy = Policy::checks(&[|ability| ability.can(Action::Delete, SubjectType::Product)]);

#[utoipa::path(
    get,
    path = "/products",
    tag = "Products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Paginated products", body = crate::models::pagination::ProductPage)
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<Page<Product>>> {
    let pagination = Pagination::new(query.page, query.limit);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM products");
    push_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&state.pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
    push_filters(&mut select, &query);
    let order_by = match query.sort_by {
        Some(sort_by) => query.sort_order.unwrap_or(SortOrder::Asc).clause(sort_by.column()),
        None => query.sort_order.unwrap_or(SortOrder::Desc).clause("created_at"),
    };
    select
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let products = select.build_query_as::<Product>().fetch_all(&state.pool).await?;

    Ok(Json(Page::new(products, total, pagination)))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail", body = Product),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_product(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Product>> {
    let product = fetch_product(&state.pool, id).await?;
    Ok(Json(product))
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "Products",
    request_body = ProductCreateRequest,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 403, description = "Admin or staff only"),
        (status = 404, description = "Category not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProductCreateRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    require_non_empty("name", &payload.name)?;
    let price = validate_price(payload.price)?;
    let stock_quantity = validate_stock(payload.stock_quantity.unwrap_or(0))?;
    if let Some(category_id) = payload.category_id {
        fetch_category(&state.pool, category_id).await?;
    }
    let now = utc_now();

    let product_id = sqlx::query(
        "INSERT INTO products (name, description, price, stock_quantity, sku, is_active, category_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.name.trim())
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(price)
    .bind(stock_quantity)
    .bind(&payload.sku)
    .bind(true)
    .bind(payload.category_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    tracing::info!(product_id, created_by = auth.user_id, "product created");

    let product = fetch_product(&state.pool, product_id).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    request_body = ProductUpdateRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 403, description = "Admin or staff only"),
        (status = 404, description = "Product or category not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ProductUpdateRequest>,
) -> AppResult<Json<Product>> {
    let mut product = fetch_product(&state.pool, id).await?;
    ensure_can(&auth.ability(), Action::Update, &product)?;

    if let Some(name) = payload.name.as_ref() {
        require_non_empty("name", name)?;
        product.name = name.trim().to_string();
    }
    if let Some(description) = payload.description.as_ref() {
        product.description = description.clone();
    }
    if let Some(price) = payload.price {
        product.price = validate_price(price)?;
    }
    if let Some(stock_quantity) = payload.stock_quantity {
        product.stock_quantity = validate_stock(stock_quantity)?;
    }
    if payload.sku.is_some() {
        product.sku = payload.sku.clone();
    }
    if let Some(is_active) = payload.is_active {
        product.is_active = is_active;
    }
    if let Some(category_id) = payload.category_id {
        fetch_category(&state.pool, category_id).await?;
        product.category_id = Some(category_id);
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE products SET name = ?, description = ?, price = ?, stock_quantity = ?, sku = ?, is_active = ?, category_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.stock_quantity)
    .bind(&product.sku)
    .bind(product.is_active)
    .bind(product.category_id)
    .bind(now)
    .bind(product.id)
    .execute(&state.pool)
    .await?;

    product.updated_at = now;

    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 403, description = "Requires delete access to products"),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let product = fetch_product(&state.pool, id).await?;
    ensure_can(&auth.ability(), Action::Delete, &product)?;

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(product.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(product_id = product.id, deleted_by = auth.user_id, "product deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Works on the pool or inside a transaction (`&mut *tx`)
pub(crate) async fn fetch_product<'e, E>(executor: E, id: i64) -> AppResult<Product>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
    sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("product not found"))
}

/// Rounded to cents first; anything that rounds to zero is rejected
fn validate_price(price: f64) -> AppResult<f64> {
    let price = round_money(price);
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::bad_request("price must be a positive number"));
    }
    Ok(price)
}

fn validate_stock(stock_quantity: i64) -> AppResult<i64> {
    if stock_quantity < 0 {
        return Err(AppError::bad_request("stock_quantity must not be negative"));
    }
    Ok(stock_quantity)
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ProductListQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        builder
            .push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR description LIKE ")
            .push_bind(pattern)
            .push(LIKE_ESCAPE)
            .push(")");
    }
    if let Some(min_price) = query.min_price {
        builder.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        builder.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(category_id) = query.category_id {
        builder.push(" AND category_id = ").push_bind(category_id);
    }
}
