use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::app::AppState;
use crate::authz::{ensure_can, Action, Policy, Role};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::cart::{Cart, CartCreateRequest, CartItem, CartItemRequest, CartListQuery, CartUpdateRequest};
use crate::models::pagination::{Page, Pagination, SortOrder};
use crate::routes::products::fetch_product;
use crate::utils::{round_money, utc_now};

const CART_COLUMNS: &str = "id, user_id, total, created_at, updated_at";

pub const CART_STAFF: Policy = Policy::roles(&[Role::Admin, Role::Staff]);

#[utoipa::path(
    get,
    path = "/cart",
    tag = "Cart",
    params(CartListQuery),
    responses(
        (status = 200, description = "Paginated carts", body = crate::models::pagination::CartPage),
        (status = 403, description = "Admin or staff only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_carts(
    State(state): State<AppState>,
    Query(query): Query<CartListQuery>,
) -> AppResult<Json<Page<Cart>>> {
    let pagination = Pagination::new(query.page, query.limit);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM carts");
    push_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&state.pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {CART_COLUMNS} FROM carts"));
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

    let carts = select.build_query_as::<Cart>().fetch_all(&state.pool).await?;

    Ok(Json(Page::new(carts, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/cart",
    tag = "Cart",
    request_body = CartCreateRequest,
    responses(
        (status = 201, description = "Cart created for the caller", body = Cart),
        (status = 400, description = "Invalid quantity or inactive product"),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CartCreateRequest>,
) -> AppResult<(StatusCode, Json<Cart>)> {
    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let total = price_items(&mut tx, &payload.items).await?;

    let cart_id = sqlx::query("INSERT INTO carts (user_id, total, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(auth.user_id)
        .bind(total)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    insert_items(&mut tx, cart_id, &payload.items).await?;

    tx.commit().await?;

    tracing::info!(cart_id, user_id = auth.user_id, total, "cart created");

    let cart = fetch_cart_with_items(&state.pool, cart_id).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

#[utoipa::path(
    get,
    path = "/cart/{id}",
    tag = "Cart",
    params(("id" = i64, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart with its items", body = Cart),
        (status = 403, description = "Not allowed to read this cart"),
        (status = 404, description = "Cart not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Cart>> {
    let cart = fetch_cart_with_items(&state.pool, id).await?;
    ensure_cart_access(&auth, Action::Read, &cart)?;

    Ok(Json(cart))
}

#[utoipa::path(
    patch,
    path = "/cart/{id}",
    tag = "Cart",
    params(("id" = i64, Path, description = "Cart id")),
    request_body = CartUpdateRequest,
    responses(
        (status = 200, description = "Cart updated", body = Cart),
        (status = 400, description = "Invalid quantity or inactive product"),
        (status = 403, description = "Not allowed to update this cart"),
        (status = 404, description = "Cart or product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CartUpdateRequest>,
) -> AppResult<Json<Cart>> {
    let cart = fetch_cart(&state.pool, id).await?;
    ensure_cart_access(&auth, Action::Update, &cart)?;

    if let Some(items) = payload.items.as_deref() {
        let mut tx = state.pool.begin().await?;

        let total = price_items(&mut tx, items).await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, cart.id, items).await?;

        sqlx::query("UPDATE carts SET total = ?, updated_at = ? WHERE id = ?")
            .bind(total)
            .bind(utc_now())
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    let cart = fetch_cart_with_items(&state.pool, cart.id).await?;
    Ok(Json(cart))
}

#[utoipa::path(
    delete,
    path = "/cart/{id}",
    tag = "Cart",
    params(("id" = i64, Path, description = "Cart id")),
    responses(
        (status = 204, description = "Cart deleted"),
        (status = 403, description = "Not allowed to delete this cart"),
        (status = 404, description = "Cart not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let cart = fetch_cart(&state.pool, id).await?;
    ensure_cart_access(&auth, Action::Delete, &cart)?;

    sqlx::query("DELETE FROM carts WHERE id = ?")
        .bind(cart.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(cart_id = cart.id, deleted_by = auth.user_id, "cart deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Owners always pass; anyone else needs the action on this cart
fn ensure_cart_access(auth: &AuthUser, action: Action, cart: &Cart) -> AppResult<()> {
    if cart.user_id == auth.user_id {
        return Ok(());
    }
    ensure_can(&auth.ability(), action, cart)
}

/// Total at current catalog prices
async fn price_items(conn: &mut SqliteConnection, items: &[CartItemRequest]) -> AppResult<f64> {
    let mut total = 0.0;
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::bad_request("quantity must be at least 1"));
        }
        let product = fetch_product(&mut *conn, item.product_id).await?;
        if !product.is_active {
            return Err(AppError::bad_request(format!("product {} is not available", product.id)));
        }
        total += product.price * item.quantity as f64;
    }
    Ok(round_money(total))
}

async fn insert_items(conn: &mut SqliteConnection, cart_id: i64, items: &[CartItemRequest]) -> AppResult<()> {
    for item in items {
        sqlx::query("INSERT INTO cart_items (cart_id, product_id, quantity) VALUES (?, ?, ?)")
            .bind(cart_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn fetch_cart(pool: &SqlitePool, id: i64) -> AppResult<Cart> {
    let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = ?");
    sqlx::query_as::<_, Cart>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("cart not found"))
}

async fn fetch_cart_with_items(pool: &SqlitePool, id: i64) -> AppResult<Cart> {
    let mut cart = fetch_cart(pool, id).await?;

    cart.items = sqlx::query_as::<_, CartItem>(
        "SELECT id, product_id, quantity FROM cart_items WHERE cart_id = ? ORDER BY id",
    )
    .bind(cart.id)
    .fetch_all(pool)
    .await?;

    Ok(cart)
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &CartListQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
}
