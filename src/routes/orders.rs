use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::types::Json as SqlJson;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::app::AppState;
use crate::authz::{ensure_can, Action, Policy, Role, SubjectType};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::order::{
    DbOrder, Order, OrderCreateRequest, OrderItem, OrderListQuery, OrderUpdateRequest,
};
use crate::models::pagination::{Page, Pagination};
use crate::routes::products::fetch_product;
use crate::utils::{generate_order_number, round_money, utc_now};

const ORDER_COLUMNS: &str =
    "id, order_number, user_id, subtotal, tax, shipping, total, status, shipping_address, created_at, updated_at";

pub const ORDER_STAFF: Policy = Policy::roles(&[Role::Admin, Role::Staff]);
pub const CREATE_ORDERS: Policy = Policy::checks(&[|ability| ability.can(Action::Create, SubjectType::Order)]);
pub const DELETE_ORDERS: Policy = Policy::checks(&[|ability| ability.can(Action::Delete, SubjectType::Order)]);

#[utoipa::path(
    get,
    path = "/orders",
    tag = "Orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Paginated orders", body = crate::models::pagination::OrderPage),
        (status = 403, description = "Admin or staff only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<Page<Order>>> {
    let pagination = Pagination::new(query.page, query.limit);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM orders");
    push_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&state.pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
    push_filters(&mut select, &query);
    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let orders: Vec<Order> = select
        .build_query_as::<DbOrder>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(Json(Page::new(orders, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/orders",
    tag = "Orders",
    request_body = OrderCreateRequest,
    responses(
        (status = 201, description = "Order placed", body = Order),
        (status = 400, description = "Invalid items, amounts or inactive product"),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<OrderCreateRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    if payload.items.is_empty() {
        return Err(AppError::bad_request("order must contain at least one item"));
    }

    if payload.items.iter().any(|item| item.quantity < 1) {
        return Err(AppError::bad_request("quantity must be at least 1"));
    }
    let tax = validate_amount("tax", payload.tax.unwrap_or(0.0))?;
    let shipping = validate_amount("shipping", payload.shipping.unwrap_or(0.0))?;

    let mut tx = state.pool.begin().await?;

    // Prices come from the catalog at the time of ordering, read in the same
    // transaction as the insert
    let mut lines = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = fetch_product(&mut *tx, item.product_id).await?;
        if !product.is_active {
            return Err(AppError::bad_request(format!("product {} is not available", product.id)));
        }
        let line_total = round_money(product.price * item.quantity as f64);
        lines.push((product.id, item.quantity, product.price, line_total));
    }

    let subtotal = round_money(lines.iter().map(|(_, _, _, total)| total).sum());
    let total = round_money(subtotal + tax + shipping);
    let order_number = generate_order_number();
    let now = utc_now();

    let order_id = sqlx::query(
        "INSERT INTO orders (order_number, user_id, subtotal, tax, shipping, total, status, shipping_address, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
    )
    .bind(&order_number)
    .bind(auth.user_id)
    .bind(subtotal)
    .bind(tax)
    .bind(shipping)
    .bind(total)
    .bind(SqlJson(&payload.shipping_address))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for &(product_id, quantity, price, line_total) in &lines {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price, total) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .bind(line_total)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(order_id, %order_number, user_id = auth.user_id, total, "order placed");

    let order = fetch_order_with_items(&state.pool, order_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "Orders",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its items", body = Order),
        (status = 403, description = "Not allowed to read this order"),
        (status = 404, description = "Order not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    let order = fetch_order_with_items(&state.pool, id).await?;

    if order.user_id != auth.user_id {
        ensure_can(&auth.ability(), Action::Read, &order)?;
    }

    Ok(Json(order))
}

#[utoipa::path(
    patch,
    path = "/orders/{id}",
    tag = "Orders",
    params(("id" = i64, Path, description = "Order id")),
    request_body = OrderUpdateRequest,
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 403, description = "Admin or staff only"),
        (status = 404, description = "Order not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<OrderUpdateRequest>,
) -> AppResult<Json<Order>> {
    let mut order = fetch_order_with_items(&state.pool, id).await?;
    ensure_can(&auth.ability(), Action::Update, &order)?;

    if let Some(status) = payload.status {
        if status != order.status {
            tracing::info!(
                order_id = order.id,
                changed_by = auth.user_id,
                from = ?order.status,
                to = ?status,
                "order status changed"
            );
        }
        order.status = status;
    }
    if let Some(address) = payload.shipping_address {
        order.shipping_address = address;
    }

    let now = utc_now();

    sqlx::query("UPDATE orders SET status = ?, shipping_address = ?, updated_at = ? WHERE id = ?")
        .bind(order.status)
        .bind(SqlJson(&order.shipping_address))
        .bind(now)
        .bind(order.id)
        .execute(&state.pool)
        .await?;

    order.updated_at = now;

    Ok(Json(order))
}

#[utoipa::path(
    delete,
    path = "/orders/{id}",
    tag = "Orders",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, description = "Requires delete access to orders"),
        (status = 404, description = "Order not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let order = fetch_order(&state.pool, id).await?;
    ensure_can(&auth.ability(), Action::Delete, &order)?;

    // order_items go with it through ON DELETE CASCADE
    sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(order.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(order_id = order.id, deleted_by = auth.user_id, "order deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_order(pool: &SqlitePool, id: i64) -> AppResult<Order> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
    sqlx::query_as::<_, DbOrder>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Order::from)
        .ok_or_else(|| AppError::not_found("order not found"))
}

async fn fetch_order_with_items(pool: &SqlitePool, id: i64) -> AppResult<Order> {
    let mut order = fetch_order(pool, id).await?;

    order.items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, product_id, quantity, price, total FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(order)
}

fn validate_amount(field: &str, amount: f64) -> AppResult<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::bad_request(format!("{field} must not be negative")));
    }
    Ok(round_money(amount))
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &OrderListQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
}
