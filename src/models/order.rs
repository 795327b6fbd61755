use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::authz::{Field, Subject, SubjectType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct OrderItem {
    pub id: i64,
    /// `None` once the product has been removed from the catalog
    pub product_id: Option<i64>,
    pub quantity: i64,
    pub price: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub shipping_address: Address,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subject for Order {
    fn subject_type(&self) -> SubjectType {
        SubjectType::Order
    }

    fn field(&self, field: Field) -> Option<i64> {
        match field {
            Field::Id => Some(self.id),
            Field::UserId => Some(self.user_id),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbOrder {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub shipping_address: Json<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbOrder> for Order {
    fn from(value: DbOrder) -> Self {
        Order {
            id: value.id,
            order_number: value.order_number,
            user_id: value.user_id,
            subtotal: value.subtotal,
            tax: value.tax,
            shipping: value.shipping,
            total: value.total,
            status: value.status,
            shipping_address: value.shipping_address.0,
            items: Vec::new(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    #[schema(example = 1)]
    pub product_id: i64,
    #[schema(example = 2)]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderCreateRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Address,
    #[schema(example = 0.0)]
    pub tax: Option<f64>,
    #[schema(example = 4.99)]
    pub shipping: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderUpdateRequest {
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    pub user_id: Option<i64>,
}
