use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::pagination::SortOrder;
use crate::authz::{Field, Subject, SubjectType};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CartItem {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
}

/// A user's cart. `total` is recomputed from catalog prices on every write.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
    pub total: f64,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subject for Cart {
    fn subject_type(&self) -> SubjectType {
        SubjectType::Cart
    }

    fn field(&self, field: Field) -> Option<i64> {
        match field {
            Field::Id => Some(self.id),
            Field::UserId => Some(self.user_id),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartItemRequest {
    #[schema(example = 1)]
    pub product_id: i64,
    #[schema(example = 1)]
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CartCreateRequest {
    #[serde(default)]
    pub items: Vec<CartItemRequest>,
}

/// `items`, when present, replaces the cart contents
#[derive(Debug, Deserialize, ToSchema)]
pub struct CartUpdateRequest {
    pub items: Option<Vec<CartItemRequest>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CartSortBy {
    CreatedAt,
    UpdatedAt,
}

impl CartSortBy {
    pub fn column(self) -> &'static str {
        match self {
            CartSortBy::CreatedAt => "created_at",
            CartSortBy::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CartListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<i64>,
    pub sort_by: Option<CartSortBy>,
    pub sort_order: Option<SortOrder>,
}
