use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::pagination::SortOrder;
use crate::authz::{Field, Subject, SubjectType};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock_quantity: i64,
    pub sku: Option<String>,
    pub is_active: bool,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subject for Product {
    fn subject_type(&self) -> SubjectType {
        SubjectType::Product
    }

    fn field(&self, field: Field) -> Option<i64> {
        match field {
            Field::Id => Some(self.id),
            Field::UserId => None,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductCreateRequest {
    #[schema(example = "Espresso Grinder")]
    pub name: String,
    #[schema(example = "Conical burr grinder with 40 settings.")]
    pub description: Option<String>,
    #[schema(example = 149.99)]
    pub price: f64,
    #[schema(example = 25)]
    pub stock_quantity: Option<i64>,
    #[schema(example = "GRD-040")]
    pub sku: Option<String>,
    #[schema(example = 1)]
    pub category_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub sku: Option<String>,
    pub is_active: Option<bool>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    Name,
    Price,
    CreatedAt,
}

impl ProductSortBy {
    pub fn column(self) -> &'static str {
        match self {
            ProductSortBy::Name => "name",
            ProductSortBy::Price => "price",
            ProductSortBy::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Matches name or description
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category_id: Option<i64>,
    /// Defaults to newest first
    pub sort_by: Option<ProductSortBy>,
    /// Defaults to `asc` once `sort_by` is given
    pub sort_order: Option<SortOrder>,
}
