use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::cart::Cart;
use super::category::Category;
use super::order::Order;
use super::product::Product;
use super::review::Review;
use super::user::User;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Resolved page window; `page` is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

/// Listing direction; `ASC` and `DESC` are accepted as well
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortOrder {
    /// `ORDER BY` clause for a whitelisted column, with `id` as tie-breaker
    pub fn clause(self, column: &str) -> String {
        let direction = match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        format!(" ORDER BY {column} {direction}, id {direction}")
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    UserPage = Page<User>,
    ProductPage = Page<Product>,
    CategoryPage = Page<Category>,
    CartPage = Page<Cart>,
    ReviewPage = Page<Review>,
    OrderPage = Page<Order>
)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64 + u64::from(pagination.limit) - 1) / u64::from(pagination.limit)) as u32
        };

        Self {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages,
        }
    }
}
