use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::authz::{Field, Subject, SubjectType};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subject for Review {
    fn subject_type(&self) -> SubjectType {
        SubjectType::Review
    }

    fn field(&self, field: Field) -> Option<i64> {
        match field {
            Field::Id => Some(self.id),
            Field::UserId => Some(self.user_id),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewCreateRequest {
    #[schema(example = 1)]
    pub product_id: i64,
    #[schema(example = 5)]
    pub rating: i64,
    #[schema(example = "Grinds evenly, a bit loud.")]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewUpdateRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub product_id: Option<i64>,
    pub user_id: Option<i64>,
}
