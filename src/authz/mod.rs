//! Authorization module - ability builder, evaluator and route guards
//!
//! Abilities are rebuilt for every request from the requester's id and
//! current role:
//! - `Admin` manages everything
//! - `Staff` reads everything and writes products and orders
//! - `Customer` reads the catalog and edits only what it owns
//!
//! Deny rules take precedence over allow rules; anything not allowed is denied.

mod ability;
mod evaluator;
mod guard;
mod principal;

pub use ability::{build_ability_for_user, Ability, AbilityBuilder, Condition, Rule};
pub use guard::{enforce, ensure_can, Guarded, Policy, PolicyCheck};
pub use principal::{Field, Requester, Role, Subject, Target};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Operation being attempted. `Manage` implies every other action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Manage,
    Create,
    Read,
    Update,
    Delete,
}

/// Resource type a rule applies to. `All` is the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SubjectType {
    User,
    Product,
    Review,
    Order,
    Cart,
    #[serde(rename = "all")]
    All,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Manage => "manage",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::User => "user",
            SubjectType::Product => "product",
            SubjectType::Review => "review",
            SubjectType::Order => "order",
            SubjectType::Cart => "cart",
            SubjectType::All => "all",
        }
    }
}

impl From<Action> for Vec<Action> {
    fn from(action: Action) -> Self {
        vec![action]
    }
}

impl From<SubjectType> for Vec<SubjectType> {
    fn from(subject_type: SubjectType) -> Self {
        vec![subject_type]
    }
}
