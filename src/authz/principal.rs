use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::SubjectType;

/// Role stored on the user row; drives which rule set the ability builder emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    #[default]
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "customer" => Ok(Role::Customer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The authenticated caller an ability is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: i64,
    pub role: Role,
}

impl Requester {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Record fields a rule condition can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    UserId,
}

/// A concrete resource the evaluator can check.
///
/// Every record carries its subject type explicitly so evaluation never
/// depends on inspecting the runtime type of a value.
pub trait Subject {
    fn subject_type(&self) -> SubjectType;

    /// Value of an integer field, `None` when the record has no such field
    fn field(&self, field: Field) -> Option<i64>;
}

/// What an action is checked against: a whole subject type or one record
#[derive(Clone, Copy)]
pub enum Target<'a> {
    Type(SubjectType),
    Instance(&'a dyn Subject),
}

impl<'a> Target<'a> {
    pub fn subject_type(&self) -> SubjectType {
        match self {
            Target::Type(subject_type) => *subject_type,
            Target::Instance(subject) => subject.subject_type(),
        }
    }

    pub fn instance(&self) -> Option<&'a dyn Subject> {
        match self {
            Target::Type(_) => None,
            Target::Instance(subject) => Some(*subject),
        }
    }
}

impl fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Type(subject_type) => f.debug_tuple("Type").field(subject_type).finish(),
            Target::Instance(subject) => f
                .debug_struct("Instance")
                .field("type", &subject.subject_type())
                .field("id", &subject.field(Field::Id))
                .finish(),
        }
    }
}

impl From<SubjectType> for Target<'_> {
    fn from(subject_type: SubjectType) -> Self {
        Target::Type(subject_type)
    }
}

impl<'a, S: Subject> From<&'a S> for Target<'a> {
    fn from(subject: &'a S) -> Self {
        Target::Instance(subject)
    }
}
