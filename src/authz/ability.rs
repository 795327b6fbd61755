use serde::Serialize;

use super::principal::{Field, Requester, Role};
use super::{Action, SubjectType};

/// Field equality a rule is narrowed to, with the value captured from the
/// requester when the ability was built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub field: Field,
    pub equals: i64,
}

impl Condition {
    pub fn new(field: Field, equals: i64) -> Self {
        Self { field, equals }
    }
}

/// One permission rule. `inverted` rules deny instead of allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub inverted: bool,
    pub actions: Vec<Action>,
    pub subjects: Vec<SubjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// Materialized rule set for a single requester and a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ability {
    rules: Vec<Rule>,
}

impl Ability {
    /// Build the ability for a requester from its role and id.
    ///
    /// Admins manage everything. Staff read everything and may create or
    /// update products and orders. Customers read the catalog and reviews,
    /// place orders and reviews, and edit only their own profile and reviews.
    pub fn for_user(requester: &Requester) -> Self {
        let mut builder = AbilityBuilder::new();

        match requester.role {
            Role::Admin => {
                builder.can(Action::Manage, SubjectType::All);
            }
            Role::Staff => {
                builder
                    .can(Action::Read, SubjectType::All)
                    .can(
                        [Action::Create, Action::Update],
                        [SubjectType::Product, SubjectType::Order],
                    );
            }
            Role::Customer => {
                builder
                    .can(Action::Read, [SubjectType::Product, SubjectType::Review])
                    .can(Action::Create, [SubjectType::Review, SubjectType::Order])
                    .can_when(
                        Action::Update,
                        SubjectType::User,
                        Condition::new(Field::Id, requester.id),
                    )
                    .can_when(
                        Action::Update,
                        SubjectType::Review,
                        Condition::new(Field::UserId, requester.id),
                    )
                    .can_when(
                        Action::Delete,
                        SubjectType::Review,
                        Condition::new(Field::UserId, requester.id),
                    );
            }
        }

        builder.build()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Free-function form of [`Ability::for_user`]
pub fn build_ability_for_user(requester: &Requester) -> Ability {
    Ability::for_user(requester)
}

/// Accumulates rules in declaration order
#[derive(Debug, Default)]
pub struct AbilityBuilder {
    rules: Vec<Rule>,
}

impl AbilityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can(
        &mut self,
        actions: impl Into<Vec<Action>>,
        subjects: impl Into<Vec<SubjectType>>,
    ) -> &mut Self {
        self.push(false, actions.into(), subjects.into(), None)
    }

    pub fn can_when(
        &mut self,
        actions: impl Into<Vec<Action>>,
        subjects: impl Into<Vec<SubjectType>>,
        condition: Condition,
    ) -> &mut Self {
        self.push(false, actions.into(), subjects.into(), Some(condition))
    }

    pub fn cannot(
        &mut self,
        actions: impl Into<Vec<Action>>,
        subjects: impl Into<Vec<SubjectType>>,
    ) -> &mut Self {
        self.push(true, actions.into(), subjects.into(), None)
    }

    pub fn cannot_when(
        &mut self,
        actions: impl Into<Vec<Action>>,
        subjects: impl Into<Vec<SubjectType>>,
        condition: Condition,
    ) -> &mut Self {
        self.push(true, actions.into(), subjects.into(), Some(condition))
    }

    pub fn build(&mut self) -> Ability {
        Ability {
            rules: std::mem::take(&mut self.rules),
        }
    }

    fn push(
        &mut self,
        inverted: bool,
        actions: Vec<Action>,
        subjects: Vec<SubjectType>,
        condition: Option<Condition>,
    ) -> &mut Self {
        self.rules.push(Rule {
            inverted,
            actions,
            subjects,
            condition,
        });
        self
    }
}
