use super::ability::{Ability, Condition, Rule};
use super::principal::{Subject, Target};
use super::{Action, SubjectType};

impl Rule {
    /// Whether the rule applies to the action and the subject type at all,
    /// before looking at conditions
    pub fn is_relevant(&self, action: Action, subject_type: SubjectType) -> bool {
        let action_matches = self
            .actions
            .iter()
            .any(|a| *a == action || *a == Action::Manage);

        let subject_matches = if subject_type == SubjectType::All {
            self.subjects.contains(&SubjectType::All)
        } else {
            self.subjects
                .iter()
                .any(|s| *s == subject_type || *s == SubjectType::All)
        };

        action_matches && subject_matches
    }

    /// Whether the rule's condition holds for the target.
    ///
    /// Type-level checks cannot see any fields: an allow rule's condition is
    /// assumed satisfiable, a deny rule's condition is assumed not to match.
    /// The `All` wildcard never satisfies a condition.
    pub fn matches_conditions(&self, target: &Target<'_>) -> bool {
        let Some(condition) = self.condition else {
            return true;
        };

        if target.subject_type() == SubjectType::All {
            return false;
        }

        match target.instance() {
            Some(subject) => condition_holds(&condition, subject),
            None => !self.inverted,
        }
    }
}

fn condition_holds(condition: &Condition, subject: &dyn Subject) -> bool {
    subject.field(condition.field) == Some(condition.equals)
}

impl Ability {
    /// Decide whether `action` is allowed on `target`.
    ///
    /// Any matching deny rule wins regardless of its position; otherwise any
    /// matching allow rule allows; no match denies.
    pub fn can<'a>(&self, action: Action, target: impl Into<Target<'a>>) -> bool {
        let target = target.into();
        let subject_type = target.subject_type();

        let mut allowed = false;
        for rule in self.rules_for(action, subject_type) {
            if !rule.matches_conditions(&target) {
                continue;
            }
            if rule.inverted {
                tracing::trace!(?action, ?target, "deny rule matched");
                return false;
            }
            allowed = true;
        }

        allowed
    }

    pub fn cannot<'a>(&self, action: Action, target: impl Into<Target<'a>>) -> bool {
        !self.can(action, target)
    }

    /// Rules relevant to an action on a subject type, in declaration order
    pub fn rules_for(
        &self,
        action: Action,
        subject_type: SubjectType,
    ) -> impl Iterator<Item = &Rule> + '_ {
        self.rules()
            .iter()
            .filter(move |rule| rule.is_relevant(action, subject_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::ability::AbilityBuilder;
    use crate::authz::principal::{Field, Requester, Role};

    const ACTIONS: [Action; 5] = [
        Action::Manage,
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
    ];
    const SUBJECTS: [SubjectType; 6] = [
        SubjectType::User,
        SubjectType::Product,
        SubjectType::Review,
        SubjectType::Order,
        SubjectType::Cart,
        SubjectType::All,
    ];

    struct Record {
        kind: SubjectType,
        id: i64,
        user_id: Option<i64>,
    }

    impl Subject for Record {
        fn subject_type(&self) -> SubjectType {
            self.kind
        }

        fn field(&self, field: Field) -> Option<i64> {
            match field {
                Field::Id => Some(self.id),
                Field::UserId => self.user_id,
            }
        }
    }

    fn review(id: i64, user_id: i64) -> Record {
        Record { kind: SubjectType::Review, id, user_id: Some(user_id) }
    }

    fn user(id: i64) -> Record {
        Record { kind: SubjectType::User, id, user_id: None }
    }

    fn ability(id: i64, role: Role) -> Ability {
        Ability::for_user(&Requester::new(id, role))
    }

    #[test]
    fn admin_can_everything() {
        let admin = ability(1, Role::Admin);
        for action in ACTIONS {
            for subject in SUBJECTS {
                assert!(admin.can(action, subject), "{action:?} on {subject:?}");
            }
        }

        let order = Record { kind: SubjectType::Order, id: 50, user_id: Some(99) };
        assert!(admin.can(Action::Delete, &order));
    }

    #[test]
    fn staff_reads_everything_but_cannot_delete_products() {
        let staff = ability(2, Role::Staff);
        for subject in SUBJECTS {
            assert!(staff.can(Action::Read, subject), "read {subject:?}");
        }

        assert!(staff.can(Action::Create, SubjectType::Product));
        assert!(staff.can(Action::Update, SubjectType::Order));
        assert!(staff.cannot(Action::Create, SubjectType::User));
        assert!(staff.cannot(Action::Delete, SubjectType::Product));
        assert!(staff.cannot(Action::Manage, SubjectType::Product));
    }

    #[test]
    fn customer_updates_only_own_reviews() {
        let customer = ability(7, Role::Customer);

        assert!(customer.can(Action::Update, &review(3, 7)));
        assert!(customer.cannot(Action::Update, &review(4, 9)));
        assert!(customer.can(Action::Delete, &review(3, 7)));
        assert!(customer.cannot(Action::Delete, &review(4, 9)));
    }

    #[test]
    fn customer_updates_only_self() {
        let customer = ability(7, Role::Customer);

        assert!(customer.can(Action::Update, &user(7)));
        assert!(customer.cannot(Action::Update, &user(8)));
        assert!(customer.cannot(Action::Delete, &user(7)));
    }

    #[test]
    fn conditional_allow_passes_type_level_check() {
        let customer = ability(7, Role::Customer);

        assert!(customer.can(Action::Update, SubjectType::Review));
        assert!(customer.can(Action::Update, SubjectType::User));
        assert!(customer.cannot(Action::Delete, SubjectType::User));
    }

    #[test]
    fn foreign_carts_are_read_by_staff_and_managed_by_admin() {
        let cart = Record { kind: SubjectType::Cart, id: 5, user_id: Some(99) };

        assert!(ability(1, Role::Admin).can(Action::Delete, &cart));
        let staff = ability(2, Role::Staff);
        assert!(staff.can(Action::Read, &cart));
        assert!(staff.cannot(Action::Update, &cart));
        assert!(ability(7, Role::Customer).cannot(Action::Read, &cart));
    }

    #[test]
    fn customer_default_deny() {
        let customer = ability(7, Role::Customer);

        assert!(customer.cannot(Action::Delete, SubjectType::Product));
        assert!(customer.cannot(Action::Read, SubjectType::Order));
        assert!(customer.cannot(Action::Read, SubjectType::User));
        assert!(customer.cannot(Action::Read, SubjectType::All));
        assert!(customer.can(Action::Read, SubjectType::Product));
        assert!(customer.can(Action::Create, SubjectType::Order));
    }

    #[test]
    fn all_target_matches_only_wildcard_rules() {
        let staff = ability(2, Role::Staff);
        assert!(staff.can(Action::Read, SubjectType::All));
        assert!(staff.cannot(Action::Create, SubjectType::All));

        let conditional = AbilityBuilder::new()
            .can_when(Action::Update, SubjectType::All, Condition::new(Field::Id, 1))
            .build();
        assert!(conditional.cannot(Action::Update, SubjectType::All));
    }

    #[test]
    fn deny_rule_wins_regardless_of_order() {
        let ability = AbilityBuilder::new()
            .cannot(Action::Delete, SubjectType::Review)
            .can(Action::Manage, SubjectType::All)
            .build();
        assert!(ability.cannot(Action::Delete, SubjectType::Review));
        assert!(ability.cannot(Action::Delete, &review(1, 1)));
        assert!(ability.can(Action::Update, SubjectType::Review));

        let ability = AbilityBuilder::new()
            .can(Action::Manage, SubjectType::All)
            .cannot(Action::Delete, SubjectType::Review)
            .build();
        assert!(ability.cannot(Action::Delete, &review(1, 1)));
    }

    #[test]
    fn conditional_deny_applies_to_matching_instances_only() {
        let ability = AbilityBuilder::new()
            .can(Action::Update, SubjectType::Review)
            .cannot_when(Action::Update, SubjectType::Review, Condition::new(Field::UserId, 9))
            .build();

        assert!(ability.can(Action::Update, SubjectType::Review));
        assert!(ability.can(Action::Update, &review(1, 7)));
        assert!(ability.cannot(Action::Update, &review(2, 9)));
    }

    #[test]
    fn missing_field_fails_condition() {
        let customer = ability(7, Role::Customer);
        let orphan = Record { kind: SubjectType::Review, id: 3, user_id: None };
        assert!(customer.cannot(Action::Update, &orphan));
    }

    #[test]
    fn rules_for_lists_relevant_rules() {
        let customer = ability(7, Role::Customer);
        assert_eq!(customer.rules_for(Action::Update, SubjectType::Review).count(), 1);
        assert_eq!(customer.rules_for(Action::Delete, SubjectType::Product).count(), 0);

        let admin = ability(1, Role::Admin);
        assert_eq!(admin.rules_for(Action::Delete, SubjectType::Order).count(), 1);
    }

    #[test]
    fn evaluation_is_stable_across_builds() {
        let first = ability(5, Role::Customer);
        let second = ability(5, Role::Customer);
        for action in ACTIONS {
            for subject in SUBJECTS {
                assert_eq!(first.can(action, subject), second.can(action, subject));
            }
            assert_eq!(first.can(action, &review(1, 5)), second.can(action, &review(1, 5)));
        }
    }
}
