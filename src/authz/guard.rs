use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::ability::Ability;
use super::principal::{Requester, Role, Target};
use super::Action;
use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::AuthUser;

/// Predicate over a freshly built ability, declared per route
pub type PolicyCheck = fn(&Ability) -> bool;

/// Route-level authorization metadata
#[derive(Debug, Clone, Copy)]
pub enum Policy {
    /// Coarse guard: requester role must be one of these
    Roles(&'static [Role]),
    /// Fine guard: every check must pass against the requester's ability
    Checks(&'static [PolicyCheck]),
}

impl Policy {
    pub const fn roles(roles: &'static [Role]) -> Self {
        Policy::Roles(roles)
    }

    pub const fn checks(checks: &'static [PolicyCheck]) -> Self {
        Policy::Checks(checks)
    }

    pub fn authorize(&self, requester: &Requester) -> Result<(), AppError> {
        let allowed = match self {
            Policy::Roles(roles) => roles.contains(&requester.role),
            Policy::Checks(checks) => {
                let ability = Ability::for_user(requester);
                checks.iter().all(|check| check(&ability))
            }
        };

        if allowed {
            Ok(())
        } else {
            tracing::debug!(
                user_id = requester.id,
                role = %requester.role,
                policy = ?self,
                "route policy denied"
            );
            Err(AppError::forbidden("insufficient permissions"))
        }
    }
}

/// State handed to [`enforce`]: the app state for authentication plus the
/// route's policy
#[derive(Clone)]
pub struct Guarded {
    pub state: AppState,
    pub policy: Policy,
}

impl Guarded {
    pub fn new(state: &AppState, policy: Policy) -> Self {
        Self {
            state: state.clone(),
            policy,
        }
    }
}

/// Middleware attached with `route_layer`. Authenticates (401), evaluates the
/// route policy (403) and leaves the resolved [`AuthUser`] in the request
/// extensions for the handler.
pub async fn enforce(
    State(guarded): State<Guarded>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let auth = AuthUser::authenticate(&parts, &guarded.state).await?;
    guarded.policy.authorize(&auth.requester())?;

    parts.extensions.insert(auth);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Post-fetch check against a concrete record
pub fn ensure_can<'a>(
    ability: &Ability,
    action: Action,
    target: impl Into<Target<'a>>,
) -> Result<(), AppError> {
    let target = target.into();
    if ability.can(action, target) {
        return Ok(());
    }

    tracing::debug!(?action, ?target, "ownership check denied");
    Err(AppError::forbidden(format!(
        "cannot {} this {}",
        action.as_str(),
        target.subject_type().as_str()
    )))
}
