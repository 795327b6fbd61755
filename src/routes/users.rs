use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite};

use crate::app::AppState;
use crate::authz::{ensure_can, Action, Policy, SubjectType};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::pagination::{Page, Pagination};
use crate::models::user::{ChangePasswordRequest, DbUser, User, UserListQuery, UserUpdateRequest};
use crate::routes::auth::{fetch_user_by_id, MessageResponse, USER_COLUMNS};
use crate::utils::{hash_password, like_pattern, require_non_empty, utc_now, verify_password, LIKE_ESCAPE};

pub const READ_USERS: Policy = Policy::checks(&[|ability| ability.can(Action::Read, SubjectType::User)]);
pub const UPDATE_USERS: Policy = Policy::checks(&[|ability| ability.can(Action::Update, SubjectType::User)]);
pub const DELETE_USERS: Policy = Policy::checks(&[|ability| ability.can(Action::Delete, SubjectType::User)]);

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Paginated users", body = crate::models::pagination::UserPage),
        (status = 403, description = "Requires read access to users")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Page<User>>> {
    let pagination = Pagination::new(query.page, query.limit);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM users");
    push_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(&state.pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {USER_COLUMNS} FROM users"));
    push_filters(&mut select, &query);
    select
        .push(" ORDER BY id LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let users: Vec<User> = select
        .build_query_as::<DbUser>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(Json(Page::new(users, total, pagination)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 403, description = "Not allowed to read this user"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    let user: User = fetch_user_by_id(&state.pool, id).await?.into();

    if user.id != auth.user_id {
        ensure_can(&auth.ability(), Action::Read, &user)?;
    }

    Ok(Json(user))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Not allowed to update this user"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    let mut user: User = fetch_user_by_id(&state.pool, id).await?.into();

    let ability = auth.ability();
    ensure_can(&ability, Action::Update, &user)?;

    if let Some(role) = payload.role {
        if role != user.role {
            ensure_can(&ability, Action::Manage, SubjectType::User)?;
            tracing::info!(
                user_id = user.id,
                changed_by = auth.user_id,
                from = %user.role,
                to = %role,
                "user role changed"
            );
            user.role = role;
        }
    }
    if let Some(first_name) = payload.first_name.as_ref() {
        require_non_empty("first_name", first_name)?;
        user.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = payload.last_name.as_ref() {
        require_non_empty("last_name", last_name)?;
        user.last_name = last_name.trim().to_string();
    }
    if payload.phone.is_some() {
        user.phone = payload.phone.clone();
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE users SET first_name = ?, last_name = ?, phone = ?, role = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(user.role)
    .bind(now)
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    user.updated_at = now;

    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/users/{id}/password",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password incorrect or new password too short"),
        (status = 403, description = "Not allowed to update this user"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let db_user = fetch_user_by_id(&state.pool, id).await?;
    let user = User::from(db_user.clone());

    // Changing your own password proves the old one; anyone else needs
    // update access to the account
    if user.id == auth.user_id {
        let current = payload.current_password.as_deref().unwrap_or_default();
        if !verify_password(current, &db_user.password_hash)? {
            return Err(AppError::bad_request("current password is incorrect"));
        }
    } else {
        ensure_can(&auth.ability(), Action::Update, &user)?;
    }
    let password_hash = hash_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(utc_now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = user.id, changed_by = auth.user_id, "password changed");

    Ok(Json(MessageResponse::new("Password updated")))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Requires delete access to users"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let user: User = fetch_user_by_id(&state.pool, id).await?.into();
    ensure_can(&auth.ability(), Action::Delete, &user)?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = user.id, deleted_by = auth.user_id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &UserListQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        builder
            .push(" AND (email LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR first_name LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR last_name LIKE ")
            .push_bind(pattern)
            .push(LIKE_ESCAPE)
            .push(")");
    }

    if let Some(role) = query.role {
        builder.push(" AND role = ").push_bind(role);
    }
}
