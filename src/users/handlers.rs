use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
    Extension, Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, Pagination, UpdateUserRequest},
    repo_types::User,
};
use crate::{
    auth::{
        extractors::{require_roles, RequireRoles},
        guard::AuthenticatedUser,
        handlers::{check_email, check_name, check_password, check_profile},
        roles::Role,
    },
    error::Result,
    state::AppState,
};

const ADMIN_ONLY: &[Role] = &[Role::Admin];

pub fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(
            RequireRoles::new(state.guard.clone(), ADMIN_ONLY),
            require_roles,
        ))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.users.list(p).await?))
}

#[instrument(skip(state))]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<User>> {
    Ok(Json(state.users.get(id).await?))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    Json(mut payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    payload.email = payload.email.trim().to_string();
    check_email(&payload.email)?;
    check_password(&payload.password)?;
    check_profile(&payload.profile)?;
    let user = state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_string();
        check_email(email)?;
    }
    if let Some(password) = &payload.password {
        check_password(password)?;
    }
    for name in [&payload.first_name, &payload.last_name].into_iter().flatten() {
        check_name(name)?;
    }
    let user = state.users.update(id, payload).await?;
    Ok((StatusCode::ACCEPTED, Json(user)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
