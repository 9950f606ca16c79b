use axum::extract::{Path, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::credentials;
use crate::db::friends;
use crate::db::models::User;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, JsonBody};
use crate::requests::{LoginRequest, RegisterRequest, UpdateUserRequest};
use crate::state::AppState;

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/createAccount", post(create_account))
        .route("/user/login", post(login))
        .route("/user/me", get(me))
        .route("/user/logout", post(logout))
        .route("/user/deleteAccount", delete(delete_account))
        .route("/user/update", patch(update_profile))
        .route("/user/addFriend/{id}", post(add_friend))
        .route("/user/getFriends", get(get_friends))
        .route("/user/deleteFriend/{id}", delete(delete_friend))
}

async fn create_account(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> AppResult<Json<User>> {
    let new_user = body.validate()?;
    let conn = state.db.get()?;
    let user = credentials::register(&conn, &new_user, &state.config.auth)?;
    Ok(Json(user))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let conn = state.db.get()?;
    let (user, token) =
        credentials::authenticate(&conn, &body.email, &body.password, &state.config.auth)?;
    Ok(Json(LoginResponse { user, token }))
}

async fn me(CurrentUser { user, .. }: CurrentUser) -> Json<User> {
    Json(user)
}

async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    credentials::revoke(&conn, &current.user, &current.token)?;
    Ok(Json(json!({ "message": "Logged out" })))
}

async fn delete_account(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<User>> {
    let mut conn = state.db.get()?;
    let user = credentials::delete_account(&mut conn, &current.user.id)?;
    Ok(Json(user))
}

async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    let changes = body.validate()?;
    let mut conn = state.db.get()?;
    let user = credentials::update_profile(
        &mut conn,
        &current.user.id,
        &changes,
        &state.config.auth,
        &current.token,
    )?;
    Ok(Json(user))
}

async fn add_friend(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let mut conn = state.db.get()?;
    let friends = friends::add_friend(&mut conn, &current.user.id, &id)?;
    Ok(Json(friends))
}

async fn get_friends(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    Ok(Json(friends::list_friends(&conn, &current.user.id)?))
}

async fn delete_friend(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let mut conn = state.db.get()?;
    let friends = friends::remove_friend(&mut conn, &current.user.id, &id)?;
    Ok(Json(friends))
}
