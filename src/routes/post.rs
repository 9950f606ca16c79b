use axum::extract::{Path, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};

use crate::db::models::{Post, SearchResults};
use crate::db::posts::{self, Page};
use crate::db::{search, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::requests::{CommentRequest, CreatePostRequest, UpdatePostRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/create", post(create_post))
        .route("/post/search/{text}", get(search_posts))
        .route("/post/myPosts", get(my_posts))
        .route("/post/getAllPosts", get(all_posts))
        .route("/post/getById/{id}", get(get_by_id))
        .route("/post/getByUserId/{id}", get(get_by_user_id))
        .route("/post/getByNickname/{nickname}", get(get_by_nickname))
        .route("/post/popular", get(popular_first_page))
        .route("/post/popular/{page}", get(popular))
        .route("/post/getRecentPosts", get(recent_first_page))
        .route("/post/getRecentPosts/{page}", get(recent))
        .route("/post/addComment/{id}", post(add_comment))
        .route("/post/deleteComment/{id}", delete(delete_comment))
        .route("/post/like/{id}", post(like))
        .route("/post/unlike/{id}", post(unlike))
        .route("/post/updatePost/{id}", patch(update_post))
        .route("/post/deletePost/{id}", delete(delete_post))
}

// --- Writes ---

async fn create_post(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody<CreatePostRequest>,
) -> AppResult<Json<Post>> {
    let new_post = body.validate()?;
    let mut conn = state.db.get()?;
    Ok(Json(posts::create(&mut conn, &current.user.id, &new_post)?))
}

async fn add_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<CommentRequest>,
) -> AppResult<Json<Post>> {
    let comment = body.validate()?;
    let conn = state.db.get()?;
    Ok(Json(posts::add_comment(
        &conn,
        &id,
        &current.user.id,
        &comment,
    )?))
}

async fn delete_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let conn = state.db.get()?;
    Ok(Json(posts::delete_comment(&conn, &id, &current.user.id)?))
}

async fn like(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let mut conn = state.db.get()?;
    Ok(Json(posts::like(&mut conn, &id, &current.user.id)?))
}

async fn unlike(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let mut conn = state.db.get()?;
    Ok(Json(posts::unlike(&mut conn, &id, &current.user.id)?))
}

async fn update_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdatePostRequest>,
) -> AppResult<Json<Post>> {
    let changes = body.validate()?;
    let conn = state.db.get()?;
    Ok(Json(posts::update(&conn, &id, &current.user.id, &changes)?))
}

async fn delete_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let mut conn = state.db.get()?;
    Ok(Json(posts::delete(&mut conn, &id, &current.user.id)?))
}

// --- Reads ---

async fn search_posts(
    State(state): State<AppState>,
    Path(text): Path<String>,
) -> AppResult<Json<SearchResults>> {
    let conn = state.db.get()?;
    Ok(Json(search::search(&conn, &text)?))
}

async fn my_posts(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::list_by_owner(&conn, &current.user.id)?))
}

async fn all_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::list_all(&conn)?))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let conn = state.db.get()?;
    Ok(Json(posts::get_by_id(&conn, &id)?))
}

async fn get_by_user_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    if !users::exists(&conn, &id)? {
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(Json(posts::list_by_owner(&conn, &id)?))
}

async fn get_by_nickname(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    let user = users::find_by_nickname(&conn, &nickname)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(posts::list_by_owner(&conn, &user.id)?))
}

fn popular_page(state: &AppState, raw: Option<&str>) -> AppResult<Json<Vec<Post>>> {
    let page = Page::parse(raw, state.config.posts.page_size);
    let conn = state.db.get()?;
    Ok(Json(posts::list_popular(&conn, page)?))
}

fn recent_page(state: &AppState, raw: Option<&str>) -> AppResult<Json<Vec<Post>>> {
    let page = Page::parse(raw, state.config.posts.page_size);
    let conn = state.db.get()?;
    Ok(Json(posts::list_recent(&conn, page)?))
}

async fn popular(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    popular_page(&state, Some(&page))
}

async fn popular_first_page(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    popular_page(&state, None)
}

async fn recent(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    recent_page(&state, Some(&page))
}

async fn recent_first_page(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    recent_page(&state, None)
}
