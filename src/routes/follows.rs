use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{FollowRequest, Page, UnfollowRequest, User},
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;

async fn user_by_username(state: &AppState, username: &str) -> Result<User, AppError> {
    state
        .store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User not found: {}", username)))
}

/// Follow another user
///
/// Following someone twice is accepted and changes nothing.
///
/// ## Responses:
/// - `201 Created`: the caller now follows `followedId`.
/// - `400 Bad Request`: the caller tried to follow themselves.
/// - `404 Not Found`: no such user.
#[post("/follow")]
pub async fn follow(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<FollowRequest>,
) -> Result<impl Responder, AppError> {
    let followed_id = payload.followed_id;
    if followed_id == user.id() {
        return Err(AppError::BadRequest("You cannot follow yourself".into()));
    }
    if state.store.find_user_by_id(followed_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User not found: {}", followed_id)));
    }

    if state.store.follow(user.id(), followed_id).await? {
        log::info!("User {} followed {}", user.id(), followed_id);
    }

    Ok(HttpResponse::Created().json(json!({ "followedId": followed_id })))
}

/// Stop following a user
#[post("/unfollow")]
pub async fn unfollow(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<UnfollowRequest>,
) -> Result<impl Responder, AppError> {
    let unfollowed_id = payload.unfollowed_id;
    if unfollowed_id == user.id() {
        return Err(AppError::BadRequest("You cannot unfollow yourself".into()));
    }

    if state.store.unfollow(user.id(), unfollowed_id).await? {
        log::info!("User {} unfollowed {}", user.id(), unfollowed_id);
    }

    Ok(HttpResponse::Ok().json(json!({ "unfollowedId": unfollowed_id })))
}

/// Users following `username`, most recent first
#[get("/{username}/followers")]
pub async fn followers(
    state: web::Data<AppState>,
    path: web::Path<String>,
    page: web::Query<Page>,
) -> Result<impl Responder, AppError> {
    let user = user_by_username(&state, &path).await?;
    let followers = state.store.followers(user.id, page.into_inner()).await?;
    Ok(HttpResponse::Ok().json(followers))
}

/// Users `username` follows, most recent first
#[get("/{username}/following")]
pub async fn following(
    state: web::Data<AppState>,
    path: web::Path<String>,
    page: web::Query<Page>,
) -> Result<impl Responder, AppError> {
    let user = user_by_username(&state, &path).await?;
    let following = state.store.following(user.id, page.into_inner()).await?;
    Ok(HttpResponse::Ok().json(following))
}
