use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{SkillQuery, UpdateSkillsRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    state::AppState,
};
use actix_web::{get, put, web, HttpResponse, Responder};
use validator::Validate;

/// Catalogue entries matching `?q=`, alphabetical. `?limit=` caps the result.
#[get("/suggestions")]
pub async fn suggestions(
    state: web::Data<AppState>,
    query: web::Query<SkillQuery>,
) -> Result<impl Responder, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    let skills = state.store.search_skills(needle, limit).await?;
    Ok(HttpResponse::Ok().json(skills))
}

/// Replaces the caller's skill set.
///
/// ## Responses:
/// - `200 OK`: the new list, alphabetical.
/// - `400 Bad Request`: an id is not in the catalogue; nothing is changed.
/// - `422 Unprocessable Entity`: more than 50 ids.
#[put("")]
pub async fn update_skills(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<UpdateSkillsRequest>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let skills = state
        .store
        .replace_user_skills(user.id(), &payload.unique_ids())
        .await?;
    log::info!("User {} now lists {} skills", user.id(), skills.len());

    Ok(HttpResponse::Ok().json(skills))
}

#[get("/{user_id}/skills")]
pub async fn user_skills(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let user_id = path.into_inner();
    if state.store.find_user_by_id(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User not found: {}", user_id)));
    }

    let skills = state.store.user_skills(user_id).await?;
    Ok(HttpResponse::Ok().json(skills))
}
