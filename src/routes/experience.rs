use crate::{
    auth::AuthenticatedUser, error::AppError, models::ExperienceInput, state::AppState,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

/// Adds a timeline entry for the caller.
///
/// ## Responses:
/// - `201 Created`: the stored `Experience`.
/// - `422 Unprocessable Entity`: field lengths, or an end date that precedes the
///   start date or accompanies a current position.
#[post("")]
pub async fn create_experience(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<ExperienceInput>,
) -> Result<impl Responder, AppError> {
    payload.check()?;

    let experience = state.store.create_experience(user.id(), &payload).await?;
    log::info!("User {} added experience {}", user.id(), experience.id);

    Ok(HttpResponse::Created().json(experience))
}

/// Replaces one of the caller's timeline entries.
///
/// Entries owned by someone else are reported as missing.
#[put("/{id}")]
pub async fn update_experience(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    payload: web::Json<ExperienceInput>,
) -> Result<impl Responder, AppError> {
    payload.check()?;
    let id = path.into_inner();

    let experience = state
        .store
        .update_experience(id, user.id(), &payload)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Experience not found: {}", id)))?;

    Ok(HttpResponse::Ok().json(experience))
}

#[delete("/{id}")]
pub async fn delete_experience(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    if !state.store.delete_experience(id, user.id()).await? {
        return Err(AppError::NotFound(format!("Experience not found: {}", id)));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// A user's timeline, newest start date first.
#[get("/{user_id}/experience")]
pub async fn user_experience(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let user_id = path.into_inner();
    if state.store.find_user_by_id(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User not found: {}", user_id)));
    }

    let entries = state.store.experiences_for_user(user_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}
