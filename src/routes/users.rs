use crate::{
    auth::{
        normalize_email,
        password::{hash_password_off_thread, verify_password_off_thread},
        removal_cookie, session_cookie, AuthResponse, AuthenticatedUser, ChangePasswordRequest,
        LoginRequest, MaybeUser, PasswordResetRequest, PasswordVerifyRequest, RegisterRequest,
        ResendVerificationRequest, VerifyRequest,
    },
    error::AppError,
    mailer::{self, deliver},
    models::{NewUser, PublicUserResponse, User, UserResponse},
    state::AppState,
    verification::{CodeError, CodePurpose},
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::{validate_email, Validate};

/// Issues a one-time code for `purpose` and emails it to the account owner.
///
/// Fails with [`CodeError::TooSoon`] when the previous code was sent too recently.
async fn send_code(state: &AppState, user: &User, purpose: CodePurpose) -> Result<(), CodeError> {
    let code = state.codes.issue(purpose, user.id)?;
    let ttl = state.code_ttl_minutes();
    let email = match purpose {
        CodePurpose::Registration => {
            mailer::verification_email(&user.email, &user.username, &code, ttl)
        }
        CodePurpose::PasswordReset => {
            mailer::password_reset_email(&user.email, &user.username, &code, ttl)
        }
    };
    deliver(state.mailer.as_ref(), email).await;
    Ok(())
}

/// Like [`send_code`], but a throttled request only leaves a log line.
async fn send_code_quietly(state: &AppState, user: &User, purpose: CodePurpose) {
    if let Err(err) = send_code(state, user, purpose).await {
        log::info!("Not sending a new {:?} code to user {}: {:?}", purpose, user.id, err);
    }
}

/// Signs a token for `user` and returns it both as the session cookie and in the body.
fn start_session(state: &AppState, user: &User) -> Result<HttpResponse, AppError> {
    let token = state.tokens.generate_token(user)?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&token, state.tokens.ttl(), state.cookie_secure))
        .json(AuthResponse {
            token,
            user: UserResponse::from(user),
        }))
}

async fn user_by_id(state: &AppState, user_id: i64) -> Result<User, AppError> {
    state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User not found: {}", user_id)))
}

/// Register a new account
///
/// Creates an unverified user and emails a registration code. A pending
/// (unverified) registration for the same email address is replaced.
///
/// ## Responses:
/// - `201 Created`: the new `UserResponse`.
/// - `409 Conflict`: email or username already taken.
/// - `422 Unprocessable Entity`: invalid email, username or password.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let mut request = payload.into_inner();
    request.email = normalize_email(&request.email);
    request.validate()?;

    let discarded = state.store.delete_unverified_user(&request.email).await?;
    if discarded > 0 {
        log::info!("Discarded pending registration for {}", request.email);
    }

    let password_hash = hash_password_off_thread(request.password, state.bcrypt_cost).await?;
    let user = state
        .store
        .create_user(NewUser {
            email: request.email,
            username: request.username,
            password_hash,
        })
        .await?;

    log::info!("Registered user {} ({})", user.id, user.username);
    send_code_quietly(&state, &user, CodePurpose::Registration).await;

    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}

/// Confirm a registration code
///
/// Marks the account verified and starts a session.
#[patch("/verify")]
pub async fn verify(
    state: web::Data<AppState>,
    payload: web::Json<VerifyRequest>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let user = user_by_id(&state, payload.user_id).await?;
    if user.is_verified {
        return Err(AppError::BadRequest("User already verified".into()));
    }

    state
        .codes
        .verify(CodePurpose::Registration, user.id, &payload.code)?;

    let user = state
        .store
        .mark_user_verified(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User not found: {}", payload.user_id)))?;

    log::info!("User {} verified their email", user.id);
    deliver(
        state.mailer.as_ref(),
        mailer::welcome_email(&user.email, &user.username),
    )
    .await;

    start_session(&state, &user)
}

/// Send a fresh registration code
///
/// Answers 202 for every existing account; a code is only sent while the
/// account is still unverified. Asking again before the resend interval has
/// passed answers 429.
#[post("/resend-verification")]
pub async fn resend_verification(
    state: web::Data<AppState>,
    payload: web::Json<ResendVerificationRequest>,
) -> Result<impl Responder, AppError> {
    let user = user_by_id(&state, payload.user_id).await?;
    if !user.is_verified {
        send_code(&state, &user, CodePurpose::Registration).await?;
    }
    Ok(HttpResponse::Accepted().finish())
}

/// Log in with an email address or username
///
/// ## Responses:
/// - `200 OK`: `AuthResponse`, with the session cookie set.
/// - `401 Unauthorized`: unknown login or wrong password.
/// - `403 Forbidden`: the account is not verified yet; a new code was emailed
///   unless one went out within the resend interval. The body carries `userId`.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;
    let LoginRequest { login, password } = payload.into_inner();

    let lookup = if login.contains('@') {
        normalize_email(&login)
    } else {
        login.trim().to_string()
    };

    let user = match state.store.find_user_by_login(&lookup).await? {
        Some(user) => user,
        None => return Err(AppError::Unauthorized("Invalid credentials".into())),
    };

    if !verify_password_off_thread(password, user.password_hash.clone()).await? {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !user.is_verified {
        send_code_quietly(&state, &user, CodePurpose::Registration).await;
        return Err(AppError::Unverified(user.id));
    }

    log::info!("User {} logged in", user.id);
    start_session(&state, &user)
}

/// Log out
///
/// Clears the session cookie. Works with or without a valid session.
#[post("/logout")]
pub async fn logout(state: web::Data<AppState>) -> impl Responder {
    logout_response(&state)
}

#[get("/logout")]
pub async fn logout_get(state: web::Data<AppState>) -> impl Responder {
    logout_response(&state)
}

fn logout_response(state: &AppState) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(removal_cookie(state.cookie_secure))
        .json(json!({ "message": "Logged out" }))
}

/// The caller's own account
#[get("/me")]
pub async fn me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = user_by_id(&state, user.id()).await?;
    if !user.is_verified {
        return Err(AppError::Unverified(user.id));
    }
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// Delete the caller's account
///
/// Follows, experience and skills go with it.
#[delete("/me")]
pub async fn delete_me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    if !state.store.delete_user(user.id()).await? {
        return Err(AppError::NotFound(format!("User not found: {}", user.id())));
    }
    state.codes.revoke_all(user.id());

    log::info!("User {} deleted their account", user.id());
    Ok(HttpResponse::NoContent()
        .cookie(removal_cookie(state.cookie_secure))
        .finish())
}

/// Request a password reset code
///
/// Always answers 202 so the endpoint cannot be used to probe for accounts.
#[post("/password/reset")]
pub async fn password_reset(
    state: web::Data<AppState>,
    payload: web::Json<PasswordResetRequest>,
) -> Result<impl Responder, AppError> {
    let email = normalize_email(&payload.email);
    if validate_email(email.as_str()) {
        match state.store.find_user_by_email(&email).await? {
            Some(user) if user.is_verified => {
                send_code_quietly(&state, &user, CodePurpose::PasswordReset).await;
            }
            _ => log::info!("Password reset requested without a verified account: {}", email),
        }
    }
    Ok(HttpResponse::Accepted().finish())
}

/// Exchange a password reset code for a session
///
/// The client is expected to follow up with `PATCH /users/password/change`.
#[post("/password/verify")]
pub async fn password_verify(
    state: web::Data<AppState>,
    payload: web::Json<PasswordVerifyRequest>,
) -> Result<impl Responder, AppError> {
    let mut request = payload.into_inner();
    request.email = normalize_email(&request.email);
    request.validate()?;

    let user = state
        .store
        .find_user_by_email(&request.email)
        .await?
        .filter(|user| user.is_verified)
        .ok_or_else(|| AppError::BadRequest("Invalid or expired code".into()))?;

    state
        .codes
        .verify(CodePurpose::PasswordReset, user.id, &request.code)?;

    log::info!("User {} signed in with a password reset code", user.id);
    start_session(&state, &user)
}

/// Change the caller's password
#[patch("/password/change")]
pub async fn password_change(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let account = user_by_id(&state, user.id()).await?;
    if !account.is_verified {
        return Err(AppError::Unverified(account.id));
    }

    let password_hash =
        hash_password_off_thread(payload.into_inner().new_password, state.bcrypt_cost).await?;
    if !state.store.update_password(account.id, &password_hash).await? {
        return Err(AppError::NotFound(format!("User not found: {}", account.id)));
    }

    log::info!("User {} changed their password", account.id);
    deliver(
        state.mailer.as_ref(),
        mailer::password_changed_email(&account.email, &account.username),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed" })))
}

/// Public profile
///
/// `isFollowed` reflects the caller when a session is present.
#[get("/{username}")]
pub async fn profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
    viewer: MaybeUser,
) -> Result<impl Responder, AppError> {
    let username = path.into_inner();
    let user = state
        .store
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User not found: {}", username)))?;

    let is_followed = match viewer.id() {
        Some(viewer_id) if viewer_id != user.id => state.store.is_following(viewer_id, user.id).await?,
        _ => false,
    };

    Ok(HttpResponse::Ok().json(PublicUserResponse {
        id: user.id,
        username: user.username,
        is_followed,
        followers_count: state.store.follower_count(user.id).await?,
        following_count: state.store.following_count(user.id).await?,
        created_at: user.created_at,
    }))
}
