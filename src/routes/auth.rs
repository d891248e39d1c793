use crate::{
    app::AppState,
    auth::{
        generate_reset_token, hash_password, hash_reset_token, verify_password, AuthResponse,
        Authentication, CurrentUser, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest,
        SignupRequest, UpdatePasswordRequest, JWT_COOKIE,
    },
    error::AppError,
    mailer::Email,
    models::{NewUser, PasswordReset, User},
    store::StoreError,
};
use actix_web::cookie::{time, Cookie};
use actix_web::{http::StatusCode, patch, post, web, HttpRequest, HttpResponse, Responder};
use chrono::{Duration, Utc};
use serde_json::json;
use validator::Validate;

use crate::auth::password::RESET_TOKEN_TTL_MINUTES;

/// The `jwt` cookie. `Secure` when the request arrived over https.
fn session_cookie(req: &HttpRequest, token: &str, days: i64) -> Cookie<'static> {
    let secure = req.connection_info().scheme() == "https";
    Cookie::build(JWT_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(secure)
        .max_age(time::Duration::days(days))
        .finish()
}

/// Issues a token for `user` and sends it in the body and as a cookie.
fn send_token(
    state: &AppState,
    req: &HttpRequest,
    user: User,
    status: StatusCode,
) -> Result<HttpResponse, AppError> {
    let token = state.tokens.issue(user.id)?;
    let cookie = session_cookie(req, &token, state.cookie_expires_in_days);
    Ok(HttpResponse::build(status)
        .cookie(cookie)
        .json(AuthResponse::new(token, user.into())))
}

/// Register a new user
///
/// Creates the account and logs it in. A taken email is a 400.
#[post("/signup")]
pub async fn signup(
    state: web::Data<AppState>,
    req: HttpRequest,
    signup_data: web::Json<SignupRequest>,
) -> Result<impl Responder, AppError> {
    signup_data.validate()?;
    let signup_data = signup_data.into_inner();

    let password_hash = hash_password(&signup_data.password, state.bcrypt_cost)?;
    let user = state
        .store
        .insert_user(NewUser {
            name: signup_data.name,
            email: signup_data.email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(field) if field == "email" => {
                AppError::BadRequest("Email already in use".into())
            }
            other => other.into(),
        })?;

    log::info!("User {} signed up", user.id);
    send_token(&state, &req, user, StatusCode::CREATED)
}

/// Login user
///
/// Authenticates a user and returns an authentication token.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let user = state.store.user_by_email(&login_data.email).await?;
    match user {
        Some(user) if verify_password(&login_data.password, &user.password_hash)? => {
            send_token(&state, &req, user, StatusCode::OK)
        }
        _ => Err(AppError::Unauthorized("Incorrect email or password".into())),
    }
}

/// Clears the session cookie.
#[post("/logout")]
pub async fn logout() -> impl Responder {
    let mut cookie = Cookie::build(JWT_COOKIE, "").path("/").http_only(true).finish();
    cookie.make_removal();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "status": "success" }))
}

/// Mails a single-use reset link valid for ten minutes.
#[post("/forgotPassword")]
pub async fn forgot_password(
    state: web::Data<AppState>,
    request: web::Json<ForgotPasswordRequest>,
) -> Result<impl Responder, AppError> {
    request.validate()?;

    let user = state
        .store
        .user_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with that email address.".into()))?;

    let (token, token_hash) = generate_reset_token();
    let reset = PasswordReset {
        token_hash,
        expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
    };
    state.store.set_password_reset(user.id, Some(reset)).await?;

    let reset_url = format!("{}/reset-password/{}", state.frontend_url, token);
    if let Err(err) = state
        .mailer
        .send(Email::password_reset(&user.email, &reset_url))
        .await
    {
        log::error!("Failed to send reset email to {}: {}", user.id, err);
        state.store.set_password_reset(user.id, None).await?;
        return Err(AppError::InternalServerError(
            "There was an error sending the email. Try again later!".into(),
        ));
    }

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Token sent to email!"
    })))
}

#[patch("/resetPassword/{token}")]
pub async fn reset_password(
    state: web::Data<AppState>,
    req: HttpRequest,
    token: web::Path<String>,
    request: web::Json<ResetPasswordRequest>,
) -> Result<impl Responder, AppError> {
    request.validate()?;

    let token_hash = hash_reset_token(&token.into_inner());
    let user = state
        .store
        .user_by_reset_token(&token_hash, Utc::now())
        .await?
        .ok_or_else(|| AppError::BadRequest("Token is invalid or has expired".into()))?;

    let password_hash = hash_password(&request.password, state.bcrypt_cost)?;
    let user = state.store.set_password(user.id, &password_hash).await?;
    log::info!("Password reset for user {}", user.id);
    send_token(&state, &req, user, StatusCode::OK)
}

#[patch("/updateMyPassword", wrap = "Authentication::protect()")]
pub async fn update_my_password(
    state: web::Data<AppState>,
    req: HttpRequest,
    current: CurrentUser,
    request: web::Json<UpdatePasswordRequest>,
) -> Result<impl Responder, AppError> {
    request.validate()?;
    let user = current.0;

    if !verify_password(&request.password_current, &user.password_hash)? {
        return Err(AppError::Unauthorized("Your current password is wrong.".into()));
    }

    let password_hash = hash_password(&request.password, state.bcrypt_cost)?;
    let user = state.store.set_password(user.id, &password_hash).await?;
    send_token(&state, &req, user, StatusCode::OK)
}
