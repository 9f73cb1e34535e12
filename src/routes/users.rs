/// User Routes
///
/// Registration, link consumption and the current user.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{AuthServices, SessionClaims};
use crate::error::{AppError, DatabaseError, ErrorContext};
use crate::routes::auth::with_cookies;
use crate::store::UserResponse;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
}

/// POST /users/create
///
/// Registers an inactive account, logs it in and mails a confirmation link.
///
/// # Errors
/// - 400: Invalid username, email or weak password
/// - 409: Username or email already taken
pub async fn create_user(
    form: web::Json<CreateUserRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let (user, cookies) = auth
        .register(&form.username, &form.email, &form.password)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );
    Ok(with_cookies(HttpResponse::Created(), &cookies).json(UserResponse::from(&user)))
}

/// POST /users/reset-pwd
///
/// # Errors
/// - 401: Bad or expired link
/// - 400: Link issued for another purpose, or weak password
pub async fn reset_password(
    form: web::Json<ResetPasswordRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    auth.links.reset_password(&form.token, &form.password).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password updated" })))
}

/// POST /users/confirm
///
/// # Errors
/// - 401: Bad or expired link
/// - 400: Already confirmed, or link issued for another purpose
pub async fn confirm_email(
    form: web::Json<ConfirmRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    auth.links.confirm_email(&form.token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Email confirmed" })))
}

/// GET /users/me
///
/// **Requires a valid access token.**
pub async fn get_current_user(
    claims: web::ReqData<SessionClaims>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("current_user").with_user_id(user_id.to_string());

    let user = match auth.store.find_by_id(user_id).await? {
        Some(user) => user,
        None => {
            let error = AppError::Database(DatabaseError::NotFound("User not found".to_string()));
            context.log_error(&error);
            return Err(error);
        }
    };

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}
