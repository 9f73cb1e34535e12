/// Authentication Routes
///
/// Login, cookie-based refresh, logout and link requests.

use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::Deserialize;

use crate::auth::{AuthServices, LinkPurpose, SessionClaims, SessionCookieSet, REFRESH_COOKIE};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::store::UserResponse;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

pub(crate) fn with_cookies(mut response: HttpResponseBuilder, cookies: &SessionCookieSet) -> HttpResponseBuilder {
    cookies.apply(&mut response);
    response
}

/// POST /auth/login
///
/// Sets the `Authentication`, `Refresh` and `RefreshExist` cookies.
///
/// # Errors
/// - 401: Unknown user or wrong password, with the same message for both
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let (user, cookies) = auth.sessions.login(&form.username, &form.password).await?;

    Ok(with_cookies(HttpResponse::Ok(), &cookies).json(UserResponse::from(&user)))
}

/// GET /auth/refresh
///
/// Rotates the refresh token presented in the `Refresh` cookie.
///
/// # Errors
/// - 401: Missing, expired, forged, rotated-out or logged-out refresh token
pub async fn refresh(
    req: HttpRequest,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    let (user, cookies) = auth.refresh.refresh_presented(&presented).await?;

    Ok(with_cookies(HttpResponse::Ok(), &cookies).json(UserResponse::from(&user)))
}

/// POST /auth/logout
///
/// **Requires a valid access token.** Clears all three cookies.
pub async fn logout(
    claims: web::ReqData<SessionClaims>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let cookies = auth.sessions.logout(user_id).await?;

    Ok(with_cookies(HttpResponse::Ok(), &cookies)
        .json(serde_json::json!({ "message": "Logged out" })))
}

/// POST /auth/reset
///
/// Mails a password-reset link. Answers the same whether or not the account exists.
pub async fn request_password_reset(
    form: web::Json<EmailRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("password_reset_request");
    auth.links.request(&form.email, LinkPurpose::Reset).await?;

    tracing::info!(request_id = %context.request_id, "Password reset requested");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "If the account exists, a reset link has been sent"
    })))
}

/// POST /auth/resend-verification
pub async fn resend_verification(
    form: web::Json<EmailRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("resend_verification");
    auth.links.request(&form.email, LinkPurpose::Confirm).await?;

    tracing::info!(request_id = %context.request_id, "Verification email requested");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "If the account needs confirming, a link has been sent"
    })))
}
