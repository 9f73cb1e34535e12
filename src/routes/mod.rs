mod auth;
mod health_check;
mod users;

pub use auth::{login, logout, refresh, request_password_reset, resend_verification};
pub use health_check::health_check;
pub use users::{confirm_email, create_user, get_current_user, reset_password};
