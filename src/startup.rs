use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthServices;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    confirm_email, create_user, get_current_user, health_check, login, logout, refresh,
    request_password_reset, resend_verification, reset_password,
};

pub fn run(listener: TcpListener, services: AuthServices) -> Result<Server, std::io::Error> {
    let codec = services.codec.clone();
    let services = web::Data::new(services);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(services.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::get().to(refresh))
            .route("/auth/reset", web::post().to(request_password_reset))
            .route("/auth/resend-verification", web::post().to(resend_verification))
            .route("/users/create", web::post().to(create_user))
            .route("/users/reset-pwd", web::post().to(reset_password))
            .route("/users/confirm", web::post().to(confirm_email))
            // Routes behind the access token
            .service(
                web::resource("/auth/logout")
                    .wrap(JwtMiddleware::new(codec.clone()))
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/users/me")
                    .wrap(JwtMiddleware::new(codec.clone()))
                    .route(web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
