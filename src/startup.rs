use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::TokenLifecycleManager;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{current_session, health_check, login, refresh, revoke, session_history};

pub fn run(listener: TcpListener, manager: TokenLifecycleManager) -> Result<Server, std::io::Error> {
    let encoder = manager.encoder().clone();
    let manager = web::Data::new(manager);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(manager.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/revoke", web::post().to(revoke))
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(encoder.clone()))
                    .route("/me", web::get().to(current_session))
                    .service(
                        web::scope("/admin")
                            .wrap(JwtMiddleware::new(encoder.clone()).require_role("admin"))
                            .route("/sessions/{session_id}", web::get().to(session_history)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
