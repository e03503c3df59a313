//! Module containing HTTP handlers, and the route table mapping paths to them.

use actix_web::web;

use crate::config::ServerConfig;

pub mod auth;
pub mod dashboard;
pub mod health;

/// Registers all routes. Dashboard routes are mounted under the proxy path, login and logout
/// only when `auth_enabled` is set.
pub fn configure(cfg: &mut web::ServiceConfig, server: &ServerConfig, auth_enabled: bool) {
    // registered first, the proxy scope may be empty and would otherwise match everything
    cfg.route("/healthcheck", web::get().to(health::index));

    let mut scope = web::scope(&server.proxy_path)
        .route("", web::get().to(dashboard::index))
        .route("/", web::get().to(dashboard::index))
        .route("/queues/{queue_name}", web::get().to(dashboard::queue_page))
        .route("/api/queues", web::get().to(dashboard::api_queues))
        .route("/api/queues/{queue_name}", web::get().to(dashboard::api_queue))
        .route("/api/queues/{queue_name}/jobs", web::get().to(dashboard::api_jobs));

    if auth_enabled {
        scope = scope
            .service(
                web::resource("/login")
                    .route(web::get().to(auth::login_form))
                    .route(web::post().to(auth::login)),
            )
            .route("/logout", web::get().to(auth::logout));
    }

    cfg.service(scope);
}
