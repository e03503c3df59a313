//! Main executable that runs the HTTP server for the queue dashboard.

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{debug, error, info, warn};

use bullwatch::application::{connection, discover_queues, start_queue_refresh, Board};
use bullwatch::config;
use bullwatch::handlers;
use bullwatch::models::options::{QueueOptions, RedisOptions};
use bullwatch::models::ApplicationState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = config::parse_config_from_cli_args();

    // RUST_LOG takes precedence over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.server.log_level.to_string()),
    )
    .init();

    let redis_options = RedisOptions::from_config(&config.redis);
    if redis_options.is_sentinel() {
        info!("Using Redis Sentinel with {} sentinel(s)", config.redis.sentinels.len());
    }
    let pool = match connection::connect(&redis_options, config.redis.pool_size).await {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("Failed to initialise Redis pool: {}", err);
            std::process::exit(1);
        }
    };

    let queue_options = QueueOptions::new(redis_options.clone(), &config.queue.prefix);
    let board = Arc::new(Board::new(redis_options.command_timeout));
    match discover_queues(&pool, &queue_options, config.queue.kind, &config.backoff).await {
        Ok(queues) => board.replace_queues(queues),
        Err(err) => error!("Failed to discover queues, starting with none: {}", err),
    }

    if let Some(interval) = config.queue.refresh_interval {
        start_queue_refresh(
            board.clone(),
            pool.clone(),
            queue_options,
            config.queue.kind,
            config.backoff.clone(),
            interval,
        );
    }

    let http_server_addr = config.server_addr();
    let server_config = config.server.clone();
    let num_workers = config.server.threads;
    let state = match ApplicationState::new(pool, config, board) {
        Ok(state) => web::Data::new(state),
        Err(err) => {
            eprintln!("Failed to initialise dashboard: {}", err);
            std::process::exit(1);
        }
    };
    let auth_enabled = state.auth_enabled();
    if auth_enabled {
        info!("Login required for dashboard at {}", server_config.login_page);
    } else {
        warn!("USER_LOGIN/USER_PASSWORD not set, dashboard is publicly accessible");
    }

    let home_page = server_config.home_page.clone();
    let mut http_server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            // add middleware logger for access log
            .wrap(Logger::default())
            .configure(|cfg| handlers::configure(cfg, &server_config, auth_enabled))
    });

    // set number of worker threads if configured, or default to number of logical CPUs
    if let Some(num_workers) = num_workers {
        debug!("Using {} HTTP worker threads", num_workers);
        http_server = http_server.workers(num_workers);
    }

    info!("Starting dashboard at http://{}{}", http_server_addr, home_page);
    http_server.bind(&http_server_addr)?.run().await
}
