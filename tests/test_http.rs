//! HTTP tests run against an unreachable Redis, covering routing, login and error reporting.

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};

use bullwatch::application::auth::SESSION_COOKIE;
use bullwatch::application::{adapter_for, connection, Board};
use bullwatch::config::Config;
use bullwatch::handlers;
use bullwatch::models::options::{QueueOptions, RedisOptions};
use bullwatch::models::ApplicationState;

/// Builds configuration from the given variables, pointing Redis at a port nothing listens on.
fn config(vars: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("REDIS_HOST".to_owned(), "127.0.0.1".to_owned());
    env.insert("REDIS_PORT".to_owned(), "1".to_owned());
    env.insert("REDIS_CONNECT_TIMEOUT".to_owned(), "500".to_owned());
    for (k, v) in vars {
        env.insert((*k).to_owned(), (*v).to_owned());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

async fn state(config: Config, queues: &[&str]) -> web::Data<ApplicationState> {
    let redis_options = RedisOptions::from_config(&config.redis);
    let pool = connection::connect(&redis_options, 2).await.unwrap();
    let queue_options = QueueOptions::new(redis_options.clone(), &config.queue.prefix);
    let board = Arc::new(Board::new(redis_options.command_timeout));
    board.replace_queues(
        queues
            .iter()
            .map(|name| adapter_for(config.queue.kind, name, &queue_options))
            .collect(),
    );
    web::Data::new(ApplicationState::new(pool, config, board).unwrap())
}

macro_rules! app {
    ($state:expr) => {{
        let state = $state;
        let server = state.config.server.clone();
        let auth_enabled = state.auth_enabled();
        test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(|cfg| handlers::configure(cfg, &server, auth_enabled)),
        )
        .await
    }};
}

fn location(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned()
}

#[actix_web::test]
async fn healthcheck_reports_unreachable_redis() {
    let app = app!(state(config(&[]), &[]).await);

    let req = test::TestRequest::get().uri("/healthcheck").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["info"]["redis"]["description"], "Based on the Redis PING/PONG system");
    assert!(body["info"]["redis"]["error"].is_string());
    assert!(body["info"]["redis"].get("status").is_none());
}

#[actix_web::test]
async fn public_dashboard() {
    let app = app!(state(config(&[]), &[]).await);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains("<title>Bull</title>"));
    assert!(body.contains("No queues found."));

    let req = test::TestRequest::get().uri("/api/queues").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, serde_json::json!([]));

    // login isn't mounted without credentials
    let req = test::TestRequest::get().uri("/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn queue_errors() {
    let app = app!(state(config(&[]), &["mail"]).await);

    let req = test::TestRequest::get().uri("/api/queues/unknown").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/queues/unknown/jobs").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/queues/mail/jobs?state=sleeping").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // registered, but Redis can't be reached
    let req = test::TestRequest::get().uri("/api/queues/mail").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "mail");
    assert!(body["error"].is_string());

    let req = test::TestRequest::get().uri("/api/queues/mail/jobs?state=failed").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    // a start offset at the top of the range is not an overflow
    let uri = format!("/api/queues/mail/jobs?start={}", isize::MAX);
    let req = test::TestRequest::get().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn unreadable_queue_listed_as_unavailable() {
    let app = app!(state(config(&[]), &["mail"]).await);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains(">mail</a>"));
    assert!(body.contains("unavailable"));
}

#[actix_web::test]
async fn queue_links_are_url_encoded() {
    let app = app!(state(config(&[]), &["a#b?c"]).await);

    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains("<a href=\"/queues/a%23b%3Fc\">a#b?c</a>"));

    // the encoded link reaches the queue, which is registered but unreachable
    let req = test::TestRequest::get().uri("/api/queues/a%23b%3Fc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "a#b?c");
}

#[actix_web::test]
async fn login_flow() {
    let config = config(&[("USER_LOGIN", "admin"), ("USER_PASSWORD", "secret")]);
    let app = app!(state(config, &[]).await);

    // anonymous requests are sent to the login page
    for uri in &["/", "/api/queues", "/api/queues/mail"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "{}", uri);
        assert_eq!(location(&resp), "/login");
    }

    let req = test::TestRequest::get().uri("/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // wrong password
    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "admin"), ("password", "wrong")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login?error=1");
    assert!(resp.response().cookies().next().is_none());

    let req = test::TestRequest::get().uri("/login?error=1").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("Invalid username or password."));

    // correct credentials
    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "admin"), ("password", "secret")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .unwrap()
        .into_owned();
    assert_eq!(cookie.http_only(), Some(true));

    let req = test::TestRequest::get().uri("/").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // forged cookie
    let mut forged = cookie.clone();
    forged.set_value(format!("{}0", cookie.value()));
    let req = test::TestRequest::get().uri("/").cookie(forged).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/logout").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");

    // session no longer valid
    let req = test::TestRequest::get().uri("/").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    // health check never requires login
    let req = test::TestRequest::get().uri("/healthcheck").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn proxy_path() {
    let config = config(&[
        ("PROXY_PATH", "/bull/"),
        ("USER_LOGIN", "admin"),
        ("USER_PASSWORD", "secret"),
    ]);
    let app = app!(state(config, &[]).await);

    let req = test::TestRequest::get().uri("/bull").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/bull/login");

    let req = test::TestRequest::post()
        .uri("/bull/login")
        .set_form([("username", "admin"), ("password", "secret")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/bull");
    let cookie = resp.response().cookies().next().unwrap().into_owned();
    assert_eq!(cookie.path(), Some("/bull"));

    for uri in &["/bull", "/bull/", "/bull/api/queues"] {
        let req = test::TestRequest::get().uri(uri).cookie(cookie.clone()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
    }

    // not served outside the proxy path, except for the health check
    let req = test::TestRequest::get().uri("/api/queues").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/healthcheck").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
