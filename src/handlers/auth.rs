//! HTTP handlers for logging in and out, and the extractor guarding dashboard routes.

use std::fmt;
use std::future::{ready, Ready};

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::{header, StatusCode};
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, Responder, ResponseError};
use log::{error, info, warn};
use serde::Deserialize;

use crate::application::auth::SESSION_COOKIE;
use crate::application::User;
use crate::models::ApplicationState;
use super::dashboard::html;

/// Logged in user for a request, or `None` when login is disabled.
///
/// Extracting this from a request that has no valid session redirects to the login page.
pub struct CurrentUser(pub Option<User>);

/// Redirect sent in place of a page requiring login.
#[derive(Debug)]
pub struct LoginRequired {
    login_page: String,
}

impl fmt::Display for LoginRequired {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "login required")
    }
}

impl ResponseError for LoginRequired {
    fn status_code(&self) -> StatusCode {
        StatusCode::FOUND
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Found()
            .insert_header((header::LOCATION, self.login_page.as_str()))
            .finish()
    }
}

impl FromRequest for CurrentUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let data = match req.app_data::<web::Data<ApplicationState>>() {
            Some(data) => data,
            None => {
                error!("Application state missing from request");
                return ready(Err(actix_web::error::ErrorInternalServerError("missing state")));
            }
        };

        if !data.auth_enabled() {
            return ready(Ok(CurrentUser(None)));
        }

        let user = req.cookie(SESSION_COOKIE).and_then(|c| data.sessions.lookup(c.value()));
        match user {
            Some(user) => ready(Ok(CurrentUser(Some(user)))),
            None => ready(Err(LoginRequired {
                login_page: data.config.server.login_page.clone(),
            }
            .into())),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginQuery {
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

fn cookie_path(data: &ApplicationState) -> String {
    if data.config.server.proxy_path.is_empty() {
        "/".to_owned()
    } else {
        data.config.server.proxy_path.clone()
    }
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().insert_header((header::LOCATION, location)).finish()
}

/// Handles `GET {login}`, rendering the login form.
pub async fn login_form(query: web::Query<LoginQuery>, data: web::Data<ApplicationState>) -> impl Responder {
    html(data.views.login(
        &data.config.ui,
        &data.config.server.login_page,
        query.error.is_some(),
    ))
}

/// Handles `POST {login}`, starting a session on valid credentials.
///
/// # Returns
///
/// * 302 - to the dashboard with a session cookie on success, or back to the login form with an
///   error flag on failure
pub async fn login(form: web::Form<LoginForm>, data: web::Data<ApplicationState>) -> impl Responder {
    let form = form.into_inner();
    let verifier = match &data.verifier {
        Some(verifier) => verifier,
        None => return redirect(&data.config.server.home_page),
    };

    match verifier.verify(&form.username, &form.password) {
        Some(user) => {
            info!("User '{}' logged in", user.id);
            let max_age = data.sessions.max_age().as_secs().min(i64::MAX as u64) as i64;
            let cookie = Cookie::build(SESSION_COOKIE, data.sessions.create(user))
                .path(cookie_path(&data))
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(max_age))
                .finish();
            HttpResponse::Found()
                .insert_header((header::LOCATION, data.config.server.home_page.as_str()))
                .cookie(cookie)
                .finish()
        }
        None => {
            warn!("Failed login attempt for user '{}'", form.username);
            redirect(&format!("{}?error=1", data.config.server.login_page))
        }
    }
}

/// Handles `GET {logout}`, ending the current session.
pub async fn logout(req: HttpRequest, data: web::Data<ApplicationState>) -> impl Responder {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        data.sessions.destroy(cookie.value());
    }

    let mut removal = Cookie::build(SESSION_COOKIE, "").path(cookie_path(&data)).finish();
    removal.make_removal();
    HttpResponse::Found()
        .insert_header((header::LOCATION, data.config.server.login_page.as_str()))
        .cookie(removal)
        .finish()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn login_required_redirects() {
        let err = LoginRequired { login_page: "/bull/login".to_owned() };
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/bull/login");
    }
}
