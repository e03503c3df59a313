//! Dashboard login: credential verification and server-held sessions.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sha2::Sha256;

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Identity given to every successfully authenticated user.
pub const USER_ID: &str = "bull-board";

/// Name of the cookie carrying the session ID.
pub const SESSION_COOKIE: &str = "bullwatch.sid";

const SESSION_ID_LEN: usize = 32;

/// An authenticated dashboard user.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: String,
}

impl User {
    fn fixed() -> Self {
        User { id: USER_ID.to_owned() }
    }
}

/// Checks a username/password pair.
///
/// Implementations return `None` for any mismatch; a failed login is never an error.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Option<User>;
}

/// Accepts exactly one configured username/password pair, compared as plain strings.
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    login: String,
    password: String,
}

impl StaticCredentials {
    pub fn new<S: Into<String>>(login: S, password: S) -> Self {
        StaticCredentials {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Builds the verifier from configuration, if login is enabled.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        match (&config.login, &config.password) {
            (Some(login), Some(password)) => Some(Self::new(login.as_str(), password.as_str())),
            _ => None,
        }
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> Option<User> {
        if username == self.login && password == self.password {
            Some(User::fixed())
        } else {
            None
        }
    }
}

#[derive(Clone, Debug)]
struct Session {
    user: User,
    created_at: DateTime<Utc>,
}

/// Server-held sessions, referenced from the client by a signed cookie.
///
/// Sessions live in memory only and are lost on restart.
pub struct SessionStore {
    secret: Vec<u8>,
    max_age: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new<S: AsRef<[u8]>>(secret: S, max_age: Duration) -> Self {
        SessionStore {
            secret: secret.as_ref().to_vec(),
            max_age,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Uses the configured secret, or generates a random one if none is configured.
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = match &config.session_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("SESSION_SECRET not set, generating one; sessions won't be shared between instances");
                random_string(64)
            }
        };
        Self::new(secret, config.session_max_age)
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn sign(&self, id: &str) -> String {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        };
        mac.update(id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify_signature(&self, id: &str, signature: &str) -> bool {
        let signature = match hex::decode(signature) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Session>> {
        match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Starts a session for `user`, returning the value to store in the session cookie.
    pub fn create(&self, user: User) -> String {
        let id = random_string(SESSION_ID_LEN);
        let cookie = format!("{}.{}", id, self.sign(&id));
        debug!("Created session for user '{}'", user.id);
        self.write().insert(id, Session { user, created_at: Utc::now() });
        cookie
    }

    /// Returns the user for a session cookie value, if its signature is valid and the session
    /// exists and hasn't expired. Expired sessions are removed.
    pub fn lookup(&self, cookie: &str) -> Option<User> {
        self.lookup_at(cookie, Utc::now())
    }

    fn lookup_at(&self, cookie: &str, now: DateTime<Utc>) -> Option<User> {
        let (id, signature) = cookie.split_once('.')?;
        if !self.verify_signature(id, signature) {
            warn!("Rejected session cookie with invalid signature");
            return None;
        }

        let mut sessions = self.write();
        let session = sessions.get(id)?;
        let age = now.signed_duration_since(session.created_at).to_std().unwrap_or_default();
        if age > self.max_age {
            debug!("Session for user '{}' expired", session.user.id);
            sessions.remove(id);
            return None;
        }
        Some(session.user.clone())
    }

    /// Ends the session for a cookie value. Unknown or forged cookies are ignored.
    pub fn destroy(&self, cookie: &str) {
        if let Some((id, signature)) = cookie.split_once('.') {
            if self.verify_signature(id, signature) {
                self.write().remove(id);
            }
        }
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
