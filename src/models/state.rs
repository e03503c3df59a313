//! Defines server state, typically passed to HTTP handlers by Actix web as required.

use std::sync::Arc;

use deadpool_redis::Pool;

use crate::application::{Board, CredentialVerifier, SessionStore, StaticCredentials};
use crate::config::Config;
use crate::models::BoardResult;
use crate::views::Views;

pub struct ApplicationState {
    pub pool: Pool,
    pub config: Config,
    pub board: Arc<Board>,
    pub sessions: SessionStore,
    pub views: Views,

    /// Verifies login attempts. Login is disabled when `None`.
    pub verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl ApplicationState {
    /// Builds state using the credential check from configuration.
    pub fn new(pool: Pool, config: Config, board: Arc<Board>) -> BoardResult<Self> {
        let verifier = StaticCredentials::from_config(&config.auth)
            .map(|creds| Arc::new(creds) as Arc<dyn CredentialVerifier>);
        Self::with_verifier(pool, config, board, verifier)
    }

    /// Builds state with a custom credential check, e.g. one backed by hashed passwords.
    pub fn with_verifier(
        pool: Pool,
        config: Config,
        board: Arc<Board>,
        verifier: Option<Arc<dyn CredentialVerifier>>,
    ) -> BoardResult<Self> {
        let sessions = SessionStore::from_config(&config.auth);
        let views = Views::new()?;
        Ok(ApplicationState { pool, config, board, sessions, views, verifier })
    }

    pub fn auth_enabled(&self) -> bool {
        self.verifier.is_some()
    }
}
