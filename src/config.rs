//! Configuration parsing.
//!
//! All settings come from environment variables. A dotenv style file can be named on the command
//! line to populate the environment before it's read.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{debug, warn};
use structopt::StructOpt;

use crate::application::Backoff;
use crate::models::options::{parse_sentinels, SentinelAddr};
use crate::models::queue::QueueKind;
use crate::models::{BoardError, BoardResult};

/// Parsed command line options when the server application is started.
#[derive(Debug, StructOpt)]
#[structopt(name = "bullwatch")]
pub struct CliOpts {
    #[structopt(parse(from_os_str), help = "Path to a .env file to load before reading the environment")]
    env_file: Option<PathBuf>,
}

/// Loads the env file given on the command line (or `./.env` if present), then parses
/// configuration from the environment. Exits the process on invalid configuration.
pub fn parse_config_from_cli_args() -> Config {
    let opts = CliOpts::from_args();
    match opts.env_file {
        Some(path) => {
            if let Err(err) = load_env_file(&path) {
                eprintln!("Failed to load env file {}: {}", path.display(), err);
                std::process::exit(1);
            }
        }
        None => {
            if dotenvy::dotenv().is_err() {
                warn!("No env file specified or found, using process environment only");
            }
        }
    }

    match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}

/// Loads variables from a dotenv file into the process environment. Variables that are already
/// set take precedence.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> BoardResult<()> {
    let path = path.as_ref();
    debug!("Reading environment from {}", path.display());
    dotenvy::from_path(path).map_err(|err| BoardError::config(err.to_string()))
}

/// Main application config.
#[derive(Clone, Debug)]
pub struct Config {
    /// Configuration for the application's HTTP server.
    pub server: ServerConfig,

    /// Configuration for connecting to Redis.
    pub redis: RedisConfig,

    /// Which queues to look for and how.
    pub queue: QueueConfig,

    /// Retry policy used while constructing queue handles.
    pub backoff: Backoff,

    /// Dashboard login settings.
    pub auth: AuthConfig,

    /// Dashboard branding.
    pub ui: UiConfig,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> BoardResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration using the given variable lookup function.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> BoardResult<Self> {
        let env = Env(lookup);

        let proxy_path = normalize_proxy_path(&env.string("PROXY_PATH").unwrap_or_default());
        let server = ServerConfig {
            host: env.string("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: env.parse("PORT")?.unwrap_or(3000),
            threads: env.parse("SERVER_THREADS")?,
            home_page: if proxy_path.is_empty() { "/".to_owned() } else { proxy_path.clone() },
            login_page: format!("{}/login", proxy_path),
            logout_page: format!("{}/logout", proxy_path),
            proxy_path,
            log_level: match env.string("LOG_LEVEL") {
                Some(level) => log::Level::from_str(&level)
                    .map_err(|_| BoardError::config(format!("Invalid log level: {}", level)))?,
                None => log::Level::Info,
            },
        };

        let redis = RedisConfig {
            host: env.string("REDIS_HOST").unwrap_or_else(|| "localhost".to_owned()),
            port: env.parse("REDIS_PORT")?.unwrap_or(6379),
            db: env.parse("REDIS_DB")?.unwrap_or(0),
            username: env.string("REDIS_USER"),
            password: env.string("REDIS_PASSWORD"),
            use_tls: env.flag("REDIS_USE_TLS"),
            tls_insecure: env.flag("REDIS_TLS_INSECURE"),
            family: env.parse("REDIS_FAMILY")?.unwrap_or(0),
            connect_timeout: env.millis("REDIS_CONNECT_TIMEOUT")?,
            command_timeout: env.millis("REDIS_COMMAND_TIMEOUT")?,
            pool_size: env.parse("REDIS_POOL_SIZE")?.unwrap_or(4),
            sentinels: match env.string("REDIS_SENTINEL_HOSTS") {
                Some(raw) => parse_sentinels(&raw)?,
                None => Vec::new(),
            },
            sentinel_name: env.string("REDIS_SENTINEL_NAME").unwrap_or_else(|| "mymaster".to_owned()),
            sentinel_password: env.string("REDIS_SENTINEL_PASSWORD"),
        };

        let kind = QueueKind::from_version(&env.string("BULL_VERSION").unwrap_or_default());
        let queue = QueueConfig {
            prefix: env.string("BULL_PREFIX").unwrap_or_else(|| "bull".to_owned()),
            kind,
            refresh_interval: env.duration("QUEUE_REFRESH_INTERVAL")?.filter(|d| !d.is_zero()),
        };

        let defaults = Backoff::default();
        let backoff = Backoff {
            starting_delay: env.millis("BACKOFF_STARTING_DELAY")?.unwrap_or(defaults.starting_delay),
            max_delay: env.millis("BACKOFF_MAX_DELAY")?,
            time_multiple: env.parse("BACKOFF_TIME_MULTIPLE")?.unwrap_or(defaults.time_multiple),
            attempts: env.parse("BACKOFF_NB_ATTEMPTS")?.unwrap_or(defaults.attempts),
        };

        let auth = AuthConfig {
            login: env.string("USER_LOGIN"),
            password: env.string("USER_PASSWORD"),
            session_secret: env.string("SESSION_SECRET"),
            session_max_age: env.duration("SESSION_MAX_AGE")?.unwrap_or(Duration::from_secs(86400)),
        };

        let ui = UiConfig {
            title: env.string("BULL_BOARD_TITLE").unwrap_or_else(|| kind.display_name().to_owned()),
            logo_path: env.string("BULL_BOARD_LOGO_PATH"),
            logo_width: env.string("BULL_BOARD_LOGO_WIDTH"),
            logo_height: env.string("BULL_BOARD_LOGO_HEIGHT"),
            favicon: env.string("BULL_BOARD_FAVICON"),
            favicon_alternative: env.string("BULL_BOARD_FAVICON_ALTERNATIVE"),
            locale: env.string("BULL_BOARD_LOCALE").unwrap_or_else(|| "en-US".to_owned()),
            date_formats: DateFormats {
                short: env.string("BULL_BOARD_DATE_FORMATS_SHORT").unwrap_or_else(|| "%H:%M:%S".to_owned()),
                common: env
                    .string("BULL_BOARD_DATE_FORMATS_COMMON")
                    .unwrap_or_else(|| "%b %d, %H:%M:%S".to_owned()),
                full: env
                    .string("BULL_BOARD_DATE_FORMATS_FULL")
                    .unwrap_or_else(|| "%Y %b %d, %H:%M:%S".to_owned()),
            },
        };

        Ok(Config { server, redis, queue, backoff, auth, ui })
    }

    /// Get the address for the HTTP server to listen on.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Wraps a variable lookup function with typed accessors. Empty values count as unset.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> BoardResult<Option<T>> {
        match self.string(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| BoardError::config(format!("Unable to parse {}='{}'", key, raw))),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str) -> bool {
        match self.string(key) {
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            None => false,
        }
    }

    fn millis(&self, key: &str) -> BoardResult<Option<Duration>> {
        Ok(self.parse::<u64>(key)?.map(Duration::from_millis))
    }

    fn duration(&self, key: &str) -> BoardResult<Option<Duration>> {
        match self.string(key) {
            Some(raw) => humantime::parse_duration(raw.trim())
                .map(Some)
                .map_err(|err| BoardError::config(format!("Unable to parse {}='{}': {}", key, raw, err))),
            None => Ok(None),
        }
    }
}

/// Strips trailing slashes and ensures a leading slash on non-empty paths.
pub fn normalize_proxy_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{}", trimmed)
    }
}

/// Configuration for the application's HTTP server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to listen on. Defaults to "0.0.0.0".
    pub host: String,

    /// Port to listen on. Defaults to 3000.
    pub port: u16,

    /// Number of HTTP worker threads. Defaults to number of CPUs if not specified.
    pub threads: Option<usize>,

    /// Normalised path prefix the dashboard is served under, empty when not behind a proxy.
    pub proxy_path: String,

    /// Path of the dashboard page.
    pub home_page: String,

    /// Path of the login form.
    pub login_page: String,

    /// Path that ends the current session.
    pub logout_page: String,

    /// Sets the application-wide log level.
    pub log_level: log::Level,
}

/// Configuration for connecting to Redis.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,

    /// Skip TLS certificate verification.
    pub tls_insecure: bool,

    /// Address family for host name resolution: 4, 6, or 0 for either.
    pub family: u8,

    pub connect_timeout: Option<Duration>,
    pub command_timeout: Option<Duration>,

    /// Maximum number of pooled connections.
    pub pool_size: usize,

    /// Sentinel nodes. When non-empty, `host`/`port` are ignored and the master is looked up by
    /// `sentinel_name`.
    pub sentinels: Vec<SentinelAddr>,
    pub sentinel_name: String,
    pub sentinel_password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_owned(),
            port: 6379,
            db: 0,
            username: None,
            password: None,
            use_tls: false,
            tls_insecure: false,
            family: 0,
            connect_timeout: None,
            command_timeout: None,
            pool_size: 4,
            sentinels: Vec::new(),
            sentinel_name: "mymaster".to_owned(),
            sentinel_password: None,
        }
    }
}

/// Queue discovery settings.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Key prefix queues were created with.
    pub prefix: String,

    /// Library the queues were created with.
    pub kind: QueueKind,

    /// How often to re-scan Redis for queues. Never re-scanned if `None`.
    pub refresh_interval: Option<Duration>,
}

/// Dashboard login settings.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub login: Option<String>,
    pub password: Option<String>,

    /// Secret used to sign session cookies. A random one is generated at startup if unset.
    pub session_secret: Option<String>,

    pub session_max_age: Duration,
}

impl AuthConfig {
    /// Login is required only when both a login and a password are configured.
    pub fn enabled(&self) -> bool {
        self.login.is_some() && self.password.is_some()
    }
}

/// strftime style formats used for job timestamps: `short` for today, `common` for this year,
/// `full` otherwise.
#[derive(Clone, Debug)]
pub struct DateFormats {
    pub short: String,
    pub common: String,
    pub full: String,
}

/// Dashboard branding.
#[derive(Clone, Debug)]
pub struct UiConfig {
    pub title: String,
    pub logo_path: Option<String>,
    pub logo_width: Option<String>,
    pub logo_height: Option<String>,
    pub favicon: Option<String>,
    pub favicon_alternative: Option<String>,
    pub locale: String,
    pub date_formats: DateFormats,
}
