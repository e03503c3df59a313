//! Connection options handed to Redis clients, built from configuration.
//!
//! Optional members are only populated when the matching configuration value is present, and are
//! skipped entirely when serialised, so a logged or exported options record never carries `null`
//! placeholders.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::config::RedisConfig;
use crate::models::{BoardError, BoardResult};

/// Port used for a sentinel entry that doesn't specify one.
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// Address of a single Redis Sentinel node.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SentinelAddr {
    pub host: String,
    pub port: u16,
}

/// Parses a sentinel list such as `"s1:26379,s2:26380;s3"` into addresses.
///
/// Entries may be separated by `,` or `;`. Blank entries are skipped, and an entry without a port
/// uses `DEFAULT_SENTINEL_PORT`.
pub fn parse_sentinels(raw: &str) -> BoardResult<Vec<SentinelAddr>> {
    let mut sentinels = Vec::new();
    for entry in raw.split(|c| c == ',' || c == ';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (host, port) = match entry.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    BoardError::config(format!("invalid sentinel port in '{}'", entry))
                })?;
                (host.trim(), port)
            }
            None => (entry, DEFAULT_SENTINEL_PORT),
        };

        if host.is_empty() {
            return Err(BoardError::config(format!("missing sentinel host in '{}'", entry)));
        }

        sentinels.push(SentinelAddr { host: host.to_owned(), port });
    }
    Ok(sentinels)
}

/// Address family to restrict host name resolution to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    /// Maps the numeric family used in configuration (`4`, `6`, anything else) to a `Family`.
    pub fn from_number(n: u8) -> Self {
        match n {
            4 => Family::V4,
            6 => Family::V6,
            _ => Family::Any,
        }
    }

    pub fn as_number(self) -> u8 {
        match self {
            Family::Any => 0,
            Family::V4 => 4,
            Family::V6 => 6,
        }
    }
}

impl Serialize for Family {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_number())
    }
}

/// How to reach the Redis server.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Topology {
    /// A single server at a fixed address.
    Standalone {
        host: String,
        port: u16,
        family: Family,
    },

    /// A master discovered through a set of sentinels.
    Sentinel {
        sentinels: Vec<SentinelAddr>,
        name: String,
    },
}

/// TLS settings, only present when TLS is enabled.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TlsOptions {
    /// Skip certificate verification.
    pub insecure: bool,
}

fn serialize_millis<S: Serializer>(dur: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match dur {
        Some(dur) => serializer.serialize_u64(dur.as_millis() as u64),
        None => serializer.serialize_none(),
    }
}

/// Options used to connect to Redis.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisOptions {
    #[serde(flatten)]
    pub topology: Topology,

    pub db: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentinel_password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_millis")]
    pub connect_timeout: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_millis")]
    pub command_timeout: Option<Duration>,
}

impl RedisOptions {
    /// Builds options from Redis configuration. If any sentinels are configured, the sentinel
    /// topology is used and the direct host/port settings are ignored.
    pub fn from_config(config: &RedisConfig) -> Self {
        let topology = if config.sentinels.is_empty() {
            Topology::Standalone {
                host: config.host.clone(),
                port: config.port,
                family: Family::from_number(config.family),
            }
        } else {
            Topology::Sentinel {
                sentinels: config.sentinels.clone(),
                name: config.sentinel_name.clone(),
            }
        };

        let mut options = RedisOptions {
            topology,
            db: config.db,
            username: None,
            password: None,
            sentinel_password: None,
            tls: None,
            connect_timeout: None,
            command_timeout: None,
        };

        if let Some(username) = &config.username {
            options.username = Some(username.clone());
        }
        if let Some(password) = &config.password {
            options.password = Some(password.clone());
        }
        if let (Topology::Sentinel { .. }, Some(password)) = (&options.topology, &config.sentinel_password) {
            options.sentinel_password = Some(password.clone());
        }
        if config.use_tls {
            options.tls = Some(TlsOptions { insecure: config.tls_insecure });
        }
        if let Some(timeout) = config.connect_timeout {
            options.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = config.command_timeout {
            options.command_timeout = Some(timeout);
        }

        options
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self.topology, Topology::Sentinel { .. })
    }
}

/// Options used when constructing the client for a single queue.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueueOptions {
    pub redis: RedisOptions,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl QueueOptions {
    /// Creates queue options, only setting `prefix` when it's non-empty.
    pub fn new(redis: RedisOptions, prefix: &str) -> Self {
        QueueOptions {
            redis,
            prefix: if prefix.is_empty() { None } else { Some(prefix.to_owned()) },
        }
    }
}
