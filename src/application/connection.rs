//! Turns `RedisOptions` into a pool of Redis connections.

use std::net::SocketAddr;
use std::time::Duration;

use deadpool_redis::{Manager, Pool, Runtime};
use log::{debug, info, warn};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::models::options::{Family, RedisOptions, SentinelAddr, Topology};
use crate::models::{BoardError, BoardResult};
use crate::redis_utils::query_timeout;

/// Builds connection details for a single server.
fn connection_info(host: String, port: u16, options: &RedisOptions) -> ConnectionInfo {
    let addr = match &options.tls {
        Some(tls) => ConnectionAddr::TcpTls {
            host,
            port,
            insecure: tls.insecure,
        },
        None => ConnectionAddr::Tcp(host, port),
    };

    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            db: options.db,
            username: options.username.clone(),
            password: options.password.clone(),
        },
    }
}

/// Picks the first resolved address matching `family`.
fn select_address(addrs: impl IntoIterator<Item = SocketAddr>, family: Family) -> Option<SocketAddr> {
    addrs.into_iter().find(|addr| match family {
        Family::Any => true,
        Family::V4 => addr.is_ipv4(),
        Family::V6 => addr.is_ipv6(),
    })
}

/// Resolves `host` to an IP address of the requested family. Name resolution is left to the
/// Redis client for `Family::Any`, and for TLS connections where the host name is needed for
/// certificate verification.
async fn resolve_host(host: &str, port: u16, family: Family, tls: bool) -> BoardResult<String> {
    if family == Family::Any {
        return Ok(host.to_owned());
    }
    if tls {
        warn!("REDIS_FAMILY is ignored for TLS connections");
        return Ok(host.to_owned());
    }

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|err| BoardError::RedisConnection(format!("failed to resolve {}: {}", host, err)))?;
    match select_address(addrs, family) {
        Some(addr) => {
            debug!("Resolved {} to {}", host, addr.ip());
            Ok(addr.ip().to_string())
        }
        None => Err(BoardError::RedisConnection(format!(
            "no IPv{} address found for {}",
            family.as_number(),
            host
        ))),
    }
}

/// Asks a single sentinel for the current address of the named master.
async fn query_sentinel(
    sentinel: &SentinelAddr,
    name: &str,
    options: &RedisOptions,
) -> BoardResult<(String, u16)> {
    let info = ConnectionInfo {
        addr: ConnectionAddr::Tcp(sentinel.host.clone(), sentinel.port),
        redis: RedisConnectionInfo {
            db: 0,
            username: None,
            password: options.sentinel_password.clone(),
        },
    };
    let client = redis::Client::open(info)?;
    let mut conn = query_timeout(options.connect_timeout, client.get_async_connection()).await?;

    let master: Option<(String, u16)> = query_timeout(
        options.command_timeout,
        redis::cmd("SENTINEL")
            .arg("get-master-addr-by-name")
            .arg(name)
            .query_async(&mut conn),
    )
    .await?;

    master.ok_or_else(|| BoardError::RedisConnection(format!("sentinel does not know master '{}'", name)))
}

/// Tries each sentinel in order until one returns the master's address.
pub async fn resolve_sentinel_master(
    sentinels: &[SentinelAddr],
    name: &str,
    options: &RedisOptions,
) -> BoardResult<(String, u16)> {
    for sentinel in sentinels {
        match query_sentinel(sentinel, name, options).await {
            Ok((host, port)) => {
                info!(
                    "Sentinel {}:{} reports master '{}' at {}:{}",
                    sentinel.host, sentinel.port, name, host, port
                );
                return Ok((host, port));
            }
            Err(err) => warn!("Sentinel {}:{} unusable: {}", sentinel.host, sentinel.port, err),
        }
    }

    Err(BoardError::RedisConnection(format!(
        "no sentinel could resolve master '{}'",
        name
    )))
}

/// Resolves the address to connect to, according to the configured topology.
pub async fn resolve_connection_info(options: &RedisOptions) -> BoardResult<ConnectionInfo> {
    let (host, port) = match &options.topology {
        Topology::Standalone { host, port, family } => {
            let host = resolve_host(host, *port, *family, options.tls.is_some()).await?;
            (host, *port)
        }
        Topology::Sentinel { sentinels, name } => resolve_sentinel_master(sentinels, name, options).await?,
    };
    Ok(connection_info(host, port, options))
}

/// Creates a connection pool. No connection is opened until the pool is first used.
pub fn create_pool(info: ConnectionInfo, size: usize, connect_timeout: Option<Duration>) -> BoardResult<Pool> {
    let manager = Manager::new(info)?;
    Pool::builder(manager)
        .max_size(size.max(1))
        .create_timeout(connect_timeout)
        .wait_timeout(connect_timeout)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|err| BoardError::Internal(format!("failed to build Redis pool: {}", err)))
}

/// Resolves the configured topology and creates a pool for it.
pub async fn connect(options: &RedisOptions, size: usize) -> BoardResult<Pool> {
    let info = resolve_connection_info(options).await?;
    debug!("Connecting to Redis at {:?}", info.addr);
    create_pool(info, size, options.connect_timeout)
}
