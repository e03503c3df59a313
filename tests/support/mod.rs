//! Starts throwaway `redis-server` processes for integration tests.

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// A running Redis server, killed on drop.
pub struct TestContext {
    pub port: u16,
    server: Child,
}

impl TestContext {
    /// Starts a Redis server on a free port, or returns `None` if `redis-server` isn't available.
    pub fn new() -> Option<Self> {
        let port = free_port();
        let port_arg = port.to_string();
        let server = match Command::new("redis-server")
            .args(["--port", port_arg.as_str(), "--save", "", "--appendonly", "no"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(server) => server,
            Err(err) => {
                eprintln!("Skipping test, unable to start redis-server: {}", err);
                return None;
            }
        };

        let ctx = TestContext { port, server };
        let client = redis::Client::open(ctx.url()).unwrap();
        let started = Instant::now();
        while client.get_connection().is_err() {
            assert!(started.elapsed() < Duration::from_secs(5), "redis-server failed to start");
            sleep(Duration::from_millis(20));
        }
        Some(ctx)
    }

    pub fn url(&self) -> String {
        format!("redis://127.0.0.1:{}", self.port)
    }

    pub fn connection(&self) -> redis::Connection {
        redis::Client::open(self.url()).unwrap().get_connection().unwrap()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = self.server.kill();
        let _ = self.server.wait();
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}
