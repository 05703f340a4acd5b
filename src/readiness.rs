//! Reachability probing for freshly created servers.
//!
//! A server that reports ready at the provider may still refuse connections
//! on its management port for a while. The checker retries TCP connects
//! under a deadline; environments where no usable probe exists can opt into
//! a fixed sleep instead.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::config::DriverConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while waiting for a server to accept connections.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ReadinessError {
    /// The server never accepted a connection within the wait budget.
    #[error("server {address}:{port} did not accept connections within {timeout_secs} seconds")]
    Timeout {
        /// Address that was probed.
        address: String,
        /// Port that was probed.
        port: u16,
        /// Configured wait budget in seconds.
        timeout_secs: u64,
    },
}

/// Polls a server's management port until it accepts connections, or sleeps
/// a fixed duration when probing is disabled.
#[derive(Clone, Debug)]
pub struct ReadinessChecker {
    wait_timeout: Duration,
    skip_tcp_check: bool,
    skip_sleep: Duration,
    poll_interval: Duration,
}

impl ReadinessChecker {
    /// Creates a checker with an explicit wait budget and skip behaviour.
    #[must_use]
    pub const fn new(wait_timeout: Duration, skip_tcp_check: bool, skip_sleep: Duration) -> Self {
        Self {
            wait_timeout,
            skip_tcp_check,
            skip_sleep,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Creates a checker from the resolved driver configuration.
    #[must_use]
    pub const fn from_config(config: &DriverConfig) -> Self {
        Self::new(
            config.wait_timeout,
            config.skip_tcp_check,
            config.skip_tcp_check_sleep,
        )
    }

    /// Overrides the polling interval.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Blocks until `address:port` accepts a TCP connection, or for the
    /// configured fallback sleep when probing is skipped.
    ///
    /// The skip path never verifies reachability; it returns
    /// unconditionally after sleeping.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError::Timeout`] when the wait budget elapses
    /// before a connection is accepted.
    pub async fn wait(&self, address: &str, port: u16) -> Result<(), ReadinessError> {
        if self.skip_tcp_check {
            debug!(
                seconds = self.skip_sleep.as_secs(),
                "tcp check disabled, sleeping instead"
            );
            sleep(self.skip_sleep).await;
            return Ok(());
        }
        self.probe(address, port).await
    }

    async fn probe(&self, address: &str, port: u16) -> Result<(), ReadinessError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            match timeout(CONNECT_ATTEMPT_TIMEOUT, TcpStream::connect((address, port))).await {
                Ok(Ok(_stream)) => {
                    debug!(address, port, "server accepted a connection");
                    return Ok(());
                }
                Ok(Err(_)) | Err(_) => {}
            }

            if Instant::now() > deadline {
                return Err(ReadinessError::Timeout {
                    address: address.to_owned(),
                    port,
                    timeout_secs: self.wait_timeout.as_secs(),
                });
            }

            sleep(self.poll_interval).await;
        }
    }
}
