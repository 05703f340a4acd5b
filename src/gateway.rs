//! Gateway abstraction over the remote compute API.
//!
//! The orchestrator only ever talks to these traits. The provider's own
//! blocking "wait until ready" primitive sits behind the separate
//! [`Waitable`] capability so tests can substitute an immediate fake.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Parameters for creating a new server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    /// Name the server is registered under.
    pub name: String,
    /// Provider image identifier to boot from.
    pub image_id: String,
    /// Flavor (size) identifier.
    pub flavor_id: String,
    /// Public key installed on the server at boot, when present.
    pub public_key_path: Option<Utf8PathBuf>,
    /// Network identifiers to attach; `None` lets the provider pick.
    pub networks: Option<Vec<String>>,
}

/// The provider's view of a server. The orchestrator holds a record only
/// transiently during `create`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ServerRecord {
    /// Opaque provider identifier.
    pub id: String,
    /// Provider status string, for example `BUILD` or `ACTIVE`.
    pub status: String,
    /// Public IPv4 address, once assigned.
    pub public_address: Option<String>,
    /// Private (service net) IPv4 address, once assigned.
    pub private_address: Option<String>,
    /// Progress of the provider's network-attach automation, when reported.
    pub automation_status: Option<String>,
}

impl ServerRecord {
    /// Address the harness should connect to, honouring the private-address
    /// preference.
    #[must_use]
    pub fn access_address(&self, use_private: bool) -> Option<&str> {
        let preferred = if use_private {
            self.private_address.as_deref()
        } else {
            self.public_address.as_deref()
        };
        preferred.filter(|address| !address.is_empty())
    }
}

/// Errors raised by gateway implementations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The configuration failed validation before any network call.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Transport-level failure talking to the provider.
    #[error("compute api request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        /// Logical endpoint that failed.
        endpoint: &'static str,
        /// HTTP status code returned.
        status: u16,
        /// Response body, for the caller's error message.
        body: String,
    },
    /// The supplied public key could not be read.
    #[error("failed to read public key {path}: {source}")]
    PublicKey {
        /// Path that failed to read.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A wait exceeded its timeout.
    #[error("timeout waiting for {action} on server {server_id}")]
    Timeout {
        /// Action being waited on.
        action: &'static str,
        /// Provider server identifier.
        server_id: String,
    },
    /// The server entered the provider's error state during a wait.
    #[error("server {server_id} entered an error state during {action}")]
    Failed {
        /// Action being waited on.
        action: &'static str,
        /// Provider server identifier.
        server_id: String,
    },
}

/// Future returned by gateway operations.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Create, look up, and delete servers on the remote provider.
pub trait ComputeGateway {
    /// Creates a new server and returns the provider's record of it.
    fn create_server<'a>(&'a self, spec: &'a ServerSpec) -> GatewayFuture<'a, ServerRecord>;

    /// Looks up a server by id; `None` when the provider does not know it.
    fn get_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, Option<ServerRecord>>;

    /// Deletes a server. Implementations treat an already-absent server as
    /// success.
    fn delete_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, ()>;
}

/// Provider-side blocking waits.
pub trait Waitable {
    /// Blocks until the server reports ready, returning the refreshed
    /// record.
    fn wait_until_ready<'a>(
        &'a self,
        server_id: &'a str,
        timeout: Duration,
    ) -> GatewayFuture<'a, ServerRecord>;

    /// Blocks until the provider's network-attach automation finishes.
    fn wait_for_network_attach<'a>(
        &'a self,
        server_id: &'a str,
        timeout: Duration,
    ) -> GatewayFuture<'a, ()>;
}

impl<G> ComputeGateway for &G
where
    G: ComputeGateway,
{
    fn create_server<'a>(&'a self, spec: &'a ServerSpec) -> GatewayFuture<'a, ServerRecord> {
        G::create_server(*self, spec)
    }

    fn get_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, Option<ServerRecord>> {
        G::get_server(*self, server_id)
    }

    fn delete_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, ()> {
        G::delete_server(*self, server_id)
    }
}

impl<G> Waitable for &G
where
    G: Waitable,
{
    fn wait_until_ready<'a>(
        &'a self,
        server_id: &'a str,
        timeout: Duration,
    ) -> GatewayFuture<'a, ServerRecord> {
        G::wait_until_ready(*self, server_id, timeout)
    }

    fn wait_for_network_attach<'a>(
        &'a self,
        server_id: &'a str,
        timeout: Duration,
    ) -> GatewayFuture<'a, ()> {
        G::wait_for_network_attach(*self, server_id, timeout)
    }
}
