//! Create/destroy orchestration for ephemeral test servers.
//!
//! `create` resolves a server name, provisions through the gateway, records
//! the server id and address into the harness state, then blocks through the
//! provider-ready, optional network-attach, and reachability waits. `destroy`
//! tears the server down and tolerates resources that are already gone.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{DriverConfig, EnvSnapshot};
use crate::gateway::{ComputeGateway, GatewayError, ServerSpec, Waitable};
use crate::name;
use crate::readiness::{ReadinessChecker, ReadinessError};
use crate::state::ResultState;

const HOSTNAME_FALLBACK: &str = "localhost";

/// Identity inputs used when deriving a server name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceIdentity {
    /// Short label of the harness instance, for example `default-ubuntu`.
    pub label: String,
    /// OS login of the operator, when one is known.
    pub login: Option<String>,
    /// Local hostname of the machine driving the harness.
    pub hostname: String,
}

impl InstanceIdentity {
    /// Creates an identity from explicit parts.
    pub fn new(label: impl Into<String>, login: Option<String>, hostname: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            login,
            hostname: hostname.into(),
        }
    }

    /// Derives the login and hostname from an environment snapshot.
    #[must_use]
    pub fn from_env(label: impl Into<String>, env: &EnvSnapshot) -> Self {
        Self {
            label: label.into(),
            login: env
                .get("USER")
                .or_else(|| env.get("LOGNAME"))
                .map(str::to_owned),
            hostname: env.get("HOSTNAME").unwrap_or(HOSTNAME_FALLBACK).to_owned(),
        }
    }
}

/// Errors surfaced by the lifecycle orchestrator.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Creation failed at the provider; carries the provider message
    /// verbatim.
    #[error("create failed: {message}")]
    ActionFailed {
        /// Message of the underlying gateway failure.
        message: String,
    },
    /// A gateway call failed during teardown.
    #[error("destroy failed: {0}")]
    Gateway(#[from] GatewayError),
    /// The server never became reachable within the wait budget.
    #[error("instance did not become reachable: {0}")]
    Readiness(#[from] ReadinessError),
    /// The server came up without an address the harness could use.
    #[error("server {server_id} reported no usable address")]
    MissingAddress {
        /// Provider server identifier.
        server_id: String,
    },
}

/// Drives the create/destroy state machine against a gateway.
#[derive(Debug)]
pub struct LifecycleOrchestrator<G> {
    gateway: G,
    config: DriverConfig,
    readiness: ReadinessChecker,
}

impl<G> LifecycleOrchestrator<G>
where
    G: ComputeGateway + Waitable,
{
    /// Creates an orchestrator over the given gateway and configuration.
    #[must_use]
    pub fn new(gateway: G, config: DriverConfig) -> Self {
        let readiness = ReadinessChecker::from_config(&config);
        Self {
            gateway,
            config,
            readiness,
        }
    }

    /// Replaces the readiness checker.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub fn with_readiness(mut self, readiness: ReadinessChecker) -> Self {
        self.readiness = readiness;
        self
    }

    /// Provisions a server and populates `state` with its id and address.
    ///
    /// The server id (and any address the provider reports at creation) is
    /// recorded before the waits begin, so a failed wait leaves enough state
    /// behind for a later `destroy`. A state that already carries a server
    /// id is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ActionFailed`] when the provider rejects
    /// the create or a provider-side wait fails,
    /// [`LifecycleError::MissingAddress`] when no usable address is
    /// reported, and [`LifecycleError::Readiness`] when the server never
    /// accepts connections.
    pub async fn create(
        &self,
        state: &mut ResultState,
        identity: &InstanceIdentity,
    ) -> Result<(), LifecycleError> {
        if state.server_id.is_some() {
            debug!("state already holds a server, skipping create");
            return Ok(());
        }

        let server_name = self.config.server_name.clone().unwrap_or_else(|| {
            name::generate(&identity.label, identity.login.as_deref(), &identity.hostname)
        });
        let spec = ServerSpec {
            name: server_name.clone(),
            image_id: self.config.image_id.clone(),
            flavor_id: self.config.flavor_id.clone(),
            public_key_path: self.config.public_key_path.clone(),
            networks: self.config.networks.clone(),
        };

        let created = self
            .gateway
            .create_server(&spec)
            .await
            .map_err(wrap_action)?;
        state.server_id = Some(created.id.clone());
        state.hostname = created
            .access_address(self.config.use_private_address)
            .map(str::to_owned);
        info!(server_id = %created.id, name = %server_name, "server created");

        let ready = self
            .gateway
            .wait_until_ready(&created.id, self.config.wait_timeout)
            .await
            .map_err(wrap_action)?;

        let record = if self.config.network_attach_wait {
            self.gateway
                .wait_for_network_attach(&created.id, self.config.wait_timeout)
                .await
                .map_err(wrap_action)?;
            // The automation can re-point the access address; refresh.
            self.gateway
                .get_server(&created.id)
                .await
                .map_err(wrap_action)?
                .unwrap_or(ready)
        } else {
            ready
        };

        let address = record
            .access_address(self.config.use_private_address)
            .ok_or_else(|| LifecycleError::MissingAddress {
                server_id: created.id.clone(),
            })?
            .to_owned();
        state.hostname = Some(address.clone());
        debug!(server_id = %created.id, hostname = %address, "address recorded");

        self.readiness.wait(&address, self.config.port).await?;
        info!(server_id = %created.id, hostname = %address, "server ready");
        Ok(())
    }

    /// Tears down the server recorded in `state`, then clears it.
    ///
    /// A state without a server id returns immediately without touching the
    /// gateway; a lookup miss counts as already destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Gateway`] when the lookup or delete call
    /// fails.
    pub async fn destroy(&self, state: &mut ResultState) -> Result<(), LifecycleError> {
        let Some(server_id) = state.server_id.clone() else {
            return Ok(());
        };

        match self.gateway.get_server(&server_id).await? {
            Some(_) => {
                self.gateway.delete_server(&server_id).await?;
                info!(server_id = %server_id, "server destroyed");
            }
            None => debug!(server_id = %server_id, "server already absent"),
        }

        state.clear();
        Ok(())
    }
}

fn wrap_action(err: GatewayError) -> LifecycleError {
    LifecycleError::ActionFailed {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_env_prefers_user_over_logname() {
        let env = EnvSnapshot::from_pairs(&[
            ("USER", "maria"),
            ("LOGNAME", "backup"),
            ("HOSTNAME", "devbox"),
        ]);
        let identity = InstanceIdentity::from_env("default", &env);
        assert_eq!(identity.login.as_deref(), Some("maria"));
        assert_eq!(identity.hostname, "devbox");
    }

    #[test]
    fn identity_from_env_falls_back_when_unset() {
        let identity = InstanceIdentity::from_env("default", &EnvSnapshot::default());
        assert_eq!(identity.login, None);
        assert_eq!(identity.hostname, HOSTNAME_FALLBACK);
    }
}
