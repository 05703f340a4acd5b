//! Driver configuration resolution.
//!
//! The harness hands the driver a sparse [`DriverOptions`]; resolution merges
//! those overrides over computed defaults, derives credentials from an
//! environment snapshot, and maps the target platform to a provider image.
//! A supplied override always wins over a computed default.

use std::collections::BTreeMap;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Deserialize;
use thiserror::Error;

mod images;

const DEFAULT_API_VERSION: &str = "v2";
const DEFAULT_FLAVOR_ID: &str = "performance1-1";
const DEFAULT_USERNAME: &str = "root";
const DEFAULT_PORT: u16 = 22;
const DEFAULT_REGION: &str = "dfw";
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_SKIP_TCP_CHECK_SLEEP: Duration = Duration::from_secs(120);
const DEFAULT_KEY_FILES: [&str; 2] = ["id_dsa.pub", "id_rsa.pub"];

/// Network identifiers attached ahead of any user-supplied networks
/// (PublicNet and ServiceNet).
pub const DEFAULT_NETWORK_IDS: [&str; 2] = [
    "00000000-0000-0000-0000-000000000000",
    "11111111-1111-1111-1111-111111111111",
];

/// Environment variables consulted for the account username, in order.
pub const USERNAME_VARS: [&str; 2] = ["RACKSPACE_USERNAME", "OS_USERNAME"];

/// Environment variables consulted for the account API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["RACKSPACE_API_KEY", "OS_PASSWORD"];

/// Immutable snapshot of the process environment.
///
/// Credential resolution is a pure function of a snapshot, so tests build one
/// from pairs instead of mutating the real environment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Captures the current process environment.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Builds a snapshot from literal pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            vars: pairs
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
        }
    }

    /// Returns the value for `key`, treating empty values as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the first non-empty value among `keys`, in order.
    #[must_use]
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }
}

/// Identity of the operating system the harness wants provisioned.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Platform {
    /// Platform family name, for example `ubuntu`.
    pub name: String,
    /// Platform version, for example `14.04`. May be empty.
    pub version: String,
}

impl Platform {
    /// Creates a platform identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Sparse option set supplied by the harness. Every field is optional; any
/// value present overrides the computed default.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DriverOptions {
    /// Compute API generation selector.
    pub version: Option<String>,
    /// Flavor (size) identifier for new servers.
    pub flavor_id: Option<String>,
    /// Provider image identifier; bypasses the platform mapping when set.
    pub image_id: Option<String>,
    /// Explicit server name; generated at create time when unset.
    pub server_name: Option<String>,
    /// Public key uploaded onto the server at boot.
    pub public_key_path: Option<Utf8PathBuf>,
    /// Login the harness transport uses once the server is up.
    pub username: Option<String>,
    /// Management port probed by the readiness check.
    pub port: Option<u16>,
    /// Provider region the server is created in.
    pub region: Option<String>,
    /// Account username; normally taken from the environment.
    pub rackspace_username: Option<String>,
    /// Account API key; normally taken from the environment.
    pub rackspace_api_key: Option<String>,
    /// Wait budget in seconds for ready/attach/readiness waits. Also applied
    /// as the gateway HTTP client timeout.
    pub wait_timeout: Option<u64>,
    /// Replaces the TCP readiness probe with a fixed sleep when `true`.
    pub skip_tcp_check: Option<bool>,
    /// Sleep duration in seconds used when the TCP probe is skipped.
    pub skip_tcp_check_sleep: Option<u64>,
    /// User network identifiers; the two default networks are prepended.
    pub networks: Option<Vec<String>>,
    /// Blocks on the provider's network-attach automation after create.
    pub network_attach_wait: Option<bool>,
    /// Records the private address as the hostname instead of the public one.
    pub use_private_address: Option<bool>,
}

/// Fully resolved driver configuration. Read-only for the lifetime of the
/// orchestrator that holds it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverConfig {
    /// Compute API generation selector.
    pub version: String,
    /// Flavor (size) identifier for new servers.
    pub flavor_id: String,
    /// Provider image identifier the server boots from.
    pub image_id: String,
    /// Explicit server name; generated at create time when `None`.
    pub server_name: Option<String>,
    /// Public key uploaded onto the server at boot, when one was found.
    pub public_key_path: Option<Utf8PathBuf>,
    /// Login the harness transport uses once the server is up.
    pub username: String,
    /// Management port probed by the readiness check.
    pub port: u16,
    /// Provider region the server is created in.
    pub region: String,
    /// Account username, when one could be resolved.
    pub rackspace_username: Option<String>,
    /// Account API key, when one could be resolved.
    pub rackspace_api_key: Option<String>,
    /// Wait budget for ready/attach/readiness waits. Resolving this value
    /// also fixes the gateway HTTP client timeout: the gateway constructor
    /// applies it to the client it builds.
    pub wait_timeout: Duration,
    /// Replaces the TCP readiness probe with a fixed sleep when `true`.
    pub skip_tcp_check: bool,
    /// Sleep duration used when the TCP probe is skipped.
    pub skip_tcp_check_sleep: Duration,
    /// Network identifiers passed at create time; `None` lets the provider
    /// apply its own defaults.
    pub networks: Option<Vec<String>>,
    /// Blocks on the provider's network-attach automation after create.
    pub network_attach_wait: bool,
    /// Records the private address as the hostname instead of the public one.
    pub use_private_address: bool,
}

impl DriverConfig {
    /// Merges `options` over computed defaults.
    ///
    /// The only I/O performed here is the existence probe for the default
    /// public key path; credentials come from the supplied snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPlatform`] when `platform` has no image
    /// mapping and no explicit `image_id` override was given.
    pub fn resolve(
        options: DriverOptions,
        platform: &Platform,
        env: &EnvSnapshot,
    ) -> Result<Self, ConfigError> {
        let image_id = match options.image_id {
            Some(id) => id,
            None => images::lookup(platform)
                .ok_or_else(|| ConfigError::UnknownPlatform {
                    platform: format!("{}-{}", platform.name, platform.version),
                })?
                .to_owned(),
        };

        Ok(Self {
            version: options
                .version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_owned()),
            flavor_id: options
                .flavor_id
                .unwrap_or_else(|| DEFAULT_FLAVOR_ID.to_owned()),
            image_id,
            server_name: options.server_name,
            public_key_path: options
                .public_key_path
                .or_else(|| default_public_key_path(env)),
            username: options
                .username
                .unwrap_or_else(|| DEFAULT_USERNAME.to_owned()),
            port: options.port.unwrap_or(DEFAULT_PORT),
            region: options.region.unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            rackspace_username: options
                .rackspace_username
                .or_else(|| env.first_of(&USERNAME_VARS).map(str::to_owned)),
            rackspace_api_key: options
                .rackspace_api_key
                .or_else(|| env.first_of(&API_KEY_VARS).map(str::to_owned)),
            wait_timeout: options
                .wait_timeout
                .map_or(DEFAULT_WAIT_TIMEOUT, Duration::from_secs),
            skip_tcp_check: options.skip_tcp_check.unwrap_or(false),
            skip_tcp_check_sleep: options
                .skip_tcp_check_sleep
                .map_or(DEFAULT_SKIP_TCP_CHECK_SLEEP, Duration::from_secs),
            networks: resolve_networks(options.networks),
            network_attach_wait: options.network_attach_wait.unwrap_or(false),
            use_private_address: options.use_private_address.unwrap_or(false),
        })
    }

    /// Checks that both credentials are present. Called by the gateway
    /// constructor before any network I/O.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] naming the environment
    /// variables that would supply the missing value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_credential(
            self.rackspace_username.as_deref(),
            "account username",
            &USERNAME_VARS,
        )?;
        require_credential(
            self.rackspace_api_key.as_deref(),
            "account API key",
            &API_KEY_VARS,
        )?;
        Ok(())
    }
}

fn require_credential(
    value: Option<&str>,
    description: &str,
    env_vars: &[&str],
) -> Result<(), ConfigError> {
    if value.is_some_and(|v| !v.trim().is_empty()) {
        return Ok(());
    }
    Err(ConfigError::MissingCredential(format!(
        "missing {description}: set {} in the environment or pass it in the driver options",
        env_vars.join(" or ")
    )))
}

/// Prepends the default network identifiers ahead of the user-supplied ones.
/// `None` is passed through so the provider applies its own defaults.
fn resolve_networks(user: Option<Vec<String>>) -> Option<Vec<String>> {
    user.map(|ids| {
        DEFAULT_NETWORK_IDS
            .iter()
            .map(|id| (*id).to_owned())
            .chain(ids)
            .collect()
    })
}

/// Returns the first conventional public key under `$HOME/.ssh` that exists.
fn default_public_key_path(env: &EnvSnapshot) -> Option<Utf8PathBuf> {
    let home = env.get("HOME")?;
    DEFAULT_KEY_FILES
        .iter()
        .map(|file| Utf8PathBuf::from(home).join(".ssh").join(file))
        .find(|path| path.is_file())
}

/// Errors raised during configuration resolution and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required credential could not be resolved from options or the
    /// environment.
    #[error("missing credential: {0}")]
    MissingCredential(String),
    /// The target platform has no image mapping and no override was given.
    #[error("no server image mapped for platform {platform}")]
    UnknownPlatform {
        /// Platform key that failed the lookup.
        platform: String,
    },
}
