//! Driver for provisioning ephemeral Rackspace Cloud Servers from a test
//! harness.
//!
//! The crate resolves driver configuration (defaults, harness overrides,
//! environment credentials), derives a constrained server name, creates the
//! server through a compute gateway, waits until it accepts connections, and
//! destroys it idempotently afterwards (create → wait → destroy).

pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod name;
pub mod rackspace;
pub mod readiness;
pub mod state;
pub mod test_support;

pub use config::{ConfigError, DriverConfig, DriverOptions, EnvSnapshot, Platform};
pub use gateway::{
    ComputeGateway, GatewayError, GatewayFuture, ServerRecord, ServerSpec, Waitable,
};
pub use lifecycle::{InstanceIdentity, LifecycleError, LifecycleOrchestrator};
pub use rackspace::RackspaceGateway;
pub use readiness::{ReadinessChecker, ReadinessError};
pub use state::ResultState;
