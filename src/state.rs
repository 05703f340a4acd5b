//! Harness-owned state linking a test run to its server.

use serde::{Deserialize, Serialize};

/// The only state persisted between `create` and `destroy`.
///
/// An absent `server_id` means there is nothing to destroy; both fields are
/// removed again on successful teardown.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ResultState {
    /// Provider identifier of the provisioned server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    /// Address the harness connects to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl ResultState {
    /// Creates an empty state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            server_id: None,
            hostname: None,
        }
    }

    /// Removes both persisted fields.
    pub fn clear(&mut self) {
        self.server_id = None;
        self.hostname = None;
    }
}
