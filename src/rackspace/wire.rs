//! Wire payloads for the identity and servers endpoints.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayError, ServerRecord, ServerSpec};

const AUTHORIZED_KEYS_PATH: &str = "/root/.ssh/authorized_keys";
const AUTOMATION_STATUS_KEY: &str = "rackconnect_automation_status";

/// Identity token request using API-key credentials.
#[derive(Debug, Serialize)]
pub(super) struct AuthRequest {
    auth: AuthPayload,
}

#[derive(Debug, Serialize)]
struct AuthPayload {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    api_key_credentials: ApiKeyCredentials,
}

#[derive(Debug, Serialize)]
struct ApiKeyCredentials {
    username: String,
    #[serde(rename = "apiKey")]
    api_key: String,
}

impl AuthRequest {
    pub(super) fn new(username: &str, api_key: &str) -> Self {
        Self {
            auth: AuthPayload {
                api_key_credentials: ApiKeyCredentials {
                    username: username.to_owned(),
                    api_key: api_key.to_owned(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AuthResponse {
    pub(super) access: Access,
}

#[derive(Debug, Deserialize)]
pub(super) struct Access {
    pub(super) token: Token,
}

#[derive(Debug, Deserialize)]
pub(super) struct Token {
    pub(super) id: String,
    pub(super) tenant: Tenant,
}

#[derive(Debug, Deserialize)]
pub(super) struct Tenant {
    pub(super) id: String,
}

/// Server create request body.
#[derive(Debug, Serialize)]
pub(super) struct CreateServerRequest {
    server: CreateServerPayload,
}

#[derive(Debug, Serialize)]
struct CreateServerPayload {
    name: String,
    #[serde(rename = "imageRef")]
    image_ref: String,
    #[serde(rename = "flavorRef")]
    flavor_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    networks: Option<Vec<NetworkRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    personality: Option<Vec<PersonalityFile>>,
}

#[derive(Debug, Serialize)]
struct NetworkRef {
    uuid: String,
}

#[derive(Debug, Serialize)]
struct PersonalityFile {
    path: String,
    contents: String,
}

impl CreateServerRequest {
    /// Builds the create payload, reading and encoding the public key when
    /// the spec names one.
    pub(super) fn from_spec(spec: &ServerSpec) -> Result<Self, GatewayError> {
        let personality = match &spec.public_key_path {
            Some(path) => {
                let contents =
                    std::fs::read(path).map_err(|source| GatewayError::PublicKey {
                        path: path.clone(),
                        source,
                    })?;
                Some(vec![PersonalityFile {
                    path: AUTHORIZED_KEYS_PATH.to_owned(),
                    contents: BASE64.encode(contents),
                }])
            }
            None => None,
        };

        Ok(Self {
            server: CreateServerPayload {
                name: spec.name.clone(),
                image_ref: spec.image_id.clone(),
                flavor_ref: spec.flavor_id.clone(),
                networks: spec.networks.as_ref().map(|ids| {
                    ids.iter()
                        .map(|id| NetworkRef { uuid: id.clone() })
                        .collect()
                }),
                personality,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreatedServerEnvelope {
    pub(super) server: CreatedServer,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreatedServer {
    pub(super) id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerEnvelope {
    pub(super) server: ServerPayload,
}

/// Provider server representation as returned by the servers endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct ServerPayload {
    id: String,
    status: String,
    #[serde(default, rename = "accessIPv4")]
    access_ipv4: String,
    #[serde(default)]
    addresses: Addresses,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct Addresses {
    #[serde(default)]
    public: Vec<AddressEntry>,
    #[serde(default)]
    private: Vec<AddressEntry>,
}

#[derive(Debug, Deserialize)]
struct AddressEntry {
    #[serde(default)]
    version: u8,
    addr: String,
}

impl ServerPayload {
    pub(super) fn into_record(mut self) -> ServerRecord {
        let public = non_empty(self.access_ipv4.clone()).or_else(|| pick_v4(&self.addresses.public));
        let private = pick_v4(&self.addresses.private);
        ServerRecord {
            id: self.id,
            status: self.status,
            public_address: public,
            private_address: private,
            automation_status: self.metadata.remove(AUTOMATION_STATUS_KEY),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Prefers the first IPv4 entry, falling back to whatever is listed first.
fn pick_v4(entries: &[AddressEntry]) -> Option<String> {
    entries
        .iter()
        .find(|entry| entry.version == 4)
        .or_else(|| entries.first())
        .map(|entry| entry.addr.clone())
}
