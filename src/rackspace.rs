//! Rackspace implementation of the compute gateway.
//!
//! A thin authenticated client over the identity and next-generation
//! servers endpoints. Tokens are fetched lazily on first use and reused for
//! the gateway's lifetime.

use std::time::{Duration, Instant};

use reqwest::{Client, Response, StatusCode};
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::DriverConfig;
use crate::gateway::{
    ComputeGateway, GatewayError, GatewayFuture, ServerRecord, ServerSpec, Waitable,
};

mod wire;

const IDENTITY_ENDPOINT: &str = "https://identity.api.rackspacecloud.com/v2.0/tokens";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const READY_STATUS: &str = "ACTIVE";
const ERROR_STATUS: &str = "ERROR";
const NETWORK_ATTACH_DONE: &str = "DEPLOYED";

#[derive(Clone, Debug)]
struct Session {
    token: String,
    tenant_id: String,
}

/// Authenticated handle to the Rackspace compute API.
#[derive(Debug)]
pub struct RackspaceGateway {
    http: Client,
    config: DriverConfig,
    username: String,
    api_key: String,
    http_timeout: Duration,
    poll_interval: Duration,
    session: OnceCell<Session>,
}

impl RackspaceGateway {
    /// Constructs a gateway from the resolved configuration.
    ///
    /// Credentials are checked here, before any network call. The resolved
    /// `wait_timeout` is applied as the timeout of the HTTP client this
    /// gateway builds.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when a credential is missing and
    /// [`GatewayError::Request`] when the HTTP client cannot be built.
    pub fn new(config: DriverConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let username = config.rackspace_username.clone().unwrap_or_default();
        let api_key = config.rackspace_api_key.clone().unwrap_or_default();
        let http_timeout = config.wait_timeout;
        let http = Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            http,
            config,
            username,
            api_key,
            http_timeout,
            poll_interval: POLL_INTERVAL,
            session: OnceCell::new(),
        })
    }

    /// Timeout applied to every request this gateway issues; mirrors the
    /// resolved `wait_timeout`.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// Overrides the status polling interval.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn session(&self) -> Result<&Session, GatewayError> {
        self.session.get_or_try_init(|| self.authenticate()).await
    }

    async fn authenticate(&self) -> Result<Session, GatewayError> {
        let body = wire::AuthRequest::new(&self.username, &self.api_key);
        let resp = self.http.post(IDENTITY_ENDPOINT).json(&body).send().await?;
        let resp = check(resp, "authenticate").await?;
        let auth: wire::AuthResponse = resp.json().await?;
        let session = Session {
            token: auth.access.token.id,
            tenant_id: auth.access.token.tenant.id,
        };
        debug!(tenant_id = %session.tenant_id, "authenticated against identity endpoint");
        Ok(session)
    }

    fn servers_url(&self, session: &Session) -> String {
        format!(
            "https://{}.servers.api.rackspacecloud.com/{}/{}/servers",
            self.config.region, self.config.version, session.tenant_id
        )
    }

    async fn fetch_server(&self, server_id: &str) -> Result<Option<ServerRecord>, GatewayError> {
        let session = self.session().await?;
        let url = format!("{}/{server_id}", self.servers_url(session));
        let resp = self
            .http
            .get(url)
            .header(AUTH_TOKEN_HEADER, session.token.as_str())
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check(resp, "get server").await?;
        let envelope: wire::ServerEnvelope = resp.json().await?;
        Ok(Some(envelope.server.into_record()))
    }
}

async fn check(resp: Response, endpoint: &'static str) -> Result<Response, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Api {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

impl ComputeGateway for RackspaceGateway {
    fn create_server<'a>(&'a self, spec: &'a ServerSpec) -> GatewayFuture<'a, ServerRecord> {
        Box::pin(async move {
            let body = wire::CreateServerRequest::from_spec(spec)?;
            let session = self.session().await?;
            let resp = self
                .http
                .post(self.servers_url(session))
                .header(AUTH_TOKEN_HEADER, session.token.as_str())
                .json(&body)
                .send()
                .await?;
            let resp = check(resp, "create server").await?;
            let created: wire::CreatedServerEnvelope = resp.json().await?;
            let server_id = created.server.id;
            info!(server_id = %server_id, name = %spec.name, "server create accepted");

            // The create response carries no addresses; follow up with a get.
            Ok(self
                .fetch_server(&server_id)
                .await?
                .unwrap_or_else(|| ServerRecord {
                    id: server_id.clone(),
                    status: String::from("BUILD"),
                    public_address: None,
                    private_address: None,
                    automation_status: None,
                }))
        })
    }

    fn get_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, Option<ServerRecord>> {
        Box::pin(async move { self.fetch_server(server_id).await })
    }

    fn delete_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let session = self.session().await?;
            let url = format!("{}/{server_id}", self.servers_url(session));
            let resp = self
                .http
                .delete(url)
                .header(AUTH_TOKEN_HEADER, session.token.as_str())
                .send()
                .await?;
            let status = resp.status();
            // A 404 counts as already gone; teardown is idempotent.
            if status.is_success() || status == StatusCode::NOT_FOUND {
                info!(server_id = %server_id, "server delete accepted");
                return Ok(());
            }
            let body = resp.text().await.unwrap_or_default();
            Err(GatewayError::Api {
                endpoint: "delete server",
                status: status.as_u16(),
                body,
            })
        })
    }
}

impl Waitable for RackspaceGateway {
    fn wait_until_ready<'a>(
        &'a self,
        server_id: &'a str,
        timeout: Duration,
    ) -> GatewayFuture<'a, ServerRecord> {
        Box::pin(async move {
            let deadline = Instant::now() + timeout;
            loop {
                if let Some(server) = self.fetch_server(server_id).await? {
                    if server.status.eq_ignore_ascii_case(ERROR_STATUS) {
                        return Err(GatewayError::Failed {
                            action: "wait_until_ready",
                            server_id: server_id.to_owned(),
                        });
                    }
                    if server.status.eq_ignore_ascii_case(READY_STATUS) {
                        debug!(server_id = %server_id, "server reports ready");
                        return Ok(server);
                    }
                }

                if Instant::now() > deadline {
                    return Err(GatewayError::Timeout {
                        action: "wait_until_ready",
                        server_id: server_id.to_owned(),
                    });
                }
                sleep(self.poll_interval).await;
            }
        })
    }

    fn wait_for_network_attach<'a>(
        &'a self,
        server_id: &'a str,
        timeout: Duration,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let deadline = Instant::now() + timeout;
            loop {
                if let Some(server) = self.fetch_server(server_id).await? {
                    let done = server
                        .automation_status
                        .as_deref()
                        .is_some_and(|status| status.eq_ignore_ascii_case(NETWORK_ATTACH_DONE));
                    if done {
                        debug!(server_id = %server_id, "network attach automation finished");
                        return Ok(());
                    }
                }

                if Instant::now() > deadline {
                    return Err(GatewayError::Timeout {
                        action: "network_attach",
                        server_id: server_id.to_owned(),
                    });
                }
                sleep(self.poll_interval).await;
            }
        })
    }
}
