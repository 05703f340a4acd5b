//! Test support doubles shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::gateway::{
    ComputeGateway, GatewayError, GatewayFuture, ServerRecord, ServerSpec, Waitable,
};

/// A single call observed by [`FakeGateway`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GatewayCall {
    /// `create_server` with the spec that was passed.
    Create(ServerSpec),
    /// `get_server` for the given id.
    Get(String),
    /// `delete_server` for the given id.
    Delete(String),
    /// `wait_until_ready` for the given id.
    WaitReady(String),
    /// `wait_for_network_attach` for the given id.
    WaitNetworkAttach(String),
}

/// Scripted gateway double returning pre-seeded results in FIFO order.
///
/// Every observed call is recorded so tests can assert on exactly which
/// gateway operations ran. A call with no scripted response resolves to a
/// recognisable error instead of panicking.
#[derive(Debug, Default)]
pub struct FakeGateway {
    creates: Mutex<VecDeque<Result<ServerRecord, GatewayError>>>,
    gets: Mutex<VecDeque<Result<Option<ServerRecord>, GatewayError>>>,
    deletes: Mutex<VecDeque<Result<(), GatewayError>>>,
    readies: Mutex<VecDeque<Result<ServerRecord, GatewayError>>>,
    attaches: Mutex<VecDeque<Result<(), GatewayError>>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakeGateway {
    /// Creates a fake with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a `create_server` result.
    pub fn push_create(&self, result: Result<ServerRecord, GatewayError>) {
        lock(&self.creates).push_back(result);
    }

    /// Queues a `get_server` result.
    pub fn push_get(&self, result: Result<Option<ServerRecord>, GatewayError>) {
        lock(&self.gets).push_back(result);
    }

    /// Queues a `delete_server` result.
    pub fn push_delete(&self, result: Result<(), GatewayError>) {
        lock(&self.deletes).push_back(result);
    }

    /// Queues a `wait_until_ready` result.
    pub fn push_ready(&self, result: Result<ServerRecord, GatewayError>) {
        lock(&self.readies).push_back(result);
    }

    /// Queues a `wait_for_network_attach` result.
    pub fn push_attach(&self, result: Result<(), GatewayError>) {
        lock(&self.attaches).push_back(result);
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: GatewayCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn unscripted<T>(endpoint: &'static str) -> Result<T, GatewayError> {
    Err(GatewayError::Api {
        endpoint,
        status: 0,
        body: String::from("no scripted response available"),
    })
}

impl ComputeGateway for FakeGateway {
    fn create_server<'a>(&'a self, spec: &'a ServerSpec) -> GatewayFuture<'a, ServerRecord> {
        self.record(GatewayCall::Create(spec.clone()));
        let result = lock(&self.creates)
            .pop_front()
            .unwrap_or_else(|| unscripted("create server"));
        Box::pin(async move { result })
    }

    fn get_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, Option<ServerRecord>> {
        self.record(GatewayCall::Get(server_id.to_owned()));
        let result = lock(&self.gets)
            .pop_front()
            .unwrap_or_else(|| unscripted("get server"));
        Box::pin(async move { result })
    }

    fn delete_server<'a>(&'a self, server_id: &'a str) -> GatewayFuture<'a, ()> {
        self.record(GatewayCall::Delete(server_id.to_owned()));
        let result = lock(&self.deletes)
            .pop_front()
            .unwrap_or_else(|| unscripted("delete server"));
        Box::pin(async move { result })
    }
}

impl Waitable for FakeGateway {
    fn wait_until_ready<'a>(
        &'a self,
        server_id: &'a str,
        _timeout: Duration,
    ) -> GatewayFuture<'a, ServerRecord> {
        self.record(GatewayCall::WaitReady(server_id.to_owned()));
        let result = lock(&self.readies)
            .pop_front()
            .unwrap_or_else(|| unscripted("wait until ready"));
        Box::pin(async move { result })
    }

    fn wait_for_network_attach<'a>(
        &'a self,
        server_id: &'a str,
        _timeout: Duration,
    ) -> GatewayFuture<'a, ()> {
        self.record(GatewayCall::WaitNetworkAttach(server_id.to_owned()));
        let result = lock(&self.attaches)
            .pop_front()
            .unwrap_or_else(|| unscripted("wait for network attach"));
        Box::pin(async move { result })
    }
}

/// Builds a server record for tests.
#[must_use]
pub fn server_record(
    id: &str,
    status: &str,
    public: Option<&str>,
    private: Option<&str>,
) -> ServerRecord {
    ServerRecord {
        id: id.to_owned(),
        status: status.to_owned(),
        public_address: public.map(str::to_owned),
        private_address: private.map(str::to_owned),
        automation_status: None,
    }
}
