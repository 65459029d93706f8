//! Scriptable in-memory backend for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use tpcopy_protocol::{
    BackendError, BackendErrorCode, FileStat, ProbeInfo, Reservation, TransportOptions,
};

use crate::backend::{BackendFuture, ControlPlane, EndpointRegistry, Endpoints, Transport};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ResolveGet(String),
    ResolvePut(String, u64),
    Finalize(String, String),
    Abort(String, String),
    Release(String, String),
    Delete(String),
    MakeParentDirs(String),
    Stat(String),
    Checksum(String, String),
    Probe(String),
    Transfer(String, String, TransportOptions),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    ResolveGet,
    ResolvePut,
    Finalize,
    Abort,
    Release,
    Delete,
    MakeParentDirs,
    Stat,
    Checksum,
    Probe,
    Transfer,
}

pub(crate) const GET_TOKEN: &str = "get-token";
pub(crate) const PUT_TOKEN: &str = "put-token";

pub(crate) fn get_turl(identifier: &str) -> String {
    format!("gsiftp://turl/get/{identifier}")
}

pub(crate) fn put_turl(identifier: &str) -> String {
    format!("gsiftp://turl/put/{identifier}")
}

pub(crate) fn err(code: BackendErrorCode) -> BackendError {
    BackendError::new(code, format!("scripted {code}"))
}

/// Registry, control plane and transport in one recording fake.
#[derive(Default)]
pub(crate) struct FakeBackend {
    negotiated_prefixes: Vec<String>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<(Op, Option<String>), BackendError>>,
    checksums: HashMap<String, String>,
    sizes: HashMap<String, u64>,
    backend_types: HashMap<String, String>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Identifiers starting with `prefix` require negotiation.
    pub(crate) fn negotiate(mut self, prefix: &str) -> Self {
        self.negotiated_prefixes.push(prefix.to_string());
        self
    }

    pub(crate) fn with_checksum(mut self, identifier: &str, value: &str) -> Self {
        self.checksums
            .insert(identifier.to_string(), value.to_string());
        self
    }

    pub(crate) fn with_size(mut self, identifier: &str, size: u64) -> Self {
        self.sizes.insert(identifier.to_string(), size);
        self
    }

    pub(crate) fn with_backend_type(mut self, identifier: &str, backend: &str) -> Self {
        self.backend_types
            .insert(identifier.to_string(), backend.to_string());
        self
    }

    /// Every call of `op` fails with `error`.
    pub(crate) fn fail(self, op: Op, error: BackendError) -> Self {
        self.failures.lock().unwrap().insert((op, None), error);
        self
    }

    /// Calls of `op` on `identifier` fail with `error`.
    pub(crate) fn fail_for(self, op: Op, identifier: &str, error: BackendError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert((op, Some(identifier.to_string())), error);
        self
    }

    pub(crate) fn endpoints(&self) -> Endpoints<'_> {
        Endpoints::new(self, self, self)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn scripted(&self, op: Op, identifier: &str) -> Result<(), BackendError> {
        let failures = self.failures.lock().unwrap();
        match failures
            .get(&(op, Some(identifier.to_string())))
            .or_else(|| failures.get(&(op, None)))
        {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn ready<T: Send + 'static>(result: Result<T, BackendError>) -> BackendFuture<'static, T> {
        Box::pin(async move { result })
    }
}

impl EndpointRegistry for FakeBackend {
    fn requires_negotiation(&self, identifier: &str) -> bool {
        self.negotiated_prefixes
            .iter()
            .any(|p| identifier.starts_with(p.as_str()))
    }
}

impl ControlPlane for FakeBackend {
    fn resolve_get(&self, identifier: &str) -> BackendFuture<'_, Reservation> {
        self.record(Call::ResolveGet(identifier.into()));
        Self::ready(self.scripted(Op::ResolveGet, identifier).map(|()| Reservation {
            transfer_endpoint: get_turl(identifier),
            token: GET_TOKEN.into(),
        }))
    }

    fn resolve_put(&self, identifier: &str, expected_size: u64) -> BackendFuture<'_, Reservation> {
        self.record(Call::ResolvePut(identifier.into(), expected_size));
        Self::ready(self.scripted(Op::ResolvePut, identifier).map(|()| Reservation {
            transfer_endpoint: put_turl(identifier),
            token: PUT_TOKEN.into(),
        }))
    }

    fn finalize_put(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()> {
        self.record(Call::Finalize(identifier.into(), token.into()));
        Self::ready(self.scripted(Op::Finalize, identifier))
    }

    fn abort_put(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()> {
        self.record(Call::Abort(identifier.into(), token.into()));
        Self::ready(self.scripted(Op::Abort, identifier))
    }

    fn release_get(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()> {
        self.record(Call::Release(identifier.into(), token.into()));
        Self::ready(self.scripted(Op::Release, identifier))
    }

    fn delete(&self, identifier: &str) -> BackendFuture<'_, ()> {
        self.record(Call::Delete(identifier.into()));
        Self::ready(self.scripted(Op::Delete, identifier))
    }

    fn make_parent_dirs(&self, directory: &str) -> BackendFuture<'_, ()> {
        self.record(Call::MakeParentDirs(directory.into()));
        Self::ready(self.scripted(Op::MakeParentDirs, directory))
    }

    fn stat(&self, identifier: &str) -> BackendFuture<'_, FileStat> {
        self.record(Call::Stat(identifier.into()));
        let size = self.sizes.get(identifier).copied().unwrap_or(0);
        Self::ready(
            self.scripted(Op::Stat, identifier)
                .map(|()| FileStat { size }),
        )
    }

    fn checksum(&self, identifier: &str, algorithm: &str) -> BackendFuture<'_, String> {
        self.record(Call::Checksum(identifier.into(), algorithm.into()));
        let value = self.checksums.get(identifier).cloned().unwrap_or_default();
        Self::ready(self.scripted(Op::Checksum, identifier).map(|()| value))
    }

    fn probe(&self, identifier: &str) -> BackendFuture<'_, ProbeInfo> {
        self.record(Call::Probe(identifier.into()));
        let info = match self.backend_types.get(identifier) {
            Some(backend) => ProbeInfo::with_backend_type(backend.clone()),
            None => ProbeInfo::default(),
        };
        Self::ready(self.scripted(Op::Probe, identifier).map(|()| info))
    }
}

impl Transport for FakeBackend {
    fn transfer(
        &self,
        source: &str,
        destination: &str,
        options: &TransportOptions,
    ) -> BackendFuture<'_, ()> {
        self.record(Call::Transfer(
            source.into(),
            destination.into(),
            options.clone(),
        ));
        Self::ready(self.scripted(Op::Transfer, destination))
    }
}
