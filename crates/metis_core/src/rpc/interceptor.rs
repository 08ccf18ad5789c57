//! Per-request authentication, timing and error mapping.
//!
//! # Responsibility
//! - Extract the caller token from request metadata.
//! - Hand the authenticated caller to the target operation.
//! - Log every completed call and map domain errors to transport status.
//!
//! # Invariants
//! - The operation never runs for a missing or empty token.
//! - This is the only place where `ServiceError` becomes `RpcStatus`.

use crate::rpc::status::{to_status, RpcStatus};
use crate::service::project_service::ServiceResult;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::time::Instant;

/// Metadata key carrying the caller token.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Request headers, keyed case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    entries: BTreeMap<String, Vec<String>>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata carrying one `authorization` value.
    pub fn with_token(token: impl Into<String>) -> Self {
        let mut metadata = Self::new();
        metadata.append(AUTHORIZATION_KEY, token);
        metadata
    }

    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Authenticated identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(String);

impl CallerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CallerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution context handed to an operation after authentication.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub caller: CallerId,
}

/// Resolves the caller from the first `authorization` value.
pub fn authenticate(metadata: &RequestMetadata) -> Result<CallerId, RpcStatus> {
    match metadata.get_all(AUTHORIZATION_KEY).first() {
        Some(token) if !token.is_empty() => Ok(CallerId(token.clone())),
        _ => Err(RpcStatus::unauthenticated(
            "authorization token is not provided",
        )),
    }
}

/// Runs `handler` for `method` behind authentication, logging and mapping.
pub fn intercept<Req, Resp, F>(
    method: &str,
    metadata: &RequestMetadata,
    request: &Req,
    handler: F,
) -> Result<Resp, RpcStatus>
where
    Req: Debug,
    F: FnOnce(&RequestContext, &Req) -> ServiceResult<Resp>,
{
    let started_at = Instant::now();

    let caller = match authenticate(metadata) {
        Ok(caller) => caller,
        Err(status) => {
            warn!(
                "event=rpc module=rpc status=unauthenticated method={} duration_ms={}",
                method,
                started_at.elapsed().as_millis()
            );
            return Err(status);
        }
    };

    let context = RequestContext {
        method: method.to_string(),
        caller,
    };

    match handler(&context, request) {
        Ok(response) => {
            info!(
                "event=rpc module=rpc status=ok method={} duration_ms={}",
                method,
                started_at.elapsed().as_millis()
            );
            Ok(response)
        }
        Err(err) => {
            let status = to_status(&err);
            warn!(
                "event=rpc module=rpc status=error method={} duration_ms={} request={:?} code={} error={}",
                method,
                started_at.elapsed().as_millis(),
                request,
                status.code.as_str(),
                err
            );
            Err(status)
        }
    }
}
