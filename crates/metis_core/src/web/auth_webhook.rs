//! Authorization webhook called by the document service.
//!
//! # Responsibility
//! - Decide whether a document-service client may touch a project document.
//! - Translate malformed input and backend failures into HTTP status codes.
//!
//! # Invariants
//! - The server's own webhook token is always allowed.
//! - Document operations are allowed only for the project's owner.
//! - A scoped webhook denies keys outside its collection.
//! - Denials are structured responses (`allowed=false`), not errors.

use crate::document::DocumentKey;
use crate::model::id::EntityId;
use crate::repo::project_repo::{ProjectRepository, RepoError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub const AUTH_PATH: &str = "/auth";

pub const HTTP_OK: u16 = 200;
pub const HTTP_BAD_REQUEST: u16 = 400;
pub const HTTP_INTERNAL_SERVER_ERROR: u16 = 500;

const PERMISSION_DENIED_REASON: &str = "user does not have permission to the document";

/// Document-service operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookMethod {
    ActivateClient,
    DeactivateClient,
    AttachDocument,
    DetachDocument,
    PushPull,
    WatchDocuments,
    #[serde(other)]
    Other,
}

impl WebhookMethod {
    fn touches_document(self) -> bool {
        matches!(
            self,
            Self::AttachDocument | Self::DetachDocument | Self::PushPull
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAttribute {
    pub key: String,
    #[serde(default)]
    pub verb: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthWebhookRequest {
    pub token: String,
    pub method: WebhookMethod,
    #[serde(default)]
    pub attributes: Vec<AccessAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthWebhookResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl AuthWebhookResponse {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Failure while handling a webhook call.
#[derive(Debug)]
pub enum WebhookError {
    /// Body, document key or project id could not be decoded.
    BadRequest(String),
    /// Project lookup failed for a reason other than absence.
    Backend(RepoError),
    /// Response could not be encoded.
    Encode(serde_json::Error),
}

impl WebhookError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => HTTP_BAD_REQUEST,
            Self::Backend(_) | Self::Encode(_) => HTTP_INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for WebhookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "bad webhook request: {message}"),
            Self::Backend(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "webhook response encoding failed: {err}"),
        }
    }
}

impl Error for WebhookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BadRequest(_) => None,
            Self::Backend(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

/// HTTP-level answer of the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResponse {
    pub status: u16,
    pub body: String,
}

/// Handler for `POST /auth`.
pub struct AuthWebhook<R: ProjectRepository> {
    projects: R,
    webhook_token: String,
    collection: Option<String>,
}

impl<R: ProjectRepository> AuthWebhook<R> {
    pub fn new(projects: R, webhook_token: impl Into<String>) -> Self {
        Self {
            projects,
            webhook_token: webhook_token.into(),
            collection: None,
        }
    }

    /// Denies keys outside `collection`. Unscoped webhooks check any collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Decodes `body`, authorizes it, and renders the HTTP answer.
    pub fn handle(&self, body: &[u8]) -> WebResponse {
        let started_at = Instant::now();
        let response = match self.handle_body(body) {
            Ok(body) => WebResponse {
                status: HTTP_OK,
                body,
            },
            Err(err) => {
                error!(
                    "event=auth_webhook module=web status=error code={} error={}",
                    err.http_status(),
                    err
                );
                WebResponse {
                    status: err.http_status(),
                    body: err.to_string(),
                }
            }
        };
        info!(
            "event=web module=web path={} http_status={} duration_ms={}",
            AUTH_PATH,
            response.status,
            started_at.elapsed().as_millis()
        );
        response
    }

    fn handle_body(&self, body: &[u8]) -> Result<String, WebhookError> {
        let request: AuthWebhookRequest = serde_json::from_slice(body)
            .map_err(|err| WebhookError::BadRequest(err.to_string()))?;
        let response = self.authorize(&request)?;
        serde_json::to_string(&response).map_err(WebhookError::Encode)
    }

    /// Authorizes one decoded webhook request.
    pub fn authorize(
        &self,
        request: &AuthWebhookRequest,
    ) -> Result<AuthWebhookResponse, WebhookError> {
        if request.token == self.webhook_token {
            return Ok(AuthWebhookResponse::allow());
        }
        if !request.method.touches_document() {
            return Ok(AuthWebhookResponse::allow());
        }

        let attribute = request
            .attributes
            .first()
            .ok_or_else(|| WebhookError::BadRequest("attributes are empty".to_string()))?;
        let key = DocumentKey::from_bson_key(&attribute.key)
            .map_err(|err| WebhookError::BadRequest(err.to_string()))?;
        if let Some(collection) = self.collection.as_deref() {
            if key.collection != collection {
                warn!(
                    "event=auth_webhook module=web status=denied method={:?} collection={}",
                    request.method, key.collection
                );
                return Ok(AuthWebhookResponse::deny(PERMISSION_DENIED_REASON));
            }
        }
        let project_id = EntityId::parse(&key.document)
            .map_err(|err| WebhookError::BadRequest(err.to_string()))?;

        match self.projects.find_project(&request.token, project_id) {
            Ok(project) if project.owner == request.token => Ok(AuthWebhookResponse::allow()),
            Ok(_) | Err(RepoError::NotFound(_)) => {
                warn!(
                    "event=auth_webhook module=web status=denied method={:?} project_id={}",
                    request.method, project_id
                );
                Ok(AuthWebhookResponse::deny(PERMISSION_DENIED_REASON))
            }
            Err(err) => Err(WebhookError::Backend(err)),
        }
    }
}
