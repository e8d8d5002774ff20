//! Conversion Service port and its HTTP implementation.
//!
//! The exchange is split in two so the interpretation rules can be tested
//! without a network:
//!
//! 1. [`ConversionService::send`] performs the transport step and returns
//!    the raw [`ServiceReply`] (status + body), or a
//!    [`ConversionFailure::Transport`] when no reply was obtained.
//! 2. [`classify`] turns a reply into either the Markdown artifact or the
//!    [`ConversionFailure`] whose text becomes the user-visible notice.
//!
//! ## Classification precedence
//!
//! ```text
//! non-2xx ──▶ body.error (non-empty) │ "Server error: <status>"
//! 2xx     ──▶ body not JSON           → Transport("Malformed response: …")
//!         ──▶ body.error (non-empty)  → Service(error)
//!         ──▶ !success │ no markdown  → EmptyResponse
//!         ──▶ markdown
//! ```

use crate::config::WorkflowConfig;
use crate::error::{ConversionFailure, MdropError};
use crate::submission::FileRef;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raw outcome of the transport step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: u16,
    pub body: String,
}

impl ServiceReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// JSON contract of the conversion endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Remote converter accepting one file and answering with a [`ServiceReply`].
///
/// Implementations must be `Send + Sync`: the controller issues each request
/// from its own spawned task.
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn send(&self, file: &FileRef) -> Result<ServiceReply, ConversionFailure>;
}

/// Interpret a reply. Exactly one of artifact or failure results.
pub fn classify(reply: &ServiceReply) -> Result<String, ConversionFailure> {
    if !reply.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&reply.body)
            .ok()
            .and_then(|b| b.error)
            .filter(|e| !e.trim().is_empty());
        return Err(match message {
            Some(message) => ConversionFailure::Status {
                status: reply.status,
                message,
            },
            None => ConversionFailure::generic_status(reply.status),
        });
    }

    let parsed: ConversionReply = serde_json::from_str(&reply.body)
        .map_err(|e| ConversionFailure::transport(format!("Malformed response: {e}")))?;

    if let Some(error) = parsed.error.filter(|e| !e.trim().is_empty()) {
        return Err(ConversionFailure::Service(error));
    }

    match parsed.markdown {
        Some(markdown) if parsed.success && !markdown.is_empty() => Ok(markdown),
        _ => Err(ConversionFailure::EmptyResponse),
    }
}

/// Send `file` through `service` and classify the reply.
pub async fn convert(
    service: &dyn ConversionService,
    file: &FileRef,
) -> Result<String, ConversionFailure> {
    let reply = service.send(file).await?;
    debug!("Reply {} ({} bytes) for '{}'", reply.status, reply.body.len(), file.name());
    classify(&reply)
}

/// POSTs the file as `multipart/form-data` to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpConversionService {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    field_name: String,
}

impl HttpConversionService {
    pub fn new(config: &WorkflowConfig) -> Result<Self, MdropError> {
        let endpoint = reqwest::Url::parse(&config.endpoint)
            .map_err(|e| MdropError::InvalidConfig(format!("endpoint: {e}")))?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            endpoint,
            field_name: config.field_name.clone(),
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    async fn send(&self, file: &FileRef) -> Result<ServiceReply, ConversionFailure> {
        let bytes = file.read().await.map_err(|e| {
            warn!("Could not read '{}': {}", file.name(), e);
            ConversionFailure::transport(format!("Failed to read '{}': {e}", file.name()))
        })?;

        info!("Uploading '{}' ({} bytes) to {}", file.name(), bytes.len(), self.endpoint);

        let part = Part::bytes(bytes).file_name(file.name().to_string());
        let form = Form::new().part(self.field_name.clone(), part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Request for '{}' failed: {}", file.name(), e);
                ConversionFailure::transport(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(ConversionFailure::transport)?;

        Ok(ServiceReply { status, body })
    }
}
