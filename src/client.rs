use std::io;
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use tokio::time::Instant;

use crate::catalog::ModelSource;
use crate::error::{Error, Result};
use crate::ndjson::{FragmentStream, collect_fragments, process_ndjson};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::transport::Endpoint;
use crate::types::{ChatRequest, Message, TagsResponse};

const TAGS_PATH: &str = "/api/tags";
const CHAT_PATH: &str = "/api/chat";
const DEFAULT_TAGS_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for an Ollama-compatible generation service.
///
/// A client is bound to one [`Endpoint`].  Reconfiguring the address or credential means building
/// a new client.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: ReqwestClient,
    endpoint: Endpoint,
    tags_timeout: Duration,
    chat_timeout: Duration,
}

impl Ollama {
    /// Create a new client for `endpoint` with default timeouts.
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        Self::with_options(endpoint, None, None)
    }

    /// Create a new client with custom timeouts.
    ///
    /// `tags_timeout` bounds the model listing request.  `chat_timeout` bounds a whole chat
    /// generation, from connect until the last line is read.
    pub fn with_options(
        endpoint: Endpoint,
        tags_timeout: Option<Duration>,
        chat_timeout: Option<Duration>,
    ) -> Result<Self> {
        // Reject credentials that cannot be sent before any request is made.
        endpoint.headers()?;
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            endpoint,
            tags_timeout: tags_timeout.unwrap_or(DEFAULT_TAGS_TIMEOUT),
            chat_timeout: chat_timeout.unwrap_or(DEFAULT_CHAT_TIMEOUT),
        })
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| {
                if error_body.trim().is_empty() {
                    format!("HTTP status {status_code}")
                } else {
                    error_body.trim().to_string()
                }
            });

        match status_code {
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_message),
        }
    }

    fn request_error(e: reqwest::Error, timeout: Duration) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    async fn checked(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            CLIENT_REQUEST_ERRORS.click();
            Err(Self::process_error_response(response).await)
        }
    }

    /// List the model identifiers the service reports, in service order.
    ///
    /// Unlike [`crate::ModelCatalog::get`], this surfaces every failure.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.endpoint.url(TAGS_PATH);
        tracing::debug!(%url, "listing models");
        CLIENT_REQUESTS.click();
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .headers(self.endpoint.headers()?)
            .timeout(self.tags_timeout)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                Self::request_error(e, self.tags_timeout)
            })?;
        let response = Self::checked(response).await?;

        let tags = response.json::<TagsResponse>().await.map_err(|e| {
            if e.is_timeout() {
                Self::request_error(e, self.tags_timeout)
            } else {
                Error::serialization(
                    format!("Failed to parse model list: {e}"),
                    Some(Box::new(e)),
                )
            }
        })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        Ok(tags.names())
    }

    /// Submit `messages` to `model` and stream the reply.
    ///
    /// Fails before yielding anything if the request cannot be sent or the service answers with
    /// a non-success status.  Otherwise returns the fragments as the service produces them; see
    /// [`crate::ndjson`] for how the body is read.  Dropping the returned stream closes the
    /// connection.
    pub async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
        temperature: f32,
    ) -> Result<FragmentStream> {
        let url = self.endpoint.url(CHAT_PATH);
        let request = ChatRequest::streaming(model, messages, temperature);
        tracing::debug!(%url, model, messages = messages.len(), temperature, "starting chat stream");
        CLIENT_REQUESTS.click();
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .headers(self.endpoint.headers()?)
            .timeout(self.chat_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                Self::request_error(e, self.chat_timeout)
            })?;
        let response = Self::checked(response).await?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let byte_stream = response.bytes_stream().map_err(io::Error::other);
        Ok(process_ndjson(byte_stream))
    }

    /// Submit `messages` to `model` and wait for the whole reply.
    pub async fn chat(&self, model: &str, messages: &[Message], temperature: f32) -> Result<String> {
        let fragments = self.stream_chat(model, messages, temperature).await?;
        collect_fragments(fragments).await
    }
}

#[async_trait::async_trait]
impl ModelSource for Ollama {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        self.list_models().await
    }
}
