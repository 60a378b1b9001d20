//! HTTP transport to the generation server

use crate::llm::client::GenerationError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw response body, delivered as it arrives.
pub type ByteStream = BoxStream<'static, Result<Bytes, GenerationError>>;

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub num_predict: u32,
}

/// Anything that can deliver a generate request and hand back the body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_generate(&self, request: &GenerateRequest) -> Result<ByteStream, GenerationError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    generate_url: String,
    tags_url: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl HttpTransport {
    pub fn new(generate_url: String, tags_url: String, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            generate_url,
            tags_url,
        })
    }

    /// Names of the models the server has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let response = self
            .client
            .get(&self.tags_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Other(format!("Server returned {}", status)));
        }

        let tags: TagsResponse = response.json().await.map_err(classify)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_generate(&self, request: &GenerateRequest) -> Result<ByteStream, GenerationError> {
        debug!("POST {} (model: {}, stream: {})", self.generate_url, request.model, request.stream);

        let response = self
            .client
            .post(&self.generate_url)
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Other(format!(
                "Server returned {}: {}",
                status, body
            )));
        }

        Ok(response.bytes_stream().map_err(classify).boxed())
    }
}

/// Map a reqwest failure onto the three retry classes.
pub(crate) fn classify(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else if err.is_connect() {
        GenerationError::ConnectionFailure(err.to_string())
    } else {
        GenerationError::Other(err.to_string())
    }
}
