//! Generation client for an Ollama-compatible `/api/generate` endpoint.
//!
//! One client serves both response modes. In blocking mode the server answers
//! with a single JSON body; in streaming mode it sends newline-delimited JSON
//! chunks that are concatenated here. Callers get the same text either way.
//!
//! Every call retries with a fixed delay per failure class. Progress events
//! are produced by the same task that reads the response: a timer is
//! multiplexed with the body stream and dropped once the first token arrives
//! or the read ends.

use crate::config::{BackoffConfig, GenerationConfig};
use crate::llm::progress::{ProgressEvent, ProgressObserver, Telemetry};
use crate::llm::transport::{GenerateOptions, GenerateRequest, HttpTransport, Transport};
use futures::StreamExt;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed, is the model server running? ({0})")]
    ConnectionFailure(String),

    #[error("generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    pub fn backoff(&self, backoff: &BackoffConfig) -> Duration {
        let secs = match self {
            GenerationError::Timeout => backoff.timeout_secs,
            GenerationError::ConnectionFailure(_) => backoff.connection_secs,
            GenerationError::Other(_) => backoff.other_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Per-call parameters.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    pub temperature: f32,
    /// Total attempts; 0 is treated as 1
    pub max_retries: u32,
    /// Ask the server to constrain output to JSON syntax
    pub json_output: bool,
}

pub struct GenerationClient<T: Transport = HttpTransport> {
    transport: T,
    config: GenerationConfig,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl GenerationClient<HttpTransport> {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let transport =
            HttpTransport::new(config.generate_url(), config.tags_url(), config.timeout())?;
        Ok(Self::with_transport(transport, config))
    }

    /// Models available on the server; doubles as a reachability check.
    pub async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        self.transport.list_models().await
    }
}

impl<T: Transport> GenerationClient<T> {
    pub fn with_transport(transport: T, config: GenerationConfig) -> Self {
        Self {
            transport,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate with JSON mode on. Fails only once `max_retries` attempts
    /// have failed, returning the last error.
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_retries: u32,
    ) -> Result<String, GenerationError> {
        self.generate_with(
            prompt,
            CallOptions {
                temperature,
                max_retries,
                json_output: true,
            },
        )
        .await
    }

    /// Free-form text generation, without the JSON constraint.
    pub async fn generate_text(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        self.generate_with(
            prompt,
            CallOptions {
                temperature,
                max_retries: self.config.max_retries,
                json_output: false,
            },
        )
        .await
    }

    pub async fn generate_with(&self, prompt: &str, options: CallOptions) -> Result<String, GenerationError> {
        let max_attempts = options.max_retries.max(1);
        let request = self.build_request(prompt, &options);
        let mut attempt = 1;

        loop {
            info!(
                "Sending request to {} (attempt {}/{})",
                self.config.model, attempt, max_attempts
            );
            self.emit(ProgressEvent::Sent {
                attempt,
                max_attempts,
            });

            match self.attempt(&request).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt >= max_attempts => {
                    error!("Giving up after {} attempts: {}", attempt, err);
                    return Err(err);
                }
                Err(err) => {
                    let delay = err.backoff(&self.config.backoff);
                    warn!(
                        "Attempt {} failed: {}. Retrying in {}s",
                        attempt,
                        err,
                        delay.as_secs()
                    );
                    self.emit(ProgressEvent::Retrying {
                        attempt,
                        delay,
                        reason: err.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn build_request(&self, prompt: &str, options: &CallOptions) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: self.config.stream,
            options: GenerateOptions {
                temperature: options.temperature,
                num_ctx: self.config.num_ctx,
                num_predict: self.config.num_predict,
            },
            format: options.json_output.then(|| "json".to_string()),
        }
    }

    async fn attempt(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
        let started = Instant::now();
        let period = self.config.progress_interval();
        let mut ticker = tokio::time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let send = self.transport.post_generate(request);
        tokio::pin!(send);
        let mut body = loop {
            tokio::select! {
                sent = &mut send => break sent?,
                _ = ticker.tick() => self.emit(ProgressEvent::Waiting { elapsed: started.elapsed() }),
            }
        };

        let mut reader = ResponseReader::new(request.stream);
        let every = self.config.throughput_every_tokens.max(1);
        let mut waiting = true;

        loop {
            tokio::select! {
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let before = reader.tokens();
                        reader.push(&bytes)?;
                        let now = reader.tokens();
                        if before == 0 && now > 0 {
                            waiting = false;
                            self.emit(ProgressEvent::FirstToken { elapsed: started.elapsed() });
                        }
                        if now / every > before / every {
                            let elapsed = started.elapsed();
                            self.emit(ProgressEvent::Throughput {
                                tokens: now,
                                elapsed,
                                tokens_per_sec: now as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
                            });
                        }
                    }
                    Some(Err(err)) => return Err(err),
                    None => break,
                },
                _ = ticker.tick(), if waiting => {
                    self.emit(ProgressEvent::Waiting { elapsed: started.elapsed() });
                }
            }
        }

        let response = reader.finish()?;
        debug!(
            "Received {} characters in {:.1}s",
            response.text.len(),
            started.elapsed().as_secs_f64()
        );
        if let Some(speed) = response.telemetry.as_ref().and_then(Telemetry::eval_tokens_per_sec) {
            info!("Server reported {:.1} tok/s", speed);
        }
        self.emit(ProgressEvent::Completed {
            tokens: response.tokens,
            elapsed: started.elapsed(),
            telemetry: response.telemetry,
        });
        Ok(response.text)
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponseChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    telemetry: Telemetry,
}

struct AssembledResponse {
    text: String,
    tokens: usize,
    telemetry: Option<Telemetry>,
}

/// Accumulates the response body. Only the reading task writes to it.
struct ResponseReader {
    streaming: bool,
    pending: Vec<u8>,
    text: String,
    tokens: usize,
    done: bool,
    telemetry: Option<Telemetry>,
}

impl ResponseReader {
    fn new(streaming: bool) -> Self {
        Self {
            streaming,
            pending: Vec::new(),
            text: String::new(),
            tokens: 0,
            done: false,
            telemetry: None,
        }
    }

    fn tokens(&self) -> usize {
        self.tokens
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), GenerationError> {
        self.pending.extend_from_slice(bytes);
        if !self.streaming {
            return Ok(());
        }

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line[..pos])?;
        }
        Ok(())
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<(), GenerationError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        if self.done {
            debug!("Ignoring data after the final chunk");
            return Ok(());
        }

        let chunk: ResponseChunk = serde_json::from_slice(line)
            .map_err(|e| GenerationError::Other(format!("Malformed stream chunk: {}", e)))?;
        if let Some(message) = chunk.error {
            return Err(GenerationError::Other(message));
        }

        if !chunk.response.is_empty() {
            self.tokens += 1;
            self.text.push_str(&chunk.response);
        }
        if chunk.done {
            self.done = true;
            self.telemetry = Some(chunk.telemetry);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<AssembledResponse, GenerationError> {
        if self.streaming {
            let rest = std::mem::take(&mut self.pending);
            self.consume_line(&rest)?;
            if !self.done {
                return Err(GenerationError::Other(
                    "Stream ended before the final chunk".to_string(),
                ));
            }
            return Ok(AssembledResponse {
                text: self.text,
                tokens: self.tokens,
                telemetry: self.telemetry,
            });
        }

        let body: ResponseChunk = serde_json::from_slice(&self.pending)
            .map_err(|e| GenerationError::Other(format!("Malformed response body: {}", e)))?;
        if let Some(message) = body.error {
            return Err(GenerationError::Other(message));
        }
        Ok(AssembledResponse {
            tokens: usize::from(!body.response.is_empty()),
            text: body.response,
            telemetry: Some(body.telemetry),
        })
    }
}
