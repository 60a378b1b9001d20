//! Progress events emitted while a generation request is in flight

use log::info;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A request attempt was sent
    Sent { attempt: u32, max_attempts: u32 },
    /// Periodic tick while no token has arrived yet
    Waiting { elapsed: Duration },
    /// First token received; the server finished processing the prompt
    FirstToken { elapsed: Duration },
    /// Periodic throughput report while tokens stream in
    Throughput {
        tokens: usize,
        elapsed: Duration,
        tokens_per_sec: f64,
    },
    /// The attempt failed and the client will sleep before retrying
    Retrying { attempt: u32, delay: Duration, reason: String },
    Completed {
        tokens: usize,
        elapsed: Duration,
        telemetry: Option<Telemetry>,
    },
}

/// Counters the server attaches to its final chunk. Durations are in
/// nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Telemetry {
    pub total_duration: Option<u64>,
    pub load_duration: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    pub prompt_eval_duration: Option<u64>,
    pub eval_count: Option<u64>,
    pub eval_duration: Option<u64>,
}

impl Telemetry {
    /// Generation speed as measured by the server.
    pub fn eval_tokens_per_sec(&self) -> Option<f64> {
        match (self.eval_count, self.eval_duration) {
            (Some(count), Some(ns)) if ns > 0 => Some(count as f64 / (ns as f64 / 1e9)),
            _ => None,
        }
    }
}

/// Receives progress events. Implementations only observe; they never
/// touch the response being assembled.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Observer that writes events to the log.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Sent { attempt, max_attempts } => {
                info!("Sending request (attempt {}/{})", attempt, max_attempts)
            }
            ProgressEvent::Waiting { elapsed } => {
                info!("Processing prompt... {}s elapsed", elapsed.as_secs())
            }
            ProgressEvent::FirstToken { elapsed } => {
                info!("First token after {:.1}s", elapsed.as_secs_f64())
            }
            ProgressEvent::Throughput {
                tokens,
                tokens_per_sec,
                ..
            } => info!("{} tokens ({:.1} tok/s)", tokens, tokens_per_sec),
            ProgressEvent::Retrying {
                attempt,
                delay,
                reason,
            } => info!(
                "Attempt {} failed ({}), retrying in {}s",
                attempt,
                reason,
                delay.as_secs()
            ),
            ProgressEvent::Completed {
                tokens,
                elapsed,
                telemetry,
            } => {
                info!(
                    "Response complete: {} chunks in {:.1}s",
                    tokens,
                    elapsed.as_secs_f64()
                );
                if let Some(t) = telemetry {
                    info!(
                        "Server telemetry: prompt_eval_count={:?} eval_count={:?} total={:.1}s speed={}",
                        t.prompt_eval_count,
                        t.eval_count,
                        t.total_duration.unwrap_or(0) as f64 / 1e9,
                        t.eval_tokens_per_sec()
                            .map(|s| format!("{:.1} tok/s", s))
                            .unwrap_or_else(|| "n/a".to_string())
                    );
                }
            }
        }
    }
}
