//! LLM integration module
//! Generation client, prompt construction and recovery of structured output

pub mod client;
pub mod progress;
pub mod prompts;
pub mod recovery;
pub mod transport;

pub use client::{CallOptions, GenerationClient, GenerationError};
pub use progress::{LogProgress, ProgressEvent, ProgressObserver};
pub use prompts::PromptBuilder;
pub use recovery::{parse_structured, Recovered, RecoveryError};
pub use transport::{HttpTransport, Transport};
