//! Terminal spinner fed by generation progress events

use crate::llm::progress::{ProgressEvent, ProgressObserver};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for SpinnerProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Sent {
                attempt,
                max_attempts,
            } => {
                self.bar.reset_elapsed();
                self.bar
                    .set_message(format!("waiting for the model (attempt {}/{})", attempt, max_attempts));
            }
            ProgressEvent::Waiting { elapsed } => {
                self.bar
                    .set_message(format!("processing prompt... {}s", elapsed.as_secs()));
            }
            ProgressEvent::FirstToken { elapsed } => {
                self.bar.println(format!(
                    "  ✅ prompt processed in {:.1}s",
                    elapsed.as_secs_f64()
                ));
                self.bar.set_message("generating...");
            }
            ProgressEvent::Throughput {
                tokens,
                tokens_per_sec,
                ..
            } => {
                self.bar
                    .set_message(format!("generating... {} tokens ({:.1} tok/s)", tokens, tokens_per_sec));
            }
            ProgressEvent::Retrying { delay, reason, .. } => {
                self.bar.println(format!("  ⚠️  {}", reason));
                self.bar
                    .set_message(format!("retrying in {}s", delay.as_secs()));
            }
            ProgressEvent::Completed { elapsed, .. } => {
                self.bar.println(format!(
                    "  ✅ response received in {:.1}s",
                    elapsed.as_secs_f64()
                ));
                self.bar.set_message("done");
            }
        }
    }
}
