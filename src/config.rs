//! Configuration management for the job matcher

use crate::error::{JobMatcherError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub generation: GenerationConfig,
    pub pipeline: PipelineConfig,
    pub paths: PathsConfig,
    pub candidate: CandidateConfig,
}

/// Everything the generation client needs to talk to the model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the Ollama-compatible server, without the `/api/...` path
    pub base_url: String,
    /// Model tag; larger models trade latency for quality
    pub model: String,
    /// Context window requested from the server (`num_ctx`)
    pub num_ctx: u32,
    /// Maximum generated tokens (`num_predict`)
    pub num_predict: u32,
    /// Wall-clock deadline for one request, body included
    pub timeout_secs: u64,
    /// Consume the response as newline-delimited chunks
    pub stream: bool,
    pub max_retries: u32,
    pub progress_interval_secs: u64,
    pub throughput_every_tokens: usize,
    pub backoff: BackoffConfig,
}

/// Fixed delays between attempts, one per failure class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub timeout_secs: u64,
    pub connection_secs: u64,
    pub other_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub scoring_temperature: f32,
    pub match_temperature: f32,
    /// Token estimate above which the scoring prompt triggers a warning
    pub context_warning_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub profile: PathBuf,
    /// File names inside the run directory
    pub listings_file: String,
    pub scoring_file: String,
    pub match_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub intent: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:32b".to_string(),
            num_ctx: 65536,
            num_predict: 16384,
            timeout_secs: 1800,
            stream: false,
            max_retries: 3,
            progress_interval_secs: 30,
            throughput_every_tokens: 200,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connection_secs: 15,
            other_secs: 10,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scoring_temperature: 0.2,
            match_temperature: 0.4,
            context_warning_tokens: 32768,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            profile: PathBuf::from("inputs").join("cv.json"),
            listings_file: "internships.json".to_string(),
            scoring_file: "scoring.json".to_string(),
            match_file: "match.json".to_string(),
        }
    }
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            intent: "Je cherche un stage de fin d'études de 4 à 6 mois. \
                     Privilégier les offres qui correspondent à mes compétences prioritaires."
                .to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            pipeline: PipelineConfig::default(),
            paths: PathsConfig::default(),
            candidate: CandidateConfig::default(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs.max(1))
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url.trim_end_matches('/'))
    }
}

impl Config {
    /// Load from the default location, writing defaults on first use.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content).map_err(|e| {
                JobMatcherError::Configuration(format!("Failed to parse config: {}", e))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            JobMatcherError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("job-matcher")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.generation;
        if g.model.trim().is_empty() {
            return Err(JobMatcherError::Configuration(
                "generation.model must not be empty".to_string(),
            ));
        }
        if !g.base_url.starts_with("http://") && !g.base_url.starts_with("https://") {
            return Err(JobMatcherError::Configuration(format!(
                "generation.base_url must be an http(s) URL, got '{}'",
                g.base_url
            )));
        }
        for (name, t) in [
            ("scoring_temperature", self.pipeline.scoring_temperature),
            ("match_temperature", self.pipeline.match_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(JobMatcherError::Configuration(format!(
                    "pipeline.{} must be within 0.0..=2.0, got {}",
                    name, t
                )));
            }
        }
        Ok(())
    }

    pub fn listings_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.paths.listings_file)
    }

    pub fn scoring_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.paths.scoring_file)
    }

    pub fn match_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.paths.match_file)
    }
}
