//! CLI interface for the job matcher

use crate::error::{JobMatcherError, Result as CrateResult};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "job-matcher")]
#[command(about = "Score internship listings against a CV and draft cover letters with a local LLM")]
#[command(long_about = "Runs the two-stage pipeline over a run directory: every scraped listing is scored \
against the candidate profile, then the best offers get selected experiences and a tailored cover letter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score, rank and match the listings of a run directory
    Run {
        /// Run directory holding the scraped listings; artifacts are written here
        #[arg(short, long)]
        run_dir: PathBuf,

        /// Candidate profile JSON (defaults to paths.profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// File whose content replaces candidate.intent
        #[arg(short, long)]
        intent_file: Option<PathBuf>,

        /// Model tag to use instead of generation.model
        #[arg(short, long)]
        model: Option<String>,

        /// Consume the response incrementally
        #[arg(long)]
        stream: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print a prompt without calling the model
    Prompt {
        /// Which prompt to build
        #[arg(value_enum)]
        stage: PromptStage,

        /// Run directory holding the listings (and scoring.json for `match`)
        #[arg(short, long)]
        run_dir: PathBuf,

        /// Candidate profile JSON (defaults to paths.profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// File whose content replaces candidate.intent
        #[arg(short, long)]
        intent_file: Option<PathBuf>,
    },

    /// Check that the model server is reachable
    Ping {
        /// Also send a short test prompt to the configured model
        #[arg(long)]
        generate: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PromptStage {
    Scoring,
    Match,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

/// The run directory must already exist; it is created by the init step.
pub fn validate_run_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        Err(format!("Run directory does not exist: {}", path.display()))
    } else if !path.is_dir() {
        Err(format!("Not a directory: {}", path.display()))
    } else {
        Ok(())
    }
}

/// The intent file, when given, replaces the configured intent.
pub fn resolve_intent(intent_file: Option<&Path>, configured: &str) -> CrateResult<String> {
    match intent_file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(JobMatcherError::InputMissing {
                what: "intent file",
                path: path.to_path_buf(),
            }),
            Err(e) => Err(JobMatcherError::Io(e)),
        },
        None => Ok(configured.to_string()),
    }
}
