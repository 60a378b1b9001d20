//! The two-stage scoring and matching pipeline

use crate::config::Config;
use crate::error::{JobMatcherError, Result};
use crate::input::{CandidateProfile, InputManager, Listing};
use crate::llm::client::GenerationClient;
use crate::llm::prompts::{join_candidates, PromptBuilder};
use crate::llm::recovery::{parse_structured, RecoveryError};
use crate::llm::transport::{HttpTransport, Transport};
use crate::output::artifacts::{
    write_pretty_json, MatchArtifact, MatchEntry, ScoreEntry, ScoringArtifact,
};
use crate::processing::ranking::{rank, top_k, TOP_K};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadInputs,
    GenerateScoring,
    RecoverScoring,
    GenerateMatch,
    RecoverMatch,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadInputs => "input loading",
            Stage::GenerateScoring => "scoring generation",
            Stage::RecoverScoring => "scoring response recovery",
            Stage::GenerateMatch => "match generation",
            Stage::RecoverMatch => "match response recovery",
            Stage::Persist => "artifact persistence",
        };
        f.write_str(name)
    }
}

/// Where one run reads from and writes to.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub profile_path: PathBuf,
    pub run_dir: PathBuf,
    pub intent: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ranked: Vec<ScoreEntry>,
    pub top: Vec<ScoreEntry>,
    /// Top-K names with no listing of the same name
    pub dropped: Vec<String>,
    pub matches: Vec<MatchEntry>,
    pub scoring_path: PathBuf,
    pub match_path: PathBuf,
}

pub struct Pipeline<T: Transport = HttpTransport> {
    config: Config,
    client: GenerationClient<T>,
    prompts: PromptBuilder,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(config: Config, client: GenerationClient<T>) -> Self {
        let prompts = PromptBuilder::new(config.pipeline.context_warning_tokens);
        Self {
            config,
            client,
            prompts,
        }
    }

    /// Run every stage. A failing stage aborts the run; an artifact already
    /// written stays on disk.
    pub async fn run(&self, inputs: &RunInputs) -> Result<RunSummary> {
        info!("Starting AI analysis in {}", inputs.run_dir.display());

        // Load both inputs before any generation call
        let profile = InputManager::load_profile(&inputs.profile_path).await?;
        let listings = InputManager::load_listings(&self.config.listings_path(&inputs.run_dir)).await?;

        // Score every offer and save the ranking right away
        info!("[STEP 1/2] Scoring all offers...");
        let ranked = rank(self.score(&profile, &listings, &inputs.intent).await?);
        let scoring_path = self.config.scoring_path(&inputs.run_dir);
        persist(
            &scoring_path,
            &ScoringArtifact {
                scoring: ranked.clone(),
            },
        )?;

        // Select the top offers and report those without a listing
        let top = top_k(&ranked, TOP_K).to_vec();
        for (i, entry) in top.iter().enumerate() {
            info!("  {}. [{}/100] {}", i + 1, entry.score, entry.name);
        }
        let dropped: Vec<String> = top
            .iter()
            .filter(|e| crate::input::listing::find_by_name(&listings, &e.name).is_none())
            .map(|e| e.name.clone())
            .collect();
        for name in &dropped {
            warn!("Scored offer '{}' matches no listing, skipping it", name);
        }

        // Detailed match and cover letters
        info!("[STEP 2/2] Generating detailed match and cover letters...");
        let matches = self
            .match_offers(&profile, &top, &listings, &inputs.intent)
            .await?;
        let match_path = self.config.match_path(&inputs.run_dir);
        persist(
            &match_path,
            &MatchArtifact {
                matches: matches.clone(),
            },
        )?;

        info!("AI analysis complete");
        Ok(RunSummary {
            ranked,
            top,
            dropped,
            matches,
            scoring_path,
            match_path,
        })
    }

    /// Scoring stage: one generation over every listing. Entries come back
    /// in model order.
    pub async fn score(
        &self,
        profile: &CandidateProfile,
        listings: &[Listing],
        intent: &str,
    ) -> Result<Vec<ScoreEntry>> {
        let prompt = self.prompts.build_scoring_prompt(profile, listings, intent);
        info!("Scoring prompt size: ~{} chars", prompt.chars().count());

        let raw = self
            .client
            .generate(
                &prompt,
                self.config.pipeline.scoring_temperature,
                self.client.config().max_retries,
            )
            .await
            .map_err(|source| JobMatcherError::Generation {
                stage: Stage::GenerateScoring,
                source,
            })?;

        let scoring: Vec<ScoreEntry> = recover_entries(&raw, "scoring", Stage::RecoverScoring)?;
        info!("Scored {} offers", scoring.len());
        Ok(scoring)
    }

    /// Match stage: experiences and cover letter for the top entries.
    /// Skips the generation call when nothing can be joined.
    pub async fn match_offers(
        &self,
        profile: &CandidateProfile,
        top: &[ScoreEntry],
        listings: &[Listing],
        intent: &str,
    ) -> Result<Vec<MatchEntry>> {
        if join_candidates(top, listings).is_empty() {
            warn!("No scored offer could be joined with a listing, skipping the match stage");
            return Ok(Vec::new());
        }

        let prompt = self.prompts.build_match_prompt(profile, top, listings, intent);
        info!("Match prompt size: ~{} chars", prompt.chars().count());

        let raw = self
            .client
            .generate(
                &prompt,
                self.config.pipeline.match_temperature,
                self.client.config().max_retries,
            )
            .await
            .map_err(|source| JobMatcherError::Generation {
                stage: Stage::GenerateMatch,
                source,
            })?;

        let entries: Vec<MatchEntry> = recover_entries(&raw, "match", Stage::RecoverMatch)?;
        let known = profile.experience_indices();
        let matches: Vec<MatchEntry> = entries
            .into_iter()
            .map(|mut entry| {
                entry.normalize(&known, listings);
                entry
            })
            .collect();
        info!("Received {} detailed matches", matches.len());
        Ok(matches)
    }
}

/// Recover the `<key>` array from raw output, either `{"<key>": [...]}` or a
/// bare array. Only output with no usable array is an error; entries that do
/// not read as `T` are dropped with a warning.
fn recover_entries<T: DeserializeOwned>(raw: &str, key: &str, stage: Stage) -> Result<Vec<T>> {
    let recovered = parse_structured(raw).map_err(|source| JobMatcherError::Recovery { stage, source })?;
    debug!("Recovered {} output via {:?}", key, recovered.strategy);

    let shape_error = |found: &Value| JobMatcherError::Recovery {
        stage,
        source: RecoveryError::with_reason(
            raw,
            format!("unexpected {} structure: expected an array, got {}", key, found),
        ),
    };
    let items = match recovered.value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => Vec::new(),
            Some(other) => return Err(shape_error(&other)),
        },
        other => return Err(shape_error(&other)),
    };

    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Dropping {} entry #{}: {}", key, i + 1, e);
                None
            }
        })
        .collect())
}

fn persist<V: serde::Serialize>(path: &std::path::Path, value: &V) -> Result<()> {
    write_pretty_json(path, value).map_err(|e| match e {
        JobMatcherError::Io(err) => JobMatcherError::Output(format!(
            "{} failed for {}: {}",
            Stage::Persist,
            path.display(),
            err
        )),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array_is_accepted() {
        let entries: Vec<ScoreEntry> =
            recover_entries(r#"[{"name": "A", "score": 50}]"#, "scoring", Stage::RecoverScoring).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_non_array_payload_is_a_recovery_error() {
        let err = recover_entries::<ScoreEntry>(
            r#"{"scoring": "nothing"}"#,
            "scoring",
            Stage::RecoverScoring,
        )
        .unwrap_err();
        match err {
            JobMatcherError::Recovery { stage, source } => {
                assert_eq!(stage, Stage::RecoverScoring);
                assert!(source.reason.contains("unexpected scoring structure"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_key_means_empty() {
        let entries: Vec<MatchEntry> = recover_entries("{}", "match", Stage::RecoverMatch).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_scoring_entry_without_name_is_dropped() {
        let raw = r#"{"scoring": [{"name": "A", "score": 90}, {"score": 40}, {"name": 7, "score": 10}, {"name": "B", "score": 30}]}"#;
        let entries: Vec<ScoreEntry> = recover_entries(raw, "scoring", Stage::RecoverScoring).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_negative_skill_index_keeps_the_match() {
        let raw = r#"{"match": [{"name": "A", "score": 80, "skills": [1, -1], "cover_letter": "Madame, Monsieur,"}]}"#;
        let entries: Vec<MatchEntry> = recover_entries(raw, "match", Stage::RecoverMatch).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].skills, vec![1]);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::GenerateScoring.to_string(), "scoring generation");
        assert_eq!(Stage::RecoverMatch.to_string(), "match response recovery");
    }
}
