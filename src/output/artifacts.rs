//! Scoring and match artifacts written to the run directory

use crate::error::{JobMatcherError, Result};
use crate::input::Listing;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Upper bound on experience indices kept per match.
pub const MAX_MATCH_EXPERIENCES: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringArtifact {
    #[serde(default)]
    pub scoring: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: u8,
    #[serde(default, deserialize_with = "lenient_indices")]
    pub skills: Vec<u32>,
    #[serde(default)]
    pub cover_letter: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchArtifact {
    #[serde(rename = "match", default)]
    pub matches: Vec<MatchEntry>,
}

/// Models sometimes answer `85.0` or `"85"`; anything numeric is rounded and
/// clamped into 0..=100.
fn lenient_score<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Null => Some(0.0),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n.round().clamp(0.0, 100.0) as u8),
        _ => Err(serde::de::Error::custom(format!(
            "score must be a number, got {}",
            value
        ))),
    }
}

/// Experience indices the model wrote as negative numbers, floats or text
/// are dropped here; unknown but valid indices are left to `normalize`.
fn lenient_indices<'de, D>(deserializer: D) -> std::result::Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = values.len();
    let indices: Vec<u32> = values
        .iter()
        .filter_map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
        .collect();
    if indices.len() < total {
        warn!(
            "Dropped {} experience indices that are not non-negative integers",
            total - indices.len()
        );
    }
    Ok(indices)
}

impl MatchEntry {
    /// Enforce the index invariant and fill identity fields the model left
    /// blank from the listing of the same name.
    pub fn normalize(&mut self, known_indices: &HashSet<u32>, listings: &[Listing]) {
        let before = self.skills.len();
        let mut seen = HashSet::new();
        self.skills
            .retain(|idx| known_indices.contains(idx) && seen.insert(*idx));
        if self.skills.len() < before {
            warn!(
                "Dropped {} unknown or repeated experience indices for '{}'",
                before - self.skills.len(),
                self.name
            );
        }
        if self.skills.len() > MAX_MATCH_EXPERIENCES {
            warn!(
                "Match '{}' selected {} experiences, keeping the first {}",
                self.name,
                self.skills.len(),
                MAX_MATCH_EXPERIENCES
            );
            self.skills.truncate(MAX_MATCH_EXPERIENCES);
        }

        if let Some(listing) = crate::input::listing::find_by_name(listings, &self.name) {
            if self.url.is_empty() {
                self.url = listing.url.clone();
            }
            if self.company.is_empty() {
                self.company = listing.company.clone();
            }
            if self.location.is_empty() {
                self.location = listing.location.clone();
            }
        }
    }
}

/// Write `value` as UTF-8 JSON with 4-space indentation and literal
/// non-ASCII characters.
pub fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(JobMatcherError::Output(format!(
                "Run directory does not exist: {}",
                parent.display()
            )));
        }
    }

    std::fs::write(path, buf)?;
    info!("Saved {}", path.display());
    Ok(())
}

pub fn read_scoring(path: &Path) -> Result<ScoringArtifact> {
    if !path.exists() {
        return Err(JobMatcherError::InputMissing {
            what: "scoring artifact",
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
