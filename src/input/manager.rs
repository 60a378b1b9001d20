//! Input manager: loads the candidate profile and the scraped listings

use crate::error::{JobMatcherError, Result};
use crate::input::listing::Listing;
use crate::input::profile::CandidateProfile;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::path::Path;

pub struct InputManager;

impl InputManager {
    pub async fn load_profile(path: &Path) -> Result<CandidateProfile> {
        let profile: CandidateProfile = Self::read_json(path, "candidate profile").await?;

        let dups = profile.duplicate_indices();
        if !dups.is_empty() {
            return Err(JobMatcherError::InvalidInput(format!(
                "Experience indices must be unique in {}; duplicated: {:?}",
                path.display(),
                dups
            )));
        }

        info!(
            "Loaded CV from {} ({} experiences)",
            path.display(),
            profile.experiences.len()
        );
        Ok(profile)
    }

    pub async fn load_listings(path: &Path) -> Result<Vec<Listing>> {
        let listings: Vec<Listing> = Self::read_json(path, "listings").await?;
        let listings: Vec<Listing> = listings.into_iter().map(Listing::trimmed).collect();

        if listings.is_empty() {
            warn!("No listings found in {}", path.display());
        }

        info!("Loaded {} internships from {}", listings.len(), path.display());
        Ok(listings)
    }

    async fn read_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T> {
        if !path.exists() {
            return Err(JobMatcherError::InputMissing {
                what,
                path: path.to_path_buf(),
            });
        }

        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| {
            JobMatcherError::InvalidInput(format!(
                "Failed to parse {} from {}: {}",
                what,
                path.display(),
                e
            ))
        })
    }
}
