//! Candidate profile structures, read from the CV JSON file

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The candidate profile as stored in `cv.json`.
///
/// The personal block and the skill set are each stored as a single-element
/// array on disk; only the first element is meaningful.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(rename = "Perso", default)]
    pub personal: Vec<PersonalInfo>,

    #[serde(default)]
    pub experiences: Vec<Experience>,

    #[serde(default)]
    pub skills: Vec<SkillSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(rename = "nom", default)]
    pub name: String,

    #[serde(rename = "mail", default)]
    pub email: String,

    #[serde(rename = "numero", default)]
    pub phone: String,

    /// Introduction sentence per domain, e.g. `data` or `supply_chain`
    #[serde(default)]
    pub phrase_intro: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub index: u32,
    pub name: String,
    pub period: String,
    pub categorization: Category,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ExperiencesPro,
    Etudes,
    Certifications,
    ProjetsPerso,
    Benevolat,
}

/// Skill tiers keyed by domain.
pub type SkillSet = BTreeMap<String, SkillTiers>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillTiers {
    #[serde(default)]
    pub t_prio: Vec<String>,
    #[serde(default)]
    pub prio: Vec<String>,
    #[serde(default)]
    pub bonus: Vec<String>,
}

/// Condensed view of an experience used in the scoring prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ExperienceSummary<'a> {
    pub index: u32,
    pub name: &'a str,
    pub period: &'a str,
    pub categorization: Category,
    pub skills: &'a [String],
}

impl<'a> From<&'a Experience> for ExperienceSummary<'a> {
    fn from(exp: &'a Experience) -> Self {
        Self {
            index: exp.index,
            name: &exp.name,
            period: &exp.period,
            categorization: exp.categorization,
            skills: &exp.skills,
        }
    }
}

impl CandidateProfile {
    /// First personal block, or an empty one.
    pub fn personal_info(&self) -> PersonalInfo {
        self.personal.first().cloned().unwrap_or_default()
    }

    pub fn experience_summaries(&self) -> Vec<ExperienceSummary<'_>> {
        self.experiences.iter().map(ExperienceSummary::from).collect()
    }

    pub fn experience_indices(&self) -> HashSet<u32> {
        self.experiences.iter().map(|e| e.index).collect()
    }

    /// Experience indices that appear more than once.
    pub fn duplicate_indices(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        let mut dups: Vec<u32> = self
            .experiences
            .iter()
            .filter(|e| !seen.insert(e.index))
            .map(|e| e.index)
            .collect();
        dups.sort_unstable();
        dups.dedup();
        dups
    }
}
