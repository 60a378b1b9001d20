//! Input module
//! Candidate profile and listing structures, and the loader for both

pub mod listing;
pub mod manager;
pub mod profile;

pub use listing::Listing;
pub use manager::InputManager;
pub use profile::{CandidateProfile, Category, Experience, SkillTiers};
