//! Prompt construction for the scoring and match stages

use crate::input::listing::find_by_name;
use crate::input::{CandidateProfile, Listing};
use crate::output::artifacts::{ScoreEntry, MAX_MATCH_EXPERIENCES};
use log::{debug, info, warn};
use serde::Serialize;

/// Listing descriptions are cut to this many characters in the scoring prompt.
pub const CONTENT_MAX_CHARS: usize = 1000;

/// Rough characters-per-token ratio used for the size estimate.
pub const CHARS_PER_TOKEN: usize = 4;

pub const COVER_LETTER_OPENING: &str = "Madame, Monsieur,";
pub const COVER_LETTER_CLOSING: &str = "En attendant de pouvoir échanger à nouveau avec vous, \
                                        veuillez accepter mes sincères salutations.";

#[derive(Debug, Serialize)]
struct ScoringListing<'a> {
    name: &'a str,
    company: &'a str,
    location: &'a str,
    content: String,
}

/// A top-K entry re-joined with its listing.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate<'a> {
    pub name: &'a str,
    #[serde(rename = "URL")]
    pub url: &'a str,
    pub company: &'a str,
    pub location: &'a str,
    pub content: &'a str,
    pub score: u8,
}

/// Builds the two prompts. Output depends only on the inputs.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    context_warning_tokens: usize,
}

impl PromptBuilder {
    pub fn new(context_warning_tokens: usize) -> Self {
        Self {
            context_warning_tokens,
        }
    }

    pub fn build_scoring_prompt(
        &self,
        profile: &CandidateProfile,
        listings: &[Listing],
        intent: &str,
    ) -> String {
        let info = profile.personal_info();
        let experiences = to_json(&profile.experience_summaries());
        let skills = to_json(&profile.skills);
        let offers: Vec<ScoringListing<'_>> = listings
            .iter()
            .map(|l| ScoringListing {
                name: &l.name,
                company: &l.company,
                location: &l.location,
                content: truncate_chars(&l.content, CONTENT_MAX_CHARS),
            })
            .collect();
        let offers = to_json(&offers);

        let prompt = format!(
            r#"Tu es un expert en recrutement et en matching de profils candidats avec des offres de stage.

CONTEXTE UTILISATEUR : {intent}

PROFIL DU CANDIDAT :
- Nom : {name}

EXPÉRIENCES DU CANDIDAT :
{experiences}

COMPÉTENCES DU CANDIDAT (indexées par domaine et priorité) :
{skills}

---

LISTE DES OFFRES DE STAGE À ÉVALUER :
{offers}

---

INSTRUCTIONS :
Tu dois scorer CHAQUE offre de stage sur 100 points en fonction des critères suivants :
1. **Correspondance compétences** (40 pts) : Les compétences demandées dans l'offre correspondent-elles aux compétences du candidat ?
   - t_prio : points maximum
   - prio : points moyens
   - bonus : points bonus
2. **Correspondance formation/niveau** (10 pts) : L'offre demande-t-elle un Bac+4/5, une école d'ingénieur, un stage de fin d'études ? Si oui points complets, sinon 0.
3. **Notoriété de l'entreprise** (20 pts) : maximum pour les grands groupes et cabinets reconnus, réduit selon la taille et la notoriété de l'entreprise.
4. **Localisation** (15 pts) : maximum si l'offre correspond aux zones indiquées dans le contexte utilisateur, réduit avec la distance.
5. **Période** (15 pts) : L'offre commence-t-elle à la période recherchée par le candidat ?

Réponds UNIQUEMENT avec un JSON valide au format suivant :
{{
  "scoring": [
    {{
      "name": "nom exact de l'offre tel que dans la liste",
      "score": 85
    }}
  ]
}}

Classe les résultats du score le plus élevé au plus bas.
Ne rajoute AUCUN texte en dehors du JSON.
"#,
            intent = intent.trim(),
            name = info.name,
        );

        let estimated = estimate_tokens(&prompt);
        info!("Scoring prompt estimated tokens: ~{}", estimated);
        if self.exceeds_context(&prompt) {
            warn!(
                "Scoring prompt (~{} tokens) may exceed the model context window ({} tokens)",
                estimated, self.context_warning_tokens
            );
        }

        prompt
    }

    pub fn build_match_prompt(
        &self,
        profile: &CandidateProfile,
        top_scored: &[ScoreEntry],
        listings: &[Listing],
        intent: &str,
    ) -> String {
        let candidates = join_candidates(top_scored, listings);
        let info = profile.personal_info();
        let intro_lines: String = info
            .phrase_intro
            .iter()
            .map(|(domain, sentence)| format!("- Phrase d'intro {} : {}\n", domain, sentence))
            .collect();
        let experiences = to_json(&profile.experiences);
        let skills = to_json(&profile.skills);
        let offers = to_json(&candidates);

        format!(
            r#"Tu es un expert en recrutement. Le candidat suivant cherche un stage de fin d'études.

CONTEXTE : {intent}

PROFIL DU CANDIDAT :
- Nom : {name}
- Email : {email}
- Téléphone : {phone}
{intro_lines}
EXPÉRIENCES DU CANDIDAT (avec index) :
{experiences}

COMPÉTENCES DU CANDIDAT (indexées par domaine et niveau de priorité) :
{skills}

---

TOP {count} OFFRES SÉLECTIONNÉES (avec leur score) :
{offers}

---

INSTRUCTIONS :
Pour l'offre avec le meilleur score, tu dois produire :

1. **skills** : la liste des INDEX des expériences du CV (champ "index" dans les expériences) les plus pertinentes à mettre en avant pour CETTE offre. Choisis au maximum {max_experiences} expériences.

2. **cover_letter** : une lettre de motivation en FRANÇAIS, professionnelle mais naturelle, personnalisée pour cette offre.
   - Sers-toi de la description de l'offre et des expériences/compétences du candidat pour montrer pourquoi il correspond au poste
   - Mentionne l'entreprise et le poste par leur nom
   - Environ 250-350 mots
   - Utilise \n pour les sauts de ligne
   - PAS d'en-tête (ni date, ni adresse), uniquement le corps de la lettre
   - Commence par "{opening}" et termine par la formule de politesse suivante : "{closing}"

Réponds UNIQUEMENT avec un JSON valide au format suivant :
{{
  "match": [
    {{
      "name": "nom exact de l'offre",
      "URL": "URL de l'offre",
      "company": "nom de l'entreprise",
      "location": "localisation",
      "score": 85,
      "skills": [1, 2, 4, 6],
      "cover_letter": "{opening}\n\n...\n\n{closing}"
    }}
  ]
}}

Ne rajoute AUCUN texte en dehors du JSON.
"#,
            intent = intent.trim(),
            name = info.name,
            email = info.email,
            phone = info.phone,
            intro_lines = intro_lines,
            count = candidates.len(),
            max_experiences = MAX_MATCH_EXPERIENCES,
            opening = COVER_LETTER_OPENING,
            closing = COVER_LETTER_CLOSING,
        )
    }

    pub fn exceeds_context(&self, prompt: &str) -> bool {
        estimate_tokens(prompt) > self.context_warning_tokens
    }
}

/// Re-join scored entries with their listings by exact name. Entries
/// without a listing are left out.
pub fn join_candidates<'a>(
    top_scored: &[ScoreEntry],
    listings: &'a [Listing],
) -> Vec<MatchCandidate<'a>> {
    top_scored
        .iter()
        .filter_map(|scored| match find_by_name(listings, &scored.name) {
            Some(listing) => Some(MatchCandidate {
                name: &listing.name,
                url: &listing.url,
                company: &listing.company,
                location: &listing.location,
                content: &listing.content,
                score: scored.score,
            }),
            None => {
                debug!("No listing named '{}', dropping it from the match set", scored.name);
                None
            }
        })
        .collect()
}

pub fn estimate_tokens(prompt: &str) -> usize {
    prompt.chars().count() / CHARS_PER_TOKEN
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    // Plain data with string keys cannot fail to serialize.
    serde_json::to_string_pretty(value).unwrap_or_default()
}
