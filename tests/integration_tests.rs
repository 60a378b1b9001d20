//! Integration tests for the job matcher pipeline

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use job_matcher::config::Config;
use job_matcher::error::JobMatcherError;
use job_matcher::llm::client::{GenerationClient, GenerationError};
use job_matcher::llm::transport::{ByteStream, GenerateRequest, Transport};
use job_matcher::output::artifacts::{read_scoring, MatchArtifact};
use job_matcher::processing::{Pipeline, RunInputs, Stage};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const PROFILE: &str = r#"{
    "Perso": [{
        "nom": "Camille Durand",
        "mail": "camille@example.com",
        "numero": "06 00 00 00 00",
        "phrase_intro": {"data": "Passionnée par la donnée."}
    }],
    "experiences": [
        {"index": 1, "name": "Stage Arrow", "period": "2024", "categorization": "experiences_pro",
         "skills": ["Excel", "SAP"], "description": "Planification des approvisionnements"},
        {"index": 2, "name": "Projet ML", "period": "2023", "categorization": "projets_perso",
         "skills": ["Python"]}
    ],
    "skills": [{"data": {"t_prio": ["Python"], "prio": ["SQL"], "bonus": []}}]
}"#;

#[derive(Default)]
struct Shared {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

/// Answers each generate call with the next scripted model output.
#[derive(Clone, Default)]
struct FakeServer(Arc<Shared>);

impl FakeServer {
    fn with_replies(replies: &[&str]) -> Self {
        let server = Self::default();
        server
            .0
            .replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| r.to_string()));
        server
    }

    fn prompts(&self) -> Vec<String> {
        self.0.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn post_generate(&self, request: &GenerateRequest) -> Result<ByteStream, GenerationError> {
        self.0.prompts.lock().unwrap().push(request.prompt.clone());
        let reply = self
            .0
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GenerationError::Other("no scripted reply left".to_string()))?;
        let body = serde_json::json!({"response": reply, "done": true}).to_string();
        Ok(futures::stream::iter(vec![Ok(Bytes::from(body))]).boxed())
    }
}

fn listing(name: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "URL": format!("https://jobs.example.com/{}", name),
        "name": name,
        "company": format!("{} Corp", name),
        "location": "Paris",
        "content": content,
    })
}

fn setup(listings: &[serde_json::Value]) -> (TempDir, RunInputs) {
    let dir = TempDir::new().unwrap();
    let profile_path = dir.path().join("cv.json");
    std::fs::write(&profile_path, PROFILE).unwrap();

    let run_dir = dir.path().join("data[2026-06-01]");
    std::fs::create_dir(&run_dir).unwrap();
    std::fs::write(
        run_dir.join("internships.json"),
        serde_json::to_string(listings).unwrap(),
    )
    .unwrap();

    let inputs = RunInputs {
        profile_path,
        run_dir,
        intent: "Stage de fin d'études en data.".to_string(),
    };
    (dir, inputs)
}

fn pipeline(server: &FakeServer) -> Pipeline<FakeServer> {
    pipeline_with(server, Config::default())
}

fn pipeline_with(server: &FakeServer, config: Config) -> Pipeline<FakeServer> {
    let client = GenerationClient::with_transport(server.clone(), config.generation.clone());
    Pipeline::new(config, client)
}

#[tokio::test]
async fn test_full_run_ranks_and_matches() {
    let long_content = "Analyse de la demande. ".repeat(80);
    let (_dir, inputs) = setup(&[
        listing("A", &long_content),
        listing("B", "Supply chain"),
        listing("C", "Finance"),
    ]);
    let server = FakeServer::with_replies(&[
        r#"{"scoring": [{"name": "A", "score": 90}, {"name": "C", "score": 40}, {"name": "B", "score": 90}]}"#,
        "Voici la réponse :\n```json\n{\"match\": [{\"name\": \"A\", \"score\": 90, \"skills\": [1, 7, 2], \"cover_letter\": \"Madame, Monsieur,\\nJe candidate.\"}]}\n```",
    ]);

    let summary = pipeline(&server).run(&inputs).await.unwrap();

    let names: Vec<&str> = summary.ranked.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    assert_eq!(summary.top.len(), 3);
    assert!(summary.dropped.is_empty());

    let prompts = server.prompts();
    assert_eq!(prompts.len(), 2);
    // The scoring prompt truncates listing content, the match prompt does not.
    assert!(!prompts[0].contains(long_content.trim_end()));
    assert!(prompts[1].contains(long_content.trim_end()));

    let scoring = read_scoring(&summary.scoring_path).unwrap();
    assert_eq!(scoring.scoring[0].name, "A");
    assert!(std::fs::read_to_string(&summary.scoring_path)
        .unwrap()
        .contains("\n    \"scoring\""));

    let written: MatchArtifact =
        serde_json::from_str(&std::fs::read_to_string(&summary.match_path).unwrap()).unwrap();
    assert_eq!(written.matches.len(), 1);
    let entry = &written.matches[0];
    assert_eq!(entry.skills, vec![1, 2]);
    assert_eq!(entry.url, "https://jobs.example.com/A");
    assert_eq!(entry.company, "A Corp");
    assert!(entry.cover_letter.starts_with("Madame, Monsieur,"));
}

#[tokio::test]
async fn test_missing_profile_makes_no_generation_call() {
    let (_dir, mut inputs) = setup(&[listing("A", "x")]);
    inputs.profile_path = inputs.run_dir.join("absent.json");
    let server = FakeServer::with_replies(&["{}"]);

    let err = pipeline(&server).run(&inputs).await.unwrap_err();

    assert!(matches!(err, JobMatcherError::InputMissing { .. }));
    assert!(server.prompts().is_empty());
    assert!(!inputs.run_dir.join("scoring.json").exists());
}

#[tokio::test]
async fn test_missing_listings_makes_no_generation_call() {
    let (_dir, inputs) = setup(&[]);
    std::fs::remove_file(inputs.run_dir.join("internships.json")).unwrap();
    let server = FakeServer::with_replies(&["{}"]);

    let err = pipeline(&server).run(&inputs).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::LoadInputs));
    assert!(server.prompts().is_empty());
}

#[tokio::test]
async fn test_match_recovery_failure_keeps_scoring_artifact() {
    let (_dir, inputs) = setup(&[listing("A", "x"), listing("B", "y")]);
    let server = FakeServer::with_replies(&[
        r#"{"scoring": [{"name": "B", "score": 70}, {"name": "A", "score": 20}]}"#,
        "Je ne peux pas répondre à cette demande.",
    ]);

    let err = pipeline(&server).run(&inputs).await.unwrap_err();

    match err {
        JobMatcherError::Recovery { stage, source } => {
            assert_eq!(stage, Stage::RecoverMatch);
            assert!(source.preview.contains("Je ne peux pas"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let scoring = read_scoring(&inputs.run_dir.join("scoring.json")).unwrap();
    assert_eq!(scoring.scoring[0].name, "B");
    assert!(!inputs.run_dir.join("match.json").exists());
}

#[tokio::test]
async fn test_unparseable_scoring_reply_aborts_before_any_artifact() {
    let (_dir, inputs) = setup(&[listing("A", "x")]);
    let server = FakeServer::with_replies(&["Désolé, je ne sais pas noter ces offres."]);

    let err = pipeline(&server).run(&inputs).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::RecoverScoring));
    assert_eq!(server.prompts().len(), 1);
    assert!(!inputs.run_dir.join("scoring.json").exists());
    assert!(!inputs.run_dir.join("match.json").exists());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_scoring_generation_names_its_stage() {
    let (_dir, inputs) = setup(&[listing("A", "x")]);
    // No scripted reply: every call fails.
    let server = FakeServer::default();
    let mut config = Config::default();
    config.generation.max_retries = 2;

    let err = pipeline_with(&server, config).run(&inputs).await.unwrap_err();

    match &err {
        JobMatcherError::Generation { stage, source } => {
            assert_eq!(*stage, Stage::GenerateScoring);
            assert!(matches!(source, GenerationError::Other(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.prompts().len(), 2);
    assert!(!inputs.run_dir.join("scoring.json").exists());
    assert!(!inputs.run_dir.join("match.json").exists());
}

#[tokio::test]
async fn test_malformed_entries_do_not_abort_the_run() {
    let (_dir, inputs) = setup(&[listing("A", "x"), listing("B", "y")]);
    let server = FakeServer::with_replies(&[
        r#"{"scoring": [{"name": "A", "score": 90}, {"score": 40}, {"name": "B", "score": 30}]}"#,
        r#"{"match": [{"name": "A", "score": 90, "skills": [1, -1], "cover_letter": "Madame, Monsieur,"}]}"#,
    ]);

    let summary = pipeline(&server).run(&inputs).await.unwrap();

    let names: Vec<&str> = summary.ranked.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
    assert_eq!(summary.matches[0].skills, vec![1]);
    assert!(summary.match_path.exists());
}

#[tokio::test]
async fn test_unknown_scored_names_are_dropped_from_match_stage() {
    let (_dir, inputs) = setup(&[listing("A", "x")]);
    let server = FakeServer::with_replies(&[
        r#"{"scoring": [{"name": "Fantôme", "score": 95}, {"name": "A", "score": 60}]}"#,
        r#"{"match": [{"name": "A", "score": 60, "skills": [2], "cover_letter": "Madame, Monsieur,"}]}"#,
    ]);

    let summary = pipeline(&server).run(&inputs).await.unwrap();

    assert_eq!(summary.dropped, vec!["Fantôme".to_string()]);
    let prompts = server.prompts();
    assert!(prompts[1].contains("TOP 1 OFFRES"));
    assert!(!prompts[1].contains("Fantôme"));
    assert_eq!(summary.matches.len(), 1);
}

#[tokio::test]
async fn test_no_joinable_offer_skips_match_generation() {
    let (_dir, inputs) = setup(&[listing("A", "x")]);
    let server = FakeServer::with_replies(&[r#"[{"name": "Ailleurs", "score": 80}]"#]);

    let summary = pipeline(&server).run(&inputs).await.unwrap();

    assert_eq!(server.prompts().len(), 1);
    assert!(summary.matches.is_empty());
    let written = std::fs::read_to_string(&summary.match_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value, serde_json::json!({"match": []}));
}

#[test]
fn test_config_round_trip_in_custom_location() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::load_from(&path).unwrap();
    assert!(Path::new(&path).exists());

    config.generation.model = "mistral:7b".to_string();
    config.save_to(&path).unwrap();
    let reloaded = Config::load_from(&path).unwrap();
    assert_eq!(reloaded.generation.model, "mistral:7b");
    assert_eq!(reloaded.paths.listings_file, "internships.json");
}
