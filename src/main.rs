//! Job matcher: scores scraped internship listings against a CV with a local LLM

use clap::Parser;
use job_matcher::cli::{self, Cli, Commands, ConfigAction, PromptStage};
use job_matcher::config::Config;
use job_matcher::error::{JobMatcherError, Result};
use job_matcher::input::InputManager;
use job_matcher::llm::prompts::estimate_tokens;
use job_matcher::llm::{GenerationClient, LogProgress, PromptBuilder};
use job_matcher::output::artifacts::read_scoring;
use job_matcher::output::formatter::ConsoleFormatter;
use job_matcher::output::spinner::SpinnerProgress;
use job_matcher::processing::ranking::{rank, top_k, TOP_K};
use job_matcher::processing::{Pipeline, RunInputs};
use log::{error, info};
use std::path::Path;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Load configuration
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Execute command
    if let Err(e) = run_command(cli.command, config, cli.config.as_deref()).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, mut config: Config, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Run {
            run_dir,
            profile,
            intent_file,
            model,
            stream,
            no_color,
        } => {
            cli::validate_run_dir(&run_dir).map_err(JobMatcherError::InvalidInput)?;

            // Apply per-run overrides
            if let Some(model) = model {
                config.generation.model = model;
            }
            if stream {
                config.generation.stream = true;
            }
            let inputs = RunInputs {
                profile_path: profile.unwrap_or_else(|| config.paths.profile.clone()),
                intent: cli::resolve_intent(intent_file.as_deref(), &config.candidate.intent)?,
                run_dir,
            };

            println!("🚀 Internship matching");
            println!("📂 Run directory: {}", inputs.run_dir.display());
            println!("👤 Profile: {}", inputs.profile_path.display());
            println!(
                "🤖 Model: {} ({})",
                config.generation.model,
                if config.generation.stream { "streaming" } else { "blocking" }
            );

            // Run both stages with the spinner fed by progress events
            let spinner = Arc::new(SpinnerProgress::new());
            let client = GenerationClient::new(config.generation.clone())?.with_observer(spinner.clone());
            let pipeline = Pipeline::new(config, client);

            let outcome = pipeline.run(&inputs).await;
            spinner.finish();
            let summary = outcome?;

            // Display results
            let formatter = ConsoleFormatter::new(!no_color);
            print!("{}", formatter.format_summary(&summary));
            println!("\n✅ Analysis complete!");
        }

        Commands::Prompt {
            stage,
            run_dir,
            profile,
            intent_file,
        } => {
            cli::validate_run_dir(&run_dir).map_err(JobMatcherError::InvalidInput)?;

            let profile_path = profile.unwrap_or_else(|| config.paths.profile.clone());
            let intent = cli::resolve_intent(intent_file.as_deref(), &config.candidate.intent)?;
            let profile = InputManager::load_profile(&profile_path).await?;
            let listings = InputManager::load_listings(&config.listings_path(&run_dir)).await?;
            let builder = PromptBuilder::new(config.pipeline.context_warning_tokens);

            // Build the prompt exactly as a run would
            let prompt = match stage {
                PromptStage::Scoring => builder.build_scoring_prompt(&profile, &listings, &intent),
                PromptStage::Match => {
                    // The match prompt needs the saved ranking
                    let scoring = read_scoring(&config.scoring_path(&run_dir))?;
                    let ranked = rank(scoring.scoring);
                    builder.build_match_prompt(&profile, top_k(&ranked, TOP_K), &listings, &intent)
                }
            };

            println!("{}", prompt);
            eprintln!(
                "\n📊 {} chars, ~{} tokens{}",
                prompt.chars().count(),
                estimate_tokens(&prompt),
                if builder.exceeds_context(&prompt) {
                    " (exceeds the context warning threshold)"
                } else {
                    ""
                }
            );
        }

        Commands::Ping { generate } => {
            println!("🔌 Checking {}", config.generation.base_url);
            let client = GenerationClient::new(config.generation.clone())?.with_observer(Arc::new(LogProgress));
            let models = client.list_models().await?;
            println!("✅ Server reachable, {} models available:", models.len());
            for name in &models {
                let marker = if *name == config.generation.model { " ←" } else { "" };
                println!("  • {}{}", name, marker);
            }
            if !models.contains(&config.generation.model) {
                println!(
                    "⚠️  Configured model '{}' is not installed (ollama pull {})",
                    config.generation.model, config.generation.model
                );
            }

            // Optional round trip through the configured model
            if generate {
                info!("Sending a test prompt to {}", config.generation.model);
                let reply = client.generate_text("Réponds uniquement par OK.", 0.0).await?;
                println!("💬 {}", reply.trim());
            }
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                println!("⚙️  Current Configuration\n");
                let g = &config.generation;
                println!("Server: {}", g.base_url);
                println!("Model: {}", g.model);
                println!("Context window: {} tokens, max output: {} tokens", g.num_ctx, g.num_predict);
                println!("Timeout: {}s, attempts: {}", g.timeout_secs, g.max_retries);
                println!("Streaming: {}", g.stream);
                println!("\nTemperatures:");
                println!("  Scoring: {:.1}", config.pipeline.scoring_temperature);
                println!("  Match: {:.1}", config.pipeline.match_temperature);
                println!("\nProfile: {}", config.paths.profile.display());
            }

            Some(ConfigAction::Reset) => {
                println!("🔄 Resetting configuration to defaults...");
                let defaults = Config::default();
                match config_path {
                    Some(path) => defaults.save_to(path)?,
                    None => defaults.save()?,
                }
                println!("✅ Configuration reset successfully!");
            }

            Some(ConfigAction::Path) => {
                let path = config_path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}
