//! Play Connections puzzles with LLM solver agents.
//!
//! Reads the API key from the endpoint preset's environment variable
//! (`OPENAI_API_KEY` for `openai`, `GROQ_API_KEY` for `groq`, none for
//! `ollama`).
//!
//! # Examples
//!
//! ```sh
//! # Consensus solver on the built-in sample board
//! connections consensus --model gpt-4o
//!
//! # Groq, cheap consensus checker, games 0-9 of the public archive
//! connections consensus --endpoint groq --model llama-3.3-70b-versatile \
//!   --consensus-model llama-3.1-8b-instant --games archive --end 10
//!
//! # Chain-of-thought baseline against a local Ollama, four games at a time
//! connections cot --endpoint ollama --model llama3.1 \
//!   --games games.json --concurrency 4 --results results/cot.jsonl
//! ```

use std::path::PathBuf;
use std::pin::pin;
use std::process;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tracing::{info, warn};

use connections_agents::api::EndpointPreset;
use connections_agents::config::{SolverConfig, SolverKind};
use connections_agents::game::{
    ArchivedGame, Board, DEFAULT_ARCHIVE_URL, DEFAULT_MAX_STRIKES, load_games, sample_board,
};
use connections_agents::metrics::RunSummary;
use connections_agents::prompt::PromptSet;
use connections_agents::runner::Runner;
use connections_agents::solver::Role;
use connections_agents::solver::consensus::DEFAULT_MAX_ATTEMPTS;
use connections_agents::solver::events::LoggingHandler;
use connections_agents::store::ResultStore;
use connections_agents::{ChatBackend, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, EndpointClient};

/// Play Connections puzzles with LLM solver agents.
#[derive(Parser)]
#[command(name = "connections", version)]
struct Cli {
    /// Solver to run
    #[arg(value_enum, default_value_t = SolverKind::Consensus)]
    solver: SolverKind,

    // ── Models ─────────────────────────────────────────────────
    /// Model for every role without an override
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Model for the proposer (and for single-shot solvers)
    #[arg(long)]
    proposer_model: Option<String>,

    /// Model for the validator
    #[arg(long)]
    validator_model: Option<String>,

    /// Model for the consensus checker
    #[arg(long)]
    consensus_model: Option<String>,

    // ── Endpoint ───────────────────────────────────────────────
    /// Endpoint preset (openai, groq, ollama) or an OpenAI-compatible base URL
    #[arg(long, default_value = "openai")]
    endpoint: String,

    /// Environment variable holding the API key for a custom endpoint
    #[arg(long)]
    api_key_env: Option<String>,

    /// Retries for transient endpoint errors (429, 5xx, timeouts)
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Sampling temperature (default: unset for consensus, 0.7 for single-shot)
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens per model reply
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    // ── Games ──────────────────────────────────────────────────
    /// Games JSON file or URL; `archive` for the public archive.
    /// Default: the built-in sample board
    #[arg(long)]
    games: Option<String>,

    /// First game to play (index into the games file)
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Stop before this game index
    #[arg(long)]
    end: Option<usize>,

    /// Seed for shuffling each board's word order
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Present words in category order instead of shuffling
    #[arg(long)]
    no_shuffle: bool,

    // ── Solver ─────────────────────────────────────────────────
    /// Consensus attempts per guess
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Wrong guesses allowed per game
    #[arg(long, default_value_t = DEFAULT_MAX_STRIKES)]
    max_strikes: u32,

    /// Compare groups locally instead of asking the consensus checker
    #[arg(long)]
    local_consensus: bool,

    /// Directory of `<template>.txt` prompt overrides
    #[arg(long)]
    prompts: Option<PathBuf>,

    // ── Output ─────────────────────────────────────────────────
    /// Append one JSON record per game to this file
    #[arg(long)]
    results: Option<PathBuf>,

    /// Games played in parallel, each with its own solver
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

impl Cli {
    fn solver_config(&self) -> Result<SolverConfig, String> {
        let prompts = match &self.prompts {
            Some(dir) => PromptSet::builtin().with_overrides_from(dir)?,
            None => PromptSet::builtin(),
        };
        Ok(SolverConfig::new(self.model.clone())
            .with_kind(self.solver)
            .with_role_model(Role::Proposer, self.proposer_model.clone())
            .with_role_model(Role::Validator, self.validator_model.clone())
            .with_role_model(Role::ConsensusChecker, self.consensus_model.clone())
            .with_max_attempts(self.max_attempts)
            .with_local_consensus(self.local_consensus)
            .with_max_strikes(self.max_strikes)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_retries(self.retries)
            .with_prompts(prompts))
    }
}

/// Load, slice, and build the boards to play.
async fn prepare_boards(cli: &Cli, config: &SolverConfig) -> Result<Vec<(String, Board)>, String> {
    let games: Vec<(String, Board)> = match cli.games.as_deref() {
        None => vec![("sample".to_string(), sample_board())],
        Some(source) => {
            let source = if source == "archive" {
                DEFAULT_ARCHIVE_URL
            } else {
                source
            };
            let archive = load_games(source).await.map_err(|e| e.to_string())?;
            let end = cli.end.unwrap_or(archive.len()).min(archive.len());
            archive
                .iter()
                .enumerate()
                .take(end)
                .skip(cli.start)
                .filter_map(|(i, game)| to_board(i, game, config))
                .collect()
        }
    };

    Ok(games
        .into_iter()
        .enumerate()
        .map(|(i, (label, board))| {
            if cli.no_shuffle {
                (label, board)
            } else {
                (label, board.shuffled(cli.seed.wrapping_add(i as u64)))
            }
        })
        .collect())
}

fn to_board(index: usize, game: &ArchivedGame, config: &SolverConfig) -> Option<(String, Board)> {
    let label = game.label(index);
    match game.to_board(config.group_size, config.max_strikes) {
        Ok(board) => Some((label, board)),
        Err(e) => {
            warn!("Skipping game {label}: {e}");
            None
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let preset = EndpointPreset::parse(&cli.endpoint).with_api_key_env(cli.api_key_env.clone());
    let client = EndpointClient::from_preset(&preset)?;
    let backend: Arc<dyn ChatBackend> = Arc::new(client);

    let config = cli.solver_config()?;
    let boards = prepare_boards(&cli, &config).await?;
    if boards.is_empty() {
        return Err("no games to play".into());
    }
    let store = cli.results.as_ref().map(ResultStore::open).transpose()?;

    info!(
        "Playing {} game(s) with the {:?} solver on {} via {preset}",
        boards.len(),
        config.kind,
        config.model_label()
    );

    let runner = Runner::new(&config);
    let runner = &runner;
    let handler = &LoggingHandler;
    let mut games = pin!(
        futures::stream::iter(boards)
            .map(|(label, mut board)| {
                let mut solver = config.build_solver(backend.clone());
                async move {
                    runner
                        .play(&label, &mut board, &mut *solver, handler)
                        .await
                }
            })
            .buffer_unordered(cli.concurrency.max(1))
    );

    let mut summary = RunSummary::new();
    while let Some(record) = games.next().await {
        println!("{}: {}", record.game, record.metrics.summary());
        if let Some(store) = &store {
            store.append(&record)?;
        }
        summary.record(&record.metrics);
    }

    println!("{}", summary.summary());
    if let Some(store) = &store {
        info!("Results appended to {}", store.path().display());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
