//! Play the built-in sample board with the consensus solver.
//!
//! Logs every proposal, validation, and verdict, then prints the game's
//! metrics and token usage.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --example sample_game
//! ```

use std::sync::Arc;

use connections_agents::prelude::*;

#[tokio::main]
async fn main() -> Result<(), String> {
    // 1. Create the endpoint client.
    let client = EndpointClient::from_preset(&EndpointPreset::parse("openai"))?;

    // 2. Configure the solver: a cheaper model checks consensus.
    let config = SolverConfig::new("gpt-4o")
        .with_role_model(Role::ConsensusChecker, Some("gpt-4o-mini".into()))
        .with_max_attempts(10)
        .with_retries(2);
    let mut solver = config.build_solver(Arc::new(client));

    // 3. Play one game.
    let mut board = sample_board().shuffled(7);
    let record = Runner::new(&config)
        .play("sample", &mut board, &mut *solver, &LoggingHandler)
        .await;

    // 4. Print results.
    println!("\n{:?}: {}", record.end, record.metrics.summary());
    println!("{}", record.metrics.tokens.summary());

    Ok(())
}
