use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use pimc_bench::config::BenchmarkConfig;
use pimc_bench::logging::init_logging;
use pimc_bench::runner::MatchRunner;

/// Benchmark harness for the determinized Monte Carlo player.
#[derive(Debug, Parser)]
#[command(
    name = "pimc-bench",
    author,
    version,
    about = "Deterministic match harness for PIMC agents"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of matches to play.
    #[arg(long, value_name = "COUNT")]
    matches: Option<usize>,

    /// Override the seed that derives every match seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the rollouts per option of every PIMC agent.
    #[arg(long, value_name = "N")]
    rollouts: Option<usize>,

    /// Exit after validating the configuration.
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchmarkConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }
    if let Some(matches) = cli.matches {
        config.matches.count = matches;
    }
    if let Some(seed) = cli.seed {
        config.matches.seed = Some(seed);
    }
    if let Some(rollouts) = cli.rollouts {
        config.override_rollouts(rollouts);
    }
    config.validate()?;

    let outputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let agent_count = config.agents.len();
    println!(
        "Loaded configuration '{run_id}' with {agent_count} agent{} ({} matches, {} rotations)",
        if agent_count == 1 { "" } else { "s" },
        config.matches.count,
        config.matches.rotations
    );

    let logging = config.logging.clone();
    let runner = MatchRunner::new(config, outputs.clone())?;
    if cli.validate_only {
        println!("Validation-only mode: no matches played.");
        return Ok(());
    }

    let _logging_guard = init_logging(&logging, &outputs)?;
    let summary = runner.run()?;

    println!(
        "Run '{run_id}' complete: {} matches x {} rotations -> {} rows at {}",
        summary.matches_played,
        summary.rotations,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    for seat in &summary.branching {
        println!(
            "  {}: {} decisions, mean branching {:.2}, max {}",
            seat.seat, seat.decisions, seat.mean, seat.max
        );
    }
    if let Some(path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", path.display());
    }
    if let Some(outputs) = summary.telemetry_outputs.as_ref() {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        let heuristics = &outputs.summary.heuristics;
        match heuristics.avg_leader_utility {
            Some(lead) => println!(
                "  Heuristics: {} samples, avg leader utility {lead:.3}",
                heuristics.count
            ),
            None => println!("  Heuristics: {} samples captured", heuristics.count),
        }
    }

    Ok(())
}
