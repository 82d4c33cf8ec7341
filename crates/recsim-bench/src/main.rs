use std::path::PathBuf;

use clap::Parser;

use recsim_bench::batch::BatchRunner;
use recsim_bench::config::{BenchmarkConfig, ResolvedOutputs};
use recsim_bench::logging::init_logging;
use recsim_bench::telemetry::summarise_run;
use recsim_core::AppInfo;

/// Batch evaluation harness for the greedy belief recommender.
#[derive(Debug, Parser)]
#[command(
    name = "recsim-bench",
    author,
    version,
    about = "Deterministic recommender episode harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of episodes per instance.
    #[arg(long, value_name = "EPISODES")]
    episodes: Option<usize>,

    /// Override the master RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Exit after validating the configuration (no episodes are played).
    #[arg(long)]
    validate_only: bool,

    /// Emit one structured event per episode regardless of config.
    #[arg(long)]
    log_episode_details: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchmarkConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(episodes) = cli.episodes {
        config.trials.episodes = episodes;
    }

    if let Some(seed) = cli.seed {
        config.trials.seed = Some(seed);
    }

    if cli.log_episode_details {
        config.logging.episode_details = true;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let instance_count = config.instances.len();
    let run_id = config.run_id.clone();
    let episodes = config.trials.episodes;

    println!(
        "{} ({}) loaded configuration '{run_id}' with {instance_count} instance{} ({episodes} episodes each)",
        AppInfo::name(),
        AppInfo::codename(),
        if instance_count == 1 { "" } else { "s" }
    );

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = BatchRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: episode execution skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    for report in &summary.analytics.instances {
        println!("{} is {}", report.name, report.mean_reward);
    }
    println!(
        "Run complete for '{run_id}': {} episodes per instance → {} rows at {}",
        summary.episodes_per_instance,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(plot_path) = summary.plot_path.as_ref() {
        println!("Mean reward plot: {}", plot_path.display());
    }

    let Some(guard) = logging_guard else {
        return Ok(());
    };
    let telemetry_path = guard.finish();
    println!("Telemetry log: {}", telemetry_path.display());
    if let Some(outputs) = summarise_run(&telemetry_path, &summary.summary_path)? {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        if outputs.summary.budget.count > 0 {
            println!(
                "  Budget overruns: {} ({:?})",
                outputs.summary.budget.count, outputs.summary.budget.phase_counts
            );
        }
    }

    Ok(())
}
