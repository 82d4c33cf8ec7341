mod schedule;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use recsim_core::episode::Termination;
use recsim_core::{EpisodeOutcome, EpisodeSimulator, ProblemInstance, RecommenderError};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError, AnalyticsSummary};
use crate::config::{BenchmarkConfig, ResolvedOutputs, ValidationError};
use crate::telemetry::EPISODE_TARGET;

pub use schedule::{ScheduledEpisode, TrialSchedule};

/// Primary entry point for batch evaluation of the recommender.
pub struct BatchRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    instances: Vec<ProblemInstance>,
    simulator: EpisodeSimulator,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub episodes_per_instance: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_path: Option<PathBuf>,
    pub analytics: AnalyticsSummary,
}

impl BatchRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let instances = config
            .instances
            .iter()
            .map(|instance| instance.build())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            outputs,
            instances,
            simulator: EpisodeSimulator::default(),
        })
    }

    /// Execute every scheduled episode, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        if !self.outputs.plots_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.outputs.plots_dir)?;
        }

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let schedule = TrialSchedule::new(
            self.config.trials.seed.unwrap_or(0),
            self.config.trials.episodes,
            self.instances.len(),
        );
        let mut rows_written = 0usize;
        let mut analytics = AnalyticsCollector::new(&self.config)?;

        event!(
            target: "recsim_bench::run",
            Level::INFO,
            run_id = %self.config.run_id,
            instances = self.instances.len(),
            episodes = self.config.trials.episodes,
            "batch run started"
        );

        for slot in schedule {
            let outcome = self.play_episode(slot)?;
            analytics.record_episode(slot.instance, &outcome)?;
            write_episode_row(&mut writer, &self.config, slot, &outcome)?;
            rows_written += 1;
        }

        writer.flush()?;

        let summary = analytics.finalize();
        summary.write_markdown(&self.outputs.summary_md)?;
        let plot_path = match summary.render_plot(&self.outputs.plots_dir) {
            Ok(path) => Some(path),
            Err(err) => {
                eprintln!("WARN: {}", err);
                None
            }
        };

        event!(
            target: "recsim_bench::run",
            Level::INFO,
            run_id = %self.config.run_id,
            rows_written,
            "batch run finished"
        );

        Ok(RunSummary {
            episodes_per_instance: self.config.trials.episodes,
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            plot_path,
            analytics: summary,
        })
    }

    fn play_episode(&self, slot: ScheduledEpisode) -> Result<EpisodeOutcome, RunnerError> {
        let instance = self
            .instances
            .get(slot.instance)
            .ok_or(RunnerError::MissingInstance { index: slot.instance })?;
        let mut rng = StdRng::seed_from_u64(slot.seed);
        let outcome = self
            .simulator
            .run(instance, &mut rng)
            .map_err(|source| RunnerError::Episode {
                instance: self.instance_name(slot.instance).to_string(),
                trial: slot.trial,
                source,
            })?;

        if self.config.logging.episode_details && tracing::enabled!(Level::INFO) {
            event!(
                target: EPISODE_TARGET,
                Level::INFO,
                run_id = %self.config.run_id,
                instance = self.instance_name(slot.instance),
                trial = slot.trial as u64,
                seed = slot.seed,
                user_type = outcome.user_type as u64,
                reward = outcome.reward(),
                rounds = outcome.rounds,
                termination = outcome.termination.label(),
                elapsed_ms = decision_ms(&outcome)
            );
        }

        Ok(outcome)
    }

    fn instance_name(&self, index: usize) -> &str {
        self.config
            .instances
            .get(index)
            .map(|instance| instance.name.as_str())
            .unwrap_or("<unknown>")
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn decision_ms(outcome: &EpisodeOutcome) -> f64 {
    (outcome.init_elapsed + outcome.decision_time()).as_secs_f64() * 1000.0
}

fn write_episode_row(
    writer: &mut BufWriter<File>,
    config: &BenchmarkConfig,
    slot: ScheduledEpisode,
    outcome: &EpisodeOutcome,
) -> Result<(), RunnerError> {
    let instance = config
        .instances
        .get(slot.instance)
        .ok_or(RunnerError::MissingInstance { index: slot.instance })?;

    let user_left_round = match outcome.termination {
        Termination::UserLeft { round } => Some(round),
        _ => None,
    };

    let row = EpisodeLogRow {
        run_id: &config.run_id,
        instance: &instance.name,
        trial: slot.trial,
        seed: slot.seed,
        user_type: outcome.user_type,
        reward: outcome.reward(),
        likes: outcome.likes,
        rounds: outcome.rounds,
        termination: outcome.termination.label(),
        user_left_round,
        elapsed_ms: decision_ms(outcome),
    };

    serde_json::to_writer(&mut *writer, &row)?;
    writer.write_all(b"\n")?;
    Ok(())
}

#[derive(Serialize)]
struct EpisodeLogRow<'a> {
    run_id: &'a str,
    instance: &'a str,
    trial: usize,
    seed: u64,
    user_type: usize,
    reward: u32,
    likes: u32,
    rounds: u32,
    termination: &'static str,
    user_left_round: Option<u32>,
    elapsed_ms: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid instance: {0}")]
    Instance(#[from] ValidationError),
    #[error("episode {trial} of instance '{instance}' failed: {source}")]
    Episode {
        instance: String,
        trial: usize,
        #[source]
        source: RecommenderError,
    },
    #[error("scheduled episode references missing instance index {index}")]
    MissingInstance { index: usize },
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}
