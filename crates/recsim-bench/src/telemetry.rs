use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const EPISODE_TARGET: &str = "recsim_bench::episode";
const CORE_EPISODE_TARGET: &str = "recsim_core::episode";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub episodes: EpisodeTelemetrySummary,
    pub budget: BudgetTelemetrySummary,
    pub belief: BeliefTelemetrySummary,
}

/// Per-episode rows emitted by the batch runner.
#[derive(Debug, Default, Serialize)]
pub struct EpisodeTelemetrySummary {
    pub count: usize,
    pub avg_reward: Option<f64>,
    pub avg_rounds: Option<f64>,
    pub termination_counts: BTreeMap<String, usize>,
}

/// Budget overruns reported by the simulator.
#[derive(Debug, Default, Serialize)]
pub struct BudgetTelemetrySummary {
    pub count: usize,
    pub max_elapsed_ms: Option<f64>,
    pub phase_counts: BTreeMap<String, usize>,
}

/// Round-level belief snapshots (only present at trace level).
#[derive(Debug, Default, Serialize)]
pub struct BeliefTelemetrySummary {
    pub rounds: usize,
    pub avg_entropy: Option<f64>,
    pub avg_max_probability: Option<f64>,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregate episode, budget and belief events from a structured log.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = TelemetrySummary::default();
    let mut reward_avg = Average::new();
    let mut rounds_avg = Average::new();
    let mut entropy_avg = Average::new();
    let mut max_prob_avg = Average::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let level = payload
            .get("level")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match (target, level) {
            (EPISODE_TARGET, _) => {
                let episodes = &mut summary.episodes;
                episodes.count += 1;
                if let Some(reward) = fields.get("reward").and_then(Value::as_f64) {
                    reward_avg.add(reward);
                }
                if let Some(rounds) = fields.get("rounds").and_then(Value::as_f64) {
                    rounds_avg.add(rounds);
                }
                *episodes
                    .termination_counts
                    .entry(label(&fields, "termination"))
                    .or_insert(0) += 1;
            }
            (CORE_EPISODE_TARGET, "WARN") => {
                let budget = &mut summary.budget;
                budget.count += 1;
                if let Some(elapsed) = fields.get("elapsed_ms").and_then(Value::as_f64) {
                    budget.max_elapsed_ms =
                        Some(budget.max_elapsed_ms.map_or(elapsed, |m| m.max(elapsed)));
                }
                *budget
                    .phase_counts
                    .entry(label(&fields, "phase"))
                    .or_insert(0) += 1;
            }
            (CORE_EPISODE_TARGET, "TRACE") => {
                summary.belief.rounds += 1;
                if let Some(entropy) = fields.get("entropy").and_then(Value::as_f64) {
                    entropy_avg.add(entropy);
                }
                if let Some(p) = fields.get("max_probability").and_then(Value::as_f64) {
                    max_prob_avg.add(p);
                }
            }
            _ => {}
        }
    }

    summary.episodes.avg_reward = reward_avg.mean();
    summary.episodes.avg_rounds = rounds_avg.mean();
    summary.belief.avg_entropy = entropy_avg.mean();
    summary.belief.avg_max_probability = max_prob_avg.mean();

    Ok(summary)
}

fn label(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("<unset>")
        .to_string()
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(
        &json_path,
        serde_json::to_vec_pretty(&summary).map_err(TelemetryError::from)?,
    )
    .map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary json",
        source,
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

/// Summarise a finished telemetry log into its own directory and append the
/// highlights to the run's summary table. Call only after the log writer has
/// been flushed.
pub fn summarise_run(
    telemetry_path: &Path,
    summary_md: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    let output_dir = telemetry_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let outputs = write_summary_outputs(telemetry_path, output_dir)?;
    if let Some(outputs) = outputs.as_ref() {
        append_highlights_to_markdown(summary_md, outputs)?;
    }
    Ok(outputs)
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    let episodes = &outputs.summary.episodes;
    section.push_str(&format!("- Episode events captured: {}\n", episodes.count));
    for (label, count) in &episodes.termination_counts {
        section.push_str(&format!("  - {label}: {count}\n"));
    }

    let budget = &outputs.summary.budget;
    section.push_str(&format!("- Budget overruns: {}\n", budget.count));
    if let Some(value) = budget.max_elapsed_ms {
        section.push_str(&format!("- Slowest overrun: {value:.2} ms\n"));
    }

    let belief = &outputs.summary.belief;
    if let Some(value) = belief.avg_entropy {
        section.push_str(&format!("- Avg posterior entropy: {value:.3} nats\n"));
    }

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    output.push('\n');

    output.push_str("## Episodes\n");
    output.push_str(&format!("- Events: {}\n", summary.episodes.count));
    if let Some(value) = summary.episodes.avg_reward {
        output.push_str(&format!("- Avg reward: {value:.3}\n"));
    }
    if let Some(value) = summary.episodes.avg_rounds {
        output.push_str(&format!("- Avg rounds: {value:.2}\n"));
    }
    if !summary.episodes.termination_counts.is_empty() {
        output.push_str("- Terminations:\n");
        for (label, count) in &summary.episodes.termination_counts {
            output.push_str(&format!("  - {label}: {count}\n"));
        }
    }
    output.push('\n');

    output.push_str("## Budget Overruns\n");
    if summary.budget.phase_counts.is_empty() {
        output.push_str("- <none>\n");
    } else {
        for (phase, count) in &summary.budget.phase_counts {
            output.push_str(&format!("- {phase}: {count}\n"));
        }
    }
    output.push('\n');

    output.push_str("## Belief\n");
    output.push_str(&format!("- Rounds traced: {}\n", summary.belief.rounds));
    if let Some(value) = summary.belief.avg_entropy {
        output.push_str(&format!("- Avg entropy: {value:.3}\n"));
    }
    if let Some(value) = summary.belief.avg_max_probability {
        output.push_str(&format!("- Avg max probability: {value:.3}\n"));
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}
