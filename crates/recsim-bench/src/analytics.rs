use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use recsim_core::episode::Termination;
use recsim_core::EpisodeOutcome;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::BenchmarkConfig;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("episode recorded for unknown instance index {0}")]
    UnknownInstance(usize),
    #[error("invalid confidence level {0}")]
    ConfidenceLevel(f64),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

/// Collects per-instance episode statistics during a batch run.
pub struct AnalyticsCollector {
    instances: Vec<InstanceAccumulator>,
    confidence_level: f64,
    z: f64,
}

impl AnalyticsCollector {
    pub fn new(config: &BenchmarkConfig) -> Result<Self, AnalyticsError> {
        let confidence_level = config.metrics.confidence_level;
        let z = two_sided_z(confidence_level)?;
        let instances = config
            .instances
            .iter()
            .map(|instance| InstanceAccumulator::new(instance.name.clone()))
            .collect();

        Ok(Self {
            instances,
            confidence_level,
            z,
        })
    }

    pub fn record_episode(
        &mut self,
        instance: usize,
        outcome: &EpisodeOutcome,
    ) -> Result<(), AnalyticsError> {
        let acc = self
            .instances
            .get_mut(instance)
            .ok_or(AnalyticsError::UnknownInstance(instance))?;
        acc.record(outcome);
        Ok(())
    }

    pub fn finalize(self) -> AnalyticsSummary {
        let z = self.z;
        AnalyticsSummary {
            confidence_level: self.confidence_level,
            instances: self
                .instances
                .into_iter()
                .map(|acc| acc.into_report(z))
                .collect(),
        }
    }
}

struct InstanceAccumulator {
    name: String,
    rewards: Vec<f64>,
    min_reward: u32,
    max_reward: u32,
    horizon_reached: u32,
    user_left: u32,
    budget_exceeded: u32,
    total_rounds: u64,
    total_decision_ms: f64,
    total_decisions: u64,
}

impl InstanceAccumulator {
    fn new(name: String) -> Self {
        Self {
            name,
            rewards: Vec::new(),
            min_reward: u32::MAX,
            max_reward: 0,
            horizon_reached: 0,
            user_left: 0,
            budget_exceeded: 0,
            total_rounds: 0,
            total_decision_ms: 0.0,
            total_decisions: 0,
        }
    }

    fn record(&mut self, outcome: &EpisodeOutcome) {
        let reward = outcome.reward();
        self.rewards.push(f64::from(reward));
        self.min_reward = self.min_reward.min(reward);
        self.max_reward = self.max_reward.max(reward);
        match outcome.termination {
            Termination::HorizonReached => self.horizon_reached += 1,
            Termination::UserLeft { .. } => self.user_left += 1,
            Termination::BudgetExceeded { .. } => self.budget_exceeded += 1,
        }
        self.total_rounds += u64::from(outcome.rounds);
        self.total_decision_ms += outcome.decision_time().as_secs_f64() * 1000.0;
        self.total_decisions += u64::from(outcome.decisions());
    }

    fn into_report(self, z: f64) -> InstanceReport {
        let episodes = self.rewards.len();
        let ratio = |count: u32| {
            if episodes == 0 {
                0.0
            } else {
                f64::from(count) / episodes as f64
            }
        };

        let mean_reward = mean(&self.rewards);
        let ci = confidence_interval(&self.rewards, z);
        let mean_rounds = if episodes == 0 {
            0.0
        } else {
            self.total_rounds as f64 / episodes as f64
        };
        let mean_ms_per_decision = if self.total_decisions == 0 {
            0.0
        } else {
            self.total_decision_ms / self.total_decisions as f64
        };

        InstanceReport {
            name: self.name,
            episodes,
            mean_reward,
            ci,
            min_reward: if episodes == 0 { 0 } else { self.min_reward },
            max_reward: self.max_reward,
            completion_rate: ratio(self.horizon_reached),
            leave_rate: ratio(self.user_left),
            budget_exceeded: self.budget_exceeded,
            mean_rounds,
            mean_ms_per_decision,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub name: String,
    pub episodes: usize,
    pub mean_reward: f64,
    pub ci: (f64, f64),
    pub min_reward: u32,
    pub max_reward: u32,
    /// Share of episodes that played the full horizon.
    pub completion_rate: f64,
    /// Share of episodes the user left early.
    pub leave_rate: f64,
    pub budget_exceeded: u32,
    pub mean_rounds: f64,
    pub mean_ms_per_decision: f64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub confidence_level: f64,
    pub instances: Vec<InstanceReport>,
}

impl AnalyticsSummary {
    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let level = self.confidence_level * 100.0;
        let mut rows = String::new();
        rows.push_str("# Recommender Summary\n\n");
        rows.push_str(&format!(
            "Reward is the number of liked recommendations per episode; intervals are {level:.0}% normal approximations.\n\n"
        ));
        rows.push_str(&format!(
            "| Instance | Episodes | Mean reward | {level:.0}% CI | Min | Max | Completed % | Left % | Over budget | Mean rounds | Avg ms/decision |\n"
        ));
        rows.push_str("|----------|----------|-------------|--------|-----|-----|-------------|--------|-------------|-------------|-----------------|\n");

        for report in &self.instances {
            rows.push_str(&format!(
                "| {name} | {episodes} | {mean:.3} | [{ci_low:.3}, {ci_high:.3}] | {min} | {max} | {completed:.1}% | {left:.1}% | {over} | {rounds:.2} | {latency:.4} |\n",
                name = report.name,
                episodes = report.episodes,
                mean = report.mean_reward,
                ci_low = report.ci.0,
                ci_high = report.ci.1,
                min = report.min_reward,
                max = report.max_reward,
                completed = report.completion_rate * 100.0,
                left = report.leave_rate * 100.0,
                over = report.budget_exceeded,
                rounds = report.mean_rounds,
                latency = report.mean_ms_per_decision,
            ));
        }

        fs::write(path.as_ref(), rows).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })?;
        Ok(())
    }

    pub fn render_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
                context: "creating plots directory",
                source: e,
            })?;
        }

        let output_path = dir.join("mean_reward.png");
        draw_reward_bars(&output_path, &self.instances)
            .map_err(|e| AnalyticsError::Plot(e.to_string()))?;
        Ok(output_path)
    }
}

/// Bars with CI whiskers, one slot per instance in config order. Nothing
/// here draws text: plotters is built without a font backend.
fn draw_reward_bars(
    path: &Path,
    reports: &[InstanceReport],
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (800, 480)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = reports
        .iter()
        .map(|r| r.ci.1.max(r.mean_reward))
        .fold(1.0f64, f64::max);
    let slots = reports.len().max(1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(0.0..slots, 0.0..(y_max * 1.1))?;

    chart.draw_series(reports.iter().enumerate().map(|(idx, report)| {
        let color = if report.budget_exceeded > 0 { &RED } else { &BLUE };
        let left = idx as f64 + 0.15;
        Rectangle::new(
            [(left, 0.0), (left + 0.7, report.mean_reward)],
            color.filled(),
        )
    }))?;

    chart.draw_series(reports.iter().enumerate().map(|(idx, report)| {
        let centre = idx as f64 + 0.5;
        PathElement::new(
            vec![(centre, report.ci.0.max(0.0)), (centre, report.ci.1)],
            BLACK.stroke_width(2),
        )
    }))?;

    drop(chart);
    root.present()?;
    Ok(())
}

/// Standard normal quantile for a two-sided interval at `level`.
fn two_sided_z(level: f64) -> Result<f64, AnalyticsError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(AnalyticsError::ConfidenceLevel(level));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|_| AnalyticsError::ConfidenceLevel(level))?;
    Ok(normal.inverse_cdf(0.5 + level / 2.0))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn confidence_interval(values: &[f64], z: f64) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = mean(values);
    if values.len() == 1 {
        return (mean, mean);
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    let std_error = (variance / values.len() as f64).sqrt();
    let margin = z * std_error;
    (mean - margin, mean + margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        InstanceConfig, LoggingConfig, MetricsConfig, OutputsConfig, TrialConfig,
    };
    use recsim_core::episode::Phase;
    use recsim_core::model::instance::InstanceRows;
    use std::time::Duration;

    fn config(names: &[&str]) -> BenchmarkConfig {
        BenchmarkConfig {
            run_id: "unit".to_string(),
            trials: TrialConfig::default(),
            instances: names
                .iter()
                .map(|name| InstanceConfig {
                    name: name.to_string(),
                    rows: InstanceRows {
                        likes: vec![vec![0.5]],
                        survival: vec![vec![0.5]],
                        prior: vec![1.0],
                    },
                })
                .collect(),
            outputs: OutputsConfig {
                jsonl: "episodes.jsonl".to_string(),
                summary_md: "summary.md".to_string(),
                plots_dir: "plots".to_string(),
            },
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn outcome(likes: u32, rounds: u32, termination: Termination) -> EpisodeOutcome {
        EpisodeOutcome {
            user_type: 0,
            likes,
            rounds,
            termination,
            init_elapsed: Duration::ZERO,
            trace: Vec::new(),
        }
    }

    #[test]
    fn z_matches_familiar_quantiles() {
        assert!((two_sided_z(0.95).unwrap() - 1.959964).abs() < 1e-5);
        assert!((two_sided_z(0.99).unwrap() - 2.575829).abs() < 1e-5);
        assert!(two_sided_z(1.0).is_err());
    }

    #[test]
    fn interval_collapses_for_constant_rewards() {
        let (low, high) = confidence_interval(&[4.0, 4.0, 4.0], 1.96);
        assert_eq!(low, 4.0);
        assert_eq!(high, 4.0);
    }

    #[test]
    fn interval_uses_sample_standard_error() {
        // mean 2, sample variance 16 / 5
        let (low, high) = confidence_interval(&[0.0, 2.0, 4.0, 2.0, 0.0, 4.0], 2.0);
        let se = (3.2f64 / 6.0).sqrt();
        assert!((low - (2.0 - 2.0 * se)).abs() < 1e-12);
        assert!((high - (2.0 + 2.0 * se)).abs() < 1e-12);
    }

    #[test]
    fn collects_rates_per_instance() {
        let mut collector = AnalyticsCollector::new(&config(&["a", "b"])).unwrap();
        collector
            .record_episode(0, &outcome(15, 15, Termination::HorizonReached))
            .unwrap();
        collector
            .record_episode(0, &outcome(3, 4, Termination::UserLeft { round: 4 }))
            .unwrap();
        collector
            .record_episode(
                0,
                &outcome(
                    2,
                    3,
                    Termination::BudgetExceeded {
                        phase: Phase::Update,
                        round: 3,
                        elapsed: Duration::from_millis(150),
                        budget: Duration::from_millis(100),
                    },
                ),
            )
            .unwrap();

        let summary = collector.finalize();
        let a = &summary.instances[0];
        assert_eq!(a.episodes, 3);
        assert!((a.mean_reward - 6.0).abs() < 1e-12);
        assert_eq!(a.min_reward, 0);
        assert_eq!(a.max_reward, 15);
        assert!((a.completion_rate - 1.0 / 3.0).abs() < 1e-12);
        assert!((a.leave_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(a.budget_exceeded, 1);
        assert!((a.mean_rounds - 22.0 / 3.0).abs() < 1e-12);

        let b = &summary.instances[1];
        assert_eq!(b.episodes, 0);
        assert_eq!(b.min_reward, 0);
        assert_eq!(b.mean_reward, 0.0);
    }

    #[test]
    fn rejects_unknown_instance_index() {
        let mut collector = AnalyticsCollector::new(&config(&["a"])).unwrap();
        let err = collector
            .record_episode(3, &outcome(0, 1, Termination::UserLeft { round: 1 }))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownInstance(3)));
    }

    #[test]
    fn markdown_lists_every_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        let mut collector = AnalyticsCollector::new(&config(&["first", "second"])).unwrap();
        collector
            .record_episode(1, &outcome(7, 15, Termination::HorizonReached))
            .unwrap();
        collector.finalize().write_markdown(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# Recommender Summary"));
        assert!(contents.contains("| first | 0 |"));
        assert!(contents.contains("| second | 1 | 7.000 |"));
        assert!(contents.contains("95% CI"));
    }

    #[test]
    fn plot_is_written_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = AnalyticsCollector::new(&config(&["steady", "overrun"])).unwrap();
        collector
            .record_episode(0, &outcome(9, 15, Termination::HorizonReached))
            .unwrap();
        collector
            .record_episode(0, &outcome(4, 5, Termination::UserLeft { round: 5 }))
            .unwrap();
        collector
            .record_episode(
                1,
                &outcome(
                    2,
                    3,
                    Termination::BudgetExceeded {
                        phase: Phase::Update,
                        round: 3,
                        elapsed: Duration::from_millis(150),
                        budget: Duration::from_millis(100),
                    },
                ),
            )
            .unwrap();

        let plots = dir.path().join("plots");
        let path = collector.finalize().render_plot(&plots).unwrap();
        assert_eq!(path, plots.join("mean_reward.png"));
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    }
}
