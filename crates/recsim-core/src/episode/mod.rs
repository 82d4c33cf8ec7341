//! Simulated user sessions driving a fresh [`Recommender`].
//!
//! One episode samples the hidden user type from the prior, then plays up to
//! `horizon` rounds of recommend → observe → update. A disliked recommendation
//! ends the episode unless the user survives it, and the reward is the number
//! of likes collected while the user stayed. Each phase is timed after the
//! fact; exceeding a budget ends the episode with a zero reward.

pub mod clock;

use crate::belief::telemetry::BeliefMetrics;
use crate::error::{RecommenderError, Result};
use crate::model::instance::ProblemInstance;
use crate::model::signal::Signal;
use crate::recommender::{Recommendation, Recommender};
use clock::{Clock, MonotonicClock};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::Serialize;
use std::time::Duration;
use tracing::{Level, event};

/// Maximum number of rounds in one episode.
pub const MAX_HORIZON: u32 = 15;
/// Budget for constructing the recommender.
pub const INIT_BUDGET: Duration = Duration::from_secs(120);
/// Budget for each `recommend` and each `update` call.
pub const ROUND_BUDGET: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeLimits {
    pub horizon: u32,
    pub init_budget: Duration,
    pub round_budget: Duration,
}

impl Default for EpisodeLimits {
    fn default() -> Self {
        Self {
            horizon: MAX_HORIZON,
            init_budget: INIT_BUDGET,
            round_budget: ROUND_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Recommend,
    Update,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Recommend => "recommend",
            Phase::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    HorizonReached,
    UserLeft {
        round: u32,
    },
    BudgetExceeded {
        phase: Phase,
        round: u32,
        elapsed: Duration,
        budget: Duration,
    },
}

impl Termination {
    pub const fn label(&self) -> &'static str {
        match self {
            Termination::HorizonReached => "horizon_reached",
            Termination::UserLeft { .. } => "user_left",
            Termination::BudgetExceeded { .. } => "budget_exceeded",
        }
    }
}

/// What happened in one played round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: u32,
    pub recommendation: Recommendation,
    pub liked: bool,
    pub stayed: bool,
    pub recommend_elapsed: Duration,
    pub update_elapsed: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeOutcome {
    pub user_type: usize,
    /// Likes counted before the episode ended, including aborted episodes.
    pub likes: u32,
    pub rounds: u32,
    pub termination: Termination,
    pub init_elapsed: Duration,
    pub trace: Vec<RoundRecord>,
}

impl EpisodeOutcome {
    /// Episode reward: accumulated likes, or zero when a budget was exceeded.
    pub fn reward(&self) -> u32 {
        if self.is_budget_exceeded() {
            0
        } else {
            self.likes
        }
    }

    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self.termination, Termination::BudgetExceeded { .. })
    }

    /// Time spent inside `recommend` and `update` across all rounds.
    pub fn decision_time(&self) -> Duration {
        self.trace
            .iter()
            .map(|r| r.recommend_elapsed + r.update_elapsed.unwrap_or_default())
            .sum()
    }

    /// Number of timed `recommend`/`update` calls.
    pub fn decisions(&self) -> u32 {
        self.trace
            .iter()
            .map(|r| 1 + u32::from(r.update_elapsed.is_some()))
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct EpisodeSimulator<C: Clock = MonotonicClock> {
    limits: EpisodeLimits,
    clock: C,
}

impl EpisodeSimulator {
    pub fn new(limits: EpisodeLimits) -> Self {
        Self::with_clock(limits, MonotonicClock::new())
    }
}

impl Default for EpisodeSimulator {
    fn default() -> Self {
        Self::new(EpisodeLimits::default())
    }
}

impl<C: Clock> EpisodeSimulator<C> {
    pub fn with_clock(limits: EpisodeLimits, clock: C) -> Self {
        Self { limits, clock }
    }

    pub fn limits(&self) -> EpisodeLimits {
        self.limits
    }

    /// Plays one episode. Budget overruns are reported through
    /// [`Termination::BudgetExceeded`]; only invalid inputs and a collapsed
    /// posterior are errors.
    pub fn run<R: Rng + ?Sized>(
        &self,
        instance: &ProblemInstance,
        rng: &mut R,
    ) -> Result<EpisodeOutcome> {
        let user_type = sample_user_type(instance, rng)?;

        let start = self.clock.now();
        let mut recommender = Recommender::new(instance)?;
        let init_elapsed = self.clock.now().saturating_sub(start);

        let mut outcome = EpisodeOutcome {
            user_type,
            likes: 0,
            rounds: 0,
            termination: Termination::HorizonReached,
            init_elapsed,
            trace: Vec::with_capacity(self.limits.horizon as usize),
        };

        if init_elapsed > self.limits.init_budget {
            return Ok(self.finish(
                outcome,
                self.exceeded(Phase::Init, 0, init_elapsed, self.limits.init_budget),
            ));
        }

        let likes = instance.likes();
        let survival = instance.survival();

        for round in 1..=self.limits.horizon {
            outcome.rounds = round;

            let start = self.clock.now();
            let recommendation = recommender.recommend();
            let recommend_elapsed = self.clock.now().saturating_sub(start);
            if recommend_elapsed > self.limits.round_budget {
                let termination = self.exceeded(
                    Phase::Recommend,
                    round,
                    recommend_elapsed,
                    self.limits.round_budget,
                );
                return Ok(self.finish(outcome, termination));
            }

            let cell = [recommendation.option, user_type];
            let liked = rng.gen_bool(likes[cell]);
            let stayed = liked || rng.gen_bool(survival[cell]);

            let mut record = RoundRecord {
                round,
                recommendation,
                liked,
                stayed,
                recommend_elapsed,
                update_elapsed: None,
            };

            if !stayed {
                outcome.trace.push(record);
                return Ok(self.finish(outcome, Termination::UserLeft { round }));
            }

            outcome.likes += u32::from(liked);

            let start = self.clock.now();
            recommender.update(Signal::from(liked))?;
            let update_elapsed = self.clock.now().saturating_sub(start);
            record.update_elapsed = Some(update_elapsed);
            outcome.trace.push(record);

            self.trace_round(&record, &recommender);

            if update_elapsed > self.limits.round_budget {
                let termination = self.exceeded(
                    Phase::Update,
                    round,
                    update_elapsed,
                    self.limits.round_budget,
                );
                return Ok(self.finish(outcome, termination));
            }
        }

        Ok(self.finish(outcome, Termination::HorizonReached))
    }

    fn exceeded(&self, phase: Phase, round: u32, elapsed: Duration, budget: Duration) -> Termination {
        event!(
            target: "recsim_core::episode",
            Level::WARN,
            phase = phase.as_str(),
            round,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            budget_ms = budget.as_secs_f64() * 1000.0,
            "phase exceeded its time budget"
        );
        Termination::BudgetExceeded {
            phase,
            round,
            elapsed,
            budget,
        }
    }

    fn trace_round(&self, record: &RoundRecord, recommender: &Recommender) {
        if !tracing::enabled!(target: "recsim_core::episode", Level::TRACE) {
            return;
        }
        let metrics = BeliefMetrics::from_belief(recommender.belief(), record.round);
        event!(
            target: "recsim_core::episode",
            Level::TRACE,
            round = record.round,
            option = record.recommendation.option,
            liked = record.liked,
            entropy = metrics.entropy,
            most_likely_type = metrics.most_likely_type,
            max_probability = metrics.max_probability
        );
    }

    fn finish(&self, mut outcome: EpisodeOutcome, termination: Termination) -> EpisodeOutcome {
        outcome.termination = termination;
        event!(
            target: "recsim_core::episode",
            Level::DEBUG,
            user_type = outcome.user_type,
            rounds = outcome.rounds,
            likes = outcome.likes,
            reward = outcome.reward(),
            termination = termination.label()
        );
        outcome
    }
}

/// Runs one episode with the default limits and wall clock.
pub fn run_episode<R: Rng + ?Sized>(
    instance: &ProblemInstance,
    rng: &mut R,
) -> Result<EpisodeOutcome> {
    EpisodeSimulator::new(EpisodeLimits::default()).run(instance, rng)
}

fn sample_user_type<R: Rng + ?Sized>(instance: &ProblemInstance, rng: &mut R) -> Result<usize> {
    let prior = instance.prior();
    let distribution = WeightedIndex::new(prior.iter())
        .map_err(|_| RecommenderError::InvalidDistribution { sum: prior.sum() })?;
    Ok(distribution.sample(rng))
}
