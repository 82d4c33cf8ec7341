use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// One scheduled episode: which trial, which instance, and its RNG seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEpisode {
    pub trial: usize,
    pub instance: usize,
    pub seed: u64,
}

/// Deterministic trial-major schedule of episode seeds.
///
/// Every trial plays each instance once, in configuration order. Seeds come
/// from a master `StdRng`, one draw per scheduled episode, so the same master
/// seed and shape always reproduce the same episodes.
pub struct TrialSchedule {
    master: StdRng,
    trials: usize,
    instances: usize,
    next: usize,
}

impl TrialSchedule {
    pub fn new(master_seed: u64, trials: usize, instances: usize) -> Self {
        Self {
            master: StdRng::seed_from_u64(master_seed),
            trials,
            instances,
            next: 0,
        }
    }

    /// Total number of episodes the schedule produces.
    pub fn total(&self) -> usize {
        self.trials * self.instances
    }
}

impl Iterator for TrialSchedule {
    type Item = ScheduledEpisode;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total() {
            return None;
        }
        let slot = self.next;
        self.next += 1;
        Some(ScheduledEpisode {
            trial: slot / self.instances,
            instance: slot % self.instances,
            seed: self.master.next_u64(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TrialSchedule {}
