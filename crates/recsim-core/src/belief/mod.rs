//! Posterior tracking over latent user types.
//!
//! - `state`: the normalized probability vector (`BeliefState`).
//! - `update`: Bayesian revision after a like/dislike observation.
//! - `telemetry`: summary metrics derived from a belief snapshot.

mod state;
pub mod telemetry;
mod update;

pub use state::{BELIEF_SUM_TOLERANCE, BeliefState};
pub use update::posterior;
