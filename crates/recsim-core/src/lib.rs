#![deny(warnings)]
pub mod belief;
pub mod episode;
pub mod error;
pub mod model;
pub mod recommender;

pub use belief::BeliefState;
pub use episode::{EpisodeLimits, EpisodeOutcome, EpisodeSimulator, Termination, run_episode};
pub use error::RecommenderError;
pub use model::instance::ProblemInstance;
pub use model::signal::Signal;
pub use recommender::{Recommendation, Recommender};

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "recsim"
    }

    pub const fn codename() -> &'static str {
        "Greedy Belief"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::AppInfo;

    #[test]
    fn exposes_static_metadata() {
        assert_eq!(AppInfo::name(), "recsim");
        assert_eq!(AppInfo::codename(), "Greedy Belief");
        assert!(!AppInfo::version().is_empty());
    }
}
