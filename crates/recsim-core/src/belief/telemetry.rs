use super::BeliefState;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BeliefMetrics {
    pub round: u32,
    pub entropy: f64,
    pub most_likely_type: usize,
    pub max_probability: f64,
}

impl BeliefMetrics {
    pub fn from_belief(belief: &BeliefState, round: u32) -> Self {
        let most_likely_type = belief.most_likely_type();
        Self {
            round,
            entropy: belief.entropy(),
            most_likely_type,
            max_probability: belief.prob(most_likely_type),
        }
    }
}
