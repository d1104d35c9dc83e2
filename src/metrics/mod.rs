use crate::errors::{MetricError, Result};

pub mod cluster_serendipity;
pub mod cooccurrence;
pub mod evaluation_reporter;
pub mod hitrate;
pub mod mrr;
pub mod ndcg;
pub mod popularity;
pub mod precision;
pub mod recall;
pub mod serendipity;

/// A metric that scores one recommendation list against one user's interactions.
///
/// Implementations translate both inputs through their item index before
/// computing anything, so unknown items are rejected up front.
pub trait RankingMetric<I> {
    fn compute(&self, recommendations: &[I], interaction_history: &[I], k: usize) -> Result<f64>;
    fn get_name(&self, k: usize) -> String;
}

/// How a repeated `fit` call treats the counts of the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPolicy {
    /// Every fit starts from empty tables.
    Reset,
    /// Counts of consecutive fits are summed.
    Accumulate,
}

impl Default for FitPolicy {
    fn default() -> Self {
        FitPolicy::Reset
    }
}

impl std::str::FromStr for FitPolicy {
    type Err = MetricError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(FitPolicy::Reset),
            "accumulate" => Ok(FitPolicy::Accumulate),
            other => Err(MetricError::invalid_argument(format!(
                "unknown fit policy '{}', expected 'reset' or 'accumulate'",
                other
            ))),
        }
    }
}

pub(crate) fn ensure_positive_k(k: usize) -> Result<()> {
    if k == 0 {
        Err(MetricError::invalid_argument("k must be at least 1"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod metrics_test {
    use super::*;

    #[test]
    fn should_parse_fit_policy() {
        assert_eq!(FitPolicy::Reset, "reset".parse().unwrap());
        assert_eq!(FitPolicy::Accumulate, " Accumulate ".parse().unwrap());
        assert!("additive".parse::<FitPolicy>().is_err());
        assert_eq!(FitPolicy::Reset, FitPolicy::default());
    }
}
