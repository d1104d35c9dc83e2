use itertools::Itertools;
use tracing::debug;

use crate::errors::{MetricError, Result};
use crate::metrics::FitPolicy;

/// Occurrence counts of items in a reference interaction log.
///
/// All items are addressed by their position in an `ItemIndex`. Besides the raw
/// counts, the model keeps the popularity ranking: items with a non-zero count
/// ordered by count descending, ties broken by ascending index.
#[derive(Debug, Clone)]
pub struct PopularityModel {
    counts: Vec<u64>,
    total: u64,
    ranking: Vec<usize>,
    rank_positions: Vec<Option<usize>>,
    policy: FitPolicy,
    is_fit: bool,
}

impl PopularityModel {
    pub fn new(qty_items: usize, policy: FitPolicy) -> PopularityModel {
        PopularityModel {
            counts: vec![0; qty_items],
            total: 0,
            ranking: Vec::new(),
            rank_positions: vec![None; qty_items],
            policy,
            is_fit: false,
        }
    }

    /// Counts every occurrence of the given item indices.
    ///
    /// Under `FitPolicy::Reset` the counts of an earlier fit are discarded first.
    /// Nothing changes when an index is out of range.
    pub fn fit(&mut self, interactions: &[usize]) -> Result<()> {
        if let Some(invalid) = interactions.iter().find(|&&index| index >= self.counts.len()) {
            return Err(MetricError::invalid_argument(format!(
                "item index {} is outside the popularity table of {} items",
                invalid,
                self.counts.len()
            )));
        }
        if self.policy == FitPolicy::Reset {
            self.counts.iter_mut().for_each(|count| *count = 0);
            self.total = 0;
        }
        for &index in interactions {
            self.counts[index] += 1;
        }
        self.total += interactions.len() as u64;
        self.rebuild_ranking();
        self.is_fit = true;
        debug!(
            qty_interactions = interactions.len(),
            qty_popular_items = self.ranking.len(),
            "fitted popularity model"
        );
        Ok(())
    }

    fn rebuild_ranking(&mut self) {
        let counts = &self.counts;
        self.ranking = (0..counts.len())
            .filter(|&index| counts[index] > 0)
            .sorted_by(|&left, &right| counts[right].cmp(&counts[left]).then(left.cmp(&right)))
            .collect();
        self.rank_positions.iter_mut().for_each(|position| *position = None);
        for (position, &index) in self.ranking.iter().enumerate() {
            self.rank_positions[index] = Some(position);
        }
    }

    /// Popularity-based probability of an item within the top `list_len` items.
    ///
    /// Returns `(list_len - rank) / (list_len - 1)` for the 1-based `rank` of the
    /// item among the `list_len` most popular items and 0 for any other item.
    pub fn rank(&self, item: usize, list_len: usize) -> Result<f64> {
        if list_len <= 1 {
            return Err(MetricError::invalid_argument(format!(
                "the popularity rank needs a list length of at least 2, got {}",
                list_len
            )));
        }
        match self.rank_positions.get(item).copied().flatten() {
            Some(position) if position < list_len => {
                let rank = position + 1;
                Ok((list_len - rank) as f64 / (list_len - 1) as f64)
            }
            _ => Ok(0.0),
        }
    }

    /// Additive (Laplace) smoothed probability of observing an item.
    pub fn smoothed_probability(&self, item: usize, alpha: f64) -> f64 {
        let normaliser = self.total as f64 + alpha * self.counts.len() as f64;
        if normaliser <= 0.0 {
            return 0.0;
        }
        let count = self.counts.get(item).copied().unwrap_or_default();
        (count as f64 + alpha) / normaliser
    }

    pub fn count(&self, item: usize) -> u64 {
        self.counts.get(item).copied().unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// The `n` most popular item indices, most popular first.
    pub fn top_items(&self, n: usize) -> &[usize] {
        &self.ranking[..n.min(self.ranking.len())]
    }

    pub fn is_fit(&self) -> bool {
        self.is_fit
    }
}

#[cfg(test)]
mod popularity_test {
    use super::*;
    use float_cmp::approx_eq;

    fn fitted(policy: FitPolicy) -> PopularityModel {
        let mut undertest = PopularityModel::new(10, policy);
        // counts: 0 -> 4, 1 -> 3, 2 -> 2, 3 -> 1
        undertest.fit(&[0, 1, 2, 3, 0, 1, 2, 0, 1, 0]).unwrap();
        undertest
    }

    #[test]
    fn should_rank_by_count() {
        let undertest = fitted(FitPolicy::Reset);
        assert_eq!(&[0, 1, 2], undertest.top_items(3));
        assert!(approx_eq!(f64, 1.0, undertest.rank(0, 3).unwrap()));
        assert!(approx_eq!(f64, 0.5, undertest.rank(1, 3).unwrap()));
        assert!(approx_eq!(f64, 0.0, undertest.rank(2, 3).unwrap()));
        assert!(approx_eq!(f64, 0.0, undertest.rank(3, 3).unwrap()));
        assert!(approx_eq!(f64, 0.0, undertest.rank(9, 3).unwrap()));
    }

    #[test]
    fn should_break_ties_by_ascending_index() {
        let mut undertest = PopularityModel::new(5, FitPolicy::Reset);
        undertest.fit(&[4, 2, 4, 2, 1]).unwrap();
        assert_eq!(&[2, 4, 1], undertest.top_items(5));
    }

    #[test]
    fn should_never_rank_unseen_items() {
        let mut undertest = PopularityModel::new(5, FitPolicy::Reset);
        undertest.fit(&[3]).unwrap();
        assert_eq!(&[3], undertest.top_items(5));
        assert!(approx_eq!(f64, 0.0, undertest.rank(0, 4).unwrap()));
    }

    #[test]
    fn should_reject_list_length_one() {
        let undertest = fitted(FitPolicy::Reset);
        assert!(matches!(
            undertest.rank(0, 1),
            Err(MetricError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn should_reset_counts_on_refit() {
        let mut undertest = fitted(FitPolicy::Reset);
        undertest.fit(&[5, 5]).unwrap();
        assert_eq!(0, undertest.count(0));
        assert_eq!(2, undertest.count(5));
        assert_eq!(2, undertest.total());
        assert_eq!(&[5], undertest.top_items(3));
    }

    #[test]
    fn should_accumulate_counts_when_configured() {
        let mut undertest = fitted(FitPolicy::Accumulate);
        undertest.fit(&[5, 5]).unwrap();
        assert_eq!(4, undertest.count(0));
        assert_eq!(2, undertest.count(5));
        assert_eq!(12, undertest.total());
    }

    #[test]
    fn should_leave_state_untouched_on_invalid_fit() {
        let mut undertest = fitted(FitPolicy::Reset);
        assert!(undertest.fit(&[1, 10]).is_err());
        assert_eq!(4, undertest.count(0));
        assert_eq!(10, undertest.total());
    }

    #[test]
    fn should_smooth_probabilities() {
        let undertest = fitted(FitPolicy::Reset);
        // (4 + 1) / (10 + 1 * 10)
        assert!(approx_eq!(f64, 0.25, undertest.smoothed_probability(0, 1.0)));
        assert!(approx_eq!(f64, 0.05, undertest.smoothed_probability(9, 1.0)));
        let unfit = PopularityModel::new(3, FitPolicy::Reset);
        assert!(approx_eq!(f64, 0.0, unfit.smoothed_probability(0, 0.0)));
    }
}
