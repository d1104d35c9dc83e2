use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::errors::Result;
use crate::item_index::{map_to_indices, ItemIndex};
use crate::metrics::{ensure_positive_k, RankingMetric};

pub struct Precision<I> {
    item_index: Arc<ItemIndex<I>>,
}

impl<I> Precision<I> {
    /// Returns a Precision evaluation metric.
    /// Precision quantifies the number of positive class predictions that
    /// actually belong to the positive class
    ///
    /// # Arguments
    ///
    /// * `item_index` - the item universe shared with the other metrics.
    ///
    pub fn new(item_index: Arc<ItemIndex<I>>) -> Precision<I> {
        Precision { item_index }
    }
}

impl<I> RankingMetric<I> for Precision<I>
where
    I: Ord + Hash + Clone + Debug,
{
    fn compute(&self, recommendations: &[I], interaction_history: &[I], k: usize) -> Result<f64> {
        ensure_positive_k(k)?;
        let (recommendations, history) =
            map_to_indices(&self.item_index, recommendations, interaction_history)?;
        let top_recos: HashSet<usize> = recommendations.into_iter().take(k).collect();
        let history: HashSet<usize> = history.into_iter().collect();

        let intersection = top_recos.intersection(&history);

        Ok(intersection.count() as f64 / k as f64)
    }

    fn get_name(&self, k: usize) -> String {
        format!("Precision@{}", k)
    }
}

#[cfg(test)]
mod precision_test {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn should_calculate_precision() {
        let item_index = Arc::new(ItemIndex::new(&[1_u64, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap());
        let mymetric = Precision::new(item_index);
        let recommendations: Vec<u64> = vec![1, 2, 3, 4, 5];
        let interaction_history: Vec<u64> = vec![1, 3, 6, 7];
        let score = mymetric.compute(&recommendations, &interaction_history, 3).unwrap();
        assert!(approx_eq!(f64, 2.0 / 3.0, score));
        assert_eq!("Precision@3", mymetric.get_name(3));
    }

    #[test]
    fn should_reject_zero_k() {
        let item_index = Arc::new(ItemIndex::new(&[1_u64, 2]).unwrap());
        let mymetric = Precision::new(item_index);
        assert!(mymetric.compute(&[1], &[1], 0).is_err());
    }
}
