use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::errors::Result;
use crate::item_index::{map_to_indices, ItemIndex};
use crate::metrics::{ensure_positive_k, RankingMetric};

pub struct Recall<I> {
    item_index: Arc<ItemIndex<I>>,
}

impl<I> Recall<I> {
    /// Returns a Recall evaluation metric.
    /// Recall quantifies the number of positive recommendations made out
    /// of all interacted items.
    ///
    /// # Arguments
    ///
    /// * `item_index` - the item universe shared with the other metrics.
    ///
    pub fn new(item_index: Arc<ItemIndex<I>>) -> Recall<I> {
        Recall { item_index }
    }
}

impl<I> RankingMetric<I> for Recall<I>
where
    I: Ord + Hash + Clone + Debug,
{
    fn compute(&self, recommendations: &[I], interaction_history: &[I], k: usize) -> Result<f64> {
        ensure_positive_k(k)?;
        if interaction_history.is_empty() {
            return Ok(0.0);
        }
        let (recommendations, history) =
            map_to_indices(&self.item_index, recommendations, interaction_history)?;
        let top_recos: HashSet<usize> = recommendations.into_iter().take(k).collect();
        let qty_history = history.len();
        let unique_history: HashSet<usize> = history.into_iter().collect();

        let intersection = top_recos.intersection(&unique_history);

        Ok(intersection.count() as f64 / qty_history as f64)
    }

    fn get_name(&self, k: usize) -> String {
        format!("Recall@{}", k)
    }
}
