use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::errors::Result;
use crate::item_index::{map_to_indices, ItemIndex};
use crate::metrics::{ensure_positive_k, RankingMetric};

/// 1 when any of the top `k` recommendations was interacted with, 0 otherwise.
/// Averaged over users this is the share of users with at least one hit.
pub struct HitRate<I> {
    item_index: Arc<ItemIndex<I>>,
}

impl<I> HitRate<I> {
    pub fn new(item_index: Arc<ItemIndex<I>>) -> HitRate<I> {
        HitRate { item_index }
    }
}

impl<I> RankingMetric<I> for HitRate<I>
where
    I: Ord + Hash + Clone + Debug,
{
    fn compute(&self, recommendations: &[I], interaction_history: &[I], k: usize) -> Result<f64> {
        ensure_positive_k(k)?;
        let (recommendations, history) =
            map_to_indices(&self.item_index, recommendations, interaction_history)?;
        let history: HashSet<usize> = history.into_iter().collect();
        let index = recommendations
            .iter()
            .take(k)
            .position(|item_id| history.contains(item_id));
        Ok(if index.is_some() { 1_f64 } else { 0_f64 })
    }

    fn get_name(&self, k: usize) -> String {
        format!("HitRate@{}", k)
    }
}
