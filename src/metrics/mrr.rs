use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::errors::Result;
use crate::item_index::{map_to_indices, ItemIndex};
use crate::metrics::{ensure_positive_k, RankingMetric};

pub struct Mrr<I> {
    item_index: Arc<ItemIndex<I>>,
}

impl<I> Mrr<I> {
    pub fn new(item_index: Arc<ItemIndex<I>>) -> Mrr<I> {
        Mrr { item_index }
    }
}

impl<I> RankingMetric<I> for Mrr<I>
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
        Ok(match index {
            Some(rank) => 1_f64 / (rank as f64 + 1_f64),
            None => 0_f64,
        })
    }

    fn get_name(&self, k: usize) -> String {
        format!("Mrr@{}", k)
    }
}
