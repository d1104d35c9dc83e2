use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::errors::Result;
use crate::item_index::{map_to_indices, ItemIndex};
use crate::metrics::{ensure_positive_k, RankingMetric};

pub struct Ndcg<I> {
    item_index: Arc<ItemIndex<I>>,
}

impl<I> Ndcg<I> {
    //
    /// Calculate Ndcg for predicted recommendations and the items a user interacted with.
    pub fn new(item_index: Arc<ItemIndex<I>>) -> Ndcg<I> {
        Ndcg { item_index }
    }
}

fn gain(position: usize) -> f64 {
    1_f64 / ((position as f64) + 2_f64).log2()
}

impl<I> RankingMetric<I> for Ndcg<I>
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
        let history: HashSet<usize> = history.into_iter().collect();

        // a repeated recommendation only earns gain at its first position
        let mut seen = HashSet::with_capacity(k);
        let dcg: f64 = recommendations
            .iter()
            .take(k)
            .enumerate()
            .filter(|(_position, item_id)| history.contains(*item_id) && seen.insert(**item_id))
            .map(|(position, _item_id)| gain(position))
            .sum();
        let dcg_max: f64 = (0..history.len().min(k)).map(gain).sum();

        Ok(if dcg_max > 0.0 { dcg / dcg_max } else { 0.0 })
    }

    fn get_name(&self, k: usize) -> String {
        format!("Ndcg@{}", k)
    }
}
