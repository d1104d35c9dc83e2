use std::fmt::Debug;
use std::hash::Hash;

use hashbrown::HashMap;
use itertools::Itertools;

use crate::errors::{MetricError, Result};

/// Dense `0..N` positions for a finite item universe.
///
/// Items are deduplicated and sorted by their natural order, so two indexes built
/// from the same universe always agree on every position. Popularity tables,
/// co-occurrence rows and embedding rows are all addressed through this mapping.
#[derive(Debug, Clone)]
pub struct ItemIndex<I> {
    items: Vec<I>,
    positions: HashMap<I, usize>,
}

impl<I> ItemIndex<I>
where
    I: Ord + Hash + Clone + Debug,
{
    /// Returns an index over `all_items`.
    ///
    /// # Arguments
    ///
    /// * `all_items` - the item universe, duplicates are allowed and removed.
    ///
    pub fn new(all_items: &[I]) -> Result<ItemIndex<I>> {
        if all_items.is_empty() {
            return Err(MetricError::invalid_argument(
                "the item universe must contain at least one item",
            ));
        }
        let items = all_items.iter().cloned().sorted().dedup().collect_vec();
        let positions = items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.clone(), position))
            .collect();
        Ok(ItemIndex { items, positions })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &I) -> bool {
        self.positions.contains_key(item)
    }

    pub fn index_of(&self, item: &I) -> Result<usize> {
        self.positions
            .get(item)
            .copied()
            .ok_or_else(|| MetricError::unknown_item(item))
    }

    pub fn item_at(&self, index: usize) -> Option<&I> {
        self.items.get(index)
    }

    /// Maps every item or fails on the first unknown one.
    pub fn map_items(&self, items: &[I]) -> Result<Vec<usize>> {
        items.iter().map(|item| self.index_of(item)).collect()
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }
}

/// Translates both sides of an evaluation request into index space.
pub fn map_to_indices<I>(
    index: &ItemIndex<I>,
    recommendations: &[I],
    interaction_history: &[I],
) -> Result<(Vec<usize>, Vec<usize>)>
where
    I: Ord + Hash + Clone + Debug,
{
    Ok((
        index.map_items(recommendations)?,
        index.map_items(interaction_history)?,
    ))
}
