use std::fmt::Debug;
use std::hash::Hash;

use itertools::Itertools;

use crate::errors::{MetricError, Result};
use crate::item_index::ItemIndex;

/// One dense vector per item, stored in item index order.
#[derive(Debug, Clone)]
pub struct ItemEmbeddings<I> {
    index: ItemIndex<I>,
    vectors: Vec<Vec<f64>>,
}

impl<I> ItemEmbeddings<I>
where
    I: Ord + Hash + Clone + Debug,
{
    /// `vectors[i]` is the embedding of `items[i]`. All vectors need the same,
    /// non-zero dimension and every item may appear only once.
    pub fn new(items: Vec<I>, vectors: Vec<Vec<f64>>) -> Result<ItemEmbeddings<I>> {
        if items.len() != vectors.len() {
            return Err(MetricError::invalid_argument(format!(
                "got {} items but {} embedding vectors",
                items.len(),
                vectors.len()
            )));
        }
        let index = ItemIndex::new(&items)?;
        if index.len() != items.len() {
            return Err(MetricError::invalid_argument(
                "every item may only have one embedding vector",
            ));
        }
        let dimension = vectors[0].len();
        if dimension == 0 || vectors.iter().any(|vector| vector.len() != dimension) {
            return Err(MetricError::invalid_argument(
                "embedding vectors need the same non-zero dimension",
            ));
        }

        let mut ordered = vec![Vec::new(); vectors.len()];
        for (item, vector) in items.iter().zip(vectors) {
            ordered[index.index_of(item)?] = vector;
        }
        Ok(ItemEmbeddings {
            index,
            vectors: ordered,
        })
    }

    /// Embeddings for items numbered `0..rows.len()`, as produced by most
    /// embedding models that emit one row per item id.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<ItemEmbeddings<usize>> {
        let items = (0..rows.len()).collect_vec();
        ItemEmbeddings::new(items, rows)
    }

    pub fn index(&self) -> &ItemIndex<I> {
        &self.index
    }

    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }

    pub fn vector(&self, item: &I) -> Result<&[f64]> {
        Ok(&self.vectors[self.index.index_of(item)?])
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.first().map_or(0, |vector| vector.len())
    }
}
