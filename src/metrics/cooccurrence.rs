use tracing::debug;

use crate::errors::{MetricError, Result};
use crate::metrics::FitPolicy;

/// Dense item x user interaction counts.
///
/// Rows are items, columns are users, both addressed by dense index. Row norms are
/// cached after every fit so a relevance lookup is a single dot product.
#[derive(Debug, Clone)]
pub struct CooccurrenceMatrix {
    qty_items: usize,
    qty_users: usize,
    counts: Vec<u32>,
    row_norms: Vec<f64>,
    policy: FitPolicy,
    is_fit: bool,
}

impl CooccurrenceMatrix {
    pub fn new(qty_items: usize, policy: FitPolicy) -> CooccurrenceMatrix {
        CooccurrenceMatrix {
            qty_items,
            qty_users: 0,
            counts: Vec::new(),
            row_norms: vec![0.0; qty_items],
            policy,
            is_fit: false,
        }
    }

    /// Counts the interactions of every user.
    ///
    /// `user_indices[u]` is the column of the user whose items are
    /// `interactions_per_user[u]`. The matrix has `max(user index) + 1` columns.
    pub fn fit(&mut self, user_indices: &[usize], interactions_per_user: &[Vec<usize>]) -> Result<()> {
        if user_indices.len() != interactions_per_user.len() {
            return Err(MetricError::invalid_argument(format!(
                "got {} users but {} interaction lists",
                user_indices.len(),
                interactions_per_user.len()
            )));
        }
        if let Some(invalid) = interactions_per_user
            .iter()
            .flatten()
            .find(|&&item| item >= self.qty_items)
        {
            return Err(MetricError::invalid_argument(format!(
                "item index {} is outside the matrix of {} items",
                invalid, self.qty_items
            )));
        }

        let required_users = user_indices.iter().max().map_or(0, |&max| max + 1);
        match self.policy {
            FitPolicy::Reset => {
                self.qty_users = required_users;
                self.counts = vec![0; self.qty_items * self.qty_users];
            }
            FitPolicy::Accumulate => self.grow_users(required_users),
        }

        for (&user, items) in user_indices.iter().zip(interactions_per_user) {
            for &item in items {
                self.counts[item * self.qty_users + user] += 1;
            }
        }
        self.update_row_norms();
        self.is_fit = true;
        debug!(
            qty_items = self.qty_items,
            qty_users = self.qty_users,
            "fitted item-user co-occurrence matrix"
        );
        Ok(())
    }

    fn grow_users(&mut self, required_users: usize) {
        if required_users <= self.qty_users {
            return;
        }
        let mut counts = vec![0; self.qty_items * required_users];
        for item in 0..self.qty_items {
            let old_row = &self.counts[item * self.qty_users..(item + 1) * self.qty_users];
            counts[item * required_users..item * required_users + self.qty_users]
                .copy_from_slice(old_row);
        }
        self.counts = counts;
        self.qty_users = required_users;
    }

    fn update_row_norms(&mut self) {
        for item in 0..self.qty_items {
            let squared: f64 = self
                .row(item)
                .iter()
                .map(|&count| (count as f64) * (count as f64))
                .sum();
            self.row_norms[item] = squared.sqrt();
        }
    }

    fn row(&self, item: usize) -> &[u32] {
        &self.counts[item * self.qty_users..(item + 1) * self.qty_users]
    }

    /// Cosine similarity between the user vectors of two items, 0 if either is empty.
    pub fn relevance(&self, item_a: usize, item_b: usize) -> f64 {
        if !self.is_fit || item_a >= self.qty_items || item_b >= self.qty_items {
            return 0.0;
        }
        let norms = self.row_norms[item_a] * self.row_norms[item_b];
        if norms == 0.0 {
            return 0.0;
        }
        let dot: f64 = self
            .row(item_a)
            .iter()
            .zip(self.row(item_b))
            .map(|(&left, &right)| left as f64 * right as f64)
            .sum();
        (dot / norms).min(1.0)
    }

    /// Highest relevance between `item` and any item of a user's history.
    pub fn max_relevance(&self, item: usize, interaction_history: &[usize]) -> f64 {
        if !self.is_fit {
            return 0.0;
        }
        interaction_history
            .iter()
            .map(|&other| self.relevance(item, other))
            .fold(0.0, f64::max)
    }

    pub fn count(&self, item: usize, user: usize) -> u32 {
        if item >= self.qty_items || user >= self.qty_users {
            return 0;
        }
        self.counts[item * self.qty_users + user]
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.qty_items, self.qty_users)
    }

    pub fn is_fit(&self) -> bool {
        self.is_fit
    }
}
