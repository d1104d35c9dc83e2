use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use tracing::{debug, warn};

use crate::errors::{MetricError, Result};
use crate::item_index::{map_to_indices, ItemIndex};
use crate::metrics::cooccurrence::CooccurrenceMatrix;
use crate::metrics::popularity::PopularityModel;
use crate::metrics::{FitPolicy, RankingMetric};

/// Score of one recommendation list together with the contribution of every
/// recommended item.
#[derive(Debug, Clone, PartialEq)]
pub struct SerendipityOutcome<I: Eq + Hash> {
    pub serendipity: f64,
    pub itemwise: HashMap<I, f64>,
}

/// Fit state shared by both rank-discount scorers.
///
/// `fit` needs `&mut self` and `compute` only `&self`, so a fitted scorer can be
/// shared read-only between threads but never refitted while it is being read.
#[derive(Debug, Clone)]
struct FitState<U> {
    popularity: PopularityModel,
    cooccurrence: CooccurrenceMatrix,
    users: HashMap<U, usize>,
}

impl<U> FitState<U>
where
    U: Ord + Hash + Clone + Debug,
{
    fn new(qty_items: usize, policy: FitPolicy) -> FitState<U> {
        FitState {
            popularity: PopularityModel::new(qty_items, policy),
            cooccurrence: CooccurrenceMatrix::new(qty_items, policy),
            users: HashMap::new(),
        }
    }

    /// Dense column per user; new users are numbered in sorted order after the known ones.
    fn user_columns(&self, users: &[U], policy: FitPolicy) -> HashMap<U, usize> {
        let mut columns = match policy {
            FitPolicy::Reset => HashMap::new(),
            FitPolicy::Accumulate => self.users.clone(),
        };
        for user in users.iter().sorted().dedup() {
            let next = columns.len();
            columns.entry(user.clone()).or_insert(next);
        }
        columns
    }
}

/// Linear rank discount, 1.0 at the first position and 0.0 at position `k - 1`.
fn rank_discount(position: usize, k: usize) -> f64 {
    (k - position - 1) as f64 / (k - 1) as f64
}

fn ensure_rank_discount_k(k: usize) -> Result<()> {
    if k <= 1 {
        Err(MetricError::invalid_argument(format!(
            "serendipity needs k of at least 2, got {}",
            k
        )))
    } else {
        Ok(())
    }
}

/// Top `k` positions of a list, padded with `None` when the list is shorter.
fn padded_top_k(recommendations: &[usize], k: usize) -> Vec<Option<usize>> {
    recommendations
        .iter()
        .copied()
        .map(Some)
        .chain(std::iter::repeat(None))
        .take(k)
        .collect()
}

macro_rules! rank_discount_scorer_common {
    ($scorer:ident) => {
        impl<I, U> $scorer<I, U>
        where
            I: Ord + Hash + Clone + Debug,
            U: Ord + Hash + Clone + Debug,
        {
            /// Fits the popularity table on a reference interaction log.
            pub fn fit(&mut self, all_interactions: &[I]) -> Result<()> {
                let interactions = self.item_index.map_items(all_interactions)?;
                self.state.popularity.fit(&interactions)
            }

            pub fn is_fit(&self) -> bool {
                self.state.popularity.is_fit()
            }

            pub fn popularity(&self) -> &PopularityModel {
                &self.state.popularity
            }

            pub fn item_index(&self) -> &ItemIndex<I> {
                &self.item_index
            }
        }
    };
}

/// Order-agnostic serendipity with a linear rank discount.
///
/// A hit contributes `max(s - p, 0)` where `s` is the rank discount of its
/// position and `p` its popularity-based probability among the top `k` items.
/// Once user interactions are fitted, a non-hit contributes
/// `max((s - p) * r, 0)` where `r` is its highest co-occurrence relevance to
/// the user's history. The score is the sum of contributions divided by `k`.
#[derive(Debug, Clone)]
pub struct Serendipity<I, U = u64> {
    item_index: Arc<ItemIndex<I>>,
    policy: FitPolicy,
    state: FitState<U>,
}

rank_discount_scorer_common!(Serendipity);

impl<I, U> Serendipity<I, U>
where
    I: Ord + Hash + Clone + Debug,
    U: Ord + Hash + Clone + Debug,
{
    pub fn new(all_items: &[I]) -> Result<Serendipity<I, U>> {
        Ok(Self::with_index(Arc::new(ItemIndex::new(all_items)?), FitPolicy::Reset))
    }

    pub fn with_index(item_index: Arc<ItemIndex<I>>, policy: FitPolicy) -> Serendipity<I, U> {
        let state = FitState::new(item_index.len(), policy);
        Serendipity {
            item_index,
            policy,
            state,
        }
    }

    /// Fits the item-user co-occurrence matrix used to score non-hits.
    ///
    /// # Arguments
    ///
    /// * `users` - one user identifier per interaction list.
    /// * `interactions_per_user` - the items each user interacted with.
    ///
    pub fn fit_user_interactions(&mut self, users: &[U], interactions_per_user: &[Vec<I>]) -> Result<()> {
        if users.len() != interactions_per_user.len() {
            return Err(MetricError::invalid_argument(format!(
                "got {} users but {} interaction lists",
                users.len(),
                interactions_per_user.len()
            )));
        }
        let interactions: Vec<Vec<usize>> = interactions_per_user
            .iter()
            .map(|items| self.item_index.map_items(items))
            .collect::<Result<_>>()?;
        let columns = self.state.user_columns(users, self.policy);
        let user_indices = users.iter().map(|user| columns[user]).collect_vec();
        self.state.cooccurrence.fit(&user_indices, &interactions)?;
        self.state.users = columns;
        Ok(())
    }

    pub fn cooccurrence(&self) -> &CooccurrenceMatrix {
        &self.state.cooccurrence
    }

    pub fn compute_itemwise(
        &self,
        recommendations: &[I],
        interaction_history: &[I],
        k: usize,
    ) -> Result<SerendipityOutcome<I>> {
        ensure_rank_discount_k(k)?;
        let (recommendations, history) =
            map_to_indices(&self.item_index, recommendations, interaction_history)?;
        if !self.is_fit() {
            warn!("serendipity computed before fit, popularity is zero for every item");
        }
        let history_set: HashSet<usize> = history.iter().copied().collect();

        let mut total = 0_f64;
        let mut itemwise = HashMap::with_capacity(k);
        for (position, slot) in padded_top_k(&recommendations, k).into_iter().enumerate() {
            let item = match slot {
                Some(item) => item,
                None => continue,
            };
            let discount = rank_discount(position, k);
            let probability = self.state.popularity.rank(item, k)?;
            let contribution = if history_set.contains(&item) {
                (discount - probability).max(0.0)
            } else if self.state.cooccurrence.is_fit() {
                let relevance = self.state.cooccurrence.max_relevance(item, &history);
                ((discount - probability) * relevance).max(0.0)
            } else {
                0.0
            };
            total += contribution;
            if let Some(original) = self.item_index.item_at(item) {
                itemwise.insert(original.clone(), contribution);
            }
        }
        let serendipity = total / k as f64;
        debug!(k, serendipity, "computed serendipity");
        Ok(SerendipityOutcome {
            serendipity,
            itemwise,
        })
    }
}

impl<I, U> RankingMetric<I> for Serendipity<I, U>
where
    I: Ord + Hash + Clone + Debug,
    U: Ord + Hash + Clone + Debug,
{
    fn compute(&self, recommendations: &[I], interaction_history: &[I], k: usize) -> Result<f64> {
        self.compute_itemwise(recommendations, interaction_history, k)
            .map(|outcome| outcome.serendipity)
    }

    fn get_name(&self, k: usize) -> String {
        format!("Serendipity@{}", k)
    }
}

/// Serendipity that rewards lists which surface hits early and keep doing so.
///
/// Each hit contributes `max(s - p, 0) * hits_so_far / (i + 1)`. Non-hits never
/// contribute, the co-occurrence fallback of [`Serendipity`] does not apply here.
#[derive(Debug, Clone)]
pub struct OrderAwareSerendipity<I, U = u64> {
    item_index: Arc<ItemIndex<I>>,
    state: FitState<U>,
}

rank_discount_scorer_common!(OrderAwareSerendipity);

impl<I, U> OrderAwareSerendipity<I, U>
where
    I: Ord + Hash + Clone + Debug,
    U: Ord + Hash + Clone + Debug,
{
    pub fn new(all_items: &[I]) -> Result<OrderAwareSerendipity<I, U>> {
        Ok(Self::with_index(Arc::new(ItemIndex::new(all_items)?), FitPolicy::Reset))
    }

    pub fn with_index(item_index: Arc<ItemIndex<I>>, policy: FitPolicy) -> OrderAwareSerendipity<I, U> {
        let state = FitState::new(item_index.len(), policy);
        OrderAwareSerendipity { item_index, state }
    }

    pub fn compute_itemwise(
        &self,
        recommendations: &[I],
        interaction_history: &[I],
        k: usize,
    ) -> Result<SerendipityOutcome<I>> {
        ensure_rank_discount_k(k)?;
        let (recommendations, history) =
            map_to_indices(&self.item_index, recommendations, interaction_history)?;
        if !self.is_fit() {
            warn!("order-aware serendipity computed before fit, popularity is zero for every item");
        }
        let history_set: HashSet<usize> = history.into_iter().collect();

        let mut total = 0_f64;
        let mut qty_relevant = 0_usize;
        let mut itemwise = HashMap::with_capacity(k);
        for (position, slot) in padded_top_k(&recommendations, k).into_iter().enumerate() {
            let item = match slot {
                Some(item) => item,
                None => continue,
            };
            let contribution = if history_set.contains(&item) {
                qty_relevant += 1;
                let discount = rank_discount(position, k);
                let probability = self.state.popularity.rank(item, k)?;
                (discount - probability).max(0.0) * qty_relevant as f64 / (position + 1) as f64
            } else {
                0.0
            };
            total += contribution;
            if let Some(original) = self.item_index.item_at(item) {
                itemwise.insert(original.clone(), contribution);
            }
        }
        let serendipity = total / k as f64;
        debug!(k, serendipity, "computed order-aware serendipity");
        Ok(SerendipityOutcome {
            serendipity,
            itemwise,
        })
    }
}

impl<I, U> RankingMetric<I> for OrderAwareSerendipity<I, U>
where
    I: Ord + Hash + Clone + Debug,
    U: Ord + Hash + Clone + Debug,
{
    fn compute(&self, recommendations: &[I], interaction_history: &[I], k: usize) -> Result<f64> {
        self.compute_itemwise(recommendations, interaction_history, k)
            .map(|outcome| outcome.serendipity)
    }

    fn get_name(&self, k: usize) -> String {
        format!("OrderAwareSerendipity@{}", k)
    }
}

#[cfg(test)]
mod serendipity_test {
    use super::*;
    use float_cmp::approx_eq;

    const ALL_ITEMS: [u64; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
    const INTERACTIONS: [u64; 10] = [1, 2, 3, 4, 1, 2, 3, 1, 2, 1];

    fn fitted() -> Serendipity<u64> {
        let mut undertest = Serendipity::new(&ALL_ITEMS).unwrap();
        undertest.fit(&INTERACTIONS).unwrap();
        undertest
    }

    #[test]
    fn should_score_reference_scenario() {
        let undertest = fitted();
        let outcome = undertest
            .compute_itemwise(&[1, 2, 3, 4, 5], &[1, 3, 6, 7], 3)
            .unwrap();
        assert!(approx_eq!(f64, 0.0, outcome.serendipity));
        assert_eq!(3, outcome.itemwise.len());
        assert!(approx_eq!(f64, 0.0, outcome.itemwise[&1]));
        assert!(approx_eq!(f64, 0.0, outcome.itemwise[&2]));
        assert!(approx_eq!(f64, 0.0, outcome.itemwise[&3]));
        assert_eq!("Serendipity@3", undertest.get_name(3));
    }

    #[test]
    fn should_reward_unpopular_hits_at_the_top() {
        let undertest = fitted();
        // item 6 is never seen, so its popularity probability is 0 and its discount is 1
        let outcome = undertest.compute_itemwise(&[6, 1, 2], &[6, 1], 3).unwrap();
        assert!(approx_eq!(f64, 1.0, outcome.itemwise[&6]));
        // item 1 at position 1: discount 0.5, probability 1.0
        assert!(approx_eq!(f64, 0.0, outcome.itemwise[&1]));
        assert!(approx_eq!(f64, 1.0 / 3.0, outcome.serendipity));
    }

    #[test]
    fn should_pad_short_lists() {
        let undertest = fitted();
        let outcome = undertest.compute_itemwise(&[6], &[6], 4).unwrap();
        assert_eq!(1, outcome.itemwise.len());
        assert!(approx_eq!(f64, 0.25, outcome.serendipity));
    }

    #[test]
    fn should_reject_k_of_one() {
        let undertest = fitted();
        assert!(matches!(
            undertest.compute(&[1, 2], &[1], 1),
            Err(MetricError::InvalidArgument { .. })
        ));
        assert!(matches!(
            undertest.compute(&[1, 2], &[1], 0),
            Err(MetricError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn should_reject_unknown_items() {
        let undertest = fitted();
        assert!(matches!(
            undertest.compute(&[11, 2], &[1], 2),
            Err(MetricError::UnknownItem { .. })
        ));
        let mut unfit = Serendipity::<u64>::new(&ALL_ITEMS).unwrap();
        assert!(unfit.fit(&[1, 42]).is_err());
        assert!(!unfit.is_fit());
    }

    #[test]
    fn should_reject_empty_universe() {
        assert!(matches!(
            Serendipity::<u64>::new(&[]),
            Err(MetricError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn should_treat_unfit_scorer_as_zero_popularity() {
        let undertest = Serendipity::<u64>::new(&ALL_ITEMS).unwrap();
        let score = undertest.compute(&[1, 2, 3], &[1], 3).unwrap();
        assert!(approx_eq!(f64, 1.0 / 3.0, score));
    }

    #[test]
    fn should_use_cooccurrence_for_non_hits() {
        let mut undertest = fitted();
        undertest
            .fit_user_interactions(&[100, 200], &[vec![5, 6], vec![5, 6, 7]])
            .unwrap();
        // item 5 is no hit but co-occurs with item 6 for both users
        let outcome = undertest.compute_itemwise(&[5, 8, 9], &[6], 3).unwrap();
        assert!(approx_eq!(f64, 1.0, outcome.itemwise[&5]));
        assert!(approx_eq!(f64, 0.0, outcome.itemwise[&8]));
        assert!(approx_eq!(f64, 1.0 / 3.0, outcome.serendipity));
    }

    #[test]
    fn should_reject_mismatched_user_interactions() {
        let mut undertest = fitted();
        let result = undertest.fit_user_interactions(&[1, 2], &[vec![1]]);
        assert!(matches!(result, Err(MetricError::InvalidArgument { .. })));
        assert!(!undertest.cooccurrence().is_fit());
    }

    #[test]
    fn should_reset_popularity_on_refit() {
        let mut refitted = fitted();
        refitted.fit(&[5, 5, 6]).unwrap();
        let mut single = Serendipity::<u64>::new(&ALL_ITEMS).unwrap();
        single.fit(&[5, 5, 6]).unwrap();
        assert_eq!(single.popularity().top_items(10), refitted.popularity().top_items(10));
        assert_eq!(0, refitted.popularity().count(0));
    }

    #[test]
    fn should_be_idempotent() {
        let undertest = fitted();
        let first = undertest.compute_itemwise(&[6, 1, 7, 2], &[6, 7], 4).unwrap();
        let second = undertest.compute_itemwise(&[6, 1, 7, 2], &[6, 7], 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn should_map_string_items() {
        let items = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect_vec();
        let mut undertest: Serendipity<String, String> = Serendipity::new(&items).unwrap();
        undertest.fit(&[items[0].clone(), items[0].clone()]).unwrap();
        let score = undertest
            .compute(&[items[3].clone(), items[0].clone()], &[items[3].clone()], 2)
            .unwrap();
        assert!(approx_eq!(f64, 0.5, score));
    }

    #[test]
    fn should_weight_sustained_hits_in_order_aware_variant() {
        let mut undertest = OrderAwareSerendipity::<u64>::new(&ALL_ITEMS).unwrap();
        undertest.fit(&INTERACTIONS).unwrap();
        // position 0: hit, discount 1, p 0, weight 1/1
        // position 1: miss
        // position 2: hit, discount 1/3, p 0, weight 2/3
        let outcome = undertest
            .compute_itemwise(&[6, 5, 7, 8], &[6, 7], 4)
            .unwrap();
        assert!(approx_eq!(f64, 1.0, outcome.itemwise[&6]));
        assert!(approx_eq!(f64, 0.0, outcome.itemwise[&5]));
        assert!(approx_eq!(f64, 2.0 / 9.0, outcome.itemwise[&7], epsilon = 1e-12));
        assert!(approx_eq!(
            f64,
            (1.0 + 2.0 / 9.0) / 4.0,
            outcome.serendipity,
            epsilon = 1e-12
        ));
        assert_eq!("OrderAwareSerendipity@4", undertest.get_name(4));
    }

    #[test]
    fn should_score_zero_without_hits_in_order_aware_variant() {
        let mut undertest = OrderAwareSerendipity::<u64>::new(&ALL_ITEMS).unwrap();
        undertest.fit(&INTERACTIONS).unwrap();
        assert!(approx_eq!(f64, 0.0, undertest.compute(&[5, 8], &[6, 7], 2).unwrap()));
        assert!(undertest.compute(&[5, 8], &[6], 1).is_err());
    }
}
