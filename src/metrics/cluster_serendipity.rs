use std::fmt::Debug;
use std::hash::Hash;

use hashbrown::HashSet;
use tracing::{debug, warn};

use crate::clustering::{centroids, cluster_count, Clusterer, KMeans};
use crate::embeddings::ItemEmbeddings;
use crate::errors::{MetricError, Result};
use crate::metrics::ensure_positive_k;

/// Two-level grouping of items: items into clusters, clusters into super-clusters.
#[derive(Debug, Clone)]
pub struct ClusterHierarchy {
    item_clusters: Vec<usize>,
    cluster_super_clusters: Vec<usize>,
    super_cluster_sizes: Vec<usize>,
}

impl ClusterHierarchy {
    /// Super-cluster of the item at `item_index`.
    pub fn super_cluster_of(&self, item_index: usize) -> usize {
        self.cluster_super_clusters[self.item_clusters[item_index]]
    }

    /// Number of items in a super-cluster.
    pub fn super_cluster_size(&self, super_cluster: usize) -> usize {
        self.super_cluster_sizes[super_cluster]
    }

    pub fn qty_clusters(&self) -> usize {
        self.cluster_super_clusters.len()
    }

    pub fn qty_super_clusters(&self) -> usize {
        self.super_cluster_sizes.len()
    }
}

/// Serendipity as the share of relevant super-clusters a recommendation list reaches.
///
/// Items are clustered into `round(sqrt(items))` clusters, whose centroids are
/// clustered again into `round(sqrt(clusters))` super-clusters. A user's relevant
/// super-clusters are those containing any item of their history.
pub struct ClusterSerendipity<C = KMeans> {
    clusterer: C,
}

impl Default for ClusterSerendipity<KMeans> {
    fn default() -> Self {
        ClusterSerendipity::new(KMeans::default())
    }
}

impl<C: Clusterer> ClusterSerendipity<C> {
    pub fn new(clusterer: C) -> ClusterSerendipity<C> {
        ClusterSerendipity { clusterer }
    }

    pub fn cluster_hierarchy<I>(&self, embeddings: &ItemEmbeddings<I>) -> Result<ClusterHierarchy>
    where
        I: Ord + Hash + Clone + Debug,
    {
        let vectors = embeddings.vectors();
        let n_clusters = cluster_count(vectors.len());
        let labels = self.clusterer.cluster(vectors, n_clusters)?;
        let (cluster_centroids, item_clusters) = centroids(vectors, &labels, n_clusters)?;
        if cluster_centroids.len() < n_clusters {
            warn!(
                requested = n_clusters,
                non_empty = cluster_centroids.len(),
                "clusterer left clusters empty, dropping them"
            );
        }

        let n_super_clusters = cluster_count(cluster_centroids.len());
        let super_labels = self.clusterer.cluster(&cluster_centroids, n_super_clusters)?;
        let (super_centroids, cluster_super_clusters) =
            centroids(&cluster_centroids, &super_labels, n_super_clusters)?;

        let mut super_cluster_sizes = vec![0; super_centroids.len()];
        for &cluster in &item_clusters {
            super_cluster_sizes[cluster_super_clusters[cluster]] += 1;
        }
        debug!(
            qty_items = vectors.len(),
            qty_clusters = cluster_centroids.len(),
            qty_super_clusters = super_centroids.len(),
            "built cluster hierarchy"
        );
        Ok(ClusterHierarchy {
            item_clusters,
            cluster_super_clusters,
            super_cluster_sizes,
        })
    }

    /// Mean per-user share of reached relevant super-clusters.
    ///
    /// # Arguments
    ///
    /// * `histories` - the items each user interacted with.
    /// * `recommendations` - the recommendation list of each user, same order as `histories`.
    /// * `embeddings` - a vector for every item that appears in either input.
    /// * `k` - the number of recommendations to consider.
    ///
    pub fn compute_batch<I>(
        &self,
        histories: &[Vec<I>],
        recommendations: &[Vec<I>],
        embeddings: &ItemEmbeddings<I>,
        k: usize,
    ) -> Result<f64>
    where
        I: Ord + Hash + Clone + Debug,
    {
        ensure_positive_k(k)?;
        if histories.len() != recommendations.len() {
            return Err(MetricError::invalid_argument(format!(
                "got {} histories but {} recommendation lists",
                histories.len(),
                recommendations.len()
            )));
        }
        if histories.is_empty() {
            return Ok(0.0);
        }
        let index = embeddings.index();
        let mapped_histories: Vec<Vec<usize>> = histories
            .iter()
            .map(|history| index.map_items(history))
            .collect::<Result<_>>()?;
        let mapped_recommendations: Vec<Vec<usize>> = recommendations
            .iter()
            .map(|recos| index.map_items(&recos[..k.min(recos.len())]))
            .collect::<Result<_>>()?;

        let hierarchy = self.cluster_hierarchy(embeddings)?;
        let sum_of_scores: f64 = mapped_histories
            .iter()
            .zip(&mapped_recommendations)
            .map(|(history, recos)| user_score(&hierarchy, history, recos, k))
            .sum();
        Ok(sum_of_scores / histories.len() as f64)
    }
}

fn user_score(hierarchy: &ClusterHierarchy, history: &[usize], top_recos: &[usize], k: usize) -> f64 {
    let relevant: HashSet<usize> = history
        .iter()
        .map(|&item| hierarchy.super_cluster_of(item))
        .collect();
    let qty_relevant_items: usize = relevant
        .iter()
        .map(|&super_cluster| hierarchy.super_cluster_size(super_cluster))
        .sum();

    let reached: HashSet<usize> = top_recos
        .iter()
        .map(|&item| hierarchy.super_cluster_of(item))
        .filter(|super_cluster| relevant.contains(super_cluster))
        .collect();

    let denominator = qty_relevant_items.min(k);
    if denominator == 0 {
        0.0
    } else {
        reached.len() as f64 / denominator as f64
    }
}

/// Cluster-based serendipity with the default seeded k-means.
pub fn cluster_based_serendipity<I>(
    histories: &[Vec<I>],
    recommendations: &[Vec<I>],
    embeddings: &ItemEmbeddings<I>,
    k: usize,
) -> Result<f64>
where
    I: Ord + Hash + Clone + Debug,
{
    ClusterSerendipity::<KMeans>::default().compute_batch(histories, recommendations, embeddings, k)
}

#[cfg(test)]
mod cluster_serendipity_test {
    use super::*;
    use float_cmp::approx_eq;

    fn embeddings() -> ItemEmbeddings<u64> {
        ItemEmbeddings::new(
            vec![1, 2, 3, 4, 5, 6, 7],
            vec![
                vec![0.1, 0.2],
                vec![0.2, 0.1],
                vec![0.3, 0.4],
                vec![0.4, 0.3],
                vec![0.5, 0.6],
                vec![0.6, 0.5],
                vec![0.7, 0.8],
            ],
        )
        .unwrap()
    }

    fn histories() -> Vec<Vec<u64>> {
        vec![vec![1, 2], vec![3, 4], vec![5, 6]]
    }

    fn recommendations() -> Vec<Vec<u64>> {
        vec![vec![1, 3, 5], vec![2, 4, 6], vec![1, 2, 3]]
    }

    #[test]
    fn should_score_single_super_cluster() {
        let all_in_one = |points: &[Vec<f64>], _n: usize| vec![0_usize; points.len()];
        let undertest = ClusterSerendipity::new(all_in_one);
        let hierarchy = undertest.cluster_hierarchy(&embeddings()).unwrap();
        assert_eq!(1, hierarchy.qty_super_clusters());
        assert_eq!(7, hierarchy.super_cluster_size(0));
        // one reached super-cluster out of min(7, 2)
        let score = undertest
            .compute_batch(&histories(), &recommendations(), &embeddings(), 2)
            .unwrap();
        assert!(approx_eq!(f64, 0.5, score));
    }

    #[test]
    fn should_count_distinct_reached_super_clusters() {
        // level one: [0, 1, 2, 2, 2, 2, 2], level two: clusters [0] and [1, 2]
        let by_position = |points: &[Vec<f64>], n: usize| {
            (0..points.len()).map(|position| position.min(n - 1)).collect::<Vec<_>>()
        };
        let undertest = ClusterSerendipity::new(by_position);
        let hierarchy = undertest.cluster_hierarchy(&embeddings()).unwrap();
        assert_eq!(3, hierarchy.qty_clusters());
        assert_eq!(1, hierarchy.super_cluster_size(0));
        assert_eq!(6, hierarchy.super_cluster_size(1));

        let score = undertest
            .compute_batch(&histories(), &recommendations(), &embeddings(), 2)
            .unwrap();
        assert!(approx_eq!(f64, (1.0 + 0.5 + 0.5) / 3.0, score));
    }

    #[test]
    fn should_score_empty_history_as_zero() {
        let undertest = ClusterSerendipity::<KMeans>::default();
        let score = undertest
            .compute_batch(&[vec![]], &[vec![1, 2]], &embeddings(), 2)
            .unwrap();
        assert!(approx_eq!(f64, 0.0, score));
    }

    #[test]
    fn should_run_with_default_kmeans() {
        let score =
            cluster_based_serendipity(&histories(), &recommendations(), &embeddings(), 2).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn should_reject_invalid_batches() {
        let undertest = ClusterSerendipity::<KMeans>::default();
        assert!(undertest
            .compute_batch(&histories(), &recommendations()[..2], &embeddings(), 2)
            .is_err());
        assert!(undertest
            .compute_batch(&histories(), &recommendations(), &embeddings(), 0)
            .is_err());
        assert!(matches!(
            undertest.compute_batch(&[vec![1]], &[vec![99]], &embeddings(), 2),
            Err(MetricError::UnknownItem { .. })
        ));
        assert!(approx_eq!(
            f64,
            0.0,
            undertest
                .compute_batch(&[], &[], &embeddings(), 2)
                .unwrap()
        ));
    }

    #[test]
    fn should_reject_out_of_range_labels() {
        let broken = |points: &[Vec<f64>], n: usize| vec![n; points.len()];
        let undertest = ClusterSerendipity::new(broken);
        assert!(matches!(
            undertest.cluster_hierarchy(&embeddings()),
            Err(MetricError::InvalidArgument { .. })
        ));
    }
}
