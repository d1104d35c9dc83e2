//! Clustering of dense vectors into a fixed number of groups.
//!
//! The cluster-based serendipity scorer only relies on the [`Clusterer`] trait.
//! [`KMeans`] is the default implementation; any closure with the signature
//! `Fn(&[Vec<f64>], usize) -> Vec<usize>` can be plugged in as well.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::debug;

use crate::errors::{MetricError, Result};

const DEFAULT_SEED: u64 = 42;
const DEFAULT_MAX_ITERATIONS: usize = 300;

pub trait Clusterer {
    /// Returns one label in `0..n_clusters` per point.
    fn cluster(&self, points: &[Vec<f64>], n_clusters: usize) -> Result<Vec<usize>>;
}

impl<F> Clusterer for F
where
    F: Fn(&[Vec<f64>], usize) -> Vec<usize>,
{
    fn cluster(&self, points: &[Vec<f64>], n_clusters: usize) -> Result<Vec<usize>> {
        Ok(self(points, n_clusters))
    }
}

/// Lloyd's k-means with k-means++ seeding.
///
/// Seeding draws from a `Pcg64` stream initialised with `seed`, so the same
/// input always yields the same labels.
#[derive(Debug, Clone)]
pub struct KMeans {
    seed: u64,
    max_iterations: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        KMeans::new(DEFAULT_SEED, DEFAULT_MAX_ITERATIONS)
    }
}

impl KMeans {
    pub fn new(seed: u64, max_iterations: usize) -> KMeans {
        KMeans {
            seed,
            max_iterations: max_iterations.max(1),
        }
    }

    fn initial_centroids(&self, points: &[Vec<f64>], n_clusters: usize) -> Vec<Vec<f64>> {
        let mut rng = Pcg64::seed_from_u64(self.seed);
        let mut centroids = Vec::with_capacity(n_clusters);
        centroids.push(points[rng.gen_range(0..points.len())].clone());

        let mut min_distances = vec![f64::MAX; points.len()];
        while centroids.len() < n_clusters {
            let last_centroid = &centroids[centroids.len() - 1];
            for (point, min_distance) in points.iter().zip(min_distances.iter_mut()) {
                *min_distance = min_distance.min(squared_distance(point, last_centroid));
            }
            let total: f64 = min_distances.iter().sum();
            let next = if total > 0.0 {
                // pick proportional to the squared distance to the closest centroid
                let mut target = rng.gen::<f64>() * total;
                let mut chosen = points.len() - 1;
                for (position, distance) in min_distances.iter().enumerate() {
                    if target < *distance {
                        chosen = position;
                        break;
                    }
                    target -= distance;
                }
                chosen
            } else {
                rng.gen_range(0..points.len())
            };
            centroids.push(points[next].clone());
        }
        centroids
    }
}

impl Clusterer for KMeans {
    fn cluster(&self, points: &[Vec<f64>], n_clusters: usize) -> Result<Vec<usize>> {
        if points.is_empty() {
            return Err(MetricError::invalid_argument("cannot cluster an empty set of points"));
        }
        if n_clusters == 0 {
            return Err(MetricError::invalid_argument("the number of clusters must be at least 1"));
        }
        let dimension = points[0].len();
        if points.iter().any(|point| point.len() != dimension) {
            return Err(MetricError::invalid_argument("all points need the same dimension"));
        }
        if n_clusters >= points.len() {
            return Ok((0..points.len()).collect());
        }

        let mut centroids = self.initial_centroids(points, n_clusters);
        let mut labels = vec![usize::MAX; points.len()];
        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            let mut changed = false;
            for (point, label) in points.iter().zip(labels.iter_mut()) {
                let nearest = nearest_centroid(point, &centroids);
                if nearest != *label {
                    *label = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }

            let mut sums = vec![vec![0.0; dimension]; n_clusters];
            let mut counts = vec![0_usize; n_clusters];
            for (point, &label) in points.iter().zip(labels.iter()) {
                counts[label] += 1;
                for (sum, value) in sums[label].iter_mut().zip(point) {
                    *sum += value;
                }
            }
            for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
                // an empty cluster keeps its previous centroid
                if count > 0 {
                    *centroid = sum.into_iter().map(|value| value / count as f64).collect();
                }
            }
        }
        debug!(
            qty_points = points.len(),
            n_clusters, iterations, "k-means finished"
        );
        Ok(labels)
    }
}

fn squared_distance(left: &[f64], right: &[f64]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut nearest = 0;
    let mut nearest_distance = f64::MAX;
    for (position, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < nearest_distance {
            nearest = position;
            nearest_distance = distance;
        }
    }
    nearest
}

/// Mean vector of every non-empty cluster.
///
/// Returns the centroids ordered by ascending label together with, per point,
/// the position of its cluster in that order.
pub fn centroids(points: &[Vec<f64>], labels: &[usize], n_clusters: usize) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    if points.len() != labels.len() {
        return Err(MetricError::invalid_argument(format!(
            "got {} points but {} cluster labels",
            points.len(),
            labels.len()
        )));
    }
    if let Some(invalid) = labels.iter().find(|&&label| label >= n_clusters) {
        return Err(MetricError::invalid_argument(format!(
            "cluster label {} is outside 0..{}",
            invalid, n_clusters
        )));
    }
    let dimension = points.first().map_or(0, |point| point.len());
    let mut sums = vec![vec![0.0; dimension]; n_clusters];
    let mut counts = vec![0_usize; n_clusters];
    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += value;
        }
    }

    let mut compacted = vec![usize::MAX; n_clusters];
    let mut means = Vec::new();
    for (label, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
        if count > 0 {
            compacted[label] = means.len();
            means.push(sum.into_iter().map(|value| value / count as f64).collect());
        }
    }
    let assignments = labels.iter().map(|&label| compacted[label]).collect();
    Ok((means, assignments))
}

/// `round(sqrt(qty))`, but never less than one cluster.
pub fn cluster_count(qty: usize) -> usize {
    ((qty as f64).sqrt().round() as usize).max(1)
}
