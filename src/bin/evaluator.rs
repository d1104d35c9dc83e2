use std::sync::Arc;

use anyhow::{bail, Context};
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beyond_accuracy::clustering::KMeans;
use beyond_accuracy::config::AppConfig;
use beyond_accuracy::io::{self, ItemId, UserId};
use beyond_accuracy::item_index::ItemIndex;
use beyond_accuracy::metrics::cluster_serendipity::ClusterSerendipity;
use beyond_accuracy::metrics::evaluation_reporter::{BoxedMetric, EvaluationReporter};
use beyond_accuracy::metrics::hitrate::HitRate;
use beyond_accuracy::metrics::mrr::Mrr;
use beyond_accuracy::metrics::ndcg::Ndcg;
use beyond_accuracy::metrics::precision::Precision;
use beyond_accuracy::metrics::recall::Recall;
use beyond_accuracy::metrics::serendipity::{OrderAwareSerendipity, Serendipity};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_default();
    let config = AppConfig::new(&config_path).context("Loading configuration failed.")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log.level))
        .init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.runtime.num_workers)
        .build_global()
        .context("Unable to start the worker pool.")?;

    let k = config.metrics.k;
    if k < 2 {
        bail!("metrics.k must be at least 2 for the serendipity metrics, got {}", k);
    }

    let training_data_path = &config.data.training_data_path;
    let interactions = io::read_interactions(training_data_path)
        .with_context(|| format!("Unable to load training data {}", training_data_path))?;
    let evaluations = io::read_evaluations(&config.data.predictions_path)
        .with_context(|| format!("Unable to load predictions {}", config.data.predictions_path))?;
    info!(
        qty_interactions = interactions.len(),
        qty_evaluations = evaluations.len(),
        "loaded input data"
    );

    // The item universe covers everything that was interacted with or recommended.
    let all_items: Vec<ItemId> = interactions
        .iter()
        .map(|(_user_id, item_id)| *item_id)
        .chain(
            evaluations
                .iter()
                .flat_map(|(recos, history)| recos.iter().chain(history.iter()).copied()),
        )
        .collect();
    let item_index = Arc::new(ItemIndex::new(&all_items)?);

    let training_items: Vec<ItemId> = interactions.iter().map(|(_user_id, item_id)| *item_id).collect();
    let (users, items_per_user) = io::group_by_user(&interactions);

    let mut serendipity =
        Serendipity::<ItemId, UserId>::with_index(item_index.clone(), config.metrics.fit_policy);
    serendipity.fit(&training_items)?;
    serendipity.fit_user_interactions(&users, &items_per_user)?;

    let mut order_aware_serendipity =
        OrderAwareSerendipity::<ItemId, UserId>::with_index(item_index.clone(), config.metrics.fit_policy);
    order_aware_serendipity.fit(&training_items)?;
    info!(
        qty_items = item_index.len(),
        qty_users = users.len(),
        "fitted serendipity metrics"
    );

    let metrics: Vec<BoxedMetric<ItemId>> = vec![
        Box::new(Precision::new(item_index.clone())),
        Box::new(Recall::new(item_index.clone())),
        Box::new(HitRate::new(item_index.clone())),
        Box::new(Mrr::new(item_index.clone())),
        Box::new(Ndcg::new(item_index.clone())),
        Box::new(serendipity),
        Box::new(order_aware_serendipity),
    ];
    let mut reporter = EvaluationReporter::new(metrics, k);

    let progress = ProgressBar::new(evaluations.len() as u64);
    let scores: Vec<Vec<f64>> = evaluations
        .par_iter()
        .map(|(recos, history)| {
            let scores = reporter.evaluate(recos, history);
            progress.inc(1);
            scores
        })
        .collect::<beyond_accuracy::Result<_>>()?;
    progress.finish_and_clear();
    scores.iter().for_each(|list_scores| reporter.add_scores(list_scores));

    println!("===============================================================");
    println!("===               START EVALUATING TEST FILE               ====");
    println!("===============================================================");
    println!("{}", reporter.get_name());
    println!("{}", reporter.result());
    println!("Qty test evaluations: {}", reporter.qty());

    if let Some(embeddings_path) = &config.data.embeddings_path {
        let embeddings = io::read_embeddings(embeddings_path)
            .with_context(|| format!("Unable to load embeddings {}", embeddings_path))?;
        let (recommendations, histories): (Vec<Vec<ItemId>>, Vec<Vec<ItemId>>) =
            evaluations.into_iter().unzip();
        let clusterer = KMeans::new(config.clustering.seed, config.clustering.max_iterations);
        let score = ClusterSerendipity::new(clusterer)
            .compute_batch(&histories, &recommendations, &embeddings, k)?;
        println!("ClusterSerendipity@{}", k);
        println!("{:.4}", score);
    }
    Ok(())
}
