use crate::errors::Result;
use crate::metrics::RankingMetric;

pub type BoxedMetric<I> = Box<dyn RankingMetric<I> + Send + Sync>;

/// Averages a set of metrics over many evaluated recommendation lists.
pub struct EvaluationReporter<I> {
    metrics: Vec<BoxedMetric<I>>,
    sum_of_scores: Vec<f64>,
    qty: usize,
    length: usize,
}

impl<I> EvaluationReporter<I> {
    pub fn new(metrics: Vec<BoxedMetric<I>>, length: usize) -> EvaluationReporter<I> {
        let sum_of_scores = vec![0_f64; metrics.len()];
        EvaluationReporter {
            metrics,
            sum_of_scores,
            qty: 0,
            length,
        }
    }

    /// Scores one list with every metric without recording anything.
    pub fn evaluate(&self, recommendations: &[I], interaction_history: &[I]) -> Result<Vec<f64>> {
        self.metrics
            .iter()
            .map(|metric| metric.compute(recommendations, interaction_history, self.length))
            .collect()
    }

    /// Records the scores of one list. Nothing is recorded when any metric fails.
    pub fn add(&mut self, recommendations: &[I], interaction_history: &[I]) -> Result<()> {
        let scores = self.evaluate(recommendations, interaction_history)?;
        self.add_scores(&scores);
        Ok(())
    }

    /// Records scores obtained from [`EvaluationReporter::evaluate`], e.g. on another thread.
    pub fn add_scores(&mut self, scores: &[f64]) {
        for (sum, score) in self.sum_of_scores.iter_mut().zip(scores) {
            *sum += score;
        }
        self.qty += 1;
    }

    pub fn results(&self) -> Vec<f64> {
        self.sum_of_scores
            .iter()
            .map(|sum| {
                if self.qty > 0 {
                    sum / self.qty as f64
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn result(&self) -> String {
        self.results()
            .iter()
            .map(|score| format!("{:.4}", score))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn get_name(&self) -> String {
        self.metrics
            .iter()
            .map(|metric| metric.get_name(self.length))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn qty(&self) -> usize {
        self.qty
    }
}

#[cfg(test)]
mod evaluation_reporter_test {
    use super::*;
    use crate::item_index::ItemIndex;
    use crate::metrics::mrr::Mrr;
    use crate::metrics::precision::Precision;
    use crate::metrics::serendipity::Serendipity;
    use std::sync::Arc;

    fn reporter() -> EvaluationReporter<u64> {
        let items: Vec<u64> = (1..=10).collect();
        let item_index = Arc::new(ItemIndex::new(&items).unwrap());
        let metrics: Vec<BoxedMetric<u64>> = vec![
            Box::new(Precision::new(item_index.clone())),
            Box::new(Mrr::new(item_index.clone())),
            Box::new(Serendipity::<u64>::with_index(item_index, Default::default())),
        ];
        EvaluationReporter::new(metrics, 2)
    }

    #[test]
    fn should_average_over_lists() {
        let mut undertest = reporter();
        undertest.add(&[1, 2], &[1]).unwrap();
        undertest.add(&[3, 4], &[4]).unwrap();
        assert_eq!(2, undertest.qty());
        assert_eq!("Precision@2,Mrr@2,Serendipity@2", undertest.get_name());
        // precision 0.5 and 0.5, mrr 1 and 0.5, serendipity 0.5 and 0
        assert_eq!("0.5000,0.7500,0.2500", undertest.result());
    }

    #[test]
    fn should_not_record_failed_lists() {
        let mut undertest = reporter();
        assert!(undertest.add(&[1, 99], &[1]).is_err());
        assert_eq!(0, undertest.qty());
        assert_eq!("0.0000,0.0000,0.0000", undertest.result());
    }
}
