pub mod cluster;
pub mod rules;

use crate::baseline::{BaselineError, CorpusBaseline};
use crate::record::{Mood, RawFeatureRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub use cluster::ClusterClassifier;
pub use rules::RuleClassifier;

#[derive(Error, Debug, PartialEq)]
pub enum MoodError {
    #[error(transparent)]
    Baseline(#[from] BaselineError),
    #[error("Cluster count must be between 4 and 6, got {0}")]
    ClusterCount(usize),
}

/// Assigns exactly one mood to every track in a batch.
///
/// Classification runs on the whole batch at once: the clustering strategy
/// needs every record before it can label any of them.
pub trait MoodClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(
        &self,
        records: &BTreeMap<String, RawFeatureRecord>,
        baseline: &CorpusBaseline,
    ) -> Result<BTreeMap<String, Mood>, MoodError>;
}

/// Which mood classifier to run. Rules are the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodStrategy {
    /// Fixed-priority threshold rules against the corpus baseline.
    #[default]
    Rules,
    /// Seeded k-means over standardized features, centroids named by heuristics.
    Clusters,
}

/// Mood classifier settings (`[mood]` in the config file).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    pub strategy: MoodStrategy,
    /// Number of k-means clusters, 4..=6.
    pub clusters: usize,
    /// Seed for centroid initialization.
    pub seed: u64,
    /// Lloyd iteration cap.
    pub max_iterations: usize,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            strategy: MoodStrategy::Rules,
            clusters: 5,
            seed: 42,
            max_iterations: 300,
        }
    }
}

impl MoodConfig {
    /// Build the configured classifier.
    pub fn build(&self) -> Result<Box<dyn MoodClassifier>, MoodError> {
        match self.strategy {
            MoodStrategy::Rules => Ok(Box::new(RuleClassifier)),
            MoodStrategy::Clusters => Ok(Box::new(
                ClusterClassifier::new(self.clusters, self.seed)?
                    .with_max_iterations(self.max_iterations),
            )),
        }
    }
}
