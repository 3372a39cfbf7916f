//! Majority-Vote Inference Engine

use crate::model::{DecisionNode, Ensemble, Tree, MAX_TREE_DEPTH};
use crate::InferenceError;
use data_validator::FeatureVector;
use serde::Serialize;
use tracing::{debug, error};

/// Outcome of classifying one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Winning class label
    pub label: u32,
    /// Votes per class, aligned with the ensemble's class labels
    pub vote_counts: Vec<u32>,
    /// Number of trees that voted
    pub tree_count: usize,
    /// Mean normalised leaf weights, present when every reached leaf has them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

impl PredictionResult {
    /// Share of trees that voted for the winning label
    pub fn confidence(&self) -> f64 {
        let winner = self.vote_counts.iter().copied().max().unwrap_or(0);
        if self.tree_count == 0 {
            0.0
        } else {
            f64::from(winner) / self.tree_count as f64
        }
    }
}

/// Stateless tree-ensemble evaluator.
///
/// Holds no data of its own, so one instance can be shared freely across
/// request handlers and worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceEngine;

impl InferenceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Classify a sample by majority vote over all trees.
    ///
    /// Ties go to the lowest class label.
    pub fn classify(
        &self,
        ensemble: &Ensemble,
        features: &FeatureVector,
    ) -> Result<PredictionResult, InferenceError> {
        let classes = ensemble.classes();
        let mut vote_counts = vec![0u32; classes.len()];
        let mut weight_sums = vec![0.0f64; classes.len()];
        let mut all_weighted = true;

        for (index, tree) in ensemble.trees().iter().enumerate() {
            let (class, votes) = self.traverse(index, tree, features).inspect_err(|e| {
                error!(error = %e, "Inference contract violated");
            })?;

            let slot = ensemble
                .class_index(class)
                .ok_or(InferenceError::UnknownClass { tree: index, class })?;
            vote_counts[slot] += 1;

            match votes.map(normalise) {
                Some(Some(weights)) if all_weighted => {
                    for (sum, w) in weight_sums.iter_mut().zip(weights) {
                        *sum += w;
                    }
                }
                _ => all_weighted = false,
            }
        }

        let tree_count = ensemble.tree_count();
        // First maximum wins, and labels are ascending, so ties resolve low.
        let winner = vote_counts
            .iter()
            .enumerate()
            .fold(0, |best, (i, &count)| if count > vote_counts[best] { i } else { best });

        let probabilities = all_weighted.then(|| {
            weight_sums
                .into_iter()
                .map(|sum| sum / tree_count as f64)
                .collect()
        });

        let result = PredictionResult {
            label: classes[winner],
            vote_counts,
            tree_count,
            probabilities,
        };
        debug!(
            label = result.label,
            votes = ?result.vote_counts,
            confidence = result.confidence(),
            "Classification complete"
        );
        Ok(result)
    }

    /// Walk one tree to its leaf
    fn traverse<'a>(
        &self,
        index: usize,
        tree: &'a Tree,
        features: &FeatureVector,
    ) -> Result<(u32, Option<&'a [f64]>), InferenceError> {
        let mut node = &tree.root;
        let mut depth = 0;

        loop {
            match node {
                DecisionNode::Leaf { class, votes } => return Ok((*class, votes.as_deref())),
                DecisionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).ok_or(InferenceError::FeatureOutOfRange {
                        tree: index,
                        feature: *feature,
                        len: features.as_array().len(),
                    })?;

                    node = if value <= *threshold { left.as_ref() } else { right.as_ref() };
                    depth += 1;
                    if depth > MAX_TREE_DEPTH {
                        return Err(InferenceError::DepthExceeded {
                            tree: index,
                            depth: MAX_TREE_DEPTH,
                        });
                    }
                }
            }
        }
    }
}

/// Scale leaf weights to sum to one; `None` for an all-zero leaf
fn normalise(weights: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    (total > 0.0).then(|| weights.iter().map(|w| w / total).collect())
}
