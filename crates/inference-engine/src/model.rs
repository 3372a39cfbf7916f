//! Tree Ensemble Model

use crate::LoadError;
use data_validator::FEATURE_COUNT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deepest root-to-leaf path an ensemble may contain
pub const MAX_TREE_DEPTH: usize = 64;

/// A node of a decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionNode {
    /// Compare one feature against a threshold; `<=` goes left
    Split {
        feature: usize,
        threshold: f64,
        left: Box<DecisionNode>,
        right: Box<DecisionNode>,
    },
    /// Terminal node voting for one class
    Leaf {
        class: u32,
        /// Training samples per class that reached this leaf
        #[serde(default, skip_serializing_if = "Option::is_none")]
        votes: Option<Vec<f64>>,
    },
}

impl DecisionNode {
    /// Leaf without vote weights
    pub fn leaf(class: u32) -> Self {
        DecisionNode::Leaf { class, votes: None }
    }

    /// Split node
    pub fn split(feature: usize, threshold: f64, left: DecisionNode, right: DecisionNode) -> Self {
        DecisionNode::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// One decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub root: DecisionNode,
}

impl Tree {
    pub fn new(root: DecisionNode) -> Self {
        Self { root }
    }

    /// Length of the longest root-to-leaf path, counted in edges
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(&self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            match node {
                DecisionNode::Leaf { .. } => max_depth = max_depth.max(depth),
                DecisionNode::Split { left, right, .. } => {
                    stack.push((left.as_ref(), depth + 1));
                    stack.push((right.as_ref(), depth + 1));
                }
            }
        }
        max_depth
    }

    /// Total number of nodes
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            count += 1;
            if let DecisionNode::Split { left, right, .. } = node {
                stack.push(left.as_ref());
                stack.push(right.as_ref());
            }
        }
        count
    }

    /// Check one tree against the ensemble's feature space and label set
    fn validate(&self, index: usize, classes: &[u32]) -> Result<(), LoadError> {
        let mut stack = vec![(&self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if depth > MAX_TREE_DEPTH {
                return Err(LoadError::SchemaMismatch(format!(
                    "tree {} deeper than {} levels",
                    index, MAX_TREE_DEPTH
                )));
            }

            match node {
                DecisionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(LoadError::SchemaMismatch(format!(
                            "tree {} splits on feature {} but only {} features exist",
                            index, feature, FEATURE_COUNT
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(LoadError::SchemaMismatch(format!(
                            "tree {} has non-finite threshold {}",
                            index, threshold
                        )));
                    }
                    stack.push((left.as_ref(), depth + 1));
                    stack.push((right.as_ref(), depth + 1));
                }
                DecisionNode::Leaf { class, votes } => {
                    if !classes.contains(class) {
                        return Err(LoadError::SchemaMismatch(format!(
                            "tree {} has leaf class {} outside label set {:?}",
                            index, class, classes
                        )));
                    }
                    if let Some(votes) = votes {
                        validate_votes(index, votes, classes.len())?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_votes(tree: usize, votes: &[f64], class_count: usize) -> Result<(), LoadError> {
    if votes.len() != class_count {
        return Err(LoadError::SchemaMismatch(format!(
            "tree {} leaf has {} vote weights for {} classes",
            tree,
            votes.len(),
            class_count
        )));
    }
    if votes.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(LoadError::SchemaMismatch(format!(
            "tree {} leaf has negative or non-finite vote weights",
            tree
        )));
    }
    Ok(())
}

/// Immutable, validated collection of decision trees.
///
/// Instances only exist after [`Ensemble::new`] has checked every tree, so
/// inference can rely on feature indices and leaf classes being in range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ensemble {
    classes: Vec<u32>,
    trees: Vec<Tree>,
    metadata: BTreeMap<String, String>,
}

impl Ensemble {
    /// Validate and assemble an ensemble
    pub fn new(classes: Vec<u32>, trees: Vec<Tree>) -> Result<Self, LoadError> {
        if classes.is_empty() {
            return Err(LoadError::SchemaMismatch("empty class label set".to_string()));
        }
        if classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LoadError::SchemaMismatch(format!(
                "class labels {:?} must be sorted and unique",
                classes
            )));
        }
        if trees.is_empty() {
            return Err(LoadError::SchemaMismatch("ensemble has no trees".to_string()));
        }

        for (i, tree) in trees.iter().enumerate() {
            tree.validate(i, &classes)?;
        }

        Ok(Self {
            classes,
            trees,
            metadata: BTreeMap::new(),
        })
    }

    /// Attach free-form artifact metadata
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Class labels, ascending
    pub fn classes(&self) -> &[u32] {
        &self.classes
    }

    /// Position of a label in [`Ensemble::classes`]
    #[inline]
    pub fn class_index(&self, class: u32) -> Option<usize> {
        self.classes.binary_search(&class).ok()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Number of features every tree indexes into
    pub fn n_features(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Deepest tree in the ensemble
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64) -> Tree {
        Tree::new(DecisionNode::split(
            feature,
            threshold,
            DecisionNode::leaf(0),
            DecisionNode::leaf(1),
        ))
    }

    #[test]
    fn test_valid_ensemble() {
        let ensemble = Ensemble::new(vec![0, 1], vec![stump(0, 7.0), stump(4, 330.0)]).unwrap();
        assert_eq!(ensemble.tree_count(), 2);
        assert_eq!(ensemble.class_index(1), Some(1));
        assert_eq!(ensemble.class_index(2), None);
        assert_eq!(ensemble.max_depth(), 1);
    }

    #[test]
    fn test_empty_ensemble_rejected() {
        let err = Ensemble::new(vec![0, 1], vec![]).unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch(_)));
    }

    #[test]
    fn test_feature_out_of_range_rejected() {
        let err = Ensemble::new(vec![0, 1], vec![stump(FEATURE_COUNT, 1.0)]).unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch(_)));
    }

    #[test]
    fn test_unknown_leaf_class_rejected() {
        let tree = Tree::new(DecisionNode::leaf(2));
        assert!(Ensemble::new(vec![0, 1], vec![tree]).is_err());
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        assert!(Ensemble::new(vec![0, 1], vec![stump(0, f64::NAN)]).is_err());
    }

    #[test]
    fn test_unsorted_classes_rejected() {
        assert!(Ensemble::new(vec![1, 0], vec![stump(0, 1.0)]).is_err());
    }

    #[test]
    fn test_vote_weights_checked() {
        let bad = Tree::new(DecisionNode::Leaf {
            class: 0,
            votes: Some(vec![1.0]),
        });
        assert!(Ensemble::new(vec![0, 1], vec![bad]).is_err());

        let negative = Tree::new(DecisionNode::Leaf {
            class: 0,
            votes: Some(vec![-1.0, 2.0]),
        });
        assert!(Ensemble::new(vec![0, 1], vec![negative]).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut node = DecisionNode::leaf(0);
        for _ in 0..=MAX_TREE_DEPTH {
            node = DecisionNode::split(0, 1.0, node, DecisionNode::leaf(1));
        }
        let tree = Tree::new(node);
        assert_eq!(tree.depth(), MAX_TREE_DEPTH + 1);
        assert!(Ensemble::new(vec![0, 1], vec![tree]).is_err());
    }

    #[test]
    fn test_node_count() {
        assert_eq!(stump(0, 1.0).node_count(), 3);
    }
}
