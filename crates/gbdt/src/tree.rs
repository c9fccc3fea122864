//! Regression tree structures
//!
//! Nodes live in a flat vector with node 0 as the root. Split thresholds and
//! leaf values are fixed-point integers at the owning model's scale.

use serde::{Deserialize, Serialize};

/// A tree node, either a split or a leaf
///
/// Splits carry `feature_idx >= 0` and valid child indices; leaves carry
/// `feature_idx == -1`, `left == right == -1` and a `leaf` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    /// Position of the node in its tree
    pub id: i32,

    /// Left child index (-1 for leaves)
    pub left: i32,

    /// Right child index (-1 for leaves)
    pub right: i32,

    /// Feature compared at this node (-1 for leaves)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Samples with `feature <= threshold` go left
    pub threshold: i64,

    /// Leaf output, `None` on split nodes
    pub leaf: Option<i64>,
}

impl Node {
    /// Split node sending `features[feature_idx] <= threshold` to `left`
    pub fn internal(id: i32, feature_idx: i32, threshold: i64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Terminal node producing `value`
    pub fn leaf(id: i32, value: i64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx < 0 || self.leaf.is_some()
    }
}

/// One weak learner of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tree {
    /// Flattened nodes, root first
    pub nodes: Vec<Node>,

    /// Shrinkage applied to this tree's leaves, fixed-point
    pub weight: i64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: i64) -> Self {
        Self { nodes, weight }
    }

    /// Walk from the root to a leaf and return its raw value
    ///
    /// Malformed trees evaluate to 0; use [`Tree::validate`] before trusting
    /// a tree that was not produced by the trainer.
    pub fn evaluate(&self, features: &[i64]) -> i64 {
        let mut idx = 0usize;

        while let Some(node) = self.nodes.get(idx) {
            if node.is_leaf() {
                return node.leaf.unwrap_or(0);
            }

            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0;
            };

            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0;
            }
            idx = next as usize;
        }

        0
    }

    /// Number of leaves, mostly useful for logging
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Check child links and feature indices
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if node.leaf.is_none() {
                    return Err(format!("Leaf node {i} has no leaf value"));
                }
                continue;
            }

            // Children must point forward, otherwise traversal could cycle.
            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child >= len {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }
        }

        Ok(())
    }

    /// Largest feature index referenced by a split
    pub fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .map(|n| n.feature_idx as usize)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(
            vec![
                Node::internal(0, 0, 50, 1, 2),
                Node::leaf(1, 100),
                Node::leaf(2, 200),
            ],
            1_000_000,
        )
    }

    #[test]
    fn test_evaluate_goes_left_on_equal() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30]), 100);
        assert_eq!(tree.evaluate(&[50]), 100);
        assert_eq!(tree.evaluate(&[60]), 200);
    }

    #[test]
    fn test_missing_feature_evaluates_to_zero() {
        assert_eq!(stump().evaluate(&[]), 0);
    }

    #[test]
    fn test_validate() {
        assert!(stump().validate().is_ok());
        assert_eq!(stump().leaf_count(), 2);

        let dangling = Tree::new(
            vec![
                Node::internal(0, 0, 50, 5, 2),
                Node::leaf(1, 100),
                Node::leaf(2, 200),
            ],
            1_000_000,
        );
        assert!(dangling.validate().is_err());

        let cyclic = Tree::new(
            vec![Node::internal(0, 0, 50, 0, 1), Node::leaf(1, 1)],
            1_000_000,
        );
        assert!(cyclic.validate().is_err());
    }

    #[test]
    fn test_max_feature_index() {
        let tree = Tree::new(
            vec![
                Node::internal(0, 3, 10, 1, 2),
                Node::internal(1, 1, 5, 3, 4),
                Node::leaf(2, 0),
                Node::leaf(3, 0),
                Node::leaf(4, 0),
            ],
            1,
        );
        assert_eq!(tree.max_feature_index(), Some(3));
        assert_eq!(Tree::new(vec![Node::leaf(0, 7)], 1).max_feature_index(), None);
    }
}
