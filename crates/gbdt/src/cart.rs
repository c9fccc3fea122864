//! Exact-greedy regression tree builder
//!
//! Fits one tree to squared-error gradients. Candidate thresholds are the
//! distinct feature values of a node, floored to `quant_step`; each feature
//! is scanned once in sorted order with running gradient sums.

use crate::tree::{Node, Tree};

/// Growth limits for a single tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub quant_step: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 1,
            quant_step: 1000,
        }
    }
}

/// Orders equal-gain splits within a node: lowest feature, then lowest
/// threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: i64,
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    gain: i128,
    key: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.key < other.key)
    }
}

/// Builds one regression tree over borrowed rows and gradients
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<i64>],
    gradients: &'a [i64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(features: &'a [Vec<i64>], gradients: &'a [i64], config: TreeConfig) -> Self {
        assert_eq!(features.len(), gradients.len());

        let feature_count = features.first().map(Vec::len).unwrap_or(0);
        Self {
            config,
            features,
            gradients,
            feature_count,
        }
    }

    /// Grow the tree; leaf values are `-mean(gradient)` of their samples
    pub fn build(&self, weight: i64) -> Tree {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..self.features.len()).collect();
        self.build_node(&indices, 0, &mut nodes);
        Tree::new(nodes, weight)
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
    ) -> i32 {
        let current = nodes.len() as i32;

        let split = if depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf
        {
            None
        } else {
            self.find_best_split(indices)
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current, self.leaf_value(indices)));
            return current;
        };

        let feature_idx = split.key.feature_idx;
        let threshold = split.key.threshold;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][feature_idx] <= threshold);

        nodes.push(Node::internal(current, feature_idx as i32, threshold, -1, -1));
        let left_idx = self.build_node(&left, depth + 1, nodes);
        let right_idx = self.build_node(&right, depth + 1, nodes);

        let node = &mut nodes[current as usize];
        node.left = left_idx;
        node.right = right_idx;

        current
    }

    fn quantize(&self, value: i64) -> i64 {
        let step = self.config.quant_step;
        value
            .div_euclid(step)
            .checked_mul(step)
            .unwrap_or(value)
    }

    /// Best positive-gain split respecting `min_samples_leaf`
    fn find_best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len() as i128;
        let total_g: i128 = indices.iter().map(|&i| self.gradients[i] as i128).sum();
        let parent_score = split_score(total_g, n);
        let min_leaf = self.config.min_samples_leaf;

        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..self.feature_count {
            order.sort_by_key(|&i| (self.features[i][feature_idx], i));

            let mut thresholds: Vec<i64> = order
                .iter()
                .map(|&i| self.quantize(self.features[i][feature_idx]))
                .collect();
            thresholds.dedup();

            let mut pos = 0usize;
            let mut left_g = 0i128;

            for threshold in thresholds {
                while pos < order.len() && self.features[order[pos]][feature_idx] <= threshold {
                    left_g += self.gradients[order[pos]] as i128;
                    pos += 1;
                }

                let left_n = pos;
                let right_n = order.len() - pos;
                if left_n < min_leaf || right_n < min_leaf || left_n == 0 || right_n == 0 {
                    continue;
                }

                let right_g = total_g - left_g;
                let gain = split_score(left_g, left_n as i128)
                    .saturating_add(split_score(right_g, right_n as i128))
                    .saturating_sub(parent_score);
                if gain <= 0 {
                    continue;
                }

                let candidate = SplitCandidate {
                    gain,
                    key: SplitTieBreaker {
                        feature_idx,
                        threshold,
                    },
                };
                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn leaf_value(&self, indices: &[usize]) -> i64 {
        if indices.is_empty() {
            return 0;
        }
        let sum: i128 = indices.iter().map(|&i| self.gradients[i] as i128).sum();
        let value = -sum / indices.len() as i128;
        value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// `sum^2 / n`, the squared-error reduction term of a node
///
/// Falls back to `sum * (sum / n)` when the square leaves i128, which keeps
/// split ordering for gradients near the i64 range.
fn split_score(sum: i128, n: i128) -> i128 {
    match sum.checked_mul(sum) {
        Some(square) => square / n,
        None => sum.saturating_mul(sum / n),
    }
}
