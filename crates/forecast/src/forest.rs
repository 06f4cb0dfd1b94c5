//! Bagged CART regression trees.
//!
//! Rows sharing a feature vector are folded into one weighted group before a
//! tree is grown. Split quality only depends on per-group sums, so this grows
//! the same tree as the raw rows would, while keeping fitting cost bound to
//! the number of distinct feature vectors (a few hundred for calendar
//! features) rather than the number of readings.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestError {
    #[error("cannot fit on an empty training set")]
    Empty,
    #[error("feature rows ({rows}) and targets ({targets}) differ in length")]
    ShapeMismatch { rows: usize, targets: usize },
    #[error("non-finite value in training data at row {0}")]
    NonFinite(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    pub tree_count: usize,
    pub seed: u64,
    /// Nodes lighter than this become leaves.
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            tree_count: 50,
            seed: 42,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Weighted sufficient statistics of the rows sharing one feature vector.
#[derive(Debug, Clone)]
struct Group {
    x: Vec<f64>,
    weight: f64,
    sum: f64,
    sum_sq: f64,
}

impl Group {
    fn mean(groups: &[Group]) -> f64 {
        let (w, s) = groups
            .iter()
            .fold((0.0, 0.0), |(w, s), g| (w + g.weight, s + g.sum));
        if w > 0.0 { s / w } else { 0.0 }
    }
}

fn sse(weight: f64, sum: f64, sum_sq: f64) -> f64 {
    if weight > 0.0 {
        (sum_sq - sum * sum / weight).max(0.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn grow(groups: Vec<Group>, min_samples_split: usize) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(groups, min_samples_split as f64);
        tree
    }

    fn build(&mut self, mut groups: Vec<Group>, min_weight: f64) -> usize {
        let id = self.nodes.len();
        let mean = Group::mean(&groups);
        self.nodes.push(Node::Leaf(mean));

        let weight: f64 = groups.iter().map(|g| g.weight).sum();
        let sum: f64 = groups.iter().map(|g| g.sum).sum();
        let sum_sq: f64 = groups.iter().map(|g| g.sum_sq).sum();
        if groups.len() < 2 || weight < min_weight || sse(weight, sum, sum_sq) <= f64::EPSILON {
            return id;
        }

        let Some((feature, threshold)) = best_split(&mut groups, weight, sum, sum_sq) else {
            return id;
        };

        let (left, right): (Vec<Group>, Vec<Group>) =
            groups.into_iter().partition(|g| g.x[feature] <= threshold);
        let left = self.build(left, min_weight);
        let right = self.build(right, min_weight);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = sample.get(*feature).copied().unwrap_or(0.0);
                    id = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Lowest weighted squared error over every feature and every midpoint
/// between distinct values. Earlier features and thresholds win ties.
fn best_split(groups: &mut [Group], weight: f64, sum: f64, sum_sq: f64) -> Option<(usize, f64)> {
    let width = groups.first()?.x.len();
    let mut best: Option<(f64, usize, f64)> = None;

    for feature in 0..width {
        groups.sort_by(|a, b| a.x[feature].total_cmp(&b.x[feature]));

        let (mut lw, mut ls, mut lsq) = (0.0, 0.0, 0.0);
        for i in 0..groups.len() - 1 {
            lw += groups[i].weight;
            ls += groups[i].sum;
            lsq += groups[i].sum_sq;

            let (here, next) = (groups[i].x[feature], groups[i + 1].x[feature]);
            if here == next {
                continue;
            }

            let cost = sse(lw, ls, lsq) + sse(weight - lw, sum - ls, sum_sq - lsq);
            if best.is_none_or(|(c, _, _)| cost < c) {
                best = Some((cost, feature, here + (next - here) / 2.0));
            }
        }
    }

    best.map(|(_, feature, threshold)| (feature, threshold))
}

/// Bagged ensemble of regression trees; the prediction is the tree mean.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Tree `i` draws its bootstrap sample from an RNG seeded with
    /// `seed + i`, so the forest is reproducible while trees fit in parallel.
    pub fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        params: &ForestParams,
    ) -> Result<Self, ForestError> {
        let n = x.nrows();
        if n != y.len() {
            return Err(ForestError::ShapeMismatch {
                rows: n,
                targets: y.len(),
            });
        }
        if n == 0 {
            return Err(ForestError::Empty);
        }
        let non_finite =
            |i: &usize| !y[*i].is_finite() || x.row(*i).iter().any(|v| !v.is_finite());
        if let Some(row) = (0..n).find(non_finite) {
            return Err(ForestError::NonFinite(row));
        }

        let (keys, membership) = group_rows(x);
        let tree_count = params.tree_count.max(1);

        let trees = (0..tree_count)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let mut groups: Vec<Group> = keys
                    .iter()
                    .map(|x| Group {
                        x: x.clone(),
                        weight: 0.0,
                        sum: 0.0,
                        sum_sq: 0.0,
                    })
                    .collect();
                for _ in 0..n {
                    let row = rng.random_range(0..n);
                    let g = &mut groups[membership[row]];
                    g.weight += 1.0;
                    g.sum += y[row];
                    g.sum_sq += y[row] * y[row];
                }
                groups.retain(|g| g.weight > 0.0);
                RegressionTree::grow(groups, params.min_samples_split)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(sample)).sum();
        total / self.trees.len() as f64
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

/// Distinct feature vectors in first-seen order, and each row's index into them.
fn group_rows(x: ArrayView2<f64>) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut index: HashMap<Vec<u64>, usize> = HashMap::new();
    let mut keys = Vec::new();
    let membership = x
        .rows()
        .into_iter()
        .map(|row| {
            let bits: Vec<u64> = row.iter().map(|v| v.to_bits()).collect();
            *index.entry(bits).or_insert_with(|| {
                keys.push(row.to_vec());
                keys.len() - 1
            })
        })
        .collect();
    (keys, membership)
}
