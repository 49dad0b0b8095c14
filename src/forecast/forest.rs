//! Bagged regression-tree ensemble
//!
//! CART trees grown on bootstrap resamples, split by squared-error reduction
//! over every feature, averaged at prediction time. Sampling is driven by a
//! seeded `StdRng`, so identical inputs and seed always yield the same model
//! within one build. `StdRng` and `gen_range` are not value-stable across
//! `rand` releases, so a model (and the forecast it produces) is only
//! reproducible against the same locked `rand` version. Reports carry the
//! seed and the input fingerprint so a rerun can be matched to its inputs.

use super::features::{FeatureVector, FEATURE_COUNT};
use crate::error::CollisionError;
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    /// Weighted impurity decrease per feature, normalized to sum to 1
    importances: [f64; FEATURE_COUNT],
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Position in the sorted sample list where the right side starts
    cut: usize,
    child_sse: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [FeatureVector],
    targets: &'a [f64],
    max_depth: usize,
    min_samples_split: usize,
    nodes: Vec<Node>,
    importances: [f64; FEATURE_COUNT],
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let (mean, sse) = sum_stats(samples.iter().map(|&i| self.targets[i]));
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= self.max_depth || samples.len() < self.min_samples_split || sse <= 0.0 {
            return id;
        }

        let Some(best) = self.best_split(samples) else {
            return id;
        };

        self.importances[best.feature] += sse - best.child_sse;

        samples.sort_by(|&a, &b| self.rows[a][best.feature].total_cmp(&self.rows[b][best.feature]));
        let (left_samples, right_samples) = samples.split_at_mut(best.cut);

        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);

        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, samples: &[usize]) -> Option<SplitCandidate> {
        let n = samples.len();
        let mut sorted = samples.to_vec();
        let mut best: Option<SplitCandidate> = None;

        let total_sum: f64 = samples.iter().map(|&i| self.targets[i]).sum();
        let total_sq: f64 = samples.iter().map(|&i| self.targets[i].powi(2)).sum();

        for feature in 0..FEATURE_COUNT {
            sorted.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for cut in 1..n {
                let y = self.targets[sorted[cut - 1]];
                left_sum += y;
                left_sq += y * y;

                let lo = self.rows[sorted[cut - 1]][feature];
                let hi = self.rows[sorted[cut]][feature];
                if lo == hi {
                    continue;
                }

                let left_n = cut as f64;
                let right_n = (n - cut) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;

                let child_sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if best.as_ref().map_or(true, |b| child_sse < b.child_sse) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        cut,
                        child_sse,
                    });
                }
            }
        }

        best
    }
}

/// Mean and sum of squared deviations in one pass
fn sum_stats(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut n, mut mean, mut m2) = (0usize, 0.0, 0.0);
    for v in values {
        n += 1;
        let delta = v - mean;
        mean += delta / n as f64;
        m2 += delta * (v - mean);
    }
    (mean, m2.max(0.0))
}

impl RegressionTree {
    fn fit(
        rows: &[FeatureVector],
        targets: &[f64],
        samples: &mut [usize],
        params: &ForestParams,
    ) -> Self {
        let mut builder = TreeBuilder {
            rows,
            targets,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            nodes: Vec::new(),
            importances: [0.0; FEATURE_COUNT],
        };
        builder.build(samples, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Self {
            nodes: builder.nodes,
            importances,
        }
    }

    pub fn predict(&self, x: &FeatureVector) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(rows: &[FeatureVector], targets: &[f64], params: ForestParams) -> Result<Self> {
        if rows.is_empty() {
            return Err(CollisionError::ModelTraining(
                "training split is empty".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(CollisionError::ModelTraining(format!(
                "{} feature rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(CollisionError::ModelTraining(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if targets.iter().chain(rows.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(CollisionError::ModelTraining(
                "training data contains non-finite values".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = rows.len();

        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(rows, targets, &mut samples, &params)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn predict(&self, x: &FeatureVector) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        total / self.trees.len() as f64
    }

    pub fn predict_many(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.iter().map(|x| self.predict(x)).collect()
    }

    /// Mean of per-tree normalized importances, renormalized to sum to 1
    pub fn feature_importances(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for tree in &self.trees {
            for (acc, v) in out.iter_mut().zip(tree.importances.iter()) {
                *acc += v;
            }
        }
        let total: f64 = out.iter().sum();
        if total > 0.0 {
            out.iter_mut().for_each(|v| *v /= total);
        }
        out
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}
