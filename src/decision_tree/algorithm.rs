//! Binary decision trees over mixed features
//!
use std::collections::BTreeSet;
use std::mem;

use log::{debug, trace};
use ndarray::{Array1, ArrayBase, ArrayView1, Data, Ix1, Ix2};

use super::{
    encode_categories, find_best_split, DecisionTreeValidParams, FeatureKind, NodeIter, SplitRule,
    Value,
};
use crate::error::{CartError, Result};
use linfa::{
    dataset::{AsSingleTargets, Records},
    traits::*,
    DatasetBase, Float,
};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// A node in the decision tree
///
/// Children are owned exclusively by their parent, so the tree is a strict binary tree.
///
/// `Clone`, `PartialEq` and `Drop` walk the tree on the heap. `Debug` formatting and serde
/// (de)serialization recurse once per level.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug)]
pub enum TreeNode<F> {
    /// Leaf predicting a single class
    Terminal { prediction: usize, n_samples: usize },
    /// Decision routing samples for which `rule` holds to `left`, all others to `right`
    Internal {
        feature_idx: usize,
        rule: SplitRule<F>,
        /// Negative weighted Gini impurity achieved by the rule on the training subset
        score: F,
        n_samples: usize,
        left: Box<TreeNode<F>>,
        right: Box<TreeNode<F>>,
    },
}

impl<F> TreeNode<F> {
    fn leaf(prediction: usize, n_samples: usize) -> Self {
        TreeNode::Terminal {
            prediction,
            n_samples,
        }
    }

    /// Returns true if the node has no children
    pub fn is_terminal(&self) -> bool {
        matches!(self, TreeNode::Terminal { .. })
    }

    /// Returns `Some(prediction)` for terminal nodes and `None` for internal nodes.
    pub fn prediction(&self) -> Option<usize> {
        match self {
            TreeNode::Terminal { prediction, .. } => Some(*prediction),
            TreeNode::Internal { .. } => None,
        }
    }

    /// Returns the split feature and its rule for internal nodes
    pub fn split(&self) -> Option<(usize, &SplitRule<F>)> {
        match self {
            TreeNode::Terminal { .. } => None,
            TreeNode::Internal {
                feature_idx, rule, ..
            } => Some((*feature_idx, rule)),
        }
    }

    /// Returns both children, first left then right
    pub fn children(&self) -> Option<(&TreeNode<F>, &TreeNode<F>)> {
        match self {
            TreeNode::Terminal { .. } => None,
            TreeNode::Internal { left, right, .. } => Some((&**left, &**right)),
        }
    }

    /// Number of training samples which reached this node
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Terminal { n_samples, .. } | TreeNode::Internal { n_samples, .. } => {
                *n_samples
            }
        }
    }

    fn detach_children(&mut self, detached: &mut Vec<TreeNode<F>>) {
        if let TreeNode::Internal { left, right, .. } = self {
            detached.push(mem::replace(left.as_mut(), TreeNode::leaf(0, 0)));
            detached.push(mem::replace(right.as_mut(), TreeNode::leaf(0, 0)));
        }
    }
}

impl<F: Float> TreeNode<F> {
    /// Returns the score of the split for internal nodes
    pub fn score(&self) -> Option<F> {
        match self {
            TreeNode::Terminal { .. } => None,
            TreeNode::Internal { score, .. } => Some(*score),
        }
    }
}

impl<F: Clone> Clone for TreeNode<F> {
    fn clone(&self) -> Self {
        enum Step<'a, F> {
            Visit(&'a TreeNode<F>),
            Assemble(&'a TreeNode<F>),
        }

        let mut steps = vec![Step::Visit(self)];
        let mut cloned: Vec<TreeNode<F>> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(TreeNode::Terminal {
                    prediction,
                    n_samples,
                }) => cloned.push(TreeNode::leaf(*prediction, *n_samples)),
                Step::Visit(node) => {
                    if let Some((left, right)) = node.children() {
                        steps.push(Step::Assemble(node));
                        steps.push(Step::Visit(right));
                        steps.push(Step::Visit(left));
                    }
                }
                Step::Assemble(TreeNode::Internal {
                    feature_idx,
                    rule,
                    score,
                    n_samples,
                    ..
                }) => {
                    // the right copy is finished last and sits on top
                    let (right, left) = match (cloned.pop(), cloned.pop()) {
                        (Some(right), Some(left)) => (right, left),
                        _ => unreachable!("children are cloned before their parent"),
                    };
                    cloned.push(TreeNode::Internal {
                        feature_idx: *feature_idx,
                        rule: rule.clone(),
                        score: score.clone(),
                        n_samples: *n_samples,
                        left: Box::new(left),
                        right: Box::new(right),
                    });
                }
                Step::Assemble(TreeNode::Terminal { .. }) => {
                    unreachable!("only internal nodes are assembled")
                }
            }
        }

        match cloned.pop() {
            Some(root) => root,
            None => unreachable!("the root is always cloned"),
        }
    }
}

impl<F: PartialEq> PartialEq for TreeNode<F> {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];

        while let Some(pair) = pairs.pop() {
            match pair {
                (
                    TreeNode::Terminal {
                        prediction: a_prediction,
                        n_samples: a_samples,
                    },
                    TreeNode::Terminal {
                        prediction: b_prediction,
                        n_samples: b_samples,
                    },
                ) => {
                    if a_prediction != b_prediction || a_samples != b_samples {
                        return false;
                    }
                }
                (
                    TreeNode::Internal {
                        feature_idx: a_feature,
                        rule: a_rule,
                        score: a_score,
                        n_samples: a_samples,
                        left: a_left,
                        right: a_right,
                    },
                    TreeNode::Internal {
                        feature_idx: b_feature,
                        rule: b_rule,
                        score: b_score,
                        n_samples: b_samples,
                        left: b_left,
                        right: b_right,
                    },
                ) => {
                    if a_feature != b_feature
                        || a_rule != b_rule
                        || a_score != b_score
                        || a_samples != b_samples
                    {
                        return false;
                    }
                    pairs.push((&**a_right, &**b_right));
                    pairs.push((&**a_left, &**b_left));
                }
                _ => return false,
            }
        }

        true
    }
}

// Drops the subtrees one level at a time, deep trees would exhaust the stack otherwise
impl<F> Drop for TreeNode<F> {
    fn drop(&mut self) {
        let mut detached = Vec::new();
        self.detach_children(&mut detached);

        while let Some(mut node) = detached.pop() {
            node.detach_children(&mut detached);
        }
    }
}

/// A feature column after its values have been checked against the declared kind
enum Column<'a, F> {
    Real(Vec<F>),
    Categorical(Vec<&'a str>),
}

impl<'a, F: Float> Column<'a, F> {
    fn goes_left(&self, row: usize, rule: &SplitRule<F>) -> bool {
        match (self, rule) {
            (Column::Real(values), SplitRule::Threshold(threshold)) => values[row] < *threshold,
            (Column::Categorical(tokens), SplitRule::CategorySet(set)) => set.contains(tokens[row]),
            _ => unreachable!("split rules are always derived from the column they split"),
        }
    }
}

/// Checks every cell against the kind of its column and extracts the typed columns
fn typed_columns<'a, F: Float, D: Data<Elem = Value<F>>>(
    records: &'a ArrayBase<D, Ix2>,
    feature_kinds: &[FeatureKind],
) -> Result<Vec<Column<'a, F>>> {
    feature_kinds
        .iter()
        .enumerate()
        .map(|(feature, kind)| {
            let cells = records.column(feature).into_iter().enumerate();

            match kind {
                FeatureKind::Real => cells
                    .map(|(row, value)| match value {
                        Value::Real(value) if value.is_nan() => {
                            Err(CartError::NanValue { row, feature })
                        }
                        Value::Real(value) => Ok(*value),
                        Value::Category(_) => Err(CartError::KindMismatch {
                            row,
                            feature,
                            expected: *kind,
                        }),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Column::Real),
                FeatureKind::Categorical => cells
                    .map(|(row, value)| match value {
                        Value::Category(token) => Ok(token.as_str()),
                        Value::Real(_) => Err(CartError::KindMismatch {
                            row,
                            feature,
                            expected: *kind,
                        }),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Column::Categorical),
            }
        })
        .collect()
}

/// Checks that all targets are either `0` or `1`
fn binary_labels(targets: ArrayView1<usize>) -> Result<Vec<usize>> {
    targets
        .iter()
        .enumerate()
        .map(|(index, &label)| match label {
            0 | 1 => Ok(label),
            _ => Err(CartError::NonBinaryLabel { index, label }),
        })
        .collect()
}

/// The most frequent label of a subset with `ones` positive labels out of `total`.
///
/// Balanced subsets predict `0`.
fn majority_label(ones: usize, total: usize) -> usize {
    if 2 * ones > total {
        1
    } else {
        0
    }
}

/// The best split found for a node
struct NodeSplit<F> {
    feature_idx: usize,
    rule: SplitRule<F>,
    score: F,
}

/// Outcome of growing a single node
enum Growth<F> {
    Leaf(TreeNode<F>),
    Split {
        split: NodeSplit<F>,
        n_samples: usize,
        left: Vec<usize>,
        right: Vec<usize>,
    },
}

/// Pending work of the tree builder
enum Task<F> {
    /// Grow a node from the given training rows
    Grow { rows: Vec<usize>, depth: usize },
    /// Assemble an internal node from the two most recently finished nodes
    Join {
        split: NodeSplit<F>,
        n_samples: usize,
    },
}

struct TreeBuilder<'a, 'b, F: Float> {
    columns: Vec<Column<'a, F>>,
    labels: Vec<usize>,
    hyperparameters: &'b DecisionTreeValidParams<F>,
}

impl<'a, 'b, F: Float> TreeBuilder<'a, 'b, F> {
    /// Grows the whole tree
    ///
    /// Nodes are grown depth-first on an explicit stack. An internal node is only assembled once
    /// both of its subtrees are finished, so no partially built node ever exists.
    fn build(&self) -> TreeNode<F> {
        let mut tasks = vec![Task::Grow {
            rows: (0..self.labels.len()).collect(),
            depth: 0,
        }];
        let mut finished: Vec<TreeNode<F>> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Grow { rows, depth } => match self.grow(&rows, depth) {
                    Growth::Leaf(leaf) => finished.push(leaf),
                    Growth::Split {
                        split,
                        n_samples,
                        left,
                        right,
                    } => {
                        tasks.push(Task::Join { split, n_samples });
                        tasks.push(Task::Grow {
                            rows: right,
                            depth: depth + 1,
                        });
                        tasks.push(Task::Grow {
                            rows: left,
                            depth: depth + 1,
                        });
                    }
                },
                Task::Join { split, n_samples } => {
                    let (left, right) = match (finished.pop(), finished.pop()) {
                        (Some(right), Some(left)) => (left, right),
                        _ => unreachable!("both subtrees are finished before their parent"),
                    };

                    finished.push(TreeNode::Internal {
                        feature_idx: split.feature_idx,
                        rule: split.rule,
                        score: split.score,
                        n_samples,
                        left: Box::new(left),
                        right: Box::new(right),
                    });
                }
            }
        }

        match finished.pop() {
            Some(root) => root,
            None => unreachable!("the root task always finishes a node"),
        }
    }

    /// Decides whether the node of `rows` becomes a leaf or is split
    fn grow(&self, rows: &[usize], depth: usize) -> Growth<F> {
        let n_samples = rows.len();
        let ones = rows.iter().filter(|&&row| self.labels[row] == 1).count();
        let prediction = majority_label(ones, n_samples);

        if ones == 0 || ones == n_samples {
            trace!("pure leaf of {} samples at depth {}", n_samples, depth);
            return Growth::Leaf(TreeNode::leaf(prediction, n_samples));
        }

        if self
            .hyperparameters
            .max_depth()
            .map(|max_depth| depth >= max_depth)
            .unwrap_or(false)
        {
            trace!("leaf of {} samples at maximal depth {}", n_samples, depth);
            return Growth::Leaf(TreeNode::leaf(prediction, n_samples));
        }

        if self
            .hyperparameters
            .min_samples_split()
            .map(|min_samples| n_samples < min_samples)
            .unwrap_or(false)
        {
            trace!("leaf of {} samples, too few to split", n_samples);
            return Growth::Leaf(TreeNode::leaf(prediction, n_samples));
        }

        let split = match self.best_split(rows) {
            Some(split) => split,
            None => {
                trace!("leaf of {} samples, every feature is constant", n_samples);
                return Growth::Leaf(TreeNode::leaf(prediction, n_samples));
            }
        };

        let column = &self.columns[split.feature_idx];
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&row| column.goes_left(row, &split.rule));

        // min_samples_leaf defaults to 1, a split never leaves a side empty
        let min_samples_leaf = self.hyperparameters.min_samples_leaf().unwrap_or(1);
        if left.len() < min_samples_leaf || right.len() < min_samples_leaf {
            trace!(
                "leaf of {} samples, best split leaves {} and {} samples",
                n_samples,
                left.len(),
                right.len()
            );
            return Growth::Leaf(TreeNode::leaf(prediction, n_samples));
        }

        trace!(
            "split {} samples at depth {} on feature {} with score {}",
            n_samples,
            depth,
            split.feature_idx,
            split.score
        );

        Growth::Split {
            split,
            n_samples,
            left,
            right,
        }
    }

    /// Searches all features for the split with the highest score
    ///
    /// Features are visited in index order and only a strictly better score replaces the current
    /// best, so the first feature wins ties.
    fn best_split(&self, rows: &[usize]) -> Option<NodeSplit<F>> {
        let labels: Vec<usize> = rows.iter().map(|&row| self.labels[row]).collect();
        let mut best: Option<NodeSplit<F>> = None;

        for (feature_idx, column) in self.columns.iter().enumerate() {
            let candidate = match column {
                Column::Real(values) => {
                    let values: Vec<F> = rows.iter().map(|&row| values[row]).collect();

                    find_best_split(&values, &labels)
                        .map(|split| (SplitRule::Threshold(split.threshold), split.score))
                }
                Column::Categorical(tokens) => {
                    let tokens: Vec<&str> = rows.iter().map(|&row| tokens[row]).collect();
                    let (codes, encoding) = encode_categories::<F>(&tokens, &labels);

                    find_best_split(&codes, &labels).map(|split| {
                        (
                            SplitRule::CategorySet(encoding.categories_below(split.threshold)),
                            split.score,
                        )
                    })
                }
            };

            if let Some((rule, score)) = candidate {
                let improves = best
                    .as_ref()
                    .map(|best| score > best.score)
                    .unwrap_or(true);

                if improves {
                    best = Some(NodeSplit {
                        feature_idx,
                        rule,
                        score,
                    });
                }
            }
        }

        best
    }
}

/// A fitted decision tree model for binary classification.
///
/// ### Structure
/// A decision tree structure is a binary tree where:
/// * Each internal node specifies a decision on a single feature. Real features are compared against a
/// threshold and observations with `feature < threshold` fall in the left subtree. Categorical features
/// are tested for membership in a set of categories and members fall in the left subtree.
///
/// * Terminal nodes make predictions, the most popular label of the training observations in the node
///
/// ### Algorithm
///
/// Starting with a single root node, decision trees are trained recursively by applying the following rule to every
/// node considered:
///
/// * If all observations share a label, or a stopping limit is reached, the node becomes a leaf;
/// * Find the best threshold for each feature of the observations belonging in the node. Categorical features are
///   ranked by their rate of positive labels first, and the ranks are searched for a threshold;
/// * Select the feature (and its split rule) that minimizes the weighted Gini impurity, the first feature on ties;
/// * If there is no such feature, or the split would leave fewer than `min_samples_leaf` observations
///   on a side, the node becomes a leaf. Otherwise two child nodes are grown.
///
/// Leaves of balanced subsets predict `0`.
///
/// ### Predictions
///
/// To predict the label of a sample, the tree is traversed from the root to a leaf, choosing between left and right children according to
/// the values of the features of the sample. The final prediction for the sample is the prediction of the reached leaf.
///
/// ### Example
///
/// ```rust
/// use linfa_cart::{DecisionTree, FeatureKind, SplitRule, Value};
/// use linfa::prelude::*;
/// use ndarray::array;
///
/// let records = array![
///     [Value::real(1.0)],
///     [Value::real(2.0)],
///     [Value::real(3.0)],
///     [Value::real(4.0)],
/// ];
/// let dataset = Dataset::new(records, array![0, 0, 1, 1]);
///
/// let tree = DecisionTree::params(vec![FeatureKind::Real]).fit(&dataset).unwrap();
///
/// assert_eq!(tree.root_node().split(), Some((0, &SplitRule::Threshold(2.5))));
/// assert_eq!(tree.predict(&array![[Value::real(1.0)], [Value::real(4.0)]]), array![0, 1]);
/// ```
///
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree<F> {
    root_node: TreeNode<F>,
    feature_kinds: Vec<FeatureKind>,
}

impl<F: Float, D: Data<Elem = Value<F>>> PredictInplace<ArrayBase<D, Ix2>, Array1<usize>>
    for DecisionTree<F>
{
    /// Make predictions for each row of a matrix of features `x`.
    ///
    /// ### Panics
    ///
    /// If `x` has a different number of features than the training records, or if a value
    /// on the path of a row doesn't have the kind of its feature.
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<usize>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        assert_eq!(
            x.ncols(),
            self.feature_kinds.len(),
            "Number of data features must match the number of features the model was trained with."
        );

        for (idx, (row, target)) in x.rows().into_iter().zip(y.iter_mut()).enumerate() {
            *target = match self.traverse(&row, idx) {
                Ok(prediction) => prediction,
                Err(err) => panic!("{}", err),
            };
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<usize> {
        Array1::zeros(x.nrows())
    }
}

impl<F, D, T> Fit<ArrayBase<D, Ix2>, T, CartError> for DecisionTreeValidParams<F>
where
    F: Float,
    D: Data<Elem = Value<F>>,
    T: AsSingleTargets<Elem = usize>,
{
    type Object = DecisionTree<F>;

    /// Fit a decision tree using `hyperparamters` on the dataset consisting of
    /// a matrix of features `x` and an array of binary labels `y`.
    ///
    /// Fails if the records don't have one column per feature kind, if a value doesn't match
    /// the kind of its column, if a real value is NaN or if a label is neither `0` nor `1`.
    fn fit(&self, dataset: &DatasetBase<ArrayBase<D, Ix2>, T>) -> Result<Self::Object> {
        let x = dataset.records();
        let targets = dataset.as_single_targets();

        if x.ncols() != self.feature_kinds().len() {
            return Err(CartError::FeatureCountMismatch {
                expected: self.feature_kinds().len(),
                found: x.ncols(),
            });
        }
        if x.nrows() != targets.len() {
            return Err(CartError::TargetCountMismatch {
                samples: x.nrows(),
                targets: targets.len(),
            });
        }
        if x.nsamples() == 0 {
            return Err(CartError::EmptyDataset);
        }

        let labels = binary_labels(targets)?;
        let columns = typed_columns(x, self.feature_kinds())?;

        debug!(
            "growing decision tree on {} samples with {} features",
            x.nsamples(),
            x.nfeatures()
        );

        let builder = TreeBuilder {
            columns,
            labels,
            hyperparameters: self,
        };
        let tree = DecisionTree {
            root_node: builder.build(),
            feature_kinds: self.feature_kinds().to_vec(),
        };

        debug!(
            "decision tree grown with {} leaves and depth {}",
            tree.num_leaves(),
            tree.depth()
        );

        Ok(tree)
    }
}

impl<F: Float> DecisionTree<F> {
    /// Walks from the root to a leaf following the rules on the path of `row`
    fn traverse<D: Data<Elem = Value<F>>>(
        &self,
        row: &ArrayBase<D, Ix1>,
        row_idx: usize,
    ) -> Result<usize> {
        let mut node = &self.root_node;

        loop {
            match node {
                TreeNode::Terminal { prediction, .. } => return Ok(*prediction),
                TreeNode::Internal {
                    feature_idx,
                    rule,
                    left,
                    right,
                    ..
                } => {
                    node = match rule.goes_left(&row[*feature_idx]) {
                        Some(true) => &**left,
                        Some(false) => &**right,
                        None => {
                            return Err(CartError::KindMismatch {
                                row: row_idx,
                                feature: *feature_idx,
                                expected: rule.kind(),
                            })
                        }
                    };
                }
            }
        }
    }

    /// Classifies a single row
    ///
    /// Fails if the row doesn't have one value per trained feature, or if a value on its path
    /// doesn't have the kind of its feature. Errors report the row as row `0`.
    pub fn predict_row<D: Data<Elem = Value<F>>>(&self, row: &ArrayBase<D, Ix1>) -> Result<usize> {
        if row.len() != self.feature_kinds.len() {
            return Err(CartError::FeatureCountMismatch {
                expected: self.feature_kinds.len(),
                found: row.len(),
            });
        }

        self.traverse(row, 0)
    }

    /// Classifies every row of `x`, failing instead of panicking on malformed rows
    pub fn try_predict<D: Data<Elem = Value<F>>>(
        &self,
        x: &ArrayBase<D, Ix2>,
    ) -> Result<Array1<usize>> {
        if x.ncols() != self.feature_kinds.len() {
            return Err(CartError::FeatureCountMismatch {
                expected: self.feature_kinds.len(),
                found: x.ncols(),
            });
        }

        x.rows()
            .into_iter()
            .enumerate()
            .map(|(idx, row)| self.traverse(&row, idx))
            .collect()
    }

    /// Create a depth-first node iterator, left subtrees first
    pub fn iter_nodes(&self) -> NodeIter<'_, F> {
        NodeIter::new(&self.root_node)
    }

    /// Return the sorted indices of the features used by splits
    pub fn features(&self) -> Vec<usize> {
        self.iter_nodes()
            .filter_map(|(_, node)| node.split().map(|(feature_idx, _)| feature_idx))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Return root node of the tree
    pub fn root_node(&self) -> &TreeNode<F> {
        &self.root_node
    }

    /// Return the kinds of the features the tree was trained on
    pub fn feature_kinds(&self) -> &[FeatureKind] {
        &self.feature_kinds
    }

    /// Return the greatest number of splits on a path from the root to a leaf
    pub fn depth(&self) -> usize {
        self.iter_nodes()
            .fold(0, |max, (depth, _)| usize::max(max, depth))
    }

    /// Return the number of leaves in this tree
    pub fn num_leaves(&self) -> usize {
        self.iter_nodes()
            .filter(|(_, node)| node.is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use linfa::{Dataset, ParamGuard};
    use ndarray::{array, s, Array, Array2};
    use ndarray_rand::{rand::SeedableRng, rand_distr::Uniform, RandomExt};
    use rand::rngs::SmallRng;

    fn real_records(data: &Array2<f64>) -> Array2<Value<f64>> {
        data.mapv(Value::real)
    }

    fn category_records(tokens: &[&str]) -> Array2<Value<f64>> {
        Array::from_shape_fn((tokens.len(), 1), |(row, _)| Value::category(tokens[row]))
    }

    fn accuracy(prediction: &Array1<usize>, targets: &Array1<usize>) -> f64 {
        let correct = prediction
            .iter()
            .zip(targets.iter())
            .filter(|(p, t)| p == t)
            .count();

        correct as f64 / targets.len() as f64
    }

    #[test]
    fn majority_of_balanced_subset_is_zero() {
        assert_eq!(majority_label(3, 4), 1);
        assert_eq!(majority_label(1, 4), 0);
        assert_eq!(majority_label(2, 4), 0);
    }

    #[test]
    /// One real feature perfectly separating the labels
    fn real_feature_perfect_separation() -> Result<()> {
        let records = real_records(&array![[1.], [2.], [3.], [4.]]);
        let dataset = Dataset::new(records, array![0, 0, 1, 1]);

        let model = DecisionTree::params(vec![FeatureKind::Real]).fit(&dataset)?;

        let root = model.root_node();
        assert_eq!(root.split(), Some((0, &SplitRule::Threshold(2.5))));
        assert_abs_diff_eq!(root.score().unwrap(), 0.0);

        let (left, right) = root.children().unwrap();
        assert_eq!(left.prediction(), Some(0));
        assert_eq!(right.prediction(), Some(1));
        assert_eq!((left.n_samples(), right.n_samples()), (2, 2));

        assert_eq!(model.predict_row(&array![Value::real(1.)])?, 0);
        assert_eq!(model.predict_row(&array![Value::real(4.)])?, 1);
        assert_eq!(model.depth(), 1);
        assert_eq!(model.num_leaves(), 2);

        Ok(())
    }

    #[test]
    /// Categories are split in the order of their positive rate
    fn categorical_encoding_order() -> Result<()> {
        let records = category_records(&["a", "a", "b", "b", "c", "c"]);
        let targets = array![0, 0, 1, 1, 0, 1];
        let dataset = Dataset::new(records.clone(), targets);

        let model = DecisionTree::params(vec![FeatureKind::Categorical]).fit(&dataset)?;

        // ranks a (0.0) < c (0.5) < b (1.0), both cuts score the same and the lower one wins
        let only_a: BTreeSet<String> = vec!["a".to_string()].into_iter().collect();
        let root = model.root_node();
        assert_eq!(root.split(), Some((0, &SplitRule::CategorySet(only_a))));

        // the remaining categories are ranked again, c (0.5) < b (1.0)
        let (left, right) = root.children().unwrap();
        assert_eq!(left.prediction(), Some(0));
        let only_c: BTreeSet<String> = vec!["c".to_string()].into_iter().collect();
        assert_eq!(right.split(), Some((0, &SplitRule::CategorySet(only_c))));

        // c is balanced and cannot be split further
        assert_eq!(model.predict(&records), array![0, 0, 1, 1, 0, 0]);
        assert!(model
            .iter_nodes()
            .all(|(_, node)| matches!(node.split(), None | Some((_, SplitRule::CategorySet(_))))));

        Ok(())
    }

    #[test]
    /// Constant features cannot be split
    fn constant_feature_gives_majority_leaf() -> Result<()> {
        let records = real_records(&array![[3.], [3.], [3.]]);
        let dataset = Dataset::new(records, array![0, 1, 1]);

        let model = DecisionTree::params(vec![FeatureKind::Real]).fit(&dataset)?;
        assert_eq!(model.root_node(), &TreeNode::leaf(1, 3));

        let records = category_records(&["x", "x"]);
        let dataset = Dataset::new(records, array![1, 0]);

        let model = DecisionTree::params(vec![FeatureKind::Categorical]).fit(&dataset)?;
        assert_eq!(model.root_node().prediction(), Some(0));

        Ok(())
    }

    #[test]
    fn zero_max_depth_gives_single_leaf() -> Result<()> {
        let records = real_records(&array![[1.], [2.], [3.], [4.], [5.]]);
        let dataset = Dataset::new(records, array![1, 0, 1, 1, 0]);

        let model = DecisionTree::params(vec![FeatureKind::Real])
            .max_depth(Some(0))
            .fit(&dataset)?;

        assert!(model.root_node().is_terminal());
        assert_eq!(model.root_node().prediction(), Some(1));
        assert_eq!(model.depth(), 0);

        Ok(())
    }

    #[test]
    /// Single feature test
    ///
    /// Generate a dataset where a single feature perfectly correlates
    /// with the target while the remaining features are random uniform
    /// noise and do not add any information.
    fn single_feature_random_noise_binary() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);

        // generate data with 9 white noise and a single correlated feature
        let mut data = Array::random_using((50, 10), Uniform::new(-4., 4.), &mut rng);
        data.slice_mut(s![.., 8]).assign(
            &(0..50)
                .map(|x| if x < 25 { 0.0 } else { 1.0 })
                .collect::<Array1<_>>(),
        );

        let targets = (0..50).map(|x| (x < 25) as usize).collect::<Array1<_>>();
        let dataset = Dataset::new(real_records(&data), targets.clone());

        let model = DecisionTree::params(vec![FeatureKind::Real; 10])
            .max_depth(Some(2))
            .fit(&dataset)?;

        // we should only use feature index 8 here
        assert_eq!(&model.features(), &[8]);
        assert_eq!(model.depth(), 1);

        // check for perfect accuracy
        let prediction = model.predict(dataset.records());
        assert_abs_diff_eq!(accuracy(&prediction, &targets), 1.0);

        Ok(())
    }

    #[test]
    /// A categorical feature carries the signal, the real features are noise
    fn categorical_signal_among_real_noise() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(7);
        let noise = Array::random_using((60, 2), Uniform::new(0., 1.), &mut rng);
        let colors = ["red", "green", "blue", "amber"];

        let records = Array::from_shape_fn((60, 3), |(row, col)| match col {
            0 => Value::category(colors[row % 4]),
            _ => Value::real(noise[(row, col - 1)]),
        });
        // green and amber are positive
        let targets = (0..60).map(|row| row % 2).collect::<Array1<usize>>();
        let dataset = Dataset::new(records, targets.clone());

        let kinds = vec![
            FeatureKind::Categorical,
            FeatureKind::Real,
            FeatureKind::Real,
        ];
        let model = DecisionTree::params(kinds).fit(&dataset)?;

        let negatives: BTreeSet<String> = vec!["red".to_string(), "blue".to_string()]
            .into_iter()
            .collect();
        assert_eq!(
            model.root_node().split(),
            Some((0, &SplitRule::CategorySet(negatives)))
        );
        assert_eq!(model.num_leaves(), 2);
        assert_abs_diff_eq!(accuracy(&model.predict(dataset.records()), &targets), 1.0);

        Ok(())
    }

    #[test]
    /// Check that for random data the max depth is used
    fn check_max_depth() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);

        let data = Array::random_using((50, 20), Uniform::new(-1., 1.), &mut rng);
        let targets = (0..50).map(|x| x % 2).collect::<Array1<usize>>();
        let dataset = Dataset::new(real_records(&data), targets);

        for max_depth in &[1, 2, 5, 10] {
            let model = DecisionTree::params(vec![FeatureKind::Real; 20])
                .max_depth(Some(*max_depth))
                .fit(&dataset)?;

            assert!(model.depth() <= *max_depth);
            assert!(model
                .iter_nodes()
                .all(|(depth, node)| depth < *max_depth || node.is_terminal()));
        }

        Ok(())
    }

    #[test]
    fn sample_limits_are_respected() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(3);

        let data = Array::random_using((200, 4), Uniform::new(-1., 1.), &mut rng);
        let targets = data
            .rows()
            .into_iter()
            .map(|row| (row[0] * row[1] + 0.3 * row[2] > 0.0) as usize)
            .collect::<Array1<_>>();
        let dataset = Dataset::new(real_records(&data), targets);

        let model = DecisionTree::params(vec![FeatureKind::Real; 4])
            .min_samples_split(Some(20))
            .min_samples_leaf(Some(7))
            .fit(&dataset)?;

        assert!(!model.root_node().is_terminal());
        for (_, node) in model.iter_nodes() {
            if let Some((left, right)) = node.children() {
                assert!(node.n_samples() >= 20);
                assert!(left.n_samples() >= 7 && right.n_samples() >= 7);
                assert_eq!(left.n_samples() + right.n_samples(), node.n_samples());
            }
        }

        Ok(())
    }

    #[test]
    fn min_samples_leaf_rejects_best_split() -> Result<()> {
        // the only separating cut isolates a single sample
        let records = real_records(&array![[1.], [2.], [3.], [4.]]);
        let dataset = Dataset::new(records, array![1, 0, 0, 0]);

        let model = DecisionTree::params(vec![FeatureKind::Real])
            .min_samples_leaf(Some(2))
            .fit(&dataset)?;

        assert_eq!(model.root_node(), &TreeNode::leaf(0, 4));

        Ok(())
    }

    #[test]
    fn min_samples_split_stops_small_nodes() -> Result<()> {
        let records = real_records(&array![[1.], [2.], [3.]]);
        let dataset = Dataset::new(records, array![1, 0, 1]);

        let model = DecisionTree::params(vec![FeatureKind::Real])
            .min_samples_split(Some(4))
            .fit(&dataset)?;

        assert_eq!(model.root_node(), &TreeNode::leaf(1, 3));

        Ok(())
    }

    #[test]
    /// Unlimited trees fit every leaf to a single label
    fn unlimited_tree_has_pure_leaves() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(11);
        let data = Array::random_using((80, 3), Uniform::new(-5f64, 5.), &mut rng);
        let targets = data
            .rows()
            .into_iter()
            .map(|row| (row[0].sin() + row[1] > row[2]) as usize)
            .collect::<Array1<_>>();
        let records = real_records(&data);
        let dataset = Dataset::new(records.clone(), targets.clone());

        let model = DecisionTree::params(vec![FeatureKind::Real; 3]).fit(&dataset)?;

        assert_abs_diff_eq!(accuracy(&model.predict(&records), &targets), 1.0);

        Ok(())
    }

    #[test]
    fn fitting_is_deterministic() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(5);
        let noise = Array::random_using((40, 2), Uniform::new(0., 10.), &mut rng);
        let records = Array::from_shape_fn((40, 3), |(row, col)| match col {
            2 => Value::category(["p", "q", "r"][row % 3]),
            _ => Value::real(noise[(row, col)]),
        });
        let targets = (0..40).map(|row| (row % 3 == 0 || row % 7 == 0) as usize).collect::<Array1<_>>();
        let dataset = Dataset::new(records.clone(), targets);

        let params = DecisionTree::params(vec![
            FeatureKind::Real,
            FeatureKind::Real,
            FeatureKind::Categorical,
        ])
        .max_depth(Some(4));

        let first = params.fit(&dataset)?;
        let second = params.fit(&dataset)?;

        assert_eq!(first, second);
        assert_eq!(first.predict(&records), second.predict(&records));

        Ok(())
    }

    #[test]
    /// Small toy dataset from scikit-sklearn
    fn toy_dataset() -> Result<()> {
        let data = array![
            [0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 1.0, -14.0, 0.0, -4.0, 0.0, 0.0, 0.0, 0.0,],
            [0.0, 0.0, 5.0, 3.0, 0.0, -4.0, 0.0, 0.0, 1.0, -5.0, 0.2, 0.0, 4.0, 1.0,],
            [-1.0, -1.0, 0.0, 0.0, -4.5, 0.0, 0.0, 2.1, 1.0, 0.0, 0.0, -4.5, 0.0, 1.0,],
            [-1.0, -1.0, 0.0, -1.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.2, 0.0, 0.0, 1.0,],
            [-1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,],
            [-1.0, -2.0, 0.0, 4.0, -3.0, 10.0, 4.0, 0.0, -3.2, 0.0, 4.0, 3.0, -4.0, 1.0,],
            [2.11, 0.0, -6.0, -0.5, 0.0, 11.0, 0.0, 0.0, -3.2, 6.0, 0.5, 0.0, -3.0, 1.0,],
            [2.11, 0.0, -6.0, -0.5, 0.0, 11.0, 0.0, 0.0, -3.2, 6.0, 0.0, 0.0, -2.0, 1.0,],
            [2.11, 8.0, -6.0, -0.5, 0.0, 11.0, 0.0, 0.0, -3.2, 6.0, 0.0, 0.0, -2.0, 1.0,],
            [2.11, 8.0, -6.0, -0.5, 0.0, 11.0, 0.0, 0.0, -3.2, 6.0, 0.5, 0.0, -1.0, 0.0,],
            [2.0, 8.0, 5.0, 1.0, 0.5, -4.0, 10.0, 0.0, 1.0, -5.0, 3.0, 0.0, 2.0, 0.0,],
            [2.0, 0.0, 1.0, 1.0, 1.0, -1.0, 1.0, 0.0, 0.0, -2.0, 3.0, 0.0, 1.0, 0.0,],
            [2.0, 0.0, 1.0, 2.0, 3.0, -1.0, 10.0, 2.0, 0.0, -1.0, 1.0, 2.0, 2.0, 0.0,],
            [1.0, 1.0, 0.0, 2.0, 2.0, -1.0, 1.0, 2.0, 0.0, -5.0, 1.0, 2.0, 3.0, 0.0,],
            [3.0, 1.0, 0.0, 3.0, 0.0, -4.0, 10.0, 0.0, 1.0, -5.0, 3.0, 0.0, 3.0, 1.0,],
            [2.11, 8.0, -6.0, -0.5, 0.0, 1.0, 0.0, 0.0, -3.2, 6.0, 0.5, 0.0, -3.0, 1.0,],
            [2.11, 8.0, -6.0, -0.5, 0.0, 1.0, 0.0, 0.0, -3.2, 6.0, 1.5, 1.0, -1.0, -1.0,],
            [2.11, 8.0, -6.0, -0.5, 0.0, 10.0, 0.0, 0.0, -3.2, 6.0, 0.5, 0.0, -1.0, -1.0,],
            [2.0, 0.0, 5.0, 1.0, 0.5, -2.0, 10.0, 0.0, 1.0, -5.0, 3.0, 1.0, 0.0, -1.0,],
            [2.0, 0.0, 1.0, 1.0, 1.0, -2.0, 1.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 1.0,],
            [2.0, 1.0, 1.0, 1.0, 2.0, -1.0, 10.0, 2.0, 0.0, -1.0, 0.0, 2.0, 1.0, 1.0,],
            [1.0, 1.0, 0.0, 0.0, 1.0, -3.0, 1.0, 2.0, 0.0, -5.0, 1.0, 2.0, 1.0, 1.0,],
            [3.0, 1.0, 0.0, 1.0, 0.0, -4.0, 1.0, 0.0, 1.0, -2.0, 0.0, 0.0, 1.0, 0.0,]
        ];

        let targets = array![1, 1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0];

        let dataset = Dataset::new(real_records(&data), targets.clone());
        let model = DecisionTree::params(vec![FeatureKind::Real; 14]).fit(&dataset)?;
        let prediction = model.predict(dataset.records());

        assert!(accuracy(&prediction, &targets) > 0.95);

        Ok(())
    }

    #[test]
    fn malformed_datasets_are_rejected() {
        let params = DecisionTree::params(vec![FeatureKind::Real, FeatureKind::Categorical])
            .check()
            .unwrap();

        let records = array![[Value::real(1.0)], [Value::real(2.0)]];
        let result = params.fit(&Dataset::new(records, array![0, 1]));
        assert!(matches!(
            result,
            Err(CartError::FeatureCountMismatch {
                expected: 2,
                found: 1
            })
        ));

        let records = array![
            [Value::real(1.0), Value::category("a")],
            [Value::real(2.0), Value::category("b")]
        ];
        let result = params.fit(&Dataset::new(records.clone(), array![0, 2]));
        assert!(matches!(
            result,
            Err(CartError::NonBinaryLabel { index: 1, label: 2 })
        ));

        let swapped = array![
            [Value::real(1.0), Value::category("a")],
            [Value::category("b"), Value::real(2.0)]
        ];
        let result = params.fit(&Dataset::new(swapped, array![0, 1]));
        assert!(matches!(
            result,
            Err(CartError::KindMismatch {
                row: 1,
                feature: 0,
                expected: FeatureKind::Real
            })
        ));

        let missing = array![
            [Value::real(1.0), Value::category("a")],
            [Value::real(f64::NAN), Value::category("b")]
        ];
        let result = params.fit(&Dataset::new(missing, array![0, 1]));
        assert!(matches!(
            result,
            Err(CartError::NanValue { row: 1, feature: 0 })
        ));

        let empty: Array2<Value<f64>> = Array2::from_shape_vec((0, 2), vec![]).unwrap();
        let result = params.fit(&Dataset::new(empty, Array1::<usize>::zeros(0)));
        assert!(matches!(result, Err(CartError::EmptyDataset)));
    }

    #[test]
    fn checked_prediction_reports_malformed_rows() -> Result<()> {
        let records = category_records(&["a", "b", "a", "b"]);
        let dataset = Dataset::new(records, array![1, 0, 1, 0]);
        let model = DecisionTree::params(vec![FeatureKind::Categorical]).fit(&dataset)?;

        let rows = array![[Value::category("b")], [Value::real(1.0)]];
        assert!(matches!(
            model.try_predict(&rows),
            Err(CartError::KindMismatch {
                row: 1,
                feature: 0,
                expected: FeatureKind::Categorical
            })
        ));

        let wide = array![[Value::category("a"), Value::category("b")]];
        assert!(matches!(
            model.try_predict(&wide),
            Err(CartError::FeatureCountMismatch {
                expected: 1,
                found: 2
            })
        ));
        assert!(model.predict_row(&array![Value::category("a"), Value::real(0.)]).is_err());

        // b is never positive and forms the left set, unseen categories go right
        assert_eq!(model.try_predict(&array![[Value::category("z")]])?, array![1]);

        Ok(())
    }

    #[test]
    #[should_panic]
    fn predict_panics_on_kind_mismatch() {
        let records = real_records(&array![[1.], [2.]]);
        let dataset = Dataset::new(records, array![0, 1]);
        let model = DecisionTree::params(vec![FeatureKind::Real])
            .fit(&dataset)
            .unwrap();

        model.predict(&array![[Value::category("a")]]);
    }

    #[test]
    /// Traversal, inspection and dropping don't recurse on the call stack
    fn very_deep_tree() {
        let depth = 200_000;
        let mut node = TreeNode::leaf(1, 1);
        for level in (0..depth).rev() {
            node = TreeNode::Internal {
                feature_idx: 0,
                rule: SplitRule::Threshold(level as f64),
                score: 0.0,
                n_samples: depth - level + 1,
                left: Box::new(TreeNode::leaf(0, 1)),
                right: Box::new(node),
            };
        }

        let model = DecisionTree {
            root_node: node,
            feature_kinds: vec![FeatureKind::Real],
        };

        assert_eq!(model.depth(), depth);
        assert_eq!(model.num_leaves(), depth + 1);
        assert_eq!(model.predict_row(&array![Value::real(1e9)]).unwrap(), 1);
        assert_eq!(model.predict_row(&array![Value::real(-0.5)]).unwrap(), 0);

        let copy = model.clone();
        assert!(copy == model);

        let mut other = copy.clone();
        if let TreeNode::Internal { left, .. } = &mut other.root_node {
            **left = TreeNode::leaf(1, 1);
        }
        assert!(other != model);
    }

    #[test]
    fn fitted_chain_tree() -> Result<()> {
        // alternating labels along a sorted feature peel off one sample per split
        let n = 3000;
        let records = Array::from_shape_fn((n, 1), |(row, _)| Value::real(row as f64));
        let targets = Array::from_shape_fn(n, |row| row % 2);
        let dataset = Dataset::new(records.clone(), targets.clone());

        let model = DecisionTree::params(vec![FeatureKind::Real]).fit(&dataset)?;

        assert_eq!(model.num_leaves(), n);
        assert_eq!(model.depth(), n - 1);
        assert_eq!(model.predict(&records), targets);
        assert!(model.clone() == model);

        Ok(())
    }

    #[test]
    fn adjacent_floats_are_split() -> Result<()> {
        let upper = 1.0f32 + f32::EPSILON;
        let records = array![[Value::real(1.0f32)], [Value::real(upper)]];
        let dataset = Dataset::new(records.clone(), array![0, 1]);

        let model = DecisionTree::params(vec![FeatureKind::Real]).fit(&dataset)?;

        assert!(!model.root_node().is_terminal());
        assert_eq!(model.predict(&records), array![0, 1]);

        Ok(())
    }

    #[test]
    fn largest_floats_are_split() -> Result<()> {
        let records = array![[Value::real(0.75 * f64::MAX)], [Value::real(f64::MAX)]];
        let dataset = Dataset::new(records.clone(), array![0, 1]);

        let model = DecisionTree::params(vec![FeatureKind::Real]).fit(&dataset)?;

        match model.root_node().split() {
            Some((0, SplitRule::Threshold(threshold))) => assert!(threshold.is_finite()),
            other => panic!("expected a threshold split, got {:?}", other),
        }
        assert_eq!(model.predict(&records), array![0, 1]);

        Ok(())
    }
}
