use linfa::{Float, ParamGuard};
use std::marker::PhantomData;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{CartError, Result};
use crate::{DecisionTree, FeatureKind};

/// The set of hyperparameters that can be specified for fitting a
/// [decision tree](DecisionTree).
///
/// ### Example
///
/// ```rust
/// use linfa_cart::{DecisionTree, DecisionTreeParams, FeatureKind, Value};
/// use linfa::prelude::*;
/// use ndarray::array;
///
/// // Describe the columns, either directly or by name
/// let params = DecisionTree::<f64>::params(vec![FeatureKind::Real, FeatureKind::Categorical]);
/// let same = DecisionTreeParams::<f64>::from_kind_names(&["real", "categorical"]).unwrap();
/// assert_eq!(params, same);
///
/// // Set the stopping criteria
/// let params = params.max_depth(Some(2)).min_samples_leaf(Some(1));
///
/// let records = array![
///     [Value::real(0.5), Value::category("red")],
///     [Value::real(1.5), Value::category("blue")],
///     [Value::real(2.5), Value::category("red")],
/// ];
/// let dataset = Dataset::new(records, array![0, 1, 0]);
///
/// let tree = params.fit(&dataset).unwrap();
/// assert!(tree.depth() <= 2);
/// ```
///
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionTreeValidParams<F> {
    feature_kinds: Vec<FeatureKind>,
    max_depth: Option<usize>,
    min_samples_split: Option<usize>,
    min_samples_leaf: Option<usize>,

    float_marker: PhantomData<F>,
}

impl<F: Float> DecisionTreeValidParams<F> {
    pub fn feature_kinds(&self) -> &[FeatureKind] {
        &self.feature_kinds
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn min_samples_split(&self) -> Option<usize> {
        self.min_samples_split
    }

    pub fn min_samples_leaf(&self) -> Option<usize> {
        self.min_samples_leaf
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionTreeParams<F>(DecisionTreeValidParams<F>);

impl<F: Float> DecisionTreeParams<F> {
    /// Creates parameters for records whose column `j` has kind `feature_kinds[j]`,
    /// without any stopping limit
    pub fn new<I: IntoIterator<Item = FeatureKind>>(feature_kinds: I) -> Self {
        Self(DecisionTreeValidParams {
            feature_kinds: feature_kinds.into_iter().collect(),
            max_depth: None,
            min_samples_split: None,
            min_samples_leaf: None,
            float_marker: PhantomData,
        })
    }

    /// Creates parameters from feature kind names, `"real"` or `"categorical"`
    ///
    /// Fails with [`CartError::UnknownFeatureKind`] on the first other name.
    pub fn from_kind_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let feature_kinds = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<FeatureKind>>>()?;

        Ok(Self::new(feature_kinds))
    }

    /// Sets the optional limit to the number of splits on any path from the root
    ///
    /// A limit of zero fits a single leaf.
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.0.max_depth = max_depth;
        self
    }

    /// Sets the optional minimum number of samples a node needs to be split
    pub fn min_samples_split(mut self, min_samples_split: Option<usize>) -> Self {
        self.0.min_samples_split = min_samples_split;
        self
    }

    /// Sets the optional minimum number of samples a split has to place in each child.
    ///
    /// A node whose best split violates this limit becomes a leaf.
    pub fn min_samples_leaf(mut self, min_samples_leaf: Option<usize>) -> Self {
        self.0.min_samples_leaf = min_samples_leaf;
        self
    }
}

impl<F: Float> DecisionTree<F> {
    /// Defaults are provided if the optional parameters are not specified:
    /// * `max_depth = None`
    /// * `min_samples_split = None`
    /// * `min_samples_leaf = None`
    // Violates the convention that new should return a value of type `Self`
    #[allow(clippy::new_ret_no_self)]
    pub fn params<I: IntoIterator<Item = FeatureKind>>(feature_kinds: I) -> DecisionTreeParams<F> {
        DecisionTreeParams::new(feature_kinds)
    }
}

impl<F: Float> ParamGuard for DecisionTreeParams<F> {
    type Checked = DecisionTreeValidParams<F>;
    type Error = CartError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        match (self.0.min_samples_split, self.0.min_samples_leaf) {
            (Some(0), _) => Err(CartError::InvalidMinSamplesSplit(0)),
            (_, Some(0)) => Err(CartError::InvalidMinSamplesLeaf(0)),
            _ => Ok(&self.0),
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
