//!
//! # Binary decision trees over mixed features
//! `linfa-cart` provides a pure Rust implementation of CART decision tree learning
//! for binary classification over tables that mix real-valued and categorical columns.
//!
//! # The big picture
//!
//! `linfa-cart` is a crate in the [linfa](https://github.com/rust-ml/linfa) ecosystem,
//! an effort to create a toolkit for classical Machine Learning implemented in pure Rust, akin to Python's scikit-learn.
//!
//! A decision tree recursively partitions the training set so that the weighted Gini impurity of the
//! resulting subsets is as small as possible. Real features are split with a threshold. Categorical features
//! are first ranked by their empirical rate of positive labels, which turns them into ordinal codes that can be
//! split with the very same threshold search; the winning threshold is then translated back into a set of
//! categories.
//!
//! # Current state
//!
//! `linfa-cart` provides an [implementation](DecisionTree) of single-tree fitting for binary targets
//! (`0` or `1`), the [split search](find_best_split) and the [category encoding](encode_categories) it is
//! built on.
//!
//! ```rust
//! use linfa::prelude::*;
//! use linfa_cart::{DecisionTree, FeatureKind, Value};
//! use ndarray::array;
//!
//! let records = array![
//!     [Value::real(1.0), Value::category("a")],
//!     [Value::real(2.0), Value::category("b")],
//!     [Value::real(3.0), Value::category("a")],
//!     [Value::real(4.0), Value::category("b")],
//! ];
//! let targets = array![0, 0, 1, 1];
//! let dataset = Dataset::new(records.clone(), targets);
//!
//! let tree = DecisionTree::params(vec![FeatureKind::Real, FeatureKind::Categorical])
//!     .max_depth(Some(3))
//!     .fit(&dataset)
//!     .unwrap();
//!
//! assert_eq!(tree.predict(&records), array![0, 0, 1, 1]);
//! ```

mod decision_tree;
mod error;

pub use decision_tree::*;
pub use error::{CartError, Result};
