use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use linfa::Float;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::CartError;

/// The kind of a feature column, which decides how the column is split
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Ordered numeric values, split with a threshold
    Real,
    /// Unordered tokens, split with a set of categories
    Categorical,
}

impl FromStr for FeatureKind {
    type Err = CartError;

    /// Parses `"real"` or `"categorical"`, ignoring case
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "real" => Ok(FeatureKind::Real),
            "categorical" => Ok(FeatureKind::Categorical),
            _ => Err(CartError::UnknownFeatureKind(name.to_string())),
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::Real => write!(f, "real"),
            FeatureKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// A single cell of the record matrix
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub enum Value<F> {
    Real(F),
    Category(String),
}

impl<F: Float> Value<F> {
    pub fn real(value: F) -> Self {
        Value::Real(value)
    }

    pub fn category<S: Into<String>>(token: S) -> Self {
        Value::Category(token.into())
    }

    /// Returns the kind of column this value belongs in
    pub fn kind(&self) -> FeatureKind {
        match self {
            Value::Real(_) => FeatureKind::Real,
            Value::Category(_) => FeatureKind::Categorical,
        }
    }

    pub fn as_real(&self) -> Option<F> {
        match self {
            Value::Real(value) => Some(*value),
            Value::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Value::Real(_) => None,
            Value::Category(token) => Some(token),
        }
    }
}

/// The decision applied by an internal node
///
/// Samples for which the rule holds are routed to the left child, all others to the right child.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub enum SplitRule<F> {
    /// Real features: left if `value < threshold`
    Threshold(F),
    /// Categorical features: left if the token is a member of the set
    CategorySet(BTreeSet<String>),
}

impl<F: Float> SplitRule<F> {
    /// The feature kind this rule can be evaluated on
    pub fn kind(&self) -> FeatureKind {
        match self {
            SplitRule::Threshold(_) => FeatureKind::Real,
            SplitRule::CategorySet(_) => FeatureKind::Categorical,
        }
    }

    /// Returns `Some(true)` if `value` goes to the left child, `Some(false)` if it goes
    /// to the right child and `None` if the value's kind doesn't fit the rule.
    pub fn goes_left(&self, value: &Value<F>) -> Option<bool> {
        match (self, value) {
            (SplitRule::Threshold(threshold), Value::Real(value)) => Some(*value < *threshold),
            (SplitRule::CategorySet(set), Value::Category(token)) => Some(set.contains(token)),
            _ => None,
        }
    }
}
