use thiserror::Error;

use crate::FeatureKind;

/// Simplified `Result` using [`CartError`] as error type
pub type Result<T> = std::result::Result<T, CartError>;

#[derive(Error, Debug)]
pub enum CartError {
    #[error("unknown feature kind {0:?}, expected \"real\" or \"categorical\"")]
    UnknownFeatureKind(String),
    #[error("minimum samples to split should be at least 1, but is {0}")]
    InvalidMinSamplesSplit(usize),
    #[error("minimum samples per leaf should be at least 1, but is {0}")]
    InvalidMinSamplesLeaf(usize),
    #[error("cannot fit a decision tree on an empty dataset")]
    EmptyDataset,
    #[error("expected {expected} features, but the records have {found}")]
    FeatureCountMismatch { expected: usize, found: usize },
    #[error("number of samples {samples} does not match number of targets {targets}")]
    TargetCountMismatch { samples: usize, targets: usize },
    #[error("target {index} is {label}, but only 0 and 1 are valid labels")]
    NonBinaryLabel { index: usize, label: usize },
    #[error("value at row {row}, feature {feature} is not of kind {expected:?}")]
    KindMismatch {
        row: usize,
        feature: usize,
        expected: FeatureKind,
    },
    #[error("value at row {row}, feature {feature} is NaN")]
    NanValue { row: usize, feature: usize },
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}
