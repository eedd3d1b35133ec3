//! Threshold search on a single feature
//!
use linfa::Float;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// A candidate cut of a single feature together with its score
///
/// The score is the negative weighted Gini impurity of the two sides, so higher is better
/// and `0` is a perfect split.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Split<F> {
    pub threshold: F,
    pub score: F,
}

/// Gini impurity `1 - p_0^2 - p_1^2` of a subset with `ones` positive labels out of `total`.
///
/// An empty subset has zero impurity.
pub fn gini_impurity<F: Float>(ones: usize, total: usize) -> F {
    if total == 0 {
        return F::zero();
    }

    let p1 = F::cast(ones) / F::cast(total);
    let p0 = F::one() - p1;

    F::one() - p0 * p0 - p1 * p1
}

/// Scores every realizable threshold of a feature
///
/// The samples are sorted by value and each boundary between two distinct consecutive values
/// yields the midpoint as candidate threshold. When the midpoint is not representable above the
/// lower value, the upper value is the threshold instead, so every candidate separates the two. Samples with `value < threshold` form the left
/// side. Running counts of the positive labels on the left give the score of each candidate
/// without rescanning the samples.
///
/// ### Returns
///
/// The candidates in ascending threshold order. The vector is empty if the feature has fewer
/// than two distinct values.
///
/// ### Panics
///
/// If `values` and `labels` differ in length, or if `values` contains NaN
pub fn split_scores<F: Float>(values: &[F], labels: &[usize]) -> Vec<Split<F>> {
    assert_eq!(
        values.len(),
        labels.len(),
        "Every feature value needs a matching label."
    );

    assert!(
        values.iter().all(|value| !value.is_nan()),
        "Feature values must not be NaN."
    );

    let nsamples = values.len();
    let mut sorted: Vec<(F, usize)> = values.iter().copied().zip(labels.iter().copied()).collect();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Greater));

    let total_ones = sorted.iter().filter(|(_, label)| *label == 1).count();
    let mut left_ones = 0;
    let mut candidates = Vec::new();

    for i in 0..nsamples.saturating_sub(1) {
        let (value, label) = sorted[i];
        if label == 1 {
            left_ones += 1;
        }

        let next_value = sorted[i + 1].0;
        // equal values always end up on the same side
        if value == next_value {
            continue;
        }

        let left_total = i + 1;
        let right_total = nsamples - left_total;
        let right_ones = total_ones - left_ones;

        let left_weight = F::cast(left_total) / F::cast(nsamples);
        let right_weight = F::cast(right_total) / F::cast(nsamples);
        let score = -left_weight * gini_impurity::<F>(left_ones, left_total)
            - right_weight * gini_impurity::<F>(right_ones, right_total);

        candidates.push(Split {
            threshold: midpoint(value, next_value),
            score,
        });
    }

    candidates
}

/// Threshold strictly above `lower` and at most `upper`
fn midpoint<F: Float>(lower: F, upper: F) -> F {
    // halving first keeps the sum finite near the largest floats
    let half = F::cast(0.5);
    let mid = lower * half + upper * half;
    if mid > lower {
        mid
    } else {
        upper
    }
}

/// Finds the threshold of a feature which minimizes the weighted Gini impurity
///
/// On equal scores the smallest threshold is kept. Returns `None` if the feature has
/// fewer than two distinct values, as no split separates anything then.
///
/// ```rust
/// use linfa_cart::find_best_split;
///
/// let best = find_best_split(&[1.0, 2.0, 3.0, 4.0], &[0, 0, 1, 1]).unwrap();
/// assert_eq!(best.threshold, 2.5);
/// assert_eq!(best.score, 0.0);
/// ```
pub fn find_best_split<F: Float>(values: &[F], labels: &[usize]) -> Option<Split<F>> {
    split_scores(values, labels)
        .into_iter()
        .fold(None, |best: Option<Split<F>>, candidate| match best {
            Some(best) if best.score >= candidate.score => Some(best),
            _ => Some(candidate),
        })
}
