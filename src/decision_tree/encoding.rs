//! Ordinal encoding of categorical features
//!
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use linfa::Float;

/// Running label statistics of a single category
struct CategoryStats<'a> {
    token: &'a str,
    count: usize,
    positives: usize,
}

impl<'a> CategoryStats<'a> {
    /// Compares positive rates exactly by cross multiplication of the counts
    fn cmp_rate(&self, other: &Self) -> Ordering {
        (self.positives * other.count).cmp(&(other.positives * self.count))
    }
}

/// Mapping between the tokens of a categorical feature and their ordinal codes
///
/// Codes are assigned in ascending order of the empirical positive rate of each category,
/// so that a threshold on the codes separates rarely positive categories from often
/// positive ones.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEncoding<'a> {
    categories: Vec<&'a str>,
    codes: HashMap<&'a str, usize>,
}

impl<'a> CategoryEncoding<'a> {
    /// The tokens ordered by their code
    pub fn categories(&self) -> &[&'a str] {
        &self.categories
    }

    /// Returns the code of `token`, or `None` if the token was never observed
    pub fn code(&self, token: &str) -> Option<usize> {
        self.codes.get(token).copied()
    }

    /// Translates a threshold on the codes back into the set of categories routed left
    pub fn categories_below<F: Float>(&self, threshold: F) -> BTreeSet<String> {
        self.categories
            .iter()
            .enumerate()
            .filter(|(code, _)| F::cast(*code) < threshold)
            .map(|(_, token)| token.to_string())
            .collect()
    }
}

/// Encodes the tokens of a categorical feature as ordinal codes
///
/// Each distinct category gets the rate `positives / occurrences` among its rows. The
/// categories are stably sorted by that rate, so equal rates keep the order of first
/// occurrence, and receive the codes `0..k` in that order.
///
/// ### Returns
///
/// The code of every row, as a number ready for the threshold search, together with the
/// encoding used.
///
/// ```rust
/// use linfa_cart::encode_categories;
///
/// let (codes, encoding) =
///     encode_categories::<f64>(&["a", "a", "b", "b", "c", "c"], &[0, 0, 1, 1, 0, 1]);
///
/// assert_eq!(encoding.categories(), &["a", "c", "b"]);
/// assert_eq!(codes, vec![0., 0., 2., 2., 1., 1.]);
/// ```
///
/// ### Panics
///
/// If `values` and `labels` differ in length
pub fn encode_categories<'a, F: Float>(
    values: &[&'a str],
    labels: &[usize],
) -> (Vec<F>, CategoryEncoding<'a>) {
    assert_eq!(
        values.len(),
        labels.len(),
        "Every category needs a matching label."
    );

    let mut first_seen = HashMap::new();
    let mut stats: Vec<CategoryStats> = Vec::new();

    for (token, label) in values.iter().zip(labels) {
        let idx = *first_seen.entry(*token).or_insert_with(|| {
            stats.push(CategoryStats {
                token: *token,
                count: 0,
                positives: 0,
            });
            stats.len() - 1
        });

        stats[idx].count += 1;
        if *label == 1 {
            stats[idx].positives += 1;
        }
    }

    // `sort_by` is stable
    stats.sort_by(|a, b| a.cmp_rate(b));

    let categories: Vec<&str> = stats.iter().map(|category| category.token).collect();
    let codes: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(code, token)| (*token, code))
        .collect();

    let ordinal = values.iter().map(|token| F::cast(codes[token])).collect();

    (ordinal, CategoryEncoding { categories, codes })
}
