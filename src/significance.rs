use crate::null_distribution::NullDistribution;

/// Both tails of an empirical p-value. Neither is collapsed into the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalPValues {
    /// Fraction of null values <= observed.
    pub lower: f64,
    /// Fraction of null values >= observed.
    pub upper: f64,
}

/// Ranks an observed statistic against its null distribution.
///
/// The denominator is the number of defined null values; replicates where the
/// statistic was undefined take part in neither tail. Because ties count in
/// both tails, `lower + upper >= 1` whenever the distribution is non-empty.
/// A NaN observation or an empty distribution gives NaN for both tails.
pub fn empirical_p_values(observed: f64, null: &NullDistribution) -> EmpiricalPValues {
    if observed.is_nan() || null.is_empty() {
        return EmpiricalPValues {
            lower: f64::NAN,
            upper: f64::NAN,
        };
    }
    let values = null.values();
    let n = values.len() as f64;
    // values are sorted ascending
    let at_most = values.partition_point(|&v| v <= observed);
    let below = values.partition_point(|&v| v < observed);
    EmpiricalPValues {
        lower: at_most as f64 / n,
        upper: (values.len() - below) as f64 / n,
    }
}
