use crate::population::GroupSpan;

/// Counts the survivors (ones) in each group's slice of the outcome vector.
///
/// # Arguments
/// * `outcomes` - Flat 0/1 outcome vector, at least as long as the last span's end
/// * `spans` - Half-open group ranges from `GroupedPopulation::group_boundaries`
///
/// # Returns
/// * Survivor count per group, in span order
pub fn group_survivors(outcomes: &[u8], spans: &[GroupSpan]) -> Vec<usize> {
    let mut survivors = Vec::with_capacity(spans.len());
    group_survivors_into(outcomes, spans, &mut survivors);
    survivors
}

/// Same as `group_survivors`, writing into a reused buffer.
pub fn group_survivors_into(outcomes: &[u8], spans: &[GroupSpan], survivors: &mut Vec<usize>) {
    survivors.clear();
    survivors.extend(
        spans
            .iter()
            .map(|span| span.slice(outcomes).iter().map(|&x| x as usize).sum::<usize>()),
    );
}

/// Per-group survival rate (survivors / group size).
pub fn survival_rates(survivors: &[usize], sizes: &[usize]) -> Vec<f64> {
    let mut rates = Vec::with_capacity(sizes.len());
    survival_rates_into(survivors, sizes, &mut rates);
    rates
}

pub fn survival_rates_into(survivors: &[usize], sizes: &[usize], rates: &mut Vec<f64>) {
    rates.clear();
    rates.extend(
        survivors
            .iter()
            .zip(sizes)
            .map(|(&alive, &size)| alive as f64 / size as f64),
    );
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with the n - 1 denominator; NaN for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Mean survival rate across groups.
///
/// This is the mean of the per-group ratios, so every maternal line weighs the
/// same regardless of how many plants it started with. It is not
/// pooled survivors / pooled size.
pub fn mean_survival_rate(rates: &[f64]) -> f64 {
    mean(rates)
}

/// Opportunity for selection: the squared coefficient of variation of the
/// per-accession survival rates, (sd / mean)^2.
///
/// NaN when the mean is zero or fewer than two rates are given.
pub fn opportunity_for_selection(rates: &[f64]) -> f64 {
    let m = mean(rates);
    if m == 0.0 {
        return f64::NAN;
    }
    sample_variance(rates) / (m * m)
}

/// Selection coefficient of a region relative to a reference region,
/// mean_r / mean_ref - 1. NaN when the reference mean is zero.
pub fn selection_coefficient(region_mean: f64, reference_mean: f64) -> f64 {
    if reference_mean == 0.0 {
        return f64::NAN;
    }
    region_mean / reference_mean - 1.0
}

/// Nesting of accession groups within regions.
#[derive(Debug, Clone)]
pub struct RegionLayout {
    pub region_ids: Vec<String>,
    /// Indices into the group (accession) sequence, per region.
    pub members: Vec<Vec<usize>>,
    /// Initial plant count per region.
    pub plant_totals: Vec<usize>,
}

impl RegionLayout {
    pub fn region_count(&self) -> usize {
        self.region_ids.len()
    }

    pub fn index_of(&self, region_id: &str) -> Option<usize> {
        self.region_ids.iter().position(|id| id == region_id)
    }

    /// Mean of the accession survival rates within each region.
    pub fn region_means(&self, rates: &[f64]) -> Vec<f64> {
        let mut means = vec![f64::NAN; self.members.len()];
        self.region_means_into_slice(rates, &mut means);
        means
    }

    /// Writes the region means into `means`, one slot per region.
    pub fn region_means_into_slice(&self, rates: &[f64], means: &mut [f64]) {
        for (slot, members) in means.iter_mut().zip(&self.members) {
            *slot = if members.is_empty() {
                f64::NAN
            } else {
                members.iter().map(|&g| rates[g]).sum::<f64>() / members.len() as f64
            };
        }
    }
}

/// Picks the reference region for selection coefficients: the region with the
/// most plants among those with a nonzero mean survival rate. Ties go to the
/// region listed first. `None` if every region has zero (or undefined) survival.
pub fn reference_region(region_means: &[f64], plant_totals: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, (&m, &total)) in region_means.iter().zip(plant_totals).enumerate() {
        if m.is_nan() || m <= 0.0 {
            continue;
        }
        match best {
            Some(b) if plant_totals[b] >= total => {}
            _ => best = Some(idx),
        }
    }
    best
}

/// Group-level summary of one (observed or permuted) assignment.
#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub survivors: Vec<usize>,
    pub rates: Vec<f64>,
    pub mean_rate: f64,
    pub rate_variance: f64,
}

impl GroupSummary {
    pub fn from_outcomes(outcomes: &[u8], spans: &[GroupSpan], sizes: &[usize]) -> Self {
        let survivors = group_survivors(outcomes, spans);
        Self::from_survivors(survivors, sizes)
    }

    pub fn from_survivors(survivors: Vec<usize>, sizes: &[usize]) -> Self {
        let rates = survival_rates(&survivors, sizes);
        GroupSummary {
            mean_rate: mean_survival_rate(&rates),
            rate_variance: sample_variance(&rates),
            survivors,
            rates,
        }
    }

    pub fn opportunity_for_selection(&self) -> f64 {
        opportunity_for_selection(&self.rates)
    }
}
