use crate::permutation::PermutationEngine;
use crate::population::GroupedPopulation;
use crate::stats::{group_survivors_into, survival_rates_into};

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::BTreeMap;

pub const DEFAULT_ITERATIONS: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Quantiles reported for every scenario.
pub const SUMMARY_QUANTILES: [f64; 4] = [0.025, 0.05, 0.5, 0.975];

/// Independent child seeds for `n` runs, drawn from a ChaCha8 generator
/// seeded with `seed`. Used to give every scenario of a batch of scenarios
/// its own reproducible seed.
pub fn derive_seeds(seed: u64, n: usize) -> Vec<u64> {
    let mut seeder = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| seeder.gen()).collect()
}

/// One permuted assignment as seen by a statistic extractor.
pub struct Draw<'a> {
    pub survivors: &'a [usize],
    pub rates: &'a [f64],
}

/// Empirical distribution of a statistic over k null replicates.
///
/// Only defined values are kept, sorted ascending. Replicates where the
/// statistic was undefined (NaN, e.g. a zero mean in a ratio) are counted in
/// `undefined` and excluded from every aggregate; `iterations` still reports k.
#[derive(Debug, Clone, PartialEq)]
pub struct NullDistribution {
    sorted: Vec<f64>,
    iterations: usize,
    undefined: usize,
}

impl NullDistribution {
    pub fn from_values(values: Vec<f64>) -> Self {
        let iterations = values.len();
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        NullDistribution {
            undefined: iterations - sorted.len(),
            sorted,
            iterations,
        }
    }

    /// Total replicates run, defined or not.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of defined values.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn undefined(&self) -> usize {
        self.undefined
    }

    /// Defined values in ascending order.
    pub fn values(&self) -> &[f64] {
        &self.sorted
    }

    pub fn mean(&self) -> f64 {
        crate::stats::mean(&self.sorted)
    }

    /// Sample variance (n - 1) of the defined values.
    pub fn variance(&self) -> f64 {
        crate::stats::sample_variance(&self.sorted)
    }

    /// Linear-interpolation quantile (the conventional "type 7" definition).
    /// NaN for an empty distribution or `p` outside [0, 1].
    pub fn quantile(&self, p: f64) -> f64 {
        if self.sorted.is_empty() || !(0.0..=1.0).contains(&p) {
            return f64::NAN;
        }
        if self.sorted.len() == 1 {
            return self.sorted[0];
        }
        let pos = p * (self.sorted.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(self.sorted.len() - 1);
        let frac = pos - lo as f64;
        self.sorted[lo] * (1.0 - frac) + self.sorted[hi] * frac
    }

    pub fn ci_width(&self, lower: f64, upper: f64) -> f64 {
        self.quantile(upper) - self.quantile(lower)
    }

    pub fn summary(&self) -> NullSummary {
        NullSummary {
            mean: self.mean(),
            variance: self.variance(),
            q025: self.quantile(SUMMARY_QUANTILES[0]),
            q05: self.quantile(SUMMARY_QUANTILES[1]),
            median: self.quantile(SUMMARY_QUANTILES[2]),
            q975: self.quantile(SUMMARY_QUANTILES[3]),
            ci_width: self.ci_width(0.025, 0.975),
            iterations: self.iterations,
            undefined: self.undefined,
        }
    }
}

/// Aggregates of one null distribution, as emitted for plotting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NullSummary {
    pub mean: f64,
    pub variance: f64,
    pub q025: f64,
    pub q05: f64,
    pub median: f64,
    pub q975: f64,
    /// q975 - q025
    pub ci_width: f64,
    pub iterations: usize,
    pub undefined: usize,
}

/// Runs k permutation replicates of a `GroupedPopulation` and collects the
/// statistics extracted from each.
///
/// Replicates are split into fixed-size batches. Batch `b` draws from its own
/// ChaCha8 stream (`seed`, stream `b`) and batches run on the rayon pool, then
/// are concatenated in batch order. The output depends on the seed and batch
/// size only, never on the number of threads.
#[derive(Debug, Clone)]
pub struct NullDistributionBuilder {
    iterations: usize,
    seed: u64,
    batch_size: usize,
}

impl NullDistributionBuilder {
    pub fn new(iterations: usize) -> Self {
        NullDistributionBuilder {
            iterations,
            seed: rand::random(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Builds the null distribution of a single statistic.
    pub fn run<F>(&self, population: &GroupedPopulation, extractor: F) -> NullDistribution
    where
        F: Fn(&Draw) -> f64 + Sync,
    {
        let values = self.collect(population, 1, |draw, out| out[0] = extractor(draw));
        NullDistribution::from_values(values)
    }

    /// Builds several paired null distributions, one per label, all extracted
    /// from the same permutation in each replicate.
    pub fn run_labeled<F>(
        &self,
        population: &GroupedPopulation,
        labels: &[String],
        extractor: F,
    ) -> BTreeMap<String, NullDistribution>
    where
        F: Fn(&Draw, &mut [f64]) + Sync,
    {
        let width = labels.len();
        if width == 0 {
            return BTreeMap::new();
        }
        let flat = self.collect(population, width, extractor);

        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(self.iterations); width];
        for row in flat.chunks_exact(width) {
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        labels
            .iter()
            .cloned()
            .zip(columns.into_iter().map(NullDistribution::from_values))
            .collect()
    }

    // Row-major: `width` values per replicate, replicates in batch order.
    fn collect<F>(&self, population: &GroupedPopulation, width: usize, extractor: F) -> Vec<f64>
    where
        F: Fn(&Draw, &mut [f64]) + Sync,
    {
        let batch_size = self.batch_size;
        let n_batches = self.iterations.div_ceil(batch_size);
        let spans = population.group_boundaries();
        let sizes = population.group_sizes();

        let partials: Vec<Vec<f64>> = (0..n_batches)
            .into_par_iter()
            .map(|batch| {
                let done = batch.saturating_mul(batch_size);
                let len = batch_size.min(self.iterations.saturating_sub(done));
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                rng.set_stream(batch as u64);

                let mut engine = PermutationEngine::new(population);
                let mut survivors = Vec::with_capacity(spans.len());
                let mut rates = Vec::with_capacity(spans.len());
                let mut row = vec![f64::NAN; width];
                let mut values = Vec::with_capacity(len * width);

                for _ in 0..len {
                    engine.permute(&mut rng);
                    group_survivors_into(engine.assigned(), spans, &mut survivors);
                    survival_rates_into(&survivors, sizes, &mut rates);
                    row.fill(f64::NAN);
                    extractor(
                        &Draw {
                            survivors: &survivors,
                            rates: &rates,
                        },
                        &mut row,
                    );
                    values.extend_from_slice(&row);
                }
                debug!("Batch {} finished: {} replicates", batch, len);
                values
            })
            .collect();

        partials.concat()
    }
}
