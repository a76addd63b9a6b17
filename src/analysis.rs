use crate::collection::{Collection, NullModel};
use crate::null_distribution::{derive_seeds, NullDistributionBuilder, NullSummary, DEFAULT_BATCH_SIZE, DEFAULT_ITERATIONS};
use crate::process::NullModelError;
use crate::significance::{empirical_p_values, EmpiricalPValues};
use crate::stats::{mean_survival_rate, opportunity_for_selection, reference_region, selection_coefficient};

use log::{info, warn};
use std::fmt;

/// Statistic an observed test ranks against its null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedStatistic {
    MeanSurvivalRate,
    OpportunityForSelection,
    SelectionCoefficient,
}

impl fmt::Display for ObservedStatistic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObservedStatistic::MeanSurvivalRate => write!(f, "mean_survival_rate"),
            ObservedStatistic::OpportunityForSelection => write!(f, "opportunity_for_selection"),
            ObservedStatistic::SelectionCoefficient => write!(f, "selection_coefficient"),
        }
    }
}

/// Observed value of one statistic, its null summary and both p-value tails.
#[derive(Debug, Clone)]
pub struct ObservedTest {
    pub statistic: ObservedStatistic,
    /// Region id, or "collection" for collection-wide statistics.
    pub label: String,
    /// Reference region of the observed value, for selection coefficients.
    pub reference: Option<String>,
    pub model: NullModel,
    pub observed: f64,
    pub null: NullSummary,
    pub p: EmpiricalPValues,
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub iterations: usize,
    pub seed: u64,
    pub batch_size: usize,
    pub model: NullModel,
    /// Fixed reference region for the observed selection coefficients.
    /// Defaults to the largest region with nonzero survival.
    pub reference_region: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            iterations: DEFAULT_ITERATIONS,
            seed: rand::random(),
            batch_size: DEFAULT_BATCH_SIZE,
            model: NullModel::WholeCollection,
            reference_region: None,
        }
    }
}

impl AnalysisOptions {
    fn builder(&self, seed: u64) -> NullDistributionBuilder {
        NullDistributionBuilder::new(self.iterations)
            .seed(seed)
            .batch_size(self.batch_size)
    }
}

pub const COLLECTION_LABEL: &str = "collection";

/// Mean survival rate across all accessions against shuffling the
/// collection's survivors over all of its plants.
pub fn mean_survival_test(
    collection: &Collection,
    options: &AnalysisOptions,
) -> Result<ObservedTest, NullModelError> {
    let population = collection.collection_population()?;
    let observed = mean_survival_rate(&collection.accession_rates());

    info!(
        "Collection mean survival rate: observed {:.4} over {} accessions",
        observed,
        collection.accessions().len()
    );
    let null = options
        .builder(options.seed)
        .run(&population, |draw| mean_survival_rate(draw.rates));

    Ok(ObservedTest {
        statistic: ObservedStatistic::MeanSurvivalRate,
        label: COLLECTION_LABEL.to_string(),
        reference: None,
        model: NullModel::WholeCollection,
        observed,
        p: empirical_p_values(observed, &null),
        null: null.summary(),
    })
}

/// Opportunity for selection within every region against its null.
pub fn opportunity_tests(
    collection: &Collection,
    options: &AnalysisOptions,
) -> Result<Vec<ObservedTest>, NullModelError> {
    let regions = collection.regions();
    let populations = regions
        .iter()
        .map(|region| collection.region_population(region, options.model))
        .collect::<Result<Vec<_>, _>>()?;
    let seeds = derive_seeds(options.seed, regions.len());

    let mut tests = Vec::with_capacity(regions.len());
    for ((region, population), seed) in regions.iter().zip(&populations).zip(seeds) {
        if region.accessions.len() < 2 {
            warn!(
                "Region {} has a single accession; opportunity for selection is undefined",
                region.id
            );
        }
        let observed = opportunity_for_selection(&collection.region_rates(region));
        let null = options
            .builder(seed)
            .run(population, |draw| opportunity_for_selection(draw.rates));
        if null.undefined() > 0 {
            warn!(
                "Region {}: {} of {} null replicates had zero mean survival and were excluded",
                region.id,
                null.undefined(),
                null.iterations()
            );
        }
        info!(
            "Region {}: I observed {:.4}, null mean {:.4}",
            region.id,
            observed,
            null.mean()
        );
        tests.push(ObservedTest {
            statistic: ObservedStatistic::OpportunityForSelection,
            label: region.id.clone(),
            reference: None,
            model: options.model,
            observed,
            p: empirical_p_values(observed, &null),
            null: null.summary(),
        });
    }
    Ok(tests)
}

/// Selection coefficient of every region relative to a reference region.
///
/// The observed reference is `options.reference_region` if given, otherwise
/// the region with most plants among those with nonzero mean survival. In the
/// null, the reference is chosen again in every replicate by the same
/// largest-nonzero rule, so the null may use a different reference than the
/// observed value. All regions' coefficients come from the same collection-wide
/// permutation in each replicate.
pub fn selection_tests(
    collection: &Collection,
    options: &AnalysisOptions,
) -> Result<Vec<ObservedTest>, NullModelError> {
    let layout = collection.region_layout();
    let observed_means = layout.region_means(&collection.accession_rates());

    let reference = match &options.reference_region {
        Some(id) => layout.index_of(id).ok_or_else(|| {
            NullModelError::InvalidConfiguration(format!("reference region '{}' not found", id))
        })?,
        None => reference_region(&observed_means, &layout.plant_totals).ok_or_else(|| {
            NullModelError::InvalidConfiguration(
                "no region has nonzero survival; selection coefficients are undefined".to_string(),
            )
        })?,
    };
    let reference_mean = observed_means[reference];
    info!(
        "Selection coefficients relative to region {} (mean survival {:.4})",
        layout.region_ids[reference], reference_mean
    );

    let population = collection.collection_population()?;
    let null = options
        .builder(options.seed)
        .run_labeled(&population, &layout.region_ids, |draw, out| {
            layout.region_means_into_slice(draw.rates, out);
            match reference_region(out, &layout.plant_totals) {
                Some(r) => {
                    let ref_mean = out[r];
                    for value in out.iter_mut() {
                        *value = selection_coefficient(*value, ref_mean);
                    }
                }
                None => out.fill(f64::NAN),
            }
        });

    let mut tests = Vec::with_capacity(layout.region_count());
    for (idx, region_id) in layout.region_ids.iter().enumerate() {
        let observed = selection_coefficient(observed_means[idx], reference_mean);
        let Some(distribution) = null.get(region_id) else {
            continue;
        };
        tests.push(ObservedTest {
            statistic: ObservedStatistic::SelectionCoefficient,
            label: region_id.clone(),
            reference: Some(layout.region_ids[reference].clone()),
            model: NullModel::WholeCollection,
            observed,
            p: empirical_p_values(observed, distribution),
            null: distribution.summary(),
        });
    }
    Ok(tests)
}

/// Runs every observed analysis on a collection: the collection mean
/// survival rate, per-region opportunity for selection and per-region
/// selection coefficients. Each analysis draws its own seed from
/// `options.seed`.
pub fn analyze_collection(
    collection: &Collection,
    options: &AnalysisOptions,
) -> Result<Vec<ObservedTest>, NullModelError> {
    let seeds = derive_seeds(options.seed, 3);
    let with_seed = |seed| AnalysisOptions {
        seed,
        ..options.clone()
    };

    let mut tests = vec![mean_survival_test(collection, &with_seed(seeds[0]))?];
    tests.extend(opportunity_tests(collection, &with_seed(seeds[1]))?);
    tests.extend(selection_tests(collection, &with_seed(seeds[2]))?);
    Ok(tests)
}
