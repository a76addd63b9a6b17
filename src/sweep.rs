use crate::null_distribution::{derive_seeds, NullDistributionBuilder, NullSummary, DEFAULT_BATCH_SIZE};
use crate::population::{GroupSizeLayout, GroupedPopulation};
use crate::process::NullModelError;
use crate::stats::{mean_survival_rate, opportunity_for_selection};

use indicatif::{ProgressBar, ProgressStyle};
use itertools::iproduct;
use log::info;
use rayon::prelude::*;
use std::fmt;

/// Statistic tracked by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatistic {
    /// Across-group mean survival rate; whole-collection sampling.
    MeanSurvivalRate,
    /// Opportunity for selection; region-only sampling.
    OpportunityForSelection,
}

impl fmt::Display for SweepStatistic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SweepStatistic::MeanSurvivalRate => write!(f, "mean_survival_rate"),
            SweepStatistic::OpportunityForSelection => write!(f, "opportunity_for_selection"),
        }
    }
}

/// One point of a parameter grid. Results are keyed by this value.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepCell {
    pub statistic: SweepStatistic,
    /// Overall survival probability; K = round(survival * draw_population).
    pub survival: f64,
    pub group_count: usize,
    pub layout: GroupSizeLayout,
    /// Nr: plants split across the groups.
    pub region_population: usize,
    /// N: plants shuffled per draw. Equal to Nr for region-only sampling.
    pub draw_population: usize,
}

impl SweepCell {
    pub fn success_count(&self) -> usize {
        (self.survival * self.draw_population as f64).round() as usize
    }

    pub fn population(&self) -> Result<GroupedPopulation, NullModelError> {
        if !(0.0..=1.0).contains(&self.survival) {
            return Err(NullModelError::InvalidConfiguration(format!(
                "survival probability {} is outside [0, 1]",
                self.survival
            )));
        }
        let sizes = self.layout.sizes(self.region_population, self.group_count)?;
        GroupedPopulation::new(sizes, self.draw_population, self.success_count())
    }

    fn extract(&self, rates: &[f64]) -> f64 {
        match self.statistic {
            SweepStatistic::MeanSurvivalRate => mean_survival_rate(rates),
            SweepStatistic::OpportunityForSelection => opportunity_for_selection(rates),
        }
    }
}

impl fmt::Display for SweepCell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} p={} groups={} layout={} Nr={} N={}",
            self.statistic,
            self.survival,
            self.group_count,
            self.layout,
            self.region_population,
            self.draw_population
        )
    }
}

/// Survival probability × group count × group size, drawing groups of equal
/// size out of a fixed superpopulation.
#[derive(Debug, Clone)]
pub struct SurvivalRateGrid {
    pub survival: Vec<f64>,
    pub group_counts: Vec<usize>,
    pub group_sizes: Vec<usize>,
    pub draw_population: usize,
}

impl SurvivalRateGrid {
    pub fn cells(&self) -> Vec<SweepCell> {
        iproduct!(&self.survival, &self.group_counts, &self.group_sizes)
            .map(|(&survival, &group_count, &group_size)| SweepCell {
                statistic: SweepStatistic::MeanSurvivalRate,
                survival,
                group_count,
                layout: GroupSizeLayout::Even,
                region_population: group_count * group_size,
                draw_population: self.draw_population,
            })
            .collect()
    }
}

/// Survival probability × group count × evenness × region population, with
/// only the region's own plants shuffled.
#[derive(Debug, Clone)]
pub struct OpportunityGrid {
    pub survival: Vec<f64>,
    pub group_counts: Vec<usize>,
    pub layouts: Vec<GroupSizeLayout>,
    pub region_populations: Vec<usize>,
}

impl OpportunityGrid {
    pub fn cells(&self) -> Vec<SweepCell> {
        iproduct!(
            &self.survival,
            &self.group_counts,
            &self.layouts,
            &self.region_populations
        )
        .map(|(&survival, &group_count, &layout, &population)| SweepCell {
            statistic: SweepStatistic::OpportunityForSelection,
            survival,
            group_count,
            layout,
            region_population: population,
            draw_population: population,
        })
        .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SweepResult {
    pub cell: SweepCell,
    pub seed: u64,
    pub summary: NullSummary,
}

/// Runs one null distribution per grid cell.
pub struct SweepRunner {
    iterations: usize,
    seed: u64,
    batch_size: usize,
    show_progress: bool,
}

impl SweepRunner {
    pub fn new(iterations: usize, seed: u64) -> Self {
        SweepRunner {
            iterations,
            seed,
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Every cell is validated before any simulation starts; one invalid cell
    /// fails the whole sweep. Cell `i` gets the `i`-th seed drawn from a
    /// ChaCha8 generator seeded with the runner's seed.
    pub fn run(&self, cells: &[SweepCell]) -> Result<Vec<SweepResult>, NullModelError> {
        let populations = cells
            .iter()
            .map(|cell| {
                cell.population().map_err(|e| match e {
                    NullModelError::InvalidConfiguration(msg) => {
                        NullModelError::InvalidConfiguration(format!("{}: {}", cell, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let seeds = derive_seeds(self.seed, cells.len());

        info!(
            "Running {} sweep cells with {} iterations each",
            cells.len(),
            self.iterations
        );

        let progress = if self.show_progress {
            let bar = ProgressBar::new(cells.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let results: Vec<SweepResult> = cells
            .par_iter()
            .zip(populations.par_iter())
            .zip(seeds.par_iter())
            .map(|((cell, population), &seed)| {
                let null = NullDistributionBuilder::new(self.iterations)
                    .seed(seed)
                    .batch_size(self.batch_size)
                    .run(population, |draw| cell.extract(draw.rates));
                progress.inc(1);
                SweepResult {
                    cell: cell.clone(),
                    seed,
                    summary: null.summary(),
                }
            })
            .collect();

        progress.finish_with_message("Sweep complete");
        Ok(results)
    }
}
