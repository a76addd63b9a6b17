use pyo3::prelude::*;

use crate::null_distribution::{NullDistribution, NullDistributionBuilder, DEFAULT_ITERATIONS};
use crate::population::{GroupSizeLayout, GroupedPopulation};
use crate::process::NullModelError;
use crate::significance::empirical_p_values;
use crate::stats::opportunity_for_selection;
use crate::sweep::{OpportunityGrid, SurvivalRateGrid, SweepResult, SweepRunner};

fn to_py_err(err: NullModelError) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(err.to_string())
}

type SweepRow = (String, f64, usize, String, usize, usize, f64, f64, f64);

fn sweep_rows(results: Vec<SweepResult>) -> Vec<SweepRow> {
    results
        .into_iter()
        .map(|r| {
            (
                r.cell.statistic.to_string(),
                r.cell.survival,
                r.cell.group_count,
                r.cell.layout.to_string(),
                r.cell.region_population,
                r.cell.draw_population,
                r.summary.mean,
                r.summary.variance,
                r.summary.ci_width,
            )
        })
        .collect()
}

/// Null distribution of the opportunity for selection within one region.
///
/// # Arguments
/// * `group_sizes` - Initial plant count of every accession in the region
/// * `survivors` - Survivors to shuffle over the region's plants
/// * `iterations` - Null replicates
/// * `seed` - Optional seed; a fresh one is drawn if omitted
///
/// # Returns
/// * The defined null values, sorted ascending
#[pyfunction]
#[pyo3(signature = (group_sizes, survivors, iterations = DEFAULT_ITERATIONS, seed = None))]
fn opportunity_null_py(
    group_sizes: Vec<usize>,
    survivors: usize,
    iterations: usize,
    seed: Option<u64>,
) -> PyResult<Vec<f64>> {
    let population = GroupedPopulation::region_only(group_sizes, survivors).map_err(to_py_err)?;
    let mut builder = NullDistributionBuilder::new(iterations);
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    let null = builder.run(&population, |draw| opportunity_for_selection(draw.rates));
    Ok(null.values().to_vec())
}

/// Lower and upper empirical p-values of `observed` against `null_values`.
#[pyfunction]
fn empirical_p_values_py(observed: f64, null_values: Vec<f64>) -> (f64, f64) {
    let p = empirical_p_values(observed, &NullDistribution::from_values(null_values));
    (p.lower, p.upper)
}

/// Mean survival rate sweep; one tuple per grid cell. A fresh seed is drawn
/// if none is given.
#[pyfunction]
#[pyo3(signature = (survival, group_counts, group_sizes, population = 800, iterations = DEFAULT_ITERATIONS, seed = None))]
fn sweep_survival_py(
    survival: Vec<f64>,
    group_counts: Vec<usize>,
    group_sizes: Vec<usize>,
    population: usize,
    iterations: usize,
    seed: Option<u64>,
) -> PyResult<Vec<SweepRow>> {
    let cells = SurvivalRateGrid {
        survival,
        group_counts,
        group_sizes,
        draw_population: population,
    }
    .cells();
    let results = SweepRunner::new(iterations, seed.unwrap_or_else(rand::random))
        .run(&cells).map_err(to_py_err)?;
    Ok(sweep_rows(results))
}

/// Opportunity for selection sweep; one tuple per grid cell.
#[pyfunction]
#[pyo3(signature = (survival, group_counts, layouts, populations, iterations = DEFAULT_ITERATIONS, seed = None))]
fn sweep_opportunity_py(
    survival: Vec<f64>,
    group_counts: Vec<usize>,
    layouts: Vec<String>,
    populations: Vec<usize>,
    iterations: usize,
    seed: Option<u64>,
) -> PyResult<Vec<SweepRow>> {
    let layouts = layouts
        .iter()
        .map(|l| l.parse::<GroupSizeLayout>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;
    let cells = OpportunityGrid {
        survival,
        group_counts,
        layouts,
        region_populations: populations,
    }
    .cells();
    let results = SweepRunner::new(iterations, seed.unwrap_or_else(rand::random))
        .run(&cells).map_err(to_py_err)?;
    Ok(sweep_rows(results))
}

/// PyO3 module definition
#[pymodule]
fn survnull(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(opportunity_null_py, m)?)?;
    m.add_function(wrap_pyfunction!(empirical_p_values_py, m)?)?;
    m.add_function(wrap_pyfunction!(sweep_survival_py, m)?)?;
    m.add_function(wrap_pyfunction!(sweep_opportunity_py, m)?)?;
    Ok(())
}
