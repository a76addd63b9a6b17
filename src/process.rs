use crate::analysis::{analyze_collection, AnalysisOptions, ObservedTest};
use crate::collection::{Collection, NullModel};
use crate::null_distribution::{DEFAULT_BATCH_SIZE, DEFAULT_ITERATIONS};
use crate::parse::{parse_grid_file, parse_provenance_table, parse_survival_table};
use crate::population::GroupSizeLayout;
use crate::sweep::{OpportunityGrid, SurvivalRateGrid, SweepCell, SweepResult, SweepRunner, SweepStatistic};

use clap::{Parser, Subcommand};
use colored::*;
use csv::WriterBuilder;
use log::info;
use prettytable::{row, Table};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

// Define command-line arguments using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Worker threads for the simulation
    #[arg(short, long, global = true, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Log per-batch detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Test observed survival of a collection against its null models
    Observed(ObservedArgs),
    /// Sweep the null mean survival rate over survival × group count × group size
    SweepSurvival(SurvivalSweepArgs),
    /// Sweep the null opportunity for selection over survival × group count × layout × population
    SweepOpportunity(OpportunitySweepArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct SimulationArgs {
    /// Null replicates per scenario
    #[arg(short = 'k', long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Seed for the random source; a fresh seed is drawn and logged if omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Replicates per worker batch
    #[arg(long = "batch_size", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

impl SimulationArgs {
    pub fn resolve_seed(&self) -> u64 {
        let seed = self.seed.unwrap_or_else(rand::random);
        info!("Seed: {}", seed);
        seed
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ObservedArgs {
    /// Survival table: one row per plant with accession and dead columns
    #[arg(short, long)]
    pub survival: PathBuf,

    /// Provenance table: accession, region, latitude, longitude
    #[arg(short, long)]
    pub provenance: PathBuf,

    /// Null model for opportunity for selection: whole or region
    #[arg(short, long, default_value_t = NullModel::WholeCollection)]
    pub model: NullModel,

    /// Fixed reference region for observed selection coefficients
    #[arg(long = "reference_region")]
    pub reference_region: Option<String>,

    /// Output file (tab-separated)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SurvivalSweepArgs {
    /// Overall survival probabilities
    #[arg(long = "survival_probs", value_delimiter = ',', default_values_t = vec![0.5])]
    pub survival_probs: Vec<f64>,

    /// Numbers of groups (maternal lines)
    #[arg(long = "group_counts", value_delimiter = ',', default_values_t = vec![10])]
    pub group_counts: Vec<usize>,

    /// Plants per group
    #[arg(long = "group_sizes", value_delimiter = ',', default_values_t = vec![2])]
    pub group_sizes: Vec<usize>,

    /// Superpopulation the groups are drawn from
    #[arg(long, default_value_t = 800)]
    pub population: usize,

    /// Tab-separated grid, one row per cell; replaces the list options
    #[arg(long = "grid_file")]
    pub grid_file: Option<PathBuf>,

    /// Output file (tab-separated)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OpportunitySweepArgs {
    /// Overall survival probabilities
    #[arg(long = "survival_probs", value_delimiter = ',', default_values_t = vec![0.5])]
    pub survival_probs: Vec<f64>,

    /// Numbers of groups (maternal lines) in the region
    #[arg(long = "group_counts", value_delimiter = ',', default_values_t = vec![10])]
    pub group_counts: Vec<usize>,

    /// Group size layouts: even, skewed
    #[arg(long, value_delimiter = ',', default_values_t = vec![GroupSizeLayout::Even, GroupSizeLayout::Skewed])]
    pub layouts: Vec<GroupSizeLayout>,

    /// Plants in the region
    #[arg(long, value_delimiter = ',', default_values_t = vec![100])]
    pub populations: Vec<usize>,

    /// Tab-separated grid, one row per cell; replaces the list options
    #[arg(long = "grid_file")]
    pub grid_file: Option<PathBuf>,

    /// Output file (tab-separated)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

// Custom error types
#[derive(Debug, thiserror::Error)]
pub enum NullModelError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Referential integrity error: {0}")]
    ReferentialIntegrity(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Loads both tables, runs every observed analysis and reports the results.
pub fn process_observed(args: &ObservedArgs) -> Result<Vec<ObservedTest>, NullModelError> {
    info!("Survival table: {}", args.survival.display());
    info!("Provenance table: {}", args.provenance.display());
    let plants = parse_survival_table(&args.survival)?;
    let provenance = parse_provenance_table(&args.provenance)?;
    let collection = Collection::from_records(&plants, &provenance)?;

    let options = AnalysisOptions {
        iterations: args.simulation.iterations,
        seed: args.simulation.resolve_seed(),
        batch_size: args.simulation.batch_size,
        model: args.model,
        reference_region: args.reference_region.clone(),
    };
    println!(
        "{}",
        format!(
            "Running {} null replicates per statistic ({} model)",
            options.iterations, options.model
        )
        .cyan()
    );
    let tests = analyze_collection(&collection, &options)?;

    display_observed_tests(&tests)?;
    if let Some(output) = &args.output {
        write_observed_tests(output, &tests)?;
        println!("Results written to {}", output.display());
    }
    Ok(tests)
}

pub fn process_survival_sweep(args: &SurvivalSweepArgs) -> Result<Vec<SweepResult>, NullModelError> {
    let cells = match &args.grid_file {
        Some(path) => parse_grid_file(path, SweepStatistic::MeanSurvivalRate)?,
        None => SurvivalRateGrid {
            survival: args.survival_probs.clone(),
            group_counts: args.group_counts.clone(),
            group_sizes: args.group_sizes.clone(),
            draw_population: args.population,
        }
        .cells(),
    };
    run_sweep(&cells, &args.simulation, args.output.as_deref())
}

pub fn process_opportunity_sweep(
    args: &OpportunitySweepArgs,
) -> Result<Vec<SweepResult>, NullModelError> {
    let cells = match &args.grid_file {
        Some(path) => parse_grid_file(path, SweepStatistic::OpportunityForSelection)?,
        None => OpportunityGrid {
            survival: args.survival_probs.clone(),
            group_counts: args.group_counts.clone(),
            layouts: args.layouts.clone(),
            region_populations: args.populations.clone(),
        }
        .cells(),
    };
    run_sweep(&cells, &args.simulation, args.output.as_deref())
}

fn run_sweep(
    cells: &[SweepCell],
    simulation: &SimulationArgs,
    output: Option<&Path>,
) -> Result<Vec<SweepResult>, NullModelError> {
    if cells.is_empty() {
        return Err(NullModelError::InvalidConfiguration(
            "the sweep grid has no cells".to_string(),
        ));
    }
    println!(
        "{}",
        format!("Sweeping {} parameter combinations...", cells.len()).cyan()
    );
    let results = SweepRunner::new(simulation.iterations, simulation.resolve_seed())
        .batch_size(simulation.batch_size)
        .show_progress(true)
        .run(cells)?;

    display_sweep_results(&results, 20)?;
    if let Some(output) = output {
        write_sweep_results(output, &results)?;
        println!("Results written to {}", output.display());
    }
    Ok(results)
}

pub fn display_observed_tests(tests: &[ObservedTest]) -> Result<(), NullModelError> {
    let mut output = Vec::new();
    let mut table = Table::new();

    table.add_row(row![
        "Statistic",
        "Label",
        "Reference",
        "Observed",
        "Null mean",
        "Null 2.5%",
        "Null 97.5%",
        "p lower",
        "p upper"
    ]);
    for test in tests {
        table.add_row(row![
            test.statistic,
            test.label,
            test.reference.as_deref().unwrap_or("-"),
            format_float(test.observed, 4),
            format_float(test.null.mean, 4),
            format_float(test.null.q025, 4),
            format_float(test.null.q975, 4),
            format_float(test.p.lower, 4),
            format_float(test.p.upper, 4)
        ]);
    }
    table.print(&mut output)?;

    print!(
        "\n{}\n{}",
        "Observed vs. null:".green().bold(),
        String::from_utf8_lossy(&output)
    );
    io::stdout().flush()?;
    Ok(())
}

pub fn display_sweep_results(results: &[SweepResult], limit: usize) -> Result<(), NullModelError> {
    let mut output = Vec::new();
    let mut table = Table::new();

    table.add_row(row![
        "Statistic",
        "Survival",
        "Groups",
        "Layout",
        "Nr",
        "N",
        "Mean",
        "Variance",
        "CI width"
    ]);
    for result in results.iter().take(limit) {
        let cell = &result.cell;
        table.add_row(row![
            cell.statistic,
            cell.survival,
            cell.group_count,
            cell.layout,
            cell.region_population,
            cell.draw_population,
            format_float(result.summary.mean, 4),
            format_float(result.summary.variance, 6),
            format_float(result.summary.ci_width, 4)
        ]);
    }
    table.print(&mut output)?;

    print!(
        "\n{}\n{}",
        "Null distributions per cell:".green().bold(),
        String::from_utf8_lossy(&output)
    );
    if results.len() > limit {
        println!("... and {} more cells.", results.len() - limit);
    }
    io::stdout().flush()?;
    Ok(())
}

fn create_tsv_writer(output_file: &Path) -> Result<csv::Writer<BufWriter<File>>, NullModelError> {
    let file = File::create(output_file)?;
    Ok(WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file)))
}

pub fn write_observed_tests(output_file: &Path, tests: &[ObservedTest]) -> Result<(), NullModelError> {
    let mut writer = create_tsv_writer(output_file)?;
    writer.write_record([
        "statistic",
        "label",
        "reference",
        "model",
        "observed",
        "null_mean",
        "null_variance",
        "q025",
        "q05",
        "q50",
        "q975",
        "ci_width",
        "p_lower",
        "p_upper",
        "iterations",
        "undefined",
    ])?;
    for test in tests {
        writer.write_record([
            test.statistic.to_string(),
            test.label.clone(),
            test.reference.clone().unwrap_or_else(|| "NA".to_string()),
            test.model.to_string(),
            format_float(test.observed, 6),
            format_float(test.null.mean, 6),
            format_float(test.null.variance, 6),
            format_float(test.null.q025, 6),
            format_float(test.null.q05, 6),
            format_float(test.null.median, 6),
            format_float(test.null.q975, 6),
            format_float(test.null.ci_width, 6),
            format_float(test.p.lower, 6),
            format_float(test.p.upper, 6),
            test.null.iterations.to_string(),
            test.null.undefined.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_sweep_results(output_file: &Path, results: &[SweepResult]) -> Result<(), NullModelError> {
    let mut writer = create_tsv_writer(output_file)?;
    writer.write_record([
        "statistic",
        "survival",
        "group_count",
        "layout",
        "region_population",
        "draw_population",
        "success_count",
        "seed",
        "mean",
        "variance",
        "q025",
        "q05",
        "q50",
        "q975",
        "ci_width",
        "iterations",
        "undefined",
    ])?;
    for result in results {
        let cell = &result.cell;
        let summary = &result.summary;
        writer.write_record([
            cell.statistic.to_string(),
            cell.survival.to_string(),
            cell.group_count.to_string(),
            cell.layout.to_string(),
            cell.region_population.to_string(),
            cell.draw_population.to_string(),
            cell.success_count().to_string(),
            result.seed.to_string(),
            format_float(summary.mean, 6),
            format_float(summary.variance, 6),
            format_float(summary.q025, 6),
            format_float(summary.q05, 6),
            format_float(summary.median, 6),
            format_float(summary.q975, 6),
            format_float(summary.ci_width, 6),
            summary.iterations.to_string(),
            summary.undefined.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Formats a float with `digits` decimals, representing NaN as "NA".
pub fn format_float(value: f64, digits: usize) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.*}", digits, value)
    }
}
