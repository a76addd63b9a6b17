use survnull::process::{
    process_observed, process_opportunity_sweep, process_survival_sweep, Args, Command,
};

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use log::{info, LevelFilter};
use rayon::ThreadPoolBuilder;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    Builder::new().filter_level(level).parse_default_env().init();

    ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .context("failed to configure the worker thread pool")?;
    info!("Threads: {}", args.threads);

    println!("{}", "Starting null-model analysis...".green());

    match &args.command {
        Command::Observed(observed) => {
            process_observed(observed).context("observed analysis failed")?;
        }
        Command::SweepSurvival(sweep) => {
            process_survival_sweep(sweep).context("survival rate sweep failed")?;
        }
        Command::SweepOpportunity(sweep) => {
            process_opportunity_sweep(sweep).context("opportunity for selection sweep failed")?;
        }
    }

    println!("{}", "Analysis complete.".green());
    Ok(())
}
