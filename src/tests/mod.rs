mod analysis_tests;
mod stats_tests;
mod sweep_tests;
