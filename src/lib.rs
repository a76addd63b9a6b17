//! Permutation null models for survival across maternal lines and regions of a
//! plant conservation collection.
//!
//! A fixed number of survivors is shuffled over a fixed partition of plants
//! into accessions (`population`, `permutation`); each replicate is reduced to
//! group statistics (`stats`) and collected into an empirical distribution
//! (`null_distribution`) against which observed values are ranked
//! (`significance`). `sweep` runs the same machinery over parameter grids and
//! `analysis` over a real collection (`collection`).

// Module declarations
pub mod analysis;
pub mod collection;
pub mod null_distribution;
pub mod parse;
pub mod permutation;
pub mod population;
pub mod process;
pub mod significance;
pub mod stats;
pub mod sweep;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod tests;

pub use crate::collection::{Collection, NullModel};
pub use crate::null_distribution::{NullDistribution, NullDistributionBuilder, NullSummary};
pub use crate::population::{GroupSizeLayout, GroupedPopulation};
pub use crate::process::NullModelError;
pub use crate::significance::{empirical_p_values, EmpiricalPValues};
