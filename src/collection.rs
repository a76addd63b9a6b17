use crate::population::GroupedPopulation;
use crate::process::NullModelError;
use crate::stats::RegionLayout;

use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// One plant of the survival table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantRecord {
    pub accession_id: String,
    pub dead: bool,
}

/// One row of the provenance table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceRecord {
    pub accession_id: String,
    pub region_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A maternal line with its plant and death counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Accession {
    pub id: String,
    pub region_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub initial_plant_count: usize,
    pub death_count: usize,
}

impl Accession {
    pub fn survivor_count(&self) -> usize {
        self.initial_plant_count - self.death_count
    }

    pub fn survival_rate(&self) -> f64 {
        self.survivor_count() as f64 / self.initial_plant_count as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    /// Indices into `Collection::accessions`.
    pub accessions: Vec<usize>,
}

/// Which plants are shuffled when building a region's null distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullModel {
    /// Shuffle the survivors of the whole collection over all of its plants;
    /// the region's accessions take the first Nr positions.
    WholeCollection,
    /// Shuffle the region's own survivors over the region's plants only.
    RegionOnly,
}

impl fmt::Display for NullModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NullModel::WholeCollection => write!(f, "whole"),
            NullModel::RegionOnly => write!(f, "region"),
        }
    }
}

impl FromStr for NullModel {
    type Err = NullModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whole" | "whole-collection" | "collection" => Ok(NullModel::WholeCollection),
            "region" | "region-only" => Ok(NullModel::RegionOnly),
            other => Err(NullModelError::Parse(format!(
                "unknown null model '{}', expected 'whole' or 'region'",
                other
            ))),
        }
    }
}

/// Accessions and regions of a collection, checked for referential integrity.
///
/// Accessions keep the order of the provenance table; regions are ordered by
/// the first accession that names them.
#[derive(Debug, Clone)]
pub struct Collection {
    accessions: Vec<Accession>,
    regions: Vec<Region>,
}

impl Collection {
    /// Joins the survival table to the provenance table.
    ///
    /// Fails with `ReferentialIntegrity` if a plant names an accession with no
    /// provenance row, if a provenance row has no plants, or if an accession
    /// appears twice in the provenance table. Nothing is dropped silently.
    pub fn from_records(
        plants: &[PlantRecord],
        provenance: &[ProvenanceRecord],
    ) -> Result<Self, NullModelError> {
        if plants.is_empty() {
            return Err(NullModelError::InvalidConfiguration(
                "survival table has no plant records".to_string(),
            ));
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(provenance.len());
        let mut accessions = Vec::with_capacity(provenance.len());
        for row in provenance {
            if index.insert(row.accession_id.as_str(), accessions.len()).is_some() {
                return Err(NullModelError::ReferentialIntegrity(format!(
                    "accession '{}' appears more than once in the provenance table",
                    row.accession_id
                )));
            }
            accessions.push(Accession {
                id: row.accession_id.clone(),
                region_id: row.region_id.clone(),
                latitude: row.latitude,
                longitude: row.longitude,
                initial_plant_count: 0,
                death_count: 0,
            });
        }

        let mut unknown: BTreeSet<&str> = BTreeSet::new();
        for plant in plants {
            match index.get(plant.accession_id.as_str()) {
                Some(&idx) => {
                    let accession = &mut accessions[idx];
                    accession.initial_plant_count += 1;
                    if plant.dead {
                        accession.death_count += 1;
                    }
                }
                None => {
                    unknown.insert(plant.accession_id.as_str());
                }
            }
        }
        if !unknown.is_empty() {
            return Err(NullModelError::ReferentialIntegrity(format!(
                "{} accession(s) in the survival table have no provenance row: {}",
                unknown.len(),
                preview(unknown.iter().copied())
            )));
        }

        let unplanted: Vec<&str> = accessions
            .iter()
            .filter(|a| a.initial_plant_count == 0)
            .map(|a| a.id.as_str())
            .collect();
        if !unplanted.is_empty() {
            return Err(NullModelError::ReferentialIntegrity(format!(
                "{} provenance row(s) have no plants in the survival table: {}",
                unplanted.len(),
                preview(unplanted.into_iter())
            )));
        }

        let mut regions: Vec<Region> = Vec::new();
        for (idx, accession) in accessions.iter().enumerate() {
            match regions.iter_mut().find(|r| r.id == accession.region_id) {
                Some(region) => region.accessions.push(idx),
                None => regions.push(Region {
                    id: accession.region_id.clone(),
                    accessions: vec![idx],
                }),
            }
        }

        info!(
            "Loaded {} plants in {} accessions across {} regions",
            plants.len(),
            accessions.len(),
            regions.len()
        );
        for region in &regions {
            debug!("Region {}: {} accessions", region.id, region.accessions.len());
        }

        Ok(Collection { accessions, regions })
    }

    pub fn accessions(&self) -> &[Accession] {
        &self.accessions
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn total_plants(&self) -> usize {
        self.accessions.iter().map(|a| a.initial_plant_count).sum()
    }

    pub fn total_survivors(&self) -> usize {
        self.accessions.iter().map(|a| a.survivor_count()).sum()
    }

    pub fn region_plants(&self, region: &Region) -> usize {
        region
            .accessions
            .iter()
            .map(|&i| self.accessions[i].initial_plant_count)
            .sum()
    }

    pub fn region_survivors(&self, region: &Region) -> usize {
        region
            .accessions
            .iter()
            .map(|&i| self.accessions[i].survivor_count())
            .sum()
    }

    /// Observed survival rate of every accession, in accession order.
    pub fn accession_rates(&self) -> Vec<f64> {
        self.accessions.iter().map(Accession::survival_rate).collect()
    }

    /// Observed survival rates of the accessions in one region.
    pub fn region_rates(&self, region: &Region) -> Vec<f64> {
        region
            .accessions
            .iter()
            .map(|&i| self.accessions[i].survival_rate())
            .collect()
    }

    /// Regions over the accession sequence, for use with collection-wide draws.
    pub fn region_layout(&self) -> RegionLayout {
        RegionLayout {
            region_ids: self.regions.iter().map(|r| r.id.clone()).collect(),
            members: self.regions.iter().map(|r| r.accessions.clone()).collect(),
            plant_totals: self.regions.iter().map(|r| self.region_plants(r)).collect(),
        }
    }

    /// Every accession is a group; the collection's survivors are shuffled
    /// over all of its plants.
    pub fn collection_population(&self) -> Result<GroupedPopulation, NullModelError> {
        GroupedPopulation::region_only(
            self.accessions.iter().map(|a| a.initial_plant_count).collect(),
            self.total_survivors(),
        )
    }

    /// The region's accessions as groups, sampled according to `model`.
    pub fn region_population(
        &self,
        region: &Region,
        model: NullModel,
    ) -> Result<GroupedPopulation, NullModelError> {
        let sizes: Vec<usize> = region
            .accessions
            .iter()
            .map(|&i| self.accessions[i].initial_plant_count)
            .collect();
        match model {
            NullModel::RegionOnly => {
                GroupedPopulation::region_only(sizes, self.region_survivors(region))
            }
            NullModel::WholeCollection => {
                GroupedPopulation::new(sizes, self.total_plants(), self.total_survivors())
            }
        }
    }
}

fn preview<'a, I: Iterator<Item = &'a str>>(ids: I) -> String {
    let mut shown: Vec<&str> = ids.take(6).collect();
    if shown.len() > 5 {
        shown.truncate(5);
        shown.push("...");
    }
    shown.join(", ")
}
