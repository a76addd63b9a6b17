use crate::collection::{PlantRecord, ProvenanceRecord};
use crate::population::GroupSizeLayout;
use crate::process::NullModelError;
use crate::sweep::{SweepCell, SweepStatistic};

use flate2::read::MultiGzDecoder;
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

const ACCESSION_COLUMNS: &[&str] = &["accession", "accession_id", "accessionid", "maternal_line"];
const DEAD_COLUMNS: &[&str] = &["dead", "died"];
const REGION_COLUMNS: &[&str] = &["region", "region_id", "regionid", "provenance"];
const LATITUDE_COLUMNS: &[&str] = &["latitude", "lat"];
const LONGITUDE_COLUMNS: &[&str] = &["longitude", "lon", "long"];

/// Opens a table, decompressing `.gz` files on the fly.
pub fn open_table(path: &Path) -> Result<Box<dyn Read>, NullModelError> {
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// CSV reader for a table; comma-delimited for `.csv` / `.csv.gz`, tab otherwise.
pub fn table_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>, NullModelError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let name = name.trim_end_matches(".gz");
    let delimiter = if name.ends_with(".csv") { b',' } else { b'\t' };
    debug!(
        "Reading {} as {}-delimited",
        path.display(),
        if delimiter == b',' { "comma" } else { "tab" }
    );
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(open_table(path)?))
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str], path: &Path) -> Result<usize, NullModelError> {
    headers
        .iter()
        .position(|h| {
            let h = h.to_ascii_lowercase();
            aliases.iter().any(|alias| *alias == h)
        })
        .ok_or_else(|| {
            NullModelError::Parse(format!(
                "{}: missing column '{}' (header: {})",
                path.display(),
                aliases[0],
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, line: usize) -> Result<&'r str, NullModelError> {
    record
        .get(idx)
        .ok_or_else(|| NullModelError::Parse(format!("line {}: missing field {}", line, idx + 1)))
}

/// Parses the usual spellings of a logical value.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

// Coordinates are carried through untouched; missing values become NaN.
fn parse_coordinate(value: &str, line: usize) -> Result<f64, NullModelError> {
    if value.is_empty() || value.eq_ignore_ascii_case("na") {
        return Ok(f64::NAN);
    }
    value
        .parse()
        .map_err(|_| NullModelError::Parse(format!("line {}: invalid coordinate '{}'", line, value)))
}

/// Reads the survival table: one row per plant with an accession id and a
/// dead flag. Rows with an empty accession id are an error, not skipped.
pub fn parse_survival_table(path: &Path) -> Result<Vec<PlantRecord>, NullModelError> {
    let mut reader = table_reader(path)?;
    let headers = reader.headers()?.clone();
    let accession_idx = find_column(&headers, ACCESSION_COLUMNS, path)?;
    let dead_idx = find_column(&headers, DEAD_COLUMNS, path)?;

    let mut plants = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_num + 2;
        let accession_id = field(&record, accession_idx, line)?;
        if accession_id.is_empty() {
            return Err(NullModelError::Parse(format!(
                "{} line {}: empty accession id",
                path.display(),
                line
            )));
        }
        let dead_field = field(&record, dead_idx, line)?;
        let dead = parse_bool(dead_field).ok_or_else(|| {
            NullModelError::Parse(format!(
                "{} line {}: cannot read '{}' as dead/alive",
                path.display(),
                line,
                dead_field
            ))
        })?;
        plants.push(PlantRecord {
            accession_id: accession_id.to_string(),
            dead,
        });
    }
    debug!("Read {} plant records from {}", plants.len(), path.display());
    Ok(plants)
}

/// Reads the provenance table: accession, region, latitude, longitude.
pub fn parse_provenance_table(path: &Path) -> Result<Vec<ProvenanceRecord>, NullModelError> {
    let mut reader = table_reader(path)?;
    let headers = reader.headers()?.clone();
    let accession_idx = find_column(&headers, ACCESSION_COLUMNS, path)?;
    let region_idx = find_column(&headers, REGION_COLUMNS, path)?;
    let latitude_idx = find_column(&headers, LATITUDE_COLUMNS, path)?;
    let longitude_idx = find_column(&headers, LONGITUDE_COLUMNS, path)?;

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_num + 2;
        let accession_id = field(&record, accession_idx, line)?;
        let region_id = field(&record, region_idx, line)?;
        if accession_id.is_empty() || region_id.is_empty() {
            return Err(NullModelError::Parse(format!(
                "{} line {}: accession and region must both be set",
                path.display(),
                line
            )));
        }
        rows.push(ProvenanceRecord {
            accession_id: accession_id.to_string(),
            region_id: region_id.to_string(),
            latitude: parse_coordinate(field(&record, latitude_idx, line)?, line)?,
            longitude: parse_coordinate(field(&record, longitude_idx, line)?, line)?,
        });
    }
    debug!("Read {} provenance rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn parse_number<T: FromStr>(value: &str, name: &str, line: usize) -> Result<T, NullModelError> {
    value
        .parse()
        .map_err(|_| NullModelError::Parse(format!("line {}: invalid {} '{}'", line, name, value)))
}

/// Reads a sweep grid, one cell per row.
///
/// Columns: `survival`, `group_count`, `region_population`, and optionally
/// `layout` (default even) and `draw_population` (default region_population).
/// A `group_size` column may stand in for `region_population`, giving
/// group_count × group_size; a grid with both columns is rejected.
pub fn parse_grid_file(path: &Path, statistic: SweepStatistic) -> Result<Vec<SweepCell>, NullModelError> {
    let mut reader = table_reader(path)?;
    let headers = reader.headers()?.clone();
    let survival_idx = find_column(&headers, &["survival", "survival_prob"], path)?;
    let groups_idx = find_column(&headers, &["group_count", "groups"], path)?;
    let column = |aliases: &[&str]| find_column(&headers, aliases, path).ok();
    let population_idx = column(&["region_population", "population"]);
    let size_idx = column(&["group_size"]);
    let layout_idx = column(&["layout"]);
    let draw_idx = column(&["draw_population"]);

    if population_idx.is_none() && size_idx.is_none() {
        return Err(NullModelError::Parse(format!(
            "{}: grid needs a region_population or group_size column",
            path.display()
        )));
    }
    if population_idx.is_some() && size_idx.is_some() {
        return Err(NullModelError::Parse(format!(
            "{}: grid has both region_population and group_size columns; use one",
            path.display()
        )));
    }

    let mut cells = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_num + 2;
        let survival: f64 = parse_number(field(&record, survival_idx, line)?, "survival", line)?;
        let group_count: usize = parse_number(field(&record, groups_idx, line)?, "group_count", line)?;
        let region_population = match (size_idx, population_idx) {
            (Some(idx), _) => {
                let group_size: usize = parse_number(field(&record, idx, line)?, "group_size", line)?;
                group_count.checked_mul(group_size).ok_or_else(|| {
                    NullModelError::Parse(format!(
                        "line {}: {} groups of {} overflow the region population",
                        line, group_count, group_size
                    ))
                })?
            }
            (None, Some(idx)) => parse_number(field(&record, idx, line)?, "region_population", line)?,
            (None, None) => {
                return Err(NullModelError::Parse(format!(
                    "line {}: no region_population or group_size",
                    line
                )))
            }
        };
        let layout = match layout_idx {
            Some(idx) => field(&record, idx, line)?.parse::<GroupSizeLayout>()?,
            None => GroupSizeLayout::Even,
        };
        let draw_population = match draw_idx {
            Some(idx) => parse_number(field(&record, idx, line)?, "draw_population", line)?,
            None => region_population,
        };
        cells.push(SweepCell {
            statistic,
            survival,
            group_count,
            layout,
            region_population,
            draw_population,
        });
    }
    debug!("Read {} grid cells from {}", cells.len(), path.display());
    Ok(cells)
}
