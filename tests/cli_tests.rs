// tests/cli_tests.rs

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn write_collection(dir: &Path, with_orphan: bool) -> std::io::Result<()> {
    let mut survival = String::from("plant\taccession\tdead\n");
    let lines = [("L1", 6, 1), ("L2", 6, 3), ("L3", 4, 0), ("L4", 5, 2), ("L5", 5, 5)];
    let mut plant = 0;
    for (accession, total, deaths) in lines {
        for i in 0..total {
            plant += 1;
            survival.push_str(&format!("{}\t{}\t{}\n", plant, accession, i < deaths));
        }
    }
    if with_orphan {
        survival.push_str("999\tORPHAN\tfalse\n");
    }
    fs::write(dir.join("survival.tsv"), survival)?;

    let provenance = "\
accession\tregion\tlatitude\tlongitude
L1\tCascades\t45.1\t-121.7
L2\tCascades\t45.3\t-121.9
L3\tCascades\t44.8\t-122.0
L4\tBlue Mountains\t45.6\t-118.2
L5\tBlue Mountains\t45.7\t-118.4
";
    fs::write(dir.join("provenance.tsv"), provenance)?;
    Ok(())
}

#[test]
fn test_observed_writes_results() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_collection(dir.path(), false)?;
    let output = dir.path().join("observed.tsv");

    let mut cmd = Command::cargo_bin("survnull")?;
    cmd.arg("observed")
        .arg("--survival")
        .arg(dir.path().join("survival.tsv"))
        .arg("--provenance")
        .arg(dir.path().join("provenance.tsv"))
        .arg("--iterations")
        .arg("200")
        .arg("--seed")
        .arg("11")
        .arg("--threads")
        .arg("2")
        .arg("--output")
        .arg(&output);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Observed vs. null"));

    let contents = fs::read_to_string(&output)?;
    let mut lines = contents.lines();
    let header = lines.next().unwrap_or_default();
    assert!(header.starts_with("statistic\tlabel\treference\tmodel\tobserved"));
    // 1 collection mean + 2 regions × (opportunity + selection)
    assert_eq!(lines.count(), 5);
    assert!(contents.contains("selection_coefficient\tBlue Mountains\tCascades"));
    Ok(())
}

#[test]
fn test_observed_rejects_orphan_plants() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_collection(dir.path(), true)?;

    let mut cmd = Command::cargo_bin("survnull")?;
    cmd.arg("observed")
        .arg("-s")
        .arg(dir.path().join("survival.tsv"))
        .arg("-p")
        .arg(dir.path().join("provenance.tsv"))
        .arg("-k")
        .arg("10");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no provenance row").and(predicate::str::contains("ORPHAN")));
    Ok(())
}

#[test]
fn test_survival_sweep_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = dir.path().join("sweep.tsv");

    let mut cmd = Command::cargo_bin("survnull")?;
    cmd.arg("sweep-survival")
        .arg("--survival_probs")
        .arg("0.25,0.5")
        .arg("--group_counts")
        .arg("5,10")
        .arg("--group_sizes")
        .arg("2")
        .arg("--population")
        .arg("400")
        .arg("-k")
        .arg("100")
        .arg("--seed")
        .arg("3")
        .arg("-o")
        .arg(&output);
    cmd.assert().success();

    let contents = fs::read_to_string(&output)?;
    let rows: Vec<&str> = contents.lines().skip(1).collect();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.starts_with("mean_survival_rate\t")));
    Ok(())
}

#[test]
fn test_opportunity_sweep_rejects_bad_layout() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("survnull")?;
    cmd.arg("sweep-opportunity").arg("--layouts").arg("lopsided");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("lopsided"));
    Ok(())
}
