//! CSV export of calibration step vectors.
//!
//! Schema:
//! axis,index,dx,dy
//! RA,0,0.0,0.0
//! RA,1,3.52,0.94
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRow {
    pub axis: StepAxis,
    pub index: usize,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAxis {
    #[serde(rename = "RA")]
    Ra,
    #[serde(rename = "Dec")]
    Dec,
}

pub fn export_steps_csv(
    path: &Path,
    ra_steps: &[(f64, f64)],
    dec_steps: &[(f64, f64)],
) -> eyre::Result<()> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("create steps CSV {:?}: {}", path, e))?;

    let rows = ra_steps
        .iter()
        .enumerate()
        .map(|(i, v)| (StepAxis::Ra, i, v))
        .chain(
            dec_steps
                .iter()
                .enumerate()
                .map(|(i, v)| (StepAxis::Dec, i, v)),
        );
    for (axis, index, &(dx, dy)) in rows {
        w.serialize(StepRow {
            axis,
            index,
            dx,
            dy,
        })
        .map_err(|e| eyre::eyre!("write steps CSV {:?}: {}", path, e))?;
    }
    w.flush()
        .map_err(|e| eyre::eyre!("flush steps CSV {:?}: {}", path, e))?;
    Ok(())
}

pub fn load_steps_csv(path: &Path) -> eyre::Result<Vec<StepRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open steps CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["axis", "index", "dx", "dy"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "steps CSV must have headers 'axis,index,dx,dy', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<StepRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    Ok(rows)
}
