use crate::error::{CliError, Result};
use latfit::core::peaks::{Peak, PeakSet};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug)]
struct PeakRecord {
    h: f64,
    k: f64,
    l: f64,
    qx: f64,
    qy: f64,
    qz: f64,
}

impl From<PeakRecord> for Peak {
    fn from(r: PeakRecord) -> Self {
        Peak::new([r.h, r.k, r.l], [r.qx, r.qy, r.qz])
    }
}

/// Reads an indexed peak list with header `h,k,l,qx,qy,qz`.
///
/// Columns may appear in any order, extra columns are ignored and lines
/// starting with `#` are skipped.
pub fn read_peaks(path: &Path) -> Result<PeakSet> {
    debug!("Loading peaks from file: {:?}", path);
    let parse_error = |e: csv::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(parse_error)?;

    let peaks = reader
        .deserialize::<PeakRecord>()
        .map(|record| record.map(Peak::from).map_err(parse_error))
        .collect::<Result<PeakSet>>()?;

    if peaks.is_empty() {
        return Err(CliError::FileParsing {
            path: path.to_path_buf(),
            source: anyhow::anyhow!("no peaks found"),
        });
    }
    debug!("Loaded {} peaks.", peaks.len());
    Ok(peaks)
}
