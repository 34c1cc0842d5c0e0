use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// One row of the score table written next to the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub model: String,
    pub trajectory: usize,
    pub seed: u64,
    pub outcome: String,
    pub early_lores: Option<f64>,
    pub final_lores: Option<f64>,
    pub hires: Option<f64>,
    pub rmsd: Option<f64>,
    pub base_pairs_recovered: Option<usize>,
    pub base_pairs_native: Option<usize>,
    pub trials: u64,
    pub accepted: u64,
}

pub fn write_score_table(path: &Path, records: &[ScoreRecord]) -> Result<(), ReportError> {
    let display = path.to_string_lossy().to_string();
    let mut writer = csv::Writer::from_path(path).map_err(|e| ReportError::Csv {
        path: display.clone(),
        source: e,
    })?;
    for record in records {
        writer.serialize(record).map_err(|e| ReportError::Csv {
            path: display.clone(),
            source: e,
        })?;
    }
    writer.flush().map_err(|e| ReportError::Io {
        path: display,
        source: e,
    })
}

pub fn read_score_table(path: &Path) -> Result<Vec<ScoreRecord>, ReportError> {
    let display = path.to_string_lossy().to_string();
    let mut reader = csv::Reader::from_path(path).map_err(|e| ReportError::Csv {
        path: display.clone(),
        source: e,
    })?;
    reader
        .deserialize::<ScoreRecord>()
        .map(|row| {
            row.map_err(|e| ReportError::Csv {
                path: display.clone(),
                source: e,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(trajectory: usize, hires: Option<f64>) -> ScoreRecord {
        ScoreRecord {
            model: format!("model_{trajectory}.pdb"),
            trajectory,
            seed: 100 + trajectory as u64,
            outcome: "completed".to_string(),
            early_lores: Some(-3.5),
            final_lores: Some(-10.25),
            hires,
            rmsd: None,
            base_pairs_recovered: Some(4),
            base_pairs_native: Some(6),
            trials: 2000,
            accepted: 731,
        }
    }

    #[test]
    fn score_table_preserves_rows_and_missing_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        let rows = vec![record(1, Some(-20.0)), record(2, None)];
        write_score_table(&path, &rows).unwrap();

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("model,trajectory,seed,outcome"));
        assert_eq!(read_score_table(&path).unwrap(), rows);
    }

    #[test]
    fn read_score_table_reports_malformed_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "model,trajectory\nm.pdb,not-a-number\n").unwrap();
        assert!(matches!(read_score_table(&path), Err(ReportError::Csv { .. })));
    }

    #[test]
    fn write_score_table_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("scores.csv");
        assert!(write_score_table(&path, &[record(1, None)]).is_err());
    }
}
