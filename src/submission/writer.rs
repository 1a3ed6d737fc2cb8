//! Submission Writer
//!
//! Turns test-set scores into `id,label` rows sorted by id and writes them to
//! `<output_dir>/<timestamp>_<score>_submission.csv`. Files are created
//! fresh; an existing submission is never overwritten, a numbered suffix is
//! added instead.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::utils::error::{Result, SubmissionError};
use crate::utils::metrics::predicted_classes;

/// Local-time format used in submission file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Names tried per timestamp and score before giving up
const MAX_NAME_ATTEMPTS: usize = 100;

/// CSV header of a submission
pub const HEADER: [&str; 2] = ["id", "label"];

/// One line of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub id: i32,
    pub label: usize,
}

/// Pair each test id with its predicted class, sorted ascending by id
pub fn build_rows(scores: &[Vec<f32>], ids: &[i32]) -> Result<Vec<SubmissionRow>> {
    if scores.len() != ids.len() {
        return Err(SubmissionError::Inference(format!(
            "{} predictions for {} test ids",
            scores.len(),
            ids.len()
        )));
    }

    let labels = predicted_classes(scores)?;
    let mut rows: Vec<SubmissionRow> = ids
        .iter()
        .zip(labels)
        .map(|(&id, label)| SubmissionRow { id, label })
        .collect();
    rows.sort_by_key(|row| row.id);

    if let Some(pair) = rows.windows(2).find(|pair| pair[0].id == pair[1].id) {
        return Err(SubmissionError::DuplicateId(pair[0].id));
    }

    Ok(rows)
}

/// Write `rows` as CSV with an `id,label` header and no index column
pub fn write_rows<W: Write>(writer: W, rows: &[SubmissionRow]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    // Written explicitly so an empty submission still has its header
    csv_writer.write_record(HEADER)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// `<timestamp>_<score with 4 decimals>_submission.csv`
pub fn submission_file_name(timestamp: &str, score: f64) -> String {
    format!("{}_{:.4}_submission.csv", timestamp, score)
}

/// Current local time in [`TIMESTAMP_FORMAT`]
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Writes submission files into one output directory
#[derive(Debug, Clone)]
pub struct SubmissionWriter {
    output_dir: PathBuf,
}

impl SubmissionWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Write a submission stamped with the current local time
    pub fn write(&self, scores: &[Vec<f32>], ids: &[i32], validation_score: f64) -> Result<PathBuf> {
        self.write_with_timestamp(scores, ids, validation_score, &timestamp())
    }

    /// Write to `<timestamp>_<score>_submission.csv`, or to
    /// `<timestamp>_<score>_submission_<n>.csv` when earlier runs already took
    /// that name within the same second.
    pub fn write_with_timestamp(
        &self,
        scores: &[Vec<f32>],
        ids: &[i32],
        validation_score: f64,
        timestamp: &str,
    ) -> Result<PathBuf> {
        let rows = build_rows(scores, ids)?;

        fs::create_dir_all(&self.output_dir)?;
        let (path, file) = self.create_unique(timestamp, validation_score)?;
        write_rows(BufWriter::new(file), &rows)?;

        info!("Wrote {} rows to {:?}", rows.len(), path);
        Ok(path)
    }

    fn create_unique(&self, timestamp: &str, validation_score: f64) -> Result<(PathBuf, File)> {
        let base = submission_file_name(timestamp, validation_score);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                base.clone()
            } else {
                base.replace(".csv", &format!("_{}.csv", attempt))
            };
            let path = self.output_dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    if attempt > 0 {
                        warn!("{} already exists, writing {:?} instead", base, path);
                    }
                    return Ok((path, file));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(SubmissionError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Cannot create {:?}: {}", path, e),
                    )))
                }
            }
        }

        Err(SubmissionError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!(
                "{} and {} suffixed variants already exist in {:?}",
                base,
                MAX_NAME_ATTEMPTS - 1,
                self.output_dir
            ),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn one_hot(class: usize, num_classes: usize) -> Vec<f32> {
        let mut scores = vec![0.0; num_classes];
        scores[class] = 1.0;
        scores
    }

    #[test]
    fn test_rows_sorted_by_id() {
        let scores = vec![one_hot(1, 3), one_hot(0, 3), one_hot(2, 3)];
        let rows = build_rows(&scores, &[3, 1, 2]).unwrap();

        assert_eq!(
            rows,
            vec![
                SubmissionRow { id: 1, label: 0 },
                SubmissionRow { id: 2, label: 2 },
                SubmissionRow { id: 3, label: 1 },
            ]
        );

        let mut buffer = Vec::new();
        write_rows(&mut buffer, &rows).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "id,label\n1,0\n2,2\n3,1\n");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let scores = vec![one_hot(0, 2), one_hot(1, 2)];
        let err = build_rows(&scores, &[7, 7]).unwrap_err();
        assert!(matches!(err, SubmissionError::DuplicateId(7)));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(build_rows(&[one_hot(0, 2)], &[1, 2]).is_err());
    }

    #[test]
    fn test_empty_submission_has_header() {
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &[]).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "id,label\n");
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(submission_file_name("T", 0.8765), "T_0.8765_submission.csv");
        assert_eq!(submission_file_name("20240101_120000", 1.0), "20240101_120000_1.0000_submission.csv");
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }

    #[test]
    fn test_writer_creates_directory_and_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let writer = SubmissionWriter::new(temp.path().join("submissions"));
        let scores = vec![one_hot(1, 2), one_hot(0, 2)];

        let path = writer
            .write_with_timestamp(&scores, &[2, 1], 0.5, "T")
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "T_0.5000_submission.csv");
        assert_eq!(fs::read_to_string(&path).unwrap(), "id,label\n1,0\n2,1\n");

        let flipped = vec![one_hot(0, 2), one_hot(1, 2)];
        let again = writer
            .write_with_timestamp(&flipped, &[2, 1], 0.5, "T")
            .unwrap();
        assert_ne!(again, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "id,label\n1,0\n2,1\n");
        assert_eq!(fs::read_to_string(&again).unwrap(), "id,label\n1,1\n2,0\n");
    }

    #[test]
    fn test_same_second_runs_get_suffixed_names() {
        let temp = TempDir::new().unwrap();
        let writer = SubmissionWriter::new(temp.path());
        let scores = vec![one_hot(0, 2)];

        let names: Vec<String> = (0..3)
            .map(|_| {
                let path = writer.write_with_timestamp(&scores, &[1], 0.25, "T").unwrap();
                path.file_name().unwrap().to_str().unwrap().to_string()
            })
            .collect();

        assert_eq!(
            names,
            vec![
                "T_0.2500_submission.csv",
                "T_0.2500_submission_1.csv",
                "T_0.2500_submission_2.csv",
            ]
        );
    }
}
