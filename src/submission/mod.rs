//! Submission module: CSV rows and timestamped submission files

pub mod writer;

pub use writer::{build_rows, submission_file_name, write_rows, SubmissionRow, SubmissionWriter};
