//! Error types for the tally-import codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The file header is missing a required column (after alias resolution).
  #[error("missing required column: {0}")]
  MissingColumn(&'static str),

  #[error("row {line}: empty value in required column {column}")]
  EmptyField { line: usize, column: &'static str },

  #[error("row {line}: invalid amount {value:?}")]
  InvalidAmount { line: usize, value: String },

  #[error("row {line}: invalid date {value:?}")]
  InvalidDate { line: usize, value: String },

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
