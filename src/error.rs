// src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
  #[error("data file not found: {}", path.display())]
  MissingFile { path: PathBuf },

  #[error("failed to read array {}: {source}", path.display())]
  Array {
    path: PathBuf,
    #[source]
    source: ndarray_npy::ReadNpyError,
  },

  #[error("unexpected array shape in {}: {reason}", path.display())]
  Shape { path: PathBuf, reason: String },

  #[error("malformed XYZ data in {} at line {line}: {reason}", path.display())]
  Xyz {
    path: PathBuf,
    line: usize,
    reason: String,
  },

  #[error("point index {index} out of range (table has {total} rows)")]
  PointOutOfRange { index: usize, total: usize },

  #[error("no point {point} in curve {curve}")]
  UnknownCurvePoint { curve: usize, point: usize },

  #[error("frame {frame} out of range for {} ({count} frames)", path.display())]
  FrameOutOfRange {
    path: PathBuf,
    frame: usize,
    count: usize,
  },

  #[error("render failed: {0}")]
  Render(String),

  #[error("invalid config {}: {reason}", path.display())]
  Config { path: PathBuf, reason: String },

  #[error(transparent)]
  Io(#[from] io::Error),
}

impl From<cairo::Error> for ViewerError {
  fn from(e: cairo::Error) -> Self {
    ViewerError::Render(e.to_string())
  }
}

impl From<cairo::IoError> for ViewerError {
  fn from(e: cairo::IoError) -> Self {
    ViewerError::Render(e.to_string())
  }
}
