//! Error types for zonal statistics.

use thiserror::Error;

pub type ZonalResult<T> = Result<T, ZonalError>;

/// Errors raised while loading rasters or computing statistics.
#[derive(Error, Debug)]
pub enum ZonalError {
    /// The file could not be read.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// TIFF decoding failed.
    #[error("failed to decode raster: {0}")]
    DecodeFailed(String),

    /// Georeferencing tags are missing or unsupported.
    #[error("invalid georeferencing: {0}")]
    InvalidGeoreference(String),

    /// Raster dimensions do not match the data.
    #[error("invalid raster shape: {0}")]
    InvalidShape(String),

    /// Unknown statistic name.
    #[error("unknown statistic '{0}', expected one of mean, median, min, max, sum")]
    UnknownStatistic(String),
}

impl From<tiff::TiffError> for ZonalError {
    fn from(err: tiff::TiffError) -> Self {
        ZonalError::DecodeFailed(err.to_string())
    }
}

