//! Error types for the shared pipeline types.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Invalid study region: {0}")]
    InvalidRegion(String),

    #[error("Unknown satellite: {0}")]
    UnknownSatellite(String),

    #[error("Invalid day of year {doy} for {year}")]
    InvalidDayOfYear { year: i32, doy: u32 },

    #[error("Invalid acquisition time: {0}")]
    InvalidTime(String),
}
