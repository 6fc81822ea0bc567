//! Bounding coordinates from MODIS metadata sidecars.
//!
//! Sidecars are ODL text. Each coordinate appears as an object whose value
//! sits six whitespace-separated tokens after the object name:
//!
//! ```text
//! OBJECT = EASTBOUNDINGCOORDINATE
//!   NUM_VAL = 1
//!   VALUE = 15.2
//! ```

use swath_common::GeoBoundingBox;
use thiserror::Error;

/// Distance from a coordinate keyword to its value, in tokens.
const VALUE_OFFSET: usize = 6;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SidecarError {
    #[error("Sidecar is missing {0}")]
    MissingKey(&'static str),

    #[error("Sidecar has no value for {0}")]
    MissingValue(&'static str),

    #[error("Sidecar value for {key} is not a number: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Parse the swath extent out of a sidecar's text.
pub fn parse_bounding_box(text: &str) -> Result<GeoBoundingBox, SidecarError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    Ok(GeoBoundingBox {
        north: coordinate(&tokens, "NORTHBOUNDINGCOORDINATE")?,
        south: coordinate(&tokens, "SOUTHBOUNDINGCOORDINATE")?,
        east: coordinate(&tokens, "EASTBOUNDINGCOORDINATE")?,
        west: coordinate(&tokens, "WESTBOUNDINGCOORDINATE")?,
    })
}

fn coordinate(tokens: &[&str], key: &'static str) -> Result<f64, SidecarError> {
    let index = tokens
        .iter()
        .position(|t| *t == key)
        .ok_or(SidecarError::MissingKey(key))?;
    let raw = tokens
        .get(index + VALUE_OFFSET)
        .ok_or(SidecarError::MissingValue(key))?;
    let value: f64 = raw.parse().map_err(|_| SidecarError::InvalidValue {
        key,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(SidecarError::InvalidValue {
            key,
            value: raw.to_string(),
        });
    }
    Ok(value)
}
