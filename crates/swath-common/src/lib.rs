//! Common types shared by the swath ingestion crates and the downloader service.

pub mod bbox;
pub mod error;
pub mod satellite;
pub mod time;

pub use bbox::{Edge, GeoBoundingBox, StudyRegion};
pub use error::{CommonError, CommonResult};
pub use satellite::Satellite;
pub use time::{AcquisitionTime, DayKey, HourWindow};
