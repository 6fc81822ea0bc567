//! Geographic bounding boxes and the study-region filter.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// Lat/lon extent of a swath as reported by its metadata sidecar.
///
/// Longitudes are degrees east, latitudes degrees north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoBoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }
}

/// Side of the study region a swath lies entirely beyond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    North,
    South,
    East,
    West,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed lat/lon rectangle of interest for the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoBoundingBox", into = "GeoBoundingBox")]
pub struct StudyRegion {
    bounds: GeoBoundingBox,
}

impl StudyRegion {
    /// Create a region, rejecting inverted edges.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> CommonResult<Self> {
        if !(south <= north) {
            return Err(CommonError::InvalidRegion(format!(
                "south ({}) must not exceed north ({})",
                south, north
            )));
        }
        if !(west <= east) {
            return Err(CommonError::InvalidRegion(format!(
                "west ({}) must not exceed east ({})",
                west, east
            )));
        }
        Ok(Self {
            bounds: GeoBoundingBox::new(north, south, east, west),
        })
    }

    /// The southeast Atlantic box flown during the 2016 deployment.
    pub fn southeast_atlantic() -> Self {
        Self {
            bounds: GeoBoundingBox::new(-4.5, -25.5, 15.5, -15.5),
        }
    }

    pub fn bounds(&self) -> &GeoBoundingBox {
        &self.bounds
    }

    /// First edge the swath lies entirely beyond, if any.
    ///
    /// Each test is an independent half-plane check. A box that only touches
    /// the region is not beyond it.
    pub fn rejection(&self, swath: &GeoBoundingBox) -> Option<Edge> {
        let region = &self.bounds;
        if swath.south > region.north {
            Some(Edge::North)
        } else if swath.north < region.south {
            Some(Edge::South)
        } else if swath.west > region.east {
            Some(Edge::East)
        } else if swath.east < region.west {
            Some(Edge::West)
        } else {
            None
        }
    }

    /// Whether the swath intersects (or touches) the region.
    pub fn accepts(&self, swath: &GeoBoundingBox) -> bool {
        self.rejection(swath).is_none()
    }
}

impl TryFrom<GeoBoundingBox> for StudyRegion {
    type Error = CommonError;

    fn try_from(b: GeoBoundingBox) -> CommonResult<Self> {
        Self::new(b.north, b.south, b.east, b.west)
    }
}

impl From<StudyRegion> for GeoBoundingBox {
    fn from(region: StudyRegion) -> Self {
        region.bounds
    }
}

impl Default for StudyRegion {
    fn default() -> Self {
        Self::southeast_atlantic()
    }
}
