//! Filename conventions for near-real-time swath files.
//!
//! Every product family uses a fixed-width name, so metadata is cut out of the
//! filename at known byte offsets:
//!
//! ```text
//! MOD06_L2.A2016253.1045.006.NRT.hdf        MODIS cloud (MYD = Aqua)
//! MOD06_L2.A2016253.1045.006.NRT.hdf.met    its metadata sidecar
//! MOD06ACAERO.A2016253.1045.006.NRT.hdf     MODIS above-cloud aerosol
//! MET10.2016253.1200.VISST.C01.nc           SEVIRI radiance, channel 1
//! MET10.2016253.1200.cloud.nc.gz            SEVIRI cloud product
//! MET10.2016253.1200.aero.nc.gz             SEVIRI aerosol product
//! ```

use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use swath_common::{AcquisitionTime, DayKey, Satellite};
use thiserror::Error;

/// Suffix appended to a MODIS data file name to form its metadata sidecar.
pub const SIDECAR_SUFFIX: &str = ".met";

const GZIP_SUFFIX: &str = ".gz";

/// Why a filename did not match its family's convention.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("{filename}: does not start with a {family} prefix")]
    UnknownPrefix {
        filename: String,
        family: &'static str,
    },

    #[error("{filename}: {field} field is malformed")]
    BadField {
        filename: String,
        field: &'static str,
    },

    #[error("{filename}: unrecognized {family} suffix")]
    UnknownSuffix {
        filename: String,
        family: &'static str,
    },
}

/// The closed set of naming conventions polled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    /// MOD06_L2 / MYD06_L2 cloud properties
    ModisCloud,
    /// MOD06ACAERO / MYD06ACAERO above-cloud aerosol
    ModisAerosol,
    /// MET10 SEVIRI radiances and LaRC cloud/aerosol products
    Seviri,
}

/// Byte offsets of the date/time fields in one convention.
struct Layout {
    tag: Range<usize>,
    tag_value: &'static str,
    year: Range<usize>,
    doy: Range<usize>,
    time: Range<usize>,
}

impl ProductFamily {
    fn layout(&self) -> Layout {
        match self {
            Self::ModisCloud => Layout {
                tag: 3..10,
                tag_value: "06_L2.A",
                year: 10..14,
                doy: 14..17,
                time: 18..22,
            },
            Self::ModisAerosol => Layout {
                tag: 3..13,
                tag_value: "06ACAERO.A",
                year: 13..17,
                doy: 17..20,
                time: 21..25,
            },
            Self::Seviri => Layout {
                tag: 0..6,
                tag_value: "MET10.",
                year: 6..10,
                doy: 10..13,
                time: 14..18,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModisCloud => "modis_cloud",
            Self::ModisAerosol => "modis_aerosol",
            Self::Seviri => "seviri",
        }
    }

    /// Whether this family ships bounding-box sidecars.
    pub fn has_sidecars(&self) -> bool {
        matches!(self, Self::ModisCloud | Self::ModisAerosol)
    }

    /// Archive product directory name for a satellite, e.g. `MYD06_L2`.
    pub fn archive_product(&self, satellite: Satellite) -> Option<String> {
        match self {
            Self::ModisCloud => satellite.modis_prefix().map(|p| format!("{}06_L2", p)),
            Self::ModisAerosol => satellite.modis_prefix().map(|p| format!("{}06ACAERO", p)),
            Self::Seviri => (satellite == Satellite::Msg).then(|| "msg".to_string()),
        }
    }

    /// Classify a remote or local filename under this convention.
    pub fn classify(&self, filename: &str) -> Result<RemoteEntry, ClassificationError> {
        let layout = self.layout();
        let family = self.as_str();
        let field = |range: Range<usize>, name: &'static str| {
            filename
                .get(range)
                .ok_or_else(|| ClassificationError::BadField {
                    filename: filename.to_string(),
                    field: name,
                })
        };

        if filename.get(layout.tag.clone()) != Some(layout.tag_value) {
            return Err(ClassificationError::UnknownPrefix {
                filename: filename.to_string(),
                family,
            });
        }

        let satellite = match self {
            Self::ModisCloud | Self::ModisAerosol => filename
                .get(0..3)
                .and_then(Satellite::from_modis_prefix)
                .ok_or_else(|| ClassificationError::UnknownPrefix {
                    filename: filename.to_string(),
                    family,
                })?,
            Self::Seviri => Satellite::Msg,
        };

        let time_end = layout.time.end;
        let acquired = AcquisitionTime::from_fields(
            field(layout.year, "year")?,
            field(layout.doy, "day-of-year")?,
            field(layout.time, "time")?,
        )
        .map_err(|_| ClassificationError::BadField {
            filename: filename.to_string(),
            field: "acquisition time",
        })?;

        // Every convention separates the time field from the rest with a dot.
        if filename.get(time_end..time_end + 1) != Some(".") {
            return Err(ClassificationError::BadField {
                filename: filename.to_string(),
                field: "time",
            });
        }

        let unknown_suffix = || ClassificationError::UnknownSuffix {
            filename: filename.to_string(),
            family,
        };

        let (kind, is_metadata_sidecar) = match self {
            Self::ModisCloud | Self::ModisAerosol => {
                let kind = if *self == Self::ModisCloud {
                    ProductKind::ModisCloud
                } else {
                    ProductKind::ModisAerosol
                };
                if filename.ends_with(".hdf") {
                    (kind, false)
                } else if filename.ends_with(".hdf.met") {
                    (kind, true)
                } else {
                    return Err(unknown_suffix());
                }
            }
            Self::Seviri => (seviri_kind(filename).ok_or_else(unknown_suffix)?, false),
        };

        Ok(RemoteEntry {
            acquired,
            satellite,
            kind,
            filename: filename.to_string(),
            is_metadata_sidecar,
        })
    }
}

impl std::fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn seviri_kind(filename: &str) -> Option<ProductKind> {
    let name = filename.strip_suffix(GZIP_SUFFIX).unwrap_or(filename);
    if !name.ends_with(".nc") {
        return None;
    }
    if name.ends_with(".C01.nc") {
        return Some(ProductKind::SeviriRadiance { channel: 1 });
    }
    if name.ends_with(".C02.nc") {
        return Some(ProductKind::SeviriRadiance { channel: 2 });
    }
    match filename.as_bytes().get(19) {
        Some(b'c') => Some(ProductKind::SeviriCloud),
        Some(b'a') => Some(ProductKind::SeviriAerosol),
        _ => None,
    }
}

/// What a classified file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    ModisCloud,
    ModisAerosol,
    SeviriRadiance { channel: u8 },
    SeviriCloud,
    SeviriAerosol,
}

impl ProductKind {
    pub fn family(&self) -> ProductFamily {
        match self {
            Self::ModisCloud => ProductFamily::ModisCloud,
            Self::ModisAerosol => ProductFamily::ModisAerosol,
            Self::SeviriRadiance { .. } | Self::SeviriCloud | Self::SeviriAerosol => {
                ProductFamily::Seviri
            }
        }
    }

    /// Variables the plotting step renders for one file of this kind.
    ///
    /// Channel 2 radiances are only ever plotted as the companion of
    /// channel 1, so they own no artifacts of their own.
    pub fn artifact_variables(&self) -> &'static [&'static str] {
        match self {
            Self::ModisCloud => &["ref", "geo", "cot", "Nd"],
            Self::ModisAerosol => &["aod"],
            Self::SeviriRadiance { channel: 1 } => &["CRS"],
            Self::SeviriRadiance { .. } => &[],
            Self::SeviriCloud => &["Re", "Nd", "Tau", "Pbot", "Ptop", "Ztf", "Zbf", "DZ"],
            Self::SeviriAerosol => &["AOD", "ATYP"],
        }
    }
}

/// A swath file identified from its name.
///
/// Ordered by acquisition time first, so sets of entries iterate
/// chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub acquired: AcquisitionTime,
    pub satellite: Satellite,
    pub kind: ProductKind,
    pub filename: String,
    pub is_metadata_sidecar: bool,
}

impl RemoteEntry {
    pub fn day(&self) -> DayKey {
        self.acquired.day
    }

    pub fn hour(&self) -> u32 {
        self.acquired.hour
    }

    pub fn is_compressed(&self) -> bool {
        self.filename.ends_with(GZIP_SUFFIX)
    }

    /// Name the file is stored under locally; compressed products are
    /// kept decompressed.
    pub fn local_name(&self) -> &str {
        self.filename
            .strip_suffix(GZIP_SUFFIX)
            .unwrap_or(&self.filename)
    }

    /// For a sidecar, the data file it describes.
    pub fn paired_data_name(&self) -> Option<&str> {
        if self.is_metadata_sidecar {
            self.filename.strip_suffix(SIDECAR_SUFFIX)
        } else {
            None
        }
    }

    /// For a MODIS data file, the name of its sidecar.
    pub fn sidecar_name(&self) -> Option<String> {
        if !self.is_metadata_sidecar && self.kind.family().has_sidecars() {
            Some(format!("{}{}", self.filename, SIDECAR_SUFFIX))
        } else {
            None
        }
    }

    /// For a channel-1 radiance, the channel-2 file it is plotted with.
    pub fn companion_name(&self) -> Option<String> {
        match self.kind {
            ProductKind::SeviriRadiance { channel: 1 } => self
                .local_name()
                .strip_suffix("1.nc")
                .map(|stem| format!("{}2.nc", stem)),
            _ => None,
        }
    }

    /// File names the plotting step writes for this entry.
    ///
    /// `YYYY_MM_DD_HHMM_<var>.png`, keyed on the acquisition day so that a
    /// swath reconciled after midnight still maps to the same artifacts.
    pub fn expected_artifact_names(&self) -> BTreeSet<String> {
        if self.is_metadata_sidecar {
            return BTreeSet::new();
        }
        let prefix = self.day().artifact_prefix();
        let hhmm = self.acquired.hhmm();
        self.kind
            .artifact_variables()
            .iter()
            .map(|var| format!("{}_{}_{}.png", prefix, hhmm, var))
            .collect()
    }
}

impl std::fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.filename)
    }
}
