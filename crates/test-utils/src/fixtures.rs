//! Common test fixtures: filenames, sidecars and payload bytes.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use swath_common::{GeoBoundingBox, Satellite};

/// Campaign year used by every fixture name.
pub const YEAR: i32 = 2016;

/// Day of year used by every fixture name (9 September 2016).
pub const DOY: u32 = 253;

/// Region bounds as (north, south, east, west).
pub mod region {
    /// The campaign study region.
    pub const SOUTHEAST_ATLANTIC: (f64, f64, f64, f64) = (-4.5, -25.5, 15.5, -15.5);
}

/// Swath extents as (north, south, east, west).
pub mod swath {
    /// Well inside the study region.
    pub const INSIDE: (f64, f64, f64, f64) = (-8.0, -20.0, 10.0, -5.0);

    /// Entirely south of the study region.
    pub const SOUTH_OF_REGION: (f64, f64, f64, f64) = (-28.0, -30.0, 10.0, 0.0);

    /// Straddles the southern edge.
    pub const STRADDLING_SOUTH: (f64, f64, f64, f64) = (-20.0, -35.0, 10.0, 0.0);
}

pub fn bbox((north, south, east, west): (f64, f64, f64, f64)) -> GeoBoundingBox {
    GeoBoundingBox::new(north, south, east, west)
}

fn modis_prefix(satellite: Satellite) -> &'static str {
    satellite.modis_prefix().unwrap_or("MOD")
}

/// `MOD06_L2.A2016253.<hhmm>.006.NRT.hdf`
pub fn modis_cloud_name(satellite: Satellite, hhmm: &str) -> String {
    format!("{}06_L2.A{}{:03}.{}.006.NRT.hdf", modis_prefix(satellite), YEAR, DOY, hhmm)
}

/// `MOD06ACAERO.A2016253.<hhmm>.006.NRT.hdf`
pub fn modis_aerosol_name(satellite: Satellite, hhmm: &str) -> String {
    format!(
        "{}06ACAERO.A{}{:03}.{}.006.NRT.hdf",
        modis_prefix(satellite),
        YEAR,
        DOY,
        hhmm
    )
}

pub fn sidecar_name(data_name: &str) -> String {
    format!("{}.met", data_name)
}

/// `MET10.2016253.<hhmm>.VISST.C0<channel>.nc`
pub fn seviri_radiance_name(hhmm: &str, channel: u8) -> String {
    format!("MET10.{}{:03}.{}.VISST.C0{}.nc", YEAR, DOY, hhmm, channel)
}

/// `MET10.2016253.<hhmm>.<product>.nc[.gz]`
pub fn seviri_product_name(hhmm: &str, product: &str, compressed: bool) -> String {
    let gz = if compressed { ".gz" } else { "" };
    format!("MET10.{}{:03}.{}.{}.nc{}", YEAR, DOY, hhmm, product, gz)
}

/// ODL sidecar text carrying the given bounding coordinates.
pub fn sidecar_text(bbox: &GeoBoundingBox) -> String {
    let mut text = String::from(
        "GROUP                  = INVENTORYMETADATA\n  GROUPTYPE            = MASTERGROUP\n",
    );
    for (key, value) in [
        ("EASTBOUNDINGCOORDINATE", bbox.east),
        ("WESTBOUNDINGCOORDINATE", bbox.west),
        ("NORTHBOUNDINGCOORDINATE", bbox.north),
        ("SOUTHBOUNDINGCOORDINATE", bbox.south),
    ] {
        text.push_str(&format!(
            "      OBJECT                 = {key}\n        NUM_VAL              = 1\n        VALUE                = {value}\n      END_OBJECT             = {key}\n"
        ));
    }
    text.push_str("END_GROUP              = INVENTORYMETADATA\nEND\n");
    text
}

/// Minimal bytes that pass the HDF4 signature check.
pub fn hdf4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x0e, 0x03, 0x13, 0x01];
    bytes.extend_from_slice(&[0u8; 60]);
    bytes
}

/// Minimal bytes that pass the NetCDF classic signature check.
pub fn netcdf_bytes() -> Vec<u8> {
    let mut bytes = b"CDF\x01".to_vec();
    bytes.extend_from_slice(&[0u8; 60]);
    bytes
}

/// A typical failed transfer: an HTML error page instead of data.
pub fn garbage_bytes() -> Vec<u8> {
    b"<html><body>503 Service Unavailable</body></html>".to_vec()
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(bytes);
    encoder.finish().unwrap_or_default()
}
