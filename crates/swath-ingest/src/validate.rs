//! Structural checks on downloaded payloads.
//!
//! The decode/plot collaborator owns the file formats. All the pipeline needs
//! is a cheap answer to "would this open at all", so a truncated or garbled
//! transfer is discarded before it is handed off.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::naming::{ProductKind, RemoteEntry};

/// HDF4 files start with `^N^C^S^A`.
const HDF4_MAGIC: &[u8] = &[0x0e, 0x03, 0x13, 0x01];
/// HDF5 (and NetCDF-4) signature.
const HDF5_MAGIC: &[u8] = &[0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, 0x0a];
/// NetCDF classic, 64-bit offset and CDF-5 variants share this prefix.
const NETCDF_CLASSIC_MAGIC: &[u8] = b"CDF";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("File is empty")]
    Empty,

    #[error("Unrecognized {expected} signature")]
    BadSignature { expected: &'static str },

    #[error("Gzip stream is corrupt: {0}")]
    Decompression(String),
}

/// Seam to the decode collaborator: can this local file be opened?
pub trait SwathValidator: Send + Sync {
    fn validate(&self, path: &Path, entry: &RemoteEntry) -> Result<(), ValidationError>;
}

/// Checks the container signature expected for the product kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureValidator;

impl SwathValidator for SignatureValidator {
    fn validate(&self, path: &Path, entry: &RemoteEntry) -> Result<(), ValidationError> {
        let read_err = |source| ValidationError::Read {
            path: path.display().to_string(),
            source,
        };
        let mut header = [0u8; 8];
        let mut file = File::open(path).map_err(read_err)?;
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..]).map_err(read_err)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        check_signature(&header[..filled], entry.kind)
    }
}

fn check_signature(header: &[u8], kind: ProductKind) -> Result<(), ValidationError> {
    if header.is_empty() {
        return Err(ValidationError::Empty);
    }
    let ok = match kind {
        ProductKind::ModisCloud | ProductKind::ModisAerosol => header.starts_with(HDF4_MAGIC),
        ProductKind::SeviriRadiance { .. }
        | ProductKind::SeviriCloud
        | ProductKind::SeviriAerosol => {
            header.starts_with(NETCDF_CLASSIC_MAGIC) || header.starts_with(HDF5_MAGIC)
        }
    };
    if ok {
        Ok(())
    } else {
        Err(ValidationError::BadSignature {
            expected: match kind {
                ProductKind::ModisCloud | ProductKind::ModisAerosol => "HDF4",
                _ => "NetCDF",
            },
        })
    }
}

/// Turn downloaded bytes into the bytes stored locally.
///
/// Compressed products are inflated so the collaborator only ever sees the
/// plain file under [`RemoteEntry::local_name`].
pub fn unpack_payload(entry: &RemoteEntry, bytes: &[u8]) -> Result<Vec<u8>, ValidationError> {
    if !entry.is_compressed() {
        return Ok(bytes.to_vec());
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ValidationError::Decompression(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::ProductFamily;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_hdf4_signature() {
        let mut bytes = HDF4_MAGIC.to_vec();
        bytes.extend_from_slice(b"rest of file");
        assert!(check_signature(&bytes, ProductKind::ModisCloud).is_ok());
        assert!(check_signature(b"<html>", ProductKind::ModisCloud).is_err());
        assert!(check_signature(&bytes, ProductKind::SeviriCloud).is_err());
    }

    #[test]
    fn test_netcdf_signatures() {
        assert!(check_signature(b"CDF\x01\0\0\0\0", ProductKind::SeviriAerosol).is_ok());
        assert!(check_signature(HDF5_MAGIC, ProductKind::SeviriCloud).is_ok());
        assert!(matches!(
            check_signature(b"", ProductKind::SeviriCloud),
            Err(ValidationError::Empty)
        ));
    }

    #[test]
    fn test_unpack_gzip_product() {
        let entry = ProductFamily::Seviri
            .classify("MET10.2016253.1200.cloud.nc.gz")
            .unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"CDF\x01payload").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(unpack_payload(&entry, &compressed).unwrap(), b"CDF\x01payload");
        assert!(matches!(
            unpack_payload(&entry, b"not gzip at all"),
            Err(ValidationError::Decompression(_))
        ));
    }

    #[test]
    fn test_unpack_plain_is_identity() {
        let entry = ProductFamily::Seviri
            .classify("MET10.2016253.1200.VISST.C01.nc")
            .unwrap();
        assert_eq!(unpack_payload(&entry, b"CDF\x01").unwrap(), b"CDF\x01");
    }
}
