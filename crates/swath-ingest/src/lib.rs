//! Satellite swath ingestion library.
//!
//! Everything the acquisition pipeline needs to reason about files without
//! talking to the network:
//!
//! - Filename classification for the MODIS cloud, MODIS ACAERO and SEVIRI
//!   naming conventions, and the image artifacts each file should produce
//! - Bounding-box extraction from MODIS metadata sidecars
//! - Day-partition layout and per-cycle inventory snapshots
//! - Structural validation of downloaded payloads
//! - Backlog reconciliation (downloaded but not yet plotted)

pub mod backlog;
pub mod error;
pub mod inventory;
pub mod naming;
pub mod sidecar;
pub mod validate;

// Re-exports
pub use backlog::BacklogReconciler;
pub use error::{IngestError, Result};
pub use inventory::{DayPartition, LocalInventory, PartitionLayout, PARTIAL_SUFFIX};
pub use naming::{ClassificationError, ProductFamily, ProductKind, RemoteEntry};
pub use sidecar::{parse_bounding_box, SidecarError};
pub use validate::{unpack_payload, SignatureValidator, SwathValidator, ValidationError};
