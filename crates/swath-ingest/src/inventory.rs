//! Day partitions and per-cycle snapshots of what is already on disk.
//!
//! Local layout:
//!
//! ```text
//! <file_root>/<satellite>/<julian_day>/<filename>
//! <image_root>/<satellite>/<julian_day>/<artifact>.png
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use swath_common::{DayKey, Satellite};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{IngestError, Result};

/// Suffix of files still being written. Never reported as present.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Roots of the raw-file and image trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionLayout {
    pub file_root: PathBuf,
    pub image_root: PathBuf,
}

impl PartitionLayout {
    pub fn new(file_root: impl Into<PathBuf>, image_root: impl Into<PathBuf>) -> Self {
        Self {
            file_root: file_root.into(),
            image_root: image_root.into(),
        }
    }

    pub fn partition(&self, satellite: Satellite, day: DayKey) -> DayPartition {
        let tail = Path::new(satellite.dir_name()).join(day.dir_name());
        DayPartition {
            satellite,
            day,
            file_dir: self.file_root.join(&tail),
            image_dir: self.image_root.join(&tail),
        }
    }
}

/// One satellite's directories for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPartition {
    pub satellite: Satellite,
    pub day: DayKey,
    pub file_dir: PathBuf,
    pub image_dir: PathBuf,
}

impl DayPartition {
    pub fn exists(&self) -> bool {
        self.file_dir.is_dir() && self.image_dir.is_dir()
    }

    /// Create both directories if needed. Existing contents are untouched.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.file_dir)?;
        std::fs::create_dir_all(&self.image_dir)?;
        Ok(())
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.file_dir.join(name)
    }

    /// In-flight path for a file being downloaded.
    pub fn partial_path(&self, name: &str) -> PathBuf {
        self.file_dir.join(format!("{}{}", name, PARTIAL_SUFFIX))
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.image_dir.join(name)
    }
}

/// Directory listings of a partition, taken once at the start of a cycle.
///
/// Every question asked during the cycle is answered from the same snapshot,
/// so fetching and reconciliation agree on what was present.
#[derive(Debug, Clone)]
pub struct LocalInventory {
    partition: DayPartition,
    files: BTreeSet<String>,
    outputs: BTreeSet<String>,
}

impl LocalInventory {
    pub fn snapshot(partition: &DayPartition) -> Result<Self> {
        if !partition.exists() {
            let missing = if partition.file_dir.is_dir() {
                &partition.image_dir
            } else {
                &partition.file_dir
            };
            return Err(IngestError::PartitionMissing(missing.clone()));
        }

        let files = list_dir(&partition.file_dir)?
            .into_iter()
            .filter(|name| !name.ends_with(PARTIAL_SUFFIX))
            .collect::<BTreeSet<_>>();
        let outputs = list_dir(&partition.image_dir)?;

        debug!(
            satellite = %partition.satellite,
            day = %partition.day,
            files = files.len(),
            outputs = outputs.len(),
            "Took inventory snapshot"
        );

        Ok(Self {
            partition: partition.clone(),
            files,
            outputs,
        })
    }

    /// This snapshot plus files the cycle itself committed.
    ///
    /// Anything else that appeared on disk since the snapshot is left for the
    /// next cycle.
    pub fn with_committed<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut next = self.clone();
        next.files.extend(
            names
                .into_iter()
                .filter(|name| !name.ends_with(PARTIAL_SUFFIX))
                .map(str::to_string),
        );
        next
    }

    pub fn partition(&self) -> &DayPartition {
        &self.partition
    }

    pub fn list_files(&self) -> &BTreeSet<String> {
        &self.files
    }

    pub fn contains_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    pub fn has_output(&self, artifact_name: &str) -> bool {
        self.outputs.contains(artifact_name)
    }
}

fn list_dir(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| IngestError::Listing {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(root: &Path) -> PartitionLayout {
        PartitionLayout::new(root.join("files"), root.join("images"))
    }

    #[test]
    fn test_partition_paths() {
        let layout = PartitionLayout::new("/data/files", "/data/images");
        let day = DayKey::new(2016, 253).unwrap();
        let partition = layout.partition(Satellite::Terra, day);
        assert_eq!(partition.file_dir, PathBuf::from("/data/files/terra/253"));
        assert_eq!(partition.image_dir, PathBuf::from("/data/images/terra/253"));
        assert_eq!(
            partition.partial_path("a.hdf"),
            PathBuf::from("/data/files/terra/253/a.hdf.partial")
        );
    }

    #[test]
    fn test_snapshot_missing_partition() {
        let tmp = tempfile::tempdir().unwrap();
        let partition = layout(tmp.path()).partition(Satellite::Aqua, DayKey::new(2016, 1).unwrap());
        assert!(matches!(
            LocalInventory::snapshot(&partition),
            Err(IngestError::PartitionMissing(_))
        ));
    }

    #[test]
    fn test_snapshot_ignores_partials_and_subdirs() {
        let tmp = tempfile::tempdir().unwrap();
        let partition = layout(tmp.path()).partition(Satellite::Aqua, DayKey::new(2016, 1).unwrap());
        partition.ensure().unwrap();
        std::fs::write(partition.file_path("a.hdf"), b"x").unwrap();
        std::fs::write(partition.partial_path("b.hdf"), b"x").unwrap();
        std::fs::create_dir(partition.file_path("nested")).unwrap();
        std::fs::write(partition.image_path("2016_01_01_0000_aod.png"), b"x").unwrap();

        let inventory = LocalInventory::snapshot(&partition).unwrap();
        assert_eq!(inventory.list_files().len(), 1);
        assert!(inventory.contains_file("a.hdf"));
        assert!(!inventory.contains_file("b.hdf.partial"));
        assert!(inventory.has_output("2016_01_01_0000_aod.png"));
    }

    #[test]
    fn test_snapshot_is_stable_after_disk_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let partition = layout(tmp.path()).partition(Satellite::Msg, DayKey::new(2016, 2).unwrap());
        partition.ensure().unwrap();
        let inventory = LocalInventory::snapshot(&partition).unwrap();
        std::fs::write(partition.file_path("late.nc"), b"x").unwrap();
        assert!(!inventory.contains_file("late.nc"));
    }

    #[test]
    fn test_with_committed_adds_only_named_files() {
        let tmp = tempfile::tempdir().unwrap();
        let partition = layout(tmp.path()).partition(Satellite::Terra, DayKey::new(2016, 253).unwrap());
        partition.ensure().unwrap();
        std::fs::write(partition.file_path("early.hdf"), b"x").unwrap();
        let inventory = LocalInventory::snapshot(&partition).unwrap();

        std::fs::write(partition.file_path("fetched.hdf"), b"x").unwrap();
        std::fs::write(partition.file_path("stray.hdf"), b"x").unwrap();
        let after = inventory.with_committed(["fetched.hdf", "x.hdf.partial"]);

        assert!(after.contains_file("early.hdf"));
        assert!(after.contains_file("fetched.hdf"));
        assert!(!after.contains_file("stray.hdf"));
        assert!(!after.contains_file("x.hdf.partial"));
        assert!(!inventory.contains_file("fetched.hdf"));
    }
}
