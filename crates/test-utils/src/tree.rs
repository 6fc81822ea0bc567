//! Temporary file/image partition trees.

use std::path::{Path, PathBuf};

use swath_common::{DayKey, Satellite};
use tempfile::TempDir;

use crate::fixtures::{DOY, YEAR};

/// A throwaway `<root>/files` + `<root>/images` tree.
///
/// Removed when dropped.
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_root(&self) -> PathBuf {
        self.root().join("files")
    }

    pub fn image_root(&self) -> PathBuf {
        self.root().join("images")
    }

    /// The fixture day (2016-253).
    pub fn day() -> DayKey {
        DayKey::new(YEAR, DOY).expect("valid fixture day")
    }

    pub fn file_dir(&self, satellite: Satellite) -> PathBuf {
        self.file_root()
            .join(satellite.dir_name())
            .join(Self::day().dir_name())
    }

    pub fn image_dir(&self, satellite: Satellite) -> PathBuf {
        self.image_root()
            .join(satellite.dir_name())
            .join(Self::day().dir_name())
    }

    /// Create both partition directories for the fixture day.
    pub fn with_partition(self, satellite: Satellite) -> Self {
        std::fs::create_dir_all(self.file_dir(satellite)).expect("create file dir");
        std::fs::create_dir_all(self.image_dir(satellite)).expect("create image dir");
        self
    }

    pub fn put_file(&self, satellite: Satellite, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.file_dir(satellite).join(name);
        std::fs::write(&path, bytes).expect("write fixture file");
        path
    }

    pub fn put_image(&self, satellite: Satellite, name: &str) -> PathBuf {
        let path = self.image_dir(satellite).join(name);
        std::fs::write(&path, b"\x89PNG").expect("write fixture image");
        path
    }

    pub fn has_file(&self, satellite: Satellite, name: &str) -> bool {
        self.file_dir(satellite).join(name).exists()
    }

    /// Sorted names in the satellite's file partition.
    pub fn files(&self, satellite: Satellite) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.file_dir(satellite))
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().to_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}
