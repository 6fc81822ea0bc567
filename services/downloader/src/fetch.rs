//! Download, region-filter and validate candidate files.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use swath_common::{Edge, StudyRegion};
use swath_ingest::{
    parse_bounding_box, unpack_payload, DayPartition, LocalInventory, RemoteEntry, SwathValidator,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::archive::{RemoteArchive, TransportError};

/// Failure that stops the rest of a fetch run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Local I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FetchError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How one candidate was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Committed to the partition under this path.
    Downloaded(PathBuf),
    /// The sidecar box lies entirely beyond this edge of the study region.
    RejectedOutOfRegion(Edge),
    /// Deleted again; the next cycle will retry it.
    Corrupted(String),
    AlreadyPresent,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloaded(path) => write!(f, "downloaded to {}", path.display()),
            Self::RejectedOutOfRegion(edge) => write!(f, "rejected ({} of region)", edge),
            Self::Corrupted(reason) => write!(f, "corrupted: {}", reason),
            Self::AlreadyPresent => f.write_str("already present"),
        }
    }
}

/// A remote file and where it lands locally.
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    pub entry: RemoteEntry,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub partition: DayPartition,
}

impl DownloadTarget {
    pub fn new(entry: RemoteEntry, remote_path: impl Into<String>, partition: &DayPartition) -> Self {
        Self {
            local_path: partition.file_path(entry.local_name()),
            entry,
            remote_path: remote_path.into(),
            partition: partition.clone(),
        }
    }

    fn partial_path(&self) -> PathBuf {
        self.partition.partial_path(self.entry.local_name())
    }
}

/// Result of one pass over a candidate list.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub outcomes: Vec<(RemoteEntry, FetchOutcome)>,
    /// Set when the run stopped before reaching every candidate.
    pub interrupted: Option<FetchError>,
}

impl FetchReport {
    fn count(&self, pred: impl Fn(&FetchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Downloaded(_)))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::RejectedOutOfRegion(_)))
    }

    pub fn corrupted(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Corrupted(_)))
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::AlreadyPresent))
    }

    /// Local names of every file, sidecars included, committed during this run.
    pub fn committed_files(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|(entry, outcome)| {
            matches!(outcome, FetchOutcome::Downloaded(_)).then(|| entry.local_name())
        })
    }

    /// Data files committed during this run.
    pub fn new_data_files(&self) -> impl Iterator<Item = &RemoteEntry> {
        self.outcomes.iter().filter_map(|(entry, outcome)| {
            (matches!(outcome, FetchOutcome::Downloaded(_)) && !entry.is_metadata_sidecar)
                .then_some(entry)
        })
    }
}

/// Downloads candidates one at a time into their day partition.
#[derive(Clone)]
pub struct FetchExecutor {
    archive: Arc<dyn RemoteArchive>,
    validator: Arc<dyn SwathValidator>,
    region: StudyRegion,
}

impl FetchExecutor {
    pub fn new(
        archive: Arc<dyn RemoteArchive>,
        validator: Arc<dyn SwathValidator>,
        region: StudyRegion,
    ) -> Self {
        Self {
            archive,
            validator,
            region,
        }
    }

    /// Resolve a single target against the cycle's inventory snapshot.
    pub async fn fetch(
        &self,
        target: &DownloadTarget,
        inventory: &LocalInventory,
    ) -> Result<FetchOutcome, FetchError> {
        let entry = &target.entry;

        if inventory.contains_file(entry.local_name()) {
            if entry.is_metadata_sidecar {
                // Re-checked so a kept out-of-region sidecar keeps its data file out.
                return self.check_sidecar(&target.local_path).await;
            }
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let payload = self
            .archive
            .retrieve(&target.remote_path, &entry.filename)
            .await?;

        let partial = target.partial_path();
        let bytes = match unpack_payload(entry, &payload) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(FetchOutcome::Corrupted(e.to_string())),
        };
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| FetchError::io(&partial, e))?;

        if !entry.is_metadata_sidecar {
            if let Err(e) = self.validator.validate(&partial, entry) {
                discard(&partial).await;
                return Ok(FetchOutcome::Corrupted(e.to_string()));
            }
        }

        tokio::fs::rename(&partial, &target.local_path)
            .await
            .map_err(|e| FetchError::io(&target.local_path, e))?;

        if entry.is_metadata_sidecar {
            match self.check_sidecar(&target.local_path).await? {
                FetchOutcome::AlreadyPresent => {}
                other => return Ok(other),
            }
        }

        Ok(FetchOutcome::Downloaded(target.local_path.clone()))
    }

    /// Parse a local sidecar and test it against the region.
    ///
    /// Returns `AlreadyPresent` when the swath is accepted. An unreadable
    /// sidecar is deleted so the next cycle downloads it again.
    async fn check_sidecar(&self, path: &Path) -> Result<FetchOutcome, FetchError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| FetchError::io(path, e))?;

        let parsed = String::from_utf8(raw)
            .map_err(|e| e.to_string())
            .and_then(|text| parse_bounding_box(&text).map_err(|e| e.to_string()));

        match parsed {
            Ok(bbox) => Ok(match self.region.rejection(&bbox) {
                Some(edge) => FetchOutcome::RejectedOutOfRegion(edge),
                None => FetchOutcome::AlreadyPresent,
            }),
            Err(reason) => {
                discard(path).await;
                Ok(FetchOutcome::Corrupted(reason))
            }
        }
    }

    /// Resolve targets in the given (most-recent-first) order.
    ///
    /// A transport or disk failure stops the run; everything committed before
    /// it stays, and the next cycle picks up where this one stopped.
    #[instrument(skip_all, fields(candidates = targets.len()))]
    pub async fn run(&self, targets: Vec<DownloadTarget>, inventory: &LocalInventory) -> FetchReport {
        let mut report = FetchReport::default();
        // Data files whose sidecar rejected them, or could not be read, this run.
        let mut excluded: HashSet<String> = HashSet::new();

        for target in targets {
            let entry = &target.entry;

            if let Some(data_name) = entry.paired_data_name() {
                if inventory.contains_file(data_name) {
                    debug!(file = %entry, "Data file already present, sidecar not needed");
                    continue;
                }
            }

            if excluded.contains(entry.local_name()) {
                debug!(file = %entry, "Excluded by its sidecar");
                continue;
            }

            let outcome = match self.fetch(&target, inventory).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(file = %entry, error = %e, "Fetch run interrupted");
                    discard(&target.partial_path()).await;
                    report.interrupted = Some(e);
                    break;
                }
            };

            match &outcome {
                FetchOutcome::Downloaded(path) => {
                    info!(file = %entry, path = %path.display(), "Downloaded")
                }
                FetchOutcome::RejectedOutOfRegion(edge) => {
                    if let Some(data_name) = entry.paired_data_name() {
                        excluded.insert(data_name.to_string());
                    }
                    info!(file = %entry, edge = %edge, "Swath outside study region");
                }
                FetchOutcome::Corrupted(reason) => {
                    if let Some(data_name) = entry.paired_data_name() {
                        excluded.insert(data_name.to_string());
                    }
                    warn!(file = %entry, reason = %reason, "Corrupted download removed");
                }
                FetchOutcome::AlreadyPresent => debug!(file = %entry, "Already present"),
            }
            report.outcomes.push((entry.clone(), outcome));
        }

        report
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use swath_common::Satellite;
    use swath_ingest::{PartitionLayout, ProductFamily, SignatureValidator};
    use test_utils::*;

    fn partition(tree: &TestTree) -> DayPartition {
        PartitionLayout::new(tree.file_root(), tree.image_root())
            .partition(Satellite::Terra, TestTree::day())
    }

    fn inventory(tree: &TestTree) -> LocalInventory {
        LocalInventory::snapshot(&partition(tree)).unwrap()
    }

    #[derive(Default)]
    struct MemoryArchive {
        files: HashMap<String, Bytes>,
        fetched: Mutex<Vec<String>>,
    }

    impl MemoryArchive {
        fn with(mut self, name: &str, bytes: Vec<u8>) -> Self {
            self.files.insert(name.to_string(), Bytes::from(bytes));
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteArchive for MemoryArchive {
        async fn list(&self, _path: &str) -> Result<Vec<String>, TransportError> {
            Ok(self.files.keys().cloned().collect())
        }

        async fn retrieve(&self, _path: &str, name: &str) -> Result<Bytes, TransportError> {
            self.fetched.lock().unwrap().push(name.to_string());
            self.files.get(name).cloned().ok_or(TransportError::Status {
                url: name.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            })
        }
    }

    fn targets(tree: &TestTree, names: &[&str]) -> Vec<DownloadTarget> {
        let partition = partition(tree);
        names
            .iter()
            .map(|name| {
                let entry = ProductFamily::ModisCloud.classify(name).unwrap();
                DownloadTarget::new(entry, "/remote", &partition)
            })
            .collect()
    }

    fn executor(archive: Arc<MemoryArchive>) -> FetchExecutor {
        FetchExecutor::new(archive, Arc::new(SignatureValidator), StudyRegion::default())
    }

    #[tokio::test]
    async fn test_rejected_sidecar_excludes_data_file() {
        let tree = TestTree::new().with_partition(Satellite::Terra);
        let data = modis_cloud_name(Satellite::Terra, "1045");
        let met = sidecar_name(&data);
        let archive = Arc::new(
            MemoryArchive::default()
                .with(&met, sidecar_text(&bbox(swath::SOUTH_OF_REGION)).into_bytes())
                .with(&data, hdf4_bytes()),
        );
        let inventory = inventory(&tree);

        let report = executor(archive.clone())
            .run(targets(&tree, &[&met, &data]), &inventory)
            .await;

        assert_eq!(archive.fetched(), vec![met.clone()]);
        assert_eq!(report.rejected(), 1);
        assert_eq!(report.downloaded(), 0);
        assert!(tree.has_file(Satellite::Terra, &met));
        assert!(!tree.has_file(Satellite::Terra, &data));
    }

    #[tokio::test]
    async fn test_corrupted_data_file_removed() {
        let tree = TestTree::new().with_partition(Satellite::Terra);
        let data = modis_cloud_name(Satellite::Terra, "1045");
        let archive = Arc::new(MemoryArchive::default().with(&data, garbage_bytes()));
        let inventory = inventory(&tree);

        let report = executor(archive).run(targets(&tree, &[&data]), &inventory).await;

        assert_eq!(report.corrupted(), 1);
        assert!(tree.files(Satellite::Terra).is_empty());
    }

    #[tokio::test]
    async fn test_present_data_file_skips_sidecar() {
        let tree = TestTree::new().with_partition(Satellite::Terra);
        let data = modis_cloud_name(Satellite::Terra, "1045");
        let met = sidecar_name(&data);
        tree.put_file(Satellite::Terra, &data, &hdf4_bytes());
        let archive = Arc::new(
            MemoryArchive::default()
                .with(&met, sidecar_text(&bbox(swath::INSIDE)).into_bytes())
                .with(&data, hdf4_bytes()),
        );
        let inventory = inventory(&tree);

        let report = executor(archive.clone())
            .run(targets(&tree, &[&met, &data]), &inventory)
            .await;

        assert!(archive.fetched().is_empty());
        assert_eq!(report.already_present(), 1);
        assert_eq!(report.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_sidecar_deleted() {
        let tree = TestTree::new().with_partition(Satellite::Terra);
        let data = modis_cloud_name(Satellite::Terra, "1045");
        let met = sidecar_name(&data);
        let archive = Arc::new(
            MemoryArchive::default()
                .with(&met, b"GROUP = INVENTORYMETADATA".to_vec())
                .with(&data, hdf4_bytes()),
        );
        let inventory = inventory(&tree);

        let report = executor(archive.clone())
            .run(targets(&tree, &[&met, &data]), &inventory)
            .await;

        assert_eq!(report.corrupted(), 1);
        assert_eq!(archive.fetched(), vec![met]);
        assert!(tree.files(Satellite::Terra).is_empty());
    }

    #[tokio::test]
    async fn test_missing_remote_file_interrupts_run() {
        let tree = TestTree::new().with_partition(Satellite::Terra);
        let newer = modis_cloud_name(Satellite::Terra, "1050");
        let missing = modis_cloud_name(Satellite::Terra, "1045");
        let older = modis_cloud_name(Satellite::Terra, "1040");
        let archive = Arc::new(
            MemoryArchive::default()
                .with(&newer, hdf4_bytes())
                .with(&older, hdf4_bytes()),
        );
        let inventory = inventory(&tree);

        let report = executor(archive)
            .run(targets(&tree, &[&newer, &missing, &older]), &inventory)
            .await;

        assert!(matches!(report.interrupted, Some(FetchError::Transport(_))));
        assert_eq!(report.downloaded(), 1);
        assert_eq!(tree.files(Satellite::Terra), vec![newer]);
    }
}
