//! One polling pass over a single stream.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use swath_common::{DayKey, StudyRegion};
use swath_ingest::{
    BacklogReconciler, IngestError, LocalInventory, PartitionLayout, ProductKind, RemoteEntry,
    SwathValidator,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::archive::{RemoteArchive, RemoteLister, TransportError};
use crate::config::StreamConfig;
use crate::fetch::{DownloadTarget, FetchExecutor};
use crate::handoff::{HandoffRequest, ProductRequest, ProductSink};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Listing failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Where a cycle is. Every run starts and ends in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Listing,
    Fetching,
    Reconciling,
    HandingOff,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listing => "listing",
            Self::Fetching => "fetching",
            Self::Reconciling => "reconciling",
            Self::HandingOff => "handing_off",
        };
        f.write_str(name)
    }
}

/// A configured stream bound to its archive.
#[derive(Clone)]
pub struct Stream {
    pub config: StreamConfig,
    lister: RemoteLister,
    executor: FetchExecutor,
}

impl Stream {
    pub fn new(
        config: StreamConfig,
        archive: Arc<dyn RemoteArchive>,
        validator: Arc<dyn SwathValidator>,
        region: StudyRegion,
    ) -> Self {
        Self {
            config,
            lister: RemoteLister::new(archive.clone()),
            executor: FetchExecutor::new(archive, validator, region),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    fn reconciler(&self) -> BacklogReconciler {
        BacklogReconciler::new(
            self.config.family,
            self.config.satellite,
            self.config.hour_window,
        )
    }
}

/// Counts logged at the end of every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub candidates: usize,
    pub downloaded: usize,
    pub rejected: usize,
    pub corrupted: usize,
    pub already_present: usize,
    pub backlog: usize,
    pub handed_off: usize,
    pub deferred: usize,
    pub handoff_failed: usize,
    /// The fetch run stopped early; the remainder is picked up next cycle.
    pub interrupted: bool,
}

/// Drives one stream through list, fetch, reconcile and hand-off.
pub struct PollCycle<'a> {
    stream: &'a Stream,
    layout: &'a PartitionLayout,
    sink: &'a dyn ProductSink,
    state: CycleState,
}

impl<'a> PollCycle<'a> {
    pub fn new(stream: &'a Stream, layout: &'a PartitionLayout, sink: &'a dyn ProductSink) -> Self {
        Self {
            stream,
            layout,
            sink,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn enter(&mut self, next: CycleState) {
        debug!(stream = %self.stream.id(), from = %self.state, to = %next, "Cycle state");
        self.state = next;
    }

    /// Run one full cycle for `day`.
    ///
    /// Only a failed listing or an unusable partition is an error; every
    /// per-file problem is counted in the report and retried next cycle.
    #[instrument(skip_all, fields(stream = %self.stream.id(), day = %day))]
    pub async fn run(&mut self, day: DayKey) -> Result<CycleReport, CycleError> {
        let result = self.run_inner(day).await;
        self.enter(CycleState::Idle);

        match &result {
            Ok(report) => info!(
                stream = %self.stream.id(),
                listed = report.listed,
                downloaded = report.downloaded,
                rejected = report.rejected,
                corrupted = report.corrupted,
                already_present = report.already_present,
                backlog = report.backlog,
                handed_off = report.handed_off,
                deferred = report.deferred,
                handoff_failed = report.handoff_failed,
                interrupted = report.interrupted,
                "Cycle complete"
            ),
            Err(e) => warn!(stream = %self.stream.id(), error = %e, "Cycle skipped"),
        }
        result
    }

    async fn run_inner(&mut self, day: DayKey) -> Result<CycleReport, CycleError> {
        let stream = self.stream;
        let config = &stream.config;
        let mut report = CycleReport::default();

        let partition = self.layout.partition(config.satellite, day);
        if !partition.exists() {
            info!(partition = %partition.file_dir.display(), "Creating missing partition");
            partition.ensure()?;
        }

        self.enter(CycleState::Listing);
        let remote_path = config.remote_path(day);
        let names = stream.lister.list(&remote_path).await?;
        report.listed = names.len();

        let inventory = LocalInventory::snapshot(&partition)?;
        let targets: Vec<DownloadTarget> = names
            .iter()
            .filter_map(|name| self.candidate(name, day))
            .map(|entry| DownloadTarget::new(entry, remote_path.clone(), &partition))
            .collect();
        report.candidates = targets.len();

        self.enter(CycleState::Fetching);
        let fetched = stream.executor.run(targets, &inventory).await;
        report.downloaded = fetched.downloaded();
        report.rejected = fetched.rejected();
        report.corrupted = fetched.corrupted();
        report.already_present = fetched.already_present();
        report.interrupted = fetched.interrupted.is_some();

        self.enter(CycleState::Reconciling);
        // No second listing: only what this cycle committed is added.
        let inventory = inventory.with_committed(fetched.committed_files());
        let mut backlog = stream.reconciler().backlog(&inventory);
        backlog.retain(|entry| config.accepts_kind(entry.kind));
        report.backlog = backlog.len();

        // Keyed by local name so a fresh `.gz` download and its stored form merge.
        let mut pending: BTreeMap<String, RemoteEntry> = BTreeMap::new();
        for entry in fetched.new_data_files() {
            match config.family.classify(entry.local_name()) {
                Ok(stored) => {
                    pending.insert(stored.filename.clone(), stored);
                }
                Err(e) => warn!(file = %entry, error = %e, "Stored name does not classify"),
            }
        }
        for entry in backlog {
            pending.insert(entry.filename.clone(), entry);
        }
        pending.retain(|_, entry| {
            entry
                .expected_artifact_names()
                .iter()
                .any(|artifact| !inventory.has_output(artifact))
        });

        self.enter(CycleState::HandingOff);
        for entry in pending.values().rev() {
            let companion_path = match entry.kind {
                ProductKind::SeviriRadiance { channel: 1 } => {
                    match entry.companion_name() {
                        Some(name) if inventory.contains_file(&name) => {
                            Some(partition.file_path(&name))
                        }
                        _ => {
                            info!(file = %entry, "Channel 2 not present yet, deferring");
                            report.deferred += 1;
                            continue;
                        }
                    }
                }
                _ => None,
            };

            let request = ProductRequest::Swath(HandoffRequest::new(
                entry,
                partition.file_path(&entry.filename),
                companion_path,
                partition.image_dir.clone(),
            ));
            match self.sink.submit(&request).await {
                Ok(()) => {
                    debug!(file = %entry, "Handed off");
                    report.handed_off += 1;
                }
                Err(e) => {
                    warn!(file = %entry, error = %e, "Hand-off failed, will retry from backlog");
                    report.handoff_failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Classify a listed name and keep it if it belongs to this stream today.
    fn candidate(&self, name: &str, day: DayKey) -> Option<RemoteEntry> {
        let config = &self.stream.config;
        let entry = match config.family.classify(name) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(file = %name, error = %e, "Ignoring unclassified name");
                return None;
            }
        };

        if entry.satellite != config.satellite
            || entry.day() != day
            || !config.accepts_kind(entry.kind)
        {
            debug!(file = %name, "Not part of this stream");
            return None;
        }
        if let Some(window) = config.hour_window {
            if !window.contains(entry.hour()) {
                debug!(file = %name, hour = entry.hour(), "Outside acquisition window");
                return None;
            }
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(CycleState::HandingOff.to_string(), "handing_off");
        assert_eq!(CycleState::Idle.to_string(), "idle");
    }
}
