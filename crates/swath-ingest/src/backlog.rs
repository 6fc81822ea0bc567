//! Files downloaded in an earlier cycle whose images were never produced.

use std::collections::BTreeSet;

use swath_common::{HourWindow, Satellite};
use tracing::{debug, trace};

use crate::inventory::LocalInventory;
use crate::naming::{ProductFamily, RemoteEntry};

/// Re-queues locally present files with missing artifacts.
///
/// Covers a crash between download and plotting, and hand-offs that failed:
/// no re-download is needed, the file is simply offered again.
#[derive(Debug, Clone, Copy)]
pub struct BacklogReconciler {
    family: ProductFamily,
    satellite: Satellite,
    window: Option<HourWindow>,
}

impl BacklogReconciler {
    pub fn new(family: ProductFamily, satellite: Satellite, window: Option<HourWindow>) -> Self {
        Self {
            family,
            satellite,
            window,
        }
    }

    /// Data files of this stream that still lack at least one artifact.
    pub fn backlog(&self, inventory: &LocalInventory) -> BTreeSet<RemoteEntry> {
        let mut pending = BTreeSet::new();

        for name in inventory.list_files() {
            let entry = match self.family.classify(name) {
                Ok(entry) => entry,
                Err(e) => {
                    trace!(file = %name, error = %e, "Not part of this stream");
                    continue;
                }
            };
            if entry.is_metadata_sidecar || entry.satellite != self.satellite {
                continue;
            }
            if let Some(window) = self.window {
                if !window.contains(entry.hour()) {
                    continue;
                }
            }

            let missing = entry
                .expected_artifact_names()
                .into_iter()
                .filter(|artifact| !inventory.has_output(artifact))
                .count();
            if missing > 0 {
                debug!(file = %name, missing, "Queued from backlog");
                pending.insert(entry);
            }
        }

        pending
    }
}
