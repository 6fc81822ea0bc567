//! Once-a-day jobs: partition reset and composite maps.

use std::collections::{BTreeMap, BTreeSet};

use swath_common::{DayKey, Satellite};
use swath_ingest::{DayPartition, LocalInventory, PartitionLayout, ProductFamily, Result};
use tracing::{debug, info, instrument};

use crate::handoff::{CompositeRequest, CompositeSwath};

/// Daily maps rendered from every cloud swath of the day.
const CLOUD_MAPS: &[&str] = &["ref", "cot", "Nd"];
/// Terra also gets the 2.1/1.6 µm difference maps.
const TERRA_DIFFERENCE_MAPS: &[&str] = &[
    "delta_ref",
    "del_ref",
    "delta_cot",
    "del_cot",
    "delta_Nd",
    "del_Nd",
];
/// Rendered when at least one cloud swath has an aerosol swath.
const AEROSOL_MAPS: &[&str] = &["ACAOD", "ACAOD_ModAbsAero"];
/// Per-swath cloud/aerosol comparison panels (Terra only).
const COMPARISON_PANELS: &[&str] = &[
    "delta_ref16",
    "delta_COT16",
    "delta_Nd16",
    "del_ref16",
    "del_COT16",
    "del_Nd16",
];

/// Create today's file and image directories for each satellite.
///
/// Safe to repeat; existing partitions are left untouched.
#[instrument(skip(layout))]
pub fn reset_partitions(
    layout: &PartitionLayout,
    satellites: &[Satellite],
    day: DayKey,
) -> Result<Vec<DayPartition>> {
    let mut created = Vec::with_capacity(satellites.len());
    for &satellite in satellites {
        let partition = layout.partition(satellite, day);
        if partition.exists() {
            debug!(satellite = %satellite, "Partition already exists");
        } else {
            partition.ensure()?;
            info!(
                satellite = %satellite,
                files = %partition.file_dir.display(),
                images = %partition.image_dir.display(),
                "Created day partition"
            );
        }
        created.push(partition);
    }
    Ok(created)
}

/// Artifact names for a satellite's daily composite.
///
/// `paired_times` are the `HHMM` times of cloud swaths that have an aerosol
/// swath; they add the aerosol maps and, for Terra, comparison panels.
pub fn composite_artifact_names(
    satellite: Satellite,
    day: DayKey,
    paired_times: &BTreeSet<String>,
) -> BTreeSet<String> {
    let prefix = day.artifact_prefix();
    let mut maps: Vec<&str> = CLOUD_MAPS.to_vec();
    if satellite == Satellite::Terra {
        maps.extend_from_slice(TERRA_DIFFERENCE_MAPS);
    }
    if !paired_times.is_empty() {
        maps.extend_from_slice(AEROSOL_MAPS);
    }

    let mut names: BTreeSet<String> = maps
        .iter()
        .map(|var| format!("{}_map_{}.png", prefix, var))
        .collect();

    if satellite == Satellite::Terra {
        for hhmm in paired_times {
            for panel in COMPARISON_PANELS {
                names.insert(format!("{}_{}_comp_{}.png", prefix, hhmm, panel));
            }
        }
    }
    names
}

/// Build the composite request for one MODIS satellite.
///
/// Returns `None` when there is nothing to do: no cloud swaths, or every
/// composite artifact already exists.
pub fn composite_request(
    layout: &PartitionLayout,
    satellite: Satellite,
    day: DayKey,
) -> Result<Option<CompositeRequest>> {
    let partition = layout.partition(satellite, day);
    if !partition.exists() {
        debug!(satellite = %satellite, day = %day, "No partition, nothing to composite");
        return Ok(None);
    }
    let inventory = LocalInventory::snapshot(&partition)?;

    let mut clouds = BTreeMap::new();
    let mut aerosols = BTreeMap::new();
    for name in inventory.list_files() {
        for (family, bucket) in [
            (ProductFamily::ModisCloud, &mut clouds),
            (ProductFamily::ModisAerosol, &mut aerosols),
        ] {
            if let Ok(entry) = family.classify(name) {
                if !entry.is_metadata_sidecar && entry.satellite == satellite && entry.day() == day
                {
                    bucket.insert(entry.acquired, entry);
                }
            }
        }
    }

    if clouds.is_empty() {
        info!(satellite = %satellite, day = %day, "No cloud swaths for composite");
        return Ok(None);
    }

    let mut paired_times = BTreeSet::new();
    let swaths: Vec<CompositeSwath> = clouds
        .iter()
        .map(|(acquired, cloud)| {
            let aerosol = aerosols.get(acquired);
            if aerosol.is_some() {
                paired_times.insert(acquired.hhmm());
            }
            CompositeSwath {
                cloud_path: partition.file_path(&cloud.filename),
                aerosol_path: aerosol.map(|a| partition.file_path(&a.filename)),
            }
        })
        .collect();

    let expected = composite_artifact_names(satellite, day, &paired_times);
    if expected.iter().all(|name| inventory.has_output(name)) {
        debug!(satellite = %satellite, day = %day, "Composite already rendered");
        return Ok(None);
    }

    Ok(Some(CompositeRequest {
        satellite,
        day,
        image_dir: partition.image_dir.clone(),
        swaths,
        expected_artifacts: expected.into_iter().collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::*;

    fn layout(tree: &TestTree) -> PartitionLayout {
        PartitionLayout::new(tree.file_root(), tree.image_root())
    }

    #[test]
    fn test_reset_is_idempotent() {
        let tree = TestTree::new();
        let layout = layout(&tree);
        let sats = [Satellite::Terra, Satellite::Msg];

        let first = reset_partitions(&layout, &sats, TestTree::day()).unwrap();
        assert!(first.iter().all(|p| p.exists()));

        tree.put_file(Satellite::Terra, "keep.hdf", b"x");
        reset_partitions(&layout, &sats, TestTree::day()).unwrap();
        assert!(tree.has_file(Satellite::Terra, "keep.hdf"));
    }

    #[test]
    fn test_aqua_composite_names() {
        let names = composite_artifact_names(Satellite::Aqua, TestTree::day(), &BTreeSet::new());
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec![
                "2016_09_09_map_Nd.png",
                "2016_09_09_map_cot.png",
                "2016_09_09_map_ref.png",
            ]
        );
    }

    #[test]
    fn test_terra_composite_with_pairs() {
        let paired: BTreeSet<String> = ["1045".to_string()].into();
        let names = composite_artifact_names(Satellite::Terra, TestTree::day(), &paired);
        assert_eq!(names.len(), 3 + 6 + 2 + 6);
        assert!(names.contains("2016_09_09_map_ACAOD.png"));
        assert!(names.contains("2016_09_09_1045_comp_del_Nd16.png"));
    }

    #[test]
    fn test_composite_request_pairs_by_time() {
        let tree = TestTree::new().with_partition(Satellite::Terra);
        let cloud_a = modis_cloud_name(Satellite::Terra, "1045");
        let cloud_b = modis_cloud_name(Satellite::Terra, "1050");
        tree.put_file(Satellite::Terra, &cloud_a, &hdf4_bytes());
        tree.put_file(Satellite::Terra, &sidecar_name(&cloud_a), b"meta");
        tree.put_file(Satellite::Terra, &cloud_b, &hdf4_bytes());
        tree.put_file(
            Satellite::Terra,
            &modis_aerosol_name(Satellite::Terra, "1045"),
            &hdf4_bytes(),
        );

        let request = composite_request(&layout(&tree), Satellite::Terra, TestTree::day())
            .unwrap()
            .unwrap();
        assert_eq!(request.swaths.len(), 2);
        assert!(request.swaths[0].aerosol_path.is_some());
        assert!(request.swaths[1].aerosol_path.is_none());
        assert!(request
            .expected_artifacts
            .contains(&"2016_09_09_1045_comp_delta_ref16.png".to_string()));
    }

    #[test]
    fn test_rendered_composite_skipped() {
        let tree = TestTree::new().with_partition(Satellite::Aqua);
        tree.put_file(
            Satellite::Aqua,
            &modis_cloud_name(Satellite::Aqua, "1340"),
            &hdf4_bytes(),
        );
        for name in composite_artifact_names(Satellite::Aqua, TestTree::day(), &BTreeSet::new()) {
            tree.put_image(Satellite::Aqua, &name);
        }

        let request = composite_request(&layout(&tree), Satellite::Aqua, TestTree::day()).unwrap();
        assert!(request.is_none());
    }

    #[test]
    fn test_missing_partition_is_not_an_error() {
        let tree = TestTree::new();
        let request = composite_request(&layout(&tree), Satellite::Terra, TestTree::day()).unwrap();
        assert!(request.is_none());
    }
}
