//! Pipeline configuration.
//!
//! Loaded from a single YAML file (default `config/pipeline.yaml`).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use swath_common::{DayKey, HourWindow, Satellite, StudyRegion};
use swath_ingest::{PartitionLayout, ProductFamily, ProductKind};
use tracing::{debug, info};

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub region: StudyRegion,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub archives: HashMap<String, ArchiveConfig>,
    #[serde(default)]
    pub handoff: HandoffConfig,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub file_root: PathBuf,
    pub image_root: PathBuf,
}

impl PathsConfig {
    pub fn layout(&self) -> PartitionLayout {
        PartitionLayout::new(&self.file_root, &self.image_root)
    }
}

/// Fixed scheduling constants.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between scheduler wake-ups
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// UTC time at which the day's partitions are created
    #[serde(default = "default_reset_time", deserialize_with = "hh_mm")]
    pub daily_reset: NaiveTime,
    /// UTC time at which daily composites are requested
    #[serde(default = "default_composite_time", deserialize_with = "hh_mm")]
    pub daily_composite: NaiveTime,
}

fn default_tick() -> u64 {
    10
}

fn default_reset_time() -> NaiveTime {
    NaiveTime::MIN
}

fn default_composite_time() -> NaiveTime {
    NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick(),
            daily_reset: default_reset_time(),
            daily_composite: default_composite_time(),
        }
    }
}

fn hh_mm<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
        .map_err(|_| serde::de::Error::custom(format!("expected HH:MM, got '{}'", raw)))
}

/// A remote file server.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    pub base_url: String,
    /// Environment variable holding the user name
    #[serde(default)]
    pub username_env: Option<String>,
    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,
    /// Connect and request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    60
}

impl ArchiveConfig {
    /// Resolve credentials from the environment, if configured.
    pub fn credentials(&self) -> Result<Option<(String, String)>> {
        match (&self.username_env, &self.password_env) {
            (Some(user_var), Some(pass_var)) => {
                let user = std::env::var(user_var)
                    .with_context(|| format!("Environment variable {} not set", user_var))?;
                let pass = std::env::var(pass_var)
                    .with_context(|| format!("Environment variable {} not set", pass_var))?;
                Ok(Some((user, pass)))
            }
            (None, None) => Ok(None),
            _ => bail!("username_env and password_env must be set together"),
        }
    }
}

/// Where validated files are sent for decoding and plotting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandoffConfig {
    /// POST a JSON request to this URL
    #[serde(default)]
    pub url: Option<String>,
    /// Or run this program with the request as arguments
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default = "default_handoff_timeout")]
    pub timeout_secs: u64,
}

fn default_handoff_timeout() -> u64 {
    600
}

/// One polled product/satellite pair.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub id: String,
    pub family: ProductFamily,
    pub satellite: Satellite,
    /// Key into `archives`
    pub archive: String,
    /// Remote directory, with `{collection}`, `{product}`, `{year}`, `{doy}`,
    /// `{month}` and `{day}` placeholders
    pub path_template: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Archive product name; derived from family and satellite if omitted
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub hour_window: Option<HourWindow>,
    /// Restrict a SEVIRI stream to radiances or to products when both share
    /// a partition but live in different remote directories
    #[serde(default)]
    pub only: Option<KindFilter>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFilter {
    Radiance,
    Product,
}

impl KindFilter {
    pub fn matches(&self, kind: ProductKind) -> bool {
        let radiance = matches!(kind, ProductKind::SeviriRadiance { .. });
        match self {
            Self::Radiance => radiance,
            Self::Product => !radiance,
        }
    }
}

fn default_collection() -> String {
    "6".to_string()
}

fn default_poll_interval() -> u64 {
    300
}

fn default_enabled() -> bool {
    true
}

impl StreamConfig {
    /// Whether an entry of this kind belongs to the stream.
    pub fn accepts_kind(&self, kind: ProductKind) -> bool {
        self.only.map_or(true, |filter| filter.matches(kind))
    }

    pub fn product(&self) -> Option<String> {
        self.product
            .clone()
            .or_else(|| self.family.archive_product(self.satellite))
    }

    /// Remote directory for a given day.
    pub fn remote_path(&self, day: DayKey) -> String {
        let date = day.date();
        self.path_template
            .replace("{collection}", &self.collection)
            .replace("{product}", &self.product().unwrap_or_default())
            .replace("{year}", &day.year().to_string())
            .replace("{doy}", &format!("{:03}", day.doy()))
            .replace("{month}", &date.format("%m").to_string())
            .replace("{day}", &date.format("%d").to_string())
    }
}

impl PipelineConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PipelineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        debug!(path = %path.display(), streams = config.streams.len(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.tick_secs == 0 {
            bail!("schedule.tick_secs must be positive");
        }

        let mut seen = HashSet::new();
        for stream in &self.streams {
            if !seen.insert(stream.id.as_str()) {
                bail!("Duplicate stream id: {}", stream.id);
            }
            if !self.archives.contains_key(&stream.archive) {
                bail!("Stream {} references unknown archive {}", stream.id, stream.archive);
            }
            if stream.product().is_none() {
                bail!(
                    "Stream {}: {} is not served for satellite {}",
                    stream.id,
                    stream.family,
                    stream.satellite
                );
            }
            if stream.poll_interval_secs == 0 {
                bail!("Stream {}: poll_interval_secs must be positive", stream.id);
            }
            if stream.only.is_some() && stream.family != ProductFamily::Seviri {
                bail!("Stream {}: 'only' applies to seviri streams", stream.id);
            }
            if let Some(window) = stream.hour_window {
                if window.start > window.end || window.end > 23 {
                    bail!("Stream {}: invalid hour window {}-{}", stream.id, window.start, window.end);
                }
            }
        }
        Ok(())
    }

    /// Enabled streams, in file order.
    pub fn enabled_streams(&self) -> impl Iterator<Item = &StreamConfig> {
        self.streams.iter().filter(|s| {
            if !s.enabled {
                info!(stream = %s.id, "Skipping disabled stream");
            }
            s.enabled
        })
    }

    /// Every satellite with at least one enabled stream.
    pub fn satellites(&self) -> Vec<Satellite> {
        let mut sats: Vec<Satellite> = self.enabled_streams().map(|s| s.satellite).collect();
        sats.sort();
        sats.dedup();
        sats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
paths:
  file_root: /data/oracles_files
  image_root: /data/oracles

region:
  north: -4.5
  south: -25.5
  east: 15.5
  west: -15.5

schedule:
  tick_secs: 10
  daily_reset: "00:00"
  daily_composite: "22:00"

archives:
  lance:
    base_url: https://nrt3.modaps.eosdis.nasa.gov
    username_env: LANCE_USER
    password_env: LANCE_PASSWORD
  larc:
    base_url: http://cloudsgate2.larc.nasa.gov

streams:
  - id: terra-cloud
    family: modis_cloud
    satellite: terra
    archive: lance
    path_template: "/allData/{collection}/{product}/{year}/{doy}/"
    hour_window: { start: 8, end: 12 }
  - id: msg-products
    family: seviri
    satellite: msg
    archive: larc
    path_template: "/prod/exp/oracles/d2/prod-ncdf/msg/{year}/{month}/{day}/"
    hour_window: { start: 5, end: 19 }
    only: product
  - id: aqua-aerosol
    family: modis_aerosol
    satellite: aqua
    archive: lance
    path_template: "/allData/{collection}/{product}/{year}/{doy}/"
    enabled: false
"#;

    #[test]
    fn test_parse_pipeline_config() {
        let config: PipelineConfig = serde_yaml::from_str(YAML).unwrap();
        config.validate().unwrap();
        assert_eq!(config.streams.len(), 3);
        assert_eq!(config.schedule.daily_composite, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(config.archives["lance"].timeout_secs, 60);
        assert_eq!(config.streams[0].poll_interval_secs, 300);
        assert_eq!(config.enabled_streams().count(), 2);
        assert_eq!(config.satellites(), vec![Satellite::Terra, Satellite::Msg]);
    }

    #[test]
    fn test_remote_path_templates() {
        let config: PipelineConfig = serde_yaml::from_str(YAML).unwrap();
        let day = DayKey::new(2016, 9).unwrap();
        assert_eq!(
            config.streams[0].remote_path(day),
            "/allData/6/MOD06_L2/2016/009/"
        );
        assert_eq!(
            config.streams[1].remote_path(day),
            "/prod/exp/oracles/d2/prod-ncdf/msg/2016/01/09/"
        );
    }

    #[test]
    fn test_unknown_archive_rejected() {
        let yaml = YAML.replace("archive: larc", "archive: nowhere");
        let config: PipelineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_family_satellite_mismatch_rejected() {
        let yaml = YAML.replace("satellite: terra", "satellite: msg");
        let config: PipelineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kind_filter() {
        let config: PipelineConfig = serde_yaml::from_str(YAML).unwrap();
        let products = &config.streams[1];
        assert!(products.accepts_kind(ProductKind::SeviriCloud));
        assert!(!products.accepts_kind(ProductKind::SeviriRadiance { channel: 1 }));
        assert!(config.streams[0].accepts_kind(ProductKind::ModisCloud));

        let yaml = YAML.replace(
            "    hour_window: { start: 8, end: 12 }",
            "    hour_window: { start: 8, end: 12 }\n    only: radiance",
        );
        let config: PipelineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_time_rejected() {
        let yaml = YAML.replace("\"22:00\"", "\"ten pm\"");
        assert!(serde_yaml::from_str::<PipelineConfig>(&yaml).is_err());
    }

    #[test]
    fn test_half_configured_credentials() {
        let archive = ArchiveConfig {
            base_url: "http://example.com".to_string(),
            username_env: Some("ONLY_USER".to_string()),
            password_env: None,
            timeout_secs: 60,
        };
        assert!(archive.credentials().is_err());
    }
}
