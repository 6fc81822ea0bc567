//! Calendar helpers: Julian-day partitions and swath acquisition times.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// A UTC calendar day addressed by year and 1-based day of year.
///
/// This is the partition key for local storage. Every value holds a real
/// date; deserialization goes through [`DayKey::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "DayKeyFields", into = "DayKeyFields")]
pub struct DayKey {
    date: NaiveDate,
}

/// Wire form of [`DayKey`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DayKeyFields {
    year: i32,
    doy: u32,
}

impl TryFrom<DayKeyFields> for DayKey {
    type Error = CommonError;

    fn try_from(fields: DayKeyFields) -> CommonResult<Self> {
        Self::new(fields.year, fields.doy)
    }
}

impl From<DayKey> for DayKeyFields {
    fn from(day: DayKey) -> Self {
        Self {
            year: day.year(),
            doy: day.doy(),
        }
    }
}

impl DayKey {
    pub fn new(year: i32, doy: u32) -> CommonResult<Self> {
        NaiveDate::from_yo_opt(year, doy)
            .map(Self::from_date)
            .ok_or(CommonError::InvalidDayOfYear { year, doy })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { date }
    }

    /// The UTC day containing `now`.
    pub fn today(now: DateTime<Utc>) -> Self {
        Self::from_date(now.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Day of year, starting at 1.
    pub fn doy(&self) -> u32 {
        self.date.ordinal()
    }

    /// Partition directory name (the bare day number).
    pub fn dir_name(&self) -> String {
        self.doy().to_string()
    }

    /// `YYYY_MM_DD`, the prefix shared by every image artifact of the day.
    pub fn artifact_prefix(&self) -> String {
        self.date.format("%Y_%m_%d").to_string()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day_of_month(&self) -> u32 {
        self.date.day()
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:03}", self.year(), self.doy())
    }
}

/// Start time of a swath, as encoded in its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcquisitionTime {
    pub day: DayKey,
    pub hour: u32,
    pub minute: u32,
}

impl AcquisitionTime {
    pub fn new(day: DayKey, hour: u32, minute: u32) -> CommonResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(CommonError::InvalidTime(format!("{:02}{:02}", hour, minute)));
        }
        Ok(Self { day, hour, minute })
    }

    /// Parse the `YYYY`, `DDD` and `HHMM` fields cut from a filename.
    pub fn from_fields(year: &str, doy: &str, hhmm: &str) -> CommonResult<Self> {
        let bad_time = || CommonError::InvalidTime(format!("{}{} {}", year, doy, hhmm));
        if !is_digits(year, 4) || !is_digits(doy, 3) || !is_digits(hhmm, 4) {
            return Err(bad_time());
        }
        let year: i32 = year.parse().map_err(|_| bad_time())?;
        let doy: u32 = doy.parse().map_err(|_| bad_time())?;
        let hour: u32 = hhmm[0..2].parse().map_err(|_| bad_time())?;
        let minute: u32 = hhmm[2..4].parse().map_err(|_| bad_time())?;
        Self::new(DayKey::new(year, doy)?, hour, minute)
    }

    /// `HHMM`, as used in artifact names.
    pub fn hhmm(&self) -> String {
        format!("{:02}{:02}", self.hour, self.minute)
    }
}

/// Inclusive range of acquisition hours a stream cares about.
///
/// Swaths outside the window never cross the study region for that platform,
/// so they are neither downloaded nor reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start <= hour && hour <= self.end
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_key_from_ordinal() {
        let day = DayKey::new(2016, 253).unwrap();
        assert_eq!(day.date(), NaiveDate::from_ymd_opt(2016, 9, 9).unwrap());
        assert_eq!(day.artifact_prefix(), "2016_09_09");
        assert_eq!(day.dir_name(), "253");
    }

    #[test]
    fn test_leap_day_bounds() {
        assert!(DayKey::new(2016, 366).is_ok());
        assert!(DayKey::new(2015, 366).is_err());
        assert!(DayKey::new(2016, 0).is_err());
    }

    #[test]
    fn test_day_key_deserialize_checks_ordinal() {
        let day: DayKey = serde_yaml::from_str("year: 2016\ndoy: 366\n").unwrap();
        assert_eq!(day.date(), NaiveDate::from_ymd_opt(2016, 12, 31).unwrap());
        assert!(serde_yaml::from_str::<DayKey>("year: 2015\ndoy: 366\n").is_err());
        assert!(serde_yaml::from_str::<DayKey>("year: 2016\ndoy: 0\n").is_err());

        let text = serde_yaml::to_string(&DayKey::new(2016, 253).unwrap()).unwrap();
        assert!(text.contains("doy: 253"));
    }

    #[test]
    fn test_today() {
        let now = Utc.with_ymd_and_hms(2016, 9, 1, 23, 59, 0).unwrap();
        assert_eq!(DayKey::today(now), DayKey::new(2016, 245).unwrap());
    }

    #[test]
    fn test_hour_window_inclusive() {
        let window = HourWindow::new(8, 12);
        assert!(window.contains(8));
        assert!(window.contains(12));
        assert!(!window.contains(7));
        assert!(!window.contains(13));
    }

    #[test]
    fn test_acquisition_fields() {
        let t = AcquisitionTime::from_fields("2016", "253", "1045").unwrap();
        assert_eq!(t.hour, 10);
        assert_eq!(t.minute, 45);
        assert_eq!(t.hhmm(), "1045");
        assert!(AcquisitionTime::from_fields("2016", "253", "2460").is_err());
        assert!(AcquisitionTime::from_fields("2016", "25x", "1045").is_err());
    }
}
