//! Fixed-tick job scheduler.
//!
//! Jobs are checked on every tick and run to completion one at a time, in
//! registration order, so no job ever overlaps another or itself.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use swath_common::{DayKey, Satellite};
use swath_ingest::PartitionLayout;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::cycle::{CycleError, CycleReport, PollCycle, Stream};
use crate::daily;
use crate::handoff::{ProductRequest, ProductSink};

/// When a job comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Again this long after the tick it last ran on.
    Every(Duration),
    /// Once a day at this UTC time.
    DailyAt(NaiveTime),
}

impl Cadence {
    /// First due time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Every(interval) => {
                now + ChronoDuration::seconds(interval.as_secs().max(1) as i64)
            }
            Self::DailyAt(time) => {
                let today = now.date_naive().and_time(*time).and_utc();
                if today > now {
                    today
                } else {
                    today + ChronoDuration::days(1)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    DailyReset,
    Poll(usize),
    DailyComposite,
}

#[derive(Debug, Clone)]
struct Job {
    name: String,
    cadence: Cadence,
    kind: JobKind,
    next_due: DateTime<Utc>,
}

/// Owns the streams and runs their cycles plus the daily jobs.
pub struct Scheduler {
    streams: Vec<Stream>,
    layout: PartitionLayout,
    satellites: Vec<Satellite>,
    sink: Arc<dyn ProductSink>,
    tick: Duration,
    jobs: Vec<Job>,
}

impl Scheduler {
    /// Register the daily reset, one poll job per stream, and the composite
    /// trigger.
    ///
    /// The reset and every poll are due immediately, so a fresh start creates
    /// today's partitions and polls once before settling into the cadence.
    pub fn new(
        streams: Vec<Stream>,
        layout: PartitionLayout,
        sink: Arc<dyn ProductSink>,
        schedule: &ScheduleConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let mut satellites: Vec<Satellite> = streams.iter().map(|s| s.config.satellite).collect();
        satellites.sort();
        satellites.dedup();

        let mut jobs = vec![Job {
            name: "daily_reset".to_string(),
            cadence: Cadence::DailyAt(schedule.daily_reset),
            kind: JobKind::DailyReset,
            next_due: now,
        }];
        for (idx, stream) in streams.iter().enumerate() {
            jobs.push(Job {
                name: stream.id().to_string(),
                cadence: Cadence::Every(Duration::from_secs(stream.config.poll_interval_secs)),
                kind: JobKind::Poll(idx),
                next_due: now,
            });
        }
        let composite = Cadence::DailyAt(schedule.daily_composite);
        jobs.push(Job {
            name: "daily_composite".to_string(),
            cadence: composite,
            kind: JobKind::DailyComposite,
            next_due: composite.next_after(now),
        });

        for job in &jobs {
            debug!(job = %job.name, cadence = ?job.cadence, next_due = %job.next_due, "Registered job");
        }

        Self {
            streams,
            layout,
            satellites,
            sink,
            tick: Duration::from_secs(schedule.tick_secs),
            jobs,
        }
    }

    /// Run every job due at `now`. Returns the names of the jobs that ran.
    pub async fn run_pending(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut ran = Vec::new();
        for idx in 0..self.jobs.len() {
            if self.jobs[idx].next_due > now {
                continue;
            }
            let kind = self.jobs[idx].kind;
            info!(job = %self.jobs[idx].name, "Running scheduled job");
            self.execute(kind, now).await;

            let job = &mut self.jobs[idx];
            job.next_due = job.cadence.next_after(now);
            debug!(job = %job.name, next_due = %job.next_due, "Rescheduled");
            ran.push(job.name.clone());
        }
        ran
    }

    async fn execute(&self, kind: JobKind, now: DateTime<Utc>) {
        let day = DayKey::today(now);
        match kind {
            JobKind::DailyReset => self.reset(day),
            JobKind::Poll(idx) => {
                if let Some(stream) = self.streams.get(idx) {
                    if let Err(e) = self.poll(stream, day).await {
                        debug!(stream = %stream.id(), error = %e, "Poll retried at next interval");
                    }
                }
            }
            JobKind::DailyComposite => self.composite(day).await,
        }
    }

    fn reset(&self, day: DayKey) {
        if let Err(e) = daily::reset_partitions(&self.layout, &self.satellites, day) {
            error!(day = %day, error = %e, "Daily reset failed");
        }
    }

    async fn poll(&self, stream: &Stream, day: DayKey) -> Result<CycleReport, CycleError> {
        PollCycle::new(stream, &self.layout, self.sink.as_ref())
            .run(day)
            .await
    }

    async fn composite(&self, day: DayKey) {
        for &satellite in &self.satellites {
            if satellite.modis_prefix().is_none() {
                continue;
            }
            match daily::composite_request(&self.layout, satellite, day) {
                Ok(Some(request)) => {
                    let swaths = request.swaths.len();
                    match self.sink.submit(&ProductRequest::Composite(request)).await {
                        Ok(()) => {
                            info!(satellite = %satellite, day = %day, swaths, "Composite requested")
                        }
                        Err(e) => {
                            warn!(satellite = %satellite, day = %day, error = %e, "Composite hand-off failed")
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(satellite = %satellite, day = %day, error = %e, "Composite scan failed")
                }
            }
        }
    }

    /// One reset plus one cycle per selected stream, then return.
    pub async fn run_once(
        &self,
        stream_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<CycleReport>> {
        let day = DayKey::today(now);
        self.reset(day);

        let selected: Vec<&Stream> = match stream_id {
            Some(id) => match self.streams.iter().find(|s| s.id() == id) {
                Some(stream) => vec![stream],
                None => bail!("Unknown or disabled stream: {}", id),
            },
            None => self.streams.iter().collect(),
        };

        let mut reports = Vec::with_capacity(selected.len());
        for stream in selected {
            match self.poll(stream, day).await {
                Ok(report) => reports.push(report),
                Err(e) => error!(stream = %stream.id(), error = %e, "Single run cycle failed"),
            }
        }
        Ok(reports)
    }

    /// Run continuously until a shutdown signal arrives.
    pub async fn run_forever(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        loop {
            self.run_pending(Utc::now()).await;

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(self.tick) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 9, 9, h, m, 0).unwrap()
    }

    #[test]
    fn test_every_cadence() {
        let cadence = Cadence::Every(Duration::from_secs(300));
        assert_eq!(cadence.next_after(at(10, 0)), at(10, 5));
    }

    #[test]
    fn test_daily_cadence_later_today() {
        let cadence = Cadence::DailyAt(NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(cadence.next_after(at(13, 0)), at(22, 0));
    }

    #[test]
    fn test_daily_cadence_rolls_to_tomorrow() {
        let cadence = Cadence::DailyAt(NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        let next = cadence.next_after(at(22, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2016, 9, 10, 22, 0, 0).unwrap());
    }

    #[test]
    fn test_midnight_reset() {
        let cadence = Cadence::DailyAt(NaiveTime::MIN);
        let next = cadence.next_after(at(0, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2016, 9, 10, 0, 0, 0).unwrap());
    }
}
