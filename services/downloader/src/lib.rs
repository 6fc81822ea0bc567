//! Swath acquisition service library.
//!
//! Polls the near-real-time archives for each configured stream, downloads
//! in-region swaths into day partitions and hands them to the plotting
//! collaborator until every expected image exists.

pub mod archive;
pub mod config;
pub mod cycle;
pub mod daily;
pub mod fetch;
pub mod handoff;
pub mod scheduler;
