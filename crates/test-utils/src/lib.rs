//! Shared test utilities for the swath pipeline workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Filename builders for every naming convention
//! - Sidecar text and file-signature payloads
//! - A temporary file/image partition tree
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, TestTree};
//! ```

pub mod fixtures;
pub mod tree;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use tree::TestTree;
