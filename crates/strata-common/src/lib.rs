//! # strata-common
//!
//! Shared utilities and types for the Strata volume manager.
//!
//! This crate provides common functionality used across all Strata crates:
//! - Volume size parsing
//! - Standard filesystem paths
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod paths;
pub mod size;

pub use error::{StrataError, StrataResult};
pub use paths::StrataPaths;
pub use size::VolumeSize;
