//! Music tidying library - shared modules for all binaries.

pub mod albums;
pub mod config;
pub mod converge;
pub mod error;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod processor;
pub mod progress;
pub mod report;
pub mod resolve;
pub mod safety;
pub mod scan;
pub mod tags;
