//! splat-forge: image to Gaussian-splat conversion with background jobs
//!
//! Uploaded images are turned into `.ply` point clouds by an external
//! reconstruction tool, one job at a time. Finished models can be re-encoded
//! into the compact, importance-ordered `.splat` format for export.

pub mod codec;
pub mod config;
pub mod converter;
pub mod error;
pub mod export;
pub mod gallery;
pub mod processing;
pub mod service;

pub use codec::{decode, encode, SplatPoint, SplatRecord};
pub use config::SplatForgeConfig;
pub use converter::{Converter, SharpConverter};
pub use error::{Error, Result};
pub use gallery::ModelEntry;
pub use processing::{Job, JobListing, JobQueue, JobStatus, JobStore};
pub use service::SplatService;
