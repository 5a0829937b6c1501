//! Core types and configuration for dockmatrix.
//!
//! This crate defines the fixed build-matrix axes ([`Release`],
//! [`MpiImplementation`], [`TargetCpu`], [`TargetGpu`], [`Variant`]), the
//! per-axis [`Filter`]s a caller selects with, the `dockmatrix.toml` schema
//! ([`MatrixConfig`]), and shared error types.

pub mod axis;
pub mod config;
pub mod error;

pub use axis::{
    Combination, Filter, MpiImplementation, Release, ReleaseProfile, Selection, TargetCpu,
    TargetGpu, Variant, parse_ncores,
};
pub use config::{BuildConfig, ImageConfig, MatrixConfig, SpackConfig};
pub use error::{Error, Result};
