//! Dockerfile rendering and build-matrix expansion for dockmatrix.
//!
//! # Generation pipeline
//!
//! ```text
//! dockmatrix [--check]
//!   1. Enumerate ── release → MPI → CPU → version (CPU track)
//!                   release → MPI → CPU → GPU    (GPU track, reports only)
//!   2. Patch plan ── ordered sed rules for the Spack manifest
//!   3. Render     ── DockerfileGenerator::render()
//!   4. Output     ── OutputFile::finish(Write | Check)
//! ```
//!
//! # Patch order
//!
//! The OpenMPI rules toggle `#` markers in the Spack manifest, so
//! [`patch::PatchPlan`] keeps them in a fixed sequence: provider swap,
//! hwloc injection (2025.2 only), comment out MPICH, uncomment OpenMPI.

pub mod dockerfile;
pub mod matrix;
pub mod output;
pub mod patch;

pub use dockerfile::{DockerfileGenerator, RenderOptions};
pub use matrix::{MatrixError, MatrixGenerator, Report, Step};
pub use output::{Mode, Outcome, OutputFile};
pub use patch::{PatchPlan, SedRule};
