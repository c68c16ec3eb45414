//! Parametric analysis engine
//!
//! This crate defines a design space and expands it into concrete runs:
//! - A [`Problem`] is an ordered workflow of variables and fixed jobs whose
//!   file types must line up from the seed to the final output
//! - Discrete variables hold mutually exclusive perturbations (measures or
//!   the null perturbation); continuous variables hold a sampled range
//! - Generation algorithms expand the problem into [`DataPoint`]s, each one
//!   concrete assignment with its own lifecycle and cached results
//! - Every entity carries a stable id, a version stamp and a dirty flag, and
//!   changes propagate explicitly up the ownership tree
//!
//! # Example
//!
//! ```ignore
//! use paramspace_core::{Analysis, DesignOfExperiments, ProblemBuilder};
//! use paramspace_core::model::{FileType, JobType, Perturbation, Variable};
//!
//! let walls = Variable::discrete("Walls", vec![Perturbation::null(), insulate]);
//! let problem = ProblemBuilder::new("Envelope study")
//!     .seed_type(FileType::Model)
//!     .variable(walls)
//!     .job(JobType::Translate)
//!     .job(JobType::Simulate)
//!     .build()?;
//!
//! let mut analysis = Analysis::new("Envelope", problem, Some(seed));
//! analysis.set_algorithm(Some(DesignOfExperiments::full_factorial().into()));
//! analysis.generate()?;
//! analysis.run(&executor, &RunOptions::new("runs"), None)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod algorithm;
pub mod analysis;
pub mod datapoint;
pub mod error;
pub mod execution;
pub mod problem;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use algorithm::{Algorithm, DesignOfExperiments, DesignOfExperimentsOptions, Sampling};
pub use analysis::Analysis;
pub use datapoint::{DataPoint, DataPointState, JobHandle};
pub use error::{AnalysisError, ArgumentError, CompatibilityError, DataPointError, ProblemError};
pub use execution::{
    ExecutionOutcome, ExecutionRequest, Executor, MeasureCatalog, RunOptions, RunProgress,
    RunSummary,
};
pub use problem::{IssueKind, Problem, ProblemBuilder, ValidationIssue, VariableMut};
