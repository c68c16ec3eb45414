//! Integration tests for the parametric analysis engine
//!
//! Tests are organized by topic:
//! - `problem` - Chain construction and file-type compatibility
//! - `design_of_experiments` - Full-factorial generation and point matching
//! - `propagation` - Versioning, dirty flags and result invalidation
//! - `datapoint_lifecycle` - Terminal outcomes and response values
//! - `update_measure` - Reconciling perturbations with revised measures
//! - `persistence` - Serialization and reconstruction from parts
//! - `execution` - Batch runs against scripted executors

mod problem;
mod support;
