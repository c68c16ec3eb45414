//! Contracts with the external execution and measure collaborators, and the
//! batch runner that drives pending data points through them.

mod progress;
mod runner;

pub use progress::RunProgress;
pub use runner::{RunOptions, RunSummary, resolve_workflow, run_data_points};

use std::path::PathBuf;

use crate::model::{
    Argument, Attribute, FileReference, JobType, MeasureDescriptor, MeasurePerturbation, ObjectId,
    VariableValue,
};
use crate::problem::Problem;

/// One step of a data point's concrete workflow: a measure with its final
/// argument values, or a fixed job. Null perturbations are dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedStep {
    Measure(MeasurePerturbation),
    Job(JobType),
}

/// Everything an executor needs to run one data point
#[derive(Debug, Clone)]
pub struct ExecutionRequest<'a> {
    pub problem: &'a Problem,
    pub point_id: ObjectId,
    pub values: Vec<Option<VariableValue>>,
    pub workflow: Vec<ResolvedStep>,
    pub seed: Option<&'a FileReference>,
    /// Directory reserved for this point's outputs; already created
    pub output_dir: PathBuf,
}

/// Terminal result reported by an executor
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success {
        files: Vec<FileReference>,
        attributes: Vec<Attribute>,
    },
    Failure {
        files: Vec<FileReference>,
        diagnostic: String,
    },
}

/// The simulation/translation engine, seen as an opaque job runner
///
/// Called concurrently from worker threads when the `parallel` feature is on.
pub trait Executor: Sync {
    fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionOutcome;
}

/// Source of current measure revisions
pub trait MeasureCatalog {
    /// Latest descriptor and argument declarations for a measure
    fn describe(&self, id: ObjectId) -> Option<(MeasureDescriptor, Vec<Argument>)>;
}
