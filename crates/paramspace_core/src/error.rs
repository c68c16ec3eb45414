use std::path::PathBuf;

use crate::model::{ArgumentType, FileType, ObjectId};

/// Structural errors raised when a problem is built or edited into an
/// inconsistent chain. The problem is left in its prior state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProblemError {
    #[error(
        "step {step} ({name}) expects {expected} input but the chain provides {found}"
    )]
    IncompatibleFileTypes {
        step: usize,
        name: String,
        expected: FileType,
        found: FileType,
    },
    #[error("chain ends with {found} but the problem requires {expected}")]
    IncompatibleFinalType { expected: FileType, found: FileType },
    #[error("variable {name} mixes perturbations with different file types")]
    InconsistentVariable { name: String },
    #[error("variable {0} not found in problem")]
    VariableNotFound(ObjectId),
    #[error("variable {0} is not continuous")]
    NotContinuous(ObjectId),
    #[error("variable {variable} is used by response {function}")]
    VariableInUse { variable: ObjectId, function: String },
    #[error("step {0} not found in problem")]
    StepNotFound(ObjectId),
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0} is already part of this problem")]
    DuplicateObject(ObjectId),
    #[error(
        "a linear function needs no coefficients or one per term ({terms} terms, {coefficients} coefficients)"
    )]
    InvalidCoefficients { terms: usize, coefficients: usize },
}

/// Why a candidate perturbation cannot be placed at a step
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompatibilityError {
    #[error("step {0} is not part of this problem")]
    NotInProblem(ObjectId),
    #[error("step {step} ({name}) receives {upstream} but the candidate reads {input}")]
    UpstreamMismatch {
        step: usize,
        name: String,
        upstream: FileType,
        input: FileType,
    },
    #[error("step {step} ({name}) must feed {downstream} but the candidate writes {output}")]
    DownstreamMismatch {
        step: usize,
        name: String,
        downstream: FileType,
        output: FileType,
    },
    #[error(
        "step {step} ({name}) already transforms {existing_input} to {existing_output}, candidate is {input} to {output}"
    )]
    SiblingMismatch {
        step: usize,
        name: String,
        existing_input: FileType,
        existing_output: FileType,
        input: FileType,
        output: FileType,
    },
    #[error(
        "step {step} ({name}) has a null perturbation, so the candidate cannot change {input} to {output}"
    )]
    ChangesTypeBesideNull {
        step: usize,
        name: String,
        input: FileType,
        output: FileType,
    },
}

/// Errors from typed measure arguments
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument {name} is {expected:?}, got {found:?}")]
    TypeMismatch {
        name: String,
        expected: ArgumentType,
        found: ArgumentType,
    },
    #[error("'{value}' is not a valid value for argument {name}")]
    InvalidValue { name: String, value: String },
    #[error("argument {0} has no value")]
    NoValue(String),
    #[error("no argument named {0}")]
    NotFound(String),
}

/// Errors from the data point lifecycle
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataPointError {
    #[error("data point {0} was already marked with a conflicting outcome")]
    ConflictingOutcome(ObjectId),
    #[error("data point {0} is already complete")]
    AlreadyComplete(ObjectId),
    #[error("response values require a data point that completed successfully")]
    ResponsesBeforeCompletion,
    #[error("expected {expected} response values, got {found}")]
    ResponseCountMismatch { expected: usize, found: usize },
    #[error("expected {expected} variable values, got {found}")]
    ValueCountMismatch { expected: usize, found: usize },
    #[error("value for variable {index} is not valid")]
    InvalidValue { index: usize },
    #[error("data point belongs to problem {found}, not {expected}")]
    WrongProblem { expected: ObjectId, found: ObjectId },
    #[error("no {0} file recorded for this data point")]
    NoFileReference(&'static str),
    #[error("file {} is missing", .path.display())]
    MissingResource { path: PathBuf },
    #[error("could not parse {}: {reason}", .path.display())]
    UnreadableResource { path: PathBuf, reason: String },
}

/// Errors from analysis-level operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    DataPoint(#[from] DataPointError),
    #[error("variable {name} cannot be sampled: {reason}")]
    NotSampleable { name: String, reason: &'static str },
    #[error("the problem changed since these results were produced; clear results first")]
    ResultsInvalidated,
    #[error("data point {0} not found")]
    DataPointNotFound(ObjectId),
    #[error("no algorithm configured")]
    NoAlgorithm,
    #[error("run cancelled")]
    Cancelled,
    #[error("could not prepare {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
}
