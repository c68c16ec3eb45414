//! Batch execution of pending data points
//!
//! A run has three phases:
//! 1. Sequentially reserve each pending point: output directory and job
//!    handle. A point is submitted at most once per run.
//! 2. Execute the reserved points through the [`Executor`], in parallel when
//!    the `parallel` feature is enabled. Only immutable borrows are held.
//! 3. Sequentially apply exactly one terminal outcome to each submitted
//!    point on the calling thread.

use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{ExecutionOutcome, ExecutionRequest, Executor, ResolvedStep, RunProgress};
use crate::datapoint::{ABANDONED_TAG, DataPoint, DataPointState, JobHandle};
use crate::error::{AnalysisError, DataPointError};
use crate::model::{
    AnalysisObject, ArgumentValue, Attribute, FileReference, FileType, StepKind, Variable,
    VariableValue,
};
use crate::problem::Problem;

/// File name of the attribute report written next to each point's outputs
pub const ATTRIBUTE_REPORT_FILE: &str = "attributes.json";

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Each point runs in `output_root/<point id>`
    pub output_root: PathBuf,
    /// Cap on points submitted in this run
    pub max_points: Option<usize>,
}

impl RunOptions {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            max_points: None,
        }
    }
}

/// What happened to the points of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Outcome arrived after cancellation
    pub abandoned: usize,
    /// Reserved but never started because the run was cancelled
    pub skipped: usize,
}

/// The concrete workflow a data point runs: its selected measures (with the
/// continuous values applied) interleaved with the problem's jobs
pub fn resolve_workflow(
    problem: &Problem,
    values: &[Option<VariableValue>],
) -> Result<Vec<ResolvedStep>, DataPointError> {
    if values.len() != problem.num_variables() {
        return Err(DataPointError::ValueCountMismatch {
            expected: problem.num_variables(),
            found: values.len(),
        });
    }

    let mut resolved = Vec::new();
    let mut index = 0;
    for step in problem.workflow() {
        let variable = match step.kind() {
            StepKind::Job(job) => {
                resolved.push(ResolvedStep::Job(job.clone()));
                continue;
            }
            StepKind::Variable(v) => v,
        };
        let value = values[index];
        match variable {
            Variable::Discrete(v) => {
                let selected = match value {
                    Some(VariableValue::Index(i)) => v.perturbation(i),
                    None if v.num_perturbations(false) == 1 => v.perturbation(0),
                    _ => None,
                }
                .ok_or(DataPointError::InvalidValue { index })?;
                if let Some(m) = selected.as_measure() {
                    resolved.push(ResolvedStep::Measure(m.clone()));
                }
            }
            Variable::Continuous(v) => {
                let mut measure = v.measure_perturbation().clone();
                match value {
                    Some(VariableValue::Continuous(x)) => {
                        if !measure.set_argument(v.argument_name(), ArgumentValue::Double(x)) {
                            return Err(DataPointError::InvalidValue { index });
                        }
                    }
                    None => {}
                    Some(VariableValue::Index(_)) => {
                        return Err(DataPointError::InvalidValue { index });
                    }
                }
                resolved.push(ResolvedStep::Measure(measure));
            }
        }
        index += 1;
    }
    Ok(resolved)
}

/// Run every pending point of `problem` in `points`
///
/// Refused with [`AnalysisError::Cancelled`] if `progress` is already
/// cancelled. Cancelling later ends the run early with a summary.
pub fn run_data_points(
    problem: &Problem,
    seed: Option<&FileReference>,
    points: &mut [DataPoint],
    executor: &dyn Executor,
    options: &RunOptions,
    progress: Option<&RunProgress>,
) -> Result<RunSummary, AnalysisError> {
    let mut summary = RunSummary::default();
    let cancelled = || progress.is_some_and(RunProgress::is_cancelled);
    if cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    // Phase 1: reserve. On error every point reserved so far goes back to
    // Pending before the error is returned.
    let mut reserved: Vec<(usize, ExecutionRequest<'_>)> = Vec::new();
    let mut failure = None;
    for (i, point) in points.iter_mut().enumerate() {
        if options.max_points.is_some_and(|max| reserved.len() >= max) || cancelled() {
            break;
        }
        if point.problem_id() != problem.id() || point.state() != DataPointState::Pending {
            continue;
        }
        let workflow = match resolve_workflow(problem, point.variable_values()) {
            Ok(workflow) => workflow,
            Err(err) => {
                tracing::warn!(point = %point.id(), %err, "point cannot be resolved");
                // A pending point cannot conflict
                let _ = point.mark_failed();
                summary.failed += 1;
                continue;
            }
        };
        let output_dir = options.output_root.join(point.id().to_string());
        if let Err(err) = reserve(point, &output_dir) {
            failure = Some(err);
            break;
        }
        reserved.push((
            i,
            ExecutionRequest {
                problem,
                point_id: point.id(),
                values: point.variable_values().to_vec(),
                workflow,
                seed,
                output_dir,
            },
        ));
    }

    if let Some(err) = failure {
        tracing::error!(problem = %problem.name(), %err, "run aborted while reserving points");
        for (i, _) in &reserved {
            points[*i].clear_top_level_job();
        }
        return Err(err);
    }

    summary.submitted = reserved.len();
    if let Some(progress) = progress {
        progress.reset(reserved.len());
    }
    tracing::info!(problem = %problem.name(), points = reserved.len(), "run started");

    // Phase 2: execute. Each result is (outcome, cancelled when it arrived).
    let execute = |request: &ExecutionRequest<'_>| -> Option<(ExecutionOutcome, bool)> {
        if cancelled() {
            return None;
        }
        let outcome = executor.execute(request);
        if let Some(progress) = progress {
            progress.increment();
        }
        Some((outcome, cancelled()))
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<Option<(ExecutionOutcome, bool)>> =
        reserved.par_iter().map(|(_, request)| execute(request)).collect();

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Option<(ExecutionOutcome, bool)>> =
        reserved.iter().map(|(_, request)| execute(request)).collect();

    // Phase 3: apply
    for ((i, request), outcome) in reserved.into_iter().zip(outcomes) {
        let point = &mut points[i];
        let Some((outcome, abandoned)) = outcome else {
            point.clear_top_level_job();
            summary.skipped += 1;
            continue;
        };
        match outcome {
            ExecutionOutcome::Success { files, attributes } if !abandoned => {
                record_files(point, files);
                if let Some(report) = write_attribute_report(&request.output_dir, &attributes) {
                    point.set_file(report);
                }
                point.set_output_attributes(attributes);
                point.mark_complete()?;
                let responses: Option<Vec<f64>> = problem
                    .responses()
                    .iter()
                    .map(|f| f.get_value(point, problem))
                    .collect();
                match responses {
                    Some(values) => {
                        point.set_response_values(problem, values)?;
                        summary.succeeded += 1;
                    }
                    None => {
                        tracing::warn!(point = %point.id(), "response could not be evaluated");
                        // Success was just recorded, so this reports the conflict
                        let _ = point.mark_failed();
                        summary.failed += 1;
                    }
                }
            }
            ExecutionOutcome::Success { files, .. } => {
                record_files(point, files);
                abandon(point);
                summary.abandoned += 1;
            }
            ExecutionOutcome::Failure { files, diagnostic } => {
                record_files(point, files);
                if abandoned {
                    abandon(point);
                    summary.abandoned += 1;
                } else {
                    tracing::warn!(point = %point.id(), %diagnostic, "point failed");
                    point.mark_failed()?;
                    summary.failed += 1;
                }
            }
        }
    }

    tracing::info!(
        problem = %problem.name(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        abandoned = summary.abandoned,
        skipped = summary.skipped,
        "run finished"
    );
    Ok(summary)
}

fn reserve(point: &mut DataPoint, output_dir: &Path) -> Result<(), AnalysisError> {
    std::fs::create_dir_all(output_dir).map_err(|e| AnalysisError::Io {
        path: output_dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    point.set_top_level_job(JobHandle::start())?;
    point.set_directory(output_dir);
    Ok(())
}

fn record_files(point: &mut DataPoint, files: Vec<FileReference>) {
    for file in files {
        point.set_file(file);
    }
}

fn abandon(point: &mut DataPoint) {
    tracing::warn!(point = %point.id(), "outcome arrived after cancellation");
    // A pending point cannot conflict
    let _ = point.mark_failed();
    point.add_tag(ABANDONED_TAG);
}

fn write_attribute_report(dir: &Path, attributes: &[Attribute]) -> Option<FileReference> {
    let path = dir.join(ATTRIBUTE_REPORT_FILE);
    let json = match serde_json::to_string_pretty(attributes) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(%err, "attributes could not be serialized");
            return None;
        }
    };
    if let Err(err) = std::fs::write(&path, json) {
        tracing::warn!(path = %path.display(), %err, "attribute report not written");
        return None;
    }
    Some(FileReference::new(path, FileType::Report))
}
