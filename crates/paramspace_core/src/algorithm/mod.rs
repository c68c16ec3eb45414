//! Data point generation
//!
//! An [`Algorithm`] expands a problem into new pending [`DataPoint`]s, one
//! pass ("iteration") at a time. Every algorithm enumerates a grid of
//! candidate values per variable and skips assignments that are already
//! known for the problem, so existing points are never duplicated or
//! touched.

mod design_of_experiments;
mod grid;
mod sampling;

pub use design_of_experiments::{
    DesignOfExperiments, DesignOfExperimentsKind, DesignOfExperimentsOptions,
};
pub use grid::GridIndices;
pub use sampling::{Sampling, SamplingOptions};

use serde::{Deserialize, Serialize};

use crate::datapoint::DataPoint;
use crate::error::AnalysisError;
use crate::model::{AnalysisObject, ObjectMeta, VariableValue};
use crate::problem::Problem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Algorithm {
    DesignOfExperiments(DesignOfExperiments),
    Sampling(Sampling),
}

impl Algorithm {
    /// Generate the next batch of points not already in `existing`
    pub fn create_next_iteration(
        &mut self,
        problem: &Problem,
        existing: &[DataPoint],
    ) -> Result<Vec<DataPoint>, AnalysisError> {
        match self {
            Algorithm::DesignOfExperiments(a) => a.create_next_iteration(problem, existing),
            Algorithm::Sampling(a) => a.create_next_iteration(problem, existing),
        }
    }

    /// Number of generation passes run so far
    pub fn iteration(&self) -> usize {
        match self {
            Algorithm::DesignOfExperiments(a) => a.iteration(),
            Algorithm::Sampling(a) => a.iteration(),
        }
    }

    /// True once a pass found nothing left to generate
    pub fn is_complete(&self) -> bool {
        match self {
            Algorithm::DesignOfExperiments(a) => a.is_complete(),
            Algorithm::Sampling(a) => a.is_complete(),
        }
    }

    /// Forget progress so generation starts over
    pub fn reset(&mut self) {
        match self {
            Algorithm::DesignOfExperiments(a) => a.reset(),
            Algorithm::Sampling(a) => a.reset(),
        }
    }
}

impl AnalysisObject for Algorithm {
    fn meta(&self) -> &ObjectMeta {
        match self {
            Algorithm::DesignOfExperiments(a) => a.meta(),
            Algorithm::Sampling(a) => a.meta(),
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Algorithm::DesignOfExperiments(a) => a.meta_mut(),
            Algorithm::Sampling(a) => a.meta_mut(),
        }
    }
}

impl From<DesignOfExperiments> for Algorithm {
    fn from(a: DesignOfExperiments) -> Self {
        Algorithm::DesignOfExperiments(a)
    }
}

impl From<Sampling> for Algorithm {
    fn from(a: Sampling) -> Self {
        Algorithm::Sampling(a)
    }
}

/// Result of walking a candidate grid
struct Enumeration {
    points: Vec<DataPoint>,
    /// False if `max_points` cut the walk short
    exhausted: bool,
}

/// Walk the cartesian product of `axes` (one candidate list per variable)
/// and build a point for every assignment not already known
fn enumerate(
    problem: &Problem,
    existing: &[DataPoint],
    axes: &[Vec<Option<VariableValue>>],
    max_points: Option<usize>,
) -> Result<Enumeration, AnalysisError> {
    let shape: Vec<usize> = axes.iter().map(Vec::len).collect();
    let mut points = Vec::new();
    let mut skipped = 0usize;

    for indices in GridIndices::new(shape) {
        if max_points.is_some_and(|max| points.len() >= max) {
            return Ok(Enumeration {
                points,
                exhausted: false,
            });
        }
        let values: Vec<Option<VariableValue>> = indices
            .iter()
            .zip(axes)
            .map(|(&i, axis)| axis[i])
            .collect();
        if is_known(problem, existing, &values) {
            skipped += 1;
            continue;
        }
        points.push(DataPoint::new(problem, values)?);
    }

    tracing::debug!(
        problem = %problem.name(),
        generated = points.len(),
        skipped,
        "grid enumerated"
    );
    Ok(Enumeration {
        points,
        exhausted: true,
    })
}

/// Whether an existing point of this problem has an equivalent assignment
fn is_known(problem: &Problem, existing: &[DataPoint], values: &[Option<VariableValue>]) -> bool {
    let variables = problem.variables();
    existing
        .iter()
        .filter(|p| p.problem_id() == problem.id())
        .filter(|p| p.variable_values().len() == values.len())
        .any(|p| {
            variables
                .iter()
                .zip(p.variable_values().iter().zip(values))
                .all(|(v, (a, b))| v.values_equivalent(a.as_ref(), b.as_ref()))
        })
}
