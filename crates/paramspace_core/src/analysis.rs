//! An analysis: a problem, a seed file, a generation algorithm and the data
//! points known so far.
//!
//! The analysis owns everything it references. Edits to the problem go
//! through [`Analysis::edit_problem`] so that a change which invalidates
//! results is noticed before any stale result is used.

use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::datapoint::{DataPoint, DataPointState};
use crate::error::{AnalysisError, ProblemError};
use crate::execution::{
    Executor, MeasureCatalog, RunOptions, RunProgress, RunSummary, run_data_points,
};
use crate::model::{AnalysisObject, ChangeType, FileReference, ObjectId, ObjectMeta, VariableValue};
use crate::problem::Problem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    meta: ObjectMeta,
    problem: Problem,
    #[serde(default)]
    seed: Option<FileReference>,
    #[serde(default)]
    algorithm: Option<Algorithm>,
    #[serde(default)]
    data_points: Vec<DataPoint>,
    /// Set when the problem changed in a way that makes existing results
    /// stale; cleared by [`clear_all_results`](Analysis::clear_all_results)
    #[serde(default)]
    data_points_are_invalid: bool,
}

impl Analysis {
    pub fn new(name: impl Into<String>, problem: Problem, seed: Option<FileReference>) -> Self {
        let mut analysis = Self {
            meta: ObjectMeta::new(name),
            problem,
            seed,
            algorithm: None,
            data_points: Vec::new(),
            data_points_are_invalid: false,
        };
        analysis.adopt_children();
        analysis
    }

    pub fn from_parts(
        meta: ObjectMeta,
        problem: Problem,
        seed: Option<FileReference>,
        algorithm: Option<Algorithm>,
        data_points: Vec<DataPoint>,
        data_points_are_invalid: bool,
    ) -> Self {
        let mut analysis = Self {
            meta,
            problem,
            seed,
            algorithm,
            data_points,
            data_points_are_invalid,
        };
        analysis.adopt_children();
        analysis
    }

    /// Re-establish parent ids throughout the owned tree
    pub fn adopt_children(&mut self) {
        let id = self.meta.id();
        self.problem.meta_mut().set_parent(id);
        self.problem.adopt_children();
        if let Some(algorithm) = &mut self.algorithm {
            algorithm.meta_mut().set_parent(id);
        }
        for point in &mut self.data_points {
            point.meta_mut().set_parent(id);
        }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn seed(&self) -> Option<&FileReference> {
        self.seed.as_ref()
    }

    pub fn algorithm(&self) -> Option<&Algorithm> {
        self.algorithm.as_ref()
    }

    pub fn data_points(&self) -> &[DataPoint] {
        &self.data_points
    }

    pub fn data_points_are_invalid(&self) -> bool {
        self.data_points_are_invalid
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Edit the problem. If the edit invalidates results and any point has
    /// started or finished, the existing results are flagged as stale.
    pub fn edit_problem<R>(&mut self, edit: impl FnOnce(&mut Problem) -> R) -> R {
        let result = edit(&mut self.problem);
        if let Some(change) = self.meta.absorb(self.problem.meta_mut()) {
            let has_results = self
                .data_points
                .iter()
                .any(|p| p.state() != DataPointState::Pending);
            if change == ChangeType::InvalidatesResults && has_results {
                tracing::warn!(analysis = %self.meta.name(), "problem changed, results are stale");
                self.data_points_are_invalid = true;
            }
        }
        result
    }

    pub fn set_seed(&mut self, seed: Option<FileReference>) -> Result<(), AnalysisError> {
        if let (Some(expected), Some(seed)) = (self.problem.seed_file_type(), &seed)
            && seed.file_type != expected
        {
            return Err(ProblemError::IncompatibleFileTypes {
                step: 0,
                name: "seed".to_string(),
                expected,
                found: seed.file_type,
            }
            .into());
        }
        self.seed = seed;
        if self.data_points.iter().any(|p| p.state() != DataPointState::Pending) {
            self.data_points_are_invalid = true;
        }
        self.meta.on_change(ChangeType::InvalidatesResults);
        Ok(())
    }

    pub fn set_algorithm(&mut self, algorithm: Option<Algorithm>) {
        self.algorithm = algorithm.map(|mut a| {
            a.meta_mut().set_parent(self.meta.id());
            a
        });
        self.meta.on_change(ChangeType::Benign);
    }

    /// Replace every point with a pending copy and clear the stale flag
    pub fn clear_all_results(&mut self) {
        self.data_points = self.data_points.iter().map(DataPoint::cleared).collect();
        self.data_points_are_invalid = false;
        self.meta.on_change(ChangeType::Benign);
    }

    pub fn remove_all_data_points(&mut self) {
        self.data_points.clear();
        self.data_points_are_invalid = false;
        if let Some(algorithm) = &mut self.algorithm {
            algorithm.reset();
        }
        self.meta.on_change(ChangeType::Benign);
    }

    /// Add a point for this analysis's problem. False if it belongs to
    /// another problem or an equivalent point already exists.
    pub fn add_data_point(&mut self, mut point: DataPoint) -> bool {
        if point.problem_id() != self.problem.id() {
            tracing::warn!(point = %point.id(), "data point belongs to another problem");
            return false;
        }
        let variables = self.problem.variables();
        let duplicate = self.data_points.iter().any(|p| {
            p.id() == point.id()
                || variables
                    .iter()
                    .zip(p.variable_values().iter().zip(point.variable_values()))
                    .all(|(v, (a, b))| v.values_equivalent(a.as_ref(), b.as_ref()))
        });
        if duplicate {
            return false;
        }
        point.meta_mut().set_parent(self.meta.id());
        point.meta_mut().take_unreported_change();
        self.data_points.push(point);
        self.meta.on_change(ChangeType::Benign);
        true
    }

    pub fn remove_data_point(&mut self, id: ObjectId) -> bool {
        let Some(index) = self.data_points.iter().position(|p| p.id() == id) else {
            return false;
        };
        let mut removed = self.data_points.remove(index);
        removed.meta_mut().clear_parent();
        self.meta.on_change(ChangeType::Benign);
        true
    }

    /// Edit one point; its change is re-raised on the analysis
    pub fn edit_data_point<R>(
        &mut self,
        id: ObjectId,
        edit: impl FnOnce(&mut DataPoint) -> R,
    ) -> Result<R, AnalysisError> {
        let point = self
            .data_points
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or(AnalysisError::DataPointNotFound(id))?;
        let result = edit(point);
        self.meta.absorb(point.meta_mut());
        Ok(result)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn data_point(&self, id: ObjectId) -> Option<&DataPoint> {
        self.data_points.iter().find(|p| p.id() == id)
    }

    /// Points whose values match `values` (see [`DataPoint::matches`])
    pub fn get_data_points(&self, values: &[Option<VariableValue>]) -> Vec<&DataPoint> {
        self.data_points.iter().filter(|p| p.matches(values)).collect()
    }

    pub fn successful_data_points(&self) -> Vec<&DataPoint> {
        self.points_in(DataPointState::Succeeded)
    }

    pub fn failed_data_points(&self) -> Vec<&DataPoint> {
        self.points_in(DataPointState::Failed)
    }

    /// Points that are not complete (pending or running)
    pub fn incomplete_data_points(&self) -> Vec<&DataPoint> {
        self.data_points.iter().filter(|p| !p.is_complete()).collect()
    }

    fn points_in(&self, state: DataPointState) -> Vec<&DataPoint> {
        self.data_points.iter().filter(|p| p.state() == state).collect()
    }

    // ========================================================================
    // Generation and execution
    // ========================================================================

    /// Run the algorithm's next iteration and add the new points. Returns how
    /// many were added.
    pub fn generate(&mut self) -> Result<usize, AnalysisError> {
        if self.data_points_are_invalid {
            return Err(AnalysisError::ResultsInvalidated);
        }
        let algorithm = self.algorithm.as_mut().ok_or(AnalysisError::NoAlgorithm)?;
        let points = algorithm.create_next_iteration(&self.problem, &self.data_points)?;
        self.meta.absorb(algorithm.meta_mut());
        let mut added = 0;
        for point in points {
            if self.add_data_point(point) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Execute every pending point
    pub fn run(
        &mut self,
        executor: &dyn Executor,
        options: &RunOptions,
        progress: Option<&RunProgress>,
    ) -> Result<RunSummary, AnalysisError> {
        if self.data_points_are_invalid {
            return Err(AnalysisError::ResultsInvalidated);
        }
        let summary = run_data_points(
            &self.problem,
            self.seed.as_ref(),
            &mut self.data_points,
            executor,
            options,
            progress,
        );
        for point in &mut self.data_points {
            self.meta.absorb(point.meta_mut());
        }
        summary
    }

    /// Bring every referenced measure up to the catalog's revision. Returns
    /// the number of perturbations revised.
    pub fn refresh_measures(
        &mut self,
        catalog: &impl MeasureCatalog,
        keep_old_arguments: bool,
    ) -> usize {
        let revisions: Vec<_> = self
            .problem
            .measures()
            .into_iter()
            .filter_map(|m| {
                catalog
                    .describe(m.id)
                    .filter(|(latest, _)| latest.version != m.version)
            })
            .collect();
        revisions
            .iter()
            .map(|(measure, arguments)| {
                self.edit_problem(|p| p.update_measure(measure, arguments, keep_old_arguments))
            })
            .sum()
    }
}

impl AnalysisObject for Analysis {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn clear_dirty_flag(&mut self) {
        self.meta.clear_dirty();
        self.problem.clear_dirty_flag();
        if let Some(algorithm) = &mut self.algorithm {
            algorithm.clear_dirty_flag();
        }
        for point in &mut self.data_points {
            point.clear_dirty_flag();
        }
    }
}
