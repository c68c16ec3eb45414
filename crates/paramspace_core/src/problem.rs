//! Problem definition: the workflow chain, its variables and responses
//!
//! A [`Problem`] owns an ordered chain of [`WorkflowStep`]s. File types flow
//! left to right starting from the optional seed type; every step that
//! declares types must read what the chain provides at that point, and the
//! chain must end in the optional final type. Edits that would break this
//! are rejected and leave the problem untouched.

use std::collections::HashMap;
use std::fmt;
use std::iter;

use serde::{Deserialize, Serialize};

use crate::error::{CompatibilityError, ProblemError};
use crate::model::{
    AnalysisObject, Argument, ChangeType, ContinuousVariable, DiscreteVariable, FileType, JobType,
    LinearFunction, MAX_CONTINUOUS_SAMPLES, MeasureDescriptor, ObjectId, ObjectMeta, Perturbation,
    StepKind, Variable, VariableValue, WorkflowStep,
};

/// A design space: an ordered chain of variables and jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    meta: ObjectMeta,
    steps: Vec<WorkflowStep>,
    #[serde(default)]
    responses: Vec<LinearFunction>,
    #[serde(default)]
    seed_file_type: Option<FileType>,
    #[serde(default)]
    final_file_type: Option<FileType>,
}

impl Problem {
    /// Build a problem with all `variables` first, then `jobs`
    pub fn new(
        name: impl Into<String>,
        variables: Vec<Variable>,
        jobs: Vec<JobType>,
    ) -> Result<Self, ProblemError> {
        let mut builder = ProblemBuilder::new(name);
        for v in variables {
            builder = builder.variable(v);
        }
        for j in jobs {
            builder = builder.job(j);
        }
        builder.build()
    }

    /// Reconstruct a persisted problem. The chain is not re-validated; see
    /// [`validation_issues`](Self::validation_issues).
    pub fn from_parts(
        meta: ObjectMeta,
        steps: Vec<WorkflowStep>,
        responses: Vec<LinearFunction>,
        seed_file_type: Option<FileType>,
        final_file_type: Option<FileType>,
    ) -> Self {
        let mut problem = Self {
            meta,
            steps,
            responses,
            seed_file_type,
            final_file_type,
        };
        problem.adopt_children();
        problem
    }

    /// Re-establish parent ids throughout the owned tree
    pub fn adopt_children(&mut self) {
        let id = self.meta.id();
        for step in &mut self.steps {
            step.meta_mut().set_parent(id);
            step.adopt_children();
        }
        for f in &mut self.responses {
            f.meta_mut().set_parent(id);
        }
    }

    /// Deep copy under new identities. Response terms follow the copied
    /// variables.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let steps: Vec<WorkflowStep> = self.steps.iter().map(WorkflowStep::duplicate).collect();

        let remap: HashMap<ObjectId, ObjectId> = self
            .steps
            .iter()
            .zip(&steps)
            .filter_map(|(old, new)| Some((old.as_variable()?.id(), new.as_variable()?.id())))
            .collect();

        let responses = self
            .responses
            .iter()
            .map(|f| {
                let mut copy = f.duplicate();
                copy.remap_inputs(|id| remap.get(&id).copied().unwrap_or(id));
                copy
            })
            .collect();

        let mut problem = Self {
            meta: self.meta.duplicate(),
            steps,
            responses,
            seed_file_type: self.seed_file_type,
            final_file_type: self.final_file_type,
        };
        problem.adopt_children();
        problem
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn workflow(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn seed_file_type(&self) -> Option<FileType> {
        self.seed_file_type
    }

    pub fn final_file_type(&self) -> Option<FileType> {
        self.final_file_type
    }

    pub fn num_variables(&self) -> usize {
        self.steps.iter().filter(|s| s.is_variable()).count()
    }

    /// Variables in chain order
    pub fn variables(&self) -> Vec<&Variable> {
        self.steps.iter().filter_map(WorkflowStep::as_variable).collect()
    }

    pub fn variable(&self, index: usize) -> Option<&Variable> {
        self.steps.iter().filter_map(WorkflowStep::as_variable).nth(index)
    }

    /// Ordinal of the variable with this id among the variable steps
    pub fn variable_index(&self, id: ObjectId) -> Option<usize> {
        self.steps
            .iter()
            .filter_map(WorkflowStep::as_variable)
            .position(|v| v.id() == id)
    }

    /// Chain position of the `index`-th variable
    pub fn variable_step_index(&self, index: usize) -> Option<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_variable())
            .nth(index)
            .map(|(i, _)| i)
    }

    /// Chain position of a step, found by the step's id or its variable's id
    pub fn step_index(&self, id: ObjectId) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.id() == id || s.as_variable().is_some_and(|v| v.id() == id))
    }

    pub fn responses(&self) -> &[LinearFunction] {
        &self.responses
    }

    pub fn num_responses(&self) -> usize {
        self.responses.len()
    }

    pub fn has_continuous_variables(&self) -> bool {
        self.variables().iter().any(|v| v.is_continuous())
    }

    /// Number of distinct discrete assignments
    ///
    /// Product of every discrete variable's perturbation count, counting
    /// only selected perturbations when `selected_only` is set (as full
    /// factorial does); 0 when there is no discrete variable. `None` if
    /// continuous variables must be counted, since they have no finite
    /// enumeration.
    pub fn combinatorial_size(
        &self,
        selected_only: bool,
        exclude_continuous: bool,
    ) -> Option<usize> {
        if !exclude_continuous && self.has_continuous_variables() {
            return None;
        }
        let discrete: Vec<&DiscreteVariable> = self
            .variables()
            .into_iter()
            .filter_map(Variable::as_discrete)
            .collect();
        if discrete.is_empty() {
            return Some(0);
        }
        Some(
            discrete
                .iter()
                .map(|v| v.num_perturbations(selected_only))
                .product(),
        )
    }

    /// Every distinct measure referenced by the problem's perturbations
    pub fn measures(&self) -> Vec<&MeasureDescriptor> {
        let mut measures: Vec<&MeasureDescriptor> = Vec::new();
        for variable in self.variables() {
            let used: Vec<&MeasureDescriptor> = match variable {
                Variable::Discrete(v) => v
                    .perturbations(false)
                    .into_iter()
                    .filter_map(Perturbation::as_measure)
                    .map(|m| m.measure())
                    .collect(),
                Variable::Continuous(v) => vec![v.measure_perturbation().measure()],
            };
            for m in used {
                if !measures.iter().any(|known| known.id == m.id) {
                    measures.push(m);
                }
            }
        }
        measures
    }

    /// The perturbation each value selects; `None` for unset values and
    /// continuous variables
    pub fn get_perturbations(&self, values: &[Option<VariableValue>]) -> Vec<Option<&Perturbation>> {
        self.variables()
            .into_iter()
            .zip(values)
            .map(|(variable, value)| match (variable, value) {
                (Variable::Discrete(v), Some(VariableValue::Index(i))) => v.perturbation(*i),
                _ => None,
            })
            .collect()
    }

    /// Non-fatal problems a user should fix before running
    pub fn validation_issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if let Err(err) = check_chain(self.steps.iter(), self.seed_file_type, self.final_file_type)
        {
            issues.push(ValidationIssue {
                step: None,
                name: self.meta.name().to_string(),
                kind: IssueKind::Chain(err),
            });
        }
        for (i, step) in self.steps.iter().enumerate() {
            let Some(variable) = step.as_variable() else {
                continue;
            };
            let issue = |kind| ValidationIssue {
                step: Some(i),
                name: variable.name().to_string(),
                kind,
            };
            match variable {
                Variable::Discrete(v) => {
                    if v.num_perturbations(false) == 0 {
                        issues.push(issue(IssueKind::EmptyVariable));
                    } else if v.num_perturbations(true) == 0 {
                        issues.push(issue(IssueKind::NothingSelected));
                    }
                    for p in v.perturbations(false) {
                        if let Some(m) = p.as_measure() {
                            for a in m.incomplete_arguments() {
                                issues.push(issue(IssueKind::IncompleteArgument {
                                    perturbation: m.name().to_string(),
                                    argument: a.name().to_string(),
                                }));
                            }
                        }
                    }
                }
                Variable::Continuous(v) => {
                    if v.sample_values().is_none() {
                        issues.push(issue(IssueKind::UnboundedContinuous));
                    }
                    if v.measure_perturbation().argument(v.argument_name()).is_none() {
                        issues.push(issue(IssueKind::IncompleteArgument {
                            perturbation: v.measure_perturbation().name().to_string(),
                            argument: v.argument_name().to_string(),
                        }));
                    }
                }
            }
        }
        for f in &self.responses {
            for id in f.input_ids() {
                if self.variable_index(id).is_none() {
                    issues.push(ValidationIssue {
                        step: None,
                        name: f.name().to_string(),
                        kind: IssueKind::UnknownInput(id),
                    });
                }
            }
        }
        issues
    }

    // ========================================================================
    // File-type compatibility
    // ========================================================================

    /// Whether a perturbation reading `input` and writing `output` could be
    /// placed at `step` (a step id or variable id). `output == None` means the
    /// candidate passes its input through.
    pub fn check_compatibility(
        &self,
        step: ObjectId,
        input: FileType,
        output: Option<FileType>,
    ) -> Result<(), CompatibilityError> {
        let index = self
            .step_index(step)
            .ok_or(CompatibilityError::NotInProblem(step))?;
        let output = output.unwrap_or(input);
        let name = || self.steps[index].label().to_string();

        let upstream = self.steps[..index]
            .iter()
            .rev()
            .find_map(WorkflowStep::declared_types)
            .map(|(_, out)| out)
            .or(self.seed_file_type);
        if let Some(upstream) = upstream
            && upstream != input
        {
            return Err(CompatibilityError::UpstreamMismatch {
                step: index,
                name: name(),
                upstream,
                input,
            });
        }

        let downstream = self.steps[index + 1..]
            .iter()
            .find_map(WorkflowStep::declared_types)
            .map(|(inp, _)| inp)
            .or(self.final_file_type);
        if let Some(downstream) = downstream
            && downstream != output
        {
            return Err(CompatibilityError::DownstreamMismatch {
                step: index,
                name: name(),
                downstream,
                output,
            });
        }

        if let Some(Variable::Discrete(v)) = self.steps[index].as_variable() {
            if let Some((existing_input, existing_output)) = v.declared_types()
                && (existing_input, existing_output) != (input, output)
            {
                return Err(CompatibilityError::SiblingMismatch {
                    step: index,
                    name: name(),
                    existing_input,
                    existing_output,
                    input,
                    output,
                });
            }
            if v.has_null_perturbation() && input != output {
                return Err(CompatibilityError::ChangesTypeBesideNull {
                    step: index,
                    name: name(),
                    input,
                    output,
                });
            }
        }
        Ok(())
    }

    pub fn file_types_are_compatible(
        &self,
        step: ObjectId,
        input: FileType,
        output: Option<FileType>,
    ) -> bool {
        self.check_compatibility(step, input, output).is_ok()
    }

    // ========================================================================
    // Structural edits
    // ========================================================================

    pub fn set_seed_file_type(&mut self, seed: Option<FileType>) -> Result<(), ProblemError> {
        check_chain(self.steps.iter(), seed, self.final_file_type)?;
        self.seed_file_type = seed;
        self.meta.on_change(ChangeType::InvalidatesResults);
        Ok(())
    }

    pub fn set_final_file_type(&mut self, last: Option<FileType>) -> Result<(), ProblemError> {
        check_chain(self.steps.iter(), self.seed_file_type, last)?;
        self.final_file_type = last;
        self.meta.on_change(ChangeType::InvalidatesResults);
        Ok(())
    }

    /// Append after the last variable
    pub fn push_variable(&mut self, variable: impl Into<Variable>) -> Result<(), ProblemError> {
        let index = self.num_variables();
        self.insert_variable(index, variable)
    }

    /// Insert so the variable becomes the `index`-th variable. Inserting at
    /// `num_variables()` places it right after the current last variable.
    pub fn insert_variable(
        &mut self,
        index: usize,
        variable: impl Into<Variable>,
    ) -> Result<(), ProblemError> {
        let variable = variable.into();
        let len = self.num_variables();
        if index > len {
            return Err(ProblemError::IndexOutOfRange { index, len });
        }
        if self.step_index(variable.id()).is_some() {
            return Err(ProblemError::DuplicateObject(variable.id()));
        }
        let position = match self.variable_step_index(index) {
            Some(position) => position,
            None => self
                .steps
                .iter()
                .rposition(WorkflowStep::is_variable)
                .map_or(0, |last| last + 1),
        };
        self.insert_step(position, WorkflowStep::variable(variable))
    }

    /// Remove a variable by its id, returning it detached. Rejected while a
    /// response function reads the variable.
    pub fn erase_variable(&mut self, id: ObjectId) -> Result<Variable, ProblemError> {
        let position = self
            .steps
            .iter()
            .position(|s| s.as_variable().is_some_and(|v| v.id() == id))
            .ok_or(ProblemError::VariableNotFound(id))?;
        if let Some(f) = self
            .responses
            .iter()
            .find(|f| f.input_ids().any(|input| input == id))
        {
            let err = ProblemError::VariableInUse {
                variable: id,
                function: f.name().to_string(),
            };
            tracing::warn!(problem = %self.meta.name(), %err, "variable removal rejected");
            return Err(err);
        }
        let step = self.remove_step(position)?;
        step.take_variable().ok_or(ProblemError::VariableNotFound(id))
    }

    pub fn push_job(&mut self, job: JobType) -> Result<ObjectId, ProblemError> {
        self.insert_job(self.steps.len(), job)
    }

    /// Insert a job at chain position `position`, returning the step's id
    pub fn insert_job(&mut self, position: usize, job: JobType) -> Result<ObjectId, ProblemError> {
        let step = WorkflowStep::job(job);
        let id = step.id();
        self.insert_step(position, step)?;
        Ok(id)
    }

    pub fn erase_job(&mut self, step: ObjectId) -> Result<JobType, ProblemError> {
        let position = self
            .steps
            .iter()
            .position(|s| s.id() == step && !s.is_variable())
            .ok_or(ProblemError::StepNotFound(step))?;
        let removed = self.remove_step(position)?;
        removed
            .as_job()
            .cloned()
            .ok_or(ProblemError::StepNotFound(step))
    }

    fn insert_step(&mut self, position: usize, mut step: WorkflowStep) -> Result<(), ProblemError> {
        if position > self.steps.len() {
            return Err(ProblemError::IndexOutOfRange {
                index: position,
                len: self.steps.len(),
            });
        }
        let candidate = self.steps[..position]
            .iter()
            .chain(iter::once(&step))
            .chain(self.steps[position..].iter());
        if let Err(err) = check_chain(candidate, self.seed_file_type, self.final_file_type) {
            tracing::warn!(problem = %self.meta.name(), %err, "step rejected");
            return Err(err);
        }
        tracing::debug!(problem = %self.meta.name(), step = %step.label(), position, "step inserted");
        step.meta_mut().set_parent(self.meta.id());
        step.meta_mut().take_unreported_change();
        self.steps.insert(position, step);
        self.meta.on_change(ChangeType::InvalidatesResults);
        Ok(())
    }

    fn remove_step(&mut self, position: usize) -> Result<WorkflowStep, ProblemError> {
        let remaining = self
            .steps
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, s)| s);
        if let Err(err) = check_chain(remaining, self.seed_file_type, self.final_file_type) {
            tracing::warn!(problem = %self.meta.name(), %err, "step removal rejected");
            return Err(err);
        }
        let mut step = self.steps.remove(position);
        step.meta_mut().clear_parent();
        self.meta.on_change(ChangeType::InvalidatesResults);
        Ok(step)
    }

    /// Edit the step at `position` in place. If the chain was valid before
    /// and the edit breaks it, the step is restored and nothing propagates.
    fn edit_step<R>(
        &mut self,
        position: usize,
        edit: impl FnOnce(&mut WorkflowStep) -> R,
    ) -> Result<R, ProblemError> {
        let was_valid =
            check_chain(self.steps.iter(), self.seed_file_type, self.final_file_type).is_ok();
        let original = self.steps[position].clone();
        let result = edit(&mut self.steps[position]);
        if was_valid
            && let Err(err) =
                check_chain(self.steps.iter(), self.seed_file_type, self.final_file_type)
        {
            tracing::warn!(problem = %self.meta.name(), step = %original.label(), %err, "edit rejected");
            self.steps[position] = original;
            return Err(err);
        }
        let step = &mut self.steps[position];
        step.absorb_child();
        self.meta.absorb(step.meta_mut());
        Ok(result)
    }

    /// Handle for editing the `index`-th variable under this problem's
    /// compatibility rules
    pub fn variable_mut(&mut self, index: usize) -> Option<VariableMut<'_>> {
        let step = self.variable_step_index(index)?;
        Some(VariableMut {
            problem: self,
            step,
        })
    }

    pub fn push_response(&mut self, mut function: LinearFunction) -> Result<(), ProblemError> {
        if self.responses.iter().any(|f| f.id() == function.id()) {
            return Err(ProblemError::DuplicateObject(function.id()));
        }
        function.meta_mut().set_parent(self.meta.id());
        function.meta_mut().take_unreported_change();
        self.responses.push(function);
        self.meta.on_change(ChangeType::InvalidatesResults);
        Ok(())
    }

    pub fn erase_response(&mut self, id: ObjectId) -> bool {
        let Some(index) = self.responses.iter().position(|f| f.id() == id) else {
            return false;
        };
        let mut removed = self.responses.remove(index);
        removed.meta_mut().clear_parent();
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    pub fn edit_response<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut LinearFunction) -> R,
    ) -> Option<R> {
        let function = self.responses.get_mut(index)?;
        let result = edit(function);
        self.meta.absorb(function.meta_mut());
        Some(result)
    }

    /// Apply a revised measure to every perturbation that uses it, in both
    /// discrete and continuous variables. A variable whose revised file
    /// types would no longer fit the chain keeps its old revision. Returns
    /// how many perturbations were revised.
    pub fn update_measure(
        &mut self,
        measure: &MeasureDescriptor,
        arguments: &[Argument],
        keep_old_arguments: bool,
    ) -> usize {
        let mut revised = 0;
        for position in 0..self.steps.len() {
            if !self.steps[position].is_variable() {
                continue;
            }
            let updated = self.edit_step(position, |step| {
                step.as_variable_mut()
                    .map_or(0, |v| v.update_measure(measure, arguments, keep_old_arguments))
            });
            if let Ok(count) = updated {
                revised += count;
            }
        }
        if revised > 0 {
            tracing::debug!(problem = %self.meta.name(), measure = %measure.name, revised, "measure updated");
        }
        revised
    }
}

impl AnalysisObject for Problem {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn clear_dirty_flag(&mut self) {
        self.meta.clear_dirty();
        for step in &mut self.steps {
            step.clear_dirty_flag();
        }
        for f in &mut self.responses {
            f.clear_dirty_flag();
        }
    }
}

/// Walk the chain left to right checking every declared type
fn check_chain<'a>(
    steps: impl Iterator<Item = &'a WorkflowStep>,
    seed: Option<FileType>,
    last: Option<FileType>,
) -> Result<(), ProblemError> {
    let mut current = seed;
    for (i, step) in steps.enumerate() {
        if let Some(Variable::Discrete(v)) = step.as_variable()
            && !is_consistent(v)
        {
            return Err(ProblemError::InconsistentVariable {
                name: v.name().to_string(),
            });
        }
        let Some((input, output)) = step.declared_types() else {
            continue;
        };
        if let Some(found) = current
            && found != input
        {
            return Err(ProblemError::IncompatibleFileTypes {
                step: i,
                name: step.label().to_string(),
                expected: input,
                found,
            });
        }
        current = Some(output);
    }
    match (last, current) {
        (Some(expected), Some(found)) if expected != found => {
            Err(ProblemError::IncompatibleFinalType { expected, found })
        }
        _ => Ok(()),
    }
}

fn is_consistent(variable: &DiscreteVariable) -> bool {
    let mut types = variable
        .perturbations(false)
        .into_iter()
        .filter_map(Perturbation::declared_types);
    let Some(first) = types.next() else {
        return true;
    };
    types.all(|t| t == first) && (first.0 == first.1 || !variable.has_null_perturbation())
}

/// Mutable access to one variable of a [`Problem`]
///
/// Every edit is checked against the problem's chain first, and any change
/// it causes is propagated up to the problem before the call returns.
pub struct VariableMut<'a> {
    problem: &'a mut Problem,
    step: usize,
}

impl VariableMut<'_> {
    pub fn variable(&self) -> &Variable {
        // The step index was resolved from a variable step
        match self.problem.steps[self.step].kind() {
            StepKind::Variable(v) => v,
            StepKind::Job(_) => unreachable!("variable handle points at a job step"),
        }
    }

    fn variable_mut(&mut self) -> Option<&mut Variable> {
        self.problem.steps[self.step].as_variable_mut()
    }

    fn propagate(&mut self) {
        let step = &mut self.problem.steps[self.step];
        step.absorb_child();
        self.problem.meta.absorb(step.meta_mut());
    }

    pub fn set_name(&mut self, name: &str) {
        if let Some(v) = self.variable_mut() {
            v.set_name(name);
        }
        self.propagate();
    }

    pub fn set_display_name(&mut self, display_name: &str) {
        if let Some(v) = self.variable_mut() {
            v.set_display_name(display_name);
        }
        self.propagate();
    }

    pub fn set_description(&mut self, description: &str) {
        if let Some(v) = self.variable_mut() {
            v.set_description(description);
        }
        self.propagate();
    }

    pub fn push(&mut self, perturbation: Perturbation) -> bool {
        let index = self.variable().num_perturbations(false);
        self.insert(index, perturbation)
    }

    /// Insert a perturbation. False (and no change) if the variable is
    /// continuous, the id is already present, or its file types do not fit
    /// this position in the chain.
    pub fn insert(&mut self, index: usize, perturbation: Perturbation) -> bool {
        let variable_id = self.variable().id();
        if let Some((input, output)) = perturbation.declared_types()
            && let Err(err) = self
                .problem
                .check_compatibility(variable_id, input, Some(output))
        {
            tracing::warn!(variable = %variable_id, %err, "perturbation rejected");
            return false;
        }
        let inserted = self
            .variable_mut()
            .and_then(Variable::as_discrete_mut)
            .is_some_and(|v| v.insert(index, perturbation));
        if inserted {
            self.propagate();
        }
        inserted
    }

    /// Remove a perturbation. False (and no change) if it is not present
    /// or the chain relies on the file types it declares.
    pub fn erase(&mut self, id: ObjectId) -> bool {
        self.problem
            .edit_step(self.step, |step| {
                step.as_variable_mut()
                    .and_then(Variable::as_discrete_mut)
                    .is_some_and(|v| v.erase(id))
            })
            .unwrap_or(false)
    }

    pub fn swap(&mut self, a: ObjectId, b: ObjectId) -> bool {
        let swapped = self
            .variable_mut()
            .and_then(Variable::as_discrete_mut)
            .is_some_and(|v| v.swap(a, b));
        if swapped {
            self.propagate();
        }
        swapped
    }

    /// Edit one perturbation of a discrete variable
    ///
    /// The edit is undone if it leaves perturbations that no longer fit the
    /// chain.
    pub fn edit_perturbation<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut Perturbation) -> R,
    ) -> Result<R, ProblemError> {
        let len = self
            .variable()
            .as_discrete()
            .map_or(0, |v| v.num_perturbations(false));
        if index >= len {
            return Err(ProblemError::IndexOutOfRange { index, len });
        }
        self.problem
            .edit_step(self.step, |step| {
                step.as_variable_mut()
                    .and_then(Variable::as_discrete_mut)
                    .and_then(|v| v.edit_perturbation(index, edit))
            })?
            .ok_or(ProblemError::IndexOutOfRange { index, len })
    }

    /// Edit a continuous variable, undone if its measure no longer fits the
    /// chain
    pub fn edit_continuous<R>(
        &mut self,
        edit: impl FnOnce(&mut ContinuousVariable) -> R,
    ) -> Result<R, ProblemError> {
        let id = self.variable().id();
        self.problem
            .edit_step(self.step, |step| {
                step.as_variable_mut()
                    .and_then(Variable::as_continuous_mut)
                    .map(edit)
            })?
            .ok_or(ProblemError::NotContinuous(id))
    }
}

/// What a [`ValidationIssue`] is about
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    Chain(ProblemError),
    EmptyVariable,
    NothingSelected,
    UnboundedContinuous,
    IncompleteArgument { perturbation: String, argument: String },
    /// A response reads a variable the problem no longer has
    UnknownInput(ObjectId),
}

/// A non-fatal problem with the definition, located by chain position
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub step: Option<usize>,
    pub name: String,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(step) = self.step {
            write!(f, "step {step} ({}): ", self.name)?;
        }
        match &self.kind {
            IssueKind::Chain(err) => write!(f, "{err}"),
            IssueKind::EmptyVariable => write!(f, "variable has no perturbations"),
            IssueKind::NothingSelected => write!(f, "no perturbation is selected"),
            IssueKind::UnboundedContinuous => write!(
                f,
                "continuous variable needs bounds and a step count or increment giving at most {MAX_CONTINUOUS_SAMPLES} samples"
            ),
            IssueKind::IncompleteArgument {
                perturbation,
                argument,
            } => write!(f, "{perturbation} is missing a value for {argument}"),
            IssueKind::UnknownInput(id) => {
                write!(f, "reads variable {id}, which is not in the problem")
            }
        }
    }
}

/// Builder for problems whose steps are given in chain order
///
/// ```ignore
/// let problem = ProblemBuilder::new("Envelope study")
///     .seed_type(FileType::Model)
///     .variable(walls)
///     .job(JobType::Translate)
///     .job(JobType::Simulate)
///     .build()?;
/// ```
pub struct ProblemBuilder {
    name: String,
    steps: Vec<WorkflowStep>,
    responses: Vec<LinearFunction>,
    seed_file_type: Option<FileType>,
    final_file_type: Option<FileType>,
}

impl ProblemBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            responses: Vec::new(),
            seed_file_type: None,
            final_file_type: None,
        }
    }

    pub fn seed_type(mut self, file_type: FileType) -> Self {
        self.seed_file_type = Some(file_type);
        self
    }

    pub fn final_type(mut self, file_type: FileType) -> Self {
        self.final_file_type = Some(file_type);
        self
    }

    pub fn variable(mut self, variable: impl Into<Variable>) -> Self {
        self.steps.push(WorkflowStep::variable(variable.into()));
        self
    }

    pub fn job(mut self, job: JobType) -> Self {
        self.steps.push(WorkflowStep::job(job));
        self
    }

    pub fn response(mut self, function: LinearFunction) -> Self {
        self.responses.push(function);
        self
    }

    pub fn build(self) -> Result<Problem, ProblemError> {
        check_chain(self.steps.iter(), self.seed_file_type, self.final_file_type)?;
        let mut seen = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if let Some(v) = step.as_variable() {
                if seen.contains(&v.id()) {
                    return Err(ProblemError::DuplicateObject(v.id()));
                }
                seen.push(v.id());
            }
        }
        let mut problem = Problem {
            meta: ObjectMeta::new(self.name),
            steps: self.steps,
            responses: self.responses,
            seed_file_type: self.seed_file_type,
            final_file_type: self.final_file_type,
        };
        problem.adopt_children();
        Ok(problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measure(input: FileType, output: FileType) -> Perturbation {
        Perturbation::measure(MeasureDescriptor::new("m", input, output), vec![])
    }

    #[test]
    fn test_empty_problem() {
        let problem = Problem::new("empty", vec![], vec![]).unwrap();
        assert_eq!(problem.num_variables(), 0);
        assert_eq!(problem.combinatorial_size(false, true), Some(0));
        assert_eq!(problem.combinatorial_size(false, false), Some(0));
        assert!(problem.is_dirty());
    }

    #[test]
    fn test_final_type_enforced() {
        let err = ProblemBuilder::new("p")
            .final_type(FileType::Report)
            .job(JobType::Translate)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ProblemError::IncompatibleFinalType {
                expected: FileType::Report,
                found: FileType::Workspace
            }
        );
    }

    #[test]
    fn test_erase_job_that_bridges_chain_rejected() {
        let mut problem = Problem::new(
            "p",
            vec![],
            vec![JobType::Translate, JobType::Simulate, JobType::ExtractAttributes],
        )
        .unwrap();
        let simulate = problem.workflow()[1].id();
        assert!(problem.erase_job(simulate).is_err());
        assert_eq!(problem.workflow().len(), 3);

        let extract = problem.workflow()[2].id();
        assert_eq!(problem.erase_job(extract).unwrap(), JobType::ExtractAttributes);
    }

    #[test]
    fn test_get_perturbations() {
        let v = Variable::discrete(
            "v",
            vec![Perturbation::null(), measure(FileType::Model, FileType::Model)],
        );
        let problem = Problem::new("p", vec![v], vec![]).unwrap();
        let resolved = problem.get_perturbations(&[Some(VariableValue::Index(1))]);
        assert!(resolved[0].is_some_and(|p| !p.is_null()));
        assert!(problem.get_perturbations(&[None])[0].is_none());
    }

    #[test]
    fn test_validation_issues_report_empty_and_incomplete() {
        let incomplete = Perturbation::measure(
            MeasureDescriptor::new("Set WWR", FileType::Model, FileType::Model),
            vec![Argument::double("wwr")],
        );
        let problem = Problem::new(
            "p",
            vec![
                Variable::discrete("empty", vec![]),
                Variable::discrete("wwr", vec![incomplete]),
            ],
            vec![],
        )
        .unwrap();
        let issues = problem.validation_issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::EmptyVariable);
        assert!(matches!(issues[1].kind, IssueKind::IncompleteArgument { .. }));
        assert_eq!(issues[1].step, Some(1));
    }
}
