//! Workflow chain building blocks
//!
//! A problem's workflow is an ordered list of [`WorkflowStep`]s. Each step is
//! either a variable slot or a fixed job. File types flow left to right
//! through the chain.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::object::{AnalysisObject, ObjectMeta};
use super::variable::Variable;

/// Processing stage of a file flowing through the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Editable building model
    Model,
    /// Simulation-ready input
    Workspace,
    /// Raw simulation output
    Output,
    /// Post-processed report
    Report,
}

impl FileType {
    pub const ALL: [FileType; 4] = [
        FileType::Model,
        FileType::Workspace,
        FileType::Output,
        FileType::Report,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Model => "model",
            FileType::Workspace => "workspace",
            FileType::Output => "output",
            FileType::Report => "report",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed job in the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Translate,
    Simulate,
    ExtractAttributes,
    Custom {
        name: String,
        input_type: FileType,
        output_type: FileType,
    },
}

impl JobType {
    pub fn input_type(&self) -> FileType {
        match self {
            JobType::Translate => FileType::Model,
            JobType::Simulate => FileType::Workspace,
            JobType::ExtractAttributes => FileType::Output,
            JobType::Custom { input_type, .. } => *input_type,
        }
    }

    pub fn output_type(&self) -> FileType {
        match self {
            JobType::Translate => FileType::Workspace,
            JobType::Simulate => FileType::Output,
            JobType::ExtractAttributes => FileType::Report,
            JobType::Custom { output_type, .. } => *output_type,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            JobType::Translate => "Translate",
            JobType::Simulate => "Simulate",
            JobType::ExtractAttributes => "ExtractAttributes",
            JobType::Custom { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepKind {
    Variable(Variable),
    Job(JobType),
}

/// One slot in the workflow chain
///
/// A step owns its variable (if any) and is recorded as the variable's
/// parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    meta: ObjectMeta,
    kind: StepKind,
}

impl WorkflowStep {
    pub fn variable(mut variable: Variable) -> Self {
        let meta = ObjectMeta::new(variable.name().to_string());
        variable.meta_mut().set_parent(meta.id());
        Self {
            meta,
            kind: StepKind::Variable(variable),
        }
    }

    pub fn job(job: JobType) -> Self {
        Self {
            meta: ObjectMeta::new(job.name().to_string()),
            kind: StepKind::Job(job),
        }
    }

    pub fn from_parts(meta: ObjectMeta, kind: StepKind) -> Self {
        let mut step = Self { meta, kind };
        step.adopt_children();
        step
    }

    /// Fresh identity for the step and its variable
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let kind = match &self.kind {
            StepKind::Variable(v) => StepKind::Variable(v.duplicate()),
            StepKind::Job(j) => StepKind::Job(j.clone()),
        };
        let mut step = Self {
            meta: self.meta.duplicate(),
            kind,
        };
        step.adopt_children();
        step
    }

    /// Re-establish parent ids after deserialization or duplication
    pub(crate) fn adopt_children(&mut self) {
        let id = self.meta.id();
        if let StepKind::Variable(v) = &mut self.kind {
            v.meta_mut().set_parent(id);
            v.adopt_children();
        }
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, StepKind::Variable(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            StepKind::Variable(v) => Some(v),
            StepKind::Job(_) => None,
        }
    }

    pub(crate) fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match &mut self.kind {
            StepKind::Variable(v) => Some(v),
            StepKind::Job(_) => None,
        }
    }

    pub fn as_job(&self) -> Option<&JobType> {
        match &self.kind {
            StepKind::Job(j) => Some(j),
            StepKind::Variable(_) => None,
        }
    }

    /// Name shown in diagnostics: the variable's or the job's
    pub fn label(&self) -> &str {
        match &self.kind {
            StepKind::Variable(v) => v.name(),
            StepKind::Job(j) => j.name(),
        }
    }

    /// Declared `(input, output)` types, or `None` when the step passes its
    /// input through unconstrained.
    pub fn declared_types(&self) -> Option<(FileType, FileType)> {
        match &self.kind {
            StepKind::Job(j) => Some((j.input_type(), j.output_type())),
            StepKind::Variable(v) => v.declared_types(),
        }
    }

    /// Pull any pending change up from the owned variable
    pub(crate) fn absorb_child(&mut self) {
        if let StepKind::Variable(v) = &mut self.kind {
            v.absorb_children();
            self.meta.absorb(v.meta_mut());
        }
    }

    pub(crate) fn take_variable(self) -> Option<Variable> {
        match self.kind {
            StepKind::Variable(mut v) => {
                v.meta_mut().clear_parent();
                Some(v)
            }
            StepKind::Job(_) => None,
        }
    }
}

impl AnalysisObject for WorkflowStep {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn clear_dirty_flag(&mut self) {
        self.meta.clear_dirty();
        if let StepKind::Variable(v) = &mut self.kind {
            v.clear_dirty_flag();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_types() {
        assert_eq!(JobType::Translate.input_type(), FileType::Model);
        assert_eq!(JobType::Translate.output_type(), FileType::Workspace);
        assert_eq!(JobType::Simulate.input_type(), FileType::Workspace);
        let custom = JobType::Custom {
            name: "Postprocess".into(),
            input_type: FileType::Output,
            output_type: FileType::Output,
        };
        assert_eq!(custom.name(), "Postprocess");
        assert_eq!(custom.output_type(), FileType::Output);
    }

    #[test]
    fn test_job_step_declares_types() {
        let step = WorkflowStep::job(JobType::ExtractAttributes);
        assert_eq!(
            step.declared_types(),
            Some((FileType::Output, FileType::Report))
        );
        assert_eq!(step.label(), "ExtractAttributes");
        assert!(!step.is_variable());
    }

    #[test]
    fn test_file_type_display() {
        assert_eq!(FileType::Workspace.to_string(), "workspace");
    }
}
