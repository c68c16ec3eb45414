//! Data points: one concrete assignment of a problem's variables
//!
//! A point starts Pending, becomes Running when a job is attached, and ends
//! in exactly one terminal outcome. File-derived data (model and output
//! contents, report attributes) is cached lazily and can be dropped at any
//! time.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::DataPointError;
use crate::model::{
    AnalysisObject, Attribute, ChangeType, FileReference, FileType, ObjectId, ObjectMeta,
    VariableValue, leaf_analysis_object,
};
use crate::problem::Problem;

/// Tag given to points whose outcome arrived after a run was cancelled
pub const ABANDONED_TAG: &str = "abandoned";

/// Execution state derived from a point's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPointState {
    Pending,
    Running,
    /// Complete, with results
    Succeeded,
    /// Complete, without results
    Failed,
}

/// The top-level job executing a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: ObjectId,
    pub started_at: Timestamp,
}

impl JobHandle {
    pub fn start() -> Self {
        Self {
            job_id: ObjectId::new(),
            started_at: Timestamp::now(),
        }
    }
}

/// Lazily loaded file contents. Never persisted, never compared.
#[derive(Debug, Clone, Default)]
struct FileCache {
    model: OnceLock<String>,
    output: OnceLock<String>,
    report: OnceLock<Vec<Attribute>>,
}

impl PartialEq for FileCache {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    meta: ObjectMeta,
    problem_id: ObjectId,
    variable_values: Vec<Option<VariableValue>>,
    #[serde(default)]
    response_values: Vec<f64>,
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    failed: bool,
    #[serde(default)]
    directory: Option<PathBuf>,
    #[serde(default)]
    model: Option<FileReference>,
    #[serde(default)]
    workspace: Option<FileReference>,
    #[serde(default)]
    output: Option<FileReference>,
    #[serde(default)]
    attribute_report: Option<FileReference>,
    #[serde(default)]
    output_attributes: Vec<Attribute>,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    top_level_job: Option<JobHandle>,
    #[serde(skip)]
    cache: FileCache,
}

impl DataPoint {
    /// A pending point for `problem`. Each value must be valid for its
    /// variable.
    pub fn new(
        problem: &Problem,
        variable_values: Vec<Option<VariableValue>>,
    ) -> Result<Self, DataPointError> {
        let variables = problem.variables();
        if variable_values.len() != variables.len() {
            return Err(DataPointError::ValueCountMismatch {
                expected: variables.len(),
                found: variable_values.len(),
            });
        }
        if let Some(index) = variables
            .iter()
            .zip(&variable_values)
            .position(|(v, value)| !v.matches(value.as_ref()))
        {
            return Err(DataPointError::InvalidValue { index });
        }
        Ok(Self::from_parts(
            ObjectMeta::new("data point"),
            problem.id(),
            variable_values,
            Vec::new(),
            false,
            false,
        ))
    }

    /// Reconstruct a persisted point; files, tags and job are set afterwards
    pub fn from_parts(
        meta: ObjectMeta,
        problem_id: ObjectId,
        variable_values: Vec<Option<VariableValue>>,
        response_values: Vec<f64>,
        complete: bool,
        failed: bool,
    ) -> Self {
        Self {
            meta,
            problem_id,
            variable_values,
            response_values,
            complete,
            failed,
            directory: None,
            model: None,
            workspace: None,
            output: None,
            attribute_report: None,
            output_attributes: Vec::new(),
            tags: BTreeSet::new(),
            top_level_job: None,
            cache: FileCache::default(),
        }
    }

    pub fn problem_id(&self) -> ObjectId {
        self.problem_id
    }

    pub fn variable_values(&self) -> &[Option<VariableValue>] {
        &self.variable_values
    }

    pub fn response_values(&self) -> &[f64] {
        &self.response_values
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn state(&self) -> DataPointState {
        match (self.complete, self.failed, &self.top_level_job) {
            (true, true, _) => DataPointState::Failed,
            (true, false, _) => DataPointState::Succeeded,
            (false, _, Some(_)) => DataPointState::Running,
            (false, _, None) => DataPointState::Pending,
        }
    }

    pub fn top_level_job(&self) -> Option<&JobHandle> {
        self.top_level_job.as_ref()
    }

    /// Whether every non-`None` entry of `values` equals this point's value
    /// at that position. Longer than the point's values never matches.
    pub fn matches(&self, values: &[Option<VariableValue>]) -> bool {
        if values.len() > self.variable_values.len() {
            return false;
        }
        values
            .iter()
            .zip(&self.variable_values)
            .all(|(wanted, actual)| wanted.is_none() || wanted == actual)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Attach the job executing this point
    pub fn set_top_level_job(&mut self, job: JobHandle) -> Result<(), DataPointError> {
        if self.complete {
            return Err(DataPointError::AlreadyComplete(self.meta.id()));
        }
        self.top_level_job = Some(job);
        self.meta.on_change(ChangeType::Benign);
        Ok(())
    }

    /// Detach a job that never ran
    pub fn clear_top_level_job(&mut self) {
        if self.top_level_job.take().is_some() {
            self.meta.on_change(ChangeType::Benign);
        }
    }

    /// Terminal success. Repeating it is a no-op; after a failure it is an
    /// error and the failure stands.
    pub fn mark_complete(&mut self) -> Result<(), DataPointError> {
        match (self.complete, self.failed) {
            (true, false) => Ok(()),
            (true, true) => {
                tracing::warn!(point = %self.meta.id(), "success reported for a failed point");
                Err(DataPointError::ConflictingOutcome(self.meta.id()))
            }
            (false, _) => {
                self.complete = true;
                self.failed = false;
                self.meta.on_change(ChangeType::Benign);
                Ok(())
            }
        }
    }

    /// Terminal failure. Repeating it is a no-op; after a success the failure
    /// is still recorded (responses cleared) and an error is returned.
    pub fn mark_failed(&mut self) -> Result<(), DataPointError> {
        match (self.complete, self.failed) {
            (true, true) => Ok(()),
            (true, false) => {
                tracing::warn!(point = %self.meta.id(), "failure reported for a completed point");
                self.failed = true;
                self.response_values.clear();
                self.meta.on_change(ChangeType::Benign);
                Err(DataPointError::ConflictingOutcome(self.meta.id()))
            }
            (false, _) => {
                self.complete = true;
                self.failed = true;
                self.response_values.clear();
                self.meta.on_change(ChangeType::Benign);
                Ok(())
            }
        }
    }

    /// Only valid after a successful completion, one value per response
    pub fn set_response_values(
        &mut self,
        problem: &Problem,
        values: Vec<f64>,
    ) -> Result<(), DataPointError> {
        if problem.id() != self.problem_id {
            return Err(DataPointError::WrongProblem {
                expected: self.problem_id,
                found: problem.id(),
            });
        }
        if !self.complete || self.failed {
            return Err(DataPointError::ResponsesBeforeCompletion);
        }
        if values.len() != problem.num_responses() {
            return Err(DataPointError::ResponseCountMismatch {
                expected: problem.num_responses(),
                found: values.len(),
            });
        }
        self.response_values = values;
        self.meta.on_change(ChangeType::Benign);
        Ok(())
    }

    /// A pending copy of this point under the same id and a new version:
    /// outcome, responses, outputs and job are dropped. The directory, the
    /// model reference and tags other than run markers are kept. The point
    /// itself is left as it was.
    #[must_use]
    pub fn cleared(&self) -> Self {
        let mut point = Self::from_parts(
            self.meta.clone(),
            self.problem_id,
            self.variable_values.clone(),
            Vec::new(),
            false,
            false,
        );
        point.directory = self.directory.clone();
        point.model = self.model.clone();
        point.tags = self
            .tags
            .iter()
            .filter(|tag| *tag != ABANDONED_TAG)
            .cloned()
            .collect();
        point.meta.on_change(ChangeType::Benign);
        point
    }

    // ========================================================================
    // Files and cached data
    // ========================================================================

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) {
        self.directory = Some(directory.into());
        self.meta.on_change(ChangeType::Benign);
    }

    pub fn file(&self, file_type: FileType) -> Option<&FileReference> {
        match file_type {
            FileType::Model => self.model.as_ref(),
            FileType::Workspace => self.workspace.as_ref(),
            FileType::Output => self.output.as_ref(),
            FileType::Report => self.attribute_report.as_ref(),
        }
    }

    /// Record a file under the slot for its type, dropping any cached
    /// contents of the previous file
    pub fn set_file(&mut self, reference: FileReference) {
        match reference.file_type {
            FileType::Model => {
                self.cache.model.take();
                self.model = Some(reference);
            }
            FileType::Workspace => self.workspace = Some(reference),
            FileType::Output => {
                self.cache.output.take();
                self.output = Some(reference);
            }
            FileType::Report => {
                self.cache.report.take();
                self.attribute_report = Some(reference);
            }
        }
        self.meta.on_change(ChangeType::Benign);
    }

    pub fn output_attributes(&self) -> &[Attribute] {
        &self.output_attributes
    }

    pub fn set_output_attributes(&mut self, attributes: Vec<Attribute>) {
        self.output_attributes = attributes;
        self.meta.on_change(ChangeType::Benign);
    }

    pub fn model_contents(&self) -> Result<&str, DataPointError> {
        if let Some(text) = self.cache.model.get() {
            return Ok(text);
        }
        let reference = self
            .model
            .as_ref()
            .ok_or(DataPointError::NoFileReference("model"))?;
        let text = read_text(&reference.path)?;
        Ok(self.cache.model.get_or_init(|| text))
    }

    pub fn output_contents(&self) -> Result<&str, DataPointError> {
        if let Some(text) = self.cache.output.get() {
            return Ok(text);
        }
        let reference = self
            .output
            .as_ref()
            .ok_or(DataPointError::NoFileReference("output"))?;
        let text = read_text(&reference.path)?;
        Ok(self.cache.output.get_or_init(|| text))
    }

    /// Attributes parsed from the attribute report (a JSON array)
    pub fn report_attributes(&self) -> Result<&[Attribute], DataPointError> {
        if let Some(attributes) = self.cache.report.get() {
            return Ok(attributes);
        }
        let reference = self
            .attribute_report
            .as_ref()
            .ok_or(DataPointError::NoFileReference("attribute report"))?;
        let text = read_text(&reference.path)?;
        let attributes: Vec<Attribute> =
            serde_json::from_str(&text).map_err(|e| DataPointError::UnreadableResource {
                path: reference.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(self.cache.report.get_or_init(|| attributes))
    }

    pub fn clear_file_data_from_cache(&mut self) {
        self.cache.model.take();
        self.cache.output.take();
    }

    pub fn clear_all_data_from_cache(&mut self) {
        self.cache = FileCache::default();
    }

    // ========================================================================
    // Tags
    // ========================================================================

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        let added = self.tags.insert(tag.to_string());
        if added {
            self.meta.on_change(ChangeType::Benign);
        }
        added
    }

    pub fn delete_tag(&mut self, tag: &str) -> bool {
        let removed = self.tags.remove(tag);
        if removed {
            self.meta.on_change(ChangeType::Benign);
        }
        removed
    }

    /// Copy under a new identity, without cached data
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            meta: self.meta.duplicate(),
            cache: FileCache::default(),
            ..self.clone()
        }
    }
}

leaf_analysis_object!(DataPoint);

fn read_text(path: &Path) -> Result<String, DataPointError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataPointError::MissingResource {
            path: path.to_path_buf(),
        },
        _ => DataPointError::UnreadableResource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}
