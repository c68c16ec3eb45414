//! Perturbations: the mutually exclusive options of a discrete variable

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::argument::{Argument, ArgumentValue};
use super::ids::{ObjectId, VersionId};
use super::object::{AnalysisObject, ChangeType, ObjectMeta, leaf_analysis_object};
use super::workflow::FileType;

/// Shared, versioned transform referenced by measure perturbations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureDescriptor {
    pub id: ObjectId,
    pub version: VersionId,
    pub name: String,
    pub input_type: FileType,
    pub output_type: FileType,
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl MeasureDescriptor {
    pub fn new(name: impl Into<String>, input_type: FileType, output_type: FileType) -> Self {
        Self {
            id: ObjectId::new(),
            version: VersionId::new(),
            name: name.into(),
            input_type,
            output_type,
            directory: None,
        }
    }

    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Same measure, new version
    #[must_use]
    pub fn revised(&self) -> Self {
        Self {
            version: VersionId::new(),
            ..self.clone()
        }
    }
}

/// Identity transform: leaves the file untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullPerturbation {
    meta: ObjectMeta,
    selected: bool,
}

impl NullPerturbation {
    pub fn new() -> Self {
        Self {
            meta: ObjectMeta::new("null"),
            selected: true,
        }
    }

    pub fn from_parts(meta: ObjectMeta, selected: bool) -> Self {
        Self { meta, selected }
    }
}

impl Default for NullPerturbation {
    fn default() -> Self {
        Self::new()
    }
}

leaf_analysis_object!(NullPerturbation);

/// Application of a measure with concrete argument values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurePerturbation {
    meta: ObjectMeta,
    selected: bool,
    measure: MeasureDescriptor,
    arguments: Vec<Argument>,
    #[serde(default)]
    user_script: bool,
}

impl MeasurePerturbation {
    pub fn new(measure: MeasureDescriptor, arguments: Vec<Argument>) -> Self {
        Self {
            meta: ObjectMeta::new(measure.name.clone()),
            selected: true,
            measure,
            arguments,
            user_script: false,
        }
    }

    pub fn from_parts(
        meta: ObjectMeta,
        selected: bool,
        measure: MeasureDescriptor,
        arguments: Vec<Argument>,
        user_script: bool,
    ) -> Self {
        Self {
            meta,
            selected,
            measure,
            arguments,
            user_script,
        }
    }

    pub fn measure(&self) -> &MeasureDescriptor {
        &self.measure
    }

    pub fn input_type(&self) -> FileType {
        self.measure.input_type
    }

    pub fn output_type(&self) -> FileType {
        self.measure.output_type
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name() == name)
    }

    pub fn is_user_script(&self) -> bool {
        self.user_script
    }

    pub fn set_user_script(&mut self, user_script: bool) {
        if self.user_script != user_script {
            self.user_script = user_script;
            self.meta.on_change(ChangeType::InvalidatesResults);
        }
    }

    /// Set one argument's value. False if there is no such argument or
    /// the value does not fit its declaration.
    pub fn set_argument(&mut self, name: &str, value: ArgumentValue) -> bool {
        let Some(argument) = self.arguments.iter_mut().find(|a| a.name() == name) else {
            return false;
        };
        match argument.set_value(value) {
            Ok(()) => {
                self.meta.on_change(ChangeType::InvalidatesResults);
                true
            }
            Err(err) => {
                tracing::warn!(perturbation = %self.meta.id(), %err, "argument rejected");
                false
            }
        }
    }

    /// String form of [`set_argument`](Self::set_argument)
    pub fn set_argument_from_str(&mut self, name: &str, text: &str) -> bool {
        let Some(argument) = self.arguments.iter_mut().find(|a| a.name() == name) else {
            return false;
        };
        if argument.set_value_from_str(text).is_err() {
            return false;
        }
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    pub fn clear_argument(&mut self, name: &str) -> bool {
        let Some(argument) = self.arguments.iter_mut().find(|a| a.name() == name) else {
            return false;
        };
        argument.clear_value();
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    /// Required arguments with neither a value nor a default
    pub fn incomplete_arguments(&self) -> Vec<&Argument> {
        self.arguments.iter().filter(|a| !a.is_complete()).collect()
    }

    /// Adopt a new revision of this perturbation's measure
    ///
    /// No-op (returns false) unless `measure` has this perturbation's
    /// descriptor id and a different version. Arguments are rebuilt from
    /// `arguments`, keeping old declarations that are absent from the new
    /// set when `keep_old_arguments` is true.
    pub fn update_measure(
        &mut self,
        measure: &MeasureDescriptor,
        arguments: &[Argument],
        keep_old_arguments: bool,
    ) -> bool {
        if measure.id != self.measure.id || measure.version == self.measure.version {
            return false;
        }

        let mut rebuilt: Vec<Argument> = arguments
            .iter()
            .map(|declaration| match self.argument(declaration.name()) {
                Some(old) => old.revised_by(declaration),
                None => declaration.clone(),
            })
            .collect();

        if keep_old_arguments {
            for old in &self.arguments {
                if !arguments.iter().any(|a| a.name() == old.name()) {
                    rebuilt.push(old.clone());
                }
            }
        }

        tracing::debug!(
            perturbation = %self.meta.id(),
            measure = %measure.name,
            arguments = rebuilt.len(),
            "measure revised"
        );
        self.measure = measure.clone();
        self.arguments = rebuilt;
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }
}

leaf_analysis_object!(MeasurePerturbation);

/// One option of a discrete variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Perturbation {
    Null(NullPerturbation),
    Measure(MeasurePerturbation),
}

impl Perturbation {
    pub fn null() -> Self {
        Perturbation::Null(NullPerturbation::new())
    }

    pub fn measure(measure: MeasureDescriptor, arguments: Vec<Argument>) -> Self {
        Perturbation::Measure(MeasurePerturbation::new(measure, arguments))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Perturbation::Null(_))
    }

    pub fn as_measure(&self) -> Option<&MeasurePerturbation> {
        match self {
            Perturbation::Measure(m) => Some(m),
            Perturbation::Null(_) => None,
        }
    }

    pub fn as_measure_mut(&mut self) -> Option<&mut MeasurePerturbation> {
        match self {
            Perturbation::Measure(m) => Some(m),
            Perturbation::Null(_) => None,
        }
    }

    /// `(input, output)` of a measure, `None` for the null perturbation
    pub fn declared_types(&self) -> Option<(FileType, FileType)> {
        self.as_measure().map(|m| (m.input_type(), m.output_type()))
    }

    pub fn is_selected(&self) -> bool {
        match self {
            Perturbation::Null(p) => p.selected,
            Perturbation::Measure(p) => p.selected,
        }
    }

    pub fn set_selected(&mut self, selected: bool) {
        let current = match self {
            Perturbation::Null(p) => &mut p.selected,
            Perturbation::Measure(p) => &mut p.selected,
        };
        if *current != selected {
            *current = selected;
            self.meta_mut().on_change(ChangeType::InvalidatesResults);
        }
    }

    #[must_use]
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        *copy.meta_mut() = self.meta().duplicate();
        if let Perturbation::Measure(m) = &mut copy {
            m.arguments = m.arguments.iter().map(Argument::duplicate).collect();
        }
        copy
    }
}

impl AnalysisObject for Perturbation {
    fn meta(&self) -> &ObjectMeta {
        match self {
            Perturbation::Null(p) => p.meta(),
            Perturbation::Measure(p) => p.meta(),
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Perturbation::Null(p) => p.meta_mut(),
            Perturbation::Measure(p) => p.meta_mut(),
        }
    }
}

impl From<NullPerturbation> for Perturbation {
    fn from(p: NullPerturbation) -> Self {
        Perturbation::Null(p)
    }
}

impl From<MeasurePerturbation> for Perturbation {
    fn from(p: MeasurePerturbation) -> Self {
        Perturbation::Measure(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_measure() -> MeasureDescriptor {
        MeasureDescriptor::new("Set Window To Wall Ratio", FileType::Model, FileType::Model)
    }

    #[test]
    fn test_set_argument_raises_invalidating_change() {
        let mut p = MeasurePerturbation::new(window_measure(), vec![Argument::double("wwr")]);
        p.meta_mut().clear_dirty();
        p.meta_mut().take_unreported_change();

        assert!(p.set_argument("wwr", ArgumentValue::Double(0.4)));
        assert!(p.is_dirty());
        assert_eq!(
            p.meta_mut().take_unreported_change(),
            Some(ChangeType::InvalidatesResults)
        );
        assert!(!p.set_argument("missing", ArgumentValue::Double(0.4)));
        assert!(!p.set_argument("wwr", ArgumentValue::Bool(true)));
    }

    #[test]
    fn test_incomplete_arguments() {
        let p = MeasurePerturbation::new(
            window_measure(),
            vec![
                Argument::double("wwr"),
                Argument::double("offset").optional(),
                Argument::double("sill").with_default(ArgumentValue::Double(0.8)),
            ],
        );
        let incomplete: Vec<_> = p.incomplete_arguments().iter().map(|a| a.name()).collect();
        assert_eq!(incomplete, vec!["wwr"]);
    }

    #[test]
    fn test_update_measure_requires_new_version() {
        let measure = window_measure();
        let mut p = MeasurePerturbation::new(measure.clone(), vec![Argument::double("wwr")]);
        assert!(!p.update_measure(&measure, &[], false));
        assert_eq!(p.arguments().len(), 1);

        let other = MeasureDescriptor::new("Other", FileType::Model, FileType::Model);
        assert!(!p.update_measure(&other, &[], false));

        let revised = measure.revised();
        assert!(p.update_measure(&revised, &[Argument::double("offset")], true));
        let names: Vec<_> = p.arguments().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["offset", "wwr"]);
        // Second application of the same revision changes nothing
        assert!(!p.update_measure(&revised, &[], false));
    }

    #[test]
    fn test_selection_toggle() {
        let mut p = Perturbation::null();
        assert!(p.is_selected());
        let version = p.version();
        p.set_selected(true);
        assert_eq!(p.version(), version);
        p.set_selected(false);
        assert!(!p.is_selected());
        assert_ne!(p.version(), version);
    }

    #[test]
    fn test_duplicate_perturbation() {
        let p = Perturbation::measure(window_measure(), vec![Argument::double("wwr")]);
        let copy = p.duplicate();
        assert!(!copy.uuid_equal(&p));
        assert!(copy.is_dirty());
        assert_eq!(copy.declared_types(), p.declared_types());
        assert_ne!(
            copy.as_measure().unwrap().arguments()[0].id(),
            p.as_measure().unwrap().arguments()[0].id()
        );
    }
}
