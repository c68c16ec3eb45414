//! Discrete and continuous input variables

use serde::{Deserialize, Serialize};

use super::argument::Argument;
use super::ids::ObjectId;
use super::object::{AnalysisObject, ChangeType, ObjectMeta};
use super::perturbation::{MeasureDescriptor, MeasurePerturbation, Perturbation};
use super::workflow::FileType;

/// Value a data point assigns to one variable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VariableValue {
    /// Index into a discrete variable's perturbations
    Index(usize),
    Continuous(f64),
}

impl VariableValue {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            VariableValue::Index(i) => Some(*i),
            VariableValue::Continuous(_) => None,
        }
    }
}

/// A variable with an ordered list of mutually exclusive perturbations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteVariable {
    meta: ObjectMeta,
    perturbations: Vec<Perturbation>,
}

impl DiscreteVariable {
    /// Build a variable, skipping perturbations that break its type rules
    pub fn new(name: impl Into<String>, perturbations: Vec<Perturbation>) -> Self {
        let mut variable = Self {
            meta: ObjectMeta::new(name),
            perturbations: Vec::with_capacity(perturbations.len()),
        };
        for p in perturbations {
            if !variable.push(p) {
                tracing::warn!(variable = %variable.meta.name(), "perturbation skipped");
            }
        }
        variable.meta.take_unreported_change();
        variable
    }

    pub fn from_parts(meta: ObjectMeta, perturbations: Vec<Perturbation>) -> Self {
        let mut variable = Self {
            meta,
            perturbations,
        };
        variable.adopt_children();
        variable
    }

    #[must_use]
    pub fn duplicate(&self) -> Self {
        let mut copy = Self {
            meta: self.meta.duplicate(),
            perturbations: self.perturbations.iter().map(Perturbation::duplicate).collect(),
        };
        copy.adopt_children();
        copy
    }

    pub(crate) fn adopt_children(&mut self) {
        let id = self.meta.id();
        for p in &mut self.perturbations {
            p.meta_mut().set_parent(id);
        }
    }

    pub(crate) fn absorb_children(&mut self) {
        for p in &mut self.perturbations {
            self.meta.absorb(p.meta_mut());
        }
    }

    pub fn num_perturbations(&self, selected_only: bool) -> usize {
        self.perturbations
            .iter()
            .filter(|p| !selected_only || p.is_selected())
            .count()
    }

    pub fn perturbations(&self, selected_only: bool) -> Vec<&Perturbation> {
        self.perturbations
            .iter()
            .filter(|p| !selected_only || p.is_selected())
            .collect()
    }

    pub fn perturbation(&self, index: usize) -> Option<&Perturbation> {
        self.perturbations.get(index)
    }

    pub fn perturbation_index(&self, id: ObjectId) -> Option<usize> {
        self.perturbations.iter().position(|p| p.id() == id)
    }

    pub fn has_null_perturbation(&self) -> bool {
        self.perturbations.iter().any(Perturbation::is_null)
    }

    /// Shared `(input, output)` of the non-null perturbations, or `None` if
    /// the variable is empty or holds only null perturbations
    pub fn declared_types(&self) -> Option<(FileType, FileType)> {
        self.perturbations.iter().find_map(Perturbation::declared_types)
    }

    /// Whether `candidate` satisfies this variable's own type rules
    pub fn accepts(&self, candidate: &Perturbation) -> bool {
        if self.perturbation_index(candidate.id()).is_some() {
            return false;
        }
        match candidate.declared_types() {
            None => self
                .perturbations
                .iter()
                .filter_map(Perturbation::declared_types)
                .all(|(input, output)| input == output),
            Some((input, output)) => {
                let siblings_agree = self
                    .declared_types()
                    .is_none_or(|existing| existing == (input, output));
                siblings_agree && (input == output || !self.has_null_perturbation())
            }
        }
    }

    /// Append a perturbation. False (and no change) if rejected.
    pub fn push(&mut self, perturbation: Perturbation) -> bool {
        let index = self.perturbations.len();
        self.insert(index, perturbation)
    }

    pub fn insert(&mut self, index: usize, mut perturbation: Perturbation) -> bool {
        if index > self.perturbations.len() || !self.accepts(&perturbation) {
            return false;
        }
        perturbation.meta_mut().set_parent(self.meta.id());
        perturbation.meta_mut().take_unreported_change();
        self.perturbations.insert(index, perturbation);
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    /// Remove by identity. Removing the last perturbation is allowed.
    pub fn erase(&mut self, id: ObjectId) -> bool {
        let Some(index) = self.perturbation_index(id) else {
            return false;
        };
        let mut removed = self.perturbations.remove(index);
        removed.meta_mut().clear_parent();
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    pub fn swap(&mut self, a: ObjectId, b: ObjectId) -> bool {
        let (Some(i), Some(j)) = (self.perturbation_index(a), self.perturbation_index(b)) else {
            return false;
        };
        if i != j {
            self.perturbations.swap(i, j);
            self.meta.on_change(ChangeType::InvalidatesResults);
        }
        true
    }

    /// Edit one perturbation in place; its change is re-raised on the
    /// variable before returning.
    pub fn edit_perturbation<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut Perturbation) -> R,
    ) -> Option<R> {
        let perturbation = self.perturbations.get_mut(index)?;
        let result = edit(perturbation);
        self.meta.absorb(perturbation.meta_mut());
        Some(result)
    }

    /// `None` matches a single-perturbation variable; otherwise an in-range
    /// index is required.
    pub fn matches(&self, value: Option<&VariableValue>) -> bool {
        match value {
            None => self.perturbations.len() == 1,
            Some(VariableValue::Index(i)) => *i < self.perturbations.len(),
            Some(VariableValue::Continuous(_)) => false,
        }
    }

    pub fn update_measure(
        &mut self,
        measure: &MeasureDescriptor,
        arguments: &[Argument],
        keep_old_arguments: bool,
    ) -> usize {
        let mut revised = 0;
        for p in &mut self.perturbations {
            if let Perturbation::Measure(m) = p
                && m.update_measure(measure, arguments, keep_old_arguments)
            {
                revised += 1;
                self.meta.absorb(m.meta_mut());
            }
        }
        revised
    }
}

impl AnalysisObject for DiscreteVariable {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn clear_dirty_flag(&mut self) {
        self.meta.clear_dirty();
        for p in &mut self.perturbations {
            p.clear_dirty_flag();
        }
    }
}

/// What a continuous variable's value is applied to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContinuousTransform {
    /// Sets `argument` of the wrapped measure perturbation
    MeasureArgument {
        perturbation: MeasurePerturbation,
        argument: String,
    },
}

/// Upper bound on the sample points one continuous variable produces
pub const MAX_CONTINUOUS_SAMPLES: usize = 100_000;

/// A numeric range applied through a transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousVariable {
    meta: ObjectMeta,
    minimum: Option<f64>,
    maximum: Option<f64>,
    increment: Option<f64>,
    n_steps: Option<usize>,
    transform: ContinuousTransform,
}

impl ContinuousVariable {
    pub fn new(name: impl Into<String>, transform: ContinuousTransform) -> Self {
        let mut variable = Self {
            meta: ObjectMeta::new(name),
            minimum: None,
            maximum: None,
            increment: None,
            n_steps: None,
            transform,
        };
        variable.adopt_children();
        variable
    }

    pub fn measure_argument(
        name: impl Into<String>,
        perturbation: MeasurePerturbation,
        argument: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ContinuousTransform::MeasureArgument {
                perturbation,
                argument: argument.into(),
            },
        )
    }

    #[must_use]
    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    #[must_use]
    pub fn with_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = Some(n_steps);
        self
    }

    #[must_use]
    pub fn with_increment(mut self, increment: f64) -> Self {
        self.increment = Some(increment);
        self
    }

    #[must_use]
    pub fn duplicate(&self) -> Self {
        let transform = match &self.transform {
            ContinuousTransform::MeasureArgument {
                perturbation,
                argument,
            } => {
                let mut copy = perturbation.clone();
                *copy.meta_mut() = perturbation.meta().duplicate();
                ContinuousTransform::MeasureArgument {
                    perturbation: copy,
                    argument: argument.clone(),
                }
            }
        };
        let mut copy = Self {
            meta: self.meta.duplicate(),
            transform,
            ..self.clone()
        };
        copy.adopt_children();
        copy
    }

    pub(crate) fn adopt_children(&mut self) {
        let id = self.meta.id();
        let ContinuousTransform::MeasureArgument { perturbation, .. } = &mut self.transform;
        perturbation.meta_mut().set_parent(id);
    }

    pub(crate) fn absorb_children(&mut self) {
        let ContinuousTransform::MeasureArgument { perturbation, .. } = &mut self.transform;
        self.meta.absorb(perturbation.meta_mut());
    }

    pub fn minimum(&self) -> Option<f64> {
        self.minimum
    }

    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    pub fn increment(&self) -> Option<f64> {
        self.increment
    }

    pub fn n_steps(&self) -> Option<usize> {
        self.n_steps
    }

    pub fn transform(&self) -> &ContinuousTransform {
        &self.transform
    }

    pub fn measure_perturbation(&self) -> &MeasurePerturbation {
        let ContinuousTransform::MeasureArgument { perturbation, .. } = &self.transform;
        perturbation
    }

    pub fn argument_name(&self) -> &str {
        let ContinuousTransform::MeasureArgument { argument, .. } = &self.transform;
        argument
    }

    pub fn declared_types(&self) -> Option<(FileType, FileType)> {
        let p = self.measure_perturbation();
        Some((p.input_type(), p.output_type()))
    }

    /// Rejected if it would exceed the maximum
    pub fn set_minimum(&mut self, minimum: Option<f64>) -> bool {
        if let (Some(min), Some(max)) = (minimum, self.maximum)
            && min > max
        {
            return false;
        }
        self.minimum = minimum;
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    /// Rejected if it would fall below the minimum
    pub fn set_maximum(&mut self, maximum: Option<f64>) -> bool {
        if let (Some(min), Some(max)) = (self.minimum, maximum)
            && min > max
        {
            return false;
        }
        self.maximum = maximum;
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    pub fn set_increment(&mut self, increment: Option<f64>) -> bool {
        if increment.is_some_and(|inc| inc <= 0.0) {
            return false;
        }
        self.increment = increment;
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    pub fn set_n_steps(&mut self, n_steps: Option<usize>) -> bool {
        if n_steps == Some(0) {
            return false;
        }
        self.n_steps = n_steps;
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    /// Evenly spaced sample points over `[minimum, maximum]`
    ///
    /// Needs both bounds and either `n_steps` (takes precedence) or a
    /// positive `increment`. `None` as well when that would give more than
    /// [`MAX_CONTINUOUS_SAMPLES`] points.
    pub fn sample_values(&self) -> Option<Vec<f64>> {
        let (min, max) = (self.minimum?, self.maximum?);
        if let Some(n) = self.n_steps {
            if n > MAX_CONTINUOUS_SAMPLES {
                return None;
            }
            return Some(match n {
                0 => Vec::new(),
                1 => vec![min],
                n => {
                    let step = (max - min) / (n - 1) as f64;
                    (0..n).map(|i| min + step * i as f64).collect()
                }
            });
        }
        let inc = self.increment.filter(|inc| *inc > 0.0)?;
        let intervals = ((max - min) / inc + 1e-9).floor();
        if !intervals.is_finite() || intervals >= MAX_CONTINUOUS_SAMPLES as f64 {
            return None;
        }
        let count = intervals as usize + 1;
        Some((0..count).map(|i| min + inc * i as f64).collect())
    }

    /// `None` always matches; a continuous value must lie within the bounds
    pub fn matches(&self, value: Option<&VariableValue>) -> bool {
        match value {
            None => true,
            Some(VariableValue::Continuous(x)) => {
                self.minimum.is_none_or(|min| *x >= min) && self.maximum.is_none_or(|max| *x <= max)
            }
            Some(VariableValue::Index(_)) => false,
        }
    }

    /// Edit the wrapped perturbation; its change is re-raised on the variable
    pub fn edit_perturbation<R>(&mut self, edit: impl FnOnce(&mut MeasurePerturbation) -> R) -> R {
        let ContinuousTransform::MeasureArgument { perturbation, .. } = &mut self.transform;
        let result = edit(perturbation);
        self.meta.absorb(perturbation.meta_mut());
        result
    }

    pub fn update_measure(
        &mut self,
        measure: &MeasureDescriptor,
        arguments: &[Argument],
        keep_old_arguments: bool,
    ) -> usize {
        let ContinuousTransform::MeasureArgument { perturbation, .. } = &mut self.transform;
        if perturbation.update_measure(measure, arguments, keep_old_arguments) {
            self.meta.absorb(perturbation.meta_mut());
            1
        } else {
            0
        }
    }
}

impl AnalysisObject for ContinuousVariable {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn clear_dirty_flag(&mut self) {
        self.meta.clear_dirty();
        let ContinuousTransform::MeasureArgument { perturbation, .. } = &mut self.transform;
        perturbation.clear_dirty_flag();
    }
}

/// An input variable of a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    Discrete(DiscreteVariable),
    Continuous(ContinuousVariable),
}

impl Variable {
    pub fn discrete(name: impl Into<String>, perturbations: Vec<Perturbation>) -> Self {
        Variable::Discrete(DiscreteVariable::new(name, perturbations))
    }

    pub fn as_discrete(&self) -> Option<&DiscreteVariable> {
        match self {
            Variable::Discrete(v) => Some(v),
            Variable::Continuous(_) => None,
        }
    }

    pub fn as_continuous(&self) -> Option<&ContinuousVariable> {
        match self {
            Variable::Continuous(v) => Some(v),
            Variable::Discrete(_) => None,
        }
    }

    pub(crate) fn as_discrete_mut(&mut self) -> Option<&mut DiscreteVariable> {
        match self {
            Variable::Discrete(v) => Some(v),
            Variable::Continuous(_) => None,
        }
    }

    pub(crate) fn as_continuous_mut(&mut self) -> Option<&mut ContinuousVariable> {
        match self {
            Variable::Continuous(v) => Some(v),
            Variable::Discrete(_) => None,
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, Variable::Continuous(_))
    }

    pub fn declared_types(&self) -> Option<(FileType, FileType)> {
        match self {
            Variable::Discrete(v) => v.declared_types(),
            Variable::Continuous(v) => v.declared_types(),
        }
    }

    /// Perturbation count of a discrete variable, 0 for continuous
    pub fn num_perturbations(&self, selected_only: bool) -> usize {
        self.as_discrete()
            .map_or(0, |v| v.num_perturbations(selected_only))
    }

    pub fn matches(&self, value: Option<&VariableValue>) -> bool {
        match self {
            Variable::Discrete(v) => v.matches(value),
            Variable::Continuous(v) => v.matches(value),
        }
    }

    /// Whether two values select the same option of this variable. A
    /// missing value and index 0 coincide when there is only one option.
    pub fn values_equivalent(&self, a: Option<&VariableValue>, b: Option<&VariableValue>) -> bool {
        let normalize = |v: Option<&VariableValue>| match (v, self) {
            (None, Variable::Discrete(d)) if d.num_perturbations(false) == 1 => {
                Some(VariableValue::Index(0))
            }
            (v, _) => v.copied(),
        };
        normalize(a) == normalize(b)
    }

    pub fn update_measure(
        &mut self,
        measure: &MeasureDescriptor,
        arguments: &[Argument],
        keep_old_arguments: bool,
    ) -> usize {
        match self {
            Variable::Discrete(v) => v.update_measure(measure, arguments, keep_old_arguments),
            Variable::Continuous(v) => v.update_measure(measure, arguments, keep_old_arguments),
        }
    }

    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Variable::Discrete(v) => Variable::Discrete(v.duplicate()),
            Variable::Continuous(v) => Variable::Continuous(v.duplicate()),
        }
    }

    pub(crate) fn adopt_children(&mut self) {
        match self {
            Variable::Discrete(v) => v.adopt_children(),
            Variable::Continuous(v) => v.adopt_children(),
        }
    }

    pub(crate) fn absorb_children(&mut self) {
        match self {
            Variable::Discrete(v) => v.absorb_children(),
            Variable::Continuous(v) => v.absorb_children(),
        }
    }
}

impl AnalysisObject for Variable {
    fn meta(&self) -> &ObjectMeta {
        match self {
            Variable::Discrete(v) => v.meta(),
            Variable::Continuous(v) => v.meta(),
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Variable::Discrete(v) => v.meta_mut(),
            Variable::Continuous(v) => v.meta_mut(),
        }
    }

    fn clear_dirty_flag(&mut self) {
        match self {
            Variable::Discrete(v) => v.clear_dirty_flag(),
            Variable::Continuous(v) => v.clear_dirty_flag(),
        }
    }
}

impl From<DiscreteVariable> for Variable {
    fn from(v: DiscreteVariable) -> Self {
        Variable::Discrete(v)
    }
}

impl From<ContinuousVariable> for Variable {
    fn from(v: ContinuousVariable) -> Self {
        Variable::Continuous(v)
    }
}
