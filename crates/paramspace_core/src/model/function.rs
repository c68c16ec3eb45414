//! Response functions evaluated per data point

use serde::{Deserialize, Serialize};

use super::attribute::find_attribute;
use super::ids::ObjectId;
use super::object::{ChangeType, ObjectMeta, leaf_analysis_object};
use super::variable::VariableValue;
use crate::datapoint::DataPoint;
use crate::error::ProblemError;
use crate::problem::Problem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionTerm {
    /// The value assigned to a problem variable, by variable id
    Input(ObjectId),
    /// A numeric attribute reported in the data point's outputs
    OutputAttribute { name: String },
}

/// `sum(c_i * x_i)` over its terms; all coefficients are 1 when none are set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFunction {
    meta: ObjectMeta,
    terms: Vec<FunctionTerm>,
    #[serde(default)]
    coefficients: Vec<f64>,
}

impl LinearFunction {
    pub fn new(
        name: impl Into<String>,
        terms: Vec<FunctionTerm>,
        coefficients: Vec<f64>,
    ) -> Result<Self, ProblemError> {
        check_coefficients(terms.len(), coefficients.len())?;
        Ok(Self {
            meta: ObjectMeta::new(name),
            terms,
            coefficients,
        })
    }

    pub fn from_parts(meta: ObjectMeta, terms: Vec<FunctionTerm>, coefficients: Vec<f64>) -> Self {
        Self {
            meta,
            terms,
            coefficients,
        }
    }

    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            meta: self.meta.duplicate(),
            ..self.clone()
        }
    }

    pub fn terms(&self) -> &[FunctionTerm] {
        &self.terms
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// False if the count is neither zero nor one per term
    pub fn set_coefficients(&mut self, coefficients: Vec<f64>) -> bool {
        if check_coefficients(self.terms.len(), coefficients.len()).is_err() {
            return false;
        }
        self.coefficients = coefficients;
        self.meta.on_change(ChangeType::InvalidatesResults);
        true
    }

    /// Variable ids read by `Input` terms
    pub fn input_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.terms.iter().filter_map(|term| match term {
            FunctionTerm::Input(id) => Some(*id),
            FunctionTerm::OutputAttribute { .. } => None,
        })
    }

    pub(crate) fn remap_inputs(&mut self, remap: impl Fn(ObjectId) -> ObjectId) {
        for term in &mut self.terms {
            if let FunctionTerm::Input(id) = term {
                *id = remap(*id);
            }
        }
    }

    /// Evaluate for one data point. `None` if any term has no numeric value.
    pub fn get_value(&self, point: &DataPoint, problem: &Problem) -> Option<f64> {
        let attributes = point.output_attributes();
        self.terms
            .iter()
            .enumerate()
            .map(|(i, term)| {
                let x = match term {
                    FunctionTerm::Input(id) => {
                        let index = problem.variable_index(*id)?;
                        match point.variable_values().get(index).copied().flatten()? {
                            VariableValue::Index(n) => n as f64,
                            VariableValue::Continuous(v) => v,
                        }
                    }
                    FunctionTerm::OutputAttribute { name } => {
                        find_attribute(attributes, name)?.value.as_f64()?
                    }
                };
                Some(self.coefficients.get(i).copied().unwrap_or(1.0) * x)
            })
            .sum()
    }
}

leaf_analysis_object!(LinearFunction);

fn check_coefficients(terms: usize, coefficients: usize) -> Result<(), ProblemError> {
    if coefficients == 0 || coefficients == terms {
        Ok(())
    } else {
        Err(ProblemError::InvalidCoefficients {
            terms,
            coefficients,
        })
    }
}
