use serde::{Deserialize, Serialize};

use super::{Enumeration, enumerate};
use crate::datapoint::DataPoint;
use crate::error::AnalysisError;
use crate::model::{
    AnalysisObject, ChangeType, ObjectMeta, Variable, VariableValue, leaf_analysis_object,
};
use crate::problem::Problem;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Cap on points created per iteration
    #[serde(default)]
    pub max_points: Option<usize>,
}

/// Grid sampling over continuous and discrete variables
///
/// Each continuous variable contributes its evenly spaced sample values;
/// discrete variables contribute their selected perturbations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    meta: ObjectMeta,
    options: SamplingOptions,
    #[serde(default)]
    iteration: usize,
    #[serde(default)]
    complete: bool,
}

impl Sampling {
    pub fn new(options: SamplingOptions) -> Self {
        Self {
            meta: ObjectMeta::new("Sampling"),
            options,
            iteration: 0,
            complete: false,
        }
    }

    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn reset(&mut self) {
        self.iteration = 0;
        self.complete = false;
        self.meta.on_change(ChangeType::Benign);
    }

    pub fn create_next_iteration(
        &mut self,
        problem: &Problem,
        existing: &[DataPoint],
    ) -> Result<Vec<DataPoint>, AnalysisError> {
        let mut axes: Vec<Vec<Option<VariableValue>>> = Vec::new();
        for variable in problem.variables() {
            let axis = match variable {
                Variable::Discrete(v) => (0..v.num_perturbations(false))
                    .filter(|&i| v.perturbation(i).is_some_and(|p| p.is_selected()))
                    .map(|i| Some(VariableValue::Index(i)))
                    .collect(),
                Variable::Continuous(v) => v
                    .sample_values()
                    .ok_or_else(|| AnalysisError::NotSampleable {
                        name: v.name().to_string(),
                        reason: "needs both bounds and a step count or increment within the sample limit",
                    })?
                    .into_iter()
                    .map(|x| Some(VariableValue::Continuous(x)))
                    .collect(),
            };
            axes.push(axis);
        }

        let Enumeration { points, exhausted } =
            enumerate(problem, existing, &axes, self.options.max_points)?;

        self.iteration += 1;
        self.complete = exhausted;
        self.meta.on_change(ChangeType::Benign);
        tracing::info!(
            problem = %problem.name(),
            iteration = self.iteration,
            points = points.len(),
            "sampling pass"
        );
        Ok(points)
    }
}

leaf_analysis_object!(Sampling);
