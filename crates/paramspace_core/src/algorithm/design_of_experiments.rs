use serde::{Deserialize, Serialize};

use super::{Enumeration, enumerate};
use crate::datapoint::DataPoint;
use crate::error::AnalysisError;
use crate::model::{
    AnalysisObject, ChangeType, ObjectMeta, Variable, VariableValue, leaf_analysis_object,
};
use crate::problem::Problem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DesignOfExperimentsKind {
    #[default]
    FullFactorial,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DesignOfExperimentsOptions {
    #[serde(default)]
    pub kind: DesignOfExperimentsKind,
    /// Cap on points created per iteration
    #[serde(default)]
    pub max_points: Option<usize>,
}

/// Design of experiments over the discrete variables
///
/// Full factorial enumerates every combination of selected perturbations, in
/// variable order with the last variable varying fastest. Continuous
/// variables are left unassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignOfExperiments {
    meta: ObjectMeta,
    options: DesignOfExperimentsOptions,
    #[serde(default)]
    iteration: usize,
    #[serde(default)]
    complete: bool,
}

impl DesignOfExperiments {
    pub fn new(options: DesignOfExperimentsOptions) -> Self {
        Self {
            meta: ObjectMeta::new("Design of Experiments"),
            options,
            iteration: 0,
            complete: false,
        }
    }

    pub fn full_factorial() -> Self {
        Self::new(DesignOfExperimentsOptions::default())
    }

    pub fn options(&self) -> &DesignOfExperimentsOptions {
        &self.options
    }

    pub fn set_max_points(&mut self, max_points: Option<usize>) {
        self.options.max_points = max_points;
        self.meta.on_change(ChangeType::Benign);
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
        let axes: Vec<Vec<Option<VariableValue>>> = problem
            .variables()
            .into_iter()
            .map(|variable| match variable {
                Variable::Discrete(v) => (0..v.num_perturbations(false))
                    .filter(|&i| v.perturbation(i).is_some_and(|p| p.is_selected()))
                    .map(|i| Some(VariableValue::Index(i)))
                    .collect(),
                Variable::Continuous(_) => vec![None],
            })
            .collect();

        let discrete = problem
            .variables()
            .iter()
            .filter(|v| !v.is_continuous())
            .count();
        let Enumeration { points, exhausted } = if discrete == 0 {
            Enumeration {
                points: Vec::new(),
                exhausted: true,
            }
        } else {
            enumerate(problem, existing, &axes, self.options.max_points)?
        };

        self.iteration += 1;
        self.complete = exhausted;
        self.meta.on_change(ChangeType::Benign);
        tracing::info!(
            problem = %problem.name(),
            iteration = self.iteration,
            points = points.len(),
            complete = self.complete,
            "design of experiments pass"
        );
        Ok(points)
    }
}

leaf_analysis_object!(DesignOfExperiments);
