//! Shared fixtures

use crate::model::{
    Argument, FileType, MeasureDescriptor, MeasurePerturbation, Perturbation, Variable,
};

/// A measure perturbation with the given file types and no arguments
pub fn measure(name: &str, input: FileType, output: FileType) -> Perturbation {
    Perturbation::measure(MeasureDescriptor::new(name, input, output), vec![])
}

/// Edits the building model in place
pub fn model_measure(name: &str) -> Perturbation {
    measure(name, FileType::Model, FileType::Model)
}

/// Edits the simulation input in place
pub fn workspace_measure(name: &str) -> Perturbation {
    measure(name, FileType::Workspace, FileType::Workspace)
}

/// Converts a model into simulation input
pub fn translating_measure(name: &str) -> Perturbation {
    measure(name, FileType::Model, FileType::Workspace)
}

/// A window-to-wall ratio measure with one required double argument
pub fn wwr_perturbation(descriptor: &MeasureDescriptor) -> MeasurePerturbation {
    MeasurePerturbation::new(descriptor.clone(), vec![Argument::double("wwr")])
}

/// `{2, 1, 2}` perturbations over three model variables
pub fn two_one_two() -> Vec<Variable> {
    vec![
        Variable::discrete("roof", vec![Perturbation::null(), model_measure("Roof R-30")]),
        Variable::discrete("lighting", vec![model_measure("LED Retrofit")]),
        Variable::discrete("windows", vec![Perturbation::null(), model_measure("Low-E Glazing")]),
    ]
}
