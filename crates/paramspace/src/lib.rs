//! Command-line front end for paramspace studies
//!
//! Projects are YAML files holding one analysis. The data directory keeps the
//! run configuration, the log, the measure catalog and per-point run output.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod executor;
pub mod logging;
pub mod storage;
pub mod util;

pub use logging::init_logging;

#[cfg(test)]
pub(crate) mod test_support {
    use paramspace_core::model::{
        FileType, FunctionTerm, LinearFunction, MeasureDescriptor, Perturbation, Variable,
    };
    use paramspace_core::{Analysis, DesignOfExperiments, ProblemBuilder};

    /// One roof variable (null, R-30) and an `eui` response, with a
    /// full-factorial algorithm and no points yet
    pub fn sample_analysis() -> Analysis {
        let roof = MeasureDescriptor::new("Roof R-30", FileType::Model, FileType::Model);
        let problem = ProblemBuilder::new("Envelope")
            .variable(Variable::discrete(
                "roof",
                vec![Perturbation::null(), Perturbation::measure(roof, vec![])],
            ))
            .response(
                LinearFunction::new(
                    "eui",
                    vec![FunctionTerm::OutputAttribute { name: "eui".into() }],
                    vec![],
                )
                .unwrap(),
            )
            .build()
            .unwrap();
        let mut analysis = Analysis::new("Envelope", problem, None);
        analysis.set_algorithm(Some(DesignOfExperiments::full_factorial().into()));
        analysis
    }
}
