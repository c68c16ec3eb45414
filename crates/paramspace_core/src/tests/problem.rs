//! Tests for problem construction and file-type compatibility

use super::support::{measure, model_measure, translating_measure, workspace_measure};
use crate::error::{CompatibilityError, ProblemError};
use crate::model::{
    AnalysisObject, FileType, FunctionTerm, JobType, LinearFunction, ObjectId, Perturbation,
    Variable,
};
use crate::problem::{IssueKind, Problem, ProblemBuilder};

fn three_stage_problem() -> Problem {
    Problem::new(
        "Three stage",
        vec![
            Variable::discrete(
                "Model tweaks",
                vec![
                    Perturbation::null(),
                    model_measure("Roof R-30"),
                    model_measure("Wall R-20"),
                ],
            ),
            Variable::discrete("Translation", vec![translating_measure("Forward Translate")]),
            Variable::discrete(
                "Workspace tweaks",
                vec![Perturbation::null(), workspace_measure("Set Schedules")],
            ),
        ],
        vec![],
    )
    .unwrap()
}

#[test]
fn test_problem_constructor() {
    let problem = three_stage_problem();
    assert_eq!(problem.num_variables(), 3);
    assert_eq!(problem.workflow().len(), 3);
    assert_eq!(problem.combinatorial_size(false, true), Some(6));
    assert_eq!(problem.combinatorial_size(false, false), Some(6));
    assert!(problem.validation_issues().is_empty());
    for variable in problem.variables() {
        assert!(variable.parent().is_some());
    }
}

#[test]
fn test_model_then_workspace_variable_is_invalid() {
    let err = Problem::new(
        "Invalid",
        vec![
            Variable::discrete("Var1", vec![Perturbation::null(), model_measure("Roof")]),
            Variable::discrete("Var2", vec![Perturbation::null(), workspace_measure("Schedules")]),
        ],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        err,
        ProblemError::IncompatibleFileTypes {
            step: 1,
            name: "Var2".into(),
            expected: FileType::Workspace,
            found: FileType::Model,
        }
    );
}

#[test]
fn test_workspace_variable_then_simulate() {
    let variable = Variable::discrete(
        "Schedules",
        vec![Perturbation::null(), workspace_measure("Set Schedules")],
    );

    let valid = Problem::new("Valid", vec![variable.clone()], vec![JobType::Simulate]).unwrap();
    assert_eq!(valid.combinatorial_size(false, true), Some(2));
    assert_eq!(valid.workflow().len(), 2);

    let err = Problem::new(
        "Invalid",
        vec![variable],
        vec![JobType::Translate, JobType::Simulate],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ProblemError::IncompatibleFileTypes {
            step: 1,
            expected: FileType::Model,
            found: FileType::Workspace,
            ..
        }
    ));
}

#[test]
fn test_seed_type_constrains_first_step() {
    let err = ProblemBuilder::new("Seeded")
        .seed_type(FileType::Workspace)
        .variable(Variable::discrete("Roof", vec![model_measure("Roof R-30")]))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ProblemError::IncompatibleFileTypes { step: 0, .. }
    ));
}

#[test]
fn test_perturbations_through_problem_handle() {
    let mut problem = three_stage_problem();

    {
        let mut first = problem.variable_mut(0).unwrap();
        // Wrong stage for this slot
        assert!(!first.push(workspace_measure("Set Schedules")));
        assert!(first.push(model_measure("Window R-5")));
    }
    assert_eq!(problem.combinatorial_size(false, true), Some(8));

    {
        let mut translation = problem.variable_mut(1).unwrap();
        assert!(translation.push(translating_measure("Alternate Translate")));
        // A null perturbation cannot sit beside a type-changing one
        assert!(!translation.push(Perturbation::null()));
        // Must keep feeding the workspace stage
        assert!(!translation.push(model_measure("Roof R-30")));
    }
    assert_eq!(problem.combinatorial_size(false, true), Some(16));
}

#[test]
fn test_file_types_are_compatible() {
    let problem = three_stage_problem();
    let translation = problem.variable(1).unwrap().id();
    let last = problem.variable(2).unwrap().id();

    assert!(problem.file_types_are_compatible(
        translation,
        FileType::Model,
        Some(FileType::Workspace)
    ));
    assert!(problem.file_types_are_compatible(
        last,
        FileType::Workspace,
        Some(FileType::Workspace)
    ));
    // Pass-through output
    assert!(problem.file_types_are_compatible(last, FileType::Workspace, None));
    assert!(!problem.file_types_are_compatible(last, FileType::Model, Some(FileType::Model)));
    assert!(!problem.file_types_are_compatible(
        ObjectId::new(),
        FileType::Model,
        Some(FileType::Model)
    ));

    let first = problem.variable(0).unwrap().id();
    assert!(matches!(
        problem.check_compatibility(first, FileType::Model, Some(FileType::Workspace)),
        Err(CompatibilityError::DownstreamMismatch { .. })
    ));
    assert!(matches!(
        problem.check_compatibility(last, FileType::Model, None),
        Err(CompatibilityError::UpstreamMismatch { .. })
    ));
}

#[test]
fn test_null_only_variable_does_not_change_compatibility() {
    let mut problem = Problem::new(
        "p",
        vec![Variable::discrete("Translation", vec![translating_measure("Translate")])],
        vec![JobType::Simulate],
    )
    .unwrap();

    let step_ids: Vec<ObjectId> = problem.workflow().iter().map(|s| s.id()).collect();
    let outputs = [None, Some(FileType::Model), Some(FileType::Workspace), Some(FileType::Output)];
    let snapshot = |problem: &Problem| {
        let mut results = Vec::new();
        for &id in &step_ids {
            for input in FileType::ALL {
                for output in outputs {
                    results.push(problem.file_types_are_compatible(id, input, output));
                }
            }
        }
        results
    };

    let before = snapshot(&problem);
    problem
        .insert_variable(0, Variable::discrete("Nothing", vec![Perturbation::null()]))
        .unwrap();
    problem
        .push_variable(Variable::discrete("Still nothing", vec![Perturbation::null()]))
        .unwrap();
    assert_eq!(snapshot(&problem), before);
}

#[test]
fn test_variable_insertion_position() {
    let mut problem = Problem::new(
        "p",
        vec![Variable::discrete("Roof", vec![model_measure("Roof R-30")])],
        vec![JobType::Translate],
    )
    .unwrap();
    problem
        .push_variable(Variable::discrete("Walls", vec![Perturbation::null()]))
        .unwrap();
    assert_eq!(problem.workflow()[1].label(), "Walls");
    assert!(problem.workflow()[2].as_job().is_some());

    let mut jobs_only = Problem::new("jobs", vec![], vec![JobType::Translate]).unwrap();
    jobs_only
        .push_variable(Variable::discrete("Roof", vec![model_measure("Roof R-30")]))
        .unwrap();
    assert!(jobs_only.workflow()[0].is_variable());

    assert_eq!(
        jobs_only.insert_variable(5, Variable::discrete("x", vec![])),
        Err(ProblemError::IndexOutOfRange { index: 5, len: 1 })
    );
}

#[test]
fn test_rejected_edits_leave_problem_unchanged() {
    let mut problem = Problem::new(
        "p",
        vec![
            Variable::discrete("Roof", vec![model_measure("Roof R-30")]),
            Variable::discrete("Translation", vec![translating_measure("Translate")]),
        ],
        vec![JobType::Simulate],
    )
    .unwrap();
    let version = problem.version();

    let translation = problem.variable(1).unwrap().id();
    assert!(problem.erase_variable(translation).is_err());
    assert!(
        problem
            .push_variable(Variable::discrete("Schedules", vec![model_measure("Wrong stage")]))
            .is_err()
    );
    assert_eq!(problem.num_variables(), 2);
    assert_eq!(problem.version(), version);

    let walls = Variable::discrete("Walls", vec![Perturbation::null()]);
    problem.insert_variable(0, walls.clone()).unwrap();
    assert_eq!(
        problem.push_variable(walls.clone()),
        Err(ProblemError::DuplicateObject(walls.id()))
    );
    let removed = problem.erase_variable(walls.id()).unwrap();
    assert!(removed.parent().is_none());
}

#[test]
fn test_empty_variable_allowed_and_reported() {
    let mut problem = Problem::new(
        "p",
        vec![Variable::discrete("Roof", vec![model_measure("Roof R-30")])],
        vec![],
    )
    .unwrap();
    let only = problem.variable(0).unwrap().as_discrete().unwrap().perturbation(0).unwrap().id();
    assert!(problem.variable_mut(0).unwrap().erase(only));
    assert_eq!(problem.combinatorial_size(false, true), Some(0));
    assert_eq!(problem.validation_issues().len(), 1);
}

#[test]
fn test_duplicate_remaps_responses() {
    let roof = Variable::discrete("Roof", vec![Perturbation::null(), model_measure("Roof R-30")]);
    let roof_id = roof.id();
    let response = LinearFunction::new("cost", vec![FunctionTerm::Input(roof_id)], vec![]).unwrap();
    let problem = ProblemBuilder::new("p")
        .variable(roof)
        .response(response)
        .build()
        .unwrap();

    let copy = problem.duplicate();
    assert!(!copy.uuid_equal(&problem));
    assert!(copy.is_dirty());
    assert_eq!(copy.name(), problem.name());
    assert_eq!(copy.combinatorial_size(false, true), problem.combinatorial_size(false, true));

    let copied_roof = copy.variable(0).unwrap();
    assert_ne!(copied_roof.id(), roof_id);
    assert_eq!(copied_roof.name(), "Roof");
    assert_eq!(
        copy.responses()[0].terms(),
        &[FunctionTerm::Input(copied_roof.id())]
    );
}

#[test]
fn test_perturbation_edit_that_breaks_chain_is_undone() {
    let mut problem = three_stage_problem();
    let version = problem.version();

    let err = problem
        .variable_mut(0)
        .unwrap()
        .edit_perturbation(1, |p| *p = measure("Report", FileType::Output, FileType::Report))
        .unwrap_err();
    assert!(matches!(
        err,
        ProblemError::InconsistentVariable { .. } | ProblemError::IncompatibleFileTypes { .. }
    ));
    assert_eq!(problem.version(), version);
    assert!(problem.validation_issues().is_empty());
    let kept = problem.variable(0).unwrap().as_discrete().unwrap().perturbation(1).unwrap();
    assert_eq!(kept.name(), "Roof R-30");

    assert_eq!(
        problem.variable_mut(0).unwrap().edit_perturbation(5, |p| p.set_selected(false)),
        Err(ProblemError::IndexOutOfRange { index: 5, len: 3 })
    );
    problem
        .variable_mut(0)
        .unwrap()
        .edit_perturbation(1, |p| p.set_selected(false))
        .unwrap();
    assert_ne!(problem.version(), version);

    let discrete = problem.variable(0).unwrap().id();
    assert_eq!(
        problem.variable_mut(0).unwrap().edit_continuous(|v| v.set_n_steps(Some(3))),
        Err(ProblemError::NotContinuous(discrete))
    );
}

#[test]
fn test_erasing_bridging_perturbation_rejected() {
    let mut problem = Problem::new(
        "p",
        vec![
            Variable::discrete("Roof", vec![model_measure("Roof R-30")]),
            Variable::discrete("Translation", vec![translating_measure("Translate")]),
        ],
        vec![JobType::Simulate],
    )
    .unwrap();
    let only = problem.variable(1).unwrap().as_discrete().unwrap().perturbation(0).unwrap().id();
    assert!(!problem.variable_mut(1).unwrap().erase(only));
    assert_eq!(problem.variable(1).unwrap().num_perturbations(false), 1);
    assert!(problem.validation_issues().is_empty());
}

#[test]
fn test_variable_read_by_response_cannot_be_erased() {
    let roof = Variable::discrete("Roof", vec![Perturbation::null(), model_measure("Roof R-30")]);
    let roof_id = roof.id();
    let cost = LinearFunction::new("cost", vec![FunctionTerm::Input(roof_id)], vec![]).unwrap();
    let cost_id = cost.id();
    let mut problem = ProblemBuilder::new("p")
        .variable(roof)
        .response(cost)
        .build()
        .unwrap();

    assert_eq!(
        problem.erase_variable(roof_id),
        Err(ProblemError::VariableInUse {
            variable: roof_id,
            function: "cost".into()
        })
    );
    assert_eq!(problem.num_variables(), 1);

    assert!(problem.erase_response(cost_id));
    assert!(problem.erase_variable(roof_id).is_ok());
}

#[test]
fn test_response_reading_unknown_variable_reported() {
    let mut problem = Problem::new(
        "p",
        vec![Variable::discrete("Roof", vec![model_measure("Roof R-30")])],
        vec![],
    )
    .unwrap();
    let missing = ObjectId::new();
    problem
        .push_response(
            LinearFunction::new("cost", vec![FunctionTerm::Input(missing)], vec![]).unwrap(),
        )
        .unwrap();

    let issues = problem.validation_issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].name, "cost");
    assert_eq!(issues[0].kind, IssueKind::UnknownInput(missing));
}
