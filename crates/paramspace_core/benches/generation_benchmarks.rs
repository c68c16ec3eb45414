//! Criterion benchmarks for data point generation
//!
//! Run with: cargo bench -p paramspace_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use paramspace_core::model::{
    Argument, FileType, MeasureDescriptor, Perturbation, Variable, VariableValue,
};
use paramspace_core::{DataPoint, DesignOfExperiments, Problem};

/// `variables` model-stage variables with a null option plus `options`
/// measures each
fn create_problem(variables: usize, options: usize) -> Problem {
    let variables = (0..variables)
        .map(|v| {
            let mut perturbations = vec![Perturbation::null()];
            for o in 0..options {
                perturbations.push(Perturbation::measure(
                    MeasureDescriptor::new(format!("Measure {v}.{o}"), FileType::Model, FileType::Model),
                    vec![Argument::double("value").optional()],
                ));
            }
            Variable::discrete(format!("Variable {v}"), perturbations)
        })
        .collect();
    Problem::new("Benchmark", variables, vec![]).expect("model-only chain is valid")
}

fn bench_full_factorial(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_factorial");

    for variables in [2, 4, 6].iter() {
        let problem = create_problem(*variables, 2);
        let none: &[DataPoint] = &[];
        group.bench_with_input(
            BenchmarkId::new("variables", variables),
            variables,
            |b, _| {
                b.iter(|| {
                    DesignOfExperiments::full_factorial()
                        .create_next_iteration(black_box(&problem), black_box(none))
                })
            },
        );
    }

    group.finish();
}

fn bench_deduplication(c: &mut Criterion) {
    let mut group = c.benchmark_group("deduplication");
    let problem = create_problem(5, 2);

    // Half of the space already exists
    let existing: Vec<DataPoint> = DesignOfExperiments::full_factorial()
        .create_next_iteration(&problem, &[])
        .expect("generation succeeds")
        .into_iter()
        .filter(|p| p.variable_values()[0] == Some(VariableValue::Index(0)))
        .collect();

    group.bench_function("half_known", |b| {
        b.iter(|| {
            DesignOfExperiments::full_factorial()
                .create_next_iteration(black_box(&problem), black_box(&existing))
        })
    });

    group.bench_function("match_partial", |b| {
        let query = [Some(VariableValue::Index(0)), None, Some(VariableValue::Index(1))];
        b.iter(|| {
            existing
                .iter()
                .filter(|p| p.matches(black_box(&query)))
                .count()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_full_factorial, bench_deduplication);
criterion_main!(benches);
