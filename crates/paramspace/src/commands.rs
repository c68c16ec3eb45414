//! Subcommand implementations
//!
//! Each command loads the project, does its work, and re-saves the project
//! only if something in it changed. Human-readable output goes to `out`.

use std::io::Write;
use std::path::Path;

use color_eyre::eyre::{OptionExt, WrapErr, bail, eyre};

use paramspace_core::model::{AnalysisObject, FileReference, FileType, VariableValue};
use paramspace_core::{
    Analysis, DataPoint, DataPointState, DesignOfExperiments, ProblemBuilder, RunOptions,
};

use crate::catalog::MeasureDirectory;
use crate::config::RunConfig;
use crate::executor::ProcessExecutor;
use crate::storage::{DataDirectory, load_project, save_if_dirty, save_project};

/// Parse a `--value` filter of the form `<variable>=<value>`. Integers select
/// a perturbation index; anything with a decimal point or exponent is a
/// continuous value.
pub fn parse_assignment(s: &str) -> Result<(usize, VariableValue), String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <variable>=<value>, got `{s}`"))?;
    let index: usize = index
        .trim()
        .parse()
        .map_err(|_| format!("`{index}` is not a variable index"))?;
    let value = value.trim();
    let value = if value.contains(['.', 'e', 'E']) {
        VariableValue::Continuous(
            value
                .parse()
                .map_err(|_| format!("`{value}` is not a number"))?,
        )
    } else {
        VariableValue::Index(
            value
                .parse()
                .map_err(|_| format!("`{value}` is not a perturbation index"))?,
        )
    };
    Ok((index, value))
}

fn format_value(value: Option<&VariableValue>) -> String {
    match value {
        None => "-".to_string(),
        Some(VariableValue::Index(i)) => i.to_string(),
        Some(VariableValue::Continuous(x)) => format!("{x:.4}"),
    }
}

fn format_point(point: &DataPoint) -> String {
    let values: Vec<String> = point
        .variable_values()
        .iter()
        .map(|v| format_value(v.as_ref()))
        .collect();
    let mut line = format!(
        "{}  {:<9}  [{}]",
        point.id(),
        format!("{:?}", point.state()),
        values.join(", ")
    );
    if !point.response_values().is_empty() {
        let responses: Vec<String> = point
            .response_values()
            .iter()
            .map(|r| format!("{r:.3}"))
            .collect();
        line.push_str(&format!("  -> [{}]", responses.join(", ")));
    }
    let mut tags: Vec<&str> = point.tags().collect();
    if !tags.is_empty() {
        tags.sort_unstable();
        line.push_str(&format!("  #{}", tags.join(" #")));
    }
    line
}

fn stale_hint(analysis: &Analysis, out: &mut impl Write) -> color_eyre::Result<()> {
    if analysis.data_points_are_invalid() {
        writeln!(
            out,
            "results are stale after a problem change; run `paramspace clear` before generating or running"
        )?;
    }
    Ok(())
}

/// Create a new project with an empty problem and a full-factorial algorithm
pub fn init(
    project: &Path,
    name: Option<&str>,
    seed: Option<&Path>,
    out: &mut impl Write,
) -> color_eyre::Result<()> {
    if project.exists() {
        bail!("{} already exists", project.display());
    }
    let name = match name {
        Some(name) => name.to_string(),
        None => project
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_eyre("project path has no file name")?,
    };

    let mut builder = ProblemBuilder::new(name.clone());
    let seed = seed.map(|path| FileReference::new(path, FileType::Model));
    if let Some(seed) = &seed {
        if !seed.exists() {
            tracing::warn!(seed = %seed.path.display(), "seed file does not exist yet");
        }
        builder = builder.seed_type(seed.file_type);
    }
    let problem = builder.build()?;

    let mut analysis = Analysis::new(name, problem, seed);
    analysis.set_algorithm(Some(DesignOfExperiments::full_factorial().into()));
    save_project(project, &analysis)?;
    tracing::info!(project = %project.display(), "created project");
    writeln!(out, "created {}", project.display())?;
    Ok(())
}

/// Print every validation issue; fails if there are any
pub fn validate(project: &Path, out: &mut impl Write) -> color_eyre::Result<()> {
    let analysis = load_project(project)?;
    let issues = analysis.problem().validation_issues();
    for issue in &issues {
        writeln!(out, "{issue}")?;
    }
    if !issues.is_empty() {
        bail!("{} validation issue(s) in {}", issues.len(), project.display());
    }
    writeln!(out, "{} is valid", analysis.problem().name())?;
    Ok(())
}

pub fn generate(project: &Path, out: &mut impl Write) -> color_eyre::Result<()> {
    let mut analysis = load_project(project)?;
    let added = analysis
        .generate()
        .wrap_err_with(|| format!("failed to generate points for {}", analysis.name()))?;
    save_if_dirty(project, &mut analysis)?;
    writeln!(
        out,
        "added {added} data point(s), {} total",
        analysis.data_points().len()
    )?;
    Ok(())
}

/// Run-time overrides for [`run`]
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub command: Option<String>,
    pub max_points: Option<usize>,
}

pub fn run(
    project: &Path,
    data: &DataDirectory,
    config: &RunConfig,
    overrides: RunOverrides,
    out: &mut impl Write,
) -> color_eyre::Result<()> {
    let mut analysis = load_project(project)?;

    let executor = match overrides.command {
        Some(command) => ProcessExecutor::new(command, Vec::new()),
        None => {
            let command = config
                .command
                .clone()
                .ok_or_eyre("no command configured; pass --command or set `command` in config.yaml")?;
            ProcessExecutor::new(command, config.args.clone())
        }
    };

    let mut options = RunOptions::new(data.runs_dir(config).join(analysis.id().to_string()));
    options.max_points = overrides.max_points.or(config.max_points);

    let result = if config.threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .wrap_err("failed to start worker threads")?;
        pool.install(|| analysis.run(&executor, &options, None))
    } else {
        analysis.run(&executor, &options, None)
    };
    let summary = result.wrap_err_with(|| format!("failed to run {}", analysis.name()))?;

    save_if_dirty(project, &mut analysis)?;
    tracing::info!(?summary, "run finished");
    writeln!(
        out,
        "submitted {}: {} succeeded, {} failed, {} abandoned, {} skipped",
        summary.submitted, summary.succeeded, summary.failed, summary.abandoned, summary.skipped
    )?;
    writeln!(out, "outputs in {}", options.output_root.display())?;
    Ok(())
}

/// List the points matching `filter`, one `(variable index, value)` pair per
/// constrained variable
pub fn list(
    project: &Path,
    filter: &[(usize, VariableValue)],
    out: &mut impl Write,
) -> color_eyre::Result<()> {
    let analysis = load_project(project)?;
    let num_variables = analysis.problem().num_variables();

    let mut values: Vec<Option<VariableValue>> = Vec::new();
    for &(index, value) in filter {
        if index >= num_variables {
            return Err(eyre!(
                "variable {index} does not exist; the problem has {num_variables}"
            ));
        }
        if values.len() <= index {
            values.resize(index + 1, None);
        }
        values[index] = Some(value);
    }

    let points = analysis.get_data_points(&values);
    for point in &points {
        writeln!(out, "{}", format_point(point))?;
    }
    writeln!(out, "{} of {} data point(s)", points.len(), analysis.data_points().len())?;
    Ok(())
}

pub fn status(project: &Path, out: &mut impl Write) -> color_eyre::Result<()> {
    let analysis = load_project(project)?;
    let problem = analysis.problem();

    writeln!(out, "analysis:  {}", analysis.name())?;
    writeln!(
        out,
        "problem:   {} ({} variable(s), {} step(s), {} response(s))",
        problem.name(),
        problem.num_variables(),
        problem.workflow().len(),
        problem.num_responses()
    )?;
    let size = problem
        .combinatorial_size(true, false)
        .map_or_else(|| "unbounded".to_string(), |n| n.to_string());
    writeln!(out, "space:     {size} combination(s)")?;
    if let Some(algorithm) = analysis.algorithm() {
        writeln!(
            out,
            "algorithm: iteration {}{}",
            algorithm.iteration(),
            if algorithm.is_complete() { ", complete" } else { "" }
        )?;
    }

    let count = |state: DataPointState| {
        analysis
            .data_points()
            .iter()
            .filter(|p| p.state() == state)
            .count()
    };
    writeln!(
        out,
        "points:    {} total, {} pending, {} running, {} succeeded, {} failed",
        analysis.data_points().len(),
        count(DataPointState::Pending),
        count(DataPointState::Running),
        count(DataPointState::Succeeded),
        count(DataPointState::Failed)
    )?;

    let issues = problem.validation_issues().len();
    if issues > 0 {
        writeln!(out, "{issues} validation issue(s); see `paramspace validate`")?;
    }
    stale_hint(&analysis, out)?;
    Ok(())
}

/// Bring the project's measures up to the revisions in the measures directory
pub fn refresh(
    project: &Path,
    data: &DataDirectory,
    config: &RunConfig,
    keep_old_arguments: bool,
    out: &mut impl Write,
) -> color_eyre::Result<()> {
    let measures_dir = data.measures_dir(config);
    let catalog = MeasureDirectory::load(&measures_dir)?;
    tracing::debug!(measures = catalog.len(), dir = %measures_dir.display(), "loaded catalog");

    let mut analysis = load_project(project)?;
    let revised = analysis.refresh_measures(&catalog, keep_old_arguments);
    save_if_dirty(project, &mut analysis)?;
    writeln!(out, "revised {revised} perturbation(s)")?;
    stale_hint(&analysis, out)?;
    Ok(())
}

/// Return every point to pending and clear the stale-results flag
pub fn clear(project: &Path, out: &mut impl Write) -> color_eyre::Result<()> {
    let mut analysis = load_project(project)?;
    analysis.clear_all_results();
    save_if_dirty(project, &mut analysis)?;
    writeln!(out, "cleared results of {} data point(s)", analysis.data_points().len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_analysis;
    use tempfile::tempdir;

    fn output(command: impl FnOnce(&mut Vec<u8>) -> color_eyre::Result<()>) -> String {
        let mut out = Vec::new();
        command(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn saved_sample(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("envelope.yaml");
        save_project(&path, &sample_analysis()).unwrap();
        path
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("0=1"), Ok((0, VariableValue::Index(1))));
        assert_eq!(
            parse_assignment("2 = 0.25"),
            Ok((2, VariableValue::Continuous(0.25)))
        );
        assert_eq!(
            parse_assignment("1=1e-2"),
            Ok((1, VariableValue::Continuous(0.01)))
        );
        assert!(parse_assignment("0").is_err());
        assert!(parse_assignment("x=1").is_err());
        assert!(parse_assignment("0=-1").is_err());
    }

    #[test]
    fn test_init_creates_loadable_project() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("study.yaml");

        let text = output(|out| init(&path, None, None, out));
        assert!(text.starts_with("created"));

        let analysis = load_project(&path).unwrap();
        assert_eq!(analysis.name(), "study");
        assert!(analysis.algorithm().is_some());
        assert_eq!(analysis.problem().num_variables(), 0);

        let mut sink = Vec::new();
        assert!(init(&path, None, None, &mut sink).is_err());
    }

    #[test]
    fn test_init_with_seed_fixes_seed_type() {
        let dir = tempdir().unwrap();
        let seed = dir.path().join("baseline.osm");
        std::fs::write(&seed, "OS:Version").unwrap();
        let path = dir.path().join("study.yaml");

        output(|out| init(&path, Some("Baseline study"), Some(&seed), out));
        let analysis = load_project(&path).unwrap();
        assert_eq!(analysis.name(), "Baseline study");
        assert_eq!(analysis.problem().seed_file_type(), Some(FileType::Model));
        assert!(analysis.seed().unwrap().is_unchanged());
    }

    #[test]
    fn test_generate_then_list() {
        let dir = tempdir().unwrap();
        let path = saved_sample(dir.path());

        let text = output(|out| generate(&path, out));
        assert_eq!(text, "added 2 data point(s), 2 total\n");
        assert_eq!(load_project(&path).unwrap().data_points().len(), 2);

        // A second pass over a complete design adds nothing
        let text = output(|out| generate(&path, out));
        assert!(text.starts_with("added 0"));

        let text = output(|out| list(&path, &[], out));
        assert!(text.ends_with("2 of 2 data point(s)\n"));

        let text = output(|out| list(&path, &[(0, VariableValue::Index(1))], out));
        assert!(text.contains("[1]"));
        assert!(text.ends_with("1 of 2 data point(s)\n"));

        let mut sink = Vec::new();
        assert!(list(&path, &[(3, VariableValue::Index(0))], &mut sink).is_err());
    }

    #[test]
    fn test_status_reports_counts() {
        let dir = tempdir().unwrap();
        let path = saved_sample(dir.path());
        output(|out| generate(&path, out));

        let text = output(|out| status(&path, out));
        assert!(text.contains("problem:   Envelope (1 variable(s), 1 step(s), 1 response(s))"));
        assert!(text.contains("space:     2 combination(s)"));
        assert!(text.contains("2 total, 2 pending, 0 running, 0 succeeded, 0 failed"));
    }

    #[test]
    fn test_validate_reports_issues() {
        let dir = tempdir().unwrap();
        let path = saved_sample(dir.path());
        let text = output(|out| validate(&path, out));
        assert_eq!(text, "Envelope is valid\n");
    }

    #[test]
    fn test_run_requires_a_command() {
        let dir = tempdir().unwrap();
        let path = saved_sample(dir.path());
        let data = DataDirectory::new(dir.path().join("data"));

        let mut sink = Vec::new();
        let err = run(&path, &data, &RunConfig::default(), RunOverrides::default(), &mut sink)
            .unwrap_err();
        assert!(err.to_string().contains("no command configured"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_configured_command() {
        let dir = tempdir().unwrap();
        let path = saved_sample(dir.path());
        output(|out| generate(&path, out));
        let data = DataDirectory::new(dir.path().join("data"));
        let config = RunConfig {
            command: Some("sh".into()),
            args: vec![
                "-c".into(),
                r#"printf '{"attributes":[{"name":"eui","value":75.5}]}' > result.json"#.into(),
                "paramspace-test".into(),
            ],
            threads: 2,
            ..RunConfig::default()
        };

        let text = output(|out| run(&path, &data, &config, RunOverrides::default(), out));
        assert!(text.starts_with("submitted 2: 2 succeeded, 0 failed"));

        let analysis = load_project(&path).unwrap();
        assert_eq!(analysis.successful_data_points().len(), 2);
        for point in analysis.data_points() {
            assert_eq!(point.response_values(), &[75.5]);
            assert!(point.directory().unwrap().starts_with(dir.path().join("data").join("runs")));
        }

        // Everything ran, so a second run submits nothing
        let text = output(|out| run(&path, &data, &config, RunOverrides::default(), out));
        assert!(text.starts_with("submitted 0"));

        let text = output(|out| clear(&path, out));
        assert_eq!(text, "cleared results of 2 data point(s)\n");
        assert_eq!(load_project(&path).unwrap().incomplete_data_points().len(), 2);
    }

    #[test]
    fn test_refresh_with_empty_catalog() {
        let dir = tempdir().unwrap();
        let path = saved_sample(dir.path());
        let data = DataDirectory::new(dir.path().join("data"));

        let text = output(|out| refresh(&path, &data, &RunConfig::default(), false, out));
        assert_eq!(text, "revised 0 perturbation(s)\n");
    }

    #[test]
    fn test_refresh_applies_catalog_revision() {
        use crate::catalog::MeasureEntry;
        use paramspace_core::model::{Argument, Variable};

        let dir = tempdir().unwrap();
        let path = saved_sample(dir.path());
        let data = DataDirectory::new(dir.path().join("data"));
        let config = RunConfig::default();

        let analysis = load_project(&path).unwrap();
        let Some(Variable::Discrete(roof)) = analysis.problem().variable(0) else {
            panic!("sample has a discrete roof variable");
        };
        let descriptor = roof
            .perturbation(1)
            .and_then(|p| p.as_measure())
            .unwrap()
            .measure()
            .clone();

        let measures_dir = data.measures_dir(&config);
        std::fs::create_dir_all(&measures_dir).unwrap();
        let entry = MeasureEntry {
            measure: descriptor.revised(),
            arguments: vec![Argument::double("r_value")],
        };
        std::fs::write(
            measures_dir.join("roof.yaml"),
            serde_saphyr::to_string(&entry).unwrap(),
        )
        .unwrap();

        let text = output(|out| refresh(&path, &data, &config, false, out));
        assert_eq!(text, "revised 1 perturbation(s)\n");

        let reloaded = load_project(&path).unwrap();
        assert_eq!(
            reloaded.problem().measures()[0].version,
            entry.measure.version
        );
        // The new required argument has no value yet
        let mut sink = Vec::new();
        assert!(validate(&path, &mut sink).is_err());
        assert!(String::from_utf8(sink).unwrap().contains("r_value"));
    }
}
