//! Runs each data point through an external program
//!
//! For every point the executor writes `request.json` into the point's output
//! directory and runs the configured command with the request path as its
//! last argument. The program reports back by writing `result.json` into the
//! same directory:
//!
//! ```json
//! {
//!   "files": [{ "path": "run/eplusout.sql", "file_type": "Output" }],
//!   "attributes": [{ "name": "eui", "value": 112.5, "units": "kBtu/ft2" }]
//! }
//! ```
//!
//! Relative file paths are resolved against the output directory. A non-zero
//! exit status fails the point with the tail of stderr as the diagnostic.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use paramspace_core::execution::ResolvedStep;
use paramspace_core::model::{AnalysisObject, Attribute, FileReference, FileType, ObjectId, VariableValue};
use paramspace_core::{ExecutionOutcome, ExecutionRequest, Executor};

pub const REQUEST_FILE: &str = "request.json";
pub const RESULT_FILE: &str = "result.json";

/// Lines of stderr kept in a failure diagnostic
const DIAGNOSTIC_LINES: usize = 20;

#[derive(Debug, Serialize)]
struct RequestFile<'a> {
    problem: &'a str,
    point: ObjectId,
    values: &'a [Option<VariableValue>],
    seed: Option<&'a FileReference>,
    output_dir: &'a Path,
    steps: Vec<RequestStep<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RequestStep<'a> {
    Measure {
        name: &'a str,
        directory: Option<&'a Path>,
        input_type: FileType,
        output_type: FileType,
        arguments: BTreeMap<&'a str, String>,
    },
    Job {
        name: &'a str,
        input_type: FileType,
        output_type: FileType,
    },
}

impl<'a> RequestStep<'a> {
    fn from_resolved(step: &'a ResolvedStep) -> Self {
        match step {
            ResolvedStep::Measure(measure) => RequestStep::Measure {
                name: &measure.measure().name,
                directory: measure.measure().directory.as_deref(),
                input_type: measure.input_type(),
                output_type: measure.output_type(),
                arguments: measure
                    .arguments()
                    .iter()
                    .map(|a| (a.name(), a.print_value(true)))
                    .collect(),
            },
            ResolvedStep::Job(job) => RequestStep::Job {
                name: job.name(),
                input_type: job.input_type(),
                output_type: job.output_type(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultFile {
    files: Vec<ResultFileEntry>,
    attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
struct ResultFileEntry {
    path: PathBuf,
    file_type: FileType,
}

/// Executes data points by spawning a program per point
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn write_request(&self, request: &ExecutionRequest<'_>) -> Result<PathBuf, String> {
        let body = RequestFile {
            problem: request.problem.name(),
            point: request.point_id,
            values: &request.values,
            seed: request.seed,
            output_dir: &request.output_dir,
            steps: request.workflow.iter().map(RequestStep::from_resolved).collect(),
        };
        let json = serde_json::to_string_pretty(&body)
            .map_err(|e| format!("failed to encode request: {e}"))?;
        let path = request.output_dir.join(REQUEST_FILE);
        fs::write(&path, json).map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        Ok(path)
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionOutcome {
        let request_path = match self.write_request(request) {
            Ok(path) => path,
            Err(diagnostic) => {
                return ExecutionOutcome::Failure {
                    files: Vec::new(),
                    diagnostic,
                };
            }
        };

        tracing::debug!(point = %request.point_id, program = %self.program, "starting process");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&request_path)
            .current_dir(&request.output_dir)
            .env("PARAMSPACE_REQUEST", &request_path)
            .env("PARAMSPACE_OUTPUT_DIR", &request.output_dir)
            .env("PARAMSPACE_POINT_ID", request.point_id.to_string())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return ExecutionOutcome::Failure {
                    files: Vec::new(),
                    diagnostic: format!("failed to start {}: {e}", self.program),
                };
            }
        };

        let result = read_result(&request.output_dir);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut diagnostic = format!("{} exited with {}", self.program, output.status);
            let tail = tail_lines(&stderr, DIAGNOSTIC_LINES);
            if !tail.is_empty() {
                diagnostic.push('\n');
                diagnostic.push_str(&tail);
            }
            return ExecutionOutcome::Failure {
                files: result.map(|r| r.files).unwrap_or_default(),
                diagnostic,
            };
        }

        match result {
            Ok(ReportedResult { files, attributes }) => {
                ExecutionOutcome::Success { files, attributes }
            }
            Err(diagnostic) => ExecutionOutcome::Failure {
                files: Vec::new(),
                diagnostic,
            },
        }
    }
}

struct ReportedResult {
    files: Vec<FileReference>,
    attributes: Vec<Attribute>,
}

fn read_result(output_dir: &Path) -> Result<ReportedResult, String> {
    let path = output_dir.join(RESULT_FILE);
    let content = fs::read_to_string(&path)
        .map_err(|e| format!("no result reported ({}: {e})", path.display()))?;
    let result: ResultFile = serde_json::from_str(&content)
        .map_err(|e| format!("malformed {}: {e}", path.display()))?;

    let files = result
        .files
        .into_iter()
        .map(|entry| {
            let path = if entry.path.is_absolute() {
                entry.path
            } else {
                output_dir.join(entry.path)
            };
            FileReference::new(path, entry.file_type)
        })
        .collect();
    Ok(ReportedResult {
        files,
        attributes: result.attributes,
    })
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
