use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use paramspace::commands::{self, RunOverrides};
use paramspace::init_logging;
use paramspace::storage::DataDirectory;
use paramspace_core::model::VariableValue;

#[derive(Parser, Debug)]
#[command(name = "paramspace")]
#[command(about = "Define, generate and run parametric design studies")]
struct Args {
    /// Path to the data directory (default: ~/.paramspace/)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a project with an empty problem
    Init {
        project: PathBuf,
        /// Analysis name (default: the file name)
        #[arg(long)]
        name: Option<String>,
        /// Model file every data point starts from
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Check the workflow chain and measure arguments
    Validate { project: PathBuf },
    /// Generate the next batch of data points
    Generate { project: PathBuf },
    /// Execute pending data points
    Run {
        project: PathBuf,
        /// Program run once per point (overrides config.yaml)
        #[arg(long)]
        command: Option<String>,
        #[arg(long)]
        max_points: Option<usize>,
    },
    /// List data points, optionally filtered by variable values
    List {
        project: PathBuf,
        /// `<variable>=<value>`; integers pick a perturbation, decimals a
        /// continuous value
        #[arg(long = "value", value_parser = commands::parse_assignment)]
        values: Vec<(usize, VariableValue)>,
    },
    /// Summarize the project and its points
    Status { project: PathBuf },
    /// Update measures to the revisions in the measures directory
    Refresh {
        project: PathBuf,
        /// Keep arguments the new revision no longer declares
        #[arg(long)]
        keep_old_arguments: bool,
    },
    /// Discard all results and return every point to pending
    Clear { project: PathBuf },
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data = DataDirectory::new(args.data_dir.unwrap_or_else(DataDirectory::default_path));
    data.init()?;
    init_logging(data.root(), &args.log_level)?;
    let config = data.load_config()?;

    let mut out = io::stdout().lock();
    match args.command {
        Command::Init {
            project,
            name,
            seed,
        } => commands::init(&project, name.as_deref(), seed.as_deref(), &mut out),
        Command::Validate { project } => commands::validate(&project, &mut out),
        Command::Generate { project } => commands::generate(&project, &mut out),
        Command::Run {
            project,
            command,
            max_points,
        } => commands::run(
            &project,
            &data,
            &config,
            RunOverrides {
                command,
                max_points,
            },
            &mut out,
        ),
        Command::List { project, values } => commands::list(&project, &values, &mut out),
        Command::Status { project } => commands::status(&project, &mut out),
        Command::Refresh {
            project,
            keep_old_arguments,
        } => commands::refresh(&project, &data, &config, keep_old_arguments, &mut out),
        Command::Clear { project } => commands::clear(&project, &mut out),
    }
}
