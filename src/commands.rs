//! The command line interface for the dispatch engine.
use crate::input::read_scenario;
use crate::log;
use crate::output::{DataWriter, create_output_directory, get_output_dir};
use crate::settings::Settings;
use crate::simulation::{self, NoRevision};
use crate::solver::ClarabelSolver;
use ::log::info;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// The command line interface for the dispatch engine.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Commands,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Solve a dispatch scenario and write the schedule to CSV files.
    Run {
        /// Path to the scenario file.
        scenario_file: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a scenario without solving it.
    Validate {
        /// Path to the scenario file.
        scenario_file: PathBuf,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run {
                scenario_file,
                opts,
            } => handle_run_command(&scenario_file, &opts, None),
            Self::Validate { scenario_file } => handle_validate_command(&scenario_file),
        }
    }
}

/// Parse CLI arguments and dispatch to the selected command
pub fn run_cli() -> Result<()> {
    Cli::parse().command.execute()
}

/// Handle the `run` command.
pub fn handle_run_command(
    scenario_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings from the scenario's directory, if not provided
    let settings = match settings {
        Some(settings) => settings,
        None => {
            let dir = scenario_path.parent().unwrap_or(Path::new("."));
            Settings::load(dir).context("Failed to load settings.")?
        }
    };

    if !log::is_logger_initialised() {
        log::init(settings.log_level.as_deref()).context("Failed to initialise logging.")?;
    }

    let scenario = read_scenario(scenario_path).context("Failed to load scenario.")?;
    info!("Scenario loaded successfully.");

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = match opts.output_dir.as_deref() {
        Some(path) => path,
        None => {
            pathbuf = get_output_dir(scenario_path)?;
            &pathbuf
        }
    };
    create_output_directory(output_path).context("Failed to create output directory.")?;

    let schedule = simulation::run(scenario, &ClarabelSolver, &mut NoRevision, &settings)?;

    let mut writer = DataWriter::create(output_path)?;
    writer.write_schedule(&schedule)?;
    writer.flush()?;
    info!("Schedule written to {}", output_path.display());

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(scenario_path: &Path) -> Result<()> {
    if !log::is_logger_initialised() {
        log::init(None).context("Failed to initialise logging.")?;
    }

    let scenario = read_scenario(scenario_path)?;
    info!(
        "Scenario is valid: {} intervals, {} generator(s), {} storage unit(s)",
        scenario.time.steps,
        scenario.generators.len(),
        scenario.storage.len()
    );

    Ok(())
}
