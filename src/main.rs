// Spacecheck - CPU/GPU execution-space checks for cppcheck dumps
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Spacecheck CLI
//!
//! Execution- and memory-space checks for Kokkos/DDC projects.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use spacecheck::analyzer::RunContext;
use spacecheck::config::AnalysisConfig;
use spacecheck::driver::{self, Driver, DriverError, Frontend, SourceWatcher};
use spacecheck::error::Severity;
use spacecheck::report::ConsoleReporter;

/// Exit status when the tool itself could not run.
const TOOL_FAILURE: u8 = 5;

/// Spacecheck - CPU/GPU execution-space checks for cppcheck dumps
#[derive(Parser, Debug)]
#[command(name = "spacecheck")]
#[command(version)]
#[command(about = "CPU/GPU execution-space checks for Kokkos projects, over cppcheck dumps")]
#[command(long_about = r#"
Spacecheck runs cppcheck over the sources of a Kokkos/DDC project, grouped
by geometry, and checks the dumps for memory used from the wrong execution
space, class members used on the GPU without capture, dangling owning
fields and other GPU portability mistakes.

Exit status: 0 when no finding reaches the fail level, otherwise
1 (warning), 2 (style), 3 (error) or 4 (fatal) for the worst finding.
5 means the tool could not run.

Example usage:
  spacecheck
  spacecheck src/advection/bsl_advection.hpp
  spacecheck --no-frontend --fail-level fatal
  spacecheck --dump build/a.cpp.dump build/geometry.hpp.dump
  spacecheck src/geometryXY/geometry.hpp --watch
"#)]
struct Cli {
    /// Restrict the run to these sources and the groups holding them
    files: Vec<PathBuf>,

    /// Project root holding the project folders
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the cppcheck binary (searched in PATH if not specified)
    #[arg(long)]
    cppcheck: Option<PathBuf>,

    /// Reuse the dumps already next to the sources instead of running cppcheck
    #[arg(long)]
    no_frontend: bool,

    /// Check these dumps as one group, without discovery or cppcheck
    #[arg(long = "dump", value_name = "FILE", num_args = 1.., conflicts_with = "files")]
    dumps: Vec<PathBuf>,

    /// Lowest severity which fails the run
    #[arg(long, value_enum)]
    fail_level: Option<Severity>,

    /// Show findings with their source lines
    #[arg(long)]
    pretty: bool,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Re-run whenever a checked file changes
    #[arg(short, long)]
    watch: bool,
}

/// What a run checks.
enum Target<'a> {
    Dumps(Vec<PathBuf>),
    Project(Driver<'a>),
}

impl Target<'_> {
    fn run(&self, config: &AnalysisConfig, pretty: bool, fail_level: Severity) -> Result<u8, DriverError> {
        let mut run = RunContext::with_reporter(Box::new(ConsoleReporter::new(pretty)));
        match self {
            Target::Dumps(dumps) => driver::analyze_dumps(dumps, config, &mut run)?,
            Target::Project(driver) => driver.run(&mut run)?,
        }
        run.finish();
        Ok(run.exit_status(fail_level))
    }

    fn watched_paths(&self) -> Result<Vec<PathBuf>, DriverError> {
        match self {
            Target::Dumps(dumps) => Ok(dumps.clone()),
            Target::Project(driver) => driver.watched_paths(),
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn target<'a>(cli: &Cli, config: &'a AnalysisConfig) -> Result<Target<'a>, DriverError> {
    if !cli.dumps.is_empty() {
        return Ok(Target::Dumps(cli.dumps.clone()));
    }
    let mut driver = Driver::new(config, &cli.root)?.with_filter(&cli.files);
    if !cli.no_frontend {
        let frontend = Frontend::locate(cli.cppcheck.as_deref(), config, driver.root())?;
        driver = driver.with_frontend(frontend);
    }
    Ok(Target::Project(driver))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => match AnalysisConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(TOOL_FAILURE);
            }
        },
        None => AnalysisConfig::default(),
    };
    let fail_level = cli.fail_level.unwrap_or(config.fail_level);

    let target = match target(&cli, &config) {
        Ok(target) => target,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(TOOL_FAILURE);
        }
    };

    let status = match target.run(&config, cli.pretty, fail_level) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(TOOL_FAILURE);
        }
    };

    if cli.watch {
        return run_watch_loop(&target, &config, cli.pretty, fail_level);
    }
    ExitCode::from(status)
}

/// Re-run the whole check on every change, each time with a fresh run.
fn run_watch_loop(target: &Target<'_>, config: &AnalysisConfig, pretty: bool, fail_level: Severity) -> ExitCode {
    let watcher = match target.watched_paths().and_then(|paths| SourceWatcher::new(&paths)) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: Failed to create file watcher: {}", e);
            return ExitCode::from(TOOL_FAILURE);
        }
    };

    println!();
    println!(
        "Watching {} files for changes... (Press Ctrl+C to stop)",
        watcher.paths().len()
    );

    loop {
        if let Err(e) = watcher.wait_for_change() {
            eprintln!("Watch error: {}", e);
            continue;
        }

        println!();
        println!("Change detected, checking again...");
        if let Err(e) = target.run(config, pretty, fail_level) {
            eprintln!("Error: {}", e);
        }
        println!("Watching for changes...");
    }
}
