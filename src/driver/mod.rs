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

//! Run orchestration.
//!
//! The driver finds the project sources, groups them by geometry, has the
//! front end dump each group and feeds the dumps through the analyzer.
//!
//! # Groups
//!
//! - `geometry*` directories directly under a project folder form one group
//!   per name, shared between the project folders
//! - the multipatch folder is submitted one file at a time
//! - remaining files of the other project folders form the `general` group
//! - remaining files of the first project folder (the library) join every
//!   group

pub mod frontend;
pub mod watcher;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analyzer::{self, RunContext};
use crate::config::{AnalysisConfig, ConfigError};
use crate::dump::{dump_path_for, source_path_for, TranslationUnit};
use crate::error::{CheckId, Finding, Severity};

pub use frontend::{find_cppcheck, Frontend, FrontendOutcome};
pub use watcher::SourceWatcher;

/// Name of the group of test and simulation files outside any geometry.
pub const GENERAL_GROUP: &str = "general";

/// Prefix of the directories holding a geometry.
const GEOMETRY_PREFIX: &str = "geometry";

/// Extensions of the files submitted to the front end.
const SOURCE_EXTENSIONS: &[&str] = &["hpp", "cpp"];

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cppcheck not found. Install cppcheck or specify the path with --cppcheck")]
    FrontEndNotFound,

    #[error("Failed to start cppcheck: {0}")]
    FrontEndFailed(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("File watch error: {0}")]
    Watch(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Sources analysed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub name: String,
    /// Sorted source paths.
    pub files: Vec<PathBuf>,
    /// Submit each file to the front end on its own.
    pub one_at_a_time: bool,
}

impl FileGroup {
    /// Whether the group holds one of `filter`. An empty filter selects
    /// every group.
    pub fn is_selected(&self, filter: &[PathBuf]) -> bool {
        filter.is_empty() || self.files.iter().any(|f| filter.contains(f))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> DriverError + '_ {
    move |source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

/// Every source under `dir`, sorted. A missing directory has none.
pub fn find_sources(dir: &Path) -> Result<Vec<PathBuf>, DriverError> {
    let mut found = Vec::new();
    if dir.is_dir() {
        collect_sources(dir, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn collect_sources(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), DriverError> {
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_dir() {
            collect_sources(&path, found)?;
        } else if is_source(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// `geometry*` directories directly under `dir`, by name.
fn geometry_folders(dir: &Path) -> Result<Vec<(String, PathBuf)>, DriverError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut folders = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() && name.starts_with(GEOMETRY_PREFIX) {
            folders.push((name.to_string(), path.clone()));
        }
    }
    folders.sort();
    Ok(folders)
}

/// Split the sources of one project folder between its geometries. Returns
/// the files outside any geometry.
fn assign_geometries(
    folder: &Path,
    mut files: Vec<PathBuf>,
    groups: &mut BTreeMap<String, BTreeSet<PathBuf>>,
) -> Result<Vec<PathBuf>, DriverError> {
    for (name, geometry) in geometry_folders(folder)? {
        let (inside, outside): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|f| f.starts_with(&geometry));
        groups.entry(name).or_default().extend(inside);
        files = outside;
    }
    Ok(files)
}

/// Group the sources beneath `root`.
pub fn discover_groups(root: &Path, config: &AnalysisConfig) -> Result<Vec<FileGroup>, DriverError> {
    let multipatch = root.join(&config.multipatch_folder);
    let mut groups: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut shared = Vec::new();

    for (i, folder) in config.project_folders.iter().enumerate() {
        let folder = root.join(folder);
        let files: Vec<PathBuf> = find_sources(&folder)?
            .into_iter()
            .filter(|f| !f.starts_with(&multipatch))
            .collect();
        let remaining = assign_geometries(&folder, files, &mut groups)?;
        if i == 0 {
            shared = remaining;
        } else {
            groups
                .entry(GENERAL_GROUP.to_string())
                .or_default()
                .extend(remaining);
        }
    }
    if groups.is_empty() && !shared.is_empty() {
        groups.entry(GENERAL_GROUP.to_string()).or_default();
    }

    let mut result = Vec::with_capacity(groups.len() + 1);
    let patches = find_sources(&multipatch)?;
    if !patches.is_empty() {
        result.push(FileGroup {
            name: "multipatch".to_string(),
            files: patches,
            one_at_a_time: true,
        });
    }
    for (name, mut files) in groups {
        files.extend(shared.iter().cloned());
        result.push(FileGroup {
            name,
            files: files.into_iter().collect(),
            one_at_a_time: false,
        });
    }
    debug!(groups = result.len(), shared = shared.len(), "discovered sources");
    Ok(result)
}

/// Load dumps. A dump which cannot be read becomes a structural finding for
/// its source and the others are still loaded.
pub fn load_units(dumps: &[PathBuf], run: &mut RunContext) -> Vec<TranslationUnit> {
    let mut units = Vec::with_capacity(dumps.len());
    for dump in dumps {
        match TranslationUnit::load(dump) {
            Ok(unit) => units.push(unit),
            Err(error) => {
                warn!(dump = %dump.display(), %error, "dump skipped");
                run.report(Finding::new(
                    CheckId::Structural,
                    Severity::Style,
                    source_path_for(dump),
                    0,
                    error.to_string(),
                ));
            }
        }
    }
    units
}

/// Analyse already produced dumps as a single group.
pub fn analyze_dumps(
    dumps: &[PathBuf],
    config: &AnalysisConfig,
    run: &mut RunContext,
) -> Result<(), DriverError> {
    let mut units = load_units(dumps, run);
    info!(units = units.len(), "analysing dumps");
    analyzer::analyze_group(&mut units, config, run)?;
    Ok(())
}

/// Full project run: discovery, front end, analysis.
pub struct Driver<'a> {
    config: &'a AnalysisConfig,
    root: PathBuf,
    filter: Vec<PathBuf>,
    frontend: Option<Frontend>,
}

impl<'a> Driver<'a> {
    /// A driver over the project at `root` which reuses the dumps already on
    /// disk until a front end is set.
    pub fn new(config: &'a AnalysisConfig, root: &Path) -> Result<Self, DriverError> {
        let root = root.canonicalize().map_err(io_error(root))?;
        Ok(Self {
            config,
            root,
            filter: Vec::new(),
            frontend: None,
        })
    }

    /// Restrict the run to the groups holding `files`, and the audit to
    /// `files` themselves.
    pub fn with_filter(mut self, files: &[PathBuf]) -> Self {
        self.filter = files
            .iter()
            .map(|f| {
                let path = if f.is_absolute() {
                    f.clone()
                } else {
                    self.root.join(f)
                };
                path.canonicalize().unwrap_or(path)
            })
            .collect();
        self
    }

    pub fn with_frontend(mut self, frontend: Frontend) -> Self {
        debug!(program = %frontend.program().display(), "front end");
        self.frontend = Some(frontend);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The groups this run submits.
    pub fn selected_groups(&self) -> Result<Vec<FileGroup>, DriverError> {
        let mut groups = discover_groups(&self.root, self.config)?;
        for group in groups.iter_mut().filter(|g| g.one_at_a_time) {
            group.files.retain(|f| self.filter.is_empty() || self.filter.contains(f));
        }
        groups.retain(|g| !g.files.is_empty() && g.is_selected(&self.filter));
        Ok(groups)
    }

    /// Sources a watch loop reacts to.
    pub fn watched_paths(&self) -> Result<Vec<PathBuf>, DriverError> {
        if !self.filter.is_empty() {
            return Ok(self.filter.iter().filter(|f| f.exists()).cloned().collect());
        }
        let files: BTreeSet<PathBuf> = discover_groups(&self.root, self.config)?
            .into_iter()
            .flat_map(|g| g.files)
            .collect();
        Ok(files.into_iter().collect())
    }

    /// Check every selected group, reporting into `run`.
    ///
    /// A group whose front end exits non-zero still has its dumps checked.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or the front end cannot run at
    /// all. Dumps that fail to load are reported as findings instead.
    pub fn run(&self, run: &mut RunContext) -> Result<(), DriverError> {
        for group in self.selected_groups()? {
            if group.one_at_a_time {
                for file in &group.files {
                    self.run_group(&group.name, std::slice::from_ref(file), run)?;
                }
            } else {
                self.run_group(&group.name, &group.files, run)?;
            }
        }
        Ok(())
    }

    fn run_group(&self, name: &str, files: &[PathBuf], run: &mut RunContext) -> Result<(), DriverError> {
        info!(group = name, files = files.len(), "checking group");

        if let Some(frontend) = &self.frontend {
            let outcome = frontend.run(files, &self.filter)?;
            if !outcome.success() {
                let code = outcome
                    .code
                    .map_or_else(|| "a signal".to_string(), |c| c.to_string());
                let mut finding = Finding::new(
                    CheckId::FrontEndFailure,
                    Severity::Style,
                    files.first().map_or(self.root.as_path(), PathBuf::as_path),
                    0,
                    format!("cppcheck exited with {code} while checking group {name}"),
                );
                if let Some(error) = outcome.last_error {
                    finding = finding.with_hint(error);
                }
                run.report(finding);
            }
        }

        let dumps: Vec<PathBuf> = files
            .iter()
            .map(|f| dump_path_for(f))
            .filter(|d| {
                let present = d.is_file();
                if !present {
                    debug!(dump = %d.display(), "no dump");
                }
                present
            })
            .collect();
        let mut units = load_units(&dumps, run);

        let context = analyzer::prepare_group(&units, self.config)?;
        for unit in units.iter_mut() {
            if !self.filter.is_empty() && !self.filter.contains(&unit.path) {
                continue;
            }
            if !run.claim(&unit.path) {
                debug!(file = %unit.path.display(), "already audited");
                continue;
            }
            info!(file = %unit.path.display(), "auditing");
            analyzer::audit_unit(unit, self.config, &context, run);
        }
        Ok(())
    }
}
