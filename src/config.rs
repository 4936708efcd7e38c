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

//! Analysis configuration.
//!
//! Every vocabulary the checks rely on (launch markers, field type families,
//! memory-space names, shared headers) lives here so that project-specific
//! special cases are data rather than code. A TOML file may override any
//! subset of the defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::Severity;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid owning_return_pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Configuration shared by every stage of the analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Markers declaring a function compiled for the device.
    pub device_function_markers: Vec<String>,
    /// Markers introducing a device lambda.
    pub device_lambda_markers: Vec<String>,
    /// Markers introducing a device lambda which captures the enclosing class.
    pub class_lambda_markers: Vec<String>,
    /// Any other declaration-prefix token starting with this string is a device marker.
    pub device_marker_prefix: String,

    /// Type names whose variables carry a memory space.
    pub field_families: Vec<String>,
    /// Substring identifying owning types (`FieldMem`, `DFieldMemX`, ...).
    pub owning_marker: String,
    /// Pattern over a space-joined return type identifying owning handles.
    pub owning_return_pattern: String,

    /// Wrappers forcing the host space (`host_t<...>`).
    pub host_wrappers: Vec<String>,
    /// Names implying device memory.
    pub device_space_markers: Vec<String>,
    /// Names implying host memory.
    pub host_space_markers: Vec<String>,

    /// Functions creating host/device mirrors of a field.
    pub mirror_functions: Vec<String>,
    /// Functions launching a kernel from a lambda.
    pub dispatch_functions: Vec<String>,
    /// Names tolerated after `std::` in device code.
    pub device_safe_std: Vec<String>,

    /// Headers whose aliases are merged into every file including them.
    pub shared_headers: Vec<String>,
    /// Files where Host-scope access mismatches are downgraded to warnings.
    pub host_mismatch_downgrade_files: Vec<String>,

    /// Worst severity at or above which a run fails.
    pub fail_level: Severity,
    /// Project folders searched for sources.
    pub project_folders: Vec<String>,
    /// Folder whose files are submitted to the front end one at a time.
    pub multipatch_folder: String,
    /// Arguments passed to the front end before the file list.
    pub frontend_args: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            device_function_markers: strings(&[
                "KOKKOS_FUNCTION",
                "KOKKOS_INLINE_FUNCTION",
                "KOKKOS_FORCEINLINE_FUNCTION",
                "KOKKOS_DEFAULTED_FUNCTION",
            ]),
            device_lambda_markers: strings(&["KOKKOS_LAMBDA"]),
            class_lambda_markers: strings(&["KOKKOS_CLASS_LAMBDA"]),
            device_marker_prefix: "KOKKOS_".to_string(),
            field_families: strings(&[
                "FieldMem",
                "DFieldMem",
                "VectorFieldMem",
                "DVectorFieldMem",
                "Field",
                "DField",
                "ConstField",
                "DConstField",
                "VectorField",
                "DVectorField",
                "VectorConstField",
                "DVectorConstField",
                "DiscreteToCartesian",
            ]),
            owning_marker: "Mem".to_string(),
            owning_return_pattern: r"\b(ddc\s*::\s*Chunk|\w*FieldMem)\b".to_string(),
            host_wrappers: strings(&["host_t"]),
            device_space_markers: strings(&[
                "DefaultExecutionSpace",
                "CudaSpace",
                "HIPSpace",
                "SYCLDeviceUSMSpace",
                "DeviceAllocator",
            ]),
            host_space_markers: strings(&[
                "DefaultHostExecutionSpace",
                "HostSpace",
                "HostAllocator",
            ]),
            mirror_functions: strings(&[
                "create_mirror",
                "create_mirror_and_copy",
                "create_mirror_view",
                "create_mirror_view_and_copy",
            ]),
            dispatch_functions: strings(&[
                "parallel_for_each",
                "parallel_for",
                "parallel_reduce",
                "parallel_transform_reduce",
                "parallel_scan",
            ]),
            device_safe_std: strings(&[
                "size_t",
                "array",
                "integral_constant",
                "index_sequence",
                "make_index_sequence",
                "is_same_v",
                "is_same",
                "enable_if_t",
                "conditional_t",
                "remove_cv_t",
                "remove_reference_t",
                "decay_t",
                "tuple_size_v",
                "numeric_limits",
            ]),
            shared_headers: strings(&["geometry.hpp", "species_info.hpp", "geometry_mp.hpp"]),
            host_mismatch_downgrade_files: strings(&["species_info.hpp"]),
            fail_level: Severity::Error,
            project_folders: strings(&["src", "simulations", "tests"]),
            multipatch_folder: "tests/multipatch".to_string(),
            frontend_args: strings(&[
                "--dump",
                "--library=googletest",
                "--check-level=exhaustive",
                "--enable=style",
                "--std=c++17",
                "--max-ctu-depth=5",
                "--suppress=unusedStructMember",
            ]),
        }
    }
}

impl AnalysisConfig {
    /// Parse a configuration from TOML text; missing keys keep their defaults.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.owning_return_regex()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Compile the owning return-type pattern.
    pub fn owning_return_regex(&self) -> Result<regex::Regex, regex::Error> {
        regex::Regex::new(&self.owning_return_pattern)
    }

    /// Whether `text` is a field family name.
    pub fn is_field_family(&self, text: &str) -> bool {
        self.field_families.iter().any(|f| f == text)
    }

    /// Whether `path` is listed in the downgrade exception list.
    pub fn downgrades_host_mismatch(&self, path: &Path) -> bool {
        self.host_mismatch_downgrade_files
            .iter()
            .any(|name| path.ends_with(name))
    }
}
