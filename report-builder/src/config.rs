// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for [`ReportBuilder`](crate::ReportBuilder).
//!
//! Configuration is read from a `[report-builder]` table in a TOML document:
//!
//! ```toml
//! [report-builder]
//! trailing-package-name = "unknown"
//! reopen-ended-tests = true
//! benchmark-output = "package"
//! ```
//!
//! Every key is optional.

use crate::errors::{ConfigParseError, ConfigReadError};
use camino::Utf8Path;
use serde::Deserialize;
use std::fmt;

/// The name given to the package created by the implicit flush in
/// [`ReportBuilder::build`](crate::ReportBuilder::build).
pub const DEFAULT_TRAILING_PACKAGE_NAME: &str = "unknown";

/// Configuration for a [`ReportBuilder`](crate::ReportBuilder).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BuilderConfig {
    /// The name of the synthetic package created when `build` finds tests or benchmarks that were
    /// never flushed by a package boundary.
    pub trailing_package_name: String,

    /// Whether an end event may re-close a test that already ended, if no open test with the
    /// same name exists.
    pub reopen_ended_tests: bool,

    /// Where output lines go while the most recently touched entity is a benchmark.
    pub benchmark_output: BenchmarkOutput,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            trailing_package_name: DEFAULT_TRAILING_PACKAGE_NAME.to_owned(),
            reopen_ended_tests: true,
            benchmark_output: BenchmarkOutput::default(),
        }
    }
}

impl BuilderConfig {
    /// Parses configuration from the `[report-builder]` table of a TOML document.
    ///
    /// A document without that table yields the default configuration. `config_file` is only
    /// used for error reporting.
    pub fn from_toml_str(
        config_file: impl AsRef<Utf8Path>,
        contents: &str,
    ) -> Result<Self, ConfigParseError> {
        let document: ConfigDocument = toml::from_str(contents)
            .map_err(|err| ConfigParseError::new(config_file.as_ref(), err))?;
        Ok(document.report_builder)
    }

    /// Reads and parses configuration from a TOML file.
    pub fn from_path(config_file: impl AsRef<Utf8Path>) -> Result<Self, ConfigReadError> {
        let config_file = config_file.as_ref();
        let contents =
            std::fs::read_to_string(config_file).map_err(|error| ConfigReadError::Fs {
                file: config_file.to_owned(),
                error,
            })?;
        Ok(Self::from_toml_str(config_file, &contents)?)
    }
}

/// Where to route output lines received while a benchmark is the most recently touched entity.
///
/// Benchmarks are immutable once recorded, so such lines can never be attached to them.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkOutput {
    /// Append the line to the package-level output.
    #[default]
    Package,

    /// Discard the line.
    Drop,
}

impl fmt::Display for BenchmarkOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => write!(f, "package"),
            Self::Drop => write!(f, "drop"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigDocument {
    #[serde(default)]
    report_builder: BuilderConfig,
}
