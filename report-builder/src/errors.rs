// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by report-builder.

use crate::report::TestResult;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Error returned when an end event names a test that isn't in the current window.
///
/// The builder's state is left untouched when this error is returned.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("no test named `{name}` found in the current package")]
pub struct UnresolvedTestError {
    name: String,
}

impl UnresolvedTestError {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the name that could not be resolved.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Error returned while parsing a [`TestResult`] value from a string.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error(
    "unrecognized test result: {input:?}\n(known values: {})",
    TestResult::variants().join(", "),
)]
pub struct ResultParseError {
    input: String,
}

impl ResultParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// An error that occurred while parsing builder configuration.
#[derive(Debug, Error)]
#[error("failed to parse report-builder config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: toml::de::Error,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: toml::de::Error) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }
}

/// An error that occurred while loading builder configuration from disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigReadError {
    /// The config file could not be read.
    #[error("error reading report-builder config at `{file}`")]
    Fs {
        /// The file that was being read.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The config file was read but could not be parsed.
    #[error(transparent)]
    Parse(#[from] ConfigParseError),
}

/// An error that occurred while parsing one line of a JSON-lines event stream.
#[derive(Debug, Error)]
#[error("failed to parse event on line {line_number}")]
pub struct EventParseError {
    line_number: usize,
    #[source]
    err: serde_json::Error,
}

impl EventParseError {
    pub(crate) fn new(line_number: usize, err: serde_json::Error) -> Self {
        Self { line_number, err }
    }

    /// Returns the 1-based line number of the malformed event.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}
