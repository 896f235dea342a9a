// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::report::TestResult;
use std::fmt;
use tracing::{debug, warn};

/// A recoverable condition noticed while accumulating events.
///
/// Diagnostics never interrupt processing: the builder always continues with the next event.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Diagnostic {
    /// A test ended with a result token that wasn't recognized, and was recorded as
    /// [`TestResult::Unknown`](crate::TestResult::Unknown).
    UnknownResult {
        /// The name of the test.
        test: String,

        /// The unrecognized token.
        token: String,
    },

    /// An end event found no open test with its name and re-closed a test that had already
    /// ended, overwriting its result.
    ReopenedTest {
        /// The name of the test.
        name: String,

        /// The result the test had before it was re-closed.
        previous: TestResult,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownResult { test, token } => {
                write!(f, "unknown result {token:?} for test `{test}`")
            }
            Diagnostic::ReopenedTest { name, previous } => write!(
                f,
                "test `{name}` already ended with {previous}, overwriting its result"
            ),
        }
    }
}

/// Receives diagnostics from a [`ReportBuilder`](crate::ReportBuilder).
pub trait DiagnosticSink {
    /// Reports a single diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

/// A sink that forwards diagnostics to `tracing`.
///
/// This is the default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::UnknownResult { .. } => warn!("{diagnostic}"),
            Diagnostic::ReopenedTest { .. } => debug!("{diagnostic}"),
        }
    }
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}
