// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized form of the events a [`ReportBuilder`](crate::ReportBuilder) consumes.

use crate::errors::EventParseError;
use serde::Deserialize;
use std::time::Duration;

/// A single event, as accepted by [`ReportBuilder::apply`](crate::ReportBuilder::apply).
///
/// Events are internally tagged by an `event` field, with durations written as humantime strings:
///
/// ```json
/// {"event": "create-test", "name": "TestParse"}
/// {"event": "end-test", "name": "TestParse", "result": "PASS", "elapsed": "20ms"}
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum ReportEvent {
    /// A test started.
    CreateTest {
        /// The name of the test.
        name: String,
    },

    /// A test ended.
    EndTest {
        /// The name of the test. Matched against open tests in the current package.
        name: String,

        /// The result token: `PASS`, `FAIL` or `SKIP`. Anything else is recorded as unknown.
        result: String,

        /// The time taken by the test.
        #[serde(default, with = "humantime_serde")]
        elapsed: Duration,
    },

    /// A benchmark was recorded.
    Benchmark {
        /// The name of the benchmark.
        name: String,

        /// The number of iterations run.
        #[serde(default)]
        iterations: u64,

        /// Nanoseconds per iteration.
        #[serde(default)]
        ns_per_op: f64,

        /// Throughput, in megabytes per second.
        #[serde(default)]
        mb_per_sec: f64,

        /// Bytes allocated per iteration.
        #[serde(default)]
        bytes_per_op: u64,

        /// Allocations per iteration.
        #[serde(default)]
        allocs_per_op: u64,
    },

    /// A line of output was produced.
    Output {
        /// The line, without its trailing newline.
        line: String,
    },

    /// A package boundary was reached.
    CreatePackage {
        /// The name of the package.
        name: String,

        /// The time taken by the package.
        #[serde(default, with = "humantime_serde")]
        elapsed: Duration,
    },
}

impl ReportEvent {
    /// Parses events from JSON lines, one event per line.
    ///
    /// Blank lines are skipped. A malformed line produces an error carrying its line number, and
    /// parsing continues with the next line.
    pub fn parse_json_lines(
        input: &str,
    ) -> impl Iterator<Item = Result<ReportEvent, EventParseError>> + '_ {
        input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|err| EventParseError::new(index + 1, err))
            })
    }
}
