// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ResultParseError;
use std::{fmt, ops::AddAssign, str::FromStr, time::Duration};

/// The root of a reconstructed report: every package flushed by a
/// [`ReportBuilder`](crate::ReportBuilder), in flush order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// The packages contained in this report.
    ///
    /// Packages are never merged or deduplicated by name.
    pub packages: Vec<Package>,
}

impl Report {
    /// Returns true if every package in this report is successful.
    pub fn is_successful(&self) -> bool {
        self.packages.iter().all(|package| package.is_successful())
    }

    /// Returns the result counts summed over all packages.
    pub fn result_counts(&self) -> ResultCounts {
        let mut counts = ResultCounts::default();
        for package in &self.packages {
            counts += package.result_counts();
        }
        counts
    }
}

/// A single package: the tests, benchmarks and unattributed output observed between two package
/// boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct Package {
    /// The name of this package.
    pub name: String,

    /// The time taken by the package, as reported by the package boundary event.
    pub duration: Duration,

    /// The tests in this package, in the order they were created.
    pub tests: Vec<Test>,

    /// The benchmarks in this package, in the order they were recorded.
    pub benchmarks: Vec<Benchmark>,

    /// Output lines that could not be attributed to a test.
    pub output: Vec<String>,
}

impl Package {
    /// Creates a new, empty `Package`.
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
            tests: vec![],
            benchmarks: vec![],
            output: vec![],
        }
    }

    /// Returns true if no test in this package failed or ended with an unknown result.
    ///
    /// Tests that never ended do not count against the package.
    pub fn is_successful(&self) -> bool {
        let counts = self.result_counts();
        counts.failed == 0 && counts.unknown == 0
    }

    /// Counts the tests in this package by result.
    pub fn result_counts(&self) -> ResultCounts {
        let mut counts = ResultCounts {
            benchmarks: self.benchmarks.len(),
            ..Default::default()
        };
        for test in &self.tests {
            match test.result {
                Some(TestResult::Pass) => counts.passed += 1,
                Some(TestResult::Fail) => counts.failed += 1,
                Some(TestResult::Skip) => counts.skipped += 1,
                Some(TestResult::Unknown) => counts.unknown += 1,
                None => counts.unfinished += 1,
            }
        }
        counts
    }
}

/// Per-result counts for a package or a whole report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResultCounts {
    /// Tests that passed.
    pub passed: usize,

    /// Tests that failed.
    pub failed: usize,

    /// Tests that were skipped.
    pub skipped: usize,

    /// Tests that ended with an unrecognized result.
    pub unknown: usize,

    /// Tests that were started but never ended.
    pub unfinished: usize,

    /// Benchmarks recorded.
    pub benchmarks: usize,
}

impl ResultCounts {
    /// The total number of tests, excluding benchmarks.
    pub fn tests(&self) -> usize {
        self.passed + self.failed + self.skipped + self.unknown + self.unfinished
    }
}

impl AddAssign for ResultCounts {
    fn add_assign(&mut self, other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.unknown += other.unknown;
        self.unfinished += other.unfinished;
        self.benchmarks += other.benchmarks;
    }
}

/// A single test.
#[derive(Clone, Debug, PartialEq)]
pub struct Test {
    /// The name of the test.
    pub name: String,

    /// The result of the test, or `None` if no end event has been seen for it.
    pub result: Option<TestResult>,

    /// The time it took to execute this test. Zero until the test ends.
    pub duration: Duration,

    /// Output lines attributed to this test, in the order they were received.
    pub output: Vec<String>,
}

impl Test {
    /// Creates a new open test.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: None,
            duration: Duration::ZERO,
            output: vec![],
        }
    }

    /// Returns true if this test has not ended yet.
    pub fn is_open(&self) -> bool {
        self.result.is_none()
    }

    /// Sets the result and duration of this test.
    pub fn set_result(&mut self, result: TestResult, duration: Duration) -> &mut Self {
        self.result = Some(result);
        self.duration = duration;
        self
    }

    /// Appends a line of output.
    pub fn add_output(&mut self, line: impl Into<String>) -> &mut Self {
        self.output.push(line.into());
        self
    }
}

/// A single benchmark.
///
/// Benchmarks are complete as soon as they are recorded: there is no separate end event.
#[derive(Clone, Debug, PartialEq)]
pub struct Benchmark {
    /// The name of the benchmark.
    pub name: String,

    /// The result of the benchmark. Always [`TestResult::Pass`] for recorded benchmarks.
    pub result: TestResult,

    /// The number of iterations run.
    pub iterations: u64,

    /// Nanoseconds per iteration.
    pub ns_per_op: f64,

    /// Throughput, in megabytes per second.
    pub mb_per_sec: f64,

    /// Bytes allocated per iteration.
    pub bytes_per_op: u64,

    /// Allocations per iteration.
    pub allocs_per_op: u64,
}

impl Benchmark {
    /// Creates a new passing benchmark with all measurements set to zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: TestResult::Pass,
            iterations: 0,
            ns_per_op: 0.0,
            mb_per_sec: 0.0,
            bytes_per_op: 0,
            allocs_per_op: 0,
        }
    }

    /// Sets the number of iterations.
    pub fn set_iterations(&mut self, iterations: u64) -> &mut Self {
        self.iterations = iterations;
        self
    }

    /// Sets the time per iteration, in nanoseconds.
    pub fn set_ns_per_op(&mut self, ns_per_op: f64) -> &mut Self {
        self.ns_per_op = ns_per_op;
        self
    }

    /// Sets the throughput, in megabytes per second.
    pub fn set_mb_per_sec(&mut self, mb_per_sec: f64) -> &mut Self {
        self.mb_per_sec = mb_per_sec;
        self
    }

    /// Sets the bytes allocated per iteration.
    pub fn set_bytes_per_op(&mut self, bytes_per_op: u64) -> &mut Self {
        self.bytes_per_op = bytes_per_op;
        self
    }

    /// Sets the allocations per iteration.
    pub fn set_allocs_per_op(&mut self, allocs_per_op: u64) -> &mut Self {
        self.allocs_per_op = allocs_per_op;
        self
    }
}

/// The outcome of a test.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TestResult {
    /// The test passed.
    Pass,

    /// The test failed.
    Fail,

    /// The test was skipped.
    Skip,

    /// The test ended with a result token that wasn't recognized.
    Unknown,
}

impl TestResult {
    /// Returns the known result tokens.
    pub fn variants() -> &'static [&'static str] {
        &["PASS", "FAIL", "SKIP"]
    }

    /// Returns true if this result is a failure or unknown.
    pub fn is_failure(self) -> bool {
        matches!(self, TestResult::Fail | TestResult::Unknown)
    }
}

impl FromStr for TestResult {
    type Err = ResultParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(TestResult::Pass),
            "FAIL" => Ok(TestResult::Fail),
            "SKIP" => Ok(TestResult::Skip),
            other => Err(ResultParseError::new(other)),
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::Pass => write!(f, "PASS"),
            TestResult::Fail => write!(f, "FAIL"),
            TestResult::Skip => write!(f, "SKIP"),
            TestResult::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
