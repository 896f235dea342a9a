// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accumulates test events into a [`Report`].

use crate::{
    config::{BenchmarkOutput, BuilderConfig},
    diagnostics::{Diagnostic, DiagnosticSink, TracingSink},
    errors::UnresolvedTestError,
    events::ReportEvent,
    report::{Benchmark, Package, Report, Test, TestResult},
};
use std::{mem, time::Duration};
use tracing::debug;

/// Builds a [`Report`] from a sequence of test events.
///
/// Tests and benchmarks accumulate in a *window* until [`create_package`](Self::create_package)
/// flushes the window into a [`Package`]. Output lines are attributed to the most recently created
/// or ended test in the window, or to the package itself if there is none.
///
/// # Name resolution
///
/// End events name a test rather than identifying it. They are resolved as follows:
///
/// 1. If the most recently touched entity is an open test with that name, it is chosen.
/// 2. Otherwise, the most recently created open test with that name is chosen.
/// 3. Otherwise, if [`BuilderConfig::reopen_ended_tests`] is set, the most recently created test
///    with that name is re-closed and a [`Diagnostic::ReopenedTest`] is reported.
///
/// If no test matches, [`end_test`](Self::end_test) returns an error and leaves the builder
/// unchanged.
///
/// The builder is not thread-safe: callers sharing one across threads must serialize access.
#[derive(Clone, Debug)]
pub struct ReportBuilder<S = TracingSink> {
    config: BuilderConfig,
    sink: S,
    packages: Vec<Package>,
    window: Window,
}

impl ReportBuilder {
    /// Creates a new builder with the default configuration, logging diagnostics via `tracing`.
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    /// Creates a new builder with the given configuration, logging diagnostics via `tracing`.
    pub fn with_config(config: BuilderConfig) -> Self {
        Self::with_sink(config, TracingSink)
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DiagnosticSink> ReportBuilder<S> {
    /// Creates a new builder that reports diagnostics to `sink`.
    pub fn with_sink(config: BuilderConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            packages: vec![],
            window: Window::default(),
        }
    }

    /// Returns the configuration for this builder.
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Returns the diagnostic sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the packages flushed so far.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Returns the number of tests and benchmarks in the current window.
    pub fn window_len(&self) -> usize {
        self.window.entities.len()
    }

    /// Returns true if the current window holds no tests, benchmarks or output.
    pub fn is_window_empty(&self) -> bool {
        self.window.entities.is_empty() && self.window.output.is_empty()
    }

    /// Records the start of a test.
    ///
    /// Names need not be unique: several open tests may share a name.
    pub fn create_test(&mut self, name: impl Into<String>) {
        let id = self.window.allocate(Entity::Test(Test::new(name)));
        self.window.last_active = Some(id);
    }

    /// Records the end of the test called `name`.
    ///
    /// `result` is one of `PASS`, `FAIL` or `SKIP`. Any other token is recorded as
    /// [`TestResult::Unknown`] and reported as a [`Diagnostic::UnknownResult`].
    pub fn end_test(
        &mut self,
        name: &str,
        result: &str,
        duration: Duration,
    ) -> Result<(), UnresolvedTestError> {
        let id = self
            .window
            .find_test(name, self.config.reopen_ended_tests)
            .ok_or_else(|| UnresolvedTestError::new(name))?;

        let result = result.parse().unwrap_or_else(|_| {
            self.sink.report(Diagnostic::UnknownResult {
                test: name.to_owned(),
                token: result.to_owned(),
            });
            TestResult::Unknown
        });

        self.window.last_active = Some(id);
        let Some(test) = self.window.test_mut(id) else {
            // find_test only returns ids of tests.
            return Err(UnresolvedTestError::new(name));
        };
        if let Some(previous) = test.result {
            self.sink.report(Diagnostic::ReopenedTest {
                name: name.to_owned(),
                previous,
            });
        }
        test.set_result(result, duration);
        Ok(())
    }

    /// Records a completed benchmark.
    ///
    /// Benchmarks always pass and are never modified after they are recorded.
    pub fn benchmark(&mut self, mut benchmark: Benchmark) {
        benchmark.result = TestResult::Pass;
        let id = self.window.allocate(Entity::Benchmark(benchmark));
        self.window.last_active = Some(id);
    }

    /// Appends a line of output to the most recently touched test, or to the package if no test
    /// has been touched since the last flush.
    ///
    /// Lines received right after a benchmark are routed according to
    /// [`BuilderConfig::benchmark_output`].
    pub fn append_output(&mut self, line: impl Into<String>) {
        let line = line.into();
        let window = &mut self.window;
        match window
            .last_active
            .and_then(|id| window.entities.get_mut(id.0))
        {
            Some(Entity::Test(test)) => {
                test.add_output(line);
            }
            Some(Entity::Benchmark(benchmark)) => match self.config.benchmark_output {
                BenchmarkOutput::Package => window.output.push(line),
                BenchmarkOutput::Drop => {
                    debug!(benchmark = %benchmark.name, "dropping output line: {line}");
                }
            },
            None => window.output.push(line),
        }
    }

    /// Flushes the current window into a new package called `name`.
    ///
    /// Tests and benchmarks keep the order they were created in. Package names need not be
    /// unique.
    pub fn create_package(&mut self, name: impl Into<String>, duration: Duration) {
        let package = self.window.flush(name.into(), duration);
        debug!(
            package = %package.name,
            tests = package.tests.len(),
            benchmarks = package.benchmarks.len(),
            "flushed package"
        );
        self.packages.push(package);
    }

    /// Returns the report built so far.
    ///
    /// If the window holds tests or benchmarks, they are first flushed into a package named
    /// [`BuilderConfig::trailing_package_name`] with zero duration. Calling `build` again without
    /// new events returns the same report.
    pub fn build(&mut self) -> Report {
        self.flush_trailing();
        Report {
            packages: self.packages.clone(),
        }
    }

    /// Consumes the builder, returning the finished report.
    ///
    /// Behaves like [`build`](Self::build) without cloning the packages.
    pub fn finish(mut self) -> Report {
        self.flush_trailing();
        Report {
            packages: self.packages,
        }
    }

    /// Applies a single event.
    pub fn apply(&mut self, event: ReportEvent) -> Result<(), UnresolvedTestError> {
        match event {
            ReportEvent::CreateTest { name } => self.create_test(name),
            ReportEvent::EndTest {
                name,
                result,
                elapsed,
            } => self.end_test(&name, &result, elapsed)?,
            ReportEvent::Benchmark {
                name,
                iterations,
                ns_per_op,
                mb_per_sec,
                bytes_per_op,
                allocs_per_op,
            } => {
                let mut benchmark = Benchmark::new(name);
                benchmark
                    .set_iterations(iterations)
                    .set_ns_per_op(ns_per_op)
                    .set_mb_per_sec(mb_per_sec)
                    .set_bytes_per_op(bytes_per_op)
                    .set_allocs_per_op(allocs_per_op);
                self.benchmark(benchmark);
            }
            ReportEvent::Output { line } => self.append_output(line),
            ReportEvent::CreatePackage { name, elapsed } => self.create_package(name, elapsed),
        }
        Ok(())
    }

    /// Applies a sequence of events, continuing past end events that can't be resolved.
    ///
    /// Returns the errors for the events that were skipped.
    pub fn apply_all(
        &mut self,
        events: impl IntoIterator<Item = ReportEvent>,
    ) -> Vec<UnresolvedTestError> {
        events
            .into_iter()
            .filter_map(|event| self.apply(event).err())
            .collect()
    }

    /// Returns the open test that an end event for `name` would currently resolve to.
    pub fn open_test(&self, name: &str) -> Option<&Test> {
        self.window
            .find_test(name, false)
            .and_then(|id| self.window.test(id))
    }

    /// Returns the benchmark called `name` in the current window.
    ///
    /// The most recently touched benchmark is checked first, then the most recently recorded
    /// benchmark with that name.
    pub fn find_benchmark(&self, name: &str) -> Option<&Benchmark> {
        self.window
            .find_benchmark(name)
            .and_then(|id| self.window.benchmark(id))
    }

    fn flush_trailing(&mut self) {
        if !self.window.entities.is_empty() {
            let name = self.config.trailing_package_name.clone();
            self.create_package(name, Duration::ZERO);
        }
    }
}

/// Everything observed since the last package boundary.
///
/// Entities live in an arena indexed by [`EntityId`]. Ids are allocated densely in creation
/// order and restart at zero after every flush.
#[derive(Clone, Debug, Default)]
struct Window {
    entities: Vec<Entity>,
    output: Vec<String>,
    last_active: Option<EntityId>,
}

impl Window {
    fn allocate(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(entity);
        id
    }

    fn test(&self, id: EntityId) -> Option<&Test> {
        match self.entities.get(id.0) {
            Some(Entity::Test(test)) => Some(test),
            _ => None,
        }
    }

    fn test_mut(&mut self, id: EntityId) -> Option<&mut Test> {
        match self.entities.get_mut(id.0) {
            Some(Entity::Test(test)) => Some(test),
            _ => None,
        }
    }

    fn benchmark(&self, id: EntityId) -> Option<&Benchmark> {
        match self.entities.get(id.0) {
            Some(Entity::Benchmark(benchmark)) => Some(benchmark),
            _ => None,
        }
    }

    fn find_test(&self, name: &str, include_ended: bool) -> Option<EntityId> {
        let is_open_match = |test: &Test| test.name == name && test.is_open();

        // End events usually directly follow their own start event.
        if let Some(id) = self.last_active
            && self.test(id).is_some_and(is_open_match)
        {
            return Some(id);
        }

        self.rfind_test(is_open_match).or_else(|| {
            if include_ended {
                self.rfind_test(|test| test.name == name)
            } else {
                None
            }
        })
    }

    fn rfind_test(&self, mut pred: impl FnMut(&Test) -> bool) -> Option<EntityId> {
        self.entities
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, entity)| match entity {
                Entity::Test(test) if pred(test) => Some(EntityId(index)),
                _ => None,
            })
    }

    fn find_benchmark(&self, name: &str) -> Option<EntityId> {
        if let Some(id) = self.last_active
            && self
                .benchmark(id)
                .is_some_and(|benchmark| benchmark.name == name)
        {
            return Some(id);
        }

        self.entities
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, entity)| match entity {
                Entity::Benchmark(benchmark) if benchmark.name == name => Some(EntityId(index)),
                _ => None,
            })
    }

    /// Converts this window into a package, leaving the window empty.
    fn flush(&mut self, name: String, duration: Duration) -> Package {
        let Window {
            entities, output, ..
        } = mem::take(self);

        let mut package = Package::new(name, duration);
        package.output = output;
        // Entities are stored in id order, so one pass keeps each kind in creation order.
        for entity in entities {
            match entity {
                Entity::Test(test) => package.tests.push(test),
                Entity::Benchmark(benchmark) => package.benchmarks.push(benchmark),
            }
        }
        package
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct EntityId(usize);

#[derive(Clone, Debug)]
enum Entity {
    Test(Test),
    Benchmark(Benchmark),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;
    use test_strategy::{Arbitrary, proptest};

    fn builder_with_diagnostics(
        config: BuilderConfig,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ReportBuilder<&mut Vec<Diagnostic>> {
        ReportBuilder::with_sink(config, diagnostics)
    }

    fn names(tests: &[Test]) -> Vec<&str> {
        tests.iter().map(|test| test.name.as_str()).collect()
    }

    #[test_case("PASS", TestResult::Pass ; "pass")]
    #[test_case("FAIL", TestResult::Fail ; "fail")]
    #[test_case("SKIP", TestResult::Skip ; "skip")]
    #[test_case("BENCH", TestResult::Unknown ; "unknown token")]
    #[test_case("pass", TestResult::Unknown ; "lowercase token")]
    fn end_test_classifies_result(token: &str, expected: TestResult) {
        let mut diagnostics = Vec::new();
        let mut builder = builder_with_diagnostics(BuilderConfig::default(), &mut diagnostics);
        builder.create_test("TestFoo");
        builder
            .end_test("TestFoo", token, Duration::from_millis(5))
            .expect("TestFoo is open");
        let report = builder.finish();

        let test = &report.packages[0].tests[0];
        assert_eq!(test.result, Some(expected));
        assert_eq!(test.duration, Duration::from_millis(5));

        if expected == TestResult::Unknown {
            assert_eq!(
                diagnostics,
                vec![Diagnostic::UnknownResult {
                    test: "TestFoo".to_owned(),
                    token: token.to_owned(),
                }]
            );
        } else {
            assert_eq!(diagnostics, vec![]);
        }
    }

    #[test]
    fn end_test_prefers_last_active() {
        let mut builder = ReportBuilder::new();
        builder.create_test("TestA");
        builder.create_test("TestB");
        builder
            .end_test("TestB", "PASS", Duration::ZERO)
            .expect("TestB is open");
        builder
            .end_test("TestA", "FAIL", Duration::ZERO)
            .expect("TestA is open");
        builder.append_output("after TestA ended");

        let report = builder.finish();
        let tests = &report.packages[0].tests;
        assert_eq!(names(tests), vec!["TestA", "TestB"]);
        assert_eq!(tests[0].result, Some(TestResult::Fail));
        assert_eq!(tests[0].output, vec!["after TestA ended"]);
        assert_eq!(tests[1].result, Some(TestResult::Pass));
        assert!(tests[1].output.is_empty());
    }

    #[test]
    fn duplicate_names_end_most_recent_open_test() {
        let mut builder = ReportBuilder::new();
        builder.create_test("TestDup");
        builder.append_output("first");
        builder.create_test("TestDup");
        builder.append_output("second");
        builder.create_test("TestOther");

        builder
            .end_test("TestDup", "PASS", Duration::ZERO)
            .expect("TestDup is open");
        // Once the second TestDup ended, the first is the only open one left.
        builder
            .end_test("TestDup", "FAIL", Duration::ZERO)
            .expect("TestDup is open");

        let report = builder.finish();
        let tests = &report.packages[0].tests;
        assert_eq!(tests[0].output, vec!["first"]);
        assert_eq!(tests[0].result, Some(TestResult::Fail));
        assert_eq!(tests[1].output, vec!["second"]);
        assert_eq!(tests[1].result, Some(TestResult::Pass));
        assert_eq!(tests[2].result, None);
    }

    #[test]
    fn unresolved_end_test_leaves_state_untouched() {
        let mut builder = ReportBuilder::new();
        builder.create_test("TestA");
        builder.append_output("line 1");

        let error = builder
            .end_test("TestMissing", "PASS", Duration::from_secs(1))
            .expect_err("TestMissing was never created");
        assert_eq!(error.name(), "TestMissing");

        // Attribution still points at TestA.
        builder.append_output("line 2");
        assert_eq!(builder.window_len(), 1);

        let report = builder.finish();
        let test = &report.packages[0].tests[0];
        assert_eq!(test.result, None);
        assert_eq!(test.output, vec!["line 1", "line 2"]);
    }

    #[test]
    fn reopen_ended_tests() {
        let mut diagnostics = Vec::new();
        let mut builder = builder_with_diagnostics(BuilderConfig::default(), &mut diagnostics);
        builder.create_test("TestA");
        builder
            .end_test("TestA", "FAIL", Duration::from_secs(1))
            .expect("TestA is open");
        builder
            .end_test("TestA", "PASS", Duration::from_secs(2))
            .expect("TestA is re-closed");
        let report = builder.finish();

        let test = &report.packages[0].tests[0];
        assert_eq!(test.result, Some(TestResult::Pass));
        assert_eq!(test.duration, Duration::from_secs(2));
        assert_eq!(
            diagnostics,
            vec![Diagnostic::ReopenedTest {
                name: "TestA".to_owned(),
                previous: TestResult::Fail,
            }]
        );
    }

    #[test]
    fn no_reopen_ended_tests() {
        let config = BuilderConfig {
            reopen_ended_tests: false,
            ..Default::default()
        };
        let mut builder = ReportBuilder::with_config(config);
        builder.create_test("TestA");
        builder
            .end_test("TestA", "FAIL", Duration::ZERO)
            .expect("TestA is open");
        builder
            .end_test("TestA", "PASS", Duration::ZERO)
            .expect_err("TestA already ended");

        let report = builder.finish();
        assert_eq!(report.packages[0].tests[0].result, Some(TestResult::Fail));
    }

    #[test]
    fn benchmark_output_routing() {
        let mut builder = ReportBuilder::new();
        builder.benchmark(Benchmark::new("BenchmarkA"));
        builder.append_output("goos: linux");
        builder.create_package("pkg", Duration::ZERO);

        let config = BuilderConfig {
            benchmark_output: BenchmarkOutput::Drop,
            ..Default::default()
        };
        let mut dropping = ReportBuilder::with_config(config);
        dropping.benchmark(Benchmark::new("BenchmarkA"));
        dropping.append_output("goos: linux");
        dropping.create_package("pkg", Duration::ZERO);

        let report = builder.finish();
        assert_eq!(report.packages[0].output, vec!["goos: linux"]);
        let report = dropping.finish();
        assert!(report.packages[0].output.is_empty());
        assert_eq!(report.packages[0].benchmarks.len(), 1);
    }

    #[test]
    fn benchmarks_always_pass() {
        let mut builder = ReportBuilder::new();
        let mut benchmark = Benchmark::new("BenchmarkA");
        benchmark.result = TestResult::Fail;
        builder.benchmark(benchmark);
        let report = builder.finish();
        assert_eq!(report.packages[0].benchmarks[0].result, TestResult::Pass);
    }

    #[test]
    fn find_benchmark_and_open_test() {
        let mut builder = ReportBuilder::new();
        let mut first = Benchmark::new("BenchmarkA");
        first.set_iterations(10);
        builder.benchmark(first);
        builder.create_test("TestA");
        let mut second = Benchmark::new("BenchmarkA");
        second.set_iterations(20);
        builder.benchmark(second);

        let found = builder.find_benchmark("BenchmarkA").expect("recorded");
        assert_eq!(found.iterations, 20);
        assert!(builder.find_benchmark("BenchmarkB").is_none());

        assert_eq!(
            builder.open_test("TestA").map(|test| test.name.as_str()),
            Some("TestA")
        );
        builder
            .end_test("TestA", "PASS", Duration::ZERO)
            .expect("TestA is open");
        assert!(builder.open_test("TestA").is_none());

        builder.create_package("pkg", Duration::ZERO);
        assert!(builder.find_benchmark("BenchmarkA").is_none());
    }

    #[test]
    fn flush_resets_window() {
        let mut builder = ReportBuilder::new();
        builder.create_test("TestA");
        builder.append_output("in TestA");
        builder.create_package("pkg1", Duration::from_secs(1));
        assert!(builder.is_window_empty());

        // Attribution is cleared by the flush.
        builder.append_output("stray");
        builder.create_test("TestB");
        builder.create_package("pkg1", Duration::from_secs(2));

        let report = builder.finish();
        assert_eq!(report.packages.len(), 2, "packages are not merged by name");
        assert_eq!(names(&report.packages[1].tests), vec!["TestB"]);
        assert_eq!(report.packages[1].output, vec!["stray"]);
        assert!(report.packages[1].tests[0].output.is_empty());
    }

    #[test]
    fn build_is_idempotent() {
        let mut builder = ReportBuilder::new();
        builder.create_test("TestA");
        let first = builder.build();
        let second = builder.build();
        assert_eq!(first, second);
        assert_eq!(first.packages.len(), 1);
        assert_eq!(first.packages[0].name, "unknown");
        assert_eq!(first.packages[0].duration, Duration::ZERO);
    }

    #[test]
    fn build_flushes_benchmarks_but_not_bare_output() {
        let config = BuilderConfig {
            trailing_package_name: "trailing".to_owned(),
            ..Default::default()
        };
        let mut builder = ReportBuilder::with_config(config);
        builder.append_output("PASS");
        assert!(builder.build().packages.is_empty());

        builder.benchmark(Benchmark::new("BenchmarkA"));
        let report = builder.build();
        assert_eq!(report.packages.len(), 1);
        assert_eq!(report.packages[0].name, "trailing");
        assert_eq!(report.packages[0].output, vec!["PASS"]);
    }

    #[test]
    fn apply_all_skips_unresolved() {
        let mut builder = ReportBuilder::new();
        let errors = builder.apply_all([
            ReportEvent::EndTest {
                name: "TestMissing".to_owned(),
                result: "PASS".to_owned(),
                elapsed: Duration::ZERO,
            },
            ReportEvent::CreateTest {
                name: "TestA".to_owned(),
            },
            ReportEvent::EndTest {
                name: "TestA".to_owned(),
                result: "PASS".to_owned(),
                elapsed: Duration::ZERO,
            },
        ]);
        assert_eq!(errors, vec![UnresolvedTestError::new("TestMissing")]);
        assert_eq!(
            builder.finish().packages[0].tests[0].result,
            Some(TestResult::Pass)
        );
    }

    #[derive(Arbitrary, Clone, Debug)]
    enum Op {
        CreateTest,
        Benchmark,
        Output,
        EndTest(#[strategy(0..8usize)] usize),
    }

    /// Replays `ops` into `builder`, returning the expected test and benchmark names.
    fn replay(
        builder: &mut ReportBuilder,
        ops: &[Op],
        output_count: &mut usize,
    ) -> (Vec<String>, Vec<String>) {
        let mut tests = Vec::new();
        let mut benchmarks = Vec::new();
        for op in ops {
            match op {
                Op::CreateTest => {
                    let name = format!("Test{}", tests.len());
                    builder.create_test(name.clone());
                    tests.push(name);
                }
                Op::Benchmark => {
                    let name = format!("Benchmark{}", benchmarks.len());
                    builder.benchmark(Benchmark::new(name.clone()));
                    benchmarks.push(name);
                }
                Op::Output => {
                    builder.append_output(format!("line {output_count}"));
                    *output_count += 1;
                }
                Op::EndTest(index) => {
                    if !tests.is_empty() {
                        let name = &tests[index % tests.len()];
                        builder
                            .end_test(name, "PASS", Duration::ZERO)
                            .expect("created tests always resolve");
                    }
                }
            }
        }
        (tests, benchmarks)
    }

    #[proptest]
    fn flush_preserves_creation_order(
        #[strategy(prop::collection::vec(any::<Op>(), 0..64))] ops: Vec<Op>,
    ) {
        let mut builder = ReportBuilder::new();
        let mut output_count = 0;
        let (tests, benchmarks) = replay(&mut builder, &ops, &mut output_count);
        builder.create_package("first", Duration::ZERO);
        // Identifiers restart after a flush, so an identical window produces an identical package.
        replay(&mut builder, &ops, &mut 0);
        builder.create_package("second", Duration::ZERO);

        let report = builder.finish();
        prop_assert_eq!(report.packages.len(), 2);
        let first = &report.packages[0];
        let test_names: Vec<_> = first.tests.iter().map(|test| test.name.clone()).collect();
        let benchmark_names: Vec<_> = first
            .benchmarks
            .iter()
            .map(|benchmark| benchmark.name.clone())
            .collect();
        prop_assert_eq!(test_names, tests);
        prop_assert_eq!(benchmark_names, benchmarks);

        // Every output line lands exactly once, in order within each bucket.
        let attributed: usize = first.tests.iter().map(|test| test.output.len()).sum();
        prop_assert_eq!(attributed + first.output.len(), output_count);

        let second = &report.packages[1];
        prop_assert_eq!(&first.tests, &second.tests);
        prop_assert_eq!(&first.benchmarks, &second.benchmarks);
        prop_assert_eq!(&first.output, &second.output);
    }
}
