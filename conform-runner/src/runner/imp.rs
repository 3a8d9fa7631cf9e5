// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Environment;
use crate::{
    descriptor::TestDescriptor,
    errors::Interrupted,
    helpers::format_duration,
    outcome::{Outcome, TestError, TestResult},
    registry::{Dependency, Predicate, Registry, TestId},
    reporter::{TestEvent, TestEventKind},
    test_filter::{AllTests, RunFilter},
    time::{StopwatchStart, stopwatch},
};
use chrono::Local;
use debug_ignore::DebugIgnore;
use derive_where::derive_where;
use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{debug, info, warn};

/// Options that control how tests are scheduled and classified.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunOptions {
    /// Run tests even if their prerequisites failed, and skip predicate checks.
    pub force: bool,

    /// Run prerequisites that the selection filter would otherwise omit.
    pub run_all_dependencies: bool,

    /// Tests that take longer than this are reclassified as too long. `None` or zero disables the
    /// check.
    pub timeout: Option<Duration>,

    /// Log how long each test took.
    pub show_time: bool,

    /// Log each test as it starts and finishes.
    pub verbose: bool,
}

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    options: RunOptions,
    interrupt: Option<Arc<AtomicBool>>,
}

impl TestRunnerBuilder {
    /// Sets the run options.
    pub fn set_options(&mut self, options: RunOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Shares an interrupt flag with the runner.
    ///
    /// Once the flag is set, no further test starts and the run returns [`Interrupted`].
    pub fn set_interrupt_flag(&mut self, flag: Arc<AtomicBool>) -> &mut Self {
        self.interrupt = Some(flag);
        self
    }

    /// Creates a new test runner.
    ///
    /// `filter` decides which top-level tests run. The callback is called with each event the
    /// runner produces.
    pub fn build<'a, E, F>(
        self,
        registry: &'a Registry<E>,
        filter: &'a dyn RunFilter<E>,
        callback: F,
    ) -> TestRunner<'a, E>
    where
        F: FnMut(TestEvent) + 'a,
    {
        TestRunner {
            registry,
            filter: DebugIgnore(filter),
            options: self.options,
            interrupt: self.interrupt.unwrap_or_default(),
            callback: DebugIgnore(Box::new(callback)),
            stopwatch: stopwatch(),
            state: RunState::new(registry.len()),
            path: Vec::new(),
            open_cycles: Vec::new(),
        }
    }
}

/// The result of running a multiconn variant over one secondary connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MulticonnIteration {
    /// The per-connection code: the variant's code followed by the 1-based iteration number.
    pub code: String,

    /// The label of the secondary connection.
    pub label: String,

    /// The result of this iteration.
    pub result: TestResult,
}

/// The results of a run, indexed by test.
#[derive(Clone, Debug)]
pub struct RunState {
    results: Vec<TestResult>,
    multiconn: HashMap<TestId, Vec<MulticonnIteration>>,
    cycles: Vec<TestId>,
}

impl RunState {
    fn new(len: usize) -> Self {
        Self {
            results: vec![TestResult::NOT_RUN; len],
            multiconn: HashMap::new(),
            cycles: Vec::new(),
        }
    }

    /// Returns the current result of a test.
    pub fn result(&self, id: TestId) -> &TestResult {
        &self.results[id.index()]
    }

    /// Iterates over every test's result in declaration order.
    pub fn results(&self) -> impl Iterator<Item = (TestId, &TestResult)> + '_ {
        self.results
            .iter()
            .enumerate()
            .map(|(index, result)| (TestId::from_index(index), result))
    }

    /// The per-connection results of a multiconn variant. Empty if it never ran.
    pub fn multiconn_iterations(&self, id: TestId) -> &[MulticonnIteration] {
        self.multiconn.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Tests that were omitted because they were caught in a dependency cycle.
    pub fn cycles(&self) -> &[TestId] {
        &self.cycles
    }

    fn set(&mut self, id: TestId, result: TestResult) {
        self.results[id.index()] = result;
    }
}

/// Context for running tests.
///
/// Tests run one at a time, depth first: a test's prerequisites run before it does. Every result
/// is computed once, and later dependents observe the cached result.
#[derive_where(Debug)]
pub struct TestRunner<'a, E> {
    registry: &'a Registry<E>,
    filter: DebugIgnore<&'a dyn RunFilter<E>>,
    options: RunOptions,
    interrupt: Arc<AtomicBool>,
    callback: DebugIgnore<Box<dyn FnMut(TestEvent) + 'a>>,
    stopwatch: StopwatchStart,
    state: RunState,
    // Tests whose prerequisites are being resolved, outermost first.
    path: Vec<TestId>,
    // Cycles found but not yet unwound. The first member is the test that was re-entered.
    open_cycles: Vec<Vec<TestId>>,
}

impl<'a, E: Environment> TestRunner<'a, E> {
    /// Runs the given tests in order, along with their prerequisites.
    ///
    /// Tests that already have a result, typically because an earlier test depended on them, are
    /// skipped.
    pub fn run_all(&mut self, tests: &[TestId], env: &mut E) -> Result<(), Interrupted> {
        for &id in tests {
            self.check_interrupt()?;
            if self.state.result(id).outcome == Outcome::NotRun {
                self.run_tree(id, env)?;
            }
        }
        Ok(())
    }

    /// Runs a single test along with its prerequisites, whatever its current result.
    pub fn run_tree(&mut self, id: TestId, env: &mut E) -> Result<(), Interrupted> {
        let filter = *self.filter;
        self.path.clear();
        self.open_cycles.clear();
        self.run_subtree(id, filter, env)
    }

    /// Returns the options this runner was built with.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Returns the results so far.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Consumes the runner, returning the results.
    pub fn into_state(self) -> RunState {
        self.state
    }

    // ---
    // Helper methods
    // ---

    fn run_subtree(
        &mut self,
        id: TestId,
        filter: &dyn RunFilter<E>,
        env: &mut E,
    ) -> Result<(), Interrupted> {
        if self.state.result(id).outcome == Outcome::Waiting {
            // Re-entered while resolving our own prerequisites.
            self.record_cycle(id);
            return Ok(());
        }
        self.state.set(id, TestResult::WAITING);

        self.path.push(id);
        let res = self.visit(id, filter, env);
        self.path.pop();
        res
    }

    fn visit(
        &mut self,
        id: TestId,
        filter: &dyn RunFilter<E>,
        env: &mut E,
    ) -> Result<(), Interrupted> {
        let registry = self.registry;
        let test = registry.get(id);
        if !filter.should_run(test, &self.options) {
            self.omit(id, TestResult::OMITTED);
            return Ok(());
        }

        let dependency_filter: &dyn RunFilter<E> = if self.options.run_all_dependencies {
            &AllTests
        } else {
            filter
        };

        for dependency in test.dependencies() {
            match *dependency {
                Dependency::Predicate(predicate_id) => {
                    if self.options.force {
                        continue;
                    }
                    let predicate = registry.predicate(predicate_id);
                    if let Some(result) = self.check_predicate(predicate, test, env) {
                        self.omit(id, result);
                        return Ok(());
                    }
                }
                Dependency::Test(dependency_id) => {
                    let current = self.state.result(dependency_id);
                    let rerun = self.options.run_all_dependencies && current.is_filter_omission();
                    if rerun || matches!(current.outcome, Outcome::NotRun | Outcome::Waiting) {
                        self.run_subtree(dependency_id, dependency_filter, env)?;
                    }

                    let outcome = self.state.result(dependency_id).outcome;
                    if outcome == Outcome::Waiting {
                        // Part of a cycle. Members stay waiting until the re-entered test unwinds.
                        self.close_cycles(id);
                        return Ok(());
                    }
                    if !self.options.force && outcome.blocks_dependents() {
                        let message = format!(
                            "dependency {} had status {}",
                            registry.get(dependency_id).code(),
                            outcome,
                        );
                        self.omit(id, TestResult::new(Outcome::Omitted, message));
                        return Ok(());
                    }
                }
            }
        }

        if test.is_multiconn_variant() {
            self.run_multiconn(id, test, env)?;
        } else {
            let result = self.run_single(id, test, test.code(), env)?;
            self.state.set(id, result);
        }

        for &after in test.afterrun() {
            let current = self.state.result(after);
            if current.outcome == Outcome::NotRun || current.is_filter_omission() {
                self.run_subtree(after, &AllTests, env)?;
            }
        }
        Ok(())
    }

    /// Evaluates a predicate prerequisite, returning the dependent's result if it should not run.
    fn check_predicate(
        &mut self,
        predicate: &Predicate<E>,
        test: &TestDescriptor<E>,
        env: &mut E,
    ) -> Option<TestResult> {
        let info = test.info(test.code());
        match panic::catch_unwind(AssertUnwindSafe(|| predicate.evaluate(&info, env))) {
            Ok(true) => None,
            Ok(false) => Some(TestResult::new(
                Outcome::Omitted,
                format!("dependency function {} failed", predicate.name()),
            )),
            Err(payload) => {
                let result = TestResult::from_panic(payload);
                warn!(
                    code = test.code(),
                    predicate = predicate.name(),
                    "dependency function {}",
                    result.message,
                );
                Some(result)
            }
        }
    }

    fn run_multiconn(
        &mut self,
        id: TestId,
        test: &TestDescriptor<E>,
        env: &mut E,
    ) -> Result<(), Interrupted> {
        let connections = env.secondary_connections();
        if connections.is_empty() {
            self.omit(
                id,
                TestResult::new(Outcome::Omitted, "no secondary connections configured"),
            );
            return Ok(());
        }

        let mut iterations = Vec::with_capacity(connections.len());
        let mut interrupted = None;
        for (index, (label, connection)) in connections.into_iter().enumerate() {
            env.set_secondary_connection(Some(connection));
            let code = format!("{}{}", test.code(), index + 1);
            debug!(%code, %label, "running over secondary connection");
            match self.run_single(id, test, &code, env) {
                Ok(result) => iterations.push(MulticonnIteration {
                    code,
                    label,
                    result,
                }),
                Err(error) => {
                    interrupted = Some(error);
                    break;
                }
            }
        }
        // The slot is cleared even if the run is being interrupted.
        env.set_secondary_connection(None);
        if let Some(error) = interrupted {
            self.state.multiconn.insert(id, iterations);
            return Err(error);
        }

        let result = iterations
            .iter()
            .find(|iteration| !iteration.result.outcome.is_pass_variant())
            .or_else(|| iterations.last())
            .map_or(TestResult::PASSED, |iteration| iteration.result.clone());
        self.state.set(id, result);
        self.state.multiconn.insert(id, iterations);
        Ok(())
    }

    /// Runs a test body once, between the environment's start-up and shut-down hooks.
    fn run_single(
        &mut self,
        id: TestId,
        test: &TestDescriptor<E>,
        code: &str,
        env: &mut E,
    ) -> Result<TestResult, Interrupted> {
        self.check_interrupt()?;
        self.state.set(id, TestResult::RUNNING);
        self.emit(TestEventKind::TestStarted {
            id,
            code: code.to_owned(),
        });
        if self.options.verbose {
            info!("{code:<8} {} : {}", test.full_name(), Outcome::Running);
        }

        let stopwatch = stopwatch();
        let info = test.info(code);
        let mut result = call_guarded(|| {
            env.start_up()?;
            (test.body.0)(&info, env)
        })?;

        let teardown = call_guarded(|| env.shut_down())?;
        if teardown.outcome != Outcome::Passed {
            warn!(code, "shut-down failed: {}", teardown.message);
            result =
                TestResult::new(Outcome::Failed, teardown.message).with_trace(teardown.trace);
        }

        let snapshot = stopwatch.snapshot();
        if self.options.show_time {
            info!(code, "test took {}", format_duration(snapshot.duration));
        }
        if snapshot.exceeds(self.options.timeout) {
            info!(
                code,
                "test took {}, which exceeded the timeout of {}",
                format_duration(snapshot.duration),
                format_duration(self.options.timeout.unwrap_or_default()),
            );
            result = reclassify_too_long(result);
        }

        if self.options.verbose {
            info!("{code:<8} {} : {}", test.full_name(), result.outcome);
        } else {
            debug!(code, outcome = %result.outcome, "test finished");
        }
        self.emit(TestEventKind::TestFinished {
            id,
            code: code.to_owned(),
            result: result.clone(),
            start_time: snapshot.start_time,
            time_taken: snapshot.duration,
        });
        Ok(result)
    }

    fn omit(&mut self, id: TestId, result: TestResult) {
        debug!(
            code = self.registry.get(id).code(),
            "omitted: {}", result.message
        );
        self.state.set(id, result.clone());
        self.emit(TestEventKind::TestOmitted { id, result });
    }

    /// Records the tests on the back edge that re-entered `id`.
    fn record_cycle(&mut self, id: TestId) {
        if let Some(start) = self.path.iter().position(|&test| test == id) {
            self.open_cycles.push(self.path[start..].to_vec());
        }
    }

    /// Omits the members of every cycle that re-entered `id`.
    ///
    /// Called as `id` unwinds, so deeper members have already stopped waiting on their own
    /// prerequisites. Tests further up the path then see an ordinary omitted prerequisite.
    fn close_cycles(&mut self, id: TestId) {
        let (closed, open): (Vec<_>, Vec<_>) = std::mem::take(&mut self.open_cycles)
            .into_iter()
            .partition(|members| members[0] == id);
        self.open_cycles = open;

        for member in closed.into_iter().flatten() {
            if self.state.result(member).outcome != Outcome::Waiting {
                continue;
            }
            warn!(
                code = self.registry.get(member).code(),
                "dependency cycle detected, omitting test"
            );
            self.state.set(
                member,
                TestResult::new(Outcome::Omitted, TestResult::WAITING.message),
            );
            self.state.cycles.push(member);
            self.emit(TestEventKind::CycleDetected { id: member });
        }
    }

    fn check_interrupt(&self) -> Result<(), Interrupted> {
        if self.interrupt.load(Ordering::Acquire) {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, kind: TestEventKind) {
        let event = TestEvent {
            timestamp: Local::now(),
            elapsed: self.stopwatch.elapsed(),
            kind,
        };
        (self.callback.0)(event);
    }
}

/// Calls a body or hook, classifying its error or panic.
fn call_guarded(f: impl FnOnce() -> Result<(), TestError>) -> Result<TestResult, Interrupted> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(TestResult::PASSED),
        Ok(Err(error)) => TestResult::from_test_error(error),
        Err(payload) => Ok(TestResult::from_panic(payload)),
    }
}

fn reclassify_too_long(result: TestResult) -> TestResult {
    let outcome = match result.outcome {
        Outcome::Passed => Outcome::TooLong,
        Outcome::Warning | Outcome::Failed | Outcome::Unsupported => Outcome::TooLongFailed,
        other => other,
    };
    TestResult {
        outcome,
        is_default: false,
        ..result
    }
}
