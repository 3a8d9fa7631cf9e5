// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    outcome::{Outcome, TestResult},
    runner::RunState,
};
use conform_metadata::RunCountsJson;

/// Counts of results, bucketed for the end-of-run summary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunCounts {
    /// Tests that never ran, including any test the run was interrupted in the middle of.
    pub not_run: usize,

    /// Tests omitted by the selection filter.
    pub omitted_by_filter: usize,

    /// Tests omitted for any other reason: failed prerequisites, predicates or cycles.
    pub skipped: usize,

    /// Failed tests.
    pub failed: usize,

    /// Tests that warned or were unsupported.
    pub warned: usize,

    /// Passed tests.
    pub passed: usize,

    /// Tests that passed but took too long.
    pub too_long: usize,

    /// Tests that failed and took too long.
    pub too_long_failed: usize,
}

impl RunCounts {
    /// Buckets every result in a run.
    pub fn new(state: &RunState) -> Self {
        let mut counts = Self::default();
        for (_, result) in state.results() {
            counts.add(result);
        }
        counts
    }

    fn add(&mut self, result: &TestResult) {
        let bucket = match result.outcome {
            Outcome::NotRun | Outcome::Running => &mut self.not_run,
            Outcome::Omitted if result.is_default => &mut self.omitted_by_filter,
            Outcome::Waiting | Outcome::Omitted => &mut self.skipped,
            Outcome::Failed => &mut self.failed,
            Outcome::Unsupported | Outcome::Warning => &mut self.warned,
            Outcome::Passed => &mut self.passed,
            Outcome::TooLong => &mut self.too_long,
            Outcome::TooLongFailed => &mut self.too_long_failed,
            Outcome::DependencyFunction => return,
        };
        *bucket += 1;
    }

    /// The number of tests the selection asked for: everything but not-run and filtered tests.
    pub fn selected(&self) -> usize {
        self.skipped
            + self.failed
            + self.warned
            + self.passed
            + self.too_long
            + self.too_long_failed
    }

    /// Returns true if some test never got to run.
    pub fn is_interrupted(&self) -> bool {
        self.not_run > 0
    }

    /// Converts these counts into their machine-readable form.
    pub fn to_json(&self) -> RunCountsJson {
        RunCountsJson {
            not_run: self.not_run,
            omitted_by_filter: self.omitted_by_filter,
            skipped: self.skipped,
            failed: self.failed,
            warned: self.warned,
            passed: self.passed,
            too_long: self.too_long,
            too_long_failed: self.too_long_failed,
        }
    }
}
