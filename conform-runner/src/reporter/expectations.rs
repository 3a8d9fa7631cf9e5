// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-checking results against curated lists of expected failures and warnings.
//!
//! Suites that run against real servers rarely pass cleanly, so the verdict for a run isn't "did
//! anything fail" but "did anything behave differently from what we expected". Expectations are
//! declared in groups, so each group can carry its own reason in the config file, and are resolved
//! against an [`ExpectationContext`] into flat [`ExpectedSets`].

use crate::{
    outcome::Outcome,
    registry::Registry,
    runner::RunState,
};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::{collections::HashSet, fmt};

/// Curated expectation groups, as declared in config.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Expectations {
    /// Tests expected to fail.
    #[serde(default)]
    pub failures: IndexMap<String, ExpectationGroup>,

    /// Tests expected to warn or be unsupported.
    #[serde(default)]
    pub warnings: IndexMap<String, ExpectationGroup>,

    /// Tests whose unexpected results are reported but not counted.
    #[serde(default)]
    pub ignore_results: IndexMap<String, ExpectationGroup>,
}

impl Expectations {
    /// Flattens the groups that apply in the given context.
    pub fn resolve(&self, cx: &ExpectationContext) -> ExpectedSets {
        fn collect<'a, C: FromIterator<String>>(
            groups: &'a IndexMap<String, ExpectationGroup>,
            cx: &'a ExpectationContext,
        ) -> C {
            groups
                .values()
                .filter(|group| group.when.applies(cx))
                .flat_map(|group| group.codes.iter().cloned())
                .collect()
        }

        ExpectedSets {
            failures: collect(&self.failures, cx),
            warnings: collect(&self.warnings, cx),
            ignore_results: collect(&self.ignore_results, cx),
        }
    }
}

/// A named group of test codes.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ExpectationGroup {
    /// The codes in this group.
    pub codes: Vec<String>,

    /// When this group applies.
    #[serde(default)]
    pub when: ExpectationCondition,
}

/// When an [`ExpectationGroup`] applies.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ExpectationCondition {
    /// Always.
    #[default]
    Always,

    /// Only when a second server is configured.
    SecondServer,

    /// Only when no second server is configured.
    NoSecondServer,
}

impl ExpectationCondition {
    fn applies(self, cx: &ExpectationContext) -> bool {
        match self {
            Self::Always => true,
            Self::SecondServer => cx.second_server,
            Self::NoSecondServer => !cx.second_server,
        }
    }
}

/// Facts about the run that decide which expectation groups apply.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExpectationContext {
    /// Whether a second server was configured.
    pub second_server: bool,
}

/// Flat sets of expected codes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExpectedSets {
    failures: IndexSet<String>,
    warnings: IndexSet<String>,
    ignore_results: HashSet<String>,
}

impl ExpectedSets {
    /// Creates expected sets directly from lists of codes.
    pub fn new<I, J, K>(failures: I, warnings: J, ignore_results: K) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
        K: IntoIterator<Item = String>,
    {
        Self {
            failures: failures.into_iter().collect(),
            warnings: warnings.into_iter().collect(),
            ignore_results: ignore_results.into_iter().collect(),
        }
    }

    /// Returns true if the code is expected to fail.
    pub fn expects_failure(&self, code: &str) -> bool {
        self.failures.contains(code)
    }

    /// Returns true if the code is expected to warn.
    pub fn expects_warning(&self, code: &str) -> bool {
        self.warnings.contains(code)
    }

    /// Compares a run's results against these expectations.
    ///
    /// Each expected failure or warning is consumed by the first matching result; whatever is
    /// left over at the end is reported as unconsumed, which usually means the list has gone stale
    /// (or the test wasn't selected). Tests are visited in natural code order.
    pub fn cross_check<E>(&self, registry: &Registry<E>, state: &RunState) -> CrossCheckReport {
        let mut failures = self.failures.clone();
        let mut warnings = self.warnings.clone();
        let mut findings = Vec::new();
        let mut unexpected = 0;

        for id in registry.sorted_ids() {
            let code = registry.get(id).code();
            let Some(actual) = ResultClass::of(state.result(id).outcome) else {
                continue;
            };

            let expected = match actual {
                ResultClass::Failure => {
                    if failures.shift_remove(code) {
                        None
                    } else if self.warnings.contains(code) {
                        Some(ResultClass::Warning)
                    } else {
                        Some(ResultClass::Pass)
                    }
                }
                ResultClass::Warning => {
                    if warnings.shift_remove(code) {
                        None
                    } else if self.failures.contains(code) {
                        Some(ResultClass::Failure)
                    } else {
                        Some(ResultClass::Pass)
                    }
                }
                ResultClass::Pass => {
                    if self.failures.contains(code) {
                        Some(ResultClass::Failure)
                    } else if self.warnings.contains(code) {
                        Some(ResultClass::Warning)
                    } else {
                        None
                    }
                }
            };

            if let Some(expected) = expected {
                let ignored = self.ignore_results.contains(code);
                if !ignored {
                    unexpected += 1;
                }
                findings.push(UnexpectedResult {
                    code: code.to_owned(),
                    actual,
                    expected,
                    ignored,
                });
            }
        }

        CrossCheckReport {
            findings,
            unexpected,
            unconsumed_failures: failures.into_iter().collect(),
            unconsumed_warnings: warnings.into_iter().collect(),
        }
    }
}

/// The class a result falls into for cross-checking.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ResultClass {
    /// Failed, possibly after taking too long.
    Failure,

    /// Warned or unsupported.
    Warning,

    /// Passed within the time budget.
    Pass,
}

impl ResultClass {
    /// Returns the class of an outcome, or `None` if the outcome isn't cross-checked.
    pub fn of(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::Failed | Outcome::TooLongFailed => Some(Self::Failure),
            Outcome::Unsupported | Outcome::Warning => Some(Self::Warning),
            Outcome::Passed => Some(Self::Pass),
            Outcome::NotRun
            | Outcome::Running
            | Outcome::Waiting
            | Outcome::Omitted
            | Outcome::TooLong
            | Outcome::DependencyFunction => None,
        }
    }

    /// The upper-case name used in report lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Failure => "FAILURE",
            Self::Warning => "WARNING",
            Self::Pass => "PASS",
        }
    }

    /// The lower-case name used in machine-readable output.
    pub fn json_name(self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::Warning => "warning",
            Self::Pass => "pass",
        }
    }
}

impl fmt::Display for ResultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A result that didn't match expectations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnexpectedResult {
    /// The test code.
    pub code: String,

    /// What happened.
    pub actual: ResultClass,

    /// What was expected.
    pub expected: ResultClass,

    /// True if the code is on the ignore list, so this finding doesn't count.
    pub ignored: bool,
}

impl fmt::Display for UnexpectedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unexpected test {}: {} (expected {})",
            self.actual, self.code, self.expected
        )
    }
}

/// The outcome of [`ExpectedSets::cross_check`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CrossCheckReport {
    /// Every unexpected result, ignored ones included, in natural code order.
    pub findings: Vec<UnexpectedResult>,

    /// The number of unexpected results that count against the run.
    pub unexpected: usize,

    /// Expected failures that no test consumed.
    pub unconsumed_failures: Vec<String>,

    /// Expected warnings that no test consumed.
    pub unconsumed_warnings: Vec<String>,
}

impl CrossCheckReport {
    /// Returns true if every result matched expectations.
    pub fn is_clean(&self) -> bool {
        self.unexpected == 0
    }
}
