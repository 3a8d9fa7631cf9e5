// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outcome taxonomy: what can happen to a test, and how test bodies signal it.
//!
//! Every test carries exactly one [`TestResult`]. It starts out as [`TestResult::NOT_RUN`], moves
//! to [`WAITING`](TestResult::WAITING) while its prerequisites are resolved, and then either gets
//! omitted or runs to a terminal outcome.

use crate::errors::Interrupted;
use std::{any::Any, borrow::Cow, error::Error, fmt};
use thiserror::Error;

/// The outcome of a single test.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Outcome {
    /// Not yet considered.
    NotRun,

    /// The test body is currently executing.
    Running,

    /// Prerequisites are being resolved. A test observed in this state by its own dependency walk
    /// is part of a cycle.
    Waiting,

    /// The test was skipped, either by the selection filter or because a prerequisite did not
    /// succeed.
    Omitted,

    /// The test failed.
    Failed,

    /// The server doesn't support the feature under test. Counts as a warning for reporting, but
    /// blocks dependents like a failure.
    Unsupported,

    /// Technically a pass, but there was a better way.
    Warning,

    /// The test passed.
    Passed,

    /// The test passed, but took longer than the configured time budget.
    TooLong,

    /// The test did not pass cleanly and took longer than the configured time budget.
    TooLongFailed,

    /// Marker carried by predicate prerequisites, which are never run themselves.
    DependencyFunction,
}

impl Outcome {
    /// Returns the display name for this outcome.
    pub fn name(self) -> &'static str {
        match self {
            Self::NotRun => "NOT RUN",
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING TO RUN",
            Self::Omitted => "OMIT",
            Self::Failed => "FAILED",
            Self::Unsupported => "UNSUPPORTED",
            Self::Warning => "WARNING",
            Self::Passed => "PASS",
            Self::TooLong => "TOOLONG",
            Self::TooLongFailed => "TOOLONGFAIL",
            Self::DependencyFunction => "DEPENDENCY FUNCTION",
        }
    }

    /// Returns true if a test with this outcome will never be run again in this process.
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Omitted
            | Self::Failed
            | Self::Unsupported
            | Self::Warning
            | Self::Passed
            | Self::TooLong
            | Self::TooLongFailed => true,
            Self::NotRun | Self::Running | Self::Waiting | Self::DependencyFunction => false,
        }
    }

    /// Returns true if a prerequisite with this outcome causes its dependents to be omitted.
    pub fn blocks_dependents(self) -> bool {
        matches!(self, Self::Omitted | Self::Failed | Self::Unsupported)
    }

    /// Returns true for the outcomes that count as a failure when reporting.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::TooLongFailed)
    }

    /// Returns true for the outcomes that count as a warning when reporting.
    pub fn is_warning(self) -> bool {
        matches!(self, Self::Unsupported | Self::Warning)
    }

    /// Returns true for the outcomes that count as success: passes, warnings and slow passes.
    pub fn is_pass_variant(self) -> bool {
        matches!(self, Self::Passed | Self::Warning | Self::TooLong)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// The result of a test: an [`Outcome`] plus a message and an optional trace.
///
/// Results compare equal to a bare [`Outcome`] if their outcomes match.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestResult {
    /// The outcome.
    pub outcome: Outcome,

    /// A human-readable message. Empty for plain passes.
    pub message: Cow<'static, str>,

    /// The failure trace, outermost error first. Shown in verbose output.
    pub trace: Vec<String>,

    /// True for the shared canonical results.
    ///
    /// In particular, an omission with `is_default` set means "omitted by the selection filter",
    /// as opposed to an omission caused by a prerequisite.
    pub is_default: bool,
}

impl TestResult {
    /// The initial result of every test.
    pub const NOT_RUN: Self = Self {
        outcome: Outcome::NotRun,
        message: Cow::Borrowed(""),
        trace: Vec::new(),
        is_default: false,
    };

    /// A plain pass.
    pub const PASSED: Self = Self::canonical(Outcome::Passed, "");

    /// The test body is executing.
    pub const RUNNING: Self = Self::canonical(Outcome::Running, "");

    /// Provisional marker while prerequisites resolve.
    pub const WAITING: Self = Self::canonical(Outcome::Waiting, "Circular dependency");

    /// Omitted by the selection filter.
    pub const OMITTED: Self = Self::canonical(Outcome::Omitted, "Failed runfilter");

    /// Marker for predicate prerequisites.
    pub const DEPENDENCY_FUNCTION: Self = Self::canonical(Outcome::DependencyFunction, "");

    const fn canonical(outcome: Outcome, message: &'static str) -> Self {
        Self {
            outcome,
            message: Cow::Borrowed(message),
            trace: Vec::new(),
            is_default: true,
        }
    }

    /// Creates a new, non-canonical result.
    pub fn new(outcome: Outcome, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            outcome,
            message: message.into(),
            trace: Vec::new(),
            is_default: false,
        }
    }

    /// Attaches a trace to this result.
    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.trace = trace;
        self
    }

    /// Returns true if the selection filter omitted this test.
    pub fn is_filter_omission(&self) -> bool {
        self.outcome == Outcome::Omitted && self.is_default
    }

    /// Classifies the error returned by a test body or environment hook.
    ///
    /// Operator interrupts are not classified: they are handed back so they can propagate.
    pub(crate) fn from_test_error(error: TestError) -> Result<Self, Interrupted> {
        let result = match error {
            TestError::Interrupted => return Err(Interrupted),
            TestError::Failure(message) => Self::signalled(Outcome::Failed, message),
            TestError::Unsupported(message) => Self::signalled(Outcome::Unsupported, message),
            TestError::Warning(message) => Self::signalled(Outcome::Warning, message),
            TestError::Other(error) => {
                let trace = error_chain(&*error);
                // Display the outermost error: it's the one with the most context.
                let message = trace.first().cloned().unwrap_or_default();
                Self::new(Outcome::Failed, message).with_trace(trace)
            }
        };
        Ok(result)
    }

    /// Classifies a panic payload caught while running a body or hook.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_owned(),
                Err(_) => "(non-string panic payload)".to_owned(),
            },
        };
        let message = format!("panicked: {message}");
        Self::new(Outcome::Failed, message.clone()).with_trace(vec![message])
    }

    fn signalled(outcome: Outcome, message: String) -> Self {
        let trace = vec![format!("{}: {message}", outcome.name())];
        Self::new(outcome, message).with_trace(trace)
    }
}

impl PartialEq<Outcome> for TestResult {
    fn eq(&self, other: &Outcome) -> bool {
        self.outcome == *other
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outcome.fmt(f)
    }
}

fn error_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(err) = source {
        chain.push(format!("caused by: {err}"));
        source = err.source();
    }
    chain
}

/// An error returned by a test body, predicate or environment hook.
///
/// The three recognized signals map onto outcomes: [`Failure`](Self::Failure) to
/// [`Outcome::Failed`], [`Unsupported`](Self::Unsupported) to [`Outcome::Unsupported`] and
/// [`Warning`](Self::Warning) to [`Outcome::Warning`]. Any other error is demoted to a failure.
#[derive(Debug, Error)]
pub enum TestError {
    /// The test failed.
    #[error("{0}")]
    Failure(String),

    /// The feature under test is not supported.
    #[error("{0}")]
    Unsupported(String),

    /// The test passed, but with a caveat.
    #[error("{0}")]
    Warning(String),

    /// The operator asked for the run to stop. Never classified, always propagated.
    #[error("interrupted by operator")]
    Interrupted,

    /// Any other error.
    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync + 'static>),
}

impl TestError {
    /// Fails the test with the given message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Marks the feature under test as unsupported.
    pub fn fail_support(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Passes the test with a warning.
    pub fn pass_warn(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    /// Wraps an arbitrary error.
    pub fn other(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }
}
