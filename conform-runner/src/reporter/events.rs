// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{outcome::TestResult, registry::TestId};
use chrono::{DateTime, Local};
use std::time::Duration;

/// A test event.
///
/// Events are produced by a [`TestRunner`](crate::runner::TestRunner) and handed to the callback
/// it was built with.
#[derive(Clone, Debug)]
pub struct TestEvent {
    /// The time at which the event was generated.
    pub timestamp: DateTime<Local>,

    /// The amount of time elapsed since the runner was created.
    pub elapsed: Duration,

    /// The kind of test event this is.
    pub kind: TestEventKind,
}

/// The kind of test event this is.
///
/// Forms part of [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind {
    /// A test body is about to run.
    TestStarted {
        /// The test.
        id: TestId,

        /// The code in effect. During a multiconn run this is the per-connection code.
        code: String,
    },

    /// A test body finished, and its result has been classified.
    TestFinished {
        /// The test.
        id: TestId,

        /// The code in effect.
        code: String,

        /// The classified result, after timeout reclassification.
        result: TestResult,

        /// When the test started.
        start_time: DateTime<Local>,

        /// How long start-up, the body and shut-down took together.
        time_taken: Duration,
    },

    /// A test was omitted without running, by the selection filter or by a prerequisite.
    TestOmitted {
        /// The test.
        id: TestId,

        /// The omission result.
        result: TestResult,
    },

    /// A test was caught in a dependency cycle and has been omitted.
    CycleDetected {
        /// The test.
        id: TestId,
    },
}
