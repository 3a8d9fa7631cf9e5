// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use conform_runner::{
    descriptor::{TestInfo, TestMetadata},
    outcome::{TestError, TestResult},
    registry::{Registry, TestId},
    reporter::{TestEvent, TestEventKind},
    runner::{Environment, RunOptions, RunState, TestRunnerBuilder},
    test_filter::RunFilter,
};
use std::time::Duration;

/// An environment that records every hook and body invocation.
#[derive(Debug, Default)]
pub(crate) struct RecordingEnv {
    pub(crate) calls: Vec<String>,
    pub(crate) connections: Vec<(String, u32)>,
    pub(crate) current_connection: Option<u32>,
    pub(crate) fail_shut_down: bool,
}

impl RecordingEnv {
    pub(crate) fn with_connections(labels: &[&str]) -> Self {
        Self {
            connections: labels
                .iter()
                .zip(1..)
                .map(|(label, handle)| ((*label).to_owned(), handle))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn bodies(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| call.strip_prefix("body:"))
            .collect()
    }
}

impl Environment for RecordingEnv {
    type Connection = u32;

    fn start_up(&mut self) -> Result<(), TestError> {
        self.calls.push("start_up".to_owned());
        Ok(())
    }

    fn shut_down(&mut self) -> Result<(), TestError> {
        self.calls.push("shut_down".to_owned());
        if self.fail_shut_down {
            Err(TestError::fail("could not remove scratch directory"))
        } else {
            Ok(())
        }
    }

    fn secondary_connections(&self) -> Vec<(String, u32)> {
        self.connections.clone()
    }

    fn set_secondary_connection(&mut self, connection: Option<u32>) {
        self.current_connection = connection;
    }
}

pub(crate) fn meta(code: &str, flags: &[&str], depends: &[&str]) -> TestMetadata {
    TestMetadata::new()
        .summary(format!("Checks {code}"))
        .flags(flags.iter().copied())
        .code(code)
        .depends(depends.iter().copied())
}

/// A body that records itself and passes.
pub(crate) fn pass(info: &TestInfo<'_>, env: &mut RecordingEnv) -> Result<(), TestError> {
    record(info, env);
    Ok(())
}

/// A body that records itself and fails.
pub(crate) fn fail(info: &TestInfo<'_>, env: &mut RecordingEnv) -> Result<(), TestError> {
    record(info, env);
    Err(TestError::fail(format!("{} returned NFS4ERR_INVAL", info.code)))
}

/// A body that records itself and warns.
pub(crate) fn warn(info: &TestInfo<'_>, env: &mut RecordingEnv) -> Result<(), TestError> {
    record(info, env);
    Err(TestError::pass_warn("expected NFS4ERR_NOENT"))
}

/// A body that records itself and reports the feature as unsupported.
pub(crate) fn unsupported(info: &TestInfo<'_>, env: &mut RecordingEnv) -> Result<(), TestError> {
    record(info, env);
    Err(TestError::fail_support("delegations not supported"))
}

/// A body that records itself, then sleeps.
pub(crate) fn slow(
    duration: Duration,
    outcome: fn(&TestInfo<'_>, &mut RecordingEnv) -> Result<(), TestError>,
) -> impl Fn(&TestInfo<'_>, &mut RecordingEnv) -> Result<(), TestError> + 'static {
    move |info: &TestInfo<'_>, env: &mut RecordingEnv| {
        std::thread::sleep(duration);
        outcome(info, env)
    }
}

pub(crate) fn record(info: &TestInfo<'_>, env: &mut RecordingEnv) {
    env.calls.push(format!("body:{}", info.code));
}

/// Runs the given codes in order and returns the final state plus every event.
pub(crate) fn run(
    registry: &Registry<RecordingEnv>,
    options: RunOptions,
    filter: &dyn RunFilter<RecordingEnv>,
    codes: &[&str],
    env: &mut RecordingEnv,
) -> (RunState, Vec<TestEvent>) {
    let ids = ids(registry, codes);
    let mut events = Vec::new();
    let mut builder = TestRunnerBuilder::default();
    builder.set_options(options);
    let mut runner = builder.build(registry, filter, |event| events.push(event));
    runner.run_all(&ids, env).expect("run is not interrupted");
    let state = runner.into_state();
    (state, events)
}

pub(crate) fn ids(registry: &Registry<RecordingEnv>, codes: &[&str]) -> Vec<TestId> {
    codes
        .iter()
        .map(|code| {
            registry
                .by_code(code)
                .unwrap_or_else(|| panic!("{code} is registered"))
        })
        .collect()
}

pub(crate) fn result<'a>(
    registry: &Registry<RecordingEnv>,
    state: &'a RunState,
    code: &str,
) -> &'a TestResult {
    state.result(ids(registry, &[code])[0])
}

pub(crate) fn finished_codes(events: &[TestEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match &event.kind {
            TestEventKind::TestFinished { code, .. } => Some(code.clone()),
            _ => None,
        })
        .collect()
}
