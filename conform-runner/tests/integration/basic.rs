// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use conform_runner::{
    descriptor::TestInfo,
    errors::{Interrupted, LoadError},
    outcome::{Outcome, TestError, TestResult},
    registry::{Registry, SuiteBuilder, TestId},
    reporter::{TestEvent, TestEventKind},
    runner::{RunOptions, TestRunnerBuilder},
    test_filter::{AllTests, SelectionFilter},
};
use pretty_assertions::assert_eq;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use test_case::test_case;

const ALL: &[&str] = &["all"];

fn chain_registry() -> Registry<RecordingEnv> {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_chain")
        .test("testA", meta("A1", ALL, &[]), fail)
        .test("testB", meta("B1", ALL, &["A1"]), pass)
        .test("testC", meta("C1", ALL, &["B1"]), pass);
    suite.build().expect("chain suite is valid")
}

#[test]
fn failures_propagate_as_omissions() {
    let registry = chain_registry();
    let mut env = RecordingEnv::default();
    let (state, events) = run(&registry, RunOptions::default(), &AllTests, &["C1"], &mut env);

    let a1 = result(&registry, &state, "A1");
    assert_eq!(a1.outcome, Outcome::Failed);
    assert_eq!(a1.message, "A1 returned NFS4ERR_INVAL");

    let b1 = result(&registry, &state, "B1");
    assert_eq!(b1.outcome, Outcome::Omitted);
    assert_eq!(b1.message, "dependency A1 had status FAILED");
    assert!(!b1.is_default);

    let c1 = result(&registry, &state, "C1");
    assert_eq!(c1.outcome, Outcome::Omitted);
    assert_eq!(c1.message, "dependency B1 had status OMIT");

    assert_eq!(env.bodies(), vec!["A1"]);
    assert_eq!(finished_codes(&events), vec!["A1"]);
    let omitted = events
        .iter()
        .filter(|event| matches!(event.kind, TestEventKind::TestOmitted { .. }))
        .count();
    assert_eq!(omitted, 2);
}

#[test]
fn force_runs_past_failed_prerequisites() {
    let registry = chain_registry();
    let mut env = RecordingEnv::default();
    let options = RunOptions {
        force: true,
        ..RunOptions::default()
    };
    let (state, _) = run(&registry, options, &AllTests, &["C1"], &mut env);

    assert_eq!(result(&registry, &state, "A1").outcome, Outcome::Failed);
    assert_eq!(result(&registry, &state, "B1").outcome, Outcome::Passed);
    assert_eq!(result(&registry, &state, "C1").outcome, Outcome::Passed);
    // Prerequisites run depth first.
    assert_eq!(env.bodies(), vec!["A1", "B1", "C1"]);
}

#[test]
fn shared_prerequisites_run_once() {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_shared")
        .test("testRoot", meta("ROOT1", ALL, &[]), pass)
        .test("testLeft", meta("LEFT1", ALL, &["ROOT1"]), pass)
        .test("testRight", meta("RIGHT1", ALL, &["ROOT1", "LEFT1"]), pass);
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let (state, events) = run(
        &registry,
        RunOptions::default(),
        &AllTests,
        &["RIGHT1", "LEFT1", "ROOT1"],
        &mut env,
    );

    assert_eq!(env.bodies(), vec!["ROOT1", "LEFT1", "RIGHT1"]);
    assert_eq!(finished_codes(&events), vec!["ROOT1", "LEFT1", "RIGHT1"]);
    for (_, result) in state.results() {
        assert_eq!(result.outcome, Outcome::Passed);
    }
    // Each body is bracketed by the per-test hooks.
    assert_eq!(env.calls[..3].to_vec(), vec!["start_up", "body:ROOT1", "shut_down"]);
}

fn cycle_registry() -> Registry<RecordingEnv> {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_cycle")
        .test("testPing", meta("PING1", ALL, &["PONG1"]), pass)
        .test("testPong", meta("PONG1", ALL, &["PING1"]), pass)
        .test("testAfter", meta("AFTER1", ALL, &["PING1"]), pass)
        .test("testFree", meta("FREE1", ALL, &[]), pass);
    suite.build().expect("cycles are only detected at run time")
}

fn cycle_events(events: &[TestEvent]) -> Vec<TestId> {
    events
        .iter()
        .filter_map(|event| match event.kind {
            TestEventKind::CycleDetected { id } => Some(id),
            _ => None,
        })
        .collect()
}

#[test]
fn cycles_are_omitted() {
    let registry = cycle_registry();

    let mut env = RecordingEnv::default();
    let (state, events) = run(
        &registry,
        RunOptions::default(),
        &AllTests,
        &["PING1", "PONG1", "AFTER1", "FREE1"],
        &mut env,
    );

    for code in ["PING1", "PONG1"] {
        let result = result(&registry, &state, code);
        assert_eq!(result.outcome, Outcome::Omitted, "{code}");
        assert_eq!(result.message, "Circular dependency", "{code}");
    }
    assert_eq!(
        result(&registry, &state, "AFTER1").message,
        "dependency PING1 had status OMIT"
    );
    assert_eq!(result(&registry, &state, "FREE1").outcome, Outcome::Passed);
    assert_eq!(env.bodies(), vec!["FREE1"]);

    assert_eq!(state.cycles(), ids(&registry, &["PING1", "PONG1"]));
    assert_eq!(cycle_events(&events), ids(&registry, &["PING1", "PONG1"]));
}

#[test]
fn dependents_of_a_cycle_are_not_cycle_members() {
    let registry = cycle_registry();
    let mut env = RecordingEnv::default();
    // AFTER1 reaches the cycle first, so it sits on the path above the re-entered test.
    let (state, events) = run(&registry, RunOptions::default(), &AllTests, &["AFTER1"], &mut env);

    let after = result(&registry, &state, "AFTER1");
    assert_eq!(after.outcome, Outcome::Omitted);
    assert_eq!(after.message, "dependency PING1 had status OMIT");
    for code in ["PING1", "PONG1"] {
        assert_eq!(
            result(&registry, &state, code).message,
            "Circular dependency",
            "{code}"
        );
    }
    assert_eq!(result(&registry, &state, "FREE1").outcome, Outcome::NotRun);

    assert_eq!(state.cycles(), ids(&registry, &["PING1", "PONG1"]));
    assert_eq!(cycle_events(&events), ids(&registry, &["PING1", "PONG1"]));
    let omitted: Vec<_> = events
        .iter()
        .filter_map(|event| match event.kind {
            TestEventKind::TestOmitted { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(omitted, ids(&registry, &["AFTER1"]));
}

#[test_case(warn, Outcome::Warning, Outcome::Passed, "" ; "warnings do not block")]
#[test_case(
    unsupported,
    Outcome::Unsupported,
    Outcome::Omitted,
    "dependency BASE1 had status UNSUPPORTED"
    ; "unsupported blocks"
)]
#[test_case(pass, Outcome::Passed, Outcome::Passed, "" ; "passes do not block")]
fn prerequisite_outcomes(
    body: fn(&TestInfo<'_>, &mut RecordingEnv) -> Result<(), TestError>,
    base: Outcome,
    dependent: Outcome,
    message: &str,
) {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_prereq")
        .test("testBase", meta("BASE1", ALL, &[]), body)
        .test("testDependent", meta("DEP1", ALL, &["BASE1"]), pass);
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let (state, _) = run(&registry, RunOptions::default(), &AllTests, &["DEP1"], &mut env);
    assert_eq!(result(&registry, &state, "BASE1").outcome, base);
    let dep = result(&registry, &state, "DEP1");
    assert_eq!(dep.outcome, dependent);
    assert_eq!(dep.message, message);
}

#[test]
fn predicates_gate_dependents() {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_lock")
        .predicate("needs_blocking_locks", |_: &TestInfo<'_>, _: &mut RecordingEnv| false)
        .predicate("always", |_: &TestInfo<'_>, _: &mut RecordingEnv| true)
        .test(
            "testBlocking",
            meta("LOCK18", ALL, &["needs_blocking_locks"]),
            pass,
        )
        .test("testPlain", meta("LOCK1", ALL, &["always"]), pass);
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let (state, _) = run(
        &registry,
        RunOptions::default(),
        &AllTests,
        &["LOCK18", "LOCK1"],
        &mut env,
    );
    let blocking = result(&registry, &state, "LOCK18");
    assert_eq!(blocking.outcome, Outcome::Omitted);
    assert_eq!(
        blocking.message,
        "dependency function needs_blocking_locks failed"
    );
    assert_eq!(result(&registry, &state, "LOCK1").outcome, Outcome::Passed);
    assert_eq!(env.bodies(), vec!["LOCK1"]);

    // Forcing skips predicate checks entirely.
    let mut env = RecordingEnv::default();
    let options = RunOptions {
        force: true,
        ..RunOptions::default()
    };
    let (state, _) = run(&registry, options, &AllTests, &["LOCK18"], &mut env);
    assert_eq!(result(&registry, &state, "LOCK18").outcome, Outcome::Passed);
}

#[test]
fn panicking_predicates_fail_their_dependent() {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_lock")
        .predicate("server_check", |_: &TestInfo<'_>, _: &mut RecordingEnv| -> bool {
            panic!("server check lost its connection")
        })
        .test("testChecked", meta("LOCK20", ALL, &["server_check"]), pass);
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let (state, _) = run(&registry, RunOptions::default(), &AllTests, &["LOCK20"], &mut env);
    let checked = result(&registry, &state, "LOCK20");
    assert_eq!(checked.outcome, Outcome::Failed);
    assert_eq!(checked.message, "panicked: server check lost its connection");
    assert!(env.bodies().is_empty());
}

#[test_case(false, Outcome::Omitted, "dependency SETUP1 had status OMIT" ; "without rundeps")]
#[test_case(true, Outcome::Passed, "" ; "with rundeps")]
fn rundeps_runs_filtered_prerequisites(rundeps: bool, outcome: Outcome, message: &str) {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_deps")
        .test("testSetup", meta("SETUP1", &["all", "setup"], &[]), pass)
        .test("testUse", meta("USE1", &["all", "use"], &["SETUP1"]), pass);
    let registry = suite.build().expect("valid suite");
    let filter = SelectionFilter::parse(&registry, ["USE1"]).expect("valid selection");

    let mut env = RecordingEnv::default();
    let options = RunOptions {
        run_all_dependencies: rundeps,
        ..RunOptions::default()
    };
    let (state, _) = run(&registry, options, &filter, &["SETUP1", "USE1"], &mut env);

    let use1 = result(&registry, &state, "USE1");
    assert_eq!(use1.outcome, outcome);
    assert_eq!(use1.message, message);

    let setup = result(&registry, &state, "SETUP1");
    if rundeps {
        assert_eq!(setup.outcome, Outcome::Passed);
        assert_eq!(env.bodies(), vec!["SETUP1", "USE1"]);
    } else {
        assert!(setup.is_filter_omission());
        assert!(env.bodies().is_empty());
    }
}

#[test]
fn multiconn_without_connections_is_omitted() {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_lock")
        .test("testLock", meta("LOCK1", &["all", "multiconn"], &[]), pass);
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let (state, _) = run(&registry, RunOptions::default(), &AllTests, &["LOCK1"], &mut env);
    assert_eq!(result(&registry, &state, "LOCK1").outcome, Outcome::Passed);
    let variant = result(&registry, &state, "LOCK1_MULTICONN");
    assert_eq!(variant.outcome, Outcome::Omitted);
    assert_eq!(variant.message, "no secondary connections configured");
    assert_eq!(env.bodies(), vec!["LOCK1"]);
}

#[test]
fn multiconn_runs_once_per_connection() {
    let mut suite = SuiteBuilder::new();
    suite.module("servertests.st_lock").test(
        "testLock",
        meta("LOCK1", &["all", "multiconn"], &[]),
        |info: &TestInfo<'_>, env: &mut RecordingEnv| {
            let call = format!("{}@{:?}", info.code, env.current_connection);
            env.calls.push(call);
            // The second server rejects the lock.
            if env.current_connection == Some(1) {
                Err(TestError::fail("lock denied"))
            } else {
                Ok(())
            }
        },
    );
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::with_connections(&["server2", "server3"]);
    let (state, events) = run(&registry, RunOptions::default(), &AllTests, &["LOCK1"], &mut env);

    let bodies: Vec<_> = env
        .calls
        .iter()
        .filter(|call| !matches!(call.as_str(), "start_up" | "shut_down"))
        .cloned()
        .collect();
    assert_eq!(
        bodies,
        vec![
            "LOCK1@None",
            "LOCK1_MULTICONN1@Some(1)",
            "LOCK1_MULTICONN2@Some(2)",
        ]
    );
    assert_eq!(env.current_connection, None, "slot is cleared afterwards");
    assert_eq!(
        finished_codes(&events),
        vec!["LOCK1", "LOCK1_MULTICONN1", "LOCK1_MULTICONN2"]
    );

    let variant_id = ids(&registry, &["LOCK1_MULTICONN"])[0];
    let iterations = state.multiconn_iterations(variant_id);
    assert_eq!(iterations.len(), 2);
    assert_eq!(iterations[0].label, "server2");
    assert_eq!(iterations[0].result.outcome, Outcome::Failed);
    assert_eq!(iterations[1].code, "LOCK1_MULTICONN2");
    assert_eq!(iterations[1].result.outcome, Outcome::Passed);

    // A failure on any connection fails the variant.
    let variant = state.result(variant_id);
    assert_eq!(variant.outcome, Outcome::Failed);
    assert_eq!(variant.message, "lock denied");
}

#[test_case(pass, Some(Duration::from_millis(5)), Outcome::TooLong ; "slow pass")]
#[test_case(fail, Some(Duration::from_millis(5)), Outcome::TooLongFailed ; "slow failure")]
#[test_case(warn, Some(Duration::from_millis(5)), Outcome::TooLongFailed ; "slow warning")]
#[test_case(pass, Some(Duration::ZERO), Outcome::Passed ; "zero disables")]
#[test_case(fail, None, Outcome::Failed ; "no timeout")]
fn slow_tests_are_reclassified(
    body: fn(&TestInfo<'_>, &mut RecordingEnv) -> Result<(), TestError>,
    timeout: Option<Duration>,
    expected: Outcome,
) {
    let mut suite = SuiteBuilder::new();
    suite.module("servertests.st_slow").test(
        "testSlow",
        meta("SLOW1", ALL, &[]),
        slow(Duration::from_millis(50), body),
    );
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let options = RunOptions {
        timeout,
        ..RunOptions::default()
    };
    let (state, _) = run(&registry, options, &AllTests, &["SLOW1"], &mut env);
    assert_eq!(result(&registry, &state, "SLOW1").outcome, expected);
}

#[test]
fn shut_down_failures_override_the_body() {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_teardown")
        .test("testClean", meta("CLEAN1", ALL, &[]), pass)
        .test("testAfter", meta("CLEAN2", ALL, &["CLEAN1"]), pass);
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv {
        fail_shut_down: true,
        ..RecordingEnv::default()
    };
    let (state, _) = run(&registry, RunOptions::default(), &AllTests, &["CLEAN2"], &mut env);
    let clean = result(&registry, &state, "CLEAN1");
    assert_eq!(clean.outcome, Outcome::Failed);
    assert_eq!(clean.message, "could not remove scratch directory");
    assert_eq!(
        result(&registry, &state, "CLEAN2").message,
        "dependency CLEAN1 had status FAILED"
    );
    assert_eq!(env.calls, vec!["start_up", "body:CLEAN1", "shut_down"]);
}

#[test]
fn panicking_bodies_fail() {
    let mut suite = SuiteBuilder::new();
    suite.module("servertests.st_panic").test(
        "testPanic",
        meta("PANIC1", ALL, &[]),
        |_: &TestInfo<'_>, _: &mut RecordingEnv| -> Result<(), TestError> {
            panic!("unexpected reply from server")
        },
    );
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let (state, _) = run(&registry, RunOptions::default(), &AllTests, &["PANIC1"], &mut env);
    let panicked = result(&registry, &state, "PANIC1");
    assert_eq!(panicked.outcome, Outcome::Failed);
    assert_eq!(panicked.message, "panicked: unexpected reply from server");
    // Shut-down still runs after a panicking body.
    assert_eq!(env.calls, vec!["start_up", "shut_down"]);
}

#[test]
fn interrupt_flag_stops_the_run() {
    let flag = Arc::new(AtomicBool::new(false));
    let body_flag = Arc::clone(&flag);

    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_interrupt")
        .test(
            "testFirst",
            meta("FIRST1", ALL, &[]),
            move |info: &TestInfo<'_>, env: &mut RecordingEnv| {
                record(info, env);
                body_flag.store(true, Ordering::Release);
                Ok(())
            },
        )
        .test("testSecond", meta("SECOND1", ALL, &[]), pass);
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let mut events: Vec<TestEvent> = Vec::new();
    let mut builder = TestRunnerBuilder::default();
    builder.set_interrupt_flag(flag);
    let mut runner = builder.build(&registry, &AllTests, |event| events.push(event));
    let ids = ids(&registry, &["FIRST1", "SECOND1"]);
    assert_eq!(runner.run_all(&ids, &mut env), Err(Interrupted));

    let state = runner.into_state();
    assert_eq!(state.result(ids[0]).outcome, Outcome::Passed);
    assert_eq!(*state.result(ids[1]), TestResult::NOT_RUN);
    assert_eq!(env.bodies(), vec!["FIRST1"]);
    assert_eq!(finished_codes(&events), vec!["FIRST1"]);
}

#[test]
fn interrupted_bodies_stay_running() {
    let mut suite = SuiteBuilder::new();
    suite.module("servertests.st_interrupt").test(
        "testStop",
        meta("STOP1", ALL, &[]),
        |info: &TestInfo<'_>, env: &mut RecordingEnv| {
            record(info, env);
            Err(TestError::Interrupted)
        },
    );
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let mut runner = TestRunnerBuilder::default().build(&registry, &AllTests, |_| {});
    let ids = ids(&registry, &["STOP1"]);
    assert_eq!(runner.run_all(&ids, &mut env), Err(Interrupted));
    assert_eq!(runner.state().result(ids[0]).outcome, Outcome::Running);
    // Shut-down is skipped on interrupt.
    assert_eq!(env.calls, vec!["start_up", "body:STOP1"]);
}

#[test]
fn duplicate_codes_fail_to_load() {
    let mut suite = SuiteBuilder::<RecordingEnv>::new();
    suite
        .module("servertests.st_open")
        .test("testOpen", meta("OPEN1", ALL, &[]), pass);
    suite
        .module("servertests.st_reopen")
        .test("testReopen", meta("OPEN1", ALL, &[]), pass);

    let error = suite.build().expect_err("duplicate code");
    assert_eq!(
        error,
        LoadError::DuplicateCode {
            code: "OPEN1".to_owned(),
            full_name: "st_reopen.testReopen".to_owned(),
            existing: "st_open.testOpen".to_owned(),
        }
    );
    assert_eq!(
        error.to_string(),
        "st_reopen.testReopen trying to use code `OPEN1` already used by st_open.testOpen"
    );
}
