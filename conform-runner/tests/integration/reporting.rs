// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use conform_runner::{
    outcome::Outcome,
    registry::{Registry, SuiteBuilder},
    reporter::{
        CrossCheckReport, DisplayOptions, ExpectedSets, ResultClass, ResultDisplayer, RunCounts,
        UnexpectedResult, summary_json,
    },
    runner::{RunOptions, RunState},
    test_filter::AllTests,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

const CODES: &[&str] = &["OPEN1", "OPEN2", "OPEN3", "OPEN4", "OPEN5", "XPT1"];

fn open_registry() -> Registry<RecordingEnv> {
    let mut suite = SuiteBuilder::new();
    suite
        .module("servertests.st_open")
        .test("testOpen1", meta("OPEN1", &["all", "open"], &[]), pass)
        .test("testOpen2", meta("OPEN2", &["all", "open"], &[]), fail)
        .test("testOpen3", meta("OPEN3", &["all", "open"], &[]), warn)
        .test("testOpen4", meta("OPEN4", &["all", "open"], &[]), pass)
        .test("testOpen5", meta("OPEN5", &["all", "open"], &["OPEN2"]), pass);
    suite
        .module("servertests.st_xpt")
        .test("testXpt1", meta("XPT1", &["all", "xpt"], &[]), fail);
    suite.build().expect("valid suite")
}

fn expected_sets() -> ExpectedSets {
    let codes = |codes: &[&str]| codes.iter().map(|code| (*code).to_owned()).collect::<Vec<_>>();
    ExpectedSets::new(
        codes(&["OPEN1", "OPEN2", "COMP3"]),
        codes(&["DELEG1"]),
        codes(&["XPT1"]),
    )
}

fn open_run(registry: &Registry<RecordingEnv>) -> RunState {
    let mut env = RecordingEnv::default();
    let (state, _) = run(registry, RunOptions::default(), &AllTests, CODES, &mut env);
    state
}

#[test]
fn cross_check_findings() {
    let registry = open_registry();
    let state = open_run(&registry);
    let report = expected_sets().cross_check(&registry, &state);

    assert_eq!(
        report,
        CrossCheckReport {
            findings: vec![
                UnexpectedResult {
                    code: "OPEN1".to_owned(),
                    actual: ResultClass::Pass,
                    expected: ResultClass::Failure,
                    ignored: false,
                },
                UnexpectedResult {
                    code: "OPEN3".to_owned(),
                    actual: ResultClass::Warning,
                    expected: ResultClass::Pass,
                    ignored: false,
                },
                UnexpectedResult {
                    code: "XPT1".to_owned(),
                    actual: ResultClass::Failure,
                    expected: ResultClass::Pass,
                    ignored: true,
                },
            ],
            unexpected: 2,
            unconsumed_failures: vec!["OPEN1".to_owned(), "COMP3".to_owned()],
            unconsumed_warnings: vec!["DELEG1".to_owned()],
        }
    );
    assert!(!report.is_clean());
}

#[test]
fn run_counts() {
    let registry = open_registry();
    let state = open_run(&registry);
    let counts = RunCounts::new(&state);

    assert_eq!(
        counts,
        RunCounts {
            not_run: 0,
            omitted_by_filter: 0,
            skipped: 1,
            failed: 2,
            warned: 1,
            passed: 2,
            too_long: 0,
            too_long_failed: 0,
        }
    );
    assert_eq!(counts.selected(), 6);
    assert!(!counts.is_interrupted());
}

#[test]
fn listing_and_summary() {
    let registry = open_registry();
    let state = open_run(&registry);
    let displayer = ResultDisplayer::new(&registry, &state, DisplayOptions::default());

    let mut out = Vec::new();
    displayer.write_results(&mut out).expect("writing to a Vec succeeds");
    let out = String::from_utf8(out).expect("output is UTF-8");
    let lines: Vec<_> = out.lines().collect();

    let rule = "*".repeat(50);
    assert_eq!(lines[0], rule);
    assert_eq!(
        lines[1],
        format!("{:<65} : PASS", "OPEN1    st_open.testOpen1")
    );
    assert_eq!(
        lines[2],
        format!("{:<65} : FAILED", "OPEN2    st_open.testOpen2")
    );
    assert_eq!(
        lines[3],
        format!("{}OPEN2 returned NFS4ERR_INVAL", " ".repeat(11))
    );
    assert_eq!(
        lines[4],
        format!("{:<65} : WARNING", "OPEN3    st_open.testOpen3")
    );
    assert_eq!(lines[5], format!("{}expected NFS4ERR_NOENT", " ".repeat(11)));
    assert_eq!(
        lines[6],
        format!("{:<65} : PASS", "OPEN4    st_open.testOpen4")
    );
    // OPEN5 was omitted, which isn't shown by default.
    assert_eq!(
        lines[7],
        format!("{:<65} : FAILED", "XPT1     st_xpt.testXpt1")
    );
    assert_eq!(lines[9], rule);
    assert_eq!(lines[10], "Command line asked for 6 of 6 tests");
    assert_eq!(
        lines[11],
        "Of those: 1 Skipped, 2 Failed, 1 Warned, 2 Passed, 0 TooLongPass, 0 TooLongFail"
    );
    assert_eq!(lines.len(), 12);
}

#[test]
fn listing_shows_omissions_on_request() {
    let registry = open_registry();
    let state = open_run(&registry);
    let options = DisplayOptions {
        show_omit: true,
        show_pass: false,
        show_warn: false,
        show_fail: false,
        ..DisplayOptions::default()
    };
    let displayer = ResultDisplayer::new(&registry, &state, options);

    let mut out = Vec::new();
    displayer.write_results(&mut out).expect("writing to a Vec succeeds");
    let out = String::from_utf8(out).expect("output is UTF-8");
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(
        lines[1..3].to_vec(),
        vec![
            format!("{:<65} : OMIT", "OPEN5    st_open.testOpen5"),
            format!("{}dependency OPEN2 had status FAILED", " ".repeat(11)),
        ]
    );
}

#[test]
fn interrupted_summary() {
    let registry = open_registry();
    let state = open_run(&registry);
    let displayer = ResultDisplayer::new(&registry, &state, DisplayOptions::default());
    let counts = RunCounts {
        not_run: 5,
        passed: 1,
        ..RunCounts::default()
    };

    let mut out = Vec::new();
    displayer
        .write_summary(&counts, &mut out)
        .expect("writing to a Vec succeeds");
    let out = String::from_utf8(out).expect("output is UTF-8");
    assert_eq!(
        out,
        "Tests interrupted! Only 1 test run\n\
         Of those: 0 Skipped, 0 Failed, 0 Warned, 1 Passed, 0 TooLongPass, 0 TooLongFail\n"
    );
}

#[test]
fn cross_check_output() {
    let registry = open_registry();
    let state = open_run(&registry);
    let report = expected_sets().cross_check(&registry, &state);
    let displayer = ResultDisplayer::new(&registry, &state, DisplayOptions::default());

    let mut out = Vec::new();
    displayer
        .write_cross_check(&report, &mut out)
        .expect("writing to a Vec succeeds");
    let out = String::from_utf8(out).expect("output is UTF-8");
    insta::assert_snapshot!(out, @r"
    **************************************************
    Expectation cross-check:
    Unexpected test PASS: OPEN1 (expected FAILURE)
    Unexpected test WARNING: OPEN3 (expected PASS)
    Unexpected test FAILURE: XPT1 (expected PASS)
    Ignoring FAILURE for test XPT1
    2 unexpected results
    ");
}

#[test]
fn clean_cross_check_output() {
    let registry = open_registry();
    let state = open_run(&registry);
    let codes = |codes: &[&str]| codes.iter().map(|code| (*code).to_owned()).collect::<Vec<_>>();
    let sets = ExpectedSets::new(
        codes(&["OPEN2", "XPT1", "COMP3"]),
        codes(&["OPEN3"]),
        Vec::new(),
    );
    let report = sets.cross_check(&registry, &state);
    assert!(report.is_clean());

    let options = DisplayOptions {
        verbose: true,
        ..DisplayOptions::default()
    };
    let displayer = ResultDisplayer::new(&registry, &state, options);
    let mut out = Vec::new();
    displayer
        .write_cross_check(&report, &mut out)
        .expect("writing to a Vec succeeds");
    let out = String::from_utf8(out).expect("output is UTF-8");
    insta::assert_snapshot!(out, @r"
    **************************************************
    Expectation cross-check:
    Expected failures not observed: COMP3

    You have PASSED with flying colors.
    ");
}

#[test]
fn machine_readable_summary() {
    let registry = open_registry();
    let state = open_run(&registry);
    let report = expected_sets().cross_check(&registry, &state);
    let summary = summary_json(registry.len(), &RunCounts::new(&state), &report);

    assert_eq!(summary.total_tests, 6);
    assert_eq!(summary.counts.failed, 2);
    assert_eq!(summary.counts.skipped, 1);
    assert_eq!(summary.unexpected_count, 2);
    assert!(!summary.clean);
    assert_eq!(summary.unexpected.len(), 3);
    assert_eq!(summary.unexpected[0].code, "OPEN1");
    assert_eq!(summary.unexpected[0].actual, "pass");
    assert_eq!(summary.unexpected[0].expected, "failure");
    assert!(summary.unexpected[2].ignored);
    assert_eq!(summary.unconsumed_failures, vec!["OPEN1", "COMP3"]);
    assert_eq!(summary.unconsumed_warnings, vec!["DELEG1"]);
}

#[test]
fn slow_warnings_are_cross_checked_as_failures() {
    let mut suite = SuiteBuilder::new();
    suite.module("servertests.st_deleg").test(
        "testDeleg1",
        meta("DELEG1", &["all", "deleg"], &[]),
        slow(Duration::from_millis(50), warn),
    );
    let registry = suite.build().expect("valid suite");

    let mut env = RecordingEnv::default();
    let options = RunOptions {
        timeout: Some(Duration::from_millis(5)),
        ..RunOptions::default()
    };
    let (state, _) = run(&registry, options, &AllTests, &["DELEG1"], &mut env);
    let deleg = registry.by_code("DELEG1").expect("registered");
    assert_eq!(state.result(deleg).outcome, Outcome::TooLongFailed);

    let report = expected_sets().cross_check(&registry, &state);
    assert_eq!(
        report.findings,
        vec![UnexpectedResult {
            code: "DELEG1".to_owned(),
            actual: ResultClass::Failure,
            expected: ResultClass::Warning,
            ignored: false,
        }]
    );
    assert_eq!(report.unexpected, 1);
    assert_eq!(report.unconsumed_warnings, vec!["DELEG1".to_owned()]);
}
