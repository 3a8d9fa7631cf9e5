// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints the results of a run in human-readable form.

use super::{CrossCheckReport, RunCounts};
use crate::{
    descriptor::TestDescriptor,
    helpers::{plural, wrap_indented},
    outcome::{Outcome, TestResult},
    registry::Registry,
    runner::RunState,
};
use derive_where::derive_where;
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use swrite::{SWrite, swrite};

const RULE_WIDTH: usize = 50;

/// Which results the listing shows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DisplayOptions {
    /// Show omitted tests. Tests omitted by the selection filter are never shown.
    pub show_omit: bool,

    /// Show passing tests.
    pub show_pass: bool,

    /// Show warnings and unsupported tests.
    pub show_warn: bool,

    /// Show failures.
    pub show_fail: bool,

    /// Show each test's summary line.
    pub show_doc: bool,

    /// Show full failure traces instead of messages, and unconsumed expectations.
    pub verbose: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_omit: false,
            show_pass: true,
            show_warn: true,
            show_fail: true,
            show_doc: false,
            verbose: false,
        }
    }
}

impl DisplayOptions {
    fn shows(&self, result: &TestResult) -> bool {
        match result.outcome {
            Outcome::NotRun => false,
            Outcome::Omitted if result.is_default => false,
            Outcome::Omitted => self.show_omit,
            Outcome::Passed => self.show_pass,
            Outcome::Unsupported | Outcome::Warning => self.show_warn,
            Outcome::Failed => self.show_fail,
            Outcome::Running
            | Outcome::Waiting
            | Outcome::TooLong
            | Outcome::TooLongFailed
            | Outcome::DependencyFunction => true,
        }
    }
}

/// Writes the end-of-run listing, summary and cross-check for a run.
#[derive_where(Debug)]
pub struct ResultDisplayer<'a, E> {
    registry: &'a Registry<E>,
    state: &'a RunState,
    options: DisplayOptions,
    styles: Styles,
}

impl<'a, E> ResultDisplayer<'a, E> {
    /// Creates a displayer for a finished run.
    pub fn new(registry: &'a Registry<E>, state: &'a RunState, options: DisplayOptions) -> Self {
        Self {
            registry,
            state,
            options,
            styles: Styles::default(),
        }
    }

    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Writes the per-test listing, in natural code order, followed by the bucket counts.
    pub fn write_results(&self, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{}", "*".repeat(RULE_WIDTH))?;
        for id in self.registry.sorted_ids() {
            let result = self.state.result(id);
            if !self.options.shows(result) {
                continue;
            }
            writeln!(writer, "{}", self.format_test(self.registry.get(id), result))?;
            for iteration in self.state.multiconn_iterations(id) {
                writeln!(
                    writer,
                    "    {:<8} [{}] : {}",
                    iteration.code,
                    iteration.label,
                    iteration.result.outcome.style(self.styles.outcome(iteration.result.outcome)),
                )?;
            }
        }
        writeln!(writer, "{}", "*".repeat(RULE_WIDTH))?;
        self.write_summary(&RunCounts::new(self.state), writer)
    }

    /// Writes the "asked for" line and the per-bucket counts.
    pub fn write_summary(&self, counts: &RunCounts, writer: &mut dyn Write) -> io::Result<()> {
        let selected = counts.selected();
        if counts.is_interrupted() {
            writeln!(
                writer,
                "Tests interrupted! Only {} {} run",
                selected.style(self.styles.count),
                plural::tests_str(selected),
            )?;
        } else {
            writeln!(
                writer,
                "Command line asked for {} of {} {}",
                selected.style(self.styles.count),
                self.registry.len().style(self.styles.count),
                plural::tests_str(self.registry.len()),
            )?;
        }

        let mut line = String::from("Of those: ");
        let buckets = [
            (counts.skipped, "Skipped", self.styles.skip),
            (counts.failed, "Failed", self.styles.fail),
            (counts.warned, "Warned", self.styles.warn),
            (counts.passed, "Passed", self.styles.pass),
            (counts.too_long, "TooLongPass", self.styles.warn),
            (counts.too_long_failed, "TooLongFail", self.styles.fail),
        ];
        for (index, (count, label, style)) in buckets.into_iter().enumerate() {
            if index > 0 {
                line.push_str(", ");
            }
            swrite!(line, "{} {}", count.style(self.styles.count), label.style(style));
        }
        writeln!(writer, "{line}")
    }

    /// Writes the outcome of comparing the run against expectations.
    pub fn write_cross_check(
        &self,
        report: &CrossCheckReport,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(writer, "{}", "*".repeat(RULE_WIDTH))?;
        writeln!(writer, "Expectation cross-check:")?;
        for finding in &report.findings {
            let style = if finding.ignored {
                self.styles.skip
            } else {
                self.styles.fail
            };
            writeln!(writer, "{}", finding.style(style))?;
            if finding.ignored {
                writeln!(
                    writer,
                    "Ignoring {} for test {}",
                    finding.actual, finding.code
                )?;
            }
        }

        if self.options.verbose {
            if !report.unconsumed_failures.is_empty() {
                writeln!(
                    writer,
                    "Expected failures not observed: {}",
                    report.unconsumed_failures.join(" ")
                )?;
            }
            if !report.unconsumed_warnings.is_empty() {
                writeln!(
                    writer,
                    "Expected warnings not observed: {}",
                    report.unconsumed_warnings.join(" ")
                )?;
            }
        }

        if report.is_clean() {
            writeln!(
                writer,
                "\n{}\n",
                "You have PASSED with flying colors.".style(self.styles.pass)
            )?;
        } else {
            writeln!(
                writer,
                "{} unexpected {}",
                report.unexpected.style(self.styles.count),
                if report.unexpected == 1 { "result" } else { "results" },
            )?;
        }
        Ok(())
    }

    fn format_test(&self, test: &TestDescriptor<E>, result: &TestResult) -> String {
        let mut out = format!(
            "{:<65} : {}",
            test.to_string(),
            result.outcome.style(self.styles.outcome(result.outcome)),
        );
        if self.options.show_doc && !test.summary().is_empty() {
            swrite!(out, "\n{}", wrap_indented(test.summary(), 5, 70));
        }
        if self.options.verbose && !result.trace.is_empty() {
            swrite!(out, "\n{}", result.trace.join("\n"));
        } else if !result.message.is_empty() {
            swrite!(out, "\n{}", wrap_indented(&result.message, 11, 64));
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    warn: Style,
    fail: Style,
    skip: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.warn = Style::new().yellow().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().dimmed();
    }

    fn outcome(&self, outcome: Outcome) -> Style {
        match outcome {
            Outcome::Passed => self.pass,
            Outcome::Warning | Outcome::Unsupported | Outcome::TooLong => self.warn,
            Outcome::Failed | Outcome::TooLongFailed => self.fail,
            Outcome::NotRun
            | Outcome::Running
            | Outcome::Waiting
            | Outcome::Omitted
            | Outcome::DependencyFunction => self.skip,
        }
    }
}
