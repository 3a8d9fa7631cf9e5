// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser};
use conform_metadata::ConformExitCode;
use conform_runner::{
    config::SuiteConfig,
    errors::Interrupted,
    registry::{Registry, SuiteBuilder},
    reporter::{
        DisplayOptions, ExpectationContext, ResultDisplayer, RunCounts, TestEventKind,
        summary_json,
    },
    runner::{Environment, RunOptions, RunState, TestRunnerBuilder},
    test_filter::SelectionFilter,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};
use tracing::{debug, warn};

/// Runs a conformance suite.
///
/// Selection arguments name flags or test codes; prefix one with `no` to exclude it. With no
/// inclusion arguments, every test flagged `all` is selected.
#[derive(Debug, Parser)]
#[command(version)]
pub struct SuiteApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    run_opts: RunOpts,

    #[command(flatten)]
    display_opts: DisplayOpts,

    /// Config file [default: .config/conform.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Apply the expectations for runs with a second server
    #[arg(long)]
    second_server: bool,

    /// Write a machine-readable summary of the run to this file
    #[arg(long, value_name = "PATH")]
    json_summary: Option<Utf8PathBuf>,

    /// Flags and test codes to run, each optionally prefixed with `no` to exclude it
    #[arg(value_name = "FLAG|CODE")]
    selection: Vec<String>,
}

impl SuiteApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Returns true if `--second-server` was passed.
    pub fn second_server(&self) -> bool {
        self.second_server
    }

    /// Executes the app against a suite, returning the process exit code.
    ///
    /// Test listings and the cross-check are written to `stdout`; logs go to stderr.
    pub fn exec<E: Environment>(
        self,
        suite: SuiteBuilder<E>,
        env: &mut E,
        output: OutputContext,
        stdout: &mut dyn Write,
    ) -> Result<i32, ExpectedError> {
        let cwd = std::env::current_dir()
            .map_err(|err| ExpectedError::CurrentDirFailed { err })?;
        let root = Utf8PathBuf::try_from(cwd)
            .map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })?;

        let interrupt = Arc::new(AtomicBool::new(false));
        install_signal_handlers(&interrupt)?;

        self.exec_in(&root, suite, env, output, interrupt, stdout)
    }

    // ---
    // Helper methods
    // ---

    fn exec_in<E: Environment>(
        self,
        root: &Utf8Path,
        suite: SuiteBuilder<E>,
        env: &mut E,
        output: OutputContext,
        interrupt: Arc<AtomicBool>,
        stdout: &mut dyn Write,
    ) -> Result<i32, ExpectedError> {
        let config = SuiteConfig::from_sources(root, self.config_file.as_deref())?;
        let registry = suite.build()?;
        let filter = SelectionFilter::parse(&registry, &self.selection)?;

        let mut run_options = self.run_opts.apply(config.run_options());
        run_options.verbose = output.verbose;
        let mut display_options = self.display_opts.apply(config.display_options());
        display_options.verbose = output.verbose;

        env.init().map_err(ExpectedError::environment_init)?;
        let (state, interrupted) = run_suite(&registry, &filter, run_options, interrupt, env);
        if let Err(error) = env.finish() {
            warn!("environment teardown failed: {error}");
        }

        let mut displayer = ResultDisplayer::new(&registry, &state, display_options);
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            displayer.colorize();
        }
        let counts = RunCounts::new(&state);
        let report = config
            .expectations()
            .resolve(&ExpectationContext {
                second_server: self.second_server,
            })
            .cross_check(&registry, &state);

        displayer
            .write_results(stdout)
            .and_then(|()| displayer.write_cross_check(&report, stdout))
            .and_then(|()| stdout.flush())
            .map_err(|err| ExpectedError::WriteOutputError { err })?;

        if let Some(path) = &self.json_summary {
            let summary = summary_json(registry.len(), &counts, &report);
            write_summary(path, &summary)?;
        }

        let code = if interrupted.is_some() {
            ConformExitCode::INTERRUPTED
        } else if counts.selected() == 0 {
            ConformExitCode::NO_TESTS_RUN
        } else if !report.is_clean() {
            ConformExitCode::UNEXPECTED_RESULTS
        } else {
            ConformExitCode::OK
        };
        Ok(code)
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Runner options")]
struct RunOpts {
    /// Run tests even if their prerequisites failed, and skip predicate checks
    #[arg(long)]
    force: bool,

    /// Run prerequisites that the selection would otherwise omit
    #[arg(long)]
    rundeps: bool,

    /// Reclassify tests that take longer than this as TOOLONG or TOOLONGFAIL (0 disables)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Log how long each test took
    #[arg(long)]
    show_time: bool,
}

impl RunOpts {
    /// Applies command-line overrides to options read from config.
    fn apply(&self, mut options: RunOptions) -> RunOptions {
        options.force |= self.force;
        options.run_all_dependencies |= self.rundeps;
        options.show_time |= self.show_time;
        if let Some(timeout) = self.timeout {
            options.timeout = Some(timeout);
        }
        options
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Display options")]
struct DisplayOpts {
    /// Show tests omitted because their prerequisites did not succeed
    #[arg(long)]
    show_omit: bool,

    /// Hide passing tests
    #[arg(long)]
    hide_pass: bool,

    /// Hide warnings
    #[arg(long)]
    hide_warn: bool,

    /// Hide failures
    #[arg(long)]
    hide_fail: bool,

    /// Show each test's summary line
    #[arg(long)]
    show_doc: bool,
}

impl DisplayOpts {
    fn apply(&self, mut options: DisplayOptions) -> DisplayOptions {
        options.show_omit |= self.show_omit;
        options.show_pass &= !self.hide_pass;
        options.show_warn &= !self.hide_warn;
        options.show_fail &= !self.hide_fail;
        options.show_doc |= self.show_doc;
        options
    }
}

/// Runs every selected test in declaration order.
///
/// Returns the final state, along with the code of the test that was running if the run was
/// interrupted.
fn run_suite<E: Environment>(
    registry: &Registry<E>,
    filter: &SelectionFilter,
    options: RunOptions,
    interrupt: Arc<AtomicBool>,
    env: &mut E,
) -> (RunState, Option<Interrupted>) {
    let mut current = None;
    let mut builder = TestRunnerBuilder::default();
    builder.set_options(options).set_interrupt_flag(interrupt);
    let mut runner = builder.build(registry, filter, |event| match event.kind {
        TestEventKind::TestStarted { code, .. } => current = Some(code),
        TestEventKind::TestFinished { .. } => current = None,
        TestEventKind::TestOmitted { .. } | TestEventKind::CycleDetected { .. } => {}
    });

    let ids: Vec<_> = registry.ids().collect();
    let result = runner.run_all(&ids, env);
    let state = runner.into_state();
    match result {
        Ok(()) => (state, None),
        Err(interrupted) => {
            match current {
                Some(code) => warn!(%code, "run interrupted while the test was running"),
                None => warn!("run interrupted"),
            }
            (state, Some(interrupted))
        }
    }
}

fn install_signal_handlers(flag: &Arc<AtomicBool>) -> Result<(), ExpectedError> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(flag))
            .map_err(|err| ExpectedError::SignalHandlerSetupError { err })?;
    }
    debug!("installed signal handlers");
    Ok(())
}

fn write_summary(
    path: &Utf8Path,
    summary: &conform_metadata::RunSummaryJson,
) -> Result<(), ExpectedError> {
    let map_err = |err| ExpectedError::WriteSummaryError {
        path: path.to_owned(),
        err,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(map_err)?);
    serde_json::to_writer_pretty(&mut writer, summary)
        .map_err(std::io::Error::from)
        .and_then(|()| writer.flush())
        .map_err(map_err)
}
