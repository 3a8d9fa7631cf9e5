// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::{FromPathBufError, Utf8PathBuf};
use conform_metadata::ConformExitCode;
use conform_runner::{
    errors::{ConfigParseError, LoadError, SelectionParseError},
    outcome::TestError,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that stops a suite run before it produces a verdict.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not read the current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("suite load error")]
    SuiteLoadError {
        #[from]
        err: LoadError,
    },
    #[error("selection parse error")]
    SelectionParseError {
        #[from]
        err: SelectionParseError,
    },
    #[error("error setting up signal handler")]
    SignalHandlerSetupError {
        #[source]
        err: std::io::Error,
    },
    #[error("environment initialization failed")]
    EnvironmentInitFailed {
        #[source]
        err: TestError,
    },
    #[error("interrupted during environment initialization")]
    InitInterrupted,
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("error writing summary")]
    WriteSummaryError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn environment_init(err: TestError) -> Self {
        match err {
            TestError::Interrupted => Self::InitInterrupted,
            err => Self::EnvironmentInitFailed { err },
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::SignalHandlerSetupError { .. } => ConformExitCode::SETUP_ERROR,
            Self::SuiteLoadError { .. } => ConformExitCode::SUITE_LOAD_FAILED,
            Self::SelectionParseError { .. } => ConformExitCode::INVALID_SELECTION,
            Self::EnvironmentInitFailed { .. } => ConformExitCode::ENVIRONMENT_INIT_FAILED,
            Self::InitInterrupted => ConformExitCode::INTERRUPTED,
            Self::WriteOutputError { .. } | Self::WriteSummaryError { .. } => {
                ConformExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not read the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!("current directory is not valid UTF-8");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::SuiteLoadError { err } => {
                error!("failed to assemble the suite");
                Some(err as &dyn Error)
            }
            Self::SelectionParseError { err } => {
                error!("{err}");
                if matches!(err, SelectionParseError::Unknown { .. }) {
                    error!(
                        target: NO_HEADING_TARGET,
                        "{}",
                        "(hint: prefix a flag or code with `no` to exclude it)"
                            .style(styles.warning_text)
                    );
                }
                None
            }
            Self::SignalHandlerSetupError { err } => {
                error!("error setting up signal handler");
                Some(err as &dyn Error)
            }
            Self::EnvironmentInitFailed { err } => {
                error!("environment initialization failed");
                Some(err as &dyn Error)
            }
            Self::InitInterrupted => {
                error!("interrupted during environment initialization");
                None
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::WriteSummaryError { path, err } => {
                error!("error writing summary to `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
