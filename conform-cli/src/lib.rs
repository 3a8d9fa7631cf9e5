// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line front end for conform suites.
//!
//! A suite binary declares its tests through a [`SuiteBuilder`](conform_runner::registry::SuiteBuilder),
//! then hands the builder and its [`Environment`](conform_runner::runner::Environment) to
//! [`SuiteApp::exec`]. The app reads config, parses the selection, runs the suite, prints the
//! listing and the expectation cross-check, and returns the process exit code.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
pub use output::{Color, OutputContext, StderrStyles};
