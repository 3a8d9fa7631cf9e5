// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for conform, the execution engine of a protocol conformance suite.
//!
//! The basic flow of operations is:
//!
//! 1. Test bodies are declared with their metadata (flags, a unique code, prerequisites) through a
//!    [`SuiteBuilder`](registry::SuiteBuilder), which validates and indexes them into an immutable
//!    [`Registry`](registry::Registry).
//! 2. A [`TestRunner`](runner::TestRunner) walks the requested tests depth-first, running
//!    prerequisites first and omitting tests whose prerequisites did not succeed.
//! 3. The [`reporter`] buckets the results and cross-checks them against curated lists of expected
//!    failures and warnings to produce a verdict for the whole run.

pub mod config;
pub mod descriptor;
pub mod errors;
mod helpers;
pub mod outcome;
pub mod registry;
pub mod reporter;
pub mod runner;
pub mod test_filter;
mod time;
