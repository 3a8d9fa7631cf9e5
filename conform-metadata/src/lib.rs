// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-facing data for conform runs.
//!
//! This crate holds the parts of a conform run that other tools may depend on: the documented
//! process exit codes, and the JSON summary written at the end of a run.

mod errors;
mod exit_codes;
mod summary;

pub use errors::*;
pub use exit_codes::*;
pub use summary::*;
