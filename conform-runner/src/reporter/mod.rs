// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the results of a test run in human and machine-readable formats.
//!
//! [`ResultDisplayer`] prints the end-of-run listing. [`ExpectedSets::cross_check`] compares the
//! results against curated expectations to decide whether the run as a whole is clean.

mod aggregator;
mod displayer;
mod events;
pub mod expectations;
mod structured;

pub use aggregator::*;
pub use displayer::*;
pub use events::*;
pub use expectations::{
    CrossCheckReport, ExpectationContext, ExpectedSets, Expectations, ResultClass,
    UnexpectedResult,
};
pub use structured::*;
