// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`], built with a [`TestRunnerBuilder`]. Tests
//! run against a user-supplied [`Environment`].

mod environment;
mod imp;

pub use environment::*;
pub use imp::*;
