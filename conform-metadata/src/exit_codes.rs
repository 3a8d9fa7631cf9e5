// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for conform suite runs.
///
/// Suite runs may fail for a variety of reasons. This structure documents the exit codes that may
/// occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ConformExitCode {}

impl ConformExitCode {
    /// No unexpected results were observed.
    pub const OK: i32 = 0;

    /// No tests were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// One or more tests produced a result that wasn't expected by the curated expectation lists.
    pub const UNEXPECTED_RESULTS: i32 = 100;

    /// The suite could not be assembled: duplicate codes, missing flags, or unresolvable
    /// dependencies.
    pub const SUITE_LOAD_FAILED: i32 = 104;

    /// The environment's one-time initialization failed.
    pub const ENVIRONMENT_INIT_FAILED: i32 = 105;

    /// Writing data to stdout, stderr or a summary file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up the run, e.g. an unreadable config file.
    pub const SETUP_ERROR: i32 = 96;

    /// A selection argument did not name a known flag or test code.
    pub const INVALID_SELECTION: i32 = 94;

    /// The run was interrupted by the operator.
    pub const INTERRUPTED: i32 = 130;
}
