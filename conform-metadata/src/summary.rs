// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::SummaryReadError;
use serde::{Deserialize, Serialize};
use std::io;

/// The machine-readable summary of a single conform run.
///
/// Written at the end of a run when requested. Consumers should check
/// [`format_version`](Self::format_version) before relying on the remaining fields.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunSummaryJson {
    /// The format version of this summary.
    pub format_version: u32,

    /// The total number of tests known to the suite, including multiconn variants.
    pub total_tests: usize,

    /// Per-bucket counts.
    pub counts: RunCountsJson,

    /// Results that disagreed with the curated expectation lists.
    pub unexpected: Vec<UnexpectedResultJson>,

    /// The number of unexpected results that count toward the verdict.
    pub unexpected_count: usize,

    /// Expected failures that were not observed as failures during this run.
    pub unconsumed_failures: Vec<String>,

    /// Expected warnings that were not observed as warnings during this run.
    pub unconsumed_warnings: Vec<String>,

    /// True if no unexpected results were counted.
    pub clean: bool,
}

impl RunSummaryJson {
    /// The current format version.
    pub const FORMAT_VERSION: u32 = 1;

    /// Reads a summary from the given reader.
    pub fn from_reader(reader: impl io::Read) -> Result<Self, SummaryReadError> {
        let summary: Self = serde_json::from_reader(reader).map_err(SummaryReadError::Json)?;
        if summary.format_version != Self::FORMAT_VERSION {
            return Err(SummaryReadError::UnsupportedVersion {
                found: summary.format_version,
            });
        }
        Ok(summary)
    }

    /// Reads a summary from a file on disk.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, SummaryReadError> {
        let file = std::fs::File::open(path).map_err(SummaryReadError::Io)?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// Parses a summary from a string.
    pub fn parse(input: &str) -> Result<Self, SummaryReadError> {
        Self::from_reader(input.as_bytes())
    }

    /// Writes this summary as pretty-printed JSON.
    pub fn write_to(&self, writer: impl io::Write) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }
}

/// Counts for each result bucket of a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunCountsJson {
    /// Tests that were never reached, for example because the run was interrupted.
    pub not_run: usize,
    /// Tests omitted by the selection filter.
    pub omitted_by_filter: usize,
    /// Tests skipped for any other reason, such as a failed dependency.
    pub skipped: usize,
    /// Tests that failed.
    pub failed: usize,
    /// Tests that warned or reported an unsupported feature.
    pub warned: usize,
    /// Tests that passed.
    pub passed: usize,
    /// Tests that passed but exceeded the time budget.
    pub too_long: usize,
    /// Tests that failed and exceeded the time budget.
    pub too_long_failed: usize,
}

/// A single result that disagreed with the expectation lists.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnexpectedResultJson {
    /// The test code.
    pub code: String,
    /// The class of result that was observed: `failure`, `warning` or `pass`.
    pub actual: String,
    /// The class of result that was expected: `failure`, `warning` or `pass`.
    pub expected: String,
    /// True if the code is on the ignore list, so it doesn't count toward the verdict.
    pub ignored: bool,
}
