// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{CrossCheckReport, RunCounts};
use conform_metadata::{RunSummaryJson, UnexpectedResultJson};

/// Builds the machine-readable summary of a run.
pub fn summary_json(
    total_tests: usize,
    counts: &RunCounts,
    report: &CrossCheckReport,
) -> RunSummaryJson {
    RunSummaryJson {
        format_version: RunSummaryJson::FORMAT_VERSION,
        total_tests,
        counts: counts.to_json(),
        unexpected: report
            .findings
            .iter()
            .map(|finding| UnexpectedResultJson {
                code: finding.code.clone(),
                actual: finding.actual.json_name().to_owned(),
                expected: finding.expected.json_name().to_owned(),
                ignored: finding.ignored,
            })
            .collect(),
        unexpected_count: report.unexpected,
        unconsumed_failures: report.unconsumed_failures.clone(),
        unconsumed_warnings: report.unconsumed_warnings.clone(),
        clean: report.is_clean(),
    }
}
