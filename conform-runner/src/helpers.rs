// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for conform-runner.

use std::time::Duration;
use swrite::{SWrite, swrite};

/// Utilities for pluralizing various words based on count or plurality.
pub(crate) mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub(crate) fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }
}

/// Word-wraps `text` into an indented block.
///
/// Lines start at `start_col` (1-based) and a word is moved to the next line once the current
/// line would run past `end_col`. A single word longer than the available width is kept on its own
/// line rather than split.
pub(crate) fn wrap_indented(text: &str, start_col: usize, end_col: usize) -> String {
    let indent = " ".repeat(start_col.saturating_sub(1));
    let mut out = indent.clone();
    let mut line_len = out.len();
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if line_len + word_len > end_col && line_len > start_col {
            out.push('\n');
            out.push_str(&indent);
            line_len = start_col.saturating_sub(1);
        }
        swrite!(out, " {word}");
        line_len += word_len + 1;
    }
    out
}

/// Formats a duration as seconds with millisecond precision.
pub(crate) fn format_duration(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}
