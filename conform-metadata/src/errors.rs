// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while reading a summary produced by a conform run.
#[derive(Debug)]
pub enum SummaryReadError {
    /// Reading the summary file failed.
    Io(std::io::Error),

    /// Error parsing JSON output.
    Json(serde_json::Error),

    /// The summary was written by a newer, incompatible format version.
    UnsupportedVersion {
        /// The version found in the summary.
        found: u32,
    },
}

impl fmt::Display for SummaryReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(_) => write!(f, "failed to read conform summary"),
            Self::Json(_) => write!(f, "failed to parse conform summary as JSON"),
            Self::UnsupportedVersion { found } => write!(
                f,
                "conform summary has format version {found}, but only version {} is supported",
                crate::RunSummaryJson::FORMAT_VERSION,
            ),
        }
    }
}

impl error::Error for SummaryReadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::UnsupportedVersion { .. } => None,
        }
    }
}
