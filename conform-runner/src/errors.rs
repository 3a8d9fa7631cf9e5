// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by conform.

use camino::Utf8PathBuf;
use config::ConfigError;
use thiserror::Error;

/// An error that prevents a suite from being assembled.
///
/// Load errors are always fatal: no test runs if the suite can't be built.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// A test declared no flags, so it can't be selected by category.
    #[error("{full_name} has no flags")]
    NoFlags {
        /// The full name of the test.
        full_name: String,
    },

    /// A test declared zero codes, or more than one.
    #[error("{full_name} needs exactly one code (found {found})")]
    CodeCount {
        /// The full name of the test.
        full_name: String,
        /// The number of codes found.
        found: usize,
    },

    /// Two tests share a code.
    #[error("{full_name} trying to use code `{code}` already used by {existing}")]
    DuplicateCode {
        /// The code in question.
        code: String,
        /// The full name of the test that tried to reuse the code.
        full_name: String,
        /// The full name of the test that first claimed the code.
        existing: String,
    },

    /// A flag has the same name as a test code, making selection arguments ambiguous.
    #[error("flag `{flag}` is also used as a test code")]
    FlagIsCode {
        /// The flag in question.
        flag: String,
    },

    /// A prerequisite name matches neither a test code nor a predicate in the test's module.
    #[error("could not find reference to dependency `{name}` of {full_name}")]
    UnknownDependency {
        /// The prerequisite name.
        name: String,
        /// The full name of the dependent test.
        full_name: String,
    },

    /// A prerequisite name matches both a test code and a predicate in the test's module.
    #[error(
        "dependency `{name}` of {full_name} is ambiguous: it names both a test code and a \
         predicate in module `{module}`"
    )]
    AmbiguousDependency {
        /// The prerequisite name.
        name: String,
        /// The full name of the dependent test.
        full_name: String,
        /// The module holding the predicate.
        module: String,
    },

    /// Two predicates with the same name were declared in one module.
    #[error("predicate `{name}` declared twice in module `{module}`")]
    DuplicatePredicate {
        /// The predicate name.
        name: String,
        /// The module.
        module: String,
    },
}

/// An error that occurs while parsing selection arguments.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum SelectionParseError {
    /// An argument named neither a flag nor a test code.
    #[error("`{arg}` is neither a known flag nor a known test code")]
    Unknown {
        /// The argument, without any `no` prefix.
        arg: String,
    },

    /// An argument was empty.
    #[error("empty selection argument")]
    Empty,
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse conform config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// The run was interrupted by the operator.
///
/// This is the one condition that is never classified as a test outcome: it always propagates out
/// of the runner.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("test run interrupted")]
pub struct Interrupted;
