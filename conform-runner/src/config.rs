// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for conform.
//!
//! The embedded [default config](SuiteConfig::DEFAULT_CONFIG) is layered under an optional user
//! config file, which by default lives at `.config/conform.toml`.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    reporter::{DisplayOptions, Expectations},
    runner::RunOptions,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Overall configuration for a suite run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuiteConfig {
    config_file: Utf8PathBuf,
    run: RunConfig,
    display: DisplayConfig,
    expectations: Expectations,
}

impl SuiteConfig {
    /// The default location of the config, relative to the directory the suite runs in.
    pub const CONFIG_PATH: &'static str = ".config/conform.toml";

    /// Contains the default config as a TOML file.
    ///
    /// User configs are layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from `file`, or from [`CONFIG_PATH`](Self::CONFIG_PATH) under `root` if
    /// `file` isn't given.
    ///
    /// An explicitly named file must exist. The default location is optional.
    pub fn from_sources(root: &Utf8Path, file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let deserialized = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file.clone(), kind))?;
        debug!(%config_file, "loaded config");
        Ok(Self::from_deserialized(config_file, deserialized))
    }

    /// Returns the default config, with no user config layered on top.
    pub fn default_config() -> Self {
        let deserialized = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        Self::from_deserialized(Utf8PathBuf::new(), deserialized)
    }

    /// The user config file this was read from. Empty for the default config.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// The `[run]` section.
    pub fn run(&self) -> &RunConfig {
        &self.run
    }

    /// The `[display]` section.
    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    /// The `[expectations]` section.
    pub fn expectations(&self) -> &Expectations {
        &self.expectations
    }

    /// Returns run options from the config. Command-line overrides are applied by the caller.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            force: self.run.force,
            run_all_dependencies: self.run.run_deps,
            timeout: self.run.timeout,
            show_time: self.run.show_time,
            verbose: false,
        }
    }

    /// Returns display options from the config.
    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            show_omit: self.display.show_omit,
            show_pass: self.display.show_pass,
            show_warn: self.display.show_warn,
            show_fail: self.display.show_fail,
            show_doc: self.display.show_doc,
            verbose: false,
        }
    }

    // ---
    // Helper methods
    // ---

    fn from_deserialized(config_file: Utf8PathBuf, deserialized: SuiteConfigDeserialize) -> Self {
        Self {
            config_file,
            run: deserialized.run,
            display: deserialized.display,
            expectations: deserialized.expectations,
        }
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<SuiteConfigDeserialize, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        serde_path_to_error::deserialize(config).map_err(|error| {
            // The config crate reports the key as well; drop it so the path isn't shown twice.
            let path = error.path().clone();
            let error = match error.into_inner() {
                ConfigError::At { error, .. } => *error,
                other => other,
            };
            ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                path, error,
            )))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SuiteConfigDeserialize {
    run: RunConfig,
    display: DisplayConfig,
    #[serde(default)]
    expectations: Expectations,
}

/// The `[run]` section of the config.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// Tests that take longer than this are reclassified. Zero disables the check.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Run tests even if their prerequisites failed.
    #[serde(default)]
    pub force: bool,

    /// Run prerequisites that the selection would otherwise omit.
    #[serde(default)]
    pub run_deps: bool,

    /// Log how long each test took.
    #[serde(default)]
    pub show_time: bool,
}

/// The `[display]` section of the config.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DisplayConfig {
    /// Show tests omitted by failed prerequisites.
    pub show_omit: bool,

    /// Show passing tests.
    pub show_pass: bool,

    /// Show warnings.
    pub show_warn: bool,

    /// Show failures.
    pub show_fail: bool,

    /// Show each test's summary line.
    #[serde(default)]
    pub show_doc: bool,
}
