// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering tests based on command-line selections.
//!
//! The main data structure in this module is [`SelectionFilter`]. Any other
//! [`RunFilter`], including a plain closure, can be used in its place.

use crate::{
    descriptor::TestDescriptor,
    errors::SelectionParseError,
    registry::{FlagMask, Registry},
    runner::RunOptions,
};
use std::collections::HashSet;
use tracing::debug;

/// The flag selected when no inclusion arguments are given.
pub const DEFAULT_SELECTION_FLAG: &str = "all";

/// Decides whether a test should run at all.
///
/// A test rejected by the filter is omitted with the canonical "Failed runfilter" result.
pub trait RunFilter<E> {
    /// Returns true if the test should run.
    fn should_run(&self, test: &TestDescriptor<E>, options: &RunOptions) -> bool;
}

impl<E, F> RunFilter<E> for F
where
    F: Fn(&TestDescriptor<E>, &RunOptions) -> bool,
{
    fn should_run(&self, test: &TestDescriptor<E>, options: &RunOptions) -> bool {
        self(test, options)
    }
}

/// A filter that accepts every test.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllTests;

impl<E> RunFilter<E> for AllTests {
    fn should_run(&self, _test: &TestDescriptor<E>, _options: &RunOptions) -> bool {
        true
    }
}

/// A filter built from selection arguments.
///
/// Each argument names a flag or a test code. Prefixing it with `no` excludes it instead. A test
/// is selected if it's not excluded, by code or by flag, and is included, by code or by flag.
#[derive(Clone, Debug, Default)]
pub struct SelectionFilter {
    include_codes: HashSet<String>,
    exclude_codes: HashSet<String>,
    include_flags: FlagMask,
    exclude_flags: FlagMask,
}

impl SelectionFilter {
    /// Parses selection arguments against a registry.
    ///
    /// If no argument includes anything, the [`DEFAULT_SELECTION_FLAG`] flag is included when the
    /// suite defines it.
    pub fn parse<E, I, S>(registry: &Registry<E>, args: I) -> Result<Self, SelectionParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            if arg.is_empty() {
                return Err(SelectionParseError::Empty);
            }

            // An exact match wins, so flags that happen to start with "no" stay usable.
            if filter.add(registry, arg, true) {
                continue;
            }
            match arg.strip_prefix("no") {
                Some(name) if filter.add(registry, name, false) => {}
                _ => {
                    return Err(SelectionParseError::Unknown {
                        arg: arg.to_owned(),
                    });
                }
            }
        }

        if filter.include_codes.is_empty() && filter.include_flags.is_empty() {
            if let Some(bit) = registry.flag_bit(DEFAULT_SELECTION_FLAG) {
                filter.include_flags.set(bit);
            }
        }

        debug!(
            include_codes = filter.include_codes.len(),
            exclude_codes = filter.exclude_codes.len(),
            "parsed selection filter"
        );
        Ok(filter)
    }

    fn add<E>(&mut self, registry: &Registry<E>, name: &str, include: bool) -> bool {
        if let Some(bit) = registry.flag_bit(name) {
            if include {
                self.include_flags.set(bit);
            } else {
                self.exclude_flags.set(bit);
            }
            true
        } else if registry.by_code(name).is_some() {
            if include {
                self.include_codes.insert(name.to_owned());
            } else {
                self.exclude_codes.insert(name.to_owned());
            }
            true
        } else {
            false
        }
    }

    /// Returns true if the test is selected.
    pub fn matches<E>(&self, test: &TestDescriptor<E>) -> bool {
        let excluded = self.exclude_codes.contains(test.code())
            || test.flags_mask().intersects(&self.exclude_flags);
        let included = self.include_codes.contains(test.code())
            || test.flags_mask().intersects(&self.include_flags);
        !excluded && included
    }
}

impl<E> RunFilter<E> for SelectionFilter {
    fn should_run(&self, test: &TestDescriptor<E>, _options: &RunOptions) -> bool {
        self.matches(test)
    }
}
