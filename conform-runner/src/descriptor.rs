// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test descriptors: a test body together with the metadata used to schedule it.
//!
//! Each test declares three pieces of metadata:
//!
//! * **flags**: free-form category tags used for selection. At least one is required.
//! * **code**: a short unique identifier such as `OPEN25`. Exactly one is required.
//! * **depends**: codes of prerequisite tests, or names of predicates declared in the same module.
//!
//! Metadata is normally declared with the [`TestMetadata`] builder. Suites that keep metadata in
//! prose can use [`TestMetadata::from_doc`], which reads `FLAGS:`, `DEPEND:` and `CODE:` lines.

use crate::{
    errors::LoadError,
    outcome::TestError,
    registry::{Dependency, FlagMask, TestId},
};
use debug_ignore::DebugIgnore;
use derive_where::derive_where;
use std::{cmp::Ordering, fmt, rc::Rc};

/// The flag that marks a test as needing a second logical connection.
pub const MULTICONN_FLAG: &str = "multiconn";

/// The suffix appended to a test's code to form the code of its multiconn variant.
pub const MULTICONN_SUFFIX: &str = "_MULTICONN";

/// A test body.
///
/// Bodies signal failure by returning one of the [`TestError`] variants.
pub type TestBody<E> = Rc<dyn Fn(&TestInfo<'_>, &mut E) -> Result<(), TestError>>;

/// Metadata declared for a test.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestMetadata {
    /// A one-line summary of what the test checks.
    pub summary: String,

    /// Category flags.
    pub flags: Vec<String>,

    /// Prerequisite codes or predicate names, in the order they're checked.
    pub depends: Vec<String>,

    /// Codes. Exactly one must be present for the test to load.
    pub codes: Vec<String>,
}

impl TestMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the one-line summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Adds category flags.
    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Adds prerequisites.
    pub fn depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends.extend(depends.into_iter().map(Into::into));
        self
    }

    /// Adds a code.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.codes.push(code.into());
        self
    }

    /// Reads metadata out of a block of documentation.
    ///
    /// The first non-empty line is the summary. Each of `FLAGS:`, `DEPEND:` and `CODE:` is read
    /// from the first line that starts with it (after leading whitespace); its value is split on
    /// whitespace. Missing directives produce empty lists.
    pub fn from_doc(doc: &str) -> Self {
        let summary = doc
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_owned();

        let directive = |key: &str| -> Vec<String> {
            doc.lines()
                .find_map(|line| line.trim_start().strip_prefix(key)?.strip_prefix(':'))
                .map(|rest| rest.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default()
        };

        Self {
            summary,
            flags: directive("FLAGS"),
            depends: directive("DEPEND"),
            codes: directive("CODE"),
        }
    }
}

/// A test body plus its metadata, as indexed by the [`Registry`](crate::registry::Registry).
///
/// Descriptors are immutable once the registry is built; the per-run result of each test lives in
/// the runner's state.
#[derive_where(Debug)]
pub struct TestDescriptor<E> {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) module: String,
    pub(crate) code: String,
    pub(crate) summary: String,
    pub(crate) flags: Vec<String>,
    pub(crate) depend_names: Vec<String>,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) flags_mask: FlagMask,
    pub(crate) is_multiconn_variant: bool,
    pub(crate) afterrun: Vec<TestId>,
    pub(crate) body: DebugIgnore<TestBody<E>>,
}

impl<E> TestDescriptor<E> {
    /// Validates metadata and creates a descriptor.
    ///
    /// `module` is the path of the module declaring the test, with components separated by `.`
    /// or `::`; the last component prefixes the test's full name.
    pub(crate) fn new(
        module: &str,
        name: &str,
        metadata: TestMetadata,
        body: TestBody<E>,
    ) -> Result<Self, LoadError> {
        let full_name = match module.rsplit(['.', ':']).next() {
            Some(last) if !last.is_empty() => format!("{last}.{name}"),
            _ => name.to_owned(),
        };

        let TestMetadata {
            summary,
            flags,
            depends,
            codes,
        } = metadata;

        if flags.is_empty() {
            return Err(LoadError::NoFlags { full_name });
        }
        let code = match <[String; 1]>::try_from(codes) {
            Ok([code]) => code,
            Err(codes) => {
                return Err(LoadError::CodeCount {
                    full_name,
                    found: codes.len(),
                });
            }
        };

        Ok(Self {
            name: name.to_owned(),
            full_name,
            module: module.to_owned(),
            code,
            summary,
            flags,
            depend_names: depends,
            dependencies: Vec::new(),
            flags_mask: FlagMask::default(),
            is_multiconn_variant: false,
            afterrun: Vec::new(),
            body: DebugIgnore(body),
        })
    }

    /// Creates the secondary-connection variant of this test.
    ///
    /// The variant shares the body, metadata and prerequisites, and has its own derived code.
    pub(crate) fn multiconn_variant(&self) -> Self {
        Self {
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            module: self.module.clone(),
            code: multiconn_code(&self.code),
            summary: self.summary.clone(),
            flags: self.flags.clone(),
            depend_names: self.depend_names.clone(),
            dependencies: Vec::new(),
            flags_mask: FlagMask::default(),
            is_multiconn_variant: true,
            afterrun: Vec::new(),
            body: DebugIgnore(Rc::clone(&self.body)),
        }
    }

    /// The function identifier of the test.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last module component and the name, joined with `.`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The module that declared this test.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The unique code of this test.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The one-line summary.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// The category flags, in declaration order.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Returns true if the test declares the given flag.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// The prerequisite names as declared.
    pub fn depend_names(&self) -> &[String] {
        &self.depend_names
    }

    /// The resolved prerequisites, in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// The flag bitmask. Bits are assigned suite-wide by the registry.
    pub fn flags_mask(&self) -> &FlagMask {
        &self.flags_mask
    }

    /// True for the secondary-connection variant synthesized for `multiconn` tests.
    pub fn is_multiconn_variant(&self) -> bool {
        self.is_multiconn_variant
    }

    /// Tests scheduled immediately after this one runs.
    pub fn afterrun(&self) -> &[TestId] {
        &self.afterrun
    }

    pub(crate) fn info<'a>(&'a self, code: &'a str) -> TestInfo<'a> {
        TestInfo {
            name: &self.name,
            full_name: &self.full_name,
            code,
            summary: &self.summary,
            is_multiconn_variant: self.is_multiconn_variant,
        }
    }
}

impl<E> fmt::Display for TestDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {}", self.code, self.full_name)
    }
}

/// What a test body or predicate sees of the test being run.
#[derive(Clone, Copy, Debug)]
pub struct TestInfo<'a> {
    /// The function identifier, handy for naming scratch files.
    pub name: &'a str,

    /// The full name.
    pub full_name: &'a str,

    /// The code currently in effect.
    ///
    /// During a multiconn run this is the per-connection code (`CODE1`, `CODE2`, ...).
    pub code: &'a str,

    /// The one-line summary.
    pub summary: &'a str,

    /// True when running as the secondary-connection variant.
    pub is_multiconn_variant: bool,
}

/// Returns the code of the multiconn variant for a test code.
pub fn multiconn_code(code: &str) -> String {
    format!("{code}{MULTICONN_SUFFIX}")
}

/// Orders test codes naturally: `OPEN2 < OPEN10 < OPEN10a < OPENDEL1`.
///
/// A code is split into a non-digit prefix, an optional number and the remainder, which are
/// compared in that order. Codes that compare equal that way (`OP01` and `OP1`) fall back to plain
/// string order so the ordering stays total.
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    CodeSortKey::new(a)
        .cmp(&CodeSortKey::new(b))
        .then_with(|| a.cmp(b))
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct CodeSortKey<'a> {
    prefix: &'a str,
    number: u64,
    rest: &'a str,
}

impl<'a> CodeSortKey<'a> {
    fn new(code: &'a str) -> Self {
        let digits_start = code
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(code.len());
        let (prefix, tail) = code.split_at(digits_start);
        let digits_end = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (digits, rest) = tail.split_at(digits_end);
        // An empty number sorts as zero; an absurdly long one saturates.
        let number = if digits.is_empty() {
            0
        } else {
            digits.parse().unwrap_or(u64::MAX)
        };
        Self {
            prefix,
            number,
            rest,
        }
    }
}
