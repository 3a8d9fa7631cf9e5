// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suite assembly.
//!
//! Tests are declared module by module through a [`SuiteBuilder`]. Building the suite is a
//! two-phase process:
//!
//! 1. Every declaration is validated into a [`TestDescriptor`], and tests flagged
//!    [`multiconn`](crate::descriptor::MULTICONN_FLAG) get a secondary-connection variant.
//! 2. Once all codes and flags are known, flag bits are assigned, codes and flags are checked for
//!    clashes, and prerequisite names are resolved into [`Dependency`] references.
//!
//! The result is an immutable [`Registry`] that the runner borrows. Several registries can coexist
//! in one process.

use crate::{
    descriptor::{MULTICONN_FLAG, TestBody, TestDescriptor, TestInfo, TestMetadata, compare_codes},
    errors::LoadError,
    outcome::{TestError, TestResult},
};
use debug_ignore::DebugIgnore;
use derive_where::derive_where;
use indexmap::IndexMap;
use itertools::Itertools;
use smallvec::SmallVec;
use std::{collections::HashMap, fmt, rc::Rc};
use tracing::debug;

/// A predicate prerequisite: returns false if the dependent test should be omitted.
pub type PredicateFn<E> = Rc<dyn Fn(&TestInfo<'_>, &mut E) -> bool>;

static DEPENDENCY_FUNCTION_RESULT: TestResult = TestResult::DEPENDENCY_FUNCTION;

/// Identifies a test within a [`Registry`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TestId(usize);

impl TestId {
    /// The position of this test in declaration order.
    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// Identifies a predicate within a [`Registry`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PredicateId(usize);

/// A resolved prerequisite.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dependency {
    /// Another test, which must succeed first.
    Test(TestId),

    /// A predicate evaluated against the dependent test and the environment.
    Predicate(PredicateId),
}

/// A predicate declared in a test module.
#[derive_where(Debug)]
pub struct Predicate<E> {
    name: String,
    module: String,
    func: DebugIgnore<PredicateFn<E>>,
}

impl<E> Predicate<E> {
    /// The name of the predicate.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module that declared the predicate.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The permanent marker result carried by predicates, so a dependency walk never runs one.
    pub fn result(&self) -> &'static TestResult {
        &DEPENDENCY_FUNCTION_RESULT
    }

    pub(crate) fn evaluate(&self, test: &TestInfo<'_>, env: &mut E) -> bool {
        (self.func.0)(test, env)
    }
}

/// A growable set of flag bits.
///
/// Bits are assigned suite-wide in first-seen order, so suites aren't limited to 64 flags.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct FlagMask {
    // Invariant: no trailing zero words, so derived equality is set equality.
    words: SmallVec<[u64; 2]>,
}

impl FlagMask {
    /// Creates an empty mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a bit.
    pub fn set(&mut self, bit: usize) {
        let (word, offset) = (bit / 64, bit % 64);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << offset;
    }

    /// Returns true if the bit is set.
    pub fn contains(&self, bit: usize) -> bool {
        self.words
            .get(bit / 64)
            .is_some_and(|word| word & (1 << (bit % 64)) != 0)
    }

    /// Returns true if the two masks share at least one bit.
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }

    /// Returns true if no bits are set.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterates over the set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            (0..64)
                .filter(move |offset| word & (1 << offset) != 0)
                .map(move |offset| index * 64 + offset)
        })
    }
}

impl FromIterator<usize> for FlagMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = Self::new();
        for bit in iter {
            mask.set(bit);
        }
        mask
    }
}

impl fmt::Debug for FlagMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Collects test modules and assembles them into a [`Registry`].
#[derive_where(Debug, Default)]
pub struct SuiteBuilder<E> {
    modules: Vec<ModuleBuilder<E>>,
}

impl<E> SuiteBuilder<E> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Starts declaring a new module and returns it.
    ///
    /// `path` is the dotted module path, for example `servertests.st_open`.
    pub fn module(&mut self, path: impl Into<String>) -> &mut ModuleBuilder<E> {
        let index = self.modules.len();
        self.modules.push(ModuleBuilder::new(path));
        &mut self.modules[index]
    }

    /// Adds a module declared separately.
    pub fn add_module(&mut self, module: ModuleBuilder<E>) -> &mut Self {
        self.modules.push(module);
        self
    }

    /// Validates every declaration and builds the registry.
    pub fn build(self) -> Result<Registry<E>, LoadError> {
        // Phase 1: descriptors, multiconn variants and per-module predicate indexes.
        let mut tests: Vec<TestDescriptor<E>> = Vec::new();
        let mut test_modules = Vec::new();
        let mut predicates = Vec::new();
        let mut module_predicates = Vec::with_capacity(self.modules.len());

        for (module_index, module) in self.modules.into_iter().enumerate() {
            let mut by_name = HashMap::new();
            for (name, func) in module.predicates {
                if by_name.contains_key(&name) {
                    return Err(LoadError::DuplicatePredicate {
                        name,
                        module: module.path,
                    });
                }
                by_name.insert(name.clone(), PredicateId(predicates.len()));
                predicates.push(Predicate {
                    name,
                    module: module.path.clone(),
                    func,
                });
            }
            module_predicates.push(by_name);

            for (name, metadata, body) in module.tests {
                let test = TestDescriptor::new(&module.path, &name, metadata, body.0)?;
                let id = TestId(tests.len());
                let variant = test
                    .has_flag(MULTICONN_FLAG)
                    .then(|| test.multiconn_variant());
                tests.push(test);
                test_modules.push(module_index);

                if let Some(variant) = variant {
                    let variant_id = TestId(tests.len());
                    tests.push(variant);
                    test_modules.push(module_index);
                    tests[id.0].afterrun.push(variant_id);
                }
            }
        }

        // Phase 2: indexes.
        let mut codes: HashMap<String, TestId> = HashMap::with_capacity(tests.len());
        for (index, test) in tests.iter().enumerate() {
            if let Some(existing) = codes.get(&test.code) {
                return Err(LoadError::DuplicateCode {
                    code: test.code.clone(),
                    full_name: test.full_name.clone(),
                    existing: tests[existing.0].full_name.clone(),
                });
            }
            codes.insert(test.code.clone(), TestId(index));
        }

        let mut flags: IndexMap<String, usize> = IndexMap::new();
        for test in &tests {
            for flag in &test.flags {
                let next_bit = flags.len();
                flags.entry(flag.clone()).or_insert(next_bit);
            }
        }
        if let Some(flag) = flags.keys().find(|flag| codes.contains_key(*flag)) {
            return Err(LoadError::FlagIsCode { flag: flag.clone() });
        }

        for (test, &module_index) in tests.iter_mut().zip(&test_modules) {
            test.flags_mask = test.flags.iter().map(|flag| flags[flag]).collect();

            let mut dependencies = Vec::with_capacity(test.depend_names.len());
            for name in &test.depend_names {
                let by_code = codes.get(name);
                let by_predicate = module_predicates[module_index].get(name);
                let dependency = match (by_code, by_predicate) {
                    (Some(&id), None) => Dependency::Test(id),
                    (None, Some(&id)) => Dependency::Predicate(id),
                    (Some(_), Some(_)) => {
                        return Err(LoadError::AmbiguousDependency {
                            name: name.clone(),
                            full_name: test.full_name.clone(),
                            module: test.module.clone(),
                        });
                    }
                    (None, None) => {
                        return Err(LoadError::UnknownDependency {
                            name: name.clone(),
                            full_name: test.full_name.clone(),
                        });
                    }
                };
                dependencies.push(dependency);
            }
            test.dependencies = dependencies;
        }

        debug!(
            tests = tests.len(),
            flags = flags.len(),
            predicates = predicates.len(),
            "suite assembled"
        );

        Ok(Registry {
            tests,
            predicates,
            codes,
            flags,
        })
    }
}

/// The tests and predicates declared by a single module.
#[derive_where(Debug)]
pub struct ModuleBuilder<E> {
    path: String,
    tests: Vec<(String, TestMetadata, DebugIgnore<TestBody<E>>)>,
    predicates: Vec<(String, DebugIgnore<PredicateFn<E>>)>,
}

impl<E> ModuleBuilder<E> {
    /// Creates a module with the given dotted path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tests: Vec::new(),
            predicates: Vec::new(),
        }
    }

    /// Declares a test. Tests keep their declaration order.
    pub fn test<F>(&mut self, name: impl Into<String>, metadata: TestMetadata, body: F) -> &mut Self
    where
        F: Fn(&TestInfo<'_>, &mut E) -> Result<(), TestError> + 'static,
    {
        self.tests
            .push((name.into(), metadata, DebugIgnore(Rc::new(body))));
        self
    }

    /// Declares a predicate that tests in this module may list as a prerequisite.
    pub fn predicate<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&TestInfo<'_>, &mut E) -> bool + 'static,
    {
        self.predicates
            .push((name.into(), DebugIgnore(Rc::new(predicate))));
        self
    }
}

/// The assembled suite: every test descriptor plus the code and flag indexes.
#[derive_where(Debug)]
pub struct Registry<E> {
    tests: Vec<TestDescriptor<E>>,
    predicates: Vec<Predicate<E>>,
    codes: HashMap<String, TestId>,
    flags: IndexMap<String, usize>,
}

impl<E> Registry<E> {
    /// The number of tests, multiconn variants included.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if the suite has no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Returns the descriptor for a test.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different registry and is out of range.
    pub fn get(&self, id: TestId) -> &TestDescriptor<E> {
        &self.tests[id.0]
    }

    /// Looks up a test by code.
    pub fn by_code(&self, code: &str) -> Option<TestId> {
        self.codes.get(code).copied()
    }

    /// Returns the bit assigned to a flag.
    pub fn flag_bit(&self, flag: &str) -> Option<usize> {
        self.flags.get(flag).copied()
    }

    /// Iterates over flags and their bits, in first-seen order.
    pub fn flags(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.flags.iter().map(|(flag, &bit)| (flag.as_str(), bit))
    }

    /// Returns a predicate.
    pub fn predicate(&self, id: PredicateId) -> &Predicate<E> {
        &self.predicates[id.0]
    }

    /// Iterates over test ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = TestId> + '_ {
        (0..self.tests.len()).map(TestId)
    }

    /// Iterates over tests in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (TestId, &TestDescriptor<E>)> + '_ {
        self.tests
            .iter()
            .enumerate()
            .map(|(index, test)| (TestId(index), test))
    }

    /// Returns all test ids in natural code order.
    pub fn sorted_ids(&self) -> Vec<TestId> {
        self.ids()
            .sorted_by(|a, b| compare_codes(&self.get(*a).code, &self.get(*b).code))
            .collect()
    }
}
