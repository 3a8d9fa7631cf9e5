// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use conform_runner::{
    descriptor::{TestInfo, TestMetadata},
    outcome::TestError,
    registry::SuiteBuilder,
    runner::Environment,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const SCRATCH_DIR: &str = "/conform";
const PAYLOAD: &[u8] = b"The quick brown fox jumps over the lazy dog";

/// A stand-in server: a flat namespace of files, plus byte-range locks held by owner.
#[derive(Debug, Default)]
pub(crate) struct MemoryEnv {
    files: BTreeMap<String, Vec<u8>>,
    locks: BTreeSet<(String, String)>,
    second_server: bool,
    secondary: Option<String>,
}

impl MemoryEnv {
    pub(crate) fn new(second_server: bool) -> Self {
        Self {
            second_server,
            ..Self::default()
        }
    }

    fn path(info: &TestInfo<'_>) -> String {
        format!("{SCRATCH_DIR}/{}", info.name)
    }

    fn owner(&self) -> &str {
        self.secondary.as_deref().unwrap_or("primary")
    }
}

impl Environment for MemoryEnv {
    type Connection = String;

    fn init(&mut self) -> Result<(), TestError> {
        self.files.insert(SCRATCH_DIR.to_owned(), Vec::new());
        debug!(dir = SCRATCH_DIR, "created scratch directory");
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TestError> {
        self.files.clear();
        Ok(())
    }

    fn shut_down(&mut self) -> Result<(), TestError> {
        let owner = self.owner().to_owned();
        self.locks.retain(|(_, holder)| *holder != owner);
        Ok(())
    }

    fn secondary_connections(&self) -> Vec<(String, String)> {
        if self.second_server {
            vec![("server2".to_owned(), "server2".to_owned())]
        } else {
            Vec::new()
        }
    }

    fn set_secondary_connection(&mut self, connection: Option<String>) {
        self.secondary = connection;
    }
}

fn meta(summary: &str, flags: &[&str], code: &str, depends: &[&str]) -> TestMetadata {
    TestMetadata::new()
        .summary(summary)
        .flags(flags.iter().copied())
        .code(code)
        .depends(depends.iter().copied())
}

pub(crate) fn build() -> SuiteBuilder<MemoryEnv> {
    let mut suite = SuiteBuilder::new();
    suite
        .module("demo.st_write")
        .test(
            "testCreate",
            meta("CREATE a regular file", &["all", "create"], "MKFILE1", &[]),
            create,
        )
        .test(
            "testWrite",
            meta("WRITE to a new file", &["all", "write"], "WRT1", &["MKFILE1"]),
            write,
        )
        .test(
            "testRead",
            meta("READ back what was written", &["all", "read"], "RD1", &["WRT1"]),
            read,
        )
        .test(
            "testUnicodeName",
            meta("CREATE a file with a non-UTF-8 name", &["all", "create"], "COMP3", &[]),
            unicode_name,
        );

    suite
        .module("demo.st_lock")
        .predicate("blocking_locks", |_: &TestInfo<'_>, _: &mut MemoryEnv| false)
        .test(
            "testLock",
            meta("LOCK a byte range", &["all", "lock", "multiconn"], "LOCK1", &["MKFILE1"]),
            lock,
        )
        .test(
            "testBlockingLock",
            meta(
                "Blocking LOCK waits for a conflicting lock",
                &["all", "lock"],
                "LOCK18",
                &["LOCK1", "blocking_locks"],
            ),
            |_: &TestInfo<'_>, _: &mut MemoryEnv| Ok(()),
        )
        .test(
            "testDelegation",
            meta("OPEN grants a read delegation", &["all", "deleg"], "DELEG1", &[]),
            |_: &TestInfo<'_>, _: &mut MemoryEnv| {
                Err(TestError::fail_support("delegations are not supported"))
            },
        );
    suite
}

fn create(info: &TestInfo<'_>, env: &mut MemoryEnv) -> Result<(), TestError> {
    let path = MemoryEnv::path(info);
    if env.files.insert(path.clone(), Vec::new()).is_some() {
        return Err(TestError::pass_warn(format!("{path} already existed")));
    }
    Ok(())
}

fn write(_info: &TestInfo<'_>, env: &mut MemoryEnv) -> Result<(), TestError> {
    env.files
        .insert(format!("{SCRATCH_DIR}/data"), PAYLOAD.to_vec());
    Ok(())
}

fn read(_info: &TestInfo<'_>, env: &mut MemoryEnv) -> Result<(), TestError> {
    let data = env
        .files
        .get(&format!("{SCRATCH_DIR}/data"))
        .ok_or_else(|| TestError::fail("READ returned NFS4ERR_NOENT"))?;
    if data != PAYLOAD {
        return Err(TestError::fail("READ returned stale data"));
    }
    Ok(())
}

fn unicode_name(_info: &TestInfo<'_>, _env: &mut MemoryEnv) -> Result<(), TestError> {
    Err(TestError::fail("CREATE returned NFS4ERR_INVAL for a non-UTF-8 name"))
}

fn lock(info: &TestInfo<'_>, env: &mut MemoryEnv) -> Result<(), TestError> {
    let path = format!("{SCRATCH_DIR}/testCreate");
    if !env.files.contains_key(&path) {
        return Err(TestError::fail(format!("{path} is missing")));
    }
    let owner = env.owner().to_owned();
    if !env.locks.insert((path, owner)) {
        return Err(TestError::fail(format!("{} could not take the lock", info.code)));
    }
    Ok(())
}
