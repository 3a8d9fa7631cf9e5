// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::outcome::TestError;

/// The collaborator that test bodies run against.
///
/// An environment owns whatever the suite needs to talk to the system under test: connections,
/// scratch directories, credentials. The runner only drives its lifecycle hooks.
///
/// Every hook has a default no-op implementation.
pub trait Environment {
    /// A handle to a secondary connection, used by multiconn tests.
    type Connection;

    /// Called once before any test runs.
    fn init(&mut self) -> Result<(), TestError> {
        Ok(())
    }

    /// Called once after the last test has run.
    fn finish(&mut self) -> Result<(), TestError> {
        Ok(())
    }

    /// Called before each test body. An error here is classified like an error from the body.
    fn start_up(&mut self) -> Result<(), TestError> {
        Ok(())
    }

    /// Called after each test body, even if the body failed.
    ///
    /// An error here turns the test's result into a failure, whatever the body did.
    fn shut_down(&mut self) -> Result<(), TestError> {
        Ok(())
    }

    /// The secondary connections a multiconn test should iterate over, as `(label, handle)` pairs.
    fn secondary_connections(&self) -> Vec<(String, Self::Connection)> {
        Vec::new()
    }

    /// Sets or clears the secondary connection seen by test bodies.
    fn set_secondary_connection(&mut self, connection: Option<Self::Connection>) {
        let _ = connection;
    }
}
