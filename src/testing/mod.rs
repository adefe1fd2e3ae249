//! Testing utilities for gatehouse
//!
//! Mock identity services, counting session installers and shared fixtures
//! for unit and integration tests. Compiled only for tests and under the
//! `testing` feature.

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
