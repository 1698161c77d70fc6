//! Unit tests for the provisioning module.
//!
//! Service tests drive whole runs through the in-memory adapters; mocks are
//! used where a test must prove a collaborator is never touched.

mod compensation_tests;
mod lease_tests;
mod support;
