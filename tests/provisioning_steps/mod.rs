//! Step definitions for provisioning BDD scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
