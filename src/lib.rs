//! Agentline: AI agent provisioning for freight companies.
//!
//! A provisioning run takes a company identifier and an agent type, allocates
//! a conversational-agent configuration at a remote provider, buys a phone
//! number, records the agent locally and attaches the number to the company.
//! Failures after an external acquisition are compensated in reverse order,
//! and anything that cannot be undone is written to an orphan ledger for
//! operators to reconcile.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//!
//! # Modules
//!
//! - [`provisioning`]: Provisioning workflow, saga compensation and reconciliation
//! - [`config`]: Layered runtime configuration
//! - [`telemetry`]: Log subscriber installation

pub mod config;
pub mod provisioning;
pub mod telemetry;
