//! AI agent provisioning for business customers.
//!
//! A provisioning run allocates a conversational-agent configuration from a
//! remote agent provider, purchases a telephony number, persists the agent
//! record, and attaches the number to the company profile. Runs are modelled
//! as sagas: each forward step that has an undo registers a compensation, and
//! anything that cannot be undone is written to the orphan ledger for
//! operator reconciliation. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
