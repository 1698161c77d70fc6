//! In-memory conversational-agent provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::provisioning::{
    domain::{AgentBlueprint, AgentConfig, ProviderAgentId},
    ports::{AgentProvider, AgentProviderError, AgentProviderResult},
};

/// In-memory agent provider issuing `agent-<n>` identifiers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgentProvider {
    state: Arc<RwLock<InMemoryAgentProviderState>>,
}

#[derive(Debug, Default)]
struct InMemoryAgentProviderState {
    allocate_calls: usize,
    issued: u64,
    allocations: HashMap<ProviderAgentId, AgentBlueprint>,
    released: Vec<ProviderAgentId>,
    withhold_configuration: bool,
    fail_releases: bool,
    stall_allocations: bool,
}

impl InMemoryAgentProvider {
    /// Creates a provider with no allocations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes allocations answer without a usable configuration.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn set_withhold_configuration(&self, withhold: bool) -> AgentProviderResult<()> {
        let mut state = self.state.write().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        state.withhold_configuration = withhold;
        Ok(())
    }

    /// Makes releases fail with a rejected status.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn set_fail_releases(&self, fail: bool) -> AgentProviderResult<()> {
        let mut state = self.state.write().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        state.fail_releases = fail;
        Ok(())
    }

    /// Makes allocations never complete, as if the provider stopped answering.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn set_stall_allocations(&self, stall: bool) -> AgentProviderResult<()> {
        let mut state = self.state.write().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        state.stall_allocations = stall;
        Ok(())
    }

    /// Returns how many allocations were requested.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn allocate_calls(&self) -> AgentProviderResult<usize> {
        let state = self.state.read().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.allocate_calls)
    }

    /// Returns the blueprint behind a live allocation.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn allocation(&self, id: &ProviderAgentId) -> AgentProviderResult<Option<AgentBlueprint>> {
        let state = self.state.read().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.allocations.get(id).cloned())
    }

    /// Returns how many allocations are still live.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn live_allocations(&self) -> AgentProviderResult<usize> {
        let state = self.state.read().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.allocations.len())
    }

    /// Returns released identifiers in release order.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn released(&self) -> AgentProviderResult<Vec<ProviderAgentId>> {
        let state = self.state.read().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.released.clone())
    }
}

#[async_trait]
impl AgentProvider for InMemoryAgentProvider {
    async fn allocate(&self, blueprint: &AgentBlueprint) -> AgentProviderResult<AgentConfig> {
        let stalled = {
            let mut state = self.state.write().map_err(|err| {
                AgentProviderError::transport(std::io::Error::other(err.to_string()))
            })?;
            state.allocate_calls = state.allocate_calls.saturating_add(1);
            state.stall_allocations
        };
        if stalled {
            return std::future::pending().await;
        }

        let mut state = self.state.write().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        if state.withhold_configuration {
            return Err(AgentProviderError::NoConfiguration);
        }

        state.issued = state.issued.saturating_add(1);
        let id = ProviderAgentId::new(format!("agent-{}", state.issued))
            .map_err(AgentProviderError::transport)?;
        state.allocations.insert(id.clone(), blueprint.clone());
        Ok(AgentConfig::new(id)
            .with_display_name(blueprint.name.clone())
            .with_voice(blueprint.voice.clone()))
    }

    async fn release(&self, agent_id: &ProviderAgentId) -> AgentProviderResult<()> {
        let mut state = self.state.write().map_err(|err| {
            AgentProviderError::transport(std::io::Error::other(err.to_string()))
        })?;
        if state.fail_releases {
            return Err(AgentProviderError::Rejected {
                status: 503,
                body: "agent provider unavailable".to_owned(),
            });
        }
        // Releasing an unknown configuration succeeds, as with the remote API.
        if state.allocations.remove(agent_id).is_some() {
            state.released.push(agent_id.clone());
        }
        Ok(())
    }
}
