//! Conversational-agent provider port.

use crate::provisioning::domain::{AgentBlueprint, AgentConfig, ProviderAgentId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for agent provider operations.
pub type AgentProviderResult<T> = Result<T, AgentProviderError>;

/// Remote service allocating conversational-agent configurations.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Allocates an agent configuration for the blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`AgentProviderError::NoConfiguration`] when the provider
    /// answers without a usable configuration.
    async fn allocate(&self, blueprint: &AgentBlueprint) -> AgentProviderResult<AgentConfig>;

    /// Releases a previously allocated configuration. Releasing a
    /// configuration the provider no longer knows about succeeds.
    async fn release(&self, agent_id: &ProviderAgentId) -> AgentProviderResult<()>;
}

/// Errors returned by agent provider adapters.
#[derive(Debug, Clone, Error)]
pub enum AgentProviderError {
    /// The provider answered without a usable configuration.
    #[error("agent provider returned no usable configuration")]
    NoConfiguration,

    /// The provider rejected the request with a non-success status.
    #[error("agent provider rejected the request with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The call did not complete within the step deadline.
    #[error("agent provider did not answer within {0:?}")]
    TimedOut(Duration),

    /// Transport or decoding failure.
    #[error("agent provider transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl AgentProviderError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
