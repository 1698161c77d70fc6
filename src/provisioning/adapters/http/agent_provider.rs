//! Agent provider adapter speaking the provider's JSON REST API.

use super::{InvalidBaseUrl, endpoint, truncate_body};
use crate::provisioning::{
    domain::{AgentBlueprint, AgentConfig, ProviderAgentId},
    ports::{AgentProvider, AgentProviderError, AgentProviderResult},
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::debug;
use url::Url;

/// Creates and deletes agent configurations over HTTPS.
///
/// `POST {base}/agents` allocates, `DELETE {base}/agents/{id}` releases.
/// Requests carry the API key as a bearer token.
#[derive(Debug, Clone)]
pub struct HttpAgentProvider {
    client: Client,
    base_url: Url,
    api_key: Arc<SecretString>,
}

impl HttpAgentProvider {
    /// Builds the adapter with a per-request transport timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AgentProviderError::Transport`] when the HTTP client cannot
    /// be constructed or the base URL cannot carry a path.
    pub fn new(
        base_url: Url,
        api_key: SecretString,
        request_timeout: Duration,
    ) -> AgentProviderResult<Self> {
        endpoint(&base_url, &[]).map_err(AgentProviderError::transport)?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(AgentProviderError::transport)?;
        Ok(Self {
            client,
            base_url,
            api_key: Arc::new(api_key),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, InvalidBaseUrl> {
        endpoint(&self.base_url, segments)
    }
}

#[derive(Debug, Serialize)]
struct CreateAgentBody<'a> {
    name: &'a str,
    role: &'a str,
    persona: &'a str,
    voice: &'a str,
    prompt: &'a str,
    context_aware: bool,
}

impl<'a> From<&'a AgentBlueprint> for CreateAgentBody<'a> {
    fn from(blueprint: &'a AgentBlueprint) -> Self {
        Self {
            name: &blueprint.name,
            role: &blueprint.role,
            persona: &blueprint.persona,
            voice: &blueprint.voice,
            prompt: &blueprint.prompt,
            context_aware: blueprint.context_aware,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CreateAgentResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    voice: Option<String>,
}

/// Maps the creation response onto an [`AgentConfig`].
///
/// A missing or blank identifier means the provider produced nothing usable.
fn parse_agent_config(response: CreateAgentResponse) -> AgentProviderResult<AgentConfig> {
    let id = response
        .id
        .and_then(|id| ProviderAgentId::new(id).ok())
        .ok_or(AgentProviderError::NoConfiguration)?;
    let mut config = AgentConfig::new(id);
    if let Some(name) = response.name {
        config = config.with_display_name(name);
    }
    if let Some(voice) = response.voice {
        config = config.with_voice(voice);
    }
    Ok(config)
}

async fn rejection(response: Response) -> AgentProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AgentProviderError::Rejected {
        status,
        body: truncate_body(&body),
    }
}

#[async_trait]
impl AgentProvider for HttpAgentProvider {
    async fn allocate(&self, blueprint: &AgentBlueprint) -> AgentProviderResult<AgentConfig> {
        let url = self.url(&["agents"]).map_err(AgentProviderError::transport)?;
        debug!(agent_name = %blueprint.name, url = %url, "allocating agent configuration");
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&CreateAgentBody::from(blueprint))
            .send()
            .await
            .map_err(AgentProviderError::transport)?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let body = response.text().await.map_err(AgentProviderError::transport)?;
        if body.trim().is_empty() {
            return Err(AgentProviderError::NoConfiguration);
        }
        let parsed: CreateAgentResponse =
            serde_json::from_str(&body).map_err(AgentProviderError::transport)?;
        parse_agent_config(parsed)
    }

    async fn release(&self, agent_id: &ProviderAgentId) -> AgentProviderResult<()> {
        let url = self
            .url(&["agents", agent_id.as_str()])
            .map_err(AgentProviderError::transport)?;
        debug!(provider_agent_id = %agent_id, "releasing agent configuration");
        let response = self
            .client
            .delete(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(AgentProviderError::transport)?;
        let status = response.status();
        // An already-deleted configuration is as good as a released one.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(rejection(response).await)
    }
}
