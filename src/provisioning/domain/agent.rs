//! Agent configuration payloads and persisted agent records.

use super::{
    AgentId, AgentType, CompanyId, CompanyName, ProviderAgentId, ProvisioningDomainError,
    TelephonyNumber,
};
use chrono::{DateTime, Utc};
use minijinja::{Environment, context};
use mockable::Clock;
use serde::{Deserialize, Serialize};

const LOAD_BOARD_PROMPT: &str = "\
You are {{ agent_name }}, the virtual load board assistant for {{ company_name }}.
Carriers call or text {{ company_name }} to ask about available freight loads.
Greet every caller on behalf of {{ company_name }}, collect the carrier's MC number,
equipment type and current location, and match them against the open loads you know about.
Keep answers short, confirm pickup and delivery windows before ending a conversation,
and offer a hand-off to a human dispatcher when the carrier wants to negotiate rates.";

/// Creation payload sent to the conversational-agent provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBlueprint {
    /// Display name of the agent.
    pub name: String,
    /// Functional role of the agent.
    pub role: String,
    /// Persona the agent adopts in conversations.
    pub persona: String,
    /// Provider voice identifier.
    pub voice: String,
    /// System prompt text.
    pub prompt: String,
    /// Whether the agent keeps conversational context across turns.
    pub context_aware: bool,
}

impl AgentBlueprint {
    /// Builds the blueprint for an agent type tailored to a company.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningDomainError::PromptRender`] when the prompt
    /// template fails to render.
    pub fn for_company(
        agent_type: AgentType,
        company_name: &CompanyName,
    ) -> Result<Self, ProvisioningDomainError> {
        match agent_type {
            AgentType::LoadBoard => {
                let name = format!("{company_name} Load Board");
                let prompt = render_prompt(LOAD_BOARD_PROMPT, &name, company_name)?;
                Ok(Self {
                    name,
                    role: "Freight load board assistant".to_owned(),
                    persona: "Friendly, efficient freight dispatcher who speaks plainly"
                        .to_owned(),
                    voice: "alloy".to_owned(),
                    prompt,
                    context_aware: true,
                })
            }
        }
    }
}

fn render_prompt(
    template: &str,
    agent_name: &str,
    company_name: &CompanyName,
) -> Result<String, ProvisioningDomainError> {
    let environment = Environment::new();
    environment
        .render_str(
            template,
            context! {
                agent_name => agent_name,
                company_name => company_name.as_str(),
            },
        )
        .map_err(|error| ProvisioningDomainError::PromptRender(error.to_string()))
}

/// Configuration returned by the conversational-agent provider.
///
/// Only the identifying fields are carried forward into the agent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    provider_agent_id: ProviderAgentId,
    display_name: Option<String>,
    voice: Option<String>,
}

impl AgentConfig {
    /// Creates an agent configuration from its provider identifier.
    #[must_use]
    pub const fn new(provider_agent_id: ProviderAgentId) -> Self {
        Self {
            provider_agent_id,
            display_name: None,
            voice: None,
        }
    }

    /// Sets the display name echoed by the provider.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the voice echoed by the provider.
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Returns the provider-issued identifier.
    #[must_use]
    pub const fn provider_agent_id(&self) -> &ProviderAgentId {
        &self.provider_agent_id
    }

    /// Returns the display name echoed by the provider.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the voice echoed by the provider.
    #[must_use]
    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }
}

/// Insert payload for the agent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAgentRecord {
    /// Owning company.
    pub company_id: CompanyId,
    /// Provisioned agent type.
    pub agent_type: AgentType,
    /// Identifier of the remote agent configuration.
    pub provider_agent_id: ProviderAgentId,
    /// Number purchased for the agent in the same run.
    pub telephony_number: TelephonyNumber,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl NewAgentRecord {
    /// Creates an insert payload stamped with the current time.
    #[must_use]
    pub fn new(
        company_id: CompanyId,
        agent_type: AgentType,
        provider_agent_id: ProviderAgentId,
        telephony_number: TelephonyNumber,
        clock: &impl Clock,
    ) -> Self {
        Self {
            company_id,
            agent_type,
            provider_agent_id,
            telephony_number,
            created_at: clock.utc(),
        }
    }
}

/// Agent record created once per successful provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    id: AgentId,
    company_id: CompanyId,
    agent_type: AgentType,
    provider_agent_id: ProviderAgentId,
    telephony_number: TelephonyNumber,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted agent record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAgentData {
    /// Directory-assigned identifier.
    pub id: AgentId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Provisioned agent type.
    pub agent_type: AgentType,
    /// Identifier of the remote agent configuration.
    pub provider_agent_id: ProviderAgentId,
    /// Number attached to the agent.
    pub telephony_number: TelephonyNumber,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Builds the stored record for an insert payload and its assigned
    /// identifier.
    #[must_use]
    pub fn from_new(id: AgentId, record: NewAgentRecord) -> Self {
        let NewAgentRecord {
            company_id,
            agent_type,
            provider_agent_id,
            telephony_number,
            created_at,
        } = record;
        Self {
            id,
            company_id,
            agent_type,
            provider_agent_id,
            telephony_number,
            created_at,
        }
    }

    /// Reconstructs a record from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedAgentData) -> Self {
        Self {
            id: data.id,
            company_id: data.company_id,
            agent_type: data.agent_type,
            provider_agent_id: data.provider_agent_id,
            telephony_number: data.telephony_number,
            created_at: data.created_at,
        }
    }

    /// Returns the directory-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Returns the owning company.
    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Returns the provisioned agent type.
    #[must_use]
    pub const fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Returns the remote agent configuration identifier.
    #[must_use]
    pub const fn provider_agent_id(&self) -> &ProviderAgentId {
        &self.provider_agent_id
    }

    /// Returns the number attached to the agent.
    #[must_use]
    pub const fn telephony_number(&self) -> &TelephonyNumber {
        &self.telephony_number
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
