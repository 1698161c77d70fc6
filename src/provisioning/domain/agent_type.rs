//! Supported agent types.

use super::ParseAgentTypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of AI agent a company can have provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    /// Freight load board assistant answering carrier calls and texts.
    LoadBoard,
}

impl AgentType {
    /// Returns the canonical request and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadBoard => "LoadBoard",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AgentType {
    type Error = ParseAgentTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "LoadBoard" => Ok(Self::LoadBoard),
            _ => Err(ParseAgentTypeError(value.to_owned())),
        }
    }
}
