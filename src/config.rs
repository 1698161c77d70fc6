//! Layered runtime configuration.
//!
//! Values start from built-in defaults, are patched by an optional TOML file
//! (`agentline.toml` or `config/agentline.toml` unless a path is given), and
//! are finally overridden by `AGENTLINE_*` environment variables. The merged
//! result is validated before it is returned.

use crate::provisioning::{
    domain::{CountryCode, InboundCallbacks, NumberPolicy},
    services::{CompensationPolicy, ProvisioningSettings},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "agentline.toml";
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_LEASE_TTL_SECS: u64 = 3_600;

/// Fully resolved application configuration.
#[derive(Debug)]
pub struct AppConfig {
    /// Relational store holding companies, agents, leases and orphans.
    pub database: DatabaseConfig,
    /// Conversational-agent provider endpoint.
    pub agent_provider: AgentProviderConfig,
    /// Telephony provider endpoint and number policy.
    pub telephony: TelephonyConfig,
    /// Orchestration knobs.
    pub provisioning: ProvisioningConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Database connection settings.
#[derive(Debug)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL; may embed credentials.
    pub url: SecretString,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub timeout_secs: u64,
}

/// Agent provider settings.
#[derive(Debug)]
pub struct AgentProviderConfig {
    /// API root, for example `https://api.agents.example.com/v1`.
    pub base_url: String,
    /// Bearer token.
    pub api_key: SecretString,
    /// Per-request transport timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Telephony provider settings.
#[derive(Debug)]
pub struct TelephonyConfig {
    /// API root including the version segment.
    pub base_url: String,
    /// Account identifier.
    pub account_sid: String,
    /// Account auth token.
    pub auth_token: SecretString,
    /// Per-request transport timeout in seconds.
    pub request_timeout_secs: u64,
    /// ISO 3166-1 alpha-2 country to search in.
    pub country: String,
    /// Whether candidates must support SMS.
    pub sms_required: bool,
    /// Candidates fetched and tried per acquisition.
    pub candidate_limit: u32,
    /// Optional area code filter.
    pub area_code: Option<String>,
    /// Inbound SMS webhook registered on purchase.
    pub sms_webhook_url: Option<String>,
    /// Inbound voice webhook registered on purchase.
    pub voice_webhook_url: Option<String>,
}

/// Provisioning run settings.
#[derive(Clone, Debug)]
pub struct ProvisioningConfig {
    /// Deadline for each external call, in seconds.
    pub step_timeout_secs: u64,
    /// Lifetime of the per-company lease, in seconds.
    pub lease_ttl_secs: u64,
    /// Whether a company that already has a number may be provisioned again.
    pub allow_reprovision: bool,
    /// Release purchased numbers when a later step fails.
    pub release_numbers_on_failure: bool,
    /// Release agent configurations when a later step fails.
    pub release_agents_on_failure: bool,
}

/// Log output settings.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default level directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log line rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Single-line human-readable output.
    Compact,
    /// Multi-line human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// How [`AppConfig::load`] locates its file.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
    /// Fail when no config file is found.
    pub require_file: bool,
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("could not read config file `{path}`: {source}")]
    ReadFile {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile {
        /// File path.
        path: PathBuf,
        /// Underlying TOML error.
        source: Box<toml::de::Error>,
    },
    /// A config file was required but none was found.
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    /// An environment variable holds an unparsable value.
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// The merged configuration is inconsistent.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: secret_value("postgres://localhost/agentline".to_owned()),
                max_connections: 5,
                timeout_secs: 30,
            },
            agent_provider: AgentProviderConfig {
                base_url: String::new(),
                api_key: secret_value(String::new()),
                request_timeout_secs: 30,
            },
            telephony: TelephonyConfig {
                base_url: "https://api.twilio.com/2010-04-01".to_owned(),
                account_sid: String::new(),
                auth_token: secret_value(String::new()),
                request_timeout_secs: 30,
                country: "US".to_owned(),
                sms_required: true,
                candidate_limit: 1,
                area_code: None,
                sms_webhook_url: None,
                voice_webhook_url: None,
            },
            provisioning: ProvisioningConfig {
                step_timeout_secs: 30,
                lease_ttl_secs: 120,
                allow_reprovision: false,
                release_numbers_on_failure: true,
                release_agents_on_failure: true,
            },
            logging: LoggingConfig {
                level: "info".to_owned(),
                format: LogFormat::Compact,
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Loads defaults, the config file and `AGENTLINE_*` overrides, then
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, an
    /// override does not parse, or validation fails.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        Self::load_with_env(options, |key| env::var(key).ok())
    }

    fn load_with_env<E>(options: LoadOptions, lookup: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = resolve_config_path(options.config_path.as_deref()) {
            config.apply_patch(read_patch(&path)?);
        } else if options.require_file {
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        let overrides = EnvOverrides {
            lookup: |key: &str| lookup(key).filter(|value| !value.trim().is_empty()),
        };
        config.apply_env_overrides(&overrides)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = secret_value(url);
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent_provider) = patch.agent_provider {
            if let Some(base_url) = agent_provider.base_url {
                self.agent_provider.base_url = base_url;
            }
            if let Some(api_key) = agent_provider.api_key {
                self.agent_provider.api_key = secret_value(api_key);
            }
            if let Some(timeout) = agent_provider.request_timeout_secs {
                self.agent_provider.request_timeout_secs = timeout;
            }
        }

        if let Some(telephony) = patch.telephony {
            self.telephony.apply_patch(telephony);
        }

        if let Some(provisioning) = patch.provisioning {
            if let Some(step_timeout_secs) = provisioning.step_timeout_secs {
                self.provisioning.step_timeout_secs = step_timeout_secs;
            }
            if let Some(lease_ttl_secs) = provisioning.lease_ttl_secs {
                self.provisioning.lease_ttl_secs = lease_ttl_secs;
            }
            if let Some(allow_reprovision) = provisioning.allow_reprovision {
                self.provisioning.allow_reprovision = allow_reprovision;
            }
            if let Some(release_numbers) = provisioning.release_numbers_on_failure {
                self.provisioning.release_numbers_on_failure = release_numbers;
            }
            if let Some(release_agents) = provisioning.release_agents_on_failure {
                self.provisioning.release_agents_on_failure = release_agents;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides<E>(&mut self, env: &EnvOverrides<E>) -> Result<(), ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env.get("AGENTLINE_DATABASE_URL") {
            self.database.url = secret_value(value);
        }
        if let Some(value) = env.parsed("AGENTLINE_DATABASE_MAX_CONNECTIONS")? {
            self.database.max_connections = value;
        }
        if let Some(value) = env.parsed("AGENTLINE_DATABASE_TIMEOUT_SECS")? {
            self.database.timeout_secs = value;
        }

        if let Some(value) = env.get("AGENTLINE_AGENT_PROVIDER_BASE_URL") {
            self.agent_provider.base_url = value;
        }
        if let Some(value) = env.get("AGENTLINE_AGENT_PROVIDER_API_KEY") {
            self.agent_provider.api_key = secret_value(value);
        }
        if let Some(value) = env.parsed("AGENTLINE_AGENT_PROVIDER_REQUEST_TIMEOUT_SECS")? {
            self.agent_provider.request_timeout_secs = value;
        }

        if let Some(value) = env.get("AGENTLINE_TELEPHONY_BASE_URL") {
            self.telephony.base_url = value;
        }
        if let Some(value) = env.get("AGENTLINE_TELEPHONY_ACCOUNT_SID") {
            self.telephony.account_sid = value;
        }
        if let Some(value) = env.get("AGENTLINE_TELEPHONY_AUTH_TOKEN") {
            self.telephony.auth_token = secret_value(value);
        }
        if let Some(value) = env.parsed("AGENTLINE_TELEPHONY_REQUEST_TIMEOUT_SECS")? {
            self.telephony.request_timeout_secs = value;
        }
        if let Some(value) = env.get("AGENTLINE_TELEPHONY_COUNTRY") {
            self.telephony.country = value;
        }
        if let Some(value) = env.parsed("AGENTLINE_TELEPHONY_SMS_REQUIRED")? {
            self.telephony.sms_required = value;
        }
        if let Some(value) = env.parsed("AGENTLINE_TELEPHONY_CANDIDATE_LIMIT")? {
            self.telephony.candidate_limit = value;
        }
        if let Some(value) = env.get("AGENTLINE_TELEPHONY_AREA_CODE") {
            self.telephony.area_code = Some(value);
        }
        if let Some(value) = env.get("AGENTLINE_TELEPHONY_SMS_WEBHOOK_URL") {
            self.telephony.sms_webhook_url = Some(value);
        }
        if let Some(value) = env.get("AGENTLINE_TELEPHONY_VOICE_WEBHOOK_URL") {
            self.telephony.voice_webhook_url = Some(value);
        }

        if let Some(value) = env.parsed("AGENTLINE_PROVISIONING_STEP_TIMEOUT_SECS")? {
            self.provisioning.step_timeout_secs = value;
        }
        if let Some(value) = env.parsed("AGENTLINE_PROVISIONING_LEASE_TTL_SECS")? {
            self.provisioning.lease_ttl_secs = value;
        }
        if let Some(value) = env.parsed("AGENTLINE_PROVISIONING_ALLOW_REPROVISION")? {
            self.provisioning.allow_reprovision = value;
        }

        if let Some(value) = env
            .get("AGENTLINE_LOGGING_LEVEL")
            .or_else(|| env.get("AGENTLINE_LOG_LEVEL"))
        {
            self.logging.level = value;
        }
        if let Some(value) = env
            .get("AGENTLINE_LOGGING_FORMAT")
            .or_else(|| env.get("AGENTLINE_LOG_FORMAT"))
        {
            self.logging.format = value.parse()?;
        }
        Ok(())
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_agent_provider(&self.agent_provider)?;
        validate_telephony(&self.telephony)?;
        validate_provisioning(&self.provisioning)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Builds the orchestration settings from the provisioning and telephony
    /// sections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the number policy is invalid.
    pub fn provisioning_settings(&self) -> Result<ProvisioningSettings, ConfigError> {
        let settings = ProvisioningSettings::new(self.telephony.number_policy()?)
            .with_step_timeout(Duration::from_secs(self.provisioning.step_timeout_secs))
            .with_lease_ttl(Duration::from_secs(self.provisioning.lease_ttl_secs))
            .with_allow_reprovision(self.provisioning.allow_reprovision)
            .with_compensation(CompensationPolicy {
                release_numbers: self.provisioning.release_numbers_on_failure,
                release_agent_configurations: self.provisioning.release_agents_on_failure,
            });
        Ok(settings)
    }
}

impl AgentProviderConfig {
    /// Parses the API root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the URL is missing or
    /// malformed.
    pub fn url(&self) -> Result<Url, ConfigError> {
        parse_http_url("agent_provider.base_url", &self.base_url)
    }

    /// Returns the per-request transport timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl TelephonyConfig {
    fn apply_patch(&mut self, patch: TelephonyPatch) {
        if let Some(base_url) = patch.base_url {
            self.base_url = base_url;
        }
        if let Some(account_sid) = patch.account_sid {
            self.account_sid = account_sid;
        }
        if let Some(auth_token) = patch.auth_token {
            self.auth_token = secret_value(auth_token);
        }
        if let Some(timeout) = patch.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(country) = patch.country {
            self.country = country;
        }
        if let Some(sms_required) = patch.sms_required {
            self.sms_required = sms_required;
        }
        if let Some(candidate_limit) = patch.candidate_limit {
            self.candidate_limit = candidate_limit;
        }
        if let Some(area_code) = patch.area_code {
            self.area_code = Some(area_code);
        }
        if let Some(sms_webhook_url) = patch.sms_webhook_url {
            self.sms_webhook_url = Some(sms_webhook_url);
        }
        if let Some(voice_webhook_url) = patch.voice_webhook_url {
            self.voice_webhook_url = Some(voice_webhook_url);
        }
    }

    /// Parses the API root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the URL is missing or
    /// malformed.
    pub fn url(&self) -> Result<Url, ConfigError> {
        parse_http_url("telephony.base_url", &self.base_url)
    }

    /// Returns the per-request transport timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Builds the number search policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first invalid key.
    pub fn number_policy(&self) -> Result<NumberPolicy, ConfigError> {
        let country = CountryCode::new(self.country.as_str())
            .map_err(|err| ConfigError::Validation(format!("telephony.country: {err}")))?;
        let mut policy = NumberPolicy::new(country)
            .with_sms_required(self.sms_required)
            .with_candidate_limit(self.candidate_limit)
            .map_err(|err| ConfigError::Validation(format!("telephony.candidate_limit: {err}")))?;
        if let Some(area_code) = &self.area_code {
            policy = policy
                .with_area_code(area_code.as_str())
                .map_err(|err| ConfigError::Validation(format!("telephony.area_code: {err}")))?;
        }
        let callbacks = InboundCallbacks {
            sms_url: self
                .sms_webhook_url
                .as_deref()
                .map(|raw| parse_http_url("telephony.sms_webhook_url", raw))
                .transpose()?,
            voice_url: self
                .voice_webhook_url
                .as_deref()
                .map(|raw| parse_http_url("telephony.voice_webhook_url", raw))
                .transpose()?,
        };
        Ok(policy.with_callbacks(callbacks))
    }
}

struct EnvOverrides<E>
where
    E: Fn(&str) -> Option<String>,
{
    lookup: E,
}

impl<E> EnvOverrides<E>
where
    E: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| {
                value
                    .trim()
                    .parse::<T>()
                    .map_err(|_| ConfigError::InvalidEnvOverride {
                        key: key.to_owned(),
                        value,
                    })
            })
            .transpose()
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [
        PathBuf::from(DEFAULT_CONFIG_FILE),
        Path::new("config").join(DEFAULT_CONFIG_FILE),
    ]
    .into_iter()
    .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<ConfigPatch>(&raw).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Validation(format!("{key} is required")));
    }
    let url = Url::parse(trimmed)
        .map_err(|err| ConfigError::Validation(format!("{key} is not a valid URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(url)
}

fn validate_timeout(key: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "{key} must be in range 1..={MAX_TIMEOUT_SECS}"
        )));
    }
    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.expose_secret().trim();
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        return Err(ConfigError::Validation(
            "database.url must be a PostgreSQL URL (`postgres://...`)".to_owned(),
        ));
    }
    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_owned(),
        ));
    }
    validate_timeout("database.timeout_secs", database.timeout_secs)
}

fn validate_agent_provider(agent_provider: &AgentProviderConfig) -> Result<(), ConfigError> {
    agent_provider.url()?;
    if agent_provider.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent_provider.api_key is required".to_owned(),
        ));
    }
    validate_timeout(
        "agent_provider.request_timeout_secs",
        agent_provider.request_timeout_secs,
    )
}

fn validate_telephony(telephony: &TelephonyConfig) -> Result<(), ConfigError> {
    telephony.url()?;
    if telephony.account_sid.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telephony.account_sid is required".to_owned(),
        ));
    }
    if telephony.auth_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "telephony.auth_token is required".to_owned(),
        ));
    }
    validate_timeout(
        "telephony.request_timeout_secs",
        telephony.request_timeout_secs,
    )?;
    telephony.number_policy().map(|_| ())
}

fn validate_provisioning(provisioning: &ProvisioningConfig) -> Result<(), ConfigError> {
    validate_timeout(
        "provisioning.step_timeout_secs",
        provisioning.step_timeout_secs,
    )?;
    if provisioning.lease_ttl_secs == 0 || provisioning.lease_ttl_secs > MAX_LEASE_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "provisioning.lease_ttl_secs must be in range 1..={MAX_LEASE_TTL_SECS}"
        )));
    }
    // A run renews its lease before each billable or mutating step; at most
    // three bounded calls separate a renewal from the next one or from the
    // final attach.
    if provisioning.lease_ttl_secs < provisioning.step_timeout_secs.saturating_mul(4) {
        return Err(ConfigError::Validation(
            "provisioning.lease_ttl_secs must cover at least four step timeouts".to_owned(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    match logging.level.trim().to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    agent_provider: Option<AgentProviderPatch>,
    telephony: Option<TelephonyPatch>,
    provisioning: Option<ProvisioningPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentProviderPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TelephonyPatch {
    base_url: Option<String>,
    account_sid: Option<String>,
    auth_token: Option<String>,
    request_timeout_secs: Option<u64>,
    country: Option<String>,
    sms_required: Option<bool>,
    candidate_limit: Option<u32>,
    area_code: Option<String>,
    sms_webhook_url: Option<String>,
    voice_webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProvisioningPatch {
    step_timeout_secs: Option<u64>,
    lease_ttl_secs: Option<u64>,
    allow_reprovision: Option<bool>,
    release_numbers_on_failure: Option<bool>,
    release_agents_on_failure: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, LoadOptions, LogFormat};
    use rstest::rstest;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    const VALID_FILE: &str = r#"
[database]
url = "postgres://db.internal/agentline"

[agent_provider]
base_url = "https://agents.example.com/v1"
api_key = "key-from-file"

[telephony]
account_sid = "AC-file"
auth_token = "token-from-file"
country = "ca"
candidate_limit = 3
sms_webhook_url = "https://hooks.example.com/sms"

[provisioning]
step_timeout_secs = 10
lease_ttl_secs = 90

[logging]
level = "warn"
"#;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("agentline.toml");
        fs::write(&path, contents).expect("config file should be written");
        path
    }

    fn load(path: PathBuf, vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        AppConfig::load_with_env(
            LoadOptions {
                config_path: Some(path),
                require_file: true,
            },
            |key| env.get(key).cloned(),
        )
    }

    #[test]
    fn file_values_patch_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let config = load(write_config(&dir, VALID_FILE), &[]).expect("config should load");

        assert_eq!(config.telephony.account_sid, "AC-file");
        assert_eq!(config.telephony.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Compact);

        let settings = config.provisioning_settings().expect("settings");
        assert_eq!(settings.step_timeout(), Duration::from_secs(10));
        assert_eq!(settings.lease_ttl(), Duration::from_secs(90));
        assert_eq!(settings.number_policy().country().as_str(), "CA");
        assert_eq!(settings.number_policy().candidate_limit(), 3);
        assert!(settings.number_policy().callbacks().sms_url.is_some());
    }

    #[test]
    fn environment_overrides_file() {
        let dir = TempDir::new().expect("temp dir");
        let config = load(
            write_config(&dir, VALID_FILE),
            &[
                ("AGENTLINE_AGENT_PROVIDER_API_KEY", "key-from-env"),
                ("AGENTLINE_TELEPHONY_CANDIDATE_LIMIT", "5"),
                ("AGENTLINE_LOG_FORMAT", "json"),
                ("AGENTLINE_PROVISIONING_ALLOW_REPROVISION", "true"),
            ],
        )
        .expect("config should load");

        assert_eq!(config.agent_provider.api_key.expose_secret(), "key-from-env");
        assert_eq!(config.telephony.candidate_limit, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.provisioning.allow_reprovision);
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let dir = TempDir::new().expect("temp dir");
        let config = load(
            write_config(&dir, VALID_FILE),
            &[("AGENTLINE_TELEPHONY_ACCOUNT_SID", "  ")],
        )
        .expect("config should load");
        assert_eq!(config.telephony.account_sid, "AC-file");
    }

    #[test]
    fn unparsable_override_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let err = load(
            write_config(&dir, VALID_FILE),
            &[("AGENTLINE_PROVISIONING_LEASE_TTL_SECS", "soon")],
        )
        .expect_err("override should be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidEnvOverride { ref key, .. }
                if key == "AGENTLINE_PROVISIONING_LEASE_TTL_SECS"
        ));
    }

    #[rstest]
    #[case::bad_country("AGENTLINE_TELEPHONY_COUNTRY", "USA", "telephony.country")]
    #[case::bad_limit("AGENTLINE_TELEPHONY_CANDIDATE_LIMIT", "0", "telephony.candidate_limit")]
    #[case::bad_area_code("AGENTLINE_TELEPHONY_AREA_CODE", "41a", "telephony.area_code")]
    #[case::bad_provider_url(
        "AGENTLINE_AGENT_PROVIDER_BASE_URL",
        "ftp://agents.example.com",
        "agent_provider.base_url"
    )]
    #[case::bad_webhook("AGENTLINE_TELEPHONY_SMS_WEBHOOK_URL", "not a url", "sms_webhook_url")]
    #[case::short_lease("AGENTLINE_PROVISIONING_LEASE_TTL_SECS", "20", "lease_ttl_secs")]
    #[case::zero_step_timeout("AGENTLINE_PROVISIONING_STEP_TIMEOUT_SECS", "0", "step_timeout_secs")]
    #[case::bad_database("AGENTLINE_DATABASE_URL", "mysql://db", "database.url")]
    #[case::bad_level("AGENTLINE_LOG_LEVEL", "loud", "logging.level")]
    fn validation_names_the_offending_key(
        #[case] key: &str,
        #[case] value: &str,
        #[case] fragment: &str,
    ) {
        let dir = TempDir::new().expect("temp dir");
        let result = load(write_config(&dir, VALID_FILE), &[(key, value)]);
        assert!(matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains(fragment)
        ));
    }

    #[test]
    fn missing_secrets_fail_validation() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            "[agent_provider]\nbase_url = \"https://agents.example.com\"\n",
        );
        let result = load(path, &[]);
        assert!(matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("agent_provider.api_key")
        ));
    }

    #[test]
    fn missing_required_file_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("absent.toml");
        let err = load(path.clone(), &[]).expect_err("load should fail");
        assert!(matches!(err, ConfigError::MissingConfigFile(ref missing) if *missing == path));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[telephony]\ncountry_code = \"US\"\n");
        assert!(matches!(load(path, &[]), Err(ConfigError::ParseFile { .. })));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let dir = TempDir::new().expect("temp dir");
        let config = load(write_config(&dir, VALID_FILE), &[]).expect("config should load");
        let debug = format!("{config:?}");
        assert!(!debug.contains("key-from-file"));
        assert!(!debug.contains("token-from-file"));
    }
}
