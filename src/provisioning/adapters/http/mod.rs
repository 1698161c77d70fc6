//! HTTPS adapters for the remote agent and telephony providers.

mod agent_provider;
mod telephony;

pub use agent_provider::HttpAgentProvider;
pub use telephony::{HttpTelephonyProvider, TelephonyAccount};

use thiserror::Error;
use url::Url;

/// Longest response body kept in rejection errors.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Base URL that cannot carry path segments (for example `mailto:`).
#[derive(Debug, Clone, Error)]
#[error("base url '{0}' cannot be used as an API root")]
pub struct InvalidBaseUrl(pub String);

/// Appends path segments to an API root, keeping any path the root has.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, InvalidBaseUrl> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::{endpoint, truncate_body};
    use rstest::rstest;
    use url::Url;

    #[rstest]
    #[case("https://agents.example.com", "https://agents.example.com/agents/a-1")]
    #[case("https://agents.example.com/v2", "https://agents.example.com/v2/agents/a-1")]
    #[case("https://agents.example.com/v2/", "https://agents.example.com/v2/agents/a-1")]
    fn endpoint_keeps_the_base_path(#[case] base: &str, #[case] expected: &str) {
        let base_url = Url::parse(base).expect("valid base url");
        let url = endpoint(&base_url, &["agents", "a-1"]).expect("endpoint should build");
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn endpoint_escapes_segments() {
        let base_url = Url::parse("https://agents.example.com").expect("valid base url");
        let url = endpoint(&base_url, &["agents", "a b/c"]).expect("endpoint should build");
        assert_eq!(url.as_str(), "https://agents.example.com/agents/a%20b%2Fc");
    }

    #[test]
    fn endpoint_rejects_opaque_urls() {
        let base_url = Url::parse("mailto:ops@example.com").expect("valid url");
        assert!(endpoint(&base_url, &["agents"]).is_err());
    }

    #[test]
    fn truncate_body_limits_length() {
        let body = "x".repeat(2_000);
        assert_eq!(truncate_body(&body).chars().count(), 512);
    }
}
