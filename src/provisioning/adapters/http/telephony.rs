//! Telephony adapter for Twilio-compatible number provisioning APIs.

use super::{InvalidBaseUrl, endpoint, truncate_body};
use crate::provisioning::{
    domain::{NumberPolicy, TelephonyNumber},
    ports::{TelephonyError, TelephonyProvider, TelephonyResult},
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header::CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};
use url::{Url, form_urlencoded};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Account credentials for the telephony API.
#[derive(Debug)]
pub struct TelephonyAccount {
    /// Account identifier, used in request paths and as the basic-auth user.
    pub account_sid: String,
    /// Basic-auth password.
    pub auth_token: SecretString,
}

/// Searches for, purchases and releases numbers over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTelephonyProvider {
    client: Client,
    base_url: Url,
    account: Arc<TelephonyAccount>,
}

impl HttpTelephonyProvider {
    /// Builds the adapter with a per-request transport timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TelephonyError::Transport`] when the HTTP client cannot be
    /// constructed or the base URL cannot carry a path.
    pub fn new(
        base_url: Url,
        account: TelephonyAccount,
        request_timeout: Duration,
    ) -> TelephonyResult<Self> {
        endpoint(&base_url, &[]).map_err(TelephonyError::transport)?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(TelephonyError::transport)?;
        Ok(Self {
            client,
            base_url,
            account: Arc::new(account),
        })
    }

    fn account_url(&self, tail: &[&str]) -> Result<Url, InvalidBaseUrl> {
        let mut segments = vec!["Accounts", self.account.account_sid.as_str()];
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }

    fn search_url(&self, policy: &NumberPolicy) -> Result<Url, InvalidBaseUrl> {
        let url = self.account_url(&[
            "AvailablePhoneNumbers",
            policy.country().as_str(),
            "Local.json",
        ])?;
        Ok(with_search_query(url, policy))
    }

    async fn get(&self, url: Url) -> TelephonyResult<Response> {
        self.client
            .get(url)
            .basic_auth(&self.account.account_sid, Some(self.account.auth_token.expose_secret()))
            .send()
            .await
            .map_err(TelephonyError::transport)
    }

    async fn search(&self, policy: &NumberPolicy) -> TelephonyResult<Vec<TelephonyNumber>> {
        let url = self.search_url(policy).map_err(TelephonyError::transport)?;
        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let page: AvailableNumbersPage = response.json().await.map_err(TelephonyError::transport)?;
        Ok(eligible_candidates(page, policy))
    }

    /// Attempts one purchase. `Ok(Err(reason))` is a provider refusal that
    /// allows trying the next candidate.
    async fn purchase(
        &self,
        candidate: &TelephonyNumber,
        policy: &NumberPolicy,
    ) -> TelephonyResult<Result<TelephonyNumber, String>> {
        let url = self
            .account_url(&["IncomingPhoneNumbers.json"])
            .map_err(TelephonyError::transport)?;
        let response = self
            .client
            .post(url)
            .basic_auth(&self.account.account_sid, Some(self.account.auth_token.expose_secret()))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(purchase_form(candidate, policy))
            .send()
            .await
            .map_err(TelephonyError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(Err(format!("status {}: {}", status.as_u16(), truncate_body(&body))));
        }
        // The number is billed from here on; an unreadable echo must not
        // turn the purchase into a failure.
        let body = response.text().await.unwrap_or_default();
        Ok(Ok(purchased_number(&body, candidate)))
    }
}

#[derive(Debug, Deserialize)]
struct AvailableNumbersPage {
    #[serde(default)]
    available_phone_numbers: Vec<AvailableNumber>,
}

#[derive(Debug, Deserialize)]
struct AvailableNumber {
    phone_number: String,
    #[serde(default)]
    capabilities: Capabilities,
}

#[derive(Debug, Default, Deserialize)]
struct Capabilities {
    #[serde(default, rename = "SMS", alias = "sms")]
    sms: bool,
}

#[derive(Debug, Deserialize)]
struct IncomingNumbersPage {
    #[serde(default)]
    incoming_phone_numbers: Vec<IncomingNumber>,
}

#[derive(Debug, Deserialize)]
struct IncomingNumber {
    #[serde(default)]
    sid: String,
    phone_number: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseEcho {
    #[serde(default)]
    phone_number: Option<String>,
}

/// Number bought by an accepted purchase: the echoed number when it is
/// valid, otherwise the candidate that was requested.
fn purchased_number(body: &str, candidate: &TelephonyNumber) -> TelephonyNumber {
    serde_json::from_str::<PurchaseEcho>(body)
        .ok()
        .and_then(|echo| echo.phone_number)
        .and_then(|raw| TelephonyNumber::new(raw).ok())
        .unwrap_or_else(|| candidate.clone())
}

fn with_search_query(mut url: Url, policy: &NumberPolicy) -> Url {
    {
        let mut query = url.query_pairs_mut();
        if policy.sms_required() {
            query.append_pair("SmsEnabled", "true");
        }
        if let Some(area_code) = policy.area_code() {
            query.append_pair("AreaCode", area_code);
        }
        query.append_pair("PageSize", &policy.candidate_limit().to_string());
    }
    url
}

/// Candidates worth attempting, in the order the provider listed them.
fn eligible_candidates(page: AvailableNumbersPage, policy: &NumberPolicy) -> Vec<TelephonyNumber> {
    let limit = usize::try_from(policy.candidate_limit()).unwrap_or(usize::MAX);
    page.available_phone_numbers
        .into_iter()
        .filter(|candidate| !policy.sms_required() || candidate.capabilities.sms)
        .filter_map(|candidate| TelephonyNumber::new(candidate.phone_number).ok())
        .take(limit)
        .collect()
}

fn purchase_form(candidate: &TelephonyNumber, policy: &NumberPolicy) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("PhoneNumber", candidate.as_str());
    let callbacks = policy.callbacks();
    if let Some(sms_url) = &callbacks.sms_url {
        form.append_pair("SmsUrl", sms_url.as_str());
    }
    if let Some(voice_url) = &callbacks.voice_url {
        form.append_pair("VoiceUrl", voice_url.as_str());
    }
    form.finish()
}

async fn rejection(response: Response) -> TelephonyError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TelephonyError::Rejected {
        status,
        body: truncate_body(&body),
    }
}

#[async_trait]
impl TelephonyProvider for HttpTelephonyProvider {
    async fn acquire_number(&self, policy: &NumberPolicy) -> TelephonyResult<TelephonyNumber> {
        let candidates = self.search(policy).await?;
        debug!(
            country = %policy.country(),
            candidates = candidates.len(),
            "telephony number search completed"
        );

        let mut last_failure = None;
        for candidate in candidates {
            match self.purchase(&candidate, policy).await? {
                Ok(number) => return Ok(number),
                Err(reason) => {
                    warn!(number = %candidate, reason = %reason, "telephony number purchase refused");
                    last_failure = Some((candidate, reason));
                }
            }
        }

        Err(last_failure.map_or_else(
            || TelephonyError::NoNumberAvailable {
                country: policy.country().to_string(),
            },
            |(number, reason)| TelephonyError::PurchaseFailed {
                number: number.to_string(),
                reason,
            },
        ))
    }

    async fn release_number(&self, number: &TelephonyNumber) -> TelephonyResult<()> {
        let mut lookup = self
            .account_url(&["IncomingPhoneNumbers.json"])
            .map_err(TelephonyError::transport)?;
        lookup
            .query_pairs_mut()
            .append_pair("PhoneNumber", number.as_str());
        let found = self.get(lookup).await?;
        if !found.status().is_success() {
            return Err(rejection(found).await);
        }
        let page: IncomingNumbersPage = found.json().await.map_err(TelephonyError::transport)?;
        let sid = page
            .incoming_phone_numbers
            .into_iter()
            .find(|owned| owned.phone_number == number.as_str() && !owned.sid.is_empty())
            .map(|owned| owned.sid)
            .ok_or_else(|| TelephonyError::UnknownNumber(number.to_string()))?;

        let resource = format!("{sid}.json");
        let url = self
            .account_url(&["IncomingPhoneNumbers", &resource])
            .map_err(TelephonyError::transport)?;
        let response = self
            .client
            .delete(url)
            .basic_auth(&self.account.account_sid, Some(self.account.auth_token.expose_secret()))
            .send()
            .await
            .map_err(TelephonyError::transport)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(number = %number, "telephony number released");
            return Ok(());
        }
        Err(rejection(response).await)
    }
}
