//! Failover submission of attestation evidence to guardian endpoints.
//!
//! Submissions and status queries walk the configured endpoints in order and
//! stop at the first success; nothing is raced, so a bundle is never posted to
//! two guardians concurrently. Health probes are the exception and run in
//! parallel because only the aggregate count matters.

pub mod types;

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

use crate::error::GuardianError;
use types::{
    AttestationBundle, AttestationSubmission, ConsensusStatus, HealthReport, StatusResponse,
    SubmitRequest, SubmitResponse,
};

/// Configuration for a [`GuardianSubmitter`]. Only constructible through
/// [`GuardianConfig::builder`], so a built config always passed validation.
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    endpoints: Vec<Url>,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl GuardianConfig {
    /// Create a builder for constructing a `GuardianConfig`.
    pub fn builder() -> GuardianConfigBuilder {
        GuardianConfigBuilder::default()
    }

    /// Guardian base URLs, tried in this order on every call. Never empty.
    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    /// Timeout for each submit or status request (default: 30s).
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Timeout for each health probe (default: 5s).
    pub fn health_timeout(&self) -> Duration {
        self.health_timeout
    }
}

/// Builder for [`GuardianConfig`].
#[derive(Debug, Clone)]
pub struct GuardianConfigBuilder {
    endpoints: Vec<String>,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl Default for GuardianConfigBuilder {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl GuardianConfigBuilder {
    /// Append one endpoint to the failover order.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.push(url.into());
        self
    }

    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Build the `GuardianConfig`, validating every endpoint URL.
    pub fn build(self) -> Result<GuardianConfig, GuardianError> {
        if self.endpoints.is_empty() {
            return Err(GuardianError::Config(
                "at least one guardian endpoint is required".into(),
            ));
        }
        if self.request_timeout.is_zero() || self.health_timeout.is_zero() {
            return Err(GuardianError::Config("timeouts must be > 0".into()));
        }

        let endpoints = self
            .endpoints
            .iter()
            .map(|raw| parse_endpoint(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GuardianConfig {
            endpoints,
            request_timeout: self.request_timeout,
            health_timeout: self.health_timeout,
        })
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, GuardianError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| GuardianError::Config(format!("invalid endpoint {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(GuardianError::Config(format!(
            "endpoint {raw:?} must be an http(s) base URL"
        )));
    }
    Ok(url)
}

/// Append path segments to a base URL, percent-encoding each one.
fn join_path(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Forwards attestation bundles to guardians with sequential failover.
#[derive(Debug, Clone)]
pub struct GuardianSubmitter {
    config: GuardianConfig,
    http: reqwest::Client,
}

impl GuardianSubmitter {
    pub fn new(config: GuardianConfig) -> Result<Self, GuardianError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GuardianError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.config.endpoints
    }

    /// Submit a bundle to the first guardian that accepts it.
    pub async fn submit(
        &self,
        bundle: &AttestationBundle,
    ) -> Result<AttestationSubmission, GuardianError> {
        let body = SubmitRequest::from(bundle);
        self.failover("submit", |endpoint| self.post_submission(endpoint, &body))
            .await
    }

    /// Fetch consensus status for an attestation from the first guardian that
    /// answers.
    pub async fn query_status(
        &self,
        attestation_id: &str,
    ) -> Result<ConsensusStatus, GuardianError> {
        self.failover("query_status", |endpoint| {
            self.get_status(endpoint, attestation_id)
        })
        .await
    }

    /// Probe every guardian concurrently and count the ones that answer 2xx.
    ///
    /// Never fails: unreachable guardians only lower the count.
    pub async fn check_health(&self) -> HealthReport {
        let probes = self.config.endpoints.iter().map(|endpoint| self.probe(endpoint));
        let reachable = join_all(probes).await.into_iter().filter(|ok| *ok).count();
        let total = self.config.endpoints.len();
        tracing::debug!(reachable, total, "guardian health probe complete");
        HealthReport { reachable, total }
    }

    /// Try `call` against each endpoint in order until one succeeds.
    async fn failover<'a, T, F, Fut>(
        &'a self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, GuardianError>
    where
        F: FnMut(&'a Url) -> Fut,
        Fut: Future<Output = Result<T, GuardianError>>,
    {
        let total = self.config.endpoints.len();
        let mut last_error = None;

        for (index, endpoint) in self.config.endpoints.iter().enumerate() {
            match call(endpoint).await {
                Ok(value) => {
                    tracing::debug!(operation, %endpoint, index, "guardian request succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(
                        operation,
                        %endpoint,
                        index,
                        total,
                        error = %e,
                        "guardian request failed, trying next endpoint"
                    );
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .ok_or_else(|| GuardianError::Config("no guardian endpoints configured".into()))?;
        Err(GuardianError::AllUnreachable {
            total,
            last_error: Box::new(last_error),
        })
    }

    async fn post_submission(
        &self,
        endpoint: &Url,
        body: &SubmitRequest<'_>,
    ) -> Result<AttestationSubmission, GuardianError> {
        let url = join_path(endpoint, &["attestation", "submit"]);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| http_error(endpoint, source))?;
        let parsed: SubmitResponse = read_json(endpoint, response).await?;
        AttestationSubmission::try_from(parsed).map_err(|reason| GuardianError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason,
        })
    }

    async fn get_status(
        &self,
        endpoint: &Url,
        attestation_id: &str,
    ) -> Result<ConsensusStatus, GuardianError> {
        let url = join_path(endpoint, &["attestation", "status", attestation_id]);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| http_error(endpoint, source))?;
        let parsed: StatusResponse = read_json(endpoint, response).await?;
        Ok(parsed.into())
    }

    async fn probe(&self, endpoint: &Url) -> bool {
        let url = join_path(endpoint, &["health"]);
        match self
            .http
            .get(url)
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(
                    %endpoint,
                    status = response.status().as_u16(),
                    "guardian unhealthy"
                );
                false
            }
            Err(e) => {
                tracing::debug!(%endpoint, error = %e, "guardian unreachable");
                false
            }
        }
    }
}

fn http_error(endpoint: &Url, source: reqwest::Error) -> GuardianError {
    GuardianError::Http {
        endpoint: endpoint.to_string(),
        source,
    }
}

/// Require a 2xx status and decode the body.
async fn read_json<T: DeserializeOwned>(
    endpoint: &Url,
    response: Response,
) -> Result<T, GuardianError> {
    let status = response.status();
    if !status.is_success() {
        return Err(GuardianError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(|source| http_error(endpoint, source))?;
    serde_json::from_slice(&body).map_err(|source| GuardianError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_trailing_slash_and_encoding() {
        let base = Url::parse("http://guardian.local:8080/").unwrap();
        assert_eq!(
            join_path(&base, &["attestation", "submit"]).as_str(),
            "http://guardian.local:8080/attestation/submit"
        );

        let base = Url::parse("https://g.example/api/v1").unwrap();
        assert_eq!(
            join_path(&base, &["attestation", "status", "a/b c"]).as_str(),
            "https://g.example/api/v1/attestation/status/a%2Fb%20c"
        );
    }

    #[test]
    fn config_requires_endpoints() {
        let err = GuardianConfig::builder().build().unwrap_err();
        assert!(matches!(err, GuardianError::Config(_)));
    }

    #[test]
    fn config_rejects_non_http_endpoints() {
        let err = GuardianConfig::builder()
            .endpoint("ftp://guardian")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http(s)"), "{err}");

        assert!(GuardianConfig::builder()
            .endpoint("not a url")
            .build()
            .is_err());
    }

    #[test]
    fn config_defaults_and_accessors() {
        let config = GuardianConfig::builder()
            .endpoint("http://g1:8080")
            .build()
            .unwrap();
        assert_eq!(config.endpoints().len(), 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.health_timeout(), Duration::from_secs(5));

        let submitter = GuardianSubmitter::new(config).unwrap();
        assert_eq!(submitter.endpoints()[0].as_str(), "http://g1:8080/");
    }

    #[test]
    fn config_keeps_endpoint_order() {
        let config = GuardianConfig::builder()
            .endpoints(["http://a:1", "http://b:2"])
            .endpoint("http://c:3")
            .build()
            .unwrap();
        let hosts: Vec<_> = config
            .endpoints()
            .iter()
            .map(|u| u.host_str().unwrap().to_string())
            .collect();
        assert_eq!(hosts, ["a", "b", "c"]);
    }
}
