//! Implements the `CostExplorer` trait against AWS Cost Explorer's `GetCostAndUsage` operation.
//!
//! Requests use the JSON 1.1 protocol and are signed with SigV4 using credentials from the
//! default AWS provider chain (environment, profile, SSO, instance role, ...).

use crate::api::CostExplorer;
use crate::model::{CostQuery, Dimension, Granularity, Metric, Region, ResultByTime, TimePeriod};
use crate::Result;
use anyhow::{bail, Context};
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4::SigningParams;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::{debug, trace};
use url::Url;

/// Cost Explorer is served from a single endpoint regardless of the regions being reported on.
pub const DEFAULT_ENDPOINT: &str = "https://ce.us-east-1.amazonaws.com";
pub const DEFAULT_SIGNING_REGION: &str = "us-east-1";

const SERVICE_NAME: &str = "ce";
const TARGET: &str = "AWSInsightsIndexService.GetCostAndUsage";
const AMZ_TARGET: &str = "x-amz-target";
const JSON_1_1: &str = "application/x-amz-json-1.1";
const MAX_PAGES: usize = 1000;

/// Implements `CostExplorer` with SigV4-signed HTTP requests.
pub struct AwsCostExplorer {
    http: reqwest::Client,
    endpoint: Url,
    signing_region: String,
    credentials: SharedCredentialsProvider,
}

impl AwsCostExplorer {
    /// Creates a client that loads credentials from the default AWS provider chain.
    pub async fn from_env(endpoint: Url, signing_region: impl Into<String>) -> Result<Self> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let credentials = sdk_config.credentials_provider().context(
            "No AWS credentials found. Configure credentials through environment variables, a \
            profile or an instance role",
        )?;
        Ok(Self::new(endpoint, signing_region, credentials))
    }

    /// Creates a client with explicit credentials.
    pub fn new(
        endpoint: Url,
        signing_region: impl Into<String>,
        credentials: impl ProvideCredentials + 'static,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            signing_region: signing_region.into(),
            credentials: SharedCredentialsProvider::new(credentials),
        }
    }

    /// Returns the SigV4 headers for a POST of `body` to the endpoint.
    async fn sign(&self, body: &[u8]) -> Result<Vec<(String, String)>> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .context("Unable to load AWS credentials")?;
        let expiry = credentials.expiry();
        let identity = Identity::new(credentials, expiry);

        let params = SigningParams::builder()
            .identity(&identity)
            .region(&self.signing_region)
            .name(SERVICE_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .context("Unable to build SigV4 signing parameters")?;

        let signed_headers = [(CONTENT_TYPE.as_str(), JSON_1_1), (AMZ_TARGET, TARGET)];
        let signable = SignableRequest::new(
            "POST",
            self.endpoint.as_str(),
            signed_headers.into_iter(),
            SignableBody::Bytes(body),
        )
        .context("Unable to prepare request for signing")?;

        let (instructions, _) = sign(signable, &params.into())
            .context("Unable to sign request")?
            .into_parts();
        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }

    /// Sends one page request.
    async fn send(&self, request: &GetCostAndUsageRequest<'_>) -> Result<GetCostAndUsageResponse> {
        let body = serde_json::to_vec(request).context("Unable to serialize cost query")?;
        trace!("GetCostAndUsage request: {}", String::from_utf8_lossy(&body));
        let auth_headers = self.sign(&body).await?;

        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, JSON_1_1)
            .header(AMZ_TARGET, TARGET)
            .body(body);
        for (name, value) in auth_headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to AWS Cost Explorer")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Unable to read AWS Cost Explorer response body")?;
        if !status.is_success() {
            bail!(
                "AWS Cost Explorer request failed with status {}: {}",
                status,
                describe_api_error(&text)
            );
        }
        serde_json::from_str(&text).context("Failed to parse AWS Cost Explorer response")
    }
}

#[async_trait::async_trait]
impl CostExplorer for AwsCostExplorer {
    async fn get_cost_and_usage(
        &mut self,
        region: &Region,
        query: &CostQuery,
    ) -> Result<Vec<ResultByTime>> {
        let mut results = Vec::new();
        let mut token: Option<String> = None;
        for page in 1..=MAX_PAGES {
            let request = GetCostAndUsageRequest::new(region, query, token.as_deref());
            let response = self.send(&request).await?;
            let page_results = response
                .results_by_time
                .context("Key ResultsByTime missing from response")?;
            debug!("Page {page} for {region}: {} time buckets", page_results.len());
            results.extend(page_results);
            match response.next_page_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => return Ok(results),
            }
        }
        bail!("Stopped after {MAX_PAGES} pages of results for region {region}")
    }
}

/// Pulls the exception name and message out of an AWS JSON error body, falling back to the raw
/// body.
fn describe_api_error(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    let kind = value
        .get("__type")
        .and_then(|v| v.as_str())
        .map(|t| t.rsplit('#').next().unwrap_or(t));
    let message = value
        .get("message")
        .or_else(|| value.get("Message"))
        .and_then(|v| v.as_str());
    match (kind, message) {
        (Some(kind), Some(message)) => format!("{kind}: {message}"),
        (Some(kind), None) => kind.to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => body.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCostAndUsageRequest<'a> {
    time_period: TimePeriod,
    granularity: Granularity,
    metrics: &'a [Metric],
    group_by: [GroupDefinition; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
}

impl<'a> GetCostAndUsageRequest<'a> {
    fn new(region: &Region, query: &'a CostQuery, next_page_token: Option<&'a str>) -> Self {
        let filter = (!region.is_total()).then(|| Expression {
            dimensions: DimensionValues {
                key: "REGION",
                values: vec![region.to_string()],
            },
        });
        Self {
            time_period: query.period,
            granularity: query.granularity,
            metrics: &query.metrics,
            group_by: [GroupDefinition {
                kind: "DIMENSION",
                key: query.dimension,
            }],
            filter,
            next_page_token,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GroupDefinition {
    #[serde(rename = "Type")]
    kind: &'static str,
    key: Dimension,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Expression {
    dimensions: DimensionValues,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DimensionValues {
    key: &'static str,
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCostAndUsageResponse {
    results_by_time: Option<Vec<ResultByTime>>,
    next_page_token: Option<String>,
}
