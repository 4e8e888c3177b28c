//! FHIR REST implementation of [`ResourceClient`]
//!
//! Talks JSON to a FHIR R4 endpoint with reqwest. Connection failures,
//! timeouts, 429 and 5xx responses are retried with exponential backoff;
//! every other error is returned on the first attempt.

use super::client::{FhirResult, PatchOperation, ResourceClient, SearchParams};
use crate::config::FhirConfig;
use crate::domain::{Bundle, CarelinkError, FhirError, PatientId, ResourceId, ResourceType, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

const FHIR_JSON: &str = "application/fhir+json";
const JSON_PATCH: &str = "application/json-patch+json";

/// Upper bound on `$everything` pages followed for one patient
const MAX_COMPARTMENT_PAGES: usize = 1000;

/// reqwest-backed remote store client
///
/// # Example
///
/// ```no_run
/// use carelink::adapters::fhir::{HttpResourceClient, ResourceClient};
/// use carelink::config::FhirConfig;
/// use carelink::domain::PatientId;
///
/// # async fn example() -> carelink::domain::Result<()> {
/// let client = HttpResourceClient::new(FhirConfig::default())?;
/// let bundle = client
///     .patient_everything(&PatientId::new("p-1").unwrap())
///     .await?;
/// println!("{} entries", bundle.resources().len());
/// # Ok(())
/// # }
/// ```
pub struct HttpResourceClient {
    /// Base URL without trailing slash
    base_url: String,
    client: Client,
    config: FhirConfig,
}

impl HttpResourceClient {
    /// Builds the HTTP client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`CarelinkError::Configuration`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: FhirConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!(base_url = %base_url, "TLS certificate verification disabled");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            CarelinkError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url,
            client,
            config,
        })
    }

    /// Build authorization header value
    fn auth_header_value(&self) -> Option<String> {
        match self.config.auth_type.as_str() {
            "bearer" => self
                .config
                .bearer_token
                .as_ref()
                .map(|token| format!("Bearer {}", token.expose_secret().as_ref())),
            "basic" => match (&self.config.username, &self.config.password) {
                (Some(username), Some(password)) => {
                    let credentials = format!("{username}:{}", password.expose_secret().as_ref());
                    let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                    Some(format!("Basic {encoded}"))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn resource_url(&self, resource_type: &ResourceType, id: Option<&ResourceId>) -> String {
        match id {
            Some(id) => format!("{}/{}/{}", self.base_url, resource_type, id),
            None => format!("{}/{}", self.base_url, resource_type),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static(FHIR_JSON));
        if let Some(auth) = self.auth_header_value() {
            request = request.header(AUTHORIZATION, auth);
        }
        request
    }

    /// Sends a request, mapping transport failures to [`FhirError`]
    async fn send(request: RequestBuilder) -> FhirResult<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                FhirError::Timeout(e.to_string())
            } else {
                FhirError::ConnectionFailed(e.to_string())
            }
        })
    }

    /// Checks the status and decodes a JSON body
    ///
    /// An empty success body yields `Value::Null`.
    async fn json_body(resp: Response) -> FhirResult<Value> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FhirError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(FhirError::from_status(status.as_u16(), body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| FhirError::InvalidResponse(e.to_string()))
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, T, Fut>(&self, operation: F) -> FhirResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FhirResult<T>>,
    {
        let max_retries = self.config.retry.max_retries.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries || !e.is_retryable() {
                        return Err(e);
                    }

                    let delay_ms = backoff_delay_ms(
                        self.config.retry.initial_delay_ms,
                        self.config.retry.backoff_multiplier,
                        self.config.retry.max_delay_ms,
                        attempt,
                    );

                    crate::log_retry_attempt!(attempt, max_retries, e.to_string());
                    tracing::debug!(delay_ms = delay_ms, "Backing off before retry");

                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    /// Resolves a server-supplied `next` link, refusing other origins
    ///
    /// Credentials are attached to every request, so a link pointing away
    /// from the configured server is never followed.
    fn same_origin_link(&self, link: &str) -> FhirResult<String> {
        let base = Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| FhirError::InvalidResponse(format!("Unparseable base URL: {e}")))?;
        let resolved = base
            .join(link)
            .map_err(|e| FhirError::InvalidResponse(format!("Unparseable next link '{link}': {e}")))?;
        if resolved.origin() != base.origin() {
            return Err(FhirError::InvalidResponse(format!(
                "next link '{link}' leaves {}",
                base.origin().ascii_serialization()
            )));
        }
        Ok(resolved.into())
    }

    async fn fetch_bundle(&self, url: &str) -> FhirResult<Bundle> {
        let payload = self
            .retry_request(|| async {
                let resp = Self::send(self.request(Method::GET, url)).await?;
                Self::json_body(resp).await
            })
            .await?;
        Bundle::from_payload(payload).map_err(|e| FhirError::InvalidResponse(e.to_string()))
    }

    /// Reads the server's CapabilityStatement from `/metadata`
    ///
    /// Used as a connectivity and credentials check.
    pub async fn capability_statement(&self) -> FhirResult<Value> {
        let url = format!("{}/metadata", self.base_url);
        let payload = self
            .retry_request(|| async {
                let resp = Self::send(self.request(Method::GET, &url)).await?;
                Self::json_body(resp).await
            })
            .await?;

        match payload.get("resourceType").and_then(Value::as_str) {
            Some("CapabilityStatement") => Ok(payload),
            other => Err(FhirError::InvalidResponse(format!(
                "expected CapabilityStatement from /metadata, got {}",
                other.unwrap_or("no resourceType")
            ))),
        }
    }
}

/// Delay before retry number `attempt` (1-based), capped at `max_ms`
fn backoff_delay_ms(initial_ms: u64, multiplier: f64, max_ms: u64, attempt: usize) -> u64 {
    let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
    let delay = (initial_ms as f64 * factor).min(max_ms as f64);
    delay as u64
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn get(&self, resource_type: &ResourceType, id: &ResourceId) -> FhirResult<Value> {
        let url = self.resource_url(resource_type, Some(id));
        tracing::debug!(url = %url, "GET resource");

        self.retry_request(|| async {
            let resp = Self::send(self.request(Method::GET, &url)).await?;
            Self::json_body(resp).await
        })
        .await
    }

    async fn create(&self, resource_type: &ResourceType, payload: Value) -> FhirResult<Value> {
        let url = self.resource_url(resource_type, None);
        tracing::debug!(url = %url, "POST resource");

        // Creates are not idempotent; a retried POST could duplicate the resource
        let request = self
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON))
            .json(&payload);
        let resp = Self::send(request).await?;
        Self::json_body(resp).await
    }

    async fn update(
        &self,
        resource_type: &ResourceType,
        id: &ResourceId,
        payload: Value,
    ) -> FhirResult<Value> {
        let url = self.resource_url(resource_type, Some(id));
        tracing::debug!(url = %url, "PUT resource");

        self.retry_request(|| async {
            let request = self
                .request(Method::PUT, &url)
                .header(CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON))
                .json(&payload);
            let resp = Self::send(request).await?;
            Self::json_body(resp).await
        })
        .await
    }

    async fn patch(
        &self,
        resource_type: &ResourceType,
        id: &ResourceId,
        operations: &[PatchOperation],
    ) -> FhirResult<Value> {
        let url = self.resource_url(resource_type, Some(id));
        let body = serde_json::to_vec(operations)
            .map_err(|e| FhirError::InvalidResponse(format!("Unencodable patch: {e}")))?;
        tracing::debug!(url = %url, operations = operations.len(), "PATCH resource");

        self.retry_request(|| async {
            let request = self
                .request(Method::PATCH, &url)
                .header(CONTENT_TYPE, HeaderValue::from_static(JSON_PATCH))
                .body(body.clone());
            let resp = Self::send(request).await?;
            Self::json_body(resp).await
        })
        .await
    }

    async fn delete(&self, resource_type: &ResourceType, id: &ResourceId) -> FhirResult<()> {
        let url = self.resource_url(resource_type, Some(id));
        tracing::debug!(url = %url, "DELETE resource");

        // A retried delete that finds nothing means an earlier attempt landed
        let attempts = AtomicUsize::new(0);
        self.retry_request(|| async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let resp = Self::send(self.request(Method::DELETE, &url)).await?;
            match Self::json_body(resp).await {
                Err(FhirError::NotFound(_)) if attempt > 1 => {
                    tracing::debug!(url = %url, attempt = attempt, "Resource already gone on retry");
                    Ok(())
                }
                other => other.map(|_| ()),
            }
        })
        .await
    }

    async fn search(
        &self,
        resource_type: &ResourceType,
        params: &SearchParams,
    ) -> FhirResult<Bundle> {
        let url = format!(
            "{}?{}",
            self.resource_url(resource_type, None),
            params.to_query_string()
        );
        tracing::debug!(url = %url, "Search");
        self.fetch_bundle(&url).await
    }

    async fn patient_everything(&self, patient_id: &PatientId) -> FhirResult<Bundle> {
        let first = format!(
            "{}/Patient/{}/$everything?_count={}",
            self.base_url, patient_id, self.config.page_size
        );
        let mut bundle = self.fetch_bundle(&first).await?;

        let mut pages = 1;
        while let Some(next) = bundle.next_link().map(str::to_string) {
            if pages >= MAX_COMPARTMENT_PAGES {
                return Err(FhirError::InvalidResponse(format!(
                    "Compartment of Patient/{patient_id} exceeded {MAX_COMPARTMENT_PAGES} pages"
                )));
            }
            let next = self.same_origin_link(&next)?;
            let page = self.fetch_bundle(&next).await?;
            bundle.extend(page);
            pages += 1;
        }

        tracing::debug!(
            patient_id = %patient_id,
            pages = pages,
            entries = bundle.entry.as_ref().map(Vec::len).unwrap_or(0),
            "Fetched patient compartment"
        );
        Ok(bundle)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
