use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::auth::{AuthStrategy, PreparedAuth, API_KEY_PLACEHOLDER};
use crate::chain::ChainSlug;
use crate::error::RpcError;

/// Timeouts and retry budget for one router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Upper bound for a single HTTP attempt.
    pub timeout: Duration,
    /// Full passes over the endpoint pool after the first one fails.
    pub extra_passes: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            extra_passes: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// What to send to a provider.
#[derive(Debug, Clone, Copy)]
pub enum RpcRequest<'a> {
    JsonRpc { method: &'a str, params: &'a Value },
    Get { path: &'a str },
    Post { path: &'a str, body: &'a Value },
}

impl RpcRequest<'_> {
    fn describe(&self) -> String {
        match self {
            RpcRequest::JsonRpc { method, .. } => (*method).to_string(),
            RpcRequest::Get { path } => format!("GET {}", path),
            RpcRequest::Post { path, .. } => format!("POST {}", path),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcEnvelope<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

/// Classification of a single HTTP attempt.
#[derive(Debug)]
enum Attempt {
    Success(Value),
    /// Credential refused or throttled: try the next auth variant.
    AuthRejected(String),
    /// REST resource absent: this endpoint has answered.
    NotFound,
    /// Well-formed error answer from the provider.
    ProviderError { code: i64, message: String },
    /// Transport failure, timeout, 5xx or garbage: try the next endpoint.
    Transport(String),
}

/// Fallback router over a pool of equivalent endpoints for one chain.
///
/// Each endpoint is tried with every applicable [`AuthStrategy`] in order;
/// the first well-formed, error-free answer wins. When a whole pass fails at
/// the transport level the router backs off exponentially and repeats, up to
/// `extra_passes` times.
pub struct RpcRouter {
    chain: ChainSlug,
    endpoints: Vec<String>,
    credential: Option<SecretString>,
    strategies: Vec<AuthStrategy>,
    http: Client,
    config: RouterConfig,
}

impl RpcRouter {
    pub fn new(
        chain: ChainSlug,
        endpoints: Vec<String>,
        credential: Option<SecretString>,
        strategies: Vec<AuthStrategy>,
        config: RouterConfig,
    ) -> Result<Self, RpcError> {
        let endpoints = dedupe_endpoints(endpoints);
        if endpoints.is_empty() {
            return Err(RpcError::InvalidEndpoint(format!(
                "no endpoints configured for {}",
                chain
            )));
        }
        if let Some(bad) = endpoints
            .iter()
            .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(RpcError::InvalidEndpoint(bad.clone()));
        }

        let http = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| RpcError::InvalidEndpoint(e.to_string()))?;

        let strategies = if strategies.is_empty() {
            AuthStrategy::default_order()
        } else {
            strategies
        };

        Ok(Self {
            chain,
            endpoints,
            credential,
            strategies,
            http,
            config,
        })
    }

    pub fn chain(&self) -> ChainSlug {
        self.chain
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// JSON-RPC 2.0 call; returns the `result` member (possibly `null`).
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.dispatch(RpcRequest::JsonRpc {
            method,
            params: &params,
        })
        .await
    }

    /// REST GET relative to each endpoint. Non-JSON bodies come back as `Value::String`.
    pub async fn get(&self, path: &str) -> Result<Value, RpcError> {
        self.dispatch(RpcRequest::Get { path }).await
    }

    /// REST POST with a JSON body relative to each endpoint.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value, RpcError> {
        self.dispatch(RpcRequest::Post { path, body: &body }).await
    }

    pub async fn dispatch(&self, request: RpcRequest<'_>) -> Result<Value, RpcError> {
        let mut delay = self.config.base_delay;
        let mut attempts = 0u32;
        let mut last_error = String::from("no applicable auth strategy");

        for pass in 0..=self.config.extra_passes {
            if pass > 0 {
                tracing::warn!(
                    chain = %self.chain,
                    request = %request.describe(),
                    pass,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "All endpoints failed, backing off before next pass"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, self.config.max_delay);
            }

            let mut not_found = false;
            let mut provider_error: Option<(i64, String)> = None;

            for endpoint in &self.endpoints {
                for strategy in &self.strategies {
                    let Some(auth) = strategy.prepare(endpoint, self.credential.as_ref()) else {
                        continue;
                    };
                    attempts += 1;

                    match self.attempt(&auth, &request).await {
                        Attempt::Success(value) => {
                            tracing::debug!(
                                chain = %self.chain,
                                endpoint = %redact(endpoint),
                                auth = %strategy,
                                request = %request.describe(),
                                "RPC attempt succeeded"
                            );
                            return Ok(value);
                        }
                        Attempt::AuthRejected(reason) => {
                            tracing::debug!(
                                chain = %self.chain,
                                endpoint = %redact(endpoint),
                                auth = %strategy,
                                reason = %reason,
                                "Credential variant rejected, trying next"
                            );
                            last_error = reason;
                        }
                        Attempt::NotFound => {
                            not_found = true;
                            break;
                        }
                        Attempt::ProviderError { code, message } => {
                            tracing::debug!(
                                chain = %self.chain,
                                endpoint = %redact(endpoint),
                                code,
                                message = %message,
                                "Provider returned an error answer"
                            );
                            last_error = format!("{}: {}", code, message);
                            provider_error = Some((code, message));
                            break;
                        }
                        Attempt::Transport(reason) => {
                            tracing::warn!(
                                chain = %self.chain,
                                endpoint = %redact(endpoint),
                                request = %request.describe(),
                                error = %reason,
                                "RPC attempt failed, trying next endpoint"
                            );
                            last_error = reason;
                            break;
                        }
                    }
                }
            }

            // A provider that answered is authoritative; repeating the pass will not change it.
            if let Some((code, message)) = provider_error {
                return Err(RpcError::Rpc { code, message });
            }
            if not_found {
                return Err(RpcError::NotFound);
            }
        }

        Err(RpcError::Unavailable {
            chain: self.chain,
            attempts,
            last_error,
        })
    }

    async fn attempt(&self, auth: &PreparedAuth, request: &RpcRequest<'_>) -> Attempt {
        let builder = match request {
            RpcRequest::JsonRpc { method, params } => {
                self.http.post(&auth.url).json(&JsonRpcEnvelope {
                    jsonrpc: "2.0",
                    id: 1,
                    method,
                    params,
                })
            }
            RpcRequest::Get { path } => self.http.get(join_url(&auth.url, path)),
            RpcRequest::Post { path, body } => self.http.post(join_url(&auth.url, path)).json(body),
        };

        let mut builder = builder.timeout(self.config.timeout);
        if let Some((name, value)) = &auth.header {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((name, value)) = &auth.query {
            builder = builder.query(&[(name.as_str(), value.as_str())]);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Transport(format!("timeout: {}", e)),
            Err(e) => return Attempt::Transport(e.without_url().to_string()),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::Transport(e.without_url().to_string()),
        };

        classify(request, status, &body)
    }
}

fn classify(request: &RpcRequest<'_>, status: StatusCode, body: &str) -> Attempt {
    let is_rest = !matches!(request, RpcRequest::JsonRpc { .. });

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return Attempt::AuthRejected(format!("HTTP {}", status.as_u16()));
    }
    if status == StatusCode::NOT_FOUND && is_rest {
        return Attempt::NotFound;
    }
    if status.is_server_error() || (!is_rest && !status.is_success()) {
        return Attempt::Transport(format!("HTTP {}", status.as_u16()));
    }
    if !status.is_success() {
        return Attempt::ProviderError {
            code: i64::from(status.as_u16()),
            message: truncate(body, 200),
        };
    }

    let parsed = serde_json::from_str::<Value>(body);
    if is_rest {
        return match parsed {
            Ok(value) => Attempt::Success(value),
            Err(_) => Attempt::Success(Value::String(body.trim().to_string())),
        };
    }

    let Ok(Value::Object(mut envelope)) = parsed else {
        return Attempt::Transport("malformed JSON-RPC envelope".to_string());
    };
    match envelope.remove("error") {
        Some(Value::Null) | None => {}
        Some(error) => {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            if looks_like_auth_failure(code, &message) {
                return Attempt::AuthRejected(format!("{}: {}", code, message));
            }
            return Attempt::ProviderError { code, message };
        }
    }
    match envelope.remove("result") {
        Some(result) => Attempt::Success(result),
        None => Attempt::Transport("JSON-RPC envelope without result".to_string()),
    }
}

fn looks_like_auth_failure(code: i64, message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    code == -32005
        || lower.contains("unauthorized")
        || lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("forbidden")
        || lower.contains("rate limit")
}

/// Remove duplicates (trailing-slash insensitive) while preserving priority order.
pub fn dedupe_endpoints(endpoints: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    endpoints
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .filter(|e| seen.insert(e.trim_end_matches('/').to_ascii_lowercase()))
        .collect()
}

/// Append a REST path to a base URL, keeping any query string on the base.
pub fn join_url(base: &str, path: &str) -> String {
    let (prefix, query) = match base.split_once('?') {
        Some((prefix, query)) => (prefix, Some(query)),
        None => (base, None),
    };
    let mut url = format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push(if path.contains('?') { '&' } else { '?' });
        url.push_str(query);
    }
    url
}

fn redact(endpoint: &str) -> String {
    if endpoint.contains(API_KEY_PLACEHOLDER) {
        return endpoint.to_string();
    }
    match endpoint.split_once('?') {
        Some((prefix, _)) => format!("{}?…", prefix),
        None => endpoint.to_string(),
    }
}

fn truncate(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
