use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::str::FromStr;

/// Placeholder substituted by [`AuthStrategy::UrlTemplate`].
pub const API_KEY_PLACEHOLDER: &str = "{api_key}";

/// One way of presenting a provider credential.
///
/// Providers disagree on where an API key goes, so the router walks an
/// ordered list of these per endpoint instead of hard-coding one per chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Substitute `{api_key}` inside the endpoint URL.
    UrlTemplate,
    /// Send the credential in the named header.
    Header(String),
    /// Send the credential as the named query parameter.
    Query(String),
    /// `Authorization: Bearer <credential>`.
    Bearer,
    /// No credential at all.
    Anonymous,
}

impl AuthStrategy {
    pub fn default_order() -> Vec<AuthStrategy> {
        vec![
            AuthStrategy::UrlTemplate,
            AuthStrategy::Header("x-api-key".to_string()),
            AuthStrategy::Header("api-key".to_string()),
            AuthStrategy::Query("apikey".to_string()),
            AuthStrategy::Query("api_key".to_string()),
            AuthStrategy::Bearer,
            AuthStrategy::Anonymous,
        ]
    }

    /// Resolve this strategy against one endpoint. Returns `None` when the
    /// strategy cannot apply (no credential, or no placeholder to fill).
    pub(crate) fn prepare(
        &self,
        endpoint: &str,
        credential: Option<&SecretString>,
    ) -> Option<PreparedAuth> {
        let templated = endpoint.contains(API_KEY_PLACEHOLDER);
        match (self, credential) {
            (AuthStrategy::Anonymous, _) if templated => None,
            (AuthStrategy::Anonymous, _) => Some(PreparedAuth::plain(endpoint)),
            (_, None) => None,
            (AuthStrategy::UrlTemplate, Some(key)) if templated => Some(PreparedAuth::plain(
                &endpoint.replace(API_KEY_PLACEHOLDER, key.expose_secret()),
            )),
            (AuthStrategy::UrlTemplate, Some(_)) => None,
            (_, Some(_)) if templated => None,
            (AuthStrategy::Header(name), Some(key)) => Some(PreparedAuth {
                url: endpoint.to_string(),
                header: Some((name.clone(), key.expose_secret().to_string())),
                query: None,
            }),
            (AuthStrategy::Query(name), Some(key)) => Some(PreparedAuth {
                url: endpoint.to_string(),
                header: None,
                query: Some((name.clone(), key.expose_secret().to_string())),
            }),
            (AuthStrategy::Bearer, Some(key)) => Some(PreparedAuth {
                url: endpoint.to_string(),
                header: Some((
                    "Authorization".to_string(),
                    format!("Bearer {}", key.expose_secret()),
                )),
                query: None,
            }),
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::UrlTemplate => f.write_str("url-template"),
            AuthStrategy::Header(name) => write!(f, "header:{}", name),
            AuthStrategy::Query(name) => write!(f, "query:{}", name),
            AuthStrategy::Bearer => f.write_str("bearer"),
            AuthStrategy::Anonymous => f.write_str("anonymous"),
        }
    }
}

impl FromStr for AuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some(("header", name)) if !name.is_empty() => Ok(AuthStrategy::Header(name.to_string())),
            Some(("query", name)) if !name.is_empty() => Ok(AuthStrategy::Query(name.to_string())),
            None if s == "url-template" => Ok(AuthStrategy::UrlTemplate),
            None if s == "bearer" => Ok(AuthStrategy::Bearer),
            None if s == "anonymous" => Ok(AuthStrategy::Anonymous),
            _ => Err(format!("Invalid auth strategy '{}'", s)),
        }
    }
}

/// Concrete request decoration produced by [`AuthStrategy::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedAuth {
    pub url: String,
    pub header: Option<(String, String)>,
    pub query: Option<(String, String)>,
}

impl PreparedAuth {
    fn plain(url: &str) -> Self {
        Self {
            url: url.to_string(),
            header: None,
            query: None,
        }
    }
}
