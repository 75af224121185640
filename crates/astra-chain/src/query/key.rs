//! Request identity: the cache and single-flight key for a REST query.

use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;

/// Deterministic key for one request: base URL, path and sorted query parameters.
///
/// Two requests with the same path and parameters produce the same key no matter
/// in which order the parameters were added.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A GET request against a chain REST or indexer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    base_url: String,
    path: String,
    params: BTreeMap<String, String>,
    required: Vec<String>,
}

impl QueryRequest {
    pub fn new(base_url: &str, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            path,
            params: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Add a query parameter.
    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// Mark a parameter as required: the request cannot be fetched while it is empty.
    pub fn require(mut self, name: &str) -> Self {
        self.required.push(name.to_string());
        self
    }

    /// Require a path component (e.g., an address interpolated into the path).
    ///
    /// Stored as a hidden requirement so an empty address never hits the network.
    pub fn require_value(mut self, name: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.required.push(format!("{}:path", name));
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Whether every required parameter is present and non-empty.
    pub fn can_fetch(&self) -> bool {
        self.required.iter().all(|name| {
            self.params
                .get(name)
                .is_some_and(|v| !v.trim().is_empty())
        })
    }

    /// Full URL with form-encoded, sorted parameters.
    pub fn url(&self) -> String {
        let base = format!("{}{}", self.base_url, self.path);
        let parsed = if self.params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, &self.params)
        };
        match parsed {
            Ok(url) => url.into(),
            Err(e) => {
                // Still unique per request; fetching it fails with a transport error.
                tracing::warn!("Malformed request URL {}: {}", base, e);
                format!("{}#{:?}", base, self.params)
            }
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey(self.url())
    }
}
