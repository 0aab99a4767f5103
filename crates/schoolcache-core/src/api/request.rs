//! Per-call request configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Only reads are cached or served from cache
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Neither read a fallback nor write the response to the cache
    pub skip_cache: bool,
    /// Overrides the client's default timeout for this call
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            body: None,
            skip_cache: false,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Attach a JSON body. Fails if `body` does not serialize.
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether this call reads and writes the response cache
    pub fn uses_cache(&self) -> bool {
        self.method.is_read() && !self.skip_cache
    }

    /// Reject a path the client cannot send. Besides being non-empty, the
    /// path must start with `/`: it is appended verbatim to the base URL,
    /// and `students` would otherwise produce `http://host:8000students`.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.path.is_empty() {
            return Err(ApiError::InvalidRequest("path must not be empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(ApiError::InvalidRequest(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        Ok(())
    }
}
