//! CMS REST access and request memoization.
//!
//! The resolver and overlay never perform I/O; this module is the collaborator
//! that produces the collection data and schema they consume.

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::config::Credentials;
use crate::error::StrapiError;
use crate::query::{stringify, QsOptions};
use crate::schema::{parse_schema, SchemaNode, UID_KEY};

/// HTTP GET abstraction so the client can be exercised without a server.
pub trait CmsTransport {
    /// Fetches `url`, sending `Authorization: Bearer <token>` when given.
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<String, StrapiError>;
}

/// [`CmsTransport`] backed by `ureq`.
pub struct UreqTransport;

impl CmsTransport for UreqTransport {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<String, StrapiError> {
        let mut request = ureq::get(url);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
            .call()
            .map_err(|e| StrapiError::FetchError(format!("HTTP request to '{url}' failed: {e}")))?
            .into_body()
            .read_to_string()
            .map_err(|e| {
                StrapiError::FetchError(format!(
                    "failed to read response body from '{url}': {e}"
                ))
            })
    }
}

/// Which kind of request a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Query,
    Schema,
}

impl RequestKind {
    fn as_str(self) -> &'static str {
        match self {
            RequestKind::Query => "query",
            RequestKind::Schema => "schema",
        }
    }
}

/// Stable cache key for a request: SHA-256 of its serialized inputs.
pub fn request_key(
    creds: &Credentials,
    name: &str,
    query: Option<&JsonValue>,
    kind: RequestKind,
) -> String {
    let serialized = json!({
        "creds": creds,
        "name": name,
        "query": query,
        "type": kind.as_str(),
    })
    .to_string();
    hex::encode(Sha256::digest(serialized.as_bytes()))
}

/// Memoized responses keyed by [`request_key`].
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: HashMap<String, JsonValue>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    /// Failures are not cached.
    pub fn get_or_try_insert_with<F>(&mut self, key: &str, fetch: F) -> Result<JsonValue, StrapiError>
    where
        F: FnOnce() -> Result<JsonValue, StrapiError>,
    {
        if let Some(hit) = self.entries.get(key) {
            trace!(key, "query cache hit");
            return Ok(hit.clone());
        }
        let value = fetch()?;
        self.entries.insert(key.to_string(), value.clone());
        Ok(value)
    }
}

/// Collection entries plus the schema used to overlay them.
#[derive(Debug, Clone)]
pub struct Collection {
    pub response: JsonValue,
    /// Only fetched when a token is configured.
    pub schema: Option<SchemaNode>,
}

/// Client for the CMS REST API and its `model-schema` endpoint.
pub struct StrapiClient<T: CmsTransport> {
    creds: Credentials,
    transport: T,
}

impl StrapiClient<UreqTransport> {
    pub fn new(creds: Credentials) -> Self {
        Self::with_transport(creds, UreqTransport)
    }
}

impl<T: CmsTransport> StrapiClient<T> {
    pub fn with_transport(creds: Credentials, transport: T) -> Self {
        Self { creds, transport }
    }

    fn get_json(&self, path: &str, query_string: &str) -> Result<JsonValue, StrapiError> {
        let url = format!("{}{}?{}", self.creds.host, path, query_string);
        debug!(%url, "CMS request");
        let body = self.transport.get(&url, self.creds.token.as_deref())?;
        serde_json::from_str(&body)
            .map_err(|e| StrapiError::FetchError(format!("invalid JSON from '{url}': {e}")))
    }

    /// `GET /api/<name>` with the query serialized in bracket style.
    pub fn get_collection(&self, name: &str, query: Option<&JsonValue>) -> Result<JsonValue, StrapiError> {
        let query_string = query
            .map(|q| stringify(q, QsOptions { encode_values_only: true }))
            .unwrap_or_default();
        self.get_json(&format!("/api/{name}"), &query_string)
    }

    /// Raw deep schema of `model` with the model uid attached as `__uid`.
    pub fn get_model_schema_json(
        &self,
        model: &str,
        query: Option<&JsonValue>,
    ) -> Result<JsonValue, StrapiError> {
        let mut deep_params = json!({"model": model, "deep": true});
        if let (Some(q), Some(params)) = (query, deep_params.as_object_mut()) {
            params.insert("query".to_string(), q.clone());
        }
        let deep = self.get_json(
            "/api/model-schema",
            &stringify(&deep_params, QsOptions::default()),
        )?;
        let root = self.get_json(
            "/api/model-schema",
            &stringify(&json!({"model": model}), QsOptions::default()),
        )?;

        let JsonValue::Object(mut schema) = deep else {
            return Err(StrapiError::SchemaError(format!(
                "model schema for '{model}' must be an object"
            )));
        };
        if let Some(uid) = root.get("uid").and_then(JsonValue::as_str) {
            schema.insert(UID_KEY.to_string(), JsonValue::String(uid.to_string()));
        }
        Ok(JsonValue::Object(schema))
    }

    /// Deep schema of `model`, parsed.
    pub fn get_model_schema(&self, model: &str, query: Option<&JsonValue>) -> Result<SchemaNode, StrapiError> {
        parse_schema(&self.get_model_schema_json(model, query)?)
    }

    /// Fetches a collection and, with a token, its schema; both memoized.
    pub fn load_collection(
        &self,
        cache: &mut QueryCache,
        name: &str,
        query: Option<&JsonValue>,
    ) -> Result<Collection, StrapiError> {
        let response = cache.get_or_try_insert_with(
            &request_key(&self.creds, name, query, RequestKind::Query),
            || self.get_collection(name, query),
        )?;

        let schema = match self.creds.token {
            Some(_) => {
                let raw = cache.get_or_try_insert_with(
                    &request_key(&self.creds, name, query, RequestKind::Schema),
                    || self.get_model_schema_json(name, query),
                )?;
                Some(parse_schema(&raw)?)
            }
            None => None,
        };

        Ok(Collection { response, schema })
    }
}
