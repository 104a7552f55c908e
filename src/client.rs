//! HTTP access to the OCL repository and collection APIs.
//!
//! [`OclRepository`] is the seam between the sync run and the network. [`OclClient`] is
//! the reqwest-backed implementation; tests substitute in-memory fakes.

use crate::{
    config::SyncConfig,
    error::SyncError,
    model::{Concept, ConceptId, Reference, ReferenceRecord, SourceVersion},
    traversal::ConceptFetcher,
};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use url::Url;

/// Operations a sync run needs from OCL.
///
/// `add_references` and `delete_references` must return immediately with an empty message
/// list when given no references.
pub trait OclRepository: Sync {
    /// Expressions currently referenced by the collection.
    fn current_references(&self) -> impl Future<Output = Result<Vec<Reference>, SyncError>> + Send;

    /// All published versions of the source, HEAD included.
    fn source_versions(
        &self,
    ) -> impl Future<Output = Result<Vec<SourceVersion>, SyncError>> + Send;

    /// One concept, with mappings, as of `version_url`.
    fn fetch_concept(
        &self,
        version_url: &str,
        id: &ConceptId,
    ) -> impl Future<Output = Result<Concept, SyncError>> + Send;

    fn add_references(
        &self,
        references: &[Reference],
    ) -> impl Future<Output = Result<Value, SyncError>> + Send;

    fn delete_references(
        &self,
        references: &[Reference],
    ) -> impl Future<Output = Result<Value, SyncError>> + Send;
}

/// Adapts an [`OclRepository`] into a [`ConceptFetcher`] pinned to one source version.
pub struct VersionScopedFetcher<'a, R> {
    repository: &'a R,
    version_url: String,
}

impl<'a, R: OclRepository> VersionScopedFetcher<'a, R> {
    pub fn new(repository: &'a R, version_url: impl Into<String>) -> Self {
        Self {
            repository,
            version_url: version_url.into(),
        }
    }

    pub fn version_url(&self) -> &str {
        &self.version_url
    }
}

impl<R: OclRepository> ConceptFetcher for VersionScopedFetcher<'_, R> {
    fn fetch(&self, id: &ConceptId) -> impl Future<Output = Result<Concept, SyncError>> + Send {
        self.repository.fetch_concept(&self.version_url, id)
    }
}

/// reqwest-backed [`OclRepository`].
#[derive(Debug, Clone)]
pub struct OclClient {
    http: Client,
    server: Url,
    token: String,
    source_path: String,
    collection_path: String,
    reference_limit: usize,
}

impl OclClient {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .user_agent(concat!("ocl-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Configuration(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            http,
            server: Url::parse(&config.server)?,
            token: config.api_token.clone(),
            source_path: config.source_path.clone(),
            collection_path: config.collection_path.clone(),
            reference_limit: config.reference_limit,
        })
    }

    /// Append a server-relative path such as `/orgs/X/sources/Y/` to the server url,
    /// keeping any path the server url already has (`https://host/ocl-api`).
    fn url(&self, path: &str) -> Result<Url, SyncError> {
        let base = self.server.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
    }

    /// Send a request and require a 2xx status.
    async fn send(
        &self,
        operation: &str,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<Response, SyncError> {
        tracing::info!("{} {}", operation, url);
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::connection(operation, url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::status(operation, url, status));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: Url) -> Result<T, SyncError> {
        let response = self
            .send(operation, &url, self.request(Method::GET, url.clone()))
            .await?;
        decode(operation, &url, response).await
    }

    async fn write_json<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        method: Method,
        body: &B,
    ) -> Result<Value, SyncError> {
        let url = self.url(&format!("{}references", self.collection_path))?;
        let request = self.request(method, url.clone()).json(body);
        let response = self.send(operation, &url, request).await?;
        let messages: Value = decode(operation, &url, response).await?;
        tracing::info!("{} response: {}", operation, messages);
        Ok(messages)
    }
}

/// Read the body as JSON, reporting schema mismatches as malformed responses.
async fn decode<T: DeserializeOwned>(
    operation: &str,
    url: &Url,
    response: Response,
) -> Result<T, SyncError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| SyncError::connection(operation, url, e))?;
    if body.is_empty() {
        // DELETE may answer 204 with no body
        return serde_json::from_value(Value::Null).map_err(|e| SyncError::malformed(operation, e));
    }
    serde_json::from_slice(&body).map_err(|e| SyncError::malformed(operation, e))
}

impl OclRepository for OclClient {
    async fn current_references(&self) -> Result<Vec<Reference>, SyncError> {
        let mut url = self.url(&format!("{}references", self.collection_path))?;
        url.query_pairs_mut()
            .append_pair("limit", &self.reference_limit.to_string());
        let records: Vec<ReferenceRecord> = self.get_json("fetch collection references", url).await?;
        Ok(records.into_iter().map(|r| r.expression).collect())
    }

    async fn source_versions(&self) -> Result<Vec<SourceVersion>, SyncError> {
        let url = self.url(&format!("{}versions", self.source_path))?;
        self.get_json("list source versions", url).await
    }

    async fn fetch_concept(&self, version_url: &str, id: &ConceptId) -> Result<Concept, SyncError> {
        let mut url = self.url(&format!("{version_url}concepts/"))?;
        // Concept codes come from mapping targets and may contain `/`, `?` or `#`
        url.path_segments_mut()
            .map_err(|_| SyncError::Configuration(format!("{} cannot take a path", self.server)))?
            .pop_if_empty()
            .push(id.as_str());
        url.query_pairs_mut().append_pair("includeMappings", "true");
        self.get_json(&format!("fetch concept {id}"), url).await
    }

    async fn add_references(&self, references: &[Reference]) -> Result<Value, SyncError> {
        if references.is_empty() {
            tracing::info!("No references to add");
            return Ok(json!([]));
        }
        let body = json!({ "data": { "expressions": references } });
        self.write_json("add references", Method::PUT, &body).await
    }

    async fn delete_references(&self, references: &[Reference]) -> Result<Value, SyncError> {
        if references.is_empty() {
            tracing::info!("No references to delete");
            return Ok(json!([]));
        }
        let body = json!({ "references": references });
        self.write_json("delete references", Method::DELETE, &body).await
    }
}
