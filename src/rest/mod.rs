//! # Identity Toolkit REST Client
//!
//! Typed request/response layer over the Google Identity Toolkit v1/v2 APIs.
//! User management speaks v1, provider-config and tenant management speak v2.
//! Tenant-scoped clients inject `/tenants/<id>` into every resource path, and
//! emulator mode redirects both versions to `http://<host>/` with the real
//! authority as the leading path segment.

pub mod pages;
pub mod providers;
pub mod tenants;
pub mod users;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{extract_google_api_error, AuthErrorCode, FirebaseError, Result};
use crate::oauth::TokenSource;

static CLIENT_VERSION_HEADER: &str = "X-Client-Version";

fn client_version() -> String {
    format!("Rust/Admin/{}", env!("CARGO_PKG_VERSION"))
}

/// Shared plumbing for every identity toolkit request: URL construction,
/// bearer and version headers, deadline, and error extraction.
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: reqwest::blocking::Client,
    token_source: Arc<dyn TokenSource>,
    project_id: String,
    tenant_id: Option<String>,
    emulator_host: Option<String>,
    timeout: Option<std::time::Duration>,
}

impl ApiClient {
    pub(crate) fn new(
        client: reqwest::blocking::Client,
        token_source: Arc<dyn TokenSource>,
        project_id: impl Into<String>,
        tenant_id: Option<String>,
        emulator_host: Option<String>,
        timeout: Option<std::time::Duration>,
    ) -> Self {
        ApiClient {
            client,
            token_source,
            project_id: project_id.into(),
            tenant_id,
            emulator_host,
            timeout,
        }
    }

    fn base(&self, version: &str) -> String {
        let origin = match self.emulator_host {
            Some(ref host) => format!("http://{}/identitytoolkit.googleapis.com", host),
            None => "https://identitytoolkit.googleapis.com".to_owned(),
        };
        let mut url = format!("{}/{}/projects/{}", origin, version, self.project_id);
        if let Some(ref tenant) = self.tenant_id {
            url.push_str("/tenants/");
            url.push_str(tenant);
        }
        url
    }

    /// v1 resource URL; `path` starts with `/` or `:`.
    pub(crate) fn v1(&self, path: &str) -> String {
        format!("{}{}", self.base("v1"), path)
    }

    /// v2 resource URL; `path` starts with `/` or `:`.
    pub(crate) fn v2(&self, path: &str) -> String {
        format!("{}{}", self.base("v2"), path)
    }

    fn prepare(&self, builder: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::RequestBuilder> {
        let bearer = self.token_source.token()?;
        let mut builder = builder
            .bearer_auth(bearer)
            .header(CLIENT_VERSION_HEADER, client_version());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder)
    }

    pub(crate) fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        context: &str,
    ) -> Result<R> {
        let response = self.prepare(self.client.post(url))?.json(body).send()?;
        let response = extract_google_api_error(response, || context.to_owned())?;
        parse_body(response, context)
    }

    pub(crate) fn post_json_with_query<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &B,
        context: &str,
    ) -> Result<R> {
        let response = self
            .prepare(self.client.post(url))?
            .query(query)
            .json(body)
            .send()?;
        let response = extract_google_api_error(response, || context.to_owned())?;
        parse_body(response, context)
    }

    pub(crate) fn get_json<R: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<R> {
        let response = self.prepare(self.client.get(url))?.query(query).send()?;
        let response = extract_google_api_error(response, || context.to_owned())?;
        parse_body(response, context)
    }

    pub(crate) fn patch_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &B,
        context: &str,
    ) -> Result<R> {
        let response = self
            .prepare(self.client.patch(url))?
            .query(query)
            .json(body)
            .send()?;
        let response = extract_google_api_error(response, || context.to_owned())?;
        parse_body(response, context)
    }

    pub(crate) fn delete(&self, url: &str, context: &str) -> Result<()> {
        let response = self.prepare(self.client.delete(url))?.send()?;
        extract_google_api_error(response, || context.to_owned())?;
        Ok(())
    }
}

/// Decode a 2xx body. An empty or unparseable body where a payload is
/// required is always an internal error with `UNEXPECTED_RESPONSE`.
fn parse_body<R: DeserializeOwned>(response: reqwest::blocking::Response, context: &str) -> Result<R> {
    let status = response.status();
    let text = response.text()?;
    if text.trim().is_empty() {
        return Err(FirebaseError::internal(format!("{}: server returned an empty body", context))
            .with_code(AuthErrorCode::UnexpectedResponse)
            .with_response(status, text));
    }
    serde_json::from_str(&text).map_err(|e| {
        FirebaseError::internal(format!("{}: unexpected response payload", context))
            .with_code(AuthErrorCode::UnexpectedResponse)
            .with_source(e)
            .with_response(status, text)
    })
}
