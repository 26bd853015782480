//! Confluence REST API client.
//!
//! Provides sync HTTP client for Confluence Server/Data Center REST API
//! with optional HTTP basic authentication.

mod attachments;
mod pages;

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use c2md_config::Credentials;
use serde::de::DeserializeOwned;
use ureq::{Agent, Body, RequestBuilder};

use crate::error::ConfluenceError;
use crate::types::ContentList;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Page size requested from paginated listings.
const PAGE_LIMIT: usize = 50;

/// Confluence REST API client.
pub struct ConfluenceClient {
    agent: Agent,
    base_url: String,
    auth: Option<String>,
}

impl ConfluenceClient {
    /// Create a client for `base_url`, authenticating with `credentials` when given.
    #[must_use]
    pub fn new(base_url: &str, credentials: Option<&Credentials>) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth: credentials.map(basic_auth_header),
        }
    }

    /// Server base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the API base URL.
    fn api_url(&self) -> String {
        format!("{}/rest/api", self.base_url)
    }

    /// Resolve a link returned by the API against the server base URL.
    fn absolute_url(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_owned()
        } else {
            format!("{}/{}", self.base_url, link.trim_start_matches('/'))
        }
    }

    fn authorize<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        match &self.auth {
            Some(header) => request.header("Authorization", header),
            None => request,
        }
    }

    /// GET `url` and return the response body when the status is successful.
    fn get_body(&self, url: &str) -> Result<Body, ConfluenceError> {
        let request = self.agent.get(url).header("Accept", "application/json");
        let response = self.authorize(request).call()?;
        checked_body(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ConfluenceError> {
        Ok(self.get_body(url)?.read_json()?)
    }

    /// Follow `_links.next` until every page of a listing has been read.
    fn collect_all<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>, ConfluenceError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let list: ContentList<T> = self.get_json(&url)?;
            next = list.next_link().map(|link| self.absolute_url(link));
            items.extend(list.results);
        }

        Ok(items)
    }

    /// Fetch an arbitrary JSON document, e.g. a REST search URL.
    pub fn fetch_document(&self, url: &str) -> Result<serde_json::Value, ConfluenceError> {
        tracing::info!("Fetching {url}");
        self.get_json(url)
    }
}

fn basic_auth_header(credentials: &Credentials) -> String {
    let token = STANDARD.encode(format!("{}:{}", credentials.user, credentials.password));
    format!("Basic {token}")
}

/// Turn an error status into [`ConfluenceError::HttpResponse`].
fn checked_body(response: ureq::http::Response<Body>) -> Result<Body, ConfluenceError> {
    let status = response.status().as_u16();
    let mut body = response.into_body();

    if status >= 400 {
        let error_body = body
            .read_to_string()
            .unwrap_or_else(|_| "(unable to read error body)".to_owned());
        return Err(ConfluenceError::HttpResponse {
            status,
            body: error_body,
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ConfluenceClient {
        ConfluenceClient::new("https://wiki.example.com/", None)
    }

    #[test]
    fn test_base_url_trimmed() {
        assert_eq!(client().base_url(), "https://wiki.example.com");
        assert_eq!(client().api_url(), "https://wiki.example.com/rest/api");
    }

    #[test]
    fn test_absolute_url() {
        let client = client();
        assert_eq!(
            client.absolute_url("/download/attachments/1/a.png"),
            "https://wiki.example.com/download/attachments/1/a.png"
        );
        assert_eq!(
            client.absolute_url("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_basic_auth_header() {
        let credentials = Credentials::parse("aladdin:opensesame").unwrap();
        assert_eq!(
            basic_auth_header(&credentials),
            "Basic YWxhZGRpbjpvcGVuc2VzYW1l"
        );
    }
}
