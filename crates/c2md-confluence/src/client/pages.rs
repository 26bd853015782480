//! Page operations for Confluence API.

use serde_json::json;
use tracing::info;

use super::{ConfluenceClient, PAGE_LIMIT, checked_body};
use crate::error::ConfluenceError;
use crate::types::Page;

impl ConfluenceClient {
    /// Get a page by ID with the given expansions.
    pub fn get_page(&self, page_id: &str, expand: &[&str]) -> Result<Page, ConfluenceError> {
        let url = format!(
            "{}/content/{}?expand={}",
            self.api_url(),
            page_id,
            expand.join(",")
        );

        info!("Getting page {}", page_id);
        self.get_json(&url)
    }

    /// Get all direct child pages, following pagination.
    pub fn get_child_pages(&self, page_id: &str) -> Result<Vec<Page>, ConfluenceError> {
        let first = format!(
            "{}/content/{}/child/page?expand=body.storage,version&start=0&limit={}",
            self.api_url(),
            page_id,
            PAGE_LIMIT
        );

        info!("Getting child pages of {}", page_id);
        self.collect_all(first)
    }

    /// Replace the storage body of `page`, bumping its version.
    pub fn update_page(&self, page: &Page, storage_html: &str) -> Result<Page, ConfluenceError> {
        let url = format!("{}/content/{}", self.api_url(), page.id);
        let payload = json!({
            "id": page.id,
            "type": page.content_type,
            "title": page.title,
            "body": {
                "storage": {
                    "value": storage_html,
                    "representation": "storage",
                }
            },
            "version": {"number": page.version_number() + 1},
        });

        info!(
            "Updating page {} to version {}",
            page.id,
            page.version_number() + 1
        );

        let request = self.agent.put(&url).header("Accept", "application/json");
        let response = self.authorize(request).send_json(&payload)?;
        Ok(checked_body(response)?.read_json()?)
    }

    /// Web UI URL of a page, if the server reported one.
    #[must_use]
    pub fn page_url(&self, page: &Page) -> Option<String> {
        page.links
            .as_ref()
            .and_then(|l| l.webui.as_deref())
            .map(|webui| self.absolute_url(webui))
    }
}
