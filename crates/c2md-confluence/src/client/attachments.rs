//! Attachment operations for Confluence API.

use std::io::Read;

use rand::RngExt;
use tracing::info;

use super::{ConfluenceClient, PAGE_LIMIT, checked_body};
use crate::error::ConfluenceError;
use crate::types::{Attachment, ContentList};

impl ConfluenceClient {
    /// Upload or update attachment (upsert by filename).
    pub fn upload_attachment(
        &self,
        page_id: &str,
        filename: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<Attachment, ConfluenceError> {
        let existing = self.find_attachment_by_name(page_id, filename)?;

        let url = if let Some(ref att) = existing {
            info!(
                "Updating existing attachment '{}' (id={})",
                filename, att.id
            );
            format!(
                "{}/content/{}/child/attachment/{}/data",
                self.api_url(),
                page_id,
                att.id
            )
        } else {
            info!(
                "Uploading new attachment '{}' to page {}",
                filename, page_id
            );
            format!("{}/content/{}/child/attachment", self.api_url(), page_id)
        };

        let boundary = format!("----C2mdFormBoundary{:016x}", rand::rng().random::<u64>());
        let body = multipart_body(&boundary, filename, content_type, data);

        let request = self
            .agent
            .post(&url)
            .header(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .header("X-Atlassian-Token", "nocheck")
            .header("Accept", "application/json");
        let response = self.authorize(request).send(&body[..])?;
        let mut body_reader = checked_body(response)?;

        // Response is a list for new uploads, single object for updates
        if existing.is_some() {
            Ok(body_reader.read_json()?)
        } else {
            let response: ContentList<Attachment> = body_reader.read_json()?;
            response
                .results
                .into_iter()
                .next()
                .ok_or_else(|| ConfluenceError::HttpResponse {
                    status: 200,
                    body: "Empty attachment response".to_owned(),
                })
        }
    }

    /// List all attachments on a page.
    pub fn get_attachments(&self, page_id: &str) -> Result<Vec<Attachment>, ConfluenceError> {
        let first = format!(
            "{}/content/{}/child/attachment?start=0&limit={}",
            self.api_url(),
            page_id,
            PAGE_LIMIT
        );

        info!("Getting attachments for page {}", page_id);
        self.collect_all(first)
    }

    /// Open the content of an attachment as a stream.
    pub fn download_attachment(
        &self,
        attachment: &Attachment,
    ) -> Result<Box<dyn Read>, ConfluenceError> {
        let link = attachment.download_link().ok_or_else(|| {
            ConfluenceError::Structural(format!(
                "attachment '{}' has no download link",
                attachment.title
            ))
        })?;
        let url = self.absolute_url(link);

        info!("Downloading attachment '{}'", attachment.title);

        let request = self.agent.get(&url);
        let response = self.authorize(request).call()?;
        let body = checked_body(response)?;
        Ok(Box::new(body.into_reader()))
    }

    /// Find attachment by filename on a page.
    fn find_attachment_by_name(
        &self,
        page_id: &str,
        filename: &str,
    ) -> Result<Option<Attachment>, ConfluenceError> {
        let attachments = self.get_attachments(page_id)?;
        Ok(attachments.into_iter().find(|a| a.title == filename))
    }
}

/// Build a `multipart/form-data` body with a single file part.
fn multipart_body(boundary: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("XYZ", "d.png", "image/png", b"PNG");
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "--XYZ\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"d.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNG\r\n\
             --XYZ--\r\n"
        );
    }
}
