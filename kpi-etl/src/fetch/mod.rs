//! Workbook download from the document-store API

use async_trait::async_trait;

use crate::auth::Token;
use crate::config::SourceConfig;
use crate::pipeline::PipelineError;

/// Retrieves the raw workbook bytes for a run
#[async_trait]
pub trait WorkbookSource: Send + Sync {
    async fn fetch(&self, token: &Token) -> Result<Vec<u8>, PipelineError>;
}

/// Fetches a drive item's content by its (site, drive, path) triple
pub struct DriveItemFetcher {
    config: SourceConfig,
    http: reqwest::Client,
}

impl DriveItemFetcher {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn content_url(&self) -> String {
        content_url(
            &self.config.base_url,
            &self.config.site_id,
            &self.config.drive_id,
            &self.config.file_path,
        )
    }
}

/// Build the `.../root:/{path}:/content` download URL. Each path segment is
/// percent-encoded on its own so the `/` separators survive.
fn content_url(base: &str, site_id: &str, drive_id: &str, file_path: &str) -> String {
    let encoded_path = file_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "{}/sites/{}/drives/{}/root:/{}:/content",
        base.trim_end_matches('/'),
        site_id,
        drive_id,
        encoded_path
    )
}

/// Cap the diagnostic body carried in fetch errors
fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl WorkbookSource for DriveItemFetcher {
    async fn fetch(&self, token: &Token) -> Result<Vec<u8>, PipelineError> {
        log::info!("Fetching workbook '{}'", self.config.file_path);

        let response = self
            .http
            .get(self.content_url())
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetchFailed {
                status: None,
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::RemoteFetchFailed {
                status: Some(status.as_u16()),
                detail: truncate_body(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::RemoteFetchFailed {
                status: None,
                detail: format!("response body unreadable: {e}"),
            })?;

        log::info!("Fetched {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}
