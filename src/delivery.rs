use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Form field carrying the uploaded file.
const UPLOAD_FIELD: &str = "file1";

/// HTTP seam between the bots and the webhook endpoints.
///
/// Both calls return the raw response body; interpreting it is up to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>>;

    async fn post_file(&self, url: &str, filename: &str, bytes: Vec<u8>) -> Result<Vec<u8>>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }

    async fn post_file(&self, url: &str, filename: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}

/// Webhook reply to a pushed message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SendResponse {
    #[serde(rename = "errcode")]
    pub err_code: i64,
    #[serde(rename = "errmsg")]
    pub err_msg: String,
}

impl SendResponse {
    pub(crate) fn parse(body: &[u8]) -> Result<Self> {
        let response: SendResponse = serde_json::from_slice(body).map_err(Error::InvalidResponse)?;
        debug!("Send response: {:?}", response);
        if response.err_code != 0 {
            return Err(Error::Api {
                code: response.err_code,
                message: response.err_msg,
            });
        }
        Ok(response)
    }
}

/// Webhook reply to a media upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadResponse {
    #[serde(rename = "errcode")]
    pub err_code: i64,
    #[serde(rename = "errmsg")]
    pub err_msg: String,
    /// Reference used by file messages. Valid for three days.
    pub media_id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl UploadResponse {
    pub(crate) fn parse(body: &[u8]) -> Result<Self> {
        let response: UploadResponse =
            serde_json::from_slice(body).map_err(Error::InvalidResponse)?;
        debug!("Upload response: {:?}", response);
        if response.err_code != 0 {
            return Err(Error::Api {
                code: response.err_code,
                message: response.err_msg,
            });
        }
        if response.media_id.is_empty() {
            return Err(Error::MissingMediaId);
        }
        Ok(response)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }
}

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Upload endpoint for a webhook: the trailing `send` segment becomes
/// `upload_media` and `type=file` is added to the query.
pub(crate) fn upload_url(webhook: &Url) -> Result<Url> {
    let invalid = |reason: &str| Error::InvalidUrl {
        url: webhook.to_string(),
        reason: reason.to_string(),
    };

    if webhook.path_segments().and_then(|mut s| s.next_back()) != Some("send") {
        return Err(invalid("webhook path does not end in 'send'"));
    }

    let mut upload = webhook.clone();
    upload
        .path_segments_mut()
        .map_err(|_| invalid("webhook url cannot have a path"))?
        .pop()
        .push("upload_media");
    upload.query_pairs_mut().append_pair("type", "file");
    Ok(upload)
}

pub(crate) fn with_debug(url: &Url) -> Url {
    let mut url = url.clone();
    url.query_pairs_mut().append_pair("debug", "1");
    url
}
