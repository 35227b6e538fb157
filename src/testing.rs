//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::bot::Bot;
use crate::delivery::Transport;
use crate::error::{Error, Result};

pub(crate) const WEBHOOK: &str = "https://example.com/hook/send?key=k";

/// Records every call and answers with canned bodies.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    send_reply: Vec<u8>,
    upload_reply: Option<Vec<u8>>,
    json: Mutex<Vec<(String, Vec<u8>)>>,
    files: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl RecordingTransport {
    pub(crate) fn ok() -> Arc<Self> {
        Self::replying(br#"{"errcode":0,"errmsg":"ok"}"#)
    }

    pub(crate) fn replying(body: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            send_reply: body.to_vec(),
            ..Default::default()
        })
    }

    /// Like [`RecordingTransport::ok`], with uploads answered by `body`.
    pub(crate) fn uploading(body: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            send_reply: br#"{"errcode":0,"errmsg":"ok"}"#.to_vec(),
            upload_reply: Some(body.to_vec()),
            ..Default::default()
        })
    }

    pub(crate) fn json_calls(&self) -> usize {
        self.json.lock().unwrap().len()
    }

    pub(crate) fn file_calls(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub(crate) fn json_urls(&self) -> Vec<String> {
        self.json.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    /// Bodies of all JSON posts, parsed.
    pub(crate) fn sent(&self) -> Vec<serde_json::Value> {
        self.json
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| serde_json::from_slice(body).unwrap())
            .collect()
    }

    pub(crate) fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.json.lock().unwrap().push((url.to_string(), body));
        Ok(self.send_reply.clone())
    }

    async fn post_file(&self, url: &str, filename: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .push((url.to_string(), filename.to_string(), bytes));
        self.upload_reply
            .clone()
            .ok_or_else(|| Error::usage("no upload reply configured"))
    }
}

/// A bot named "test" pointed at [`WEBHOOK`], without de-duplication.
pub(crate) fn test_bot(transport: Arc<RecordingTransport>) -> Arc<Bot> {
    let bot = Arc::new(Bot::new("test", transport, 0));
    bot.set_webhook_url(WEBHOOK).unwrap();
    bot
}
