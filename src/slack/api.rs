//! Slack Web API client: metadata lookup, downloads, and delivery.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::SlackError;
use crate::pipeline::types::{Delivery, DerivedFile, FileMetadata, FileSource};

/// Slack Web API client authenticated with a bot token.
#[derive(Clone)]
pub struct SlackClient {
    token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FileInfoResponse {
    file: FileMetadata,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    upload_url: String,
    file_id: String,
}

impl SlackClient {
    pub fn new(token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Resolve the bot's own user id.
    pub async fn auth_test(&self) -> Result<String, SlackError> {
        let resp = self
            .client
            .post(self.api_url("auth.test"))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| http_error("auth.test", e))?;

        let auth: AuthTestResponse = parse_response("auth.test", resp).await?;
        Ok(auth.user_id)
    }

    async fn get_upload_url(
        &self,
        filename: &str,
        length: usize,
    ) -> Result<UploadUrlResponse, SlackError> {
        let method = "files.getUploadURLExternal";
        let length = length.to_string();
        let resp = self
            .client
            .post(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .form(&[("filename", filename), ("length", length.as_str())])
            .send()
            .await
            .map_err(|e| http_error(method, e))?;

        parse_response(method, resp).await
    }

    async fn upload_bytes(&self, upload_url: &str, file: &DerivedFile) -> Result<(), SlackError> {
        let method = "upload";
        let part = Part::bytes(file.content.clone()).file_name(file.filename.clone());
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(upload_url)
            .bearer_auth(self.token.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| http_error(method, e))?;

        if !resp.status().is_success() {
            return Err(SlackError::Status {
                method: method.into(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn complete_upload(
        &self,
        file_id: &str,
        title: Option<&str>,
        channel: &str,
        caption: Option<&str>,
        thread_ts: Option<&str>,
    ) -> Result<(), SlackError> {
        let method = "files.completeUploadExternal";
        let mut file_entry = serde_json::json!({ "id": file_id });
        if let Some(title) = title {
            file_entry["title"] = title.into();
        }

        let mut body = serde_json::json!({
            "files": [file_entry],
            "channel_id": channel,
        });
        if let Some(caption) = caption {
            body["initial_comment"] = caption.into();
        }
        if let Some(ts) = thread_ts {
            body["thread_ts"] = ts.into();
        }

        let resp = self
            .client
            .post(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(method, e))?;

        parse_response::<serde_json::Value>(method, resp).await?;
        Ok(())
    }
}

#[async_trait]
impl FileSource for SlackClient {
    async fn file_info(&self, file_id: &str) -> Result<FileMetadata, SlackError> {
        let method = "files.info";
        let resp = self
            .client
            .get(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .query(&[("file", file_id)])
            .send()
            .await
            .map_err(|e| http_error(method, e))?;

        let info: FileInfoResponse = parse_response(method, resp).await?;
        Ok(info.file)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SlackError> {
        let method = "download";
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| http_error(method, e))?;

        if !resp.status().is_success() {
            return Err(SlackError::Status {
                method: method.into(),
                status: resp.status().as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| http_error(method, e))?;
        tracing::debug!(bytes = bytes.len(), "Downloaded file content");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Delivery for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), SlackError> {
        let method = "chat.postMessage";
        let mut body = serde_json::json!({
            "channel": channel,
            "text": text,
            "unfurl_links": false,
        });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = ts.into();
        }

        let resp = self
            .client
            .post(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(method, e))?;

        parse_response::<serde_json::Value>(method, resp).await?;
        tracing::debug!(channel, threaded = thread_ts.is_some(), "Message posted");
        Ok(())
    }

    async fn upload_file(
        &self,
        channel: &str,
        file: &DerivedFile,
        caption: Option<&str>,
        thread_ts: Option<&str>,
    ) -> Result<(), SlackError> {
        let target = self.get_upload_url(&file.filename, file.content.len()).await?;
        self.upload_bytes(&target.upload_url, file).await?;
        self.complete_upload(
            &target.file_id,
            file.title.as_deref(),
            channel,
            caption,
            thread_ts,
        )
        .await?;

        tracing::info!(channel, filename = %file.filename, "File uploaded");
        Ok(())
    }
}

fn http_error(method: &str, err: reqwest::Error) -> SlackError {
    SlackError::Http {
        method: method.to_string(),
        reason: err.to_string(),
    }
}

/// Check HTTP status and Slack's `ok` flag, then decode the body.
async fn parse_response<T: DeserializeOwned>(
    method: &str,
    resp: reqwest::Response,
) -> Result<T, SlackError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(SlackError::Status {
            method: method.to_string(),
            status: status.as_u16(),
        });
    }

    let body: serde_json::Value = resp.json().await.map_err(|e| SlackError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })?;

    if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
        let error = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown_error")
            .to_string();
        return Err(SlackError::Api {
            method: method.to_string(),
            error,
        });
    }

    serde_json::from_value(body).map_err(|e| SlackError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
