use anyhow::{Context, Result, anyhow};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::debug;

use crate::detection::{DetectionResponse, parse_detection_response, server_error_message};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
const PROCESS_PATH: &str = "/process";
const IMAGE_FIELD: &str = "image";

/// HTTP client for the text-detection server.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    http: reqwest::Client,
    base_url: String,
}

impl DetectionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build http client")?;
        Ok(Self {
            http,
            base_url: normalize_base_url(&base_url.into()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /` on the detection server; returns its banner text.
    pub async fn health(&self) -> Result<String> {
        let url = format!("{}/", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to reach detection server at {}", url))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("detection server error ({}): {}", status, text));
        }
        Ok(text)
    }

    /// Uploads one PNG page as multipart field `image` to `POST /process`.
    pub async fn process(&self, png: Vec<u8>, filename: &str) -> Result<DetectionResponse> {
        let url = format!("{}{}", self.base_url, PROCESS_PATH);
        let part = Part::bytes(png)
            .file_name(filename.to_string())
            .mime_str("image/png")
            .with_context(|| "failed to build multipart body")?;
        let form = Form::new().part(IMAGE_FIELD, part);
        debug!("uploading {} to {}", filename, url);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("failed to upload {}", filename))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let detail = server_error_message(&text).unwrap_or(text);
            return Err(anyhow!("detection server error ({}): {}", status, detail));
        }
        parse_detection_response(&text)
    }

    /// Downloads a scrambled page image.
    pub async fn fetch_page(&self, src: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(src)
            .send()
            .await
            .with_context(|| format!("failed to fetch page {}", src))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("page fetch failed ({}): {}", status, src));
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read page body {}", src))?;
        Ok(bytes.to_vec())
    }
}

/// Machine translation through the public `translate_a/single` endpoint.
#[derive(Debug, Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
    url: String,
    source_lang: String,
    target_lang: String,
}

impl TranslationClient {
    pub fn new(
        url: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build http client")?;
        let url = url.into();
        let url = if url.trim().is_empty() {
            DEFAULT_TRANSLATE_URL.to_string()
        } else {
            url.trim().to_string()
        };
        Ok(Self {
            http,
            url,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        })
    }

    pub async fn translate(&self, text: &str) -> Result<String> {
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", self.source_lang.as_str()),
                ("tl", self.target_lang.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .with_context(|| format!("failed to reach translation service at {}", self.url))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("translation service error ({}): {}", status, body));
        }
        parse_translation(&body)
    }
}

/// Joins the translated chunks of a `translate_a/single` response.
pub fn parse_translation(body: &str) -> Result<String> {
    let parsed: serde_json::Value =
        serde_json::from_str(body).with_context(|| "failed to parse translation response")?;
    let chunks = parsed
        .get(0)
        .and_then(|value| value.as_array())
        .ok_or_else(|| anyhow!("translation response has no sentence list"))?;
    Ok(chunks
        .iter()
        .filter_map(|chunk| chunk.get(0).and_then(|value| value.as_str()))
        .collect())
}

fn normalize_base_url(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_SERVER_URL.to_string();
    }
    let trimmed = trimmed.strip_suffix(PROCESS_PATH).unwrap_or(trimmed);
    trimmed.to_string()
}
