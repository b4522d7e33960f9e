// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR detector backed by a vision-language sidecar via OpenAI-compatible API

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use std::io::Cursor;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::provider::Detector;
use super::types::{DetectionInput, DetectionPayload, DetectorError, DetectorKind};

// --- OpenAI-compatible serde structs ---

#[derive(serde::Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: String,
}

const OCR_PROMPT: &str = "Extract all text printed on this product label, including prices and dates. Return only the extracted text, preserving line breaks. If no text is found, respond with an empty string.";

/// Converts the resized image to grayscale and encodes it as PNG
pub fn encode_grayscale_png(input: &DetectionInput) -> Result<Vec<u8>> {
    let gray = DynamicImage::ImageLuma8(image::imageops::grayscale(input.image.pixels()));
    let mut buf = Cursor::new(Vec::new());
    gray.write_to(&mut buf, ImageFormat::Png)
        .context("Failed to encode OCR image")?;
    Ok(buf.into_inner())
}

/// Text extraction through a VLM sidecar
pub struct OcrDetector {
    client: Client,
    endpoint: String,
    model_name: String,
}

impl std::fmt::Debug for OcrDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrDetector")
            .field("endpoint", &self.endpoint)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl OcrDetector {
    /// Create a new OCR client
    ///
    /// The HTTP timeout is a backstop; the scheduler's per-detector deadline
    /// normally fires first.
    pub fn new(endpoint: &str, model_name: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!(
            "OCR detector configured: endpoint={}, model={}",
            endpoint, model_name
        );

        Ok(Self {
            client,
            endpoint,
            model_name: model_name.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check if the sidecar is healthy
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("OCR health check failed: {}", e);
                false
            }
        }
    }

    fn build_request(&self, png: &[u8]) -> ChatRequest {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(png));
        ChatRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: serde_json::json!([
                    {"type": "text", "text": OCR_PROMPT},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]),
            }],
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    /// Extract text from PNG bytes
    pub async fn extract_text(&self, png: &[u8]) -> Result<String> {
        let request = self.build_request(png);

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Detector for OcrDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::PriceExpiryExtraction
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    async fn infer(&self, input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        let start = Instant::now();
        let png = encode_grayscale_png(input)?;
        let text = self
            .extract_text(&png)
            .await
            .map_err(|e| DetectorError::Inference(format!("OCR request failed: {}", e)))?;

        debug!(
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR complete"
        );
        Ok(DetectionPayload::Text(text))
    }
}
