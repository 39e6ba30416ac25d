//! Gemini-style `generateContent` REST backend.

use crate::{VisionBackend, VisionError};
use base64::Engine;
use core_config::VISION_API_KEY_ENV;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct VisionRequest {
    contents: Vec<VisionContent>,
    #[serde(rename = "generationConfig")]
    generation_config: VisionGenConfig,
}

#[derive(Serialize)]
struct VisionContent {
    parts: Vec<VisionPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum VisionPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct VisionGenConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

pub struct RestVision {
    endpoint: String,
    agent: ureq::Agent,
}

impl RestVision {
    pub fn new(endpoint: String, timeout_ms: u64) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(timeout_ms)))
            .build();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            agent: config.into(),
        }
    }

    fn api_key() -> Result<String, VisionError> {
        std::env::var(VISION_API_KEY_ENV)
            .map_err(|_| VisionError::MissingApiKey(VISION_API_KEY_ENV))
    }
}

impl VisionBackend for RestVision {
    fn analyze(&self, model: &str, image_jpeg: &[u8], prompt: &str) -> Result<String, VisionError> {
        let key = Self::api_key()?;
        let url = format!("{}/models/{}:generateContent", self.endpoint, model);
        let body = VisionRequest {
            contents: vec![VisionContent {
                parts: vec![
                    VisionPart::Text {
                        text: prompt.to_string(),
                    },
                    VisionPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(image_jpeg),
                        },
                    },
                ],
            }],
            generation_config: VisionGenConfig {
                temperature: 0.1,
                max_output_tokens: 1024,
            },
        };

        debug!(target: "vision", model, image_bytes = image_jpeg.len(), "vision_request");
        let mut response = self
            .agent
            .post(&url)
            .header("x-goog-api-key", &key)
            .send_json(&body)
            .map_err(|e| VisionError::Http(e.to_string()))?;
        let value: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| VisionError::Http(e.to_string()))?;

        // Concatenate all text parts of the first candidate.
        let parts = value
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or(VisionError::EmptyReply)?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        if text.is_empty() {
            return Err(VisionError::EmptyReply);
        }
        Ok(text)
    }
}
