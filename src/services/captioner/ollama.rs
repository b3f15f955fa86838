use crate::config::{BackendSettings, Device};
use crate::error::CaptionError;
use crate::models::caption_types::InstructionProfile;
use crate::services::captioner::capability::Captioner;
use crate::services::captioner::preprocess;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 5;
const PROBE_TIMEOUT_SECS: u64 = 15;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

#[derive(Serialize)]
struct ChatOptions {
    num_gpu: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

/// `llava` matches `llava:latest` and `llava:13b`; a tagged name must match exactly.
fn model_matches(available: &str, wanted: &str) -> bool {
    if available == wanted {
        return true;
    }
    !wanted.contains(':') && available.split(':').next() == Some(wanted)
}

/// Vision captioning through a local Ollama server.
pub struct OllamaCaptioner {
    base_url: String,
    model: String,
    device: Device,
    max_image_edge: u32,
    client: reqwest::Client,
}

impl OllamaCaptioner {
    pub fn new(settings: &BackendSettings) -> Result<Self, CaptionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CaptionError::ModelUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            device: settings.device,
            max_image_edge: settings.max_image_edge,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_models(&self) -> Result<Vec<String>, CaptionError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| {
            CaptionError::ModelUnavailable(format!("Cannot reach Ollama at {}: {}", self.base_url, e))
        })?;

        if !resp.status().is_success() {
            return Err(CaptionError::ModelUnavailable(format!(
                "Ollama at {} answered HTTP {}",
                self.base_url,
                resp.status()
            )));
        }

        let tags: TagsResponse = resp.json().await.map_err(|e| {
            CaptionError::ModelUnavailable(format!("Failed to parse model list: {}", e))
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn options(&self) -> Option<ChatOptions> {
        match self.device {
            Device::Cpu => Some(ChatOptions { num_gpu: 0 }),
            Device::Auto | Device::Cuda => None,
        }
    }
}

impl Captioner for OllamaCaptioner {
    async fn check_available(&self) -> Result<(), CaptionError> {
        let models = self.list_models().await?;
        if models.iter().any(|m| model_matches(m, &self.model)) {
            tracing::debug!(model = %self.model, "Captioning model available");
            Ok(())
        } else {
            Err(CaptionError::ModelUnavailable(format!(
                "model '{}' is not installed on {} (try `ollama pull {}`)",
                self.model, self.base_url, self.model
            )))
        }
    }

    async fn caption(&self, image: &Path, profile: InstructionProfile) -> Result<String, CaptionError> {
        let path = image.to_path_buf();
        let max_edge = self.max_image_edge;

        // Decode and resize off the async workers
        let bytes = tokio::task::spawn_blocking(move || preprocess::prepare_for_upload(&path, max_edge))
            .await
            .map_err(|e| CaptionError::Generation(format!("Image preparation task failed: {}", e)))??;

        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: profile.instruction(),
                images: vec![encoded],
            }],
            stream: false,
            options: self.options(),
        };

        let url = format!("{}/api/chat", self.base_url);
        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CaptionError::ModelUnavailable(format!(
                "model '{}' not found on {}",
                self.model, self.base_url
            )));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CaptionError::Generation(format!("HTTP {}: {}", status, text.trim())));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CaptionError::Generation(format!("Failed to parse model response: {}", e)))?;

        Ok(parsed.message.content)
    }
}
