use crate::error::CaptionError;
use crate::models::caption_types::{CaptionOutcome, CaptionResult, InstructionProfile, LoraType, StyleMode};
use crate::services::captioner::capability::Captioner;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub lora_type: LoraType,
    pub style_mode: StyleMode,
    pub trigger_word: Option<String>,
    /// Extra attempts after a timed-out call.
    pub retries: u32,
    pub timeout: Duration,
}

/// Prefix `raw` with the trigger word, `"{trigger}, {raw}"`, when one is set.
pub fn apply_trigger_word(trigger_word: Option<&str>, raw: &str) -> String {
    match trigger_word {
        Some(word) if !word.is_empty() => format!("{}, {}", word, raw),
        _ => raw.to_string(),
    }
}

pub struct CaptionDispatcher<C> {
    captioner: C,
    settings: DispatchSettings,
    profile: InstructionProfile,
}

impl<C: Captioner> CaptionDispatcher<C> {
    pub fn new(captioner: C, settings: DispatchSettings) -> Self {
        let profile = settings.lora_type.instruction_profile(settings.style_mode);
        Self {
            captioner,
            settings,
            profile,
        }
    }

    pub fn profile(&self) -> InstructionProfile {
        self.profile
    }

    pub fn captioner(&self) -> &C {
        &self.captioner
    }

    pub async fn check_available(&self) -> Result<(), CaptionError> {
        self.captioner.check_available().await
    }

    /// Caption one image. Never fails as a call: every outcome, including a
    /// fatal one, is carried in the returned result for the caller to classify.
    pub async fn dispatch(&self, image_ref: String, image_path: &Path) -> CaptionResult {
        let timeout = self.settings.timeout;
        let mut attempts = 0;

        let outcome = loop {
            attempts += 1;
            match tokio::time::timeout(timeout, self.captioner.caption(image_path, self.profile)).await {
                Ok(Ok(raw)) => {
                    let raw = raw.trim();
                    if raw.is_empty() {
                        break CaptionOutcome::Failed(CaptionError::Generation(
                            "model returned an empty caption".to_string(),
                        ));
                    }
                    let trigger = self
                        .settings
                        .trigger_word
                        .as_deref()
                        .map(str::trim);
                    break CaptionOutcome::Generated {
                        raw_text: raw.to_string(),
                        final_text: apply_trigger_word(trigger, raw),
                    };
                }
                Ok(Err(e)) => break CaptionOutcome::Failed(e),
                Err(_) if attempts <= self.settings.retries => {
                    tracing::warn!(
                        image = %image_ref,
                        attempt = attempts,
                        timeout_secs = timeout.as_secs_f64(),
                        "Caption request timed out, retrying"
                    );
                }
                Err(_) => {
                    break CaptionOutcome::Failed(CaptionError::Generation(format!(
                        "timed out after {:.1}s ({} attempt{})",
                        timeout.as_secs_f64(),
                        attempts,
                        if attempts == 1 { "" } else { "s" }
                    )));
                }
            }
        };

        CaptionResult {
            image_ref,
            instruction_used: self.profile,
            attempts,
            outcome,
        }
    }
}
