use crate::models::caption_types::{LoraType, StyleMode};
use clap::ValueEnum;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const APP_NAME: &str = "lora-captioner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llava";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RETRIES: u32 = 0;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_MAX_IMAGE_EDGE: u32 = 1024;
pub const RENAME_LOG_FILE: &str = "rename_log.txt";
pub const PREVIEW_CHARS: usize = 100;

pub fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "lora_captioner_lib=debug,lora_captioner=debug"
    } else {
        "lora_captioner_lib=info,lora_captioner=info"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Auto,
    Cuda,
    Cpu,
}

/// Connection settings for the vision backend.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub model: String,
    pub device: Device,
    pub max_image_edge: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            device: Device::Auto,
            max_image_edge: DEFAULT_MAX_IMAGE_EDGE,
        }
    }
}

/// Everything one pipeline run needs, independent of how it was collected.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub dataset_name: String,
    pub lora_type: LoraType,
    pub style_mode: StyleMode,
    pub trigger_word: Option<String>,
    pub rename: bool,
    pub recursive: bool,
    pub dry_run: bool,
    pub overwrite: bool,
    pub retries: u32,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, dataset_name: impl Into<String>, lora_type: LoraType) -> Self {
        Self {
            input: input.into(),
            output: None,
            dataset_name: dataset_name.into(),
            lora_type,
            style_mode: StyleMode::default(),
            trigger_word: None,
            rename: true,
            recursive: false,
            dry_run: false,
            overwrite: false,
            retries: DEFAULT_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Trigger word with surrounding whitespace removed, `None` when blank.
    pub fn effective_trigger_word(&self) -> Option<&str> {
        self.trigger_word
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sequential_without_retries() {
        let cfg = PipelineConfig::new("/in", "cat", LoraType::Style);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.retries, 0);
        assert!(cfg.rename);
        assert!(!cfg.dry_run);
        assert!(!cfg.overwrite);
        assert_eq!(cfg.timeout, Duration::from_secs(120));
    }

    #[test]
    fn blank_trigger_word_counts_as_absent() {
        let mut cfg = PipelineConfig::new("/in", "cat", LoraType::Style);
        cfg.trigger_word = Some("   ".into());
        assert_eq!(cfg.effective_trigger_word(), None);
        cfg.trigger_word = Some(" mystyle ".into());
        assert_eq!(cfg.effective_trigger_word(), Some("mystyle"));
    }

    #[test]
    fn verbose_raises_log_level() {
        assert!(default_log_filter(true).contains("debug"));
        assert!(default_log_filter(false).contains("info"));
    }
}
