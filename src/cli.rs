use crate::config::{
    Device, DEFAULT_CONCURRENCY, DEFAULT_MAX_IMAGE_EDGE, DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT_SECS,
};
use crate::models::caption_types::{LoraType, StyleMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lora-captioner", version, about = "Rename and caption image folders for LoRA training")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(short, long, global = true, help = "Verbose logging")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rename images and write one caption file per image
    Caption(CaptionArgs),
    /// Show the rename plan without touching anything
    Plan(DatasetArgs),
    /// Check the captioning backend and list its models
    Status(BackendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    #[arg(short, long, help = "Folder containing the images")]
    pub input: PathBuf,
    #[arg(short = 'n', long, help = "Base name for renamed images, e.g. `cat` -> cat_0001.png")]
    pub dataset_name: String,
    #[arg(short, long, help = "Write renamed copies and captions here instead of in place")]
    pub output: Option<PathBuf>,
    #[arg(long, default_value_t = false, help = "Keep original file names")]
    pub no_rename: bool,
    #[arg(short, long, default_value_t = false, help = "Include subfolders")]
    pub recursive: bool,
    #[arg(long, default_value_t = false, help = "Replace existing captions and colliding files")]
    pub overwrite: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    #[arg(long, env = "LORA_CAPTIONER_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,
    #[arg(long, env = "LORA_CAPTIONER_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,
    #[arg(long, value_enum, default_value_t = Device::Auto)]
    pub device: Device,
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_EDGE, help = "Downscale images to this edge before upload")]
    pub max_image_edge: u32,
}

#[derive(Args, Debug, Clone)]
pub struct CaptionArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
    #[command(flatten)]
    pub backend: BackendArgs,
    #[arg(short = 't', long, value_enum)]
    pub lora_type: LoraType,
    #[arg(long, value_enum, default_value_t = StyleMode::Descriptive, help = "Caption style for style LoRAs")]
    pub style_mode: StyleMode,
    #[arg(short = 'w', long, help = "Prefix every caption with this word")]
    pub trigger_word: Option<String>,
    #[arg(long, default_value_t = false, help = "Report what would happen without changing files")]
    pub dry_run: bool,
    #[arg(long, default_value_t = DEFAULT_RETRIES, help = "Extra attempts after a timed-out caption call")]
    pub retries: u32,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, help = "Caption calls in flight at once")]
    pub concurrency: usize,
}
