//! Subcommand handlers. Parsing lives in `cli.rs`, work in `services/*`.

pub mod caption;
pub mod output;
pub mod plan;
pub mod status;

use crate::cli::{BackendArgs, Cli, Commands, DatasetArgs};
use crate::config::{BackendSettings, PipelineConfig};
use crate::models::caption_types::LoraType;

pub(crate) fn dataset_config(args: &DatasetArgs, lora_type: LoraType) -> PipelineConfig {
    let mut config = PipelineConfig::new(&args.input, &args.dataset_name, lora_type);
    config.output = args.output.clone();
    config.rename = !args.no_rename;
    config.recursive = args.recursive;
    config.overwrite = args.overwrite;
    config
}

pub(crate) fn backend_settings(args: &BackendArgs) -> BackendSettings {
    BackendSettings {
        base_url: args.ollama_url.clone(),
        model: args.model.clone(),
        device: args.device,
        max_image_edge: args.max_image_edge,
    }
}

pub async fn handle(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Caption(args) => caption::handle_caption(cli.json, args).await,
        Commands::Plan(args) => plan::handle_plan(cli.json, args),
        Commands::Status(args) => status::handle_status(cli.json, args).await,
    }
}
