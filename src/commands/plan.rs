use crate::cli::DatasetArgs;
use crate::commands::dataset_config;
use crate::commands::output;
use crate::models::caption_types::LoraType;
use crate::services::pipeline;

pub fn handle_plan(json: bool, args: DatasetArgs) -> anyhow::Result<()> {
    // Naming does not depend on the LoRA type.
    let config = dataset_config(&args, LoraType::Style);
    let (_, plan) = pipeline::build_plan(&config)?;
    output::print_one(json, plan, output::render_plan)
}
