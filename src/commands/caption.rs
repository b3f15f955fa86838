use crate::cli::CaptionArgs;
use crate::commands::output;
use crate::commands::{backend_settings, dataset_config};
use crate::services::captioner::ollama::OllamaCaptioner;
use crate::services::pipeline::Pipeline;
use anyhow::Context;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Conventional 128 + SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

pub async fn handle_caption(json: bool, args: CaptionArgs) -> anyhow::Result<()> {
    let mut config = dataset_config(&args.dataset, args.lora_type);
    config.style_mode = args.style_mode;
    config.trigger_word = args.trigger_word;
    config.dry_run = args.dry_run;
    config.retries = args.retries;
    config.timeout = Duration::from_secs(args.timeout_secs);
    config.concurrency = args.concurrency;

    let captioner = OllamaCaptioner::new(&backend_settings(&args.backend)).context("failed to set up Ollama client")?;
    tracing::info!(model = captioner.model(), url = captioner.base_url(), "Using Ollama backend");

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, finishing current image then stopping (Ctrl-C again to quit now)");
        flag.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt, exiting immediately");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let pipeline = Pipeline::new(config, captioner).with_cancel_flag(cancel);
    let summary = pipeline.run().await?;

    output::print_one(json, summary, output::render_summary)
}
