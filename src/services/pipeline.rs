use crate::config::{PipelineConfig, RENAME_LOG_FILE};
use crate::error::{CaptionError, PipelineError};
use crate::models::caption_types::{CaptionOutcome, CaptionResult};
use crate::models::naming_types::{RenameAction, RenamePlan};
use crate::models::summary_types::{FailedItem, ItemReport, ItemState, RunSummary, Stage};
use crate::services::captioner::capability::Captioner;
use crate::services::captioner::dispatcher::{CaptionDispatcher, DispatchSettings};
use crate::services::fs_service::{self, Discovery};
use crate::services::naming_service::{self, NamingOptions};
use crate::services::writer_service::{self, RenameLog, RenameOutcome};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub fn validate_config(config: &PipelineConfig) -> Result<(), PipelineError> {
    naming_service::validate_dataset_name(&config.dataset_name)?;
    if config.concurrency == 0 {
        return Err(PipelineError::InvalidConfig(
            "concurrency must be at least 1".to_string(),
        ));
    }
    if config.timeout.is_zero() {
        return Err(PipelineError::InvalidConfig(
            "timeout must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Absolute form of the output folder, canonical when it already exists.
fn resolve_output(output: Option<&Path>) -> Result<Option<PathBuf>, PipelineError> {
    let Some(out) = output else {
        return Ok(None);
    };
    let abs = if out.is_absolute() {
        out.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| PipelineError::io(out, e))?
            .join(out)
    };
    if abs.exists() && !abs.is_dir() {
        return Err(PipelineError::InvalidConfig(format!(
            "output path {} exists and is not a directory",
            abs.display()
        )));
    }
    Ok(Some(abs.canonicalize().unwrap_or(abs)))
}

/// Discovery plus naming, without touching the filesystem or the model.
pub fn build_plan(config: &PipelineConfig) -> Result<(Discovery, RenamePlan), PipelineError> {
    validate_config(config)?;
    let output = resolve_output(config.output.as_deref())?;
    let discovery = fs_service::discover_images(&config.input, config.recursive, output.as_deref())?;

    let opts = NamingOptions {
        dataset_name: &config.dataset_name,
        rename_enabled: config.rename,
        overwrite: config.overwrite,
        output_dir: output.as_deref(),
    };
    let plan = naming_service::plan_renames(discovery.entries(), &discovery.root, &opts);
    Ok((discovery, plan))
}

fn unavailable_reason(err: CaptionError) -> String {
    match err {
        CaptionError::ModelUnavailable(reason) => reason,
        other => other.to_string(),
    }
}

/// Per-item bookkeeping, touched only from the orchestrating task.
struct Ledger {
    states: Vec<ItemState>,
    renamed: Vec<bool>,
    previews: Vec<Option<String>>,
    instructions: Vec<Option<&'static str>>,
    failed: Vec<FailedItem>,
}

impl Ledger {
    fn new(len: usize) -> Self {
        Self {
            states: vec![ItemState::Discovered; len],
            renamed: vec![false; len],
            previews: vec![None; len],
            instructions: vec![None; len],
            failed: Vec::new(),
        }
    }

    fn advance(&mut self, idx: usize, next: ItemState) {
        let ok = self.states[idx].advance(next);
        debug_assert!(ok, "illegal item transition to {next:?}");
    }

    fn fail(&mut self, idx: usize, image_ref: &str, stage: Stage, reason: String) {
        tracing::warn!(image = %image_ref, %stage, %reason, "Item failed");
        self.advance(idx, ItemState::Failed(stage));
        self.failed.push(FailedItem {
            image_ref: image_ref.to_string(),
            stage,
            reason,
        });
    }

    fn is_live(&self, idx: usize) -> bool {
        !self.states[idx].is_terminal()
    }
}

pub struct Pipeline<C> {
    config: PipelineConfig,
    dispatcher: CaptionDispatcher<C>,
    cancel: Arc<AtomicBool>,
}

impl<C: Captioner> Pipeline<C> {
    pub fn new(config: PipelineConfig, captioner: C) -> Self {
        let settings = DispatchSettings {
            lora_type: config.lora_type,
            style_mode: config.style_mode,
            trigger_word: config.effective_trigger_word().map(String::from),
            retries: config.retries,
            timeout: config.timeout,
        };
        Self {
            dispatcher: CaptionDispatcher::new(captioner, settings),
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancel flag (e.g. one set by Ctrl-C).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn captioner(&self) -> &C {
        self.dispatcher.captioner()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let config = &self.config;
        let (discovery, plan) = build_plan(config)?;
        let entries = discovery.entries();

        let mut summary = RunSummary {
            total_discovered: entries.len(),
            dry_run: config.dry_run,
            ..RunSummary::default()
        };

        if entries.is_empty() {
            tracing::info!(input = %discovery.root.display(), "No supported images found");
            return Ok(summary);
        }

        self.dispatcher
            .check_available()
            .await
            .map_err(|e| PipelineError::ModelUnavailable(unavailable_reason(e)))?;

        tracing::info!(
            images = entries.len(),
            profile = self.dispatcher.profile().name(),
            in_place = plan.in_place,
            dry_run = config.dry_run,
            "Starting run"
        );

        if !plan.in_place {
            writer_service::ensure_dir(&plan.output_dir, config.dry_run)
                .map_err(|e| PipelineError::io(&plan.output_dir, e.source))?;
        }

        let mut ledger = Ledger::new(entries.len());
        let image_refs: Vec<String> = entries.iter().map(|e| e.image_ref()).collect();

        // Rename phase. Staged moves are parked first, everything else is
        // applied in order, then the parked files are moved home.
        let mut parked: Vec<Option<PathBuf>> = vec![None; entries.len()];
        for (idx, item) in plan.items.iter().enumerate() {
            if let Some(conflict) = &item.conflict {
                ledger.fail(idx, &image_refs[idx], Stage::Rename, conflict.to_string());
                continue;
            }
            if item.staged && !config.dry_run {
                match writer_service::stage(&entries[idx].original_path, entries[idx].discovery_order) {
                    Ok(staged) => parked[idx] = Some(staged),
                    Err(e) => ledger.fail(idx, &image_refs[idx], Stage::Rename, e.to_string()),
                }
            }
        }

        for (idx, item) in plan.items.iter().enumerate() {
            if !ledger.is_live(idx) || parked[idx].is_some() {
                continue;
            }
            match writer_service::apply_rename(&entries[idx].original_path, item, config.dry_run) {
                // With renaming off a copy keeps its name and is not a rename.
                Ok(RenameOutcome::Renamed) | Ok(RenameOutcome::WouldRename) if !config.rename => {
                    ledger.advance(idx, ItemState::RenameSkipped)
                }
                Ok(RenameOutcome::Renamed) | Ok(RenameOutcome::WouldRename) => {
                    ledger.advance(idx, ItemState::Renamed);
                    ledger.renamed[idx] = true;
                }
                Ok(RenameOutcome::Unchanged) => ledger.advance(idx, ItemState::RenameSkipped),
                Err(e) => ledger.fail(idx, &image_refs[idx], Stage::Rename, e.to_string()),
            }
        }

        for (idx, item) in plan.items.iter().enumerate() {
            let Some(staged) = parked[idx].take() else {
                continue;
            };
            match writer_service::finish_staged(&staged, &entries[idx].original_path, item) {
                Ok(true) => {
                    ledger.advance(idx, ItemState::Renamed);
                    ledger.renamed[idx] = true;
                }
                Ok(false) => ledger.fail(
                    idx,
                    &image_refs[idx],
                    Stage::Rename,
                    format!("target {} is still occupied", item.target_path.display()),
                ),
                Err(e) => ledger.fail(idx, &image_refs[idx], Stage::Rename, e.to_string()),
            }
        }

        let mut rename_log = RenameLog::new();
        for (idx, item) in plan.items.iter().enumerate() {
            if ledger.renamed[idx] {
                let new_name = item
                    .target_path
                    .strip_prefix(&plan.output_dir)
                    .unwrap_or(&item.target_path)
                    .to_string_lossy()
                    .replace('\\', "/");
                rename_log.record(image_refs[idx].clone(), new_name);
            }
        }
        summary.renamed_count = rename_log.entries().len();

        // Existing captions are kept unless overwrite is on, and cost no model call.
        let mut queue: Vec<(usize, PathBuf)> = Vec::new();
        for (idx, item) in plan.items.iter().enumerate() {
            if !ledger.is_live(idx) {
                continue;
            }
            if !config.overwrite && writer_service::caption_exists(item) {
                tracing::info!(image = %image_refs[idx], caption = %item.caption_path.display(), "Caption exists, skipping");
                ledger.advance(idx, ItemState::WriteSkipped);
                ledger.advance(idx, ItemState::Done);
                summary.skipped_count += 1;
                continue;
            }
            let image_path = if config.dry_run || item.action == RenameAction::Keep {
                entries[idx].original_path.clone()
            } else {
                item.target_path.clone()
            };
            queue.push((idx, image_path));
        }

        let fatal = self.caption_phase(queue, &plan, &image_refs, &mut ledger, &mut summary).await;

        if !config.dry_run && !rename_log.is_empty() {
            let log_path = plan.output_dir.join(RENAME_LOG_FILE);
            match rename_log.append_to(&log_path) {
                Ok(()) => summary.rename_log = Some(log_path),
                Err(e) => tracing::error!(error = %e, "Failed to write rename log"),
            }
        }

        summary.failed = std::mem::take(&mut ledger.failed);
        summary.items = plan
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| ItemReport {
                image_ref: image_refs[idx].clone(),
                target_name: item.target_filename.clone(),
                caption_path: item.caption_path.clone(),
                renamed: ledger.renamed[idx],
                state: ledger.states[idx],
                instruction: ledger.instructions[idx],
                caption_preview: ledger.previews[idx].take(),
            })
            .collect();

        if let Some(reason) = fatal {
            tracing::error!(%reason, "Aborting run: captioning model became unavailable");
            return Err(PipelineError::Aborted {
                reason,
                summary: Box::new(summary),
            });
        }

        tracing::info!(
            discovered = summary.total_discovered,
            renamed = summary.renamed_count,
            captioned = summary.captioned_count,
            skipped = summary.skipped_count,
            failed = summary.failed_count(),
            unprocessed = summary.unprocessed_count,
            "Run complete"
        );

        Ok(summary)
    }

    /// Caption the queued items with bounded concurrency and write each
    /// result in input order. Returns the reason when the model dropped out.
    async fn caption_phase(
        &self,
        queue: Vec<(usize, PathBuf)>,
        plan: &RenamePlan,
        image_refs: &[String],
        ledger: &mut Ledger,
        summary: &mut RunSummary,
    ) -> Option<String> {
        let config = &self.config;
        let total = queue.len();
        let started = Instant::now();
        let halted = AtomicBool::new(false);
        let dispatcher = &self.dispatcher;
        let cancel = &self.cancel;
        let halted_ref = &halted;

        let mut results = futures::stream::iter(queue.into_iter().map(|(idx, path)| {
            let image_ref = image_refs[idx].clone();
            let span = tracing::info_span!("item", image = %image_ref);
            async move {
                if cancel.load(Ordering::SeqCst) || halted_ref.load(Ordering::SeqCst) {
                    return (idx, None);
                }
                let result: CaptionResult = dispatcher.dispatch(image_ref, &path).await;
                (idx, Some(result))
            }
            .instrument(span)
        }))
        .buffered(config.concurrency);

        let mut done = 0usize;
        let mut fatal = None;

        while let Some((idx, result)) = results.next().await {
            let image_ref = &image_refs[idx];
            let Some(result) = result else {
                summary.unprocessed_count += 1;
                continue;
            };
            if fatal.is_some() {
                // Finished after the model dropped out; never written.
                summary.unprocessed_count += 1;
                continue;
            }

            match result.outcome {
                CaptionOutcome::Failed(err) if err.is_fatal() => {
                    halted.store(true, Ordering::SeqCst);
                    ledger.fail(idx, image_ref, Stage::Caption, err.to_string());
                    fatal = Some(unavailable_reason(err));
                    continue;
                }
                CaptionOutcome::Failed(err) => {
                    ledger.fail(idx, image_ref, Stage::Caption, err.to_string());
                }
                CaptionOutcome::Generated { final_text, .. } => {
                    ledger.advance(idx, ItemState::Captioned);
                    ledger.instructions[idx] = Some(result.instruction_used.name());
                    ledger.previews[idx] = Some(writer_service::preview(&final_text));

                    let item = &plan.items[idx];
                    match writer_service::write_caption(&item.caption_path, &final_text, config.overwrite, config.dry_run) {
                        Ok(_) => {
                            ledger.advance(idx, ItemState::Written);
                            ledger.advance(idx, ItemState::Done);
                            summary.captioned_count += 1;
                        }
                        Err(e) => ledger.fail(idx, image_ref, Stage::Write, e.to_string()),
                    }
                }
            }

            done += 1;
            let elapsed = started.elapsed();
            let eta_secs = elapsed.as_secs_f64() / done as f64 * (total - done) as f64;
            tracing::info!(
                image = %image_ref,
                progress = %format_args!("{}/{}", done, total),
                attempts = result.attempts,
                eta_secs = eta_secs.round() as u64,
                "Captioned"
            );
        }

        if self.cancelled() {
            summary.cancelled = true;
            tracing::warn!(unprocessed = summary.unprocessed_count, "Run cancelled");
        }
        fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::caption_types::LoraType;
    use crate::services::captioner::mock::{MockCaptioner, MockReply};
    use std::fs;
    use tempfile::TempDir;

    fn fixture(names: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for name in names {
            fs::write(tmp.path().join(name), name.as_bytes()).unwrap();
        }
        tmp
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn config(dir: &Path) -> PipelineConfig {
        let mut cfg = PipelineConfig::new(dir, "cat", LoraType::Style);
        cfg.trigger_word = Some("mystyle".into());
        cfg
    }

    #[tokio::test]
    async fn renames_and_captions_in_place() {
        let tmp = fixture(&["a.png", "b.JPG", "c.txt"]);
        let mock = MockCaptioner::new().reply("cat_0001.png", MockReply::Text("a red fox".into()));
        let pipeline = Pipeline::new(config(tmp.path()), mock);

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.total_discovered, 2);
        assert_eq!(summary.renamed_count, 2);
        assert_eq!(summary.captioned_count, 2);
        assert_eq!(summary.failed_count(), 0);
        assert_eq!(
            listing(tmp.path()),
            vec!["c.txt", "cat_0001.png", "cat_0001.txt", "cat_0002.JPG", "cat_0002.txt", "rename_log.txt"]
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("cat_0001.txt")).unwrap(),
            "mystyle, a red fox"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("rename_log.txt")).unwrap(),
            "a.png -> cat_0001.png\nb.JPG -> cat_0002.JPG\n"
        );
        assert!(summary.items.iter().all(|i| i.state == ItemState::Done));
    }

    #[tokio::test]
    async fn second_run_changes_nothing() {
        let tmp = fixture(&["a.png", "b.JPG"]);
        Pipeline::new(config(tmp.path()), MockCaptioner::new())
            .run()
            .await
            .unwrap();
        let before = listing(tmp.path());
        let log_before = fs::read_to_string(tmp.path().join("rename_log.txt")).unwrap();

        let pipeline = Pipeline::new(config(tmp.path()), MockCaptioner::new());
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.renamed_count, 0);
        assert_eq!(summary.captioned_count, 0);
        assert_eq!(summary.skipped_count, 2);
        assert!(pipeline.captioner().calls().is_empty());
        assert_eq!(listing(tmp.path()), before);
        assert_eq!(fs::read_to_string(tmp.path().join("rename_log.txt")).unwrap(), log_before);
    }

    #[tokio::test]
    async fn one_bad_image_does_not_stop_the_rest() {
        let tmp = fixture(&["a.png", "b.png", "c.png"]);
        let mock = MockCaptioner::new()
            .reply("cat_0002.png", MockReply::Fail(CaptionError::CorruptImage("truncated".into())));
        let summary = Pipeline::new(config(tmp.path()), mock).run().await.unwrap();

        assert_eq!(summary.captioned_count, 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].image_ref, "b.png");
        assert_eq!(summary.failed[0].stage, Stage::Caption);
        assert!(tmp.path().join("cat_0001.txt").exists());
        assert!(!tmp.path().join("cat_0002.txt").exists());
        assert!(tmp.path().join("cat_0003.txt").exists());
        assert_eq!(summary.items[1].state, ItemState::Failed(Stage::Caption));
    }

    #[tokio::test]
    async fn dry_run_leaves_directory_untouched() {
        let tmp = fixture(&["a.png", "b.JPG"]);
        let before = listing(tmp.path());
        let mut cfg = config(tmp.path());
        cfg.dry_run = true;

        let summary = Pipeline::new(cfg, MockCaptioner::new()).run().await.unwrap();

        assert_eq!(listing(tmp.path()), before);
        assert!(summary.dry_run);
        assert!(summary.rename_log.is_none());
        assert_eq!(summary.renamed_count, 2);
        assert_eq!(summary.captioned_count, 2);
        assert_eq!(summary.items[0].target_name, "cat_0001.png");
        assert_eq!(
            summary.items[0].caption_preview.as_deref(),
            Some("mystyle, caption for a.png")
        );
    }

    #[tokio::test]
    async fn copies_into_separate_output_folder() {
        let tmp = fixture(&["a.png", "b.png"]);
        let out = TempDir::new().unwrap();
        let mut cfg = config(tmp.path());
        cfg.output = Some(out.path().join("dataset"));

        let summary = Pipeline::new(cfg, MockCaptioner::new()).run().await.unwrap();

        assert_eq!(summary.captioned_count, 2);
        assert_eq!(listing(tmp.path()), vec!["a.png", "b.png"]);
        assert_eq!(
            listing(&out.path().join("dataset")),
            vec!["cat_0001.png", "cat_0001.txt", "cat_0002.png", "cat_0002.txt", "rename_log.txt"]
        );
    }

    #[tokio::test]
    async fn unavailable_model_fails_before_any_change() {
        let tmp = fixture(&["a.png"]);
        let mock = MockCaptioner::new().unavailable("connection refused");
        let err = Pipeline::new(config(tmp.path()), mock).run().await.unwrap_err();

        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
        assert_eq!(listing(tmp.path()), vec!["a.png"]);
    }

    #[tokio::test]
    async fn model_lost_mid_run_keeps_finished_work_and_log() {
        let tmp = fixture(&["a.png", "b.png", "c.png", "d.png"]);
        let mock = MockCaptioner::new()
            .reply("cat_0001.png", MockReply::Fail(CaptionError::CorruptImage("truncated".into())))
            .reply(
                "cat_0003.png",
                MockReply::Fail(CaptionError::ModelUnavailable("server went away".into())),
            );
        let pipeline = Pipeline::new(config(tmp.path()), mock);
        let err = pipeline.run().await.unwrap_err();

        let (reason, summary) = match err {
            PipelineError::Aborted { reason, summary } => (reason, summary),
            other => panic!("expected an aborted run, got {other:?}"),
        };
        assert_eq!(reason, "server went away");
        assert!(tmp.path().join("cat_0002.txt").exists());
        assert!(!tmp.path().join("cat_0004.txt").exists());
        assert!(!pipeline.captioner().calls().contains(&"cat_0004.png".to_string()));
        let log = fs::read_to_string(tmp.path().join("rename_log.txt")).unwrap();
        assert_eq!(log.lines().count(), 4);

        // The earlier per-item failure survives the abort.
        let failed: Vec<&str> = summary.failed.iter().map(|f| f.image_ref.as_str()).collect();
        assert_eq!(failed, vec!["a.png", "c.png"]);
        assert_eq!(summary.captioned_count, 1);
        assert_eq!(summary.unprocessed_count, 1);
        assert_eq!(summary.items.len(), 4);
        assert_eq!(summary.rename_log, Some(tmp.path().canonicalize().unwrap().join("rename_log.txt")));
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_captioning() {
        let tmp = fixture(&["a.png", "b.png"]);
        let pipeline = Pipeline::new(config(tmp.path()), MockCaptioner::new());
        pipeline.cancel_flag().store(true, Ordering::SeqCst);

        let summary = pipeline.run().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.unprocessed_count, 2);
        assert_eq!(summary.captioned_count, 0);
        assert!(pipeline.captioner().calls().is_empty());
        assert!(summary.rename_log.is_some());
    }

    #[tokio::test]
    async fn concurrent_results_keep_input_order() {
        let names: Vec<String> = (0..8).map(|i| format!("img{}.png", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let tmp = fixture(&refs);
        let mut cfg = config(tmp.path());
        cfg.concurrency = 4;
        cfg.rename = false;

        let summary = Pipeline::new(cfg, MockCaptioner::new()).run().await.unwrap();

        assert_eq!(summary.captioned_count, 8);
        let order: Vec<&str> = summary.items.iter().map(|i| i.image_ref.as_str()).collect();
        assert_eq!(order, refs);
        for name in &names {
            let caption = tmp.path().join(name).with_extension("txt");
            assert_eq!(
                fs::read_to_string(caption).unwrap(),
                format!("mystyle, caption for {}", name)
            );
        }
        assert!(summary.rename_log.is_none());
    }

    #[tokio::test]
    async fn existing_caption_is_replaced_only_with_overwrite() {
        let tmp = fixture(&["cat_0001.png"]);
        fs::write(tmp.path().join("cat_0001.txt"), "hand written").unwrap();

        let summary = Pipeline::new(config(tmp.path()), MockCaptioner::new()).run().await.unwrap();
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(fs::read_to_string(tmp.path().join("cat_0001.txt")).unwrap(), "hand written");

        let mut cfg = config(tmp.path());
        cfg.overwrite = true;
        let summary = Pipeline::new(cfg, MockCaptioner::new()).run().await.unwrap();
        assert_eq!(summary.captioned_count, 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("cat_0001.txt")).unwrap(),
            "mystyle, caption for cat_0001.png"
        );
    }

    #[tokio::test]
    async fn empty_folder_yields_empty_summary() {
        let tmp = TempDir::new().unwrap();
        let mock = MockCaptioner::new().unavailable("not needed");
        let summary = Pipeline::new(config(tmp.path()), mock).run().await.unwrap();
        assert_eq!(summary.total_discovered, 0);
        assert!(summary.items.is_empty());
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = Pipeline::new(config(&tmp.path().join("nope")), MockCaptioner::new())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound(_)));
    }

    fn tree(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = walkdir::WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn recursive_second_run_changes_nothing() {
        let tmp = fixture(&["a.png"]);
        fs::create_dir(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("b").join("x.png"), b"x").unwrap();
        let mut cfg = config(tmp.path());
        cfg.recursive = true;

        let first = Pipeline::new(cfg.clone(), MockCaptioner::new()).run().await.unwrap();
        assert_eq!(first.renamed_count, 2);
        assert_eq!(first.captioned_count, 2);
        let after_first = tree(tmp.path());
        assert_eq!(
            after_first,
            vec!["cat_0001.png", "cat_0001.txt", "cat_0002.png", "cat_0002.txt", "rename_log.txt"]
        );

        let pipeline = Pipeline::new(cfg, MockCaptioner::new());
        let second = pipeline.run().await.unwrap();
        assert_eq!(second.renamed_count, 0);
        assert_eq!(second.captioned_count, 0);
        assert_eq!(second.skipped_count, 2);
        assert!(pipeline.captioner().calls().is_empty());
        assert_eq!(tree(tmp.path()), after_first);
    }

    #[tokio::test]
    async fn copy_without_renaming_is_not_logged_as_rename() {
        let tmp = fixture(&["a.png"]);
        let out = TempDir::new().unwrap();
        let mut cfg = config(tmp.path());
        cfg.rename = false;
        cfg.output = Some(out.path().to_path_buf());

        let summary = Pipeline::new(cfg, MockCaptioner::new()).run().await.unwrap();

        assert_eq!(summary.renamed_count, 0);
        assert_eq!(summary.captioned_count, 1);
        assert!(summary.rename_log.is_none());
        assert!(!summary.items[0].renamed);
        assert_eq!(listing(out.path()), vec!["a.png", "a.txt"]);
        assert_eq!(listing(tmp.path()), vec!["a.png"]);
    }

    #[tokio::test]
    async fn dry_run_reports_what_a_real_run_does() {
        let tmp = fixture(&["a.png", "b.JPG"]);
        fs::write(tmp.path().join("cat_0002.txt"), "kept").unwrap();
        let scripted = || {
            MockCaptioner::new()
                .reply("a.png", MockReply::Text("a fox".into()))
                .reply("cat_0001.png", MockReply::Text("a fox".into()))
        };

        let mut cfg = config(tmp.path());
        cfg.dry_run = true;
        let dry = Pipeline::new(cfg, scripted()).run().await.unwrap();
        let real = Pipeline::new(config(tmp.path()), scripted()).run().await.unwrap();

        let view = |s: &RunSummary| -> Vec<(String, String, PathBuf, bool, ItemState, Option<String>)> {
            s.items
                .iter()
                .map(|i| {
                    (
                        i.image_ref.clone(),
                        i.target_name.clone(),
                        i.caption_path.clone(),
                        i.renamed,
                        i.state,
                        i.caption_preview.clone(),
                    )
                })
                .collect()
        };
        assert_eq!(view(&dry), view(&real));
        assert_eq!(
            (dry.renamed_count, dry.captioned_count, dry.skipped_count, dry.failed_count()),
            (real.renamed_count, real.captioned_count, real.skipped_count, real.failed_count())
        );
        assert_eq!(real.skipped_count, 1);
        assert_eq!(fs::read_to_string(tmp.path().join("cat_0002.txt")).unwrap(), "kept");
    }

    #[tokio::test]
    async fn timed_out_caption_fails_only_that_image() {
        let tmp = fixture(&["a.png", "b.png", "c.png"]);
        let mock = MockCaptioner::new().reply("cat_0002.png", MockReply::Hang);
        let mut cfg = config(tmp.path());
        cfg.timeout = std::time::Duration::from_millis(50);
        cfg.retries = 1;

        let pipeline = Pipeline::new(cfg, mock);
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.captioned_count, 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].image_ref, "b.png");
        assert!(summary.failed[0].reason.contains("timed out"));
        let attempts = pipeline.captioner().calls().iter().filter(|c| *c == "cat_0002.png").count();
        assert_eq!(attempts, 2);
        assert!(!tmp.path().join("cat_0002.txt").exists());
        assert!(tmp.path().join("cat_0003.txt").exists());
    }
}
