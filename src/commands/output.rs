use crate::error::PipelineError;
use crate::models::naming_types::{RenameAction, RenamePlan};
use crate::models::summary_types::{ItemState, RunSummary};
use serde::Serialize;
use std::fmt::Write;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

pub fn print_one<T: Serialize>(json: bool, data: T, render: impl Fn(&T) -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&JsonOut { ok: true, data })?);
    } else {
        println!("{}", render(&data));
    }
    Ok(())
}

fn partial_summary(err: &anyhow::Error) -> Option<&RunSummary> {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Aborted { summary, .. }) => Some(summary.as_ref()),
        _ => None,
    }
}

fn error_data(err: &anyhow::Error) -> serde_json::Value {
    match partial_summary(err) {
        Some(summary) => serde_json::json!({ "error": format!("{:#}", err), "summary": summary }),
        None => serde_json::json!(format!("{:#}", err)),
    }
}

/// Report a fatal error. A run aborted mid-way still shows what it got done.
pub fn print_error(json: bool, err: &anyhow::Error) {
    let partial = partial_summary(err);

    if json {
        let data = error_data(err);
        match serde_json::to_string_pretty(&JsonOut { ok: false, data }) {
            Ok(s) => println!("{}", s),
            Err(_) => eprintln!("error: {:#}", err),
        }
    } else {
        if let Some(summary) = partial {
            println!("{}", render_summary(summary));
        }
        eprintln!("error: {:#}", err);
    }
}

fn state_label(state: ItemState) -> String {
    match state {
        ItemState::Done => "done".to_string(),
        ItemState::Failed(stage) => format!("failed ({})", stage),
        ItemState::WriteSkipped => "skipped".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

/// Human-readable end-of-run report.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    if summary.dry_run {
        let _ = writeln!(out, "Dry run: no files were changed.");
    }
    for item in &summary.items {
        let arrow = if item.renamed {
            format!("{} -> {}", item.image_ref, item.target_name)
        } else {
            item.image_ref.clone()
        };
        let _ = writeln!(out, "  {:<40} {}", arrow, state_label(item.state));
        if let Some(preview) = &item.caption_preview {
            let _ = writeln!(out, "      {}", preview);
        }
    }

    let _ = writeln!(out, "Images found:      {}", summary.total_discovered);
    let _ = writeln!(out, "Renamed:           {}", summary.renamed_count);
    let _ = writeln!(out, "Captioned:         {}", summary.captioned_count);
    let _ = writeln!(out, "Skipped (exists):  {}", summary.skipped_count);
    let _ = writeln!(out, "Failed:            {}", summary.failed_count());
    if summary.cancelled {
        let _ = writeln!(out, "Cancelled, {} image(s) not processed", summary.unprocessed_count);
    } else if summary.unprocessed_count > 0 {
        let _ = writeln!(out, "Not processed:     {}", summary.unprocessed_count);
    }
    for f in &summary.failed {
        let _ = writeln!(out, "  ! {} [{}]: {}", f.image_ref, f.stage, f.reason);
    }
    if let Some(log) = &summary.rename_log {
        let _ = writeln!(out, "Rename log:        {}", log.display());
    }
    out.trim_end().to_string()
}

pub fn render_plan(plan: &RenamePlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Output: {} ({})",
        plan.output_dir.display(),
        if plan.in_place { "in place" } else { "copy" }
    );
    for item in &plan.items {
        let action = match (&item.conflict, item.action) {
            (Some(conflict), _) => format!("conflict: {}", conflict),
            (None, RenameAction::Keep) => "keep".to_string(),
            (None, RenameAction::Move) if item.staged => "move (staged)".to_string(),
            (None, RenameAction::Move) => "move".to_string(),
            (None, RenameAction::Copy) => "copy".to_string(),
        };
        let _ = writeln!(out, "  {:<32} {}", item.target_filename, action);
    }
    let _ = write!(out, "{} image(s)", plan.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::summary_types::{FailedItem, ItemReport, Stage};
    use std::path::PathBuf;

    #[test]
    fn summary_lists_counts_and_failures() {
        let summary = RunSummary {
            total_discovered: 2,
            renamed_count: 2,
            captioned_count: 1,
            failed: vec![FailedItem {
                image_ref: "b.png".into(),
                stage: Stage::Caption,
                reason: "corrupt image: truncated".into(),
            }],
            items: vec![ItemReport {
                image_ref: "a.png".into(),
                target_name: "cat_0001.png".into(),
                caption_path: PathBuf::from("cat_0001.txt"),
                renamed: true,
                state: ItemState::Done,
                instruction: Some("style_tags"),
                caption_preview: Some("mystyle, a fox".into()),
            }],
            ..RunSummary::default()
        };

        let text = render_summary(&summary);
        assert!(text.contains("a.png -> cat_0001.png"));
        assert!(text.contains("mystyle, a fox"));
        assert!(text.contains("Failed:            1"));
        assert!(text.contains("b.png [caption]: corrupt image: truncated"));
        assert!(!text.contains("Dry run"));
    }

    #[test]
    fn json_envelope_shape() {
        let json = serde_json::to_value(JsonOut { ok: true, data: vec![1, 2] }).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["data"][1], 2);
    }

    #[test]
    fn aborted_run_error_carries_its_summary() {
        let summary = RunSummary {
            total_discovered: 3,
            unprocessed_count: 1,
            failed: vec![FailedItem {
                image_ref: "a.png".into(),
                stage: Stage::Caption,
                reason: "corrupt image: truncated".into(),
            }],
            ..RunSummary::default()
        };
        let err = anyhow::Error::from(PipelineError::Aborted {
            reason: "gone".into(),
            summary: Box::new(summary),
        });

        let data = error_data(&err);
        assert!(data["error"].as_str().unwrap().contains("gone"));
        assert_eq!(data["summary"]["failed"][0]["image_ref"], "a.png");
        assert!(render_summary(partial_summary(&err).unwrap()).contains("Not processed:     1"));

        let plain = anyhow::anyhow!("boom");
        assert_eq!(error_data(&plain), serde_json::json!("boom"));
    }
}
