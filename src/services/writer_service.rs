use crate::config::PREVIEW_CHARS;
use crate::error::WriteError;
use crate::models::naming_types::{PlanItem, RenameAction};
use crate::models::summary_types::RenameLogEntry;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    WouldRename,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    WouldWrite(PathBuf),
}

/// Shorten caption text for dry-run and summary output.
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

pub fn ensure_dir(path: &Path, dry_run: bool) -> Result<(), WriteError> {
    if dry_run || path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| WriteError::new("create directory", path, e))
}

/// Copy through a temp file in the destination folder so a partial copy is
/// never visible under the target name.
fn copy_atomic(source: &Path, target: &Path, replace: bool) -> Result<(), WriteError> {
    let dir = target.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WriteError::new("create temp file in", dir, e))?;
    let mut src = fs::File::open(source).map_err(|e| WriteError::new("open", source, e))?;
    std::io::copy(&mut src, tmp.as_file_mut()).map_err(|e| WriteError::new("copy", source, e))?;
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| WriteError::new("flush", target, e))?;

    let persisted = if replace {
        tmp.persist(target)
    } else {
        tmp.persist_noclobber(target)
    };
    persisted.map_err(|e| WriteError::new("copy to", target, e.error))?;
    Ok(())
}

fn move_file(source: &Path, target: &Path, replace: bool) -> Result<(), WriteError> {
    if replace && target.exists() {
        // rename() does not replace on every platform
        fs::remove_file(target).map_err(|e| WriteError::new("replace", target, e))?;
    }
    fs::rename(source, target).map_err(|e| WriteError::new("rename to", target, e))
}

/// Execute the rename or copy for one plan item that does not need staging.
pub fn apply_rename(source: &Path, item: &PlanItem, dry_run: bool) -> Result<RenameOutcome, WriteError> {
    if item.action == RenameAction::Keep {
        return Ok(RenameOutcome::Unchanged);
    }
    if dry_run {
        return Ok(RenameOutcome::WouldRename);
    }

    match item.action {
        RenameAction::Move => move_file(source, &item.target_path, item.collision_resolved)?,
        RenameAction::Copy => copy_atomic(source, &item.target_path, item.collision_resolved)?,
        RenameAction::Keep => unreachable!("handled above"),
    }

    tracing::debug!(
        from = %source.display(),
        to = %item.target_path.display(),
        action = ?item.action,
        "Renamed image"
    );
    Ok(RenameOutcome::Renamed)
}

pub fn staging_path(source: &Path, discovery_order: usize) -> PathBuf {
    let dir = source.parent().unwrap_or(Path::new("."));
    let name = source.file_name().unwrap_or_default().to_string_lossy();
    dir.join(format!(".{}.{}.lora-staging", name, discovery_order))
}

/// First half of a two-step move: park the source under a hidden name so
/// the sibling holding our target can leave.
pub fn stage(source: &Path, discovery_order: usize) -> Result<PathBuf, WriteError> {
    let staged = staging_path(source, discovery_order);
    fs::rename(source, &staged).map_err(|e| WriteError::new("stage", source, e))?;
    Ok(staged)
}

/// Second half of a staged move. Returns `Ok(false)` and restores the
/// original name if the target is still occupied.
pub fn finish_staged(staged: &Path, original: &Path, item: &PlanItem) -> Result<bool, WriteError> {
    if item.target_path.exists() {
        fs::rename(staged, original).map_err(|e| WriteError::new("restore", original, e))?;
        return Ok(false);
    }
    fs::rename(staged, &item.target_path).map_err(|e| WriteError::new("rename to", &item.target_path, e))?;
    Ok(true)
}

pub fn caption_exists(item: &PlanItem) -> bool {
    item.caption_path.exists()
}

/// Write caption text atomically: either the whole text lands under
/// `path` or nothing does.
pub fn write_caption(path: &Path, text: &str, overwrite: bool, dry_run: bool) -> Result<WriteOutcome, WriteError> {
    if dry_run {
        return Ok(WriteOutcome::WouldWrite(path.to_path_buf()));
    }

    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WriteError::new("create temp file in", dir, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| WriteError::new("write caption", path, e))?;
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| WriteError::new("flush caption", path, e))?;

    let persisted = if overwrite {
        tmp.persist(path)
    } else {
        tmp.persist_noclobber(path)
    };
    persisted.map_err(|e| WriteError::new("write caption", path, e.error))?;

    Ok(WriteOutcome::Written(path.to_path_buf()))
}

/// Ordered record of renames performed in one run.
#[derive(Debug, Clone, Default)]
pub struct RenameLog {
    entries: Vec<RenameLogEntry>,
}

impl RenameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, original_name: impl Into<String>, new_name: impl Into<String>) {
        self.entries.push(RenameLogEntry {
            original_name: original_name.into(),
            new_name: new_name.into(),
        });
    }

    pub fn entries(&self) -> &[RenameLogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} -> {}\n", e.original_name, e.new_name))
            .collect()
    }

    /// Append this run's lines to `path`, creating it if needed.
    pub fn append_to(&self, path: &Path) -> Result<(), WriteError> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| WriteError::new("open rename log", path, e))?;
        file.write_all(self.render().as_bytes())
            .map_err(|e| WriteError::new("append rename log", path, e))
    }
}
