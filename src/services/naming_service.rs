use crate::error::{NamingError, PipelineError};
use crate::models::image_types::ImageEntry;
use crate::models::naming_types::{PlanItem, RenameAction, RenamePlan};
use crate::services::fs_service;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const MIN_INDEX_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct NamingOptions<'a> {
    pub dataset_name: &'a str,
    pub rename_enabled: bool,
    pub overwrite: bool,
    /// `None` means caption and rename next to the originals.
    pub output_dir: Option<&'a Path>,
}

pub fn validate_dataset_name(name: &str) -> Result<(), PipelineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "dataset name must not be empty".to_string(),
        ));
    }
    if trimmed != name {
        return Err(PipelineError::InvalidConfig(format!(
            "dataset name '{}' has leading or trailing whitespace",
            name
        )));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(PipelineError::InvalidConfig(format!(
            "dataset name '{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

/// Zero-padding width for a run of `count` images: at least 4, wider when
/// the largest index needs it.
pub fn index_width(count: usize) -> usize {
    count.to_string().len().max(MIN_INDEX_WIDTH)
}

pub fn target_filename(dataset_name: &str, order: usize, width: usize, extension: &str) -> String {
    if extension.is_empty() {
        format!("{}_{:0width$}", dataset_name, order, width = width)
    } else {
        format!("{}_{:0width$}.{}", dataset_name, order, extension, width = width)
    }
}

/// True when `output_dir` is absent or resolves to the input folder itself.
pub fn is_in_place(input_root: &Path, output_dir: Option<&Path>) -> bool {
    match output_dir {
        None => true,
        Some(out) => out == input_root || fs_service::same_file(out, input_root),
    }
}

fn dedupe_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Build the rename plan for `entries`, which must be in discovery order.
///
/// Reads the filesystem to detect collisions but never writes; the result
/// depends only on the entries, the options and what is already on disk.
pub fn plan_renames(entries: &[ImageEntry], input_root: &Path, opts: &NamingOptions<'_>) -> RenamePlan {
    let in_place = is_in_place(input_root, opts.output_dir);
    let output_dir = match opts.output_dir {
        Some(out) if !in_place => out.to_path_buf(),
        _ => input_root.to_path_buf(),
    };
    let width = index_width(entries.len());

    // Pass 1: names and actions.
    let mut drafts: Vec<(String, PathBuf, RenameAction)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = if opts.rename_enabled {
            target_filename(opts.dataset_name, entry.discovery_order, width, &entry.extension())
        } else {
            entry.file_name()
        };

        let (target_path, action) = if in_place {
            // Renamed images from subfolders land in the input root, so a
            // later recursive scan sees them in the order they were named.
            let dir = if opts.rename_enabled {
                input_root
            } else {
                entry.original_path.parent().unwrap_or(input_root)
            };
            let target = dir.join(&name);
            let keep = target == entry.original_path
                || fs_service::same_file(&target, &entry.original_path);
            (target, if keep { RenameAction::Keep } else { RenameAction::Move })
        } else {
            let target = output_dir.join(&name);
            let already_copied = target.is_file()
                && fs_service::same_contents(&entry.original_path, &target).unwrap_or(false);
            (target, if already_copied { RenameAction::Keep } else { RenameAction::Copy })
        };

        drafts.push((name, target_path, action));
    }

    let vacating: HashSet<&Path> = entries
        .iter()
        .zip(drafts.iter())
        .filter(|(_, (_, _, action))| *action == RenameAction::Move)
        .map(|(entry, _)| entry.original_path.as_path())
        .collect();

    // Pass 2: collisions.
    let mut claimed_targets: HashMap<String, String> = HashMap::new();
    let mut claimed_captions: HashMap<String, String> = HashMap::new();
    let mut items = Vec::with_capacity(entries.len());

    for (entry, (target_filename, target_path, action)) in entries.iter().zip(drafts.into_iter()) {
        let caption_path = target_path.with_extension("txt");
        let image_ref = entry.image_ref();
        let mut conflict = None;
        let mut collision_resolved = false;
        let mut staged = false;

        if let Some(owner) = claimed_targets.get(&dedupe_key(&target_path)) {
            conflict = Some(NamingError::DuplicateTarget(target_path.clone(), owner.clone()));
        } else if let Some(owner) = claimed_captions.get(&dedupe_key(&caption_path)) {
            conflict = Some(NamingError::DuplicateTarget(caption_path.clone(), owner.clone()));
        } else if action != RenameAction::Keep && target_path.exists() {
            if action == RenameAction::Move && vacating.contains(target_path.as_path()) {
                staged = true;
            } else if opts.overwrite {
                collision_resolved = true;
                tracing::warn!(
                    image = %image_ref,
                    target = %target_path.display(),
                    "Target exists; overwrite enabled, replacing it"
                );
            } else {
                conflict = Some(NamingError::Conflict(target_path.clone()));
            }
        }

        if conflict.is_none() {
            claimed_targets.insert(dedupe_key(&target_path), image_ref.clone());
            claimed_captions.insert(dedupe_key(&caption_path), image_ref);
        }

        items.push(PlanItem {
            target_filename,
            target_path,
            caption_path,
            action,
            collision_resolved,
            staged,
            conflict,
        });
    }

    RenamePlan {
        output_dir,
        in_place,
        items,
    }
}
