use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Rename,
    Caption,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Rename => "rename",
            Stage::Caption => "caption",
            Stage::Write => "write",
        };
        write!(f, "{}", s)
    }
}

/// Per-image progression through the pipeline.
///
/// `Discovered -> Renamed|RenameSkipped -> Captioned -> Written|WriteSkipped -> Done`,
/// with `Failed(stage)` reachable from every non-terminal state. A caption
/// skipped by policy goes straight from the rename states to `WriteSkipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Discovered,
    Renamed,
    RenameSkipped,
    Captioned,
    Written,
    WriteSkipped,
    Done,
    Failed(Stage),
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Done | ItemState::Failed(_))
    }

    pub fn can_advance_to(self, next: ItemState) -> bool {
        use ItemState::*;
        match (self, next) {
            (s, Failed(_)) => !s.is_terminal(),
            (Discovered, Renamed | RenameSkipped) => true,
            (Renamed | RenameSkipped, Captioned | WriteSkipped) => true,
            (Captioned, Written | WriteSkipped) => true,
            (Written | WriteSkipped, Done) => true,
            _ => false,
        }
    }

    /// Move to `next`, refusing illegal transitions.
    pub fn advance(&mut self, next: ItemState) -> bool {
        if self.can_advance_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub image_ref: String,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub image_ref: String,
    pub target_name: String,
    pub caption_path: PathBuf,
    pub renamed: bool,
    pub state: ItemState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameLogEntry {
    pub original_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total_discovered: usize,
    pub renamed_count: usize,
    pub captioned_count: usize,
    pub skipped_count: usize,
    pub failed: Vec<FailedItem>,
    /// Items left uncaptioned because the run was cancelled or aborted.
    pub unprocessed_count: usize,
    pub cancelled: bool,
    pub dry_run: bool,
    pub rename_log: Option<PathBuf>,
    pub items: Vec<ItemReport>,
}

impl RunSummary {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
