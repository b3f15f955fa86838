use crate::error::NamingError;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameAction {
    /// Image already sits at its target; nothing to do.
    Keep,
    /// Rename in place.
    Move,
    /// Copy into a separate output directory, leaving the source alone.
    Copy,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanItem {
    pub target_filename: String,
    pub target_path: PathBuf,
    pub caption_path: PathBuf,
    pub action: RenameAction,
    /// Set when `overwrite` let the rename replace an unrelated file.
    pub collision_resolved: bool,
    /// Target is currently held by another image of this plan that is
    /// moving away, so the move goes through a staging name.
    pub staged: bool,
    #[serde(serialize_with = "serialize_conflict")]
    pub conflict: Option<NamingError>,
}

fn serialize_conflict<S>(conflict: &Option<NamingError>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match conflict {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

/// One item per discovered image, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct RenamePlan {
    pub output_dir: PathBuf,
    pub in_place: bool,
    pub items: Vec<PlanItem>,
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }
}
