use crate::error::PipelineError;
use crate::models::image_types::{ImageEntry, ImageFormat};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Sorted, restartable result of scanning an input folder.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub root: PathBuf,
    entries: Vec<ImageEntry>,
}

impl Discovery {
    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }
}

/// List supported images under `root`, ordered by case-normalized relative
/// path. `exclude` prunes a subtree (the output folder when it lives inside
/// the input folder).
pub fn discover_images(
    root: &Path,
    recursive: bool,
    exclude: Option<&Path>,
) -> Result<Discovery, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::InputNotFound(root.to_path_buf()));
    }
    let root = root
        .canonicalize()
        .map_err(|e| PipelineError::io(root, e))?;
    let exclude = exclude.and_then(|p| p.canonicalize().ok()).filter(|p| p != &root);

    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() > 0 && is_hidden(e) {
                return false;
            }
            match &exclude {
                Some(ex) => e.path() != ex.as_path(),
                None => true,
            }
        });

    let mut found: Vec<(PathBuf, PathBuf, ImageFormat)> = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry during discovery");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let format = match ImageFormat::from_path(path) {
            Some(f) => f,
            None => continue,
        };

        let relative = path.strip_prefix(&root).unwrap_or(path).to_path_buf();
        found.push((path.to_path_buf(), relative, format));
    }

    found.sort_by(|a, b| {
        let ka = a.1.to_string_lossy();
        let kb = b.1.to_string_lossy();
        ka.to_lowercase()
            .cmp(&kb.to_lowercase())
            .then_with(|| ka.cmp(&kb))
    });

    let entries = found
        .into_iter()
        .enumerate()
        .map(|(i, (original_path, relative_path, format))| ImageEntry {
            original_path,
            relative_path,
            format,
            discovery_order: i + 1,
        })
        .collect::<Vec<_>>();

    tracing::debug!(root = %root.display(), count = entries.len(), recursive, "Discovery complete");

    Ok(Discovery { root, entries })
}

/// Byte-for-byte comparison, used to recognise a previous run's copy.
pub fn same_contents(a: &Path, b: &Path) -> std::io::Result<bool> {
    use std::io::Read;

    let (ma, mb) = (std::fs::metadata(a)?, std::fs::metadata(b)?);
    if ma.len() != mb.len() {
        return Ok(false);
    }

    let mut fa = std::io::BufReader::new(std::fs::File::open(a)?);
    let mut fb = std::io::BufReader::new(std::fs::File::open(b)?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = fa.read(&mut buf_a)?;
        if n == 0 {
            return Ok(true);
        }
        fb.read_exact(&mut buf_b[..n])?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}

/// True when both paths resolve to the same file on disk.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
