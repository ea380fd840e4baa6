use crate::config::BatchConfig;
use crate::error::{Result, UnlockError};
use crate::matcher::Scope;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Document,
    Archive,
    Other,
}

/// One input file and the scope it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputItem {
    pub path: PathBuf,
    pub scope: Scope,
    pub kind: ItemKind,
}

impl InputItem {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Walks the input root (top level only) and each configured platform folder (recursively).
pub struct InputScanner {
    document_extensions: Vec<String>,
    archive_extensions: Vec<String>,
    platforms: Vec<String>,
}

impl InputScanner {
    pub fn new(config: &BatchConfig) -> Self {
        let lower = |exts: &[String]| -> Vec<String> {
            exts.iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect()
        };

        Self {
            document_extensions: lower(&config.document_extensions),
            archive_extensions: lower(&config.archive_extensions),
            platforms: config.platforms.clone(),
        }
    }

    pub fn classify(&self, path: &Path) -> ItemKind {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if self.document_extensions.contains(&extension) {
            ItemKind::Document
        } else if self.archive_extensions.contains(&extension) {
            ItemKind::Archive
        } else {
            ItemKind::Other
        }
    }

    /// Files found under `root`. Root files come first, then each platform folder in
    /// configured order; names are sorted within each group.
    pub fn scan(&self, root: &Path) -> Result<Vec<InputItem>> {
        if !root.is_dir() {
            return Err(UnlockError::NotFound {
                what: "Input directory".to_string(),
                path: root.display().to_string(),
            });
        }

        let mut items = self.walk(root, 1, Scope::All);

        for platform in &self.platforms {
            let folder = root.join(platform);
            if !folder.is_dir() {
                debug!(platform = %platform, "no input folder for platform");
                continue;
            }
            items.extend(self.walk(&folder, usize::MAX, Scope::Platform(platform.clone())));
        }

        Ok(items)
    }

    /// Classifies the files of an extracted archive. Members keep the archive's scope.
    pub fn scan_extracted(&self, members: &[PathBuf], scope: &Scope) -> Vec<InputItem> {
        let mut items: Vec<InputItem> = members
            .iter()
            .filter(|path| !is_hidden_path(path))
            .map(|path| InputItem {
                path: path.clone(),
                scope: scope.clone(),
                kind: self.classify(path),
            })
            .collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        items
    }

    fn walk(&self, dir: &Path, max_depth: usize, scope: Scope) -> Vec<InputItem> {
        let mut items: Vec<InputItem> = WalkDir::new(dir)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable input entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| InputItem {
                kind: self.classify(entry.path()),
                path: entry.into_path(),
                scope: scope.clone(),
            })
            .collect();

        items.sort_by(|a, b| a.path.cmp(&b.path));
        items
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_hidden_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
