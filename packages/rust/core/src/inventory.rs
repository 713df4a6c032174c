//! Bundle inventory: the host build tool's list of emitted files.

use std::path::{Path, PathBuf};

use structurize_shared::{Result, StructurizeError};

/// Source of the files a build emitted, relative to the output directory.
pub trait BundleInventory {
    fn bundle_files(&self) -> Result<Vec<PathBuf>>;
}

/// Whether an inventory entry is an HTML document.
pub fn is_markup(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

/// Inventory supplied directly by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    files: Vec<PathBuf>,
}

impl StaticInventory {
    pub fn new(files: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl BundleInventory for StaticInventory {
    fn bundle_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.clone())
    }
}

/// Inventory built by scanning the output directory recursively.
#[derive(Debug, Clone)]
pub struct DirectoryInventory {
    root: PathBuf,
}

impl DirectoryInventory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BundleInventory for DirectoryInventory {
    /// Every regular file under the root, sorted, relative to the root.
    fn bundle_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|e| StructurizeError::io(&dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| StructurizeError::io(&dir, e))?;
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .map_err(|e| StructurizeError::io(&path, e))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        files.push(relative.to_path_buf());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
