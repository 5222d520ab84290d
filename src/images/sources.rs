//! Input directory resolution
//!
//! File names may carry a trailing annotation choosing the base directory:
//! `frame.png [output]`, `frame.png [temp]` or `frame.png [input]`. Names
//! without one resolve against the input directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::storage::StorageError;

use super::decode::has_image_extension;

/// Base directories image sources are resolved against
#[derive(Debug, Clone)]
pub struct ImageSources {
    input_dir: PathBuf,
    output_dir: PathBuf,
    temp_dir: PathBuf,
}

impl ImageSources {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Resolve a possibly annotated name to a path
    ///
    /// Returns `None` for names that would escape their base directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let (name, base) = self.split_annotation(name);
        join_relative(base, name)
    }

    /// Resolve a file name, failing validation if it is not an existing file
    pub fn file(&self, name: &str) -> Result<PathBuf, StorageError> {
        self.resolve(name)
            .filter(|p| p.is_file())
            .ok_or_else(|| StorageError::InvalidFile(name.to_string()))
    }

    /// Path of a folder directly under the input directory
    pub fn folder(&self, name: &str) -> Result<PathBuf, StorageError> {
        join_relative(&self.input_dir, name.trim())
            .filter(|p| p.is_dir())
            .ok_or_else(|| StorageError::InvalidFile(name.to_string()))
    }

    /// Recognized images directly inside `folder`, sorted by file name
    pub fn folder_images(&self, folder: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let mut images = Vec::new();
        for path in entry_paths(folder)? {
            if path.is_file() && has_image_extension(&path) {
                images.push(path);
            }
        }
        images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if images.is_empty() {
            return Err(StorageError::EmptyFolder(folder.to_path_buf()));
        }
        Ok(images)
    }

    /// Files directly in the input directory, sorted
    pub fn list_files(&self) -> Result<Vec<String>, StorageError> {
        self.list_input(|p| p.is_file())
    }

    /// Folders directly in the input directory, sorted
    pub fn list_folders(&self) -> Result<Vec<String>, StorageError> {
        self.list_input(|p| p.is_dir())
    }

    fn list_input(&self, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = entry_paths(&self.input_dir)?
            .into_iter()
            .filter(|p| keep(p.as_path()))
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    fn split_annotation<'a>(&'a self, name: &'a str) -> (&'a str, &'a Path) {
        let annotations: [(&str, &Path); 3] = [
            ("[output]", self.output_dir.as_path()),
            ("[input]", self.input_dir.as_path()),
            ("[temp]", self.temp_dir.as_path()),
        ];

        for (suffix, base) in annotations {
            if let Some(stripped) = name.strip_suffix(suffix) {
                return (stripped.trim_end(), base);
            }
        }
        (name, self.input_dir.as_path())
    }
}

/// Paths of the entries directly inside `dir`
fn entry_paths(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let io_err = |source| StorageError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    Ok(paths)
}

/// Join `name` under `base`, rejecting absolute paths and parent components
fn join_relative(base: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if name.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(base.join(relative))
}
