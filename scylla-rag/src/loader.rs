//! Loading source documents from a directory tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::document::{Document, DocumentFormat};
use crate::error::{RagError, Result};

/// Reads text files under a root directory into [`Document`]s.
///
/// Files are visited in sorted path order, so repeated loads of an
/// unchanged tree produce identical document sequences.
///
/// # Example
///
/// ```rust,ignore
/// use scylla_rag::DirectoryLoader;
///
/// let documents = DirectoryLoader::new("../scylladb/docs")
///     .extensions(["md"])
///     .files_limit(Some(10))
///     .load()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
    recursive: bool,
    extensions: Vec<String>,
    files_limit: Option<usize>,
    exclude_hidden: bool,
    exclude_empty: bool,
}

impl DirectoryLoader {
    /// Create a loader for `.md` and `.rst` files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            extensions: vec!["md".to_string(), "rst".to_string()],
            files_limit: None,
            exclude_hidden: true,
            exclude_empty: true,
        }
    }

    /// Descend into subdirectories (default `true`).
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Only load files with one of these extensions (without the dot).
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Load at most `limit` files.
    pub fn files_limit(mut self, limit: Option<usize>) -> Self {
        self.files_limit = limit;
        self
    }

    /// Skip files and directories whose name starts with `.` (default `true`).
    pub fn exclude_hidden(mut self, exclude: bool) -> Self {
        self.exclude_hidden = exclude;
        self
    }

    /// Skip files that contain only whitespace (default `true`).
    pub fn exclude_empty(mut self, exclude: bool) -> Self {
        self.exclude_empty = exclude;
        self
    }

    /// List the files that [`load`](Self::load) would read.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentLoadError`] if the root is not a directory.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(RagError::DocumentLoadError {
                path: self.root.display().to_string(),
                message: "not a directory".to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let exclude_hidden = self.exclude_hidden;
        let mut files = WalkDir::new(&self.root)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !(exclude_hidden && is_hidden(entry)))
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.has_wanted_extension(entry.path()))
            .map(DirEntry::into_path)
            .collect::<Vec<_>>();

        files.sort();
        if let Some(limit) = self.files_limit {
            files.truncate(limit);
        }
        Ok(files)
    }

    /// Read every discovered file into a [`Document`].
    ///
    /// The document ID is the path relative to the root; metadata carries
    /// `file_path` and `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentLoadError`] if a file cannot be read as UTF-8.
    pub async fn load(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for path in self.discover()? {
            let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                RagError::DocumentLoadError { path: path.display().to_string(), message: e.to_string() }
            })?;

            if self.exclude_empty && text.trim().is_empty() {
                debug!(path = %path.display(), "skipping empty document");
                continue;
            }

            documents.push(self.document(&path, text));
        }

        info!(root = %self.root.display(), document_count = documents.len(), "loaded documents");
        Ok(documents)
    }

    fn document(&self, path: &Path, text: String) -> Document {
        let id = path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy().replace('\\', "/");
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let file_name =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        Document {
            id,
            text,
            format: DocumentFormat::from_extension(extension),
            metadata: HashMap::from([
                ("file_path".to_string(), path.display().to_string()),
                ("file_name".to_string(), file_name),
            ]),
            source_uri: Some(path.display().to_string()),
        }
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fixture() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("guide/nested")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();

        fs::write(root.join("a.md"), "# A\nalpha").unwrap();
        fs::write(root.join("guide/b.rst"), "Beta\n====\nbody").unwrap();
        fs::write(root.join("guide/nested/c.md"), "gamma").unwrap();
        fs::write(root.join("guide/empty.md"), "  \n").unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();
        fs::write(root.join(".hidden.md"), "hidden").unwrap();
        fs::write(root.join(".git/d.md"), "hidden too").unwrap();
        temp
    }

    #[tokio::test]
    async fn loads_matching_files_in_sorted_order() {
        let temp = fixture();
        let documents = DirectoryLoader::new(temp.path()).load().await.unwrap();

        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "guide/b.rst", "guide/nested/c.md"]);
        assert_eq!(documents[0].format, DocumentFormat::Markdown);
        assert_eq!(documents[1].format, DocumentFormat::ReStructuredText);
        assert_eq!(documents[2].metadata["file_name"], "c.md");
    }

    #[tokio::test]
    async fn honours_extension_filter_limit_and_recursion() {
        let temp = fixture();
        let md_only = DirectoryLoader::new(temp.path()).extensions(["md"]).load().await.unwrap();
        assert_eq!(md_only.len(), 2);

        let limited = DirectoryLoader::new(temp.path()).files_limit(Some(1)).discover().unwrap();
        assert_eq!(limited.len(), 1);

        let flat = DirectoryLoader::new(temp.path()).recursive(false).load().await.unwrap();
        assert_eq!(flat.len(), 1);
    }

    #[tokio::test]
    async fn keeps_empty_and_hidden_files_when_asked() {
        let temp = fixture();
        let documents = DirectoryLoader::new(temp.path())
            .exclude_empty(false)
            .exclude_hidden(false)
            .load()
            .await
            .unwrap();
        assert_eq!(documents.len(), 6);
    }

    #[test]
    fn missing_root_is_a_load_error() {
        let err = DirectoryLoader::new("/definitely/not/here").discover().unwrap_err();
        assert!(matches!(err, RagError::DocumentLoadError { .. }));
    }
}
