use anyhow::{Context, Result};
#[cfg(test)]
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::{Arc, RwLock};

/// Trait for filesystem operations to enable testing with mocks
pub trait FileSystem: Send + Sync {
    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace the file contents with `contents`.
    ///
    /// Implementations must never leave a partially written file behind.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Walk directory recursively up to `max_depth` (0 = the root only)
    fn walk_dir(&self, path: &Path, max_depth: usize) -> Result<Vec<PathBuf>>;
}

/// Real filesystem implementation using std::fs
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {:?}", parent))?;

        temp_file
            .write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write temp file for {:?}", path))?;

        // Keep the mode of the file being replaced
        if let Ok(metadata) = std::fs::metadata(path) {
            temp_file
                .as_file()
                .set_permissions(metadata.permissions())
                .with_context(|| format!("Failed to copy permissions of {:?}", path))?;
        }

        temp_file
            .persist(path)
            .map_err(|err| err.error)
            .with_context(|| format!("Failed to replace file: {:?}", path))?;

        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn walk_dir(&self, path: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
        use walkdir::WalkDir;

        let mut paths = Vec::new();
        for entry in WalkDir::new(path).max_depth(max_depth).sort_by_file_name() {
            let entry = entry.context("Failed to walk directory")?;
            paths.push(entry.path().to_path_buf());
        }

        Ok(paths)
    }
}

/// Mock filesystem implementation for testing (in-memory)
#[cfg(test)]
pub struct MockFileSystem {
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
    writes: Arc<RwLock<Vec<PathBuf>>>,
    failing_writes: Arc<RwLock<usize>>,
}

#[cfg(test)]
impl MockFileSystem {
    /// Create new empty mock filesystem
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            writes: Arc::new(RwLock::new(Vec::new())),
            failing_writes: Arc::new(RwLock::new(0)),
        }
    }

    /// Make the next `count` calls to `write` fail without touching any file
    pub fn with_failing_writes(self, count: usize) -> Self {
        *self.failing_writes.write().unwrap() = count;
        self
    }

    /// Seed a file without recording it as a write
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files
            .write()
            .unwrap()
            .insert(path.into(), contents.to_string());
        self
    }

    /// Get captured file contents for testing assertions
    pub fn get_file_contents(&self, path: &Path) -> Option<String> {
        self.files.read().unwrap().get(path).cloned()
    }

    /// Check if file was written
    pub fn has_file(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    /// Paths passed to `write`, in call order
    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.writes.read().unwrap().clone()
    }
}

#[cfg(test)]
impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .with_context(|| format!("File not found in mock filesystem: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        {
            let mut failing = self.failing_writes.write().unwrap();
            if *failing > 0 {
                *failing -= 1;
                anyhow::bail!("Failed to replace file: {:?}: disk full", path);
            }
        }

        self.writes.write().unwrap().push(path.to_path_buf());
        self.files
            .write()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read().unwrap();
        files.contains_key(path) || files.keys().any(|file| file.starts_with(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    fn walk_dir(&self, path: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
        let files = self.files.read().unwrap();

        let mut entries = Vec::new();

        // Walk files - depth is calculated from the root
        for file_path in files.keys() {
            if file_path.starts_with(path) && file_path != path {
                let relative = match file_path.strip_prefix(path) {
                    Ok(rel) => rel,
                    Err(_) => continue,
                };
                let depth = relative.components().count();
                if depth <= max_depth {
                    entries.push(file_path.clone());
                }
            }
        }

        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_write_replaces_contents_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terraform.tfvars");
        let fs = RealFileSystem;

        fs.write(&path, "a = 1\n").unwrap();
        fs.write(&path, "a = 2\n").unwrap();

        assert_eq!(fs.read_to_string(&path).unwrap(), "a = 2\n");

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["terraform.tfvars".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_write_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terraform.tfvars");
        std::fs::write(&path, "a = 1\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        RealFileSystem.write(&path, "a = 2\n").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a = 2\n");
    }

    #[test]
    fn test_real_walk_dir_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        fs.write(&dir.path().join("main.tf"), "").unwrap();
        fs.write(&dir.path().join("modules/net/main.tf"), "").unwrap();

        let entries = fs.walk_dir(dir.path(), 1).unwrap();

        assert!(entries.contains(&dir.path().join("main.tf")));
        assert!(!entries.contains(&dir.path().join("modules/net/main.tf")));
    }

    #[test]
    fn test_mock_failing_writes_leave_files_untouched() {
        let path = Path::new("/project/terraform.tfvars");
        let fs = MockFileSystem::new()
            .with_file(path, "a = 1\n")
            .with_failing_writes(1);

        assert!(fs.write(path, "a = 2\n").is_err());
        assert_eq!(fs.get_file_contents(path).unwrap(), "a = 1\n");
        assert!(fs.written_paths().is_empty());

        fs.write(path, "a = 3\n").unwrap();
        assert_eq!(fs.get_file_contents(path).unwrap(), "a = 3\n");
    }

    #[test]
    fn test_mock_walk_dir_lists_direct_children() {
        let fs = MockFileSystem::new()
            .with_file("/project/main.tf", "")
            .with_file("/project/nested/other.tf", "");

        let entries = fs.walk_dir(Path::new("/project"), 1).unwrap();

        assert_eq!(entries, vec![PathBuf::from("/project/main.tf")]);
    }
}
