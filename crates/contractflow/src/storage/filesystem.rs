use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Filesystem artifact store rooted at the configured uploads directory.
///
/// Scope-of-work uploads and merged contracts both live here. Relative
/// paths are resolved against the root; absolute paths are used as given.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored path against the storage root.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Whether a regular file exists at `path`.
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve(path).is_file()
    }

    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(path);
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Writes `content` to `<root>/<filename>`, replacing any previous file.
    ///
    /// The bytes go to a uniquely named temp file in the same directory
    /// first and are renamed into place, so readers see either the old or
    /// the new artifact, never a partial one.
    pub fn write_atomic(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        self.ensure_directory(&self.root)?;

        let final_path = self.root.join(filename);
        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", filename, uuid::Uuid::new_v4()));

        std::fs::write(&temp_path, content).map_err(|e| StorageError::WriteFile {
            path: temp_path.clone(),
            source: e,
        })?;

        if let Err(e) = std::fs::rename(&temp_path, &final_path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::MoveFile {
                from: temp_path,
                to: final_path,
                source: e,
            });
        }

        Ok(final_path)
    }

    /// Removes a stored file. Removing a file that is already gone is not
    /// an error.
    pub fn remove<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError> {
        let path = self.resolve(path);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveFile { path, source: e }),
        }
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}
