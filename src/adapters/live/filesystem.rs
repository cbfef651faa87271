//! Live filesystem adapter using `std::fs`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::ports::filesystem::{FileSystem, PortError};

/// Filesystem adapter backed by real disk I/O.
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Synced so a later rename never publishes a partial file.
        let mut file = File::create(path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), PortError> {
        Ok(std::fs::create_dir_all(path)?)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        Ok(std::fs::rename(from, to)?)
    }

    fn remove_file(&self, path: &Path) -> Result<(), PortError> {
        Ok(std::fs::remove_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_rename_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/mappings.json");
        let tmp = dir.path().join("nested/mappings.json.tmp");
        let fs = LiveFileSystem;

        fs.write(&dest, "old").unwrap();
        fs.write(&tmp, "new").unwrap();
        fs.rename(&tmp, &dest).unwrap();

        assert_eq!(fs.read_to_string(&dest).unwrap(), "new");
        assert!(!fs.exists(&tmp));
    }

    #[test]
    fn write_truncates_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.json");
        let fs = LiveFileSystem;

        fs.write(&path, "a much longer first version").unwrap();
        fs.write(&path, "short").unwrap();

        assert_eq!(fs.read_to_string(&path).unwrap(), "short");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 5);
    }

    #[test]
    fn write_under_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        assert!(LiveFileSystem.write(&blocker.join("mappings.json"), "{}").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LiveFileSystem.read_to_string(&dir.path().join("absent.json")).is_err());
        assert!(LiveFileSystem.remove_file(&dir.path().join("absent.json")).is_err());
    }
}
