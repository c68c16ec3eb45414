use std::hash::Hasher;
use std::path::{Path, PathBuf};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use super::ids::ObjectId;
use super::workflow::FileType;

/// A file produced or consumed by the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub id: ObjectId,
    pub path: PathBuf,
    pub file_type: FileType,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl FileReference {
    /// Reference `path`, hashing its contents if it can be read
    pub fn new(path: impl Into<PathBuf>, file_type: FileType) -> Self {
        let path = path.into();
        let checksum = checksum(&path);
        Self {
            id: ObjectId::new(),
            path,
            file_type,
            checksum,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// True when the file still hashes to the recorded checksum
    pub fn is_unchanged(&self) -> bool {
        self.checksum.is_some() && checksum(&self.path) == self.checksum
    }
}

fn checksum(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = FxHasher::default();
    hasher.write(&bytes);
    Some(format!("{:016x}", hasher.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.osm");
        std::fs::write(&path, "OS:Version").unwrap();

        let reference = FileReference::new(&path, FileType::Model);
        assert!(reference.exists());
        assert!(reference.checksum.is_some());
        assert!(reference.is_unchanged());

        std::fs::write(&path, "OS:Version,3.7").unwrap();
        assert!(!reference.is_unchanged());
    }

    #[test]
    fn test_missing_file_has_no_checksum() {
        let reference = FileReference::new("/nonexistent/in.osm", FileType::Model);
        assert!(!reference.exists());
        assert_eq!(reference.checksum, None);
        assert!(!reference.is_unchanged());
    }
}
