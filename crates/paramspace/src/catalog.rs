//! Measure revisions read from a directory of YAML files
//!
//! Each file holds one entry:
//!
//! ```yaml
//! measure:
//!   id: 5b0c...
//!   version: 9e41...
//!   name: Set WWR
//!   input_type: Model
//!   output_type: Model
//! arguments:
//!   - ...
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use paramspace_core::MeasureCatalog;
use paramspace_core::model::{Argument, MeasureDescriptor, ObjectId};

use crate::storage::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureEntry {
    pub measure: MeasureDescriptor,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

/// Latest known revision of each measure, keyed by measure id
#[derive(Debug, Default)]
pub struct MeasureDirectory {
    entries: HashMap<ObjectId, MeasureEntry>,
}

impl MeasureDirectory {
    /// Read every `*.yaml` file in `dir`. A missing directory is an empty
    /// catalog. When two files describe the same measure the later file
    /// name wins.
    pub fn load(dir: &Path) -> Result<Self, StorageError> {
        let mut catalog = Self::default();
        if !dir.exists() {
            return Ok(catalog);
        }

        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(|e| StorageError::Io(format!("Failed to read measures directory: {e}")))?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        paths.sort();

        for path in paths {
            let content = fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read {}: {e}", path.display())))?;
            let entry: MeasureEntry = serde_saphyr::from_str(&content).map_err(|e| {
                StorageError::Parse(format!("Failed to parse {}: {e}", path.display()))
            })?;
            tracing::debug!(measure = %entry.measure.name, path = %path.display(), "catalog entry");
            catalog.insert(entry);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, entry: MeasureEntry) {
        self.entries.insert(entry.measure.id, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MeasureCatalog for MeasureDirectory {
    fn describe(&self, id: ObjectId) -> Option<(MeasureDescriptor, Vec<Argument>)> {
        self.entries
            .get(&id)
            .map(|entry| (entry.measure.clone(), entry.arguments.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramspace_core::model::FileType;
    use tempfile::tempdir;

    fn write_entry(dir: &Path, file: &str, entry: &MeasureEntry) {
        fs::write(dir.join(file), serde_saphyr::to_string(entry).unwrap()).unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let catalog = MeasureDirectory::load(&dir.path().join("measures")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_load_entries() {
        let dir = tempdir().unwrap();
        let wwr = MeasureDescriptor::new("Set WWR", FileType::Model, FileType::Model);
        let roof = MeasureDescriptor::new("Roof R-30", FileType::Model, FileType::Model);
        write_entry(
            dir.path(),
            "set_wwr.yaml",
            &MeasureEntry {
                measure: wwr.clone(),
                arguments: vec![Argument::double("wwr")],
            },
        );
        write_entry(
            dir.path(),
            "roof.yaml",
            &MeasureEntry {
                measure: roof.clone(),
                arguments: vec![],
            },
        );
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = MeasureDirectory::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        let (described, arguments) = catalog.describe(wwr.id).unwrap();
        assert_eq!(described, wwr);
        assert_eq!(arguments[0].name(), "wwr");
        assert!(catalog.describe(ObjectId::new()).is_none());
    }

    #[test]
    fn test_later_file_wins() {
        let dir = tempdir().unwrap();
        let wwr = MeasureDescriptor::new("Set WWR", FileType::Model, FileType::Model);
        let revised = wwr.revised();
        write_entry(dir.path(), "a.yaml", &MeasureEntry { measure: wwr.clone(), arguments: vec![] });
        write_entry(dir.path(), "b.yaml", &MeasureEntry { measure: revised.clone(), arguments: vec![] });

        let catalog = MeasureDirectory::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.describe(wwr.id).unwrap().0.version, revised.version);
    }

    #[test]
    fn test_bad_entry_is_a_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.yaml"), "measure: 3").unwrap();
        assert!(matches!(
            MeasureDirectory::load(dir.path()),
            Err(StorageError::Parse(_))
        ));
    }
}
