//! Project files and the data directory (native only)
//!
//! Directory structure:
//! ~/.paramspace/
//!   config.yaml          # RunConfig
//!   paramspace.log
//!   measures/            # Current measure revisions, one YAML file each
//!     set_wwr.yaml
//!   runs/
//!     <analysis id>/
//!       <data point id>/ # One directory per executed point
//!
//! Projects are single YAML files holding a serialized `Analysis` and may
//! live anywhere.

use std::fs;
use std::path::{Path, PathBuf};

use paramspace_core::Analysis;
use paramspace_core::model::AnalysisObject;

use crate::config::RunConfig;
use crate::util::io::atomic_write;

/// Error types for storage operations
#[derive(Debug)]
pub enum StorageError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "IO error: {msg}"),
            StorageError::Parse(msg) => write!(f, "Parse error: {msg}"),
            StorageError::Serialize(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default data directory path (~/.paramspace/)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".paramspace")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// Resolve a configured path against the data directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn runs_dir(&self, config: &RunConfig) -> PathBuf {
        self.resolve(&config.runs_dir)
    }

    pub fn measures_dir(&self, config: &RunConfig) -> PathBuf {
        self.resolve(&config.measures_dir)
    }

    pub fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| StorageError::Io(format!("Failed to create data directory: {e}")))
    }

    /// Load `config.yaml`, falling back to defaults when it does not exist
    pub fn load_config(&self) -> Result<RunConfig, StorageError> {
        let config_path = self.config_path();
        if !config_path.exists() {
            return Ok(RunConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| StorageError::Io(format!("Failed to read config: {e}")))?;
        serde_saphyr::from_str(&content)
            .map_err(|e| StorageError::Parse(format!("Failed to parse config: {e}")))
    }

    pub fn save_config(&self, config: &RunConfig) -> Result<(), StorageError> {
        let yaml = serde_saphyr::to_string(config)
            .map_err(|e| StorageError::Serialize(format!("Failed to serialize config: {e}")))?;
        atomic_write(&self.config_path(), &yaml)
            .map_err(|e| StorageError::Io(format!("Failed to write config: {e}")))
    }
}

pub fn load_project(path: &Path) -> Result<Analysis, StorageError> {
    let content = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {e}", path.display())))?;
    let mut analysis: Analysis = serde_saphyr::from_str(&content)
        .map_err(|e| StorageError::Parse(format!("Failed to parse {}: {e}", path.display())))?;
    // Hand-edited projects may omit parent ids
    analysis.adopt_children();
    tracing::debug!(
        path = %path.display(),
        points = analysis.data_points().len(),
        "loaded project"
    );
    Ok(analysis)
}

pub fn save_project(path: &Path, analysis: &Analysis) -> Result<(), StorageError> {
    let yaml = serde_saphyr::to_string(analysis).map_err(|e| {
        StorageError::Serialize(format!("Failed to serialize {}: {e}", analysis.name()))
    })?;
    atomic_write(path, &yaml)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "saved project");
    Ok(())
}

/// Save the analysis if anything in it changed since the last save, then
/// mark the whole tree clean. Returns whether a write happened.
pub fn save_if_dirty(path: &Path, analysis: &mut Analysis) -> Result<bool, StorageError> {
    if !analysis.is_dirty() {
        return Ok(false);
    }
    save_project(path, analysis)?;
    analysis.clear_dirty_flag();
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_analysis;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let data = DataDirectory::new(dir.path().to_path_buf());
        assert_eq!(data.load_config().unwrap(), RunConfig::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempdir().unwrap();
        let data = DataDirectory::new(dir.path().join("data"));
        data.init().unwrap();

        let config = RunConfig {
            command: Some("./simulate.sh".into()),
            threads: 2,
            ..RunConfig::default()
        };
        data.save_config(&config).unwrap();
        assert_eq!(data.load_config().unwrap(), config);
    }

    #[test]
    fn test_relative_paths_resolve_under_root() {
        let data = DataDirectory::new(PathBuf::from("/srv/paramspace"));
        let config = RunConfig {
            measures_dir: PathBuf::from("/opt/measures"),
            ..RunConfig::default()
        };
        assert_eq!(data.runs_dir(&config), PathBuf::from("/srv/paramspace/runs"));
        assert_eq!(data.measures_dir(&config), PathBuf::from("/opt/measures"));
    }

    #[test]
    fn test_project_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("envelope.yaml");
        let mut analysis = sample_analysis();
        analysis.generate().unwrap();

        save_project(&path, &analysis).unwrap();
        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded, analysis);
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.data_points().len(), 2);
    }

    #[test]
    fn test_save_if_dirty_writes_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("envelope.yaml");
        let mut analysis = sample_analysis();
        assert!(analysis.is_dirty());

        assert!(save_if_dirty(&path, &mut analysis).unwrap());
        assert!(!analysis.is_dirty());

        fs::remove_file(&path).unwrap();
        assert!(!save_if_dirty(&path, &mut analysis).unwrap());
        assert!(!path.exists());

        analysis.set_algorithm(None);
        assert!(save_if_dirty(&path, &mut analysis).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(load_project(&missing), Err(StorageError::Io(_))));

        let garbage = dir.path().join("garbage.yaml");
        fs::write(&garbage, "meta: [unterminated").unwrap();
        assert!(matches!(load_project(&garbage), Err(StorageError::Parse(_))));
    }
}
