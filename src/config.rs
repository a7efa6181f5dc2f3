//! Configuration for the seshat store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, SeshatResult};
use crate::index::{IndexConfig, SearchIndex};
use crate::infer::InverseOntology;
use crate::repo::Repository;
use crate::store::GraphStore;

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for persistence. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
    /// Managed namespace: only IRIs under this prefix are tracked in
    /// history and reindex scopes.
    pub namespace: String,
    /// Inverse-relation ontology file (TOML `pairs` array).
    pub ontology: Option<PathBuf>,
    /// Search index tuning.
    pub index: IndexSettings,
}

/// Search index settings as they appear in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Maximum edit distance for fuzzy matches.
    pub fuzziness: usize,
    /// Page size for scans and scroll batches.
    pub page_size: usize,
    /// Scroll cursor time-to-live in seconds.
    pub scroll_ttl_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        let defaults = IndexConfig::default();
        Self {
            fuzziness: defaults.fuzziness,
            page_size: defaults.page_size,
            scroll_ttl_secs: defaults.scroll_ttl.as_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            namespace: "https://seshat.dev/resource/".into(),
            ontology: None,
            index: IndexSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn index_config(&self) -> IndexConfig {
        IndexConfig {
            fuzziness: self.index.fuzziness,
            page_size: self.index.page_size,
            scroll_ttl: Duration::from_secs(self.index.scroll_ttl_secs),
        }
    }

    /// Open the repository this configuration describes: ontology, graph
    /// store (persistent when a data directory is set) and search index.
    pub fn open(&self) -> SeshatResult<Repository> {
        let inverses = match &self.ontology {
            Some(path) => Arc::new(InverseOntology::load(path)?),
            None => Arc::new(InverseOntology::default()),
        };
        let store = match &self.data_dir {
            Some(dir) => Arc::new(GraphStore::open(dir, &self.namespace, inverses)?),
            None => Arc::new(GraphStore::in_memory(&self.namespace, inverses)),
        };
        let index = SearchIndex::new(self.index_config());
        Ok(Repository::new(store, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.data_dir.is_none());
        assert_eq!(config.index.page_size, 1024);
        assert_eq!(config.index.scroll_ttl_secs, 60);
    }

    #[test]
    fn load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seshat.toml");
        std::fs::write(
            &path,
            "namespace = \"http://ex/\"\n\n[index]\nfuzziness = 1\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.namespace, "http://ex/");
        assert_eq!(config.index.fuzziness, 1);
        // Unset fields keep their defaults.
        assert_eq!(config.index.page_size, 1024);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seshat.toml");
        std::fs::write(&path, "namespace = [1, 2]\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
