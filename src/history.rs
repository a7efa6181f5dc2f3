//! Append-only commit log, queryable per resource.
//!
//! Every applied commit is recorded once and indexed under each managed-
//! namespace identifier its diff touches. Commits are never mutated or
//! deleted. When a durable tier is attached the log is persisted through
//! it and reloaded on open.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::commit::Commit;
use crate::error::HistoryError;
use crate::store::durable::DurableStore;

/// Result type for history operations.
pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

/// Append-only, per-resource-queryable log of applied commits.
pub struct GraphHistory {
    durable: Option<Arc<DurableStore>>,
    /// Commits in application order.
    commits: RwLock<Vec<Arc<Commit>>>,
    /// Resource id → positions into `commits`, ascending.
    by_id: DashMap<String, Vec<usize>>,
    /// IRIs outside this namespace are not indexed.
    namespace: String,
}

impl GraphHistory {
    /// Create an in-memory history (lost on process exit).
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self {
            durable: None,
            commits: RwLock::new(Vec::new()),
            by_id: DashMap::new(),
            namespace: namespace.into(),
        }
    }

    /// Open a history backed by the durable tier, reloading persisted commits.
    pub fn open(durable: Arc<DurableStore>, namespace: impl Into<String>) -> HistoryResult<Self> {
        let history = Self {
            durable: Some(durable.clone()),
            commits: RwLock::new(Vec::new()),
            by_id: DashMap::new(),
            namespace: namespace.into(),
        };

        let persisted = durable.commits().map_err(|e| HistoryError::Read {
            message: e.to_string(),
        })?;
        // Sequence numbers are dense and ascending, so position == seq.
        {
            let mut commits = history.commits.write().expect("history lock poisoned");
            for (_, commit) in persisted {
                commits.push(Arc::new(commit));
            }
        }
        let rows = durable.commit_index().map_err(|e| HistoryError::Read {
            message: e.to_string(),
        })?;
        for (id, seq) in rows {
            history.by_id.entry(id).or_default().push(seq as usize);
        }
        for mut entry in history.by_id.iter_mut() {
            entry.value_mut().sort_unstable();
        }

        tracing::debug!(
            commits = history.commits.read().expect("history lock poisoned").len(),
            "reloaded commit log"
        );
        Ok(history)
    }

    /// Append a commit, indexing it under every managed identifier it touches.
    ///
    /// Persists first when a durable tier is attached; the in-memory log is
    /// only updated after the append has been made durable.
    pub fn append(&self, commit: Commit) -> HistoryResult<()> {
        let ids = commit.diff.touched_ids(&self.namespace);

        if let Some(durable) = &self.durable {
            durable
                .append_commit(&commit, &ids)
                .map_err(|e| HistoryError::Append {
                    message: e.to_string(),
                })?;
        }

        let position = {
            let mut commits = self.commits.write().expect("history lock poisoned");
            commits.push(Arc::new(commit));
            commits.len() - 1
        };
        for id in ids {
            self.by_id.entry(id).or_default().push(position);
        }
        Ok(())
    }

    /// All commits touching `id`, in application order.
    pub fn log(&self, id: &str) -> Vec<Commit> {
        let Some(positions) = self.by_id.get(id) else {
            return Vec::new();
        };
        let commits = self.commits.read().expect("history lock poisoned");
        positions
            .iter()
            .filter_map(|&i| commits.get(i).map(|c| (**c).clone()))
            .collect()
    }

    /// Total number of recorded commits.
    pub fn len(&self) -> usize {
        self.commits.read().expect("history lock poisoned").len()
    }

    /// Whether no commits have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for GraphHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphHistory")
            .field("commits", &self.len())
            .field("namespace", &self.namespace)
            .finish()
    }
}
