//! ACID-durable backing tables for the graph store, built on redb.
//!
//! Three tables: the canonical triple set, the commit log, and the
//! per-resource commit index. All writes go through transactions; a
//! committed write transaction is the durability point for a graph write.
//! Values are serde_json bytes.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::commit::{Commit, Diff, Op};
use crate::error::StoreError;
use crate::graph::{Model, Triple};
use crate::store::StoreResult;

/// Canonical triple set: serialized triple → unit.
const TRIPLES_TABLE: TableDefinition<&[u8], ()> = TableDefinition::new("triples");

/// Commit log: sequence number → serialized commit.
const COMMITS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("commits");

/// Commit index: (resource id, sequence number) → unit.
const COMMIT_INDEX_TABLE: TableDefinition<(&str, u64), ()> = TableDefinition::new("commit_index");

fn redb_err(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{context}: {e}"),
    }
}

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

/// Durable tier for the graph store.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create the durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("seshat.redb");
        let db = Database::create(&db_path)
            .map_err(|e| redb_err(&format!("failed to open redb at {}", db_path.display()), e))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Write a batch of diffs as one transaction.
    ///
    /// The transaction commit is the durability sync: if it fails, nothing
    /// was persisted and the caller must not mutate its in-memory state.
    pub fn apply_diffs(&self, diffs: &[&Diff]) -> StoreResult<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write failed", e))?;
        {
            let mut table = txn
                .open_table(TRIPLES_TABLE)
                .map_err(|e| redb_err("open_table failed", e))?;
            for diff in diffs {
                for line in diff.lines() {
                    let key = encode(&line.triple)?;
                    match line.op {
                        Op::Add => {
                            table
                                .insert(key.as_slice(), ())
                                .map_err(|e| redb_err("insert failed", e))?;
                        }
                        Op::Remove => {
                            table
                                .remove(key.as_slice())
                                .map_err(|e| redb_err("remove failed", e))?;
                        }
                    }
                }
            }
        }
        txn.commit().map_err(|e| StoreError::Sync {
            message: e.to_string(),
        })
    }

    /// Load the full triple set, rebuilding the in-memory model on startup.
    pub fn load_model(&self) -> StoreResult<Model> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read failed", e))?;
        let table = match txn.open_table(TRIPLES_TABLE) {
            Ok(table) => table,
            // First open: the table does not exist yet.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Model::new()),
            Err(e) => return Err(redb_err("open_table failed", e)),
        };
        let mut model = Model::new();
        for entry in table.iter().map_err(|e| redb_err("iter failed", e))? {
            let (key, _) = entry.map_err(|e| redb_err("iter entry failed", e))?;
            let triple: Triple = decode(key.value())?;
            model.insert(triple);
        }
        Ok(model)
    }

    /// Append a commit to the log, indexed under each of the given ids.
    /// Returns the assigned sequence number.
    pub fn append_commit(&self, commit: &Commit, ids: &[String]) -> StoreResult<u64> {
        let payload = encode(commit)?;
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write failed", e))?;
        let seq;
        {
            let mut commits = txn
                .open_table(COMMITS_TABLE)
                .map_err(|e| redb_err("open_table failed", e))?;
            seq = commits
                .last()
                .map_err(|e| redb_err("last failed", e))?
                .map(|(k, _)| k.value() + 1)
                .unwrap_or(0);
            commits
                .insert(seq, payload.as_slice())
                .map_err(|e| redb_err("insert failed", e))?;

            let mut index = txn
                .open_table(COMMIT_INDEX_TABLE)
                .map_err(|e| redb_err("open_table failed", e))?;
            for id in ids {
                index
                    .insert((id.as_str(), seq), ())
                    .map_err(|e| redb_err("insert failed", e))?;
            }
        }
        txn.commit().map_err(|e| StoreError::Sync {
            message: e.to_string(),
        })?;
        Ok(seq)
    }

    /// All commits in sequence order.
    pub fn commits(&self) -> StoreResult<Vec<(u64, Commit)>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read failed", e))?;
        let table = match txn.open_table(COMMITS_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(redb_err("open_table failed", e)),
        };
        let mut commits = Vec::new();
        for entry in table.iter().map_err(|e| redb_err("iter failed", e))? {
            let (seq, payload) = entry.map_err(|e| redb_err("iter entry failed", e))?;
            commits.push((seq.value(), decode(payload.value())?));
        }
        Ok(commits)
    }

    /// All (resource id, sequence number) index rows.
    pub fn commit_index(&self) -> StoreResult<Vec<(String, u64)>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read failed", e))?;
        let table = match txn.open_table(COMMIT_INDEX_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(redb_err("open_table failed", e)),
        };
        let mut rows = Vec::new();
        for entry in table.iter().map_err(|e| redb_err("iter failed", e))? {
            let (key, _) = entry.map_err(|e| redb_err("iter entry failed", e))?;
            let (id, seq) = key.value();
            rows.push((id.to_string(), seq));
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{CommitHeader, Diff};
    use tempfile::TempDir;

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::link(s, p, o)
    }

    #[test]
    fn diffs_persist_across_reopens() {
        let dir = TempDir::new().unwrap();

        {
            let store = DurableStore::open(dir.path()).unwrap();
            let mut diff = Diff::new();
            diff.add(t("http://ex/1", "http://ex/p", "http://ex/2"));
            diff.add(t("http://ex/2", "http://ex/p", "http://ex/3"));
            store.apply_diffs(&[&diff]).unwrap();

            let mut removal = Diff::new();
            removal.remove(t("http://ex/2", "http://ex/p", "http://ex/3"));
            store.apply_diffs(&[&removal]).unwrap();
        }

        let store = DurableStore::open(dir.path()).unwrap();
        let model = store.load_model().unwrap();
        assert_eq!(model.len(), 1);
        assert!(model.contains(&t("http://ex/1", "http://ex/p", "http://ex/2")));
    }

    #[test]
    fn empty_store_loads_empty_model() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        assert!(store.load_model().unwrap().is_empty());
        assert!(store.commits().unwrap().is_empty());
    }

    #[test]
    fn commit_log_assigns_increasing_seqs() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        let header = CommitHeader::new("alice", "2024-05-01T12:00:00Z".parse().unwrap());
        let mut diff = Diff::new();
        diff.add(t("http://ex/1", "http://ex/p", "http://ex/2"));
        let commit = Commit::new(header, diff);

        let ids = vec!["http://ex/1".to_string(), "http://ex/2".to_string()];
        assert_eq!(store.append_commit(&commit, &ids).unwrap(), 0);
        assert_eq!(store.append_commit(&commit, &ids).unwrap(), 1);

        let commits = store.commits().unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].0, 0);

        let index = store.commit_index().unwrap();
        assert_eq!(index.len(), 4);
    }
}
