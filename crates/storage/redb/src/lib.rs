//! redb-based node spec storage backend.
//!
//! This crate provides [`RedbNodeSpecStore`], a persistent [`NodeSpecStore`]
//! backed by the redb embedded database.

use std::path::Path;

use p2pd_primitives::{NodeId, NodeSpec};
use p2pd_storage::{NodeSpecStore, StoreError, StoreResult, decode_spec, encode_spec};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, trace};

/// Table definition for node specs.
/// Key: node id
/// Value: versioned spec encoding
const NODE_SPECS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("node_specs");

/// redb-based node spec store.
///
/// Every `put` is its own write transaction, so a spec is either fully
/// replaced or untouched. redb serializes writers internally.
pub struct RedbNodeSpecStore {
    db: Database,
}

impl std::fmt::Debug for RedbNodeSpecStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbNodeSpecStore").finish_non_exhaustive()
    }
}

impl RedbNodeSpecStore {
    /// Open or create a node spec store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Database::create(path.as_ref()).map_err(db_err)?;

        // Ensure the table exists so read transactions never miss it
        let write_txn = db.begin_write().map_err(db_err)?;
        {
            let _ = write_txn.open_table(NODE_SPECS_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        debug!(path = %path.as_ref().display(), "Opened redb node spec store");
        Ok(Self { db })
    }

    /// Number of stored specs.
    pub fn count(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(NODE_SPECS_TABLE).map_err(db_err)?;
        let mut count = 0u64;
        for entry in table.iter().map_err(db_err)? {
            entry.map_err(db_err)?;
            count += 1;
        }
        Ok(count)
    }
}

fn db_err(err: impl Into<redb::Error>) -> StoreError {
    StoreError::Database(err.into().to_string())
}

impl NodeSpecStore for RedbNodeSpecStore {
    fn get(&self, id: &NodeId) -> StoreResult<Option<NodeSpec>> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(NODE_SPECS_TABLE).map_err(db_err)?;
        match table.get(id.as_str()).map_err(db_err)? {
            Some(value) => decode_spec(id, value.value()).map(Some),
            None => Ok(None),
        }
    }

    fn put(&self, spec: &NodeSpec) -> StoreResult<()> {
        let value = encode_spec(spec)?;
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = write_txn.open_table(NODE_SPECS_TABLE).map_err(db_err)?;
            table
                .insert(spec.id.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        trace!(node_id = %spec.id, addrs = spec.listen_addrs.len(), "stored node spec");
        Ok(())
    }

    fn put_new(&self, spec: &NodeSpec) -> StoreResult<bool> {
        let value = encode_spec(spec)?;
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let inserted = {
            let mut table = write_txn.open_table(NODE_SPECS_TABLE).map_err(db_err)?;
            // Check and insert inside one write transaction
            if table.get(spec.id.as_str()).map_err(db_err)?.is_none() {
                table
                    .insert(spec.id.as_str(), value.as_slice())
                    .map_err(db_err)?;
                true
            } else {
                false
            }
        };
        write_txn.commit().map_err(db_err)?;
        if inserted {
            trace!(node_id = %spec.id, "stored new node spec");
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn spec(id: &str, addrs: &[&str]) -> NodeSpec {
        NodeSpec {
            id: NodeId::new(id).unwrap(),
            private_key: vec![42; 16],
            listen_addrs: addrs.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_put_get() {
        let dir = tempdir().unwrap();
        let store = RedbNodeSpecStore::open(dir.path().join("test.redb")).unwrap();

        let original = spec("a", &["/ip4/127.0.0.1/tcp/4001"]);
        store.put(&original).unwrap();

        let loaded = store.get(&original.id).unwrap();
        assert_eq!(loaded, Some(original));
    }

    #[test]
    fn test_get_missing() {
        let dir = tempdir().unwrap();
        let store = RedbNodeSpecStore::open(dir.path().join("test.redb")).unwrap();
        assert_matches!(store.get(&NodeId::new("nope").unwrap()), Ok(None));
    }

    #[test]
    fn test_put_overwrites() {
        let dir = tempdir().unwrap();
        let store = RedbNodeSpecStore::open(dir.path().join("test.redb")).unwrap();

        store.put(&spec("a", &[])).unwrap();
        store
            .put(&spec("a", &["/ip4/127.0.0.1/tcp/1", "/ip4/127.0.0.1/tcp/2"]))
            .unwrap();

        let loaded = store.get(&NodeId::new("a").unwrap()).unwrap().unwrap();
        assert_eq!(
            loaded.listen_addrs,
            vec!["/ip4/127.0.0.1/tcp/1", "/ip4/127.0.0.1/tcp/2"]
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_put_new_is_insert_if_absent() {
        let dir = tempdir().unwrap();
        let store = RedbNodeSpecStore::open(dir.path().join("test.redb")).unwrap();

        let first = spec("a", &["/ip4/127.0.0.1/tcp/1"]);
        assert!(store.put_new(&first).unwrap());
        assert!(!store.put_new(&spec("a", &[])).unwrap());
        assert_eq!(store.get(&first.id).unwrap(), Some(first));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let original = spec("persisted", &["/ip4/127.0.0.1/tcp/9"]);

        {
            let store = RedbNodeSpecStore::open(&path).unwrap();
            store.put(&original).unwrap();
        }

        let store = RedbNodeSpecStore::open(&path).unwrap();
        assert_eq!(store.get(&original.id).unwrap(), Some(original));
    }

    #[test]
    fn test_count() {
        let dir = tempdir().unwrap();
        let store = RedbNodeSpecStore::open(dir.path().join("test.redb")).unwrap();

        assert_eq!(store.count().unwrap(), 0);
        for i in 0..5 {
            store.put(&spec(&format!("node-{i}"), &[])).unwrap();
        }
        assert_eq!(store.count().unwrap(), 5);
    }
}
