use crate::error::{IndexError, Result};
use crate::hash::name_hash;
use crate::model::{MAX_METHOD_LEN, MAX_NAME_LEN, MAX_URL_LEN, StructureNode};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TABLE_NAME: &str = "structure";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

macro_rules! node_columns {
    () => {
        "id, session_id, parent_id, history_id, name, name_hash, url, method"
    };
}

macro_rules! select_nodes {
    ($filter:literal) => {
        concat!("SELECT ", node_columns!(), " FROM structure WHERE ", $filter)
    };
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS structure (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL,
    parent_id INTEGER NOT NULL,
    history_id INTEGER,
    name TEXT NOT NULL CHECK(length(name) BETWEEN 1 AND 8192),
    name_hash INTEGER NOT NULL,
    url TEXT NOT NULL CHECK(length(url) BETWEEN 1 AND 8192),
    method TEXT NOT NULL CHECK(length(method) BETWEEN 1 AND 10)
);

-- One node per (name, method) in a session
CREATE UNIQUE INDEX IF NOT EXISTS idx_structure_key ON structure(session_id, name, method);
CREATE INDEX IF NOT EXISTS idx_structure_hash ON structure(session_id, name_hash, method);
CREATE INDEX IF NOT EXISTS idx_structure_parent ON structure(session_id, parent_id);
";

/// Persistent, session-scoped index of site structure nodes.
///
/// The index owns its connection and the statement cache bound to it. Every
/// operation holds the connection for its whole duration, so a caller never
/// observes another thread's half-finished write on the same connection.
/// Share it between threads with `Arc<StructureIndex>`.
pub struct StructureIndex {
    conn: Mutex<Connection>,
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<StructureNode> {
    Ok(StructureNode {
        id: row.get(0)?,
        session_id: row.get(1)?,
        parent_id: row.get(2)?,
        history_id: row.get(3)?,
        name: row.get(4)?,
        name_hash: row.get(5)?,
        url: row.get(6)?,
        method: row.get(7)?,
    })
}

fn validate(name: &str, url: &str, method: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IndexError::InvalidNode("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(IndexError::InvalidNode(format!(
            "name longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if url.is_empty() {
        return Err(IndexError::InvalidNode("url must not be empty".to_string()));
    }
    if url.chars().count() > MAX_URL_LEN {
        return Err(IndexError::InvalidNode(format!(
            "url longer than {} characters",
            MAX_URL_LEN
        )));
    }
    if method.is_empty() || method.chars().count() > MAX_METHOD_LEN {
        return Err(IndexError::InvalidNode(format!(
            "method must be 1 to {} characters, got '{}'",
            MAX_METHOD_LEN, method
        )));
    }
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Returns true if `name` is an existing table on `conn`.
pub fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

impl StructureIndex {
    /// Opens (or creates) the database file at `path` and bootstraps the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

        // journal_mode answers with the mode now in effect
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!("Journal mode for {}: {}", path.display(), mode);

        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps a connection handed over by an external provider. Only the schema
    /// bootstrap is applied; connection settings are left to the provider.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(StructureIndex {
            conn: Mutex::new(conn),
        })
    }

    /// Closes the underlying connection, reporting any failure to do so.
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|_| IndexError::Poisoned)?;
        conn.close().map_err(|(_, e)| IndexError::Storage(e))
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        if !has_table(conn, TABLE_NAME)? {
            info!("Creating {} table", TABLE_NAME);
        }
        // Safe to run on every startup
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexError::Poisoned)
    }

    pub fn read(&self, session_id: i64, node_id: i64) -> Result<Option<StructureNode>> {
        let conn = self.lock()?;
        Self::read_on(&conn, session_id, node_id)
    }

    fn read_on(conn: &Connection, session_id: i64, node_id: i64) -> Result<Option<StructureNode>> {
        let mut stmt = conn.prepare_cached(select_nodes!("session_id = ?1 AND id = ?2"))?;
        let node = stmt
            .query_row(params![session_id, node_id], node_from_row)
            .optional()?;
        Ok(node)
    }

    /// Stores a new node and returns it exactly as persisted, including the
    /// id storage generated for it.
    ///
    /// Fails with [`IndexError::DuplicateNode`] if the session already holds a
    /// node with the same name and method.
    pub fn insert(
        &self,
        session_id: i64,
        parent_id: i64,
        history_id: Option<i32>,
        name: &str,
        url: &str,
        method: &str,
    ) -> Result<StructureNode> {
        validate(name, url, method)?;
        let conn = self.lock()?;

        let mut stmt = conn.prepare_cached(concat!(
            "INSERT INTO structure (session_id, parent_id, history_id, name, name_hash, url, method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING ",
            node_columns!()
        ))?;

        let node = stmt
            .query_row(
                params![session_id, parent_id, history_id, name, name_hash(name), url, method],
                node_from_row,
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    warn!("Rejected duplicate node {} {} in session {}", method, name, session_id);
                    IndexError::DuplicateNode {
                        session_id,
                        name: name.to_string(),
                        method: method.to_string(),
                    }
                } else {
                    IndexError::Storage(e)
                }
            })?;

        debug!("Inserted node {} ({} {}) under {}", node.id, method, name, parent_id);
        Ok(node)
    }

    /// Returns the node for `(name, method)` in the session, inserting it under
    /// `parent_id` when it is not there yet. The flag is true when this call
    /// created the node.
    ///
    /// Safe to race: concurrent callers discovering the same key all get the
    /// one stored node back.
    pub fn find_or_insert(
        &self,
        session_id: i64,
        parent_id: i64,
        history_id: Option<i32>,
        name: &str,
        url: &str,
        method: &str,
    ) -> Result<(StructureNode, bool)> {
        validate(name, url, method)?;
        let conn = self.lock()?;

        let inserted = {
            let mut stmt = conn.prepare_cached(concat!(
                "INSERT INTO structure (session_id, parent_id, history_id, name, name_hash, url, method)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(session_id, name, method) DO NOTHING RETURNING ",
                node_columns!()
            ))?;
            stmt.query_row(
                params![session_id, parent_id, history_id, name, name_hash(name), url, method],
                node_from_row,
            )
            .optional()?
        };

        if let Some(node) = inserted {
            debug!("Inserted node {} ({} {}) under {}", node.id, method, name, parent_id);
            return Ok((node, true));
        }

        // The conflicting row may live in another connection's committed write,
        // so look it up rather than assume it is ours.
        match Self::find_on(&conn, session_id, name, method)? {
            Some(node) => Ok((node, false)),
            None => Err(IndexError::DuplicateNode {
                session_id,
                name: name.to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// Looks a node up by name and method.
    ///
    /// Candidates are narrowed by the structural hash, then compared by exact
    /// name; rows that only share the hash are skipped.
    pub fn find(&self, session_id: i64, name: &str, method: &str) -> Result<Option<StructureNode>> {
        let conn = self.lock()?;
        Self::find_on(&conn, session_id, name, method)
    }

    fn find_on(
        conn: &Connection,
        session_id: i64,
        name: &str,
        method: &str,
    ) -> Result<Option<StructureNode>> {
        let mut stmt = conn.prepare_cached(select_nodes!(
            "session_id = ?1 AND name_hash = ?2 AND method = ?3"
        ))?;
        let mut rows = stmt.query(params![session_id, name_hash(name), method])?;

        while let Some(row) = rows.next()? {
            let stored: String = row.get(4)?;
            if stored == name {
                return Ok(Some(node_from_row(row)?));
            }
            debug!("Hash collision on '{}' with stored '{}'", name, stored);
        }

        Ok(None)
    }

    /// Direct children of `parent_id`, oldest first.
    pub fn get_children(&self, session_id: i64, parent_id: i64) -> Result<Vec<StructureNode>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(select_nodes!(
            "session_id = ?1 AND parent_id = ?2 ORDER BY id"
        ))?;

        let children = stmt
            .query_map(params![session_id, parent_id], node_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(children)
    }

    pub fn get_child_count(&self, session_id: i64, parent_id: i64) -> Result<u64> {
        let conn = self.lock()?;
        Self::child_count_on(&conn, session_id, parent_id)
    }

    fn child_count_on(conn: &Connection, session_id: i64, parent_id: i64) -> Result<u64> {
        let mut stmt = conn.prepare_cached(
            "SELECT COUNT(*) FROM structure WHERE session_id = ?1 AND parent_id = ?2",
        )?;
        let count: i64 = stmt.query_row(params![session_id, parent_id], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// The node followed by each of its ancestors up to the top-level node.
    /// Empty if the node does not exist; stops early at a missing parent.
    pub fn ancestors(&self, session_id: i64, node_id: i64) -> Result<Vec<StructureNode>> {
        let conn = self.lock()?;
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Self::read_on(&conn, session_id, node_id)?;

        while let Some(node) = next {
            if !seen.insert(node.id) {
                warn!("Parent cycle at node {} in session {}", node.id, session_id);
                break;
            }
            next = if node.is_top_level() {
                None
            } else {
                Self::read_on(&conn, session_id, node.parent_id)?
            };
            chain.push(node);
        }

        Ok(chain)
    }

    /// Removes a single childless node. Returns false if there was no such node.
    ///
    /// Fails with [`IndexError::HasChildren`] and leaves storage untouched if
    /// the node still has children.
    pub fn delete_leaf(&self, session_id: i64, node_id: i64) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::read_on(&tx, session_id, node_id)?.is_none() {
            return Ok(false);
        }

        let children = Self::child_count_on(&tx, session_id, node_id)?;
        if children > 0 {
            warn!(
                "Refusing to delete node {} in session {}: {} child node(s)",
                node_id, session_id, children
            );
            return Err(IndexError::HasChildren {
                session_id,
                node_id,
                children,
            });
        }

        let removed = tx.execute(
            "DELETE FROM structure WHERE session_id = ?1 AND id = ?2",
            params![session_id, node_id],
        )?;
        tx.commit()?;

        info!("Deleted node {} in session {}", node_id, session_id);
        Ok(removed > 0)
    }

    /// Removes a node and all of its descendants in one transaction. Returns
    /// the number of nodes removed, 0 if the node did not exist.
    pub fn delete_subtree(&self, session_id: i64, node_id: i64) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed = tx.execute(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM structure WHERE session_id = ?1 AND id = ?2
                UNION
                SELECT s.id FROM structure s JOIN subtree t ON s.parent_id = t.id
                WHERE s.session_id = ?1
            )
            DELETE FROM structure WHERE session_id = ?1 AND id IN (SELECT id FROM subtree)",
            params![session_id, node_id],
        )?;
        tx.commit()?;

        if removed > 0 {
            info!(
                "Deleted subtree at node {} in session {} ({} nodes)",
                node_id, session_id, removed
            );
        }
        Ok(removed)
    }

    pub fn session_node_count(&self, session_id: i64) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM structure WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Removes every node of a session. Returns the number of nodes removed.
    pub fn delete_session(&self, session_id: i64) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM structure WHERE session_id = ?1",
            params![session_id],
        )?;
        info!("Deleted session {} ({} nodes)", session_id, removed);
        Ok(removed)
    }
}
