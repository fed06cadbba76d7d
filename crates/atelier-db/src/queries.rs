use crate::models::{IdentityRow, NodeRow};
use crate::path::TreePath;
use crate::store::TreeStore;
use crate::{Database, tree};
use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

impl TreeStore for Database {
    fn get(&self, path: &TreePath) -> Result<Option<Value>> {
        let Some((root, rest)) = path.segments().split_first() else {
            bail!("Cannot read the whole tree through a single path");
        };

        self.with_conn(|conn| {
            let Some(doc) = load_root(conn, root)? else {
                return Ok(None);
            };
            Ok(tree::lookup(&doc, rest).cloned())
        })
    }

    fn set(&self, path: &TreePath, value: Value) -> Result<()> {
        if value.is_null() {
            return self.delete(path);
        }
        let Some((root, rest)) = path.segments().split_first() else {
            bail!("Cannot overwrite the whole tree through a single path");
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut doc = load_root(&tx, root)?.unwrap_or(Value::Null);
            tree::insert(&mut doc, rest, value);
            store_root(&tx, root, &doc)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn delete(&self, path: &TreePath) -> Result<()> {
        let Some((root, rest)) = path.segments().split_first() else {
            bail!("Cannot delete the whole tree through a single path");
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if rest.is_empty() {
                tx.execute("DELETE FROM nodes WHERE root = ?1", [root])?;
            } else if let Some(mut doc) = load_root(&tx, root)? {
                if tree::remove(&mut doc, rest) {
                    store_root(&tx, root, &doc)?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }
}

impl Database {
    // -- Tree roots --

    pub fn list_nodes(&self) -> Result<Vec<NodeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT root, body, updated_at FROM nodes ORDER BY root")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(NodeRow {
                        root: row.get(0)?,
                        body: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Identities --

    pub fn upsert_identity(&self, uid: &str, email: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO identities (uid, email) VALUES (?1, ?2)
                 ON CONFLICT(uid) DO UPDATE SET email = excluded.email",
                (uid, email),
            )?;
            Ok(())
        })
    }

    pub fn list_identities(&self) -> Result<Vec<IdentityRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT uid, email, created_at FROM identities ORDER BY uid")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(IdentityRow {
                        uid: row.get(0)?,
                        email: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when no identity had this uid.
    pub fn delete_identity(&self, uid: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute("DELETE FROM identities WHERE uid = ?1", [uid])?;
            Ok(affected > 0)
        })
    }
}

fn load_root(conn: &Connection, root: &str) -> Result<Option<Value>> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM nodes WHERE root = ?1", [root], |row| row.get(0))
        .optional()?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

fn store_root(conn: &Connection, root: &str, doc: &Value) -> Result<()> {
    if tree::is_empty_node(doc) {
        conn.execute("DELETE FROM nodes WHERE root = ?1", [root])?;
        return Ok(());
    }

    conn.execute(
        "INSERT INTO nodes (root, body, updated_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(root) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        (root, serde_json::to_string(doc)?),
    )?;
    Ok(())
}
