//! Relational adapter over SQLite.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use graphloom_core::{Error, Result};

use crate::repository::Repository;
use crate::schema::SCHEMA_SQL;
use crate::types::{Community, CommunityMembership, Edge, GlobalSummary, Node};

/// SQLite-backed graph repository.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteRepository {
    /// Open or create the repository under `db_dir`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("graph.db");

        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        info!("Graph repository initialized at {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn node_exists(conn: &Connection, index: &str, id: &str) -> Result<bool> {
        let count: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM nodes WHERE idx = ?1 AND id = ?2")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![index, id], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn row_to_node(row: &rusqlite::Row<'_>) -> Node {
        Node {
            id: row.get("id").unwrap_or_default(),
            index: row.get("idx").unwrap_or_default(),
            name: row.get("name").unwrap_or_default(),
            node_type: row.get("node_type").unwrap_or_default(),
            desc: row.get("description").unwrap_or_default(),
        }
    }

    fn row_to_edge(row: &rusqlite::Row<'_>) -> Edge {
        Edge {
            id: row.get("id").unwrap_or_default(),
            index: row.get("idx").unwrap_or_default(),
            source: row.get("source").unwrap_or_default(),
            target: row.get("target").unwrap_or_default(),
            relationship: row.get("relationship").unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn list_indices(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT DISTINCT idx FROM nodes ORDER BY idx")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn add_node(&self, node: &Node) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO nodes (id, idx, name, node_type, description) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![node.id, node.index, node.name, node.node_type, node.desc])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_node_desc(&self, index: &str, id: &str, desc: &str) -> Result<()> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE nodes SET description = ?1 WHERE idx = ?2 AND id = ?3",
                params![desc, index, id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        if count == 0 {
            return Err(Error::NotFound(format!("Node {} in index {}", id, index)));
        }
        Ok(())
    }

    async fn get_node(&self, index: &str, id: &str) -> Result<Option<Node>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM nodes WHERE idx = ?1 AND id = ?2")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![index, id], |row| Ok(Self::row_to_node(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    async fn get_nodes_by_ids(&self, index: &str, ids: &[String]) -> Result<Vec<Node>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
        let all = self.get_nodes_by_index(index).await?;
        Ok(all
            .into_iter()
            .filter(|n| wanted.contains(n.id.as_str()))
            .collect())
    }

    async fn get_nodes_by_index(&self, index: &str) -> Result<Vec<Node>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM nodes WHERE idx = ?1 ORDER BY name")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![index], |row| Ok(Self::row_to_node(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn delete_nodes_by_index(&self, index: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM nodes WHERE idx = ?1", params![index])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn add_edge(&self, edge: &Edge) -> Result<()> {
        if edge.source == edge.target {
            return Err(Error::Integrity(format!(
                "Self-loop rejected on node {}",
                edge.source
            )));
        }
        let conn = self.conn.lock();
        if !Self::node_exists(&conn, &edge.index, &edge.source)?
            || !Self::node_exists(&conn, &edge.index, &edge.target)?
        {
            return Err(Error::Integrity(format!(
                "Edge {} -> {} references a missing node in index {}",
                edge.source, edge.target, edge.index
            )));
        }
        conn.prepare_cached(
            "INSERT INTO edges (id, idx, source, target, relationship) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            edge.id,
            edge.index,
            edge.source,
            edge.target,
            edge.relationship
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_edge_relationship(
        &self,
        index: &str,
        id: &str,
        relationship: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE edges SET relationship = ?1 WHERE idx = ?2 AND id = ?3",
                params![relationship, index, id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        if count == 0 {
            return Err(Error::NotFound(format!("Edge {} in index {}", id, index)));
        }
        Ok(())
    }

    async fn delete_edge(&self, index: &str, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM edges WHERE idx = ?1 AND id = ?2",
            params![index, id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_edge_between(&self, index: &str, a: &str, b: &str) -> Result<Option<Edge>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached(
                "SELECT * FROM edges WHERE idx = ?1 \
                 AND ((source = ?2 AND target = ?3) OR (source = ?3 AND target = ?2)) \
                 LIMIT 1",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![index, a, b], |row| Ok(Self::row_to_edge(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    async fn get_edges_by_index(&self, index: &str) -> Result<Vec<Edge>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM edges WHERE idx = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![index], |row| Ok(Self::row_to_edge(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn get_edges_by_node_ids(&self, index: &str, ids: &[String]) -> Result<Vec<Edge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
        let all = self.get_edges_by_index(index).await?;
        Ok(all
            .into_iter()
            .filter(|e| wanted.contains(e.source.as_str()) && wanted.contains(e.target.as_str()))
            .collect())
    }

    async fn delete_edges_by_index(&self, index: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM edges WHERE idx = ?1", params![index])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn replace_memberships(
        &self,
        index: &str,
        memberships: &[CommunityMembership],
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute("DELETE FROM community_nodes WHERE idx = ?1", params![index])
            .map_err(|e| Error::Database(e.to_string()))?;
        for m in memberships {
            tx.execute(
                "INSERT INTO community_nodes (idx, community_id, node_id) VALUES (?1, ?2, ?3)",
                params![m.index, m.community_id, m.node_id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_memberships(&self, index: &str) -> Result<Vec<CommunityMembership>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT idx, community_id, node_id FROM community_nodes WHERE idx = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![index], |row| {
                Ok(CommunityMembership {
                    index: row.get(0)?,
                    community_id: row.get(1)?,
                    node_id: row.get(2)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn add_community(&self, community: &Community) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT OR REPLACE INTO communities (community_id, idx, summaries) VALUES (?1, ?2, ?3)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            community.community_id,
            community.index,
            community.summaries
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_communities(&self, index: &str) -> Result<Vec<Community>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT community_id, idx, summaries FROM communities WHERE idx = ?1 \
                 ORDER BY community_id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![index], |row| {
                Ok(Community {
                    community_id: row.get(0)?,
                    index: row.get(1)?,
                    summaries: row.get(2)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn delete_communities_by_index(&self, index: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM communities WHERE idx = ?1", params![index])
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute("DELETE FROM community_nodes WHERE idx = ?1", params![index])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn upsert_global(&self, global: &GlobalSummary) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached("INSERT OR REPLACE INTO globals (idx, summaries) VALUES (?1, ?2)")
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![global.index, global.summaries])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_global(&self, index: &str) -> Result<Option<GlobalSummary>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT idx, summaries FROM globals WHERE idx = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![index], |row| {
                Ok(GlobalSummary {
                    index: row.get(0)?,
                    summaries: row.get(1)?,
                })
            })
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    async fn delete_global(&self, index: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM globals WHERE idx = ?1", params![index])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
