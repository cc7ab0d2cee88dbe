//! SQL schema for the relational adapter.

pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    idx TEXT NOT NULL,
    name TEXT NOT NULL,
    node_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_nodes_idx ON nodes(idx);
CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(idx, name);

CREATE TABLE IF NOT EXISTS edges (
    id TEXT PRIMARY KEY,
    idx TEXT NOT NULL,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    relationship TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_edges_idx ON edges(idx);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(idx, source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(idx, target);

CREATE TABLE IF NOT EXISTS communities (
    community_id TEXT NOT NULL,
    idx TEXT NOT NULL,
    summaries TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (community_id, idx)
);

CREATE TABLE IF NOT EXISTS community_nodes (
    idx TEXT NOT NULL,
    community_id TEXT NOT NULL,
    node_id TEXT NOT NULL,
    PRIMARY KEY (idx, community_id, node_id)
);

CREATE INDEX IF NOT EXISTS idx_community_nodes_idx ON community_nodes(idx);

CREATE TABLE IF NOT EXISTS globals (
    idx TEXT PRIMARY KEY,
    summaries TEXT NOT NULL DEFAULT ''
);
";
