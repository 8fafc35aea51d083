//! Database schema SQL for the result store.
//!
//! Tables are created with `IF NOT EXISTS`, so opening a database written by
//! an older build leaves its tables untouched; [`ADDED_COLUMNS`] then brings
//! those tables up to date. Indexes come last because some of them cover
//! columns that only exist after the additive pass.

/// Runs, per-group results, per-side singles and group metadata.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    requested_ticket TEXT,
    total_groups INTEGER NOT NULL DEFAULT 0,
    processed_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'in_progress',
    completed_at TEXT,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS cluster_results (
    result_id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(run_id),
    group_id TEXT NOT NULL,
    processed_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'success',
    error_message TEXT,
    total_savings REAL NOT NULL DEFAULT 0,
    savings_percent REAL NOT NULL DEFAULT 0,
    total_instance_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(run_id, group_id)
);

CREATE TABLE IF NOT EXISTS cluster_singles (
    single_id INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id INTEGER NOT NULL REFERENCES cluster_results(result_id) ON DELETE CASCADE,
    cluster_id TEXT NOT NULL,
    side TEXT NOT NULL CHECK (side IN ('current', 'optimal')),
    infrastructure_json TEXT NOT NULL,
    instance_price REAL NOT NULL CHECK (instance_price >= 0),
    storage_price REAL NOT NULL CHECK (storage_price >= 0),
    total_price REAL NOT NULL CHECK (total_price >= 0),
    instance_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS cluster_metadata (
    group_id TEXT PRIMARY KEY,
    name TEXT,
    cloud_provider TEXT,
    region TEXT,
    software_version TEXT,
    creation_date TEXT,
    account_id TEXT,
    engine_version TEXT,
    multi_az INTEGER,
    availability_zones TEXT,
    storage_type TEXT,
    shards_count INTEGER,
    max_shards_count INTEGER,
    total_storage_gb INTEGER,
    data_nodes_count INTEGER,
    quorum_nodes_count INTEGER,
    total_nodes_count INTEGER,
    os_version TEXT,
    rof_enabled INTEGER,
    last_updated TEXT
);
"#;

/// Columns introduced after the first schema version, as
/// `(table, column, declaration)`. All are nullable or defaulted so
/// `ALTER TABLE ... ADD COLUMN` succeeds on populated tables.
pub const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("runs", "notes", "TEXT"),
    (
        "cluster_results",
        "total_instance_count",
        "INTEGER NOT NULL DEFAULT 0",
    ),
    ("cluster_singles", "instance_count", "INTEGER NOT NULL DEFAULT 0"),
    ("cluster_metadata", "software_version", "TEXT"),
    ("cluster_metadata", "creation_date", "TEXT"),
    ("cluster_metadata", "shards_count", "INTEGER"),
    ("cluster_metadata", "max_shards_count", "INTEGER"),
    ("cluster_metadata", "total_storage_gb", "INTEGER"),
    ("cluster_metadata", "data_nodes_count", "INTEGER"),
    ("cluster_metadata", "quorum_nodes_count", "INTEGER"),
    ("cluster_metadata", "total_nodes_count", "INTEGER"),
    ("cluster_metadata", "os_version", "TEXT"),
    ("cluster_metadata", "rof_enabled", "INTEGER"),
    ("cluster_metadata", "last_updated", "TEXT"),
];

/// Indexes backing the dashboard's filter and sort queries.
pub const INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_runs_status_started ON runs(status, started_at DESC);
CREATE INDEX IF NOT EXISTS idx_cluster_results_run_id ON cluster_results(run_id);
CREATE INDEX IF NOT EXISTS idx_cluster_results_group_id ON cluster_results(group_id);
CREATE INDEX IF NOT EXISTS idx_cluster_results_savings ON cluster_results(total_savings DESC);
CREATE INDEX IF NOT EXISTS idx_cluster_results_run_status ON cluster_results(run_id, status);
CREATE INDEX IF NOT EXISTS idx_cluster_singles_result_id ON cluster_singles(result_id);
CREATE INDEX IF NOT EXISTS idx_cluster_metadata_filters
    ON cluster_metadata(cloud_provider, region, software_version);
"#;
