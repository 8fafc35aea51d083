//! SQLite result store for optimization runs.
//!
//! Each logical unit of work is its own transaction: one group's result rows
//! together with the run counter they bump, one metadata upsert, one run
//! finalization. A crash between units never leaves a half-written group.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info, warn};

use crate::schema::{ADDED_COLUMNS, INDEX_SQL, SCHEMA_SQL};
use crate::types::*;
use costplan_core::{
    ClusterMetadata, ClusterPair, ComparisonResult, Error, Price, Result, ResultStatus,
    RunStatus, SavingsMetrics, Side, SingleCluster,
};

/// Per-result sums of single prices by side.
const SIDE_TOTALS: &str = "(SELECT result_id,
        SUM(CASE WHEN side = 'current' THEN total_price ELSE 0 END) AS current_price,
        SUM(CASE WHEN side = 'optimal' THEN total_price ELSE 0 END) AS optimal_price
    FROM cluster_singles GROUP BY result_id)";

const INSERT_SINGLE_SQL: &str = "INSERT INTO cluster_singles
    (result_id, cluster_id, side, infrastructure_json,
     instance_price, storage_price, total_price, instance_count)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// SQLite store owning the run/result schema.
pub struct ResultStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn now_iso() -> String {
    timestamp(Utc::now())
}

/// Read a text column and parse it into one of the status enums.
fn parse_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e: Error| {
        let idx = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

impl ResultStore {
    /// Open or create the store at `db_path`, migrating older schemas.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path).map_err(db_err)?;
        Self::configure(&conn, true)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "ResultStore initialized: {} runs, path={}",
            store.count_runs()?,
            store.db_path.display()
        );

        Ok(store)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::configure(&conn, false)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn configure(conn: &Connection, wal: bool) -> Result<()> {
        conn.busy_timeout(Duration::from_secs(30)).map_err(db_err)?;
        if wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(db_err)?;
        }
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let added = Self::add_missing_columns(conn)?;
        if added > 0 {
            info!("Schema migrated: {} column(s) added", added);
        }

        conn.execute_batch(INDEX_SQL)
            .map_err(|e| Error::Database(format!("Index init failed: {}", e)))?;
        Ok(())
    }

    /// Add every column of [`ADDED_COLUMNS`] the existing tables lack.
    fn add_missing_columns(conn: &Connection) -> Result<usize> {
        let mut known: HashMap<&str, Vec<String>> = HashMap::new();
        let mut added = 0;

        for &(table, column, decl) in ADDED_COLUMNS {
            let columns = match known.entry(table) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(Self::column_names(conn, table)?),
            };
            if columns.iter().any(|c| c == column) {
                continue;
            }

            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table, column, decl
            ))
            .map_err(|e| Error::Database(format!("Adding {}.{} failed: {}", table, column, e)))?;
            debug!("Added column {}.{}", table, column);
            columns.push(column.to_string());
            added += 1;
        }

        Ok(added)
    }

    fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(db_err)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>("name"))
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(names)
    }

    // ---------------------------------------------------------------
    // Runs
    // ---------------------------------------------------------------

    /// Create an `in_progress` run. Returns the new run ID.
    pub fn begin_run(&self, total_groups: usize, ticket: Option<&str>) -> Result<i64> {
        self.begin_run_at(total_groups, ticket, Utc::now())
    }

    fn begin_run_at(
        &self,
        total_groups: usize,
        ticket: Option<&str>,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO runs (started_at, requested_ticket, total_groups, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                timestamp(started_at),
                ticket,
                total_groups as i64,
                RunStatus::InProgress.as_str()
            ],
        )
        .map_err(db_err)?;
        let run_id = conn.last_insert_rowid();
        info!("Run created: {}", run_id);
        Ok(run_id)
    }

    /// Set the number of groups a run will cover once discovery is done.
    pub fn set_run_total(&self, run_id: i64, total_groups: usize) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE runs SET total_groups = ?1
                 WHERE run_id = ?2 AND status = 'in_progress'
                   AND processed_count + failed_count <= ?1",
                params![total_groups as i64, run_id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(Error::Database(format!(
                "cannot set total_groups={} on run {}",
                total_groups, run_id
            )));
        }
        Ok(())
    }

    /// Set a terminal status and the completion time.
    ///
    /// A run can only be marked `completed` once every group is recorded.
    pub fn finalize_run(&self, run_id: i64, status: RunStatus, notes: Option<&str>) -> Result<()> {
        if !status.is_terminal() {
            return Err(Error::Internal(format!(
                "finalize_run called with non-terminal status {}",
                status
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let run = Self::query_run(&tx, run_id)?
            .ok_or_else(|| Error::NotFound(format!("run {}", run_id)))?;
        if status == RunStatus::Completed && run.remaining() != 0 {
            return Err(Error::Database(format!(
                "run {} cannot complete: {} of {} groups unrecorded",
                run_id,
                run.remaining(),
                run.total_groups
            )));
        }

        tx.execute(
            "UPDATE runs SET status = ?1, completed_at = ?2, notes = COALESCE(?3, notes)
             WHERE run_id = ?4",
            params![status.as_str(), now_iso(), notes, run_id],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        info!("Run {} finalized as {}", run_id, status);
        Ok(())
    }

    /// Mark `in_progress` runs started more than `older_than` ago as failed.
    pub fn fail_stale_runs(&self, older_than: Duration) -> Result<usize> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| Error::Config(format!("stale run threshold out of range: {}", e)))?;
        self.fail_runs_started_before(Utc::now() - age)
    }

    fn fail_runs_started_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE runs SET status = 'failed', completed_at = ?1,
                        notes = 'abandoned while in progress'
                 WHERE status = 'in_progress' AND started_at < ?2",
                params![now_iso(), timestamp(cutoff)],
            )
            .map_err(db_err)?;
        if count > 0 {
            warn!("Marked {} stale run(s) as failed", count);
        }
        Ok(count)
    }

    /// Get a run by ID.
    pub fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        let conn = self.conn.lock();
        Self::query_run(&conn, run_id)
    }

    fn query_run(conn: &Connection, run_id: i64) -> Result<Option<RunRecord>> {
        conn.prepare_cached("SELECT * FROM runs WHERE run_id = ?1")
            .map_err(db_err)?
            .query_row(params![run_id], Self::row_to_run)
            .optional()
            .map_err(db_err)
    }

    /// Most recent run, optionally restricted to one status.
    pub fn latest_run(&self, status: Option<RunStatus>) -> Result<Option<RunRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM runs WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY started_at DESC, run_id DESC LIMIT 1",
            )
            .map_err(db_err)?;
        let run = stmt
            .query_row(params![status.map(RunStatus::as_str)], Self::row_to_run)
            .optional()
            .map_err(db_err)?;
        Ok(run)
    }

    /// Newest runs first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM runs ORDER BY started_at DESC, run_id DESC LIMIT ?1")
            .map_err(db_err)?;
        let runs = stmt
            .query_map(params![limit as i64], Self::row_to_run)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(runs)
    }

    pub fn count_runs(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
            .map_err(db_err)
    }

    // ---------------------------------------------------------------
    // Group results
    // ---------------------------------------------------------------

    /// Record a successful comparison: the result row, two singles per pair
    /// and the run's processed counter, atomically. Returns the result ID.
    pub fn record_group_success(
        &self,
        run_id: i64,
        comparison: &ComparisonResult,
        metrics: &SavingsMetrics,
    ) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "INSERT INTO cluster_results
             (run_id, group_id, processed_at, status, total_savings, savings_percent,
              total_instance_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                comparison.group_id,
                now_iso(),
                ResultStatus::Success.as_str(),
                metrics.total_savings,
                metrics.savings_percent,
                metrics.total_instance_count as i64
            ],
        )
        .map_err(db_err)?;
        let result_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare_cached(INSERT_SINGLE_SQL).map_err(db_err)?;
            for pair in &comparison.pairs {
                for (side, single) in [(Side::Current, &pair.current), (Side::Optimal, &pair.optimal)] {
                    let infrastructure_json = serde_json::to_string(&single.infrastructure)?;
                    stmt.execute(params![
                        result_id,
                        single.id,
                        side.as_str(),
                        infrastructure_json,
                        single.price.instance,
                        single.price.storage,
                        single.price.total(),
                        single.instance_count() as i64
                    ])
                    .map_err(db_err)?;
                }
            }
        }

        Self::bump_counter(&tx, run_id, ResultStatus::Success)?;
        tx.commit().map_err(db_err)?;

        debug!(
            "Recorded {} for run {}: {} pair(s), savings={:.2}",
            comparison.group_id,
            run_id,
            comparison.pairs.len(),
            metrics.total_savings
        );
        Ok(result_id)
    }

    /// Record a failed group and bump the run's failed counter, atomically.
    pub fn record_group_failure(&self, run_id: i64, group_id: &str, error_message: &str) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "INSERT INTO cluster_results (run_id, group_id, processed_at, status, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                group_id,
                now_iso(),
                ResultStatus::Failure.as_str(),
                error_message
            ],
        )
        .map_err(db_err)?;
        let result_id = tx.last_insert_rowid();

        Self::bump_counter(&tx, run_id, ResultStatus::Failure)?;
        tx.commit().map_err(db_err)?;
        Ok(result_id)
    }

    /// Increment the counter matching `outcome`. Refuses when the run is
    /// missing, already finalized, or every group is already accounted for.
    fn bump_counter(tx: &Transaction<'_>, run_id: i64, outcome: ResultStatus) -> Result<()> {
        let column = match outcome {
            ResultStatus::Success => "processed_count",
            ResultStatus::Failure => "failed_count",
        };
        let sql = format!(
            "UPDATE runs SET {col} = {col} + 1
             WHERE run_id = ?1 AND status = 'in_progress'
               AND processed_count + failed_count < total_groups",
            col = column
        );
        let updated = tx.execute(&sql, params![run_id]).map_err(db_err)?;
        if updated == 0 {
            return Err(Error::Database(format!(
                "run {} is not accepting results (missing, finalized or at capacity)",
                run_id
            )));
        }
        Ok(())
    }

    /// Rebuild the stored comparison of a successful group.
    pub fn load_comparison(&self, run_id: i64, group_id: &str) -> Result<Option<ComparisonResult>> {
        let conn = self.conn.lock();
        let result_id: Option<i64> = conn
            .prepare_cached(
                "SELECT result_id FROM cluster_results
                 WHERE run_id = ?1 AND group_id = ?2 AND status = 'success'",
            )
            .map_err(db_err)?
            .query_row(params![run_id, group_id], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        let Some(result_id) = result_id else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare_cached(
                "SELECT cluster_id, side, infrastructure_json, instance_price, storage_price
                 FROM cluster_singles WHERE result_id = ?1 ORDER BY single_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![result_id], |row| {
                Ok((
                    row.get::<_, String>("cluster_id")?,
                    parse_column::<Side>(row, "side")?,
                    row.get::<_, String>("infrastructure_json")?,
                    row.get::<_, f64>("instance_price")?,
                    row.get::<_, f64>("storage_price")?,
                ))
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        // Keep first-seen cluster order; each cluster has one row per side.
        let mut slots: Vec<(String, Option<SingleCluster>, Option<SingleCluster>)> = Vec::new();
        for (cluster_id, side, infra_json, instance, storage) in rows {
            let single = SingleCluster::new(
                cluster_id.clone(),
                serde_json::from_str(&infra_json)?,
                Price::new(storage, instance),
            );
            let idx = match slots.iter().position(|(id, _, _)| *id == cluster_id) {
                Some(idx) => idx,
                None => {
                    slots.push((cluster_id, None, None));
                    slots.len() - 1
                }
            };
            match side {
                Side::Current => slots[idx].1 = Some(single),
                Side::Optimal => slots[idx].2 = Some(single),
            }
        }

        let pairs = slots
            .into_iter()
            .map(|(id, current, optimal)| match (current, optimal) {
                (Some(current), Some(optimal)) => Ok(ClusterPair { current, optimal }),
                _ => Err(Error::Database(format!(
                    "result {} has an incomplete pair for cluster {}",
                    result_id, id
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(ComparisonResult {
            group_id: group_id.to_string(),
            pairs,
        }))
    }

    // ---------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------

    /// Insert or replace the metadata row for a group.
    pub fn upsert_metadata(&self, meta: &ClusterMetadata) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO cluster_metadata
             (group_id, name, cloud_provider, region, software_version, creation_date,
              account_id, engine_version, multi_az, availability_zones, storage_type,
              shards_count, max_shards_count, total_storage_gb, data_nodes_count,
              quorum_nodes_count, total_nodes_count, os_version, rof_enabled, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                meta.group_id,
                meta.name,
                meta.cloud_provider,
                meta.region,
                meta.software_version,
                meta.creation_date,
                meta.account_id,
                meta.engine_version,
                meta.multi_az,
                meta.availability_zones,
                meta.storage_type,
                meta.shards_count,
                meta.max_shards_count,
                meta.total_storage_gb,
                meta.data_nodes_count,
                meta.quorum_nodes_count,
                meta.total_nodes_count,
                meta.os_version,
                meta.rof_enabled,
                now_iso()
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn get_metadata(&self, group_id: &str) -> Result<Option<ClusterMetadata>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM cluster_metadata WHERE group_id = ?1")
            .map_err(db_err)?;
        let meta = stmt
            .query_row(params![group_id], |row| {
                Self::row_to_metadata(row, row.get("group_id")?)
            })
            .optional()
            .map_err(db_err)?;
        Ok(meta)
    }

    // ---------------------------------------------------------------
    // Reporting queries
    // ---------------------------------------------------------------

    fn group_report_sql(filter: &str, order: &str) -> String {
        format!(
            "SELECT cr.result_id, cr.run_id, cr.group_id, cr.processed_at, cr.status,
                    cr.error_message, cr.total_savings, cr.savings_percent,
                    cr.total_instance_count,
                    COALESCE(s.current_price, 0) AS current_price,
                    COALESCE(s.optimal_price, 0) AS optimal_price,
                    cm.group_id AS meta_group_id, cm.name, cm.cloud_provider, cm.region,
                    cm.software_version, cm.creation_date, cm.account_id, cm.engine_version,
                    cm.multi_az, cm.availability_zones, cm.storage_type, cm.shards_count,
                    cm.max_shards_count, cm.total_storage_gb, cm.data_nodes_count,
                    cm.quorum_nodes_count, cm.total_nodes_count, cm.os_version,
                    cm.rof_enabled
             FROM cluster_results cr
             LEFT JOIN {totals} s ON s.result_id = cr.result_id
             LEFT JOIN cluster_metadata cm ON cm.group_id = cr.group_id
             WHERE {filter}
             ORDER BY {order}",
            totals = SIDE_TOTALS,
            filter = filter,
            order = order
        )
    }

    /// Every result of a run in processing order, joined with metadata.
    pub fn results_for_run(&self, run_id: i64) -> Result<Vec<GroupReport>> {
        let sql = Self::group_report_sql("cr.run_id = ?1", "cr.result_id");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
        let reports = stmt
            .query_map(params![run_id], Self::row_to_group_report)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(reports)
    }

    /// Successful results ordered by savings, largest first. Defaults to the
    /// latest completed run; an empty store yields no rows.
    pub fn top_savings(&self, run_id: Option<i64>, limit: Option<usize>) -> Result<Vec<GroupReport>> {
        let run_id = match run_id {
            Some(id) => id,
            None => match self.latest_run(Some(RunStatus::Completed))? {
                Some(run) => run.run_id,
                None => return Ok(Vec::new()),
            },
        };
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let sql = Self::group_report_sql(
            "cr.run_id = ?1 AND cr.status = 'success'",
            "cr.total_savings DESC, cr.result_id LIMIT ?2",
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
        let reports = stmt
            .query_map(params![run_id, limit], Self::row_to_group_report)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(reports)
    }

    /// Successful results for one group across runs, newest first.
    pub fn group_history(&self, group_id: &str, limit: usize) -> Result<Vec<HistoryPoint>> {
        let sql = format!(
            "SELECT r.run_id, r.started_at, r.requested_ticket,
                    cr.total_savings, cr.savings_percent,
                    COALESCE(s.current_price, 0) AS current_price,
                    COALESCE(s.optimal_price, 0) AS optimal_price
             FROM cluster_results cr
             JOIN runs r ON r.run_id = cr.run_id
             LEFT JOIN {} s ON s.result_id = cr.result_id
             WHERE cr.group_id = ?1 AND cr.status = 'success'
             ORDER BY r.started_at DESC, r.run_id DESC
             LIMIT ?2",
            SIDE_TOTALS
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
        let history = stmt
            .query_map(params![group_id, limit as i64], |row| {
                Ok(HistoryPoint {
                    run_id: row.get("run_id")?,
                    started_at: row.get("started_at")?,
                    requested_ticket: row.get("requested_ticket")?,
                    current_price: row.get("current_price")?,
                    optimal_price: row.get("optimal_price")?,
                    total_savings: row.get("total_savings")?,
                    savings_percent: row.get("savings_percent")?,
                })
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(history)
    }

    /// Savings totals of completed runs, newest first.
    pub fn savings_trend(&self, limit: usize) -> Result<Vec<TrendPoint>> {
        let sql = format!(
            "SELECT r.run_id, r.started_at, r.requested_ticket,
                    COUNT(cr.result_id) AS group_count,
                    COALESCE(SUM(cr.total_savings), 0) AS total_savings,
                    COALESCE(SUM(s.current_price), 0) AS total_current,
                    COALESCE(SUM(s.optimal_price), 0) AS total_optimal
             FROM runs r
             JOIN cluster_results cr ON cr.run_id = r.run_id AND cr.status = 'success'
             LEFT JOIN {} s ON s.result_id = cr.result_id
             WHERE r.status = 'completed'
             GROUP BY r.run_id
             ORDER BY r.started_at DESC, r.run_id DESC
             LIMIT ?1",
            SIDE_TOTALS
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
        let trend = stmt
            .query_map(params![limit as i64], |row| {
                let total_current: f64 = row.get("total_current")?;
                let total_savings: f64 = row.get("total_savings")?;
                Ok(TrendPoint {
                    run_id: row.get("run_id")?,
                    started_at: row.get("started_at")?,
                    requested_ticket: row.get("requested_ticket")?,
                    group_count: row.get("group_count")?,
                    total_current,
                    total_optimal: row.get("total_optimal")?,
                    total_savings,
                    savings_percent: if total_current > 0.0 {
                        total_savings / total_current * 100.0
                    } else {
                        0.0
                    },
                })
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(trend)
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            run_id: row.get("run_id")?,
            started_at: row.get("started_at")?,
            requested_ticket: row.get("requested_ticket")?,
            total_groups: row.get("total_groups")?,
            processed_count: row.get("processed_count")?,
            failed_count: row.get("failed_count")?,
            status: parse_column(row, "status")?,
            completed_at: row.get("completed_at")?,
            notes: row.get("notes")?,
        })
    }

    fn row_to_metadata(row: &Row<'_>, group_id: String) -> rusqlite::Result<ClusterMetadata> {
        Ok(ClusterMetadata {
            group_id,
            name: row.get("name")?,
            cloud_provider: row.get("cloud_provider")?,
            region: row.get("region")?,
            software_version: row.get("software_version")?,
            creation_date: row.get("creation_date")?,
            account_id: row.get("account_id")?,
            engine_version: row.get("engine_version")?,
            multi_az: row.get("multi_az")?,
            availability_zones: row.get("availability_zones")?,
            storage_type: row.get("storage_type")?,
            shards_count: row.get("shards_count")?,
            max_shards_count: row.get("max_shards_count")?,
            total_storage_gb: row.get("total_storage_gb")?,
            data_nodes_count: row.get("data_nodes_count")?,
            quorum_nodes_count: row.get("quorum_nodes_count")?,
            total_nodes_count: row.get("total_nodes_count")?,
            os_version: row.get("os_version")?,
            rof_enabled: row.get("rof_enabled")?,
        })
    }

    fn row_to_group_report(row: &Row<'_>) -> rusqlite::Result<GroupReport> {
        let metadata = match row.get::<_, Option<String>>("meta_group_id")? {
            Some(group_id) => Some(Self::row_to_metadata(row, group_id)?),
            None => None,
        };
        Ok(GroupReport {
            result_id: row.get("result_id")?,
            run_id: row.get("run_id")?,
            group_id: row.get("group_id")?,
            processed_at: row.get("processed_at")?,
            status: parse_column(row, "status")?,
            error_message: row.get("error_message")?,
            total_savings: row.get("total_savings")?,
            savings_percent: row.get("savings_percent")?,
            total_instance_count: row.get("total_instance_count")?,
            current_price: row.get("current_price")?,
            optimal_price: row.get("optimal_price")?,
            metadata,
        })
    }
}
