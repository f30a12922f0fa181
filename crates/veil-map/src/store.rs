//! Persistent original-to-pseudonym mappings backed by SQLite.
//!
//! Every pseudonym issuance inserts the mapping and saves the pool cursors in
//! a single transaction, so an interrupted run resumes without re-issuing or
//! skipping names. A candidate rejected by the uniqueness constraint is
//! recorded as invalidated and the next candidate is drawn.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use tracing::{debug, info, warn};
use veil_model::{FingerprintRecord, IdentifierKind, MappingStats};

use crate::error::{MapError, Result};
use crate::pool::PseudonymPool;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS team_mappings (
    original TEXT PRIMARY KEY,
    anonymized TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS run_mappings (
    original TEXT PRIMARY KEY,
    anonymized TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS report_fingerprints (
    fingerprint TEXT PRIMARY KEY,
    original_team TEXT NOT NULL,
    original_run TEXT NOT NULL,
    topic_id TEXT NOT NULL,
    anon_team TEXT NOT NULL,
    anon_run TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS invalidated_names (
    name_type TEXT NOT NULL,
    name TEXT NOT NULL,
    invalidated_at TEXT NOT NULL,
    PRIMARY KEY (name_type, name)
);
";

const SEED_KEY: &str = "seed";
const CREATED_AT_KEY: &str = "created_at";
const TEAM_INDEX_KEY: &str = "team_pool_index";
const RUN_INDEX_KEY: &str = "run_pool_index";

/// A pool candidate that was rejected because it was already in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidatedName {
    pub kind: String,
    pub name: String,
}

pub struct MappingStore {
    conn: Connection,
    path: Option<PathBuf>,
    pool: PseudonymPool,
    run_teams: HashMap<String, String>,
}

impl MappingStore {
    /// Opens (or creates) the store at `path`.
    ///
    /// A new store keeps `seed`, or a random one when `seed` is `None`.
    /// An existing store must be reopened with its stored seed or none.
    pub fn open(path: impl AsRef<Path>, seed: Option<u64>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()), seed)
    }

    pub fn open_in_memory(seed: Option<u64>) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None, seed)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>, seed: Option<u64>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let seed = resolve_seed(&mut conn, seed)?;
        let mut pool = PseudonymPool::new(seed);

        let team_index = read_index(&conn, TEAM_INDEX_KEY)?;
        let run_index = read_index(&conn, RUN_INDEX_KEY)?;
        if let (Some(team_index), Some(run_index)) = (team_index, run_index) {
            pool.set_indices(team_index, run_index)?;
            debug!(team_index, run_index, "restored pseudonym cursors");
        }

        Ok(Self {
            conn,
            path,
            pool,
            run_teams: HashMap::new(),
        })
    }

    pub fn seed(&self) -> u64 {
        self.pool.seed()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_team(&self, original: &str) -> Result<Option<String>> {
        self.lookup(IdentifierKind::Team, original)
    }

    pub fn get_run(&self, original: &str) -> Result<Option<String>> {
        self.lookup(IdentifierKind::Run, original)
    }

    pub fn get_or_create_team(&mut self, original: &str) -> Result<String> {
        self.get_or_create(IdentifierKind::Team, original)
    }

    pub fn get_or_create_run(&mut self, original: &str) -> Result<String> {
        self.get_or_create(IdentifierKind::Run, original)
    }

    pub fn lookup(&self, kind: IdentifierKind, original: &str) -> Result<Option<String>> {
        let sql = format!("SELECT anonymized FROM {} WHERE original = ?1", table(kind));
        Ok(self
            .conn
            .query_row(&sql, params![original], |row| row.get(0))
            .optional()?)
    }

    pub fn get_or_create(&mut self, kind: IdentifierKind, original: &str) -> Result<String> {
        if let Some(existing) = self.lookup(kind, original)? {
            return Ok(existing);
        }

        let insert = format!(
            "INSERT INTO {} (original, anonymized, created_at) VALUES (?1, ?2, ?3)",
            table(kind)
        );
        loop {
            let candidate = self.pool.next(kind)?;
            let now = timestamp();
            let tx = self.conn.transaction()?;
            match tx.execute(&insert, params![original, candidate, now]) {
                Ok(_) => {
                    save_cursors(&tx, &self.pool)?;
                    tx.commit()?;
                    debug!(kind = kind.as_str(), pseudonym = %candidate, "issued pseudonym");
                    return Ok(candidate);
                }
                Err(error) if is_constraint_violation(&error) => {
                    let sql = format!("SELECT anonymized FROM {} WHERE original = ?1", table(kind));
                    let concurrent: Option<String> = tx
                        .query_row(&sql, params![original], |row| row.get(0))
                        .optional()?;
                    tx.execute(
                        "INSERT OR IGNORE INTO invalidated_names (name_type, name, invalidated_at)
                         VALUES (?1, ?2, ?3)",
                        params![kind.as_str(), candidate, now],
                    )?;
                    save_cursors(&tx, &self.pool)?;
                    tx.commit()?;
                    warn!(
                        kind = kind.as_str(),
                        pseudonym = %candidate,
                        "pseudonym already in use, invalidated"
                    );
                    if let Some(existing) = concurrent {
                        return Ok(existing);
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Original identifier for a pseudonym.
    pub fn reverse(&self, kind: IdentifierKind, pseudonym: &str) -> Result<Option<String>> {
        let sql = format!("SELECT original FROM {} WHERE anonymized = ?1", table(kind));
        Ok(self
            .conn
            .query_row(&sql, params![pseudonym], |row| row.get(0))
            .optional()?)
    }

    pub fn get_all_team_mappings(&self) -> Result<BTreeMap<String, String>> {
        self.all_mappings(IdentifierKind::Team)
    }

    pub fn get_all_run_mappings(&self) -> Result<BTreeMap<String, String>> {
        self.all_mappings(IdentifierKind::Run)
    }

    pub fn all_mappings(&self, kind: IdentifierKind) -> Result<BTreeMap<String, String>> {
        let sql = format!("SELECT original, anonymized FROM {}", table(kind));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut mappings = BTreeMap::new();
        for row in rows {
            let (original, anonymized) = row?;
            mappings.insert(original, anonymized);
        }
        Ok(mappings)
    }

    /// Stores a fingerprint; returns `false` when it was already present.
    pub fn store_fingerprint(&self, record: &FingerprintRecord) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO report_fingerprints
             (fingerprint, original_team, original_run, topic_id, anon_team, anon_run, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.fingerprint,
                record.original_team,
                record.original_run,
                record.topic_id,
                record.anon_team,
                record.anon_run,
                timestamp()
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn lookup_fingerprint(&self, fingerprint: &str) -> Result<Option<FingerprintRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT fingerprint, original_team, original_run, topic_id, anon_team, anon_run
                 FROM report_fingerprints WHERE fingerprint = ?1",
                params![fingerprint],
                |row| {
                    Ok(FingerprintRecord {
                        fingerprint: row.get(0)?,
                        original_team: row.get(1)?,
                        original_run: row.get(2)?,
                        topic_id: row.get(3)?,
                        anon_team: row.get(4)?,
                        anon_run: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }

    /// Remembers which team produced a run, for the current session only.
    pub fn store_run_team(&mut self, original_run: &str, original_team: &str) {
        self.run_teams
            .insert(original_run.to_string(), original_team.to_string());
    }

    pub fn get_run_team(&self, original_run: &str) -> Option<&str> {
        self.run_teams.get(original_run).map(String::as_str)
    }

    pub fn invalidated_names(&self) -> Result<Vec<InvalidatedName>> {
        let mut stmt = self.conn.prepare(
            "SELECT name_type, name FROM invalidated_names ORDER BY invalidated_at, name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(InvalidatedName {
                kind: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> Result<MappingStats> {
        Ok(MappingStats {
            teams: self.count("team_mappings")?,
            runs: self.count("run_mappings")?,
            fingerprints: self.count("report_fingerprints")?,
            invalidated_names: self.count("invalidated_names")?,
            teams_remaining: self.pool.teams_remaining(),
            runs_remaining: self.pool.runs_remaining(),
        })
    }

    fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn table(kind: IdentifierKind) -> &'static str {
    match kind {
        IdentifierKind::Team => "team_mappings",
        IdentifierKind::Run => "run_mappings",
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?)
}

fn read_index(conn: &Connection, key: &str) -> Result<Option<usize>> {
    read_meta(conn, key)?
        .map(|value| {
            value.parse::<usize>().map_err(|_| MapError::InvalidState {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

fn resolve_seed(conn: &mut Connection, requested: Option<u64>) -> Result<u64> {
    if let Some(stored) = read_meta(conn, SEED_KEY)? {
        let stored = stored.parse::<u64>().map_err(|_| MapError::InvalidState {
            key: SEED_KEY.to_string(),
            value: stored.clone(),
        })?;
        if let Some(provided) = requested
            && provided != stored
        {
            return Err(MapError::SeedMismatch { stored, provided });
        }
        return Ok(stored);
    }

    let seed = requested.unwrap_or_else(rand::random::<u64>);
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)",
        params![SEED_KEY, seed.to_string()],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        params![CREATED_AT_KEY, timestamp()],
    )?;
    tx.commit()?;
    info!(seed_generated = requested.is_none(), "initialized mapping store");
    Ok(seed)
}

fn save_cursors(tx: &Transaction<'_>, pool: &PseudonymPool) -> Result<()> {
    for (key, value) in [(TEAM_INDEX_KEY, pool.team_cursor()), (RUN_INDEX_KEY, pool.run_cursor())] {
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value.to_string()],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut store = MappingStore::open_in_memory(Some(42)).expect("store");
        let first = store.get_or_create_team("alpha").expect("team");
        let again = store.get_or_create_team("alpha").expect("team");
        assert_eq!(first, again);
        assert_eq!(store.get_team("alpha").expect("lookup"), Some(first.clone()));
        assert_eq!(
            store.reverse(IdentifierKind::Team, &first).expect("reverse"),
            Some("alpha".to_string())
        );
    }

    #[test]
    fn distinct_originals_get_distinct_pseudonyms() {
        let mut store = MappingStore::open_in_memory(Some(1)).expect("store");
        let a = store.get_or_create_run("a").expect("run");
        let b = store.get_or_create_run("b").expect("run");
        assert_ne!(a, b);
        assert_eq!(store.get_all_run_mappings().expect("all").len(), 2);
    }

    #[test]
    fn issuance_follows_pool_order() {
        let mut store = MappingStore::open_in_memory(Some(77)).expect("store");
        let mut pool = PseudonymPool::new(77);
        assert_eq!(
            store.get_or_create_run("x").expect("run"),
            pool.get_run_pseudonym().expect("pool")
        );
        assert_eq!(
            store.get_or_create_team("y").expect("team"),
            pool.get_team_pseudonym().expect("pool")
        );
    }

    #[test]
    fn fingerprint_insert_is_first_write_wins() {
        let store = MappingStore::open_in_memory(Some(5)).expect("store");
        let record = FingerprintRecord {
            fingerprint: "f".repeat(64),
            original_team: "teamA".into(),
            original_run: "run1".into(),
            topic_id: "101".into(),
            anon_team: "T001".into(),
            anon_run: "oak".into(),
        };
        assert!(store.store_fingerprint(&record).expect("store"));
        let duplicate = FingerprintRecord {
            original_team: "other".into(),
            ..record.clone()
        };
        assert!(!store.store_fingerprint(&duplicate).expect("store"));
        assert_eq!(
            store.lookup_fingerprint(&record.fingerprint).expect("lookup"),
            Some(record)
        );
    }

    #[test]
    fn run_team_memory_is_session_scoped() {
        let mut store = MappingStore::open_in_memory(Some(5)).expect("store");
        assert_eq!(store.get_run_team("r"), None);
        store.store_run_team("r", "teamA");
        assert_eq!(store.get_run_team("r"), Some("teamA"));
    }

    #[test]
    fn stats_count_rows_and_remaining_names() {
        let mut store = MappingStore::open_in_memory(Some(2)).expect("store");
        store.get_or_create_team("a").expect("team");
        store.get_or_create_run("b").expect("run");
        let stats = store.stats().expect("stats");
        assert_eq!(stats.teams, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.fingerprints, 0);
        assert_eq!(stats.teams_remaining, crate::pool::TEAM_POOL_SIZE - 1);
    }
}
