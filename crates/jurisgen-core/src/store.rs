//! SQLite-backed contract record store.
//!
//! Every mutation loads the row, applies the lifecycle rules and writes it back
//! while holding the connection lock, so concurrent updates to one record are
//! serialized and the last writer wins.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::lifecycle::{self, ContractStatus, StateTransitionError, StatusChange};
use crate::validate::ValidatedRequest;
use crate::{ContractRecord, ContractType, GeneratedContract, Jurisdiction, Metadata};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contracts (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    jurisdiction      TEXT NOT NULL CHECK (jurisdiction IN ('india', 'eu', 'us')),
    contract_type     TEXT NOT NULL CHECK (contract_type IN ('escrow', 'insurance', 'settlement')),
    requirements      TEXT NOT NULL CHECK (length(trim(requirements)) > 0),
    description       TEXT,
    payee_address     TEXT,
    payer_address     TEXT,
    solidity_code     TEXT NOT NULL DEFAULT '',
    deploy_script     TEXT NOT NULL DEFAULT '',
    tests             TEXT NOT NULL DEFAULT '',
    metadata          TEXT NOT NULL DEFAULT '{}',
    status            TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'deployed', 'failed')),
    transaction_hash  TEXT,
    contract_address  TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    CHECK (
        (status = 'deployed' AND transaction_hash IS NOT NULL AND contract_address IS NOT NULL)
        OR (status <> 'deployed' AND transaction_hash IS NULL AND contract_address IS NULL)
    )
);

CREATE INDEX IF NOT EXISTS idx_contracts_status ON contracts(status);
CREATE INDEX IF NOT EXISTS idx_contracts_jurisdiction ON contracts(jurisdiction);
CREATE INDEX IF NOT EXISTS idx_contracts_type ON contracts(contract_type);
CREATE INDEX IF NOT EXISTS idx_contracts_created ON contracts(created_at);
";

const COLUMNS: &str = "id, jurisdiction, contract_type, requirements, description, \
payee_address, payer_address, solidity_code, deploy_script, tests, metadata, status, \
transaction_hash, contract_address, created_at, updated_at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt contract row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("contract {0} not found")]
    NotFound(i64),
    #[error("contract {id}: {source}")]
    Transition {
        id: i64,
        source: StateTransitionError,
    },
    #[error("contract store lock poisoned")]
    Poisoned,
}

/// Optional equality filters for listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractFilter {
    pub jurisdiction: Option<Jurisdiction>,
    pub contract_type: Option<ContractType>,
    pub status: Option<ContractStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub draft: u64,
    pub deployed: u64,
    pub failed: u64,
    pub total: u64,
}

#[derive(Clone)]
pub struct ContractStore {
    conn: Arc<Mutex<Connection>>,
}

impl ContractStore {
    /// Open or create the database file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("opening contract database at {}", path.display());
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!(journal_mode = %mode, "sqlite journal mode set");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        debug!("contract schema initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // --- Create ---

    /// Persist a successfully generated contract. New records are always drafts.
    pub fn insert_draft(
        &self,
        request: &ValidatedRequest,
        generated: &GeneratedContract,
    ) -> Result<ContractRecord, StoreError> {
        let conn = self.lock()?;
        let now = timestamp(crate::now());
        let metadata = serde_json::to_string(&generated.metadata)?;
        conn.execute(
            "INSERT INTO contracts (jurisdiction, contract_type, requirements, description,
                payee_address, payer_address, solidity_code, deploy_script, tests, metadata,
                status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'draft', ?11, ?11)",
            params![
                request.jurisdiction.as_str(),
                request.contract_type.as_str(),
                request.requirements,
                request.description,
                request.payee_address,
                request.payer_address,
                generated.solidity_code,
                generated.deploy_script,
                generated.tests,
                metadata,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(contract_id = id, "contract inserted");
        get_sync(&conn, id)?.ok_or(StoreError::Corrupt {
            id,
            reason: "row missing after insert".into(),
        })
    }

    // --- Read ---

    pub fn get(&self, id: i64) -> Result<Option<ContractRecord>, StoreError> {
        let conn = self.lock()?;
        get_sync(&conn, id)
    }

    /// Records matching `filter`, newest first.
    pub fn list(&self, filter: &ContractFilter) -> Result<Vec<ContractRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM contracts
             WHERE (?1 IS NULL OR jurisdiction = ?1)
               AND (?2 IS NULL OR contract_type = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.jurisdiction.map(Jurisdiction::as_str),
                filter.contract_type.map(ContractType::as_str),
                filter.status.map(ContractStatus::as_str),
            ],
            read_row,
        )?;
        let records = rows
            .map(|row| ContractRecord::try_from(row?))
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(records)
    }

    pub fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM contracts GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            let n = n.max(0) as u64;
            match status.parse::<ContractStatus>() {
                Ok(ContractStatus::Draft) => counts.draft = n,
                Ok(ContractStatus::Deployed) => counts.deployed = n,
                Ok(ContractStatus::Failed) => counts.failed = n,
                Err(_) => {}
            }
            counts.total += n;
        }
        Ok(counts)
    }

    // --- Mutate ---

    pub fn update_status(&self, id: i64, change: StatusChange) -> Result<ContractRecord, StoreError> {
        self.mutate(id, |record, now| {
            lifecycle::apply(record, change, now).map_err(|source| StoreError::Transition { id, source })
        })
    }

    /// Swap in a fresh generation result for a failed record, returning it to draft.
    pub fn replace_generation(
        &self,
        id: i64,
        generated: &GeneratedContract,
    ) -> Result<ContractRecord, StoreError> {
        self.mutate(id, |record, now| {
            lifecycle::apply(record, StatusChange::Retry, now)
                .map_err(|source| StoreError::Transition { id, source })?;
            record.solidity_code = generated.solidity_code.clone();
            record.deploy_script = generated.deploy_script.clone();
            record.tests = generated.tests.clone();
            record.metadata = generated.metadata.clone();
            Ok(())
        })
    }

    /// Record why the latest attempt on a failed record failed, without
    /// changing status. Returns `None` when the record is no longer failed.
    pub fn note_failure(&self, id: i64, reason: &str) -> Result<Option<ContractRecord>, StoreError> {
        let conn = self.lock()?;
        let mut record = get_sync(&conn, id)?.ok_or(StoreError::NotFound(id))?;
        if record.status != ContractStatus::Failed {
            debug!(contract_id = id, status = %record.status, "failure not noted");
            return Ok(None);
        }
        record
            .metadata
            .insert("failure_reason".into(), reason.to_string().into());
        lifecycle::touch(&mut record, crate::now());
        write_sync(&conn, &record)?;
        Ok(Some(record))
    }

    fn mutate<F>(&self, id: i64, f: F) -> Result<ContractRecord, StoreError>
    where
        F: FnOnce(&mut ContractRecord, DateTime<Utc>) -> Result<(), StoreError>,
    {
        let conn = self.lock()?;
        let mut record = get_sync(&conn, id)?.ok_or(StoreError::NotFound(id))?;
        f(&mut record, crate::now())?;
        write_sync(&conn, &record)?;
        debug!(contract_id = id, status = %record.status, "contract updated");
        Ok(record)
    }
}

fn get_sync(conn: &Connection, id: i64) -> Result<Option<ContractRecord>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM contracts WHERE id = ?1"),
            params![id],
            read_row,
        )
        .optional()?;
    raw.map(ContractRecord::try_from).transpose()
}

fn write_sync(conn: &Connection, record: &ContractRecord) -> Result<(), StoreError> {
    let metadata = serde_json::to_string(&record.metadata)?;
    let changed = conn.execute(
        "UPDATE contracts SET solidity_code = ?2, deploy_script = ?3, tests = ?4, metadata = ?5,
            status = ?6, transaction_hash = ?7, contract_address = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            record.id,
            record.solidity_code,
            record.deploy_script,
            record.tests,
            metadata,
            record.status.as_str(),
            record.transaction_hash,
            record.contract_address,
            timestamp(record.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(record.id));
    }
    Ok(())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct RawRow {
    id: i64,
    jurisdiction: String,
    contract_type: String,
    requirements: String,
    description: Option<String>,
    payee_address: Option<String>,
    payer_address: Option<String>,
    solidity_code: String,
    deploy_script: String,
    tests: String,
    metadata: String,
    status: String,
    transaction_hash: Option<String>,
    contract_address: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        jurisdiction: row.get(1)?,
        contract_type: row.get(2)?,
        requirements: row.get(3)?,
        description: row.get(4)?,
        payee_address: row.get(5)?,
        payer_address: row.get(6)?,
        solidity_code: row.get(7)?,
        deploy_script: row.get(8)?,
        tests: row.get(9)?,
        metadata: row.get(10)?,
        status: row.get(11)?,
        transaction_hash: row.get(12)?,
        contract_address: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

impl TryFrom<RawRow> for ContractRecord {
    type Error = StoreError;

    fn try_from(raw: RawRow) -> Result<Self, Self::Error> {
        let id = raw.id;
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };
        let parse_time = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| corrupt(format!("bad timestamp '{s}': {e}")))
        };
        let metadata: Metadata = if raw.metadata.trim().is_empty() {
            Metadata::new()
        } else {
            serde_json::from_str(&raw.metadata)?
        };
        Ok(ContractRecord {
            id,
            jurisdiction: raw
                .jurisdiction
                .parse()
                .map_err(|e| corrupt(format!("jurisdiction: {e}")))?,
            contract_type: raw
                .contract_type
                .parse()
                .map_err(|e| corrupt(format!("contract type: {e}")))?,
            requirements: raw.requirements,
            description: raw.description,
            payee_address: raw.payee_address,
            payer_address: raw.payer_address,
            solidity_code: raw.solidity_code,
            deploy_script: raw.deploy_script,
            tests: raw.tests,
            metadata,
            status: raw
                .status
                .parse()
                .map_err(|e| corrupt(format!("status: {e}")))?,
            transaction_hash: raw.transaction_hash,
            contract_address: raw.contract_address,
            created_at: parse_time(&raw.created_at)?,
            updated_at: parse_time(&raw.updated_at)?,
        })
    }
}
