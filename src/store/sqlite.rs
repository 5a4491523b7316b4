//! SQLite record store.
//!
//! Reads and corrects rows of the `member_email` table. Every filter value
//! is bound as a statement parameter; nothing user-supplied is ever spliced
//! into SQL text.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{ToSql, ValueRef};
use rusqlite::{params, Connection, Row};

use super::{FetchedRecord, KeyCorrection, RecordFilter, RecordStore, StoredRecord, UnreadableRecord};
use crate::error::{error_codes, KeyfixError, KeyfixResult};
use crate::keyring::Expiration;

// Maximum busy wait time.
const BUSY_WAIT_TIME: Duration = Duration::from_secs(5);

// Stored expiration format, always UTC.
const STORED_INSTANT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Rows whose expiration decodes to `Expiration::Unknown`: NULL, integer 0,
// or any text instant at the epoch ("1970-01-01 00:00:00", RFC 3339 forms).
const UNSET_EXPIRATION_PREDICATE: &str = " AND (pgpkey_expire IS NULL \
     OR (typeof(pgpkey_expire) = 'integer' AND pgpkey_expire = 0) \
     OR (typeof(pgpkey_expire) = 'text' AND unixepoch(trim(pgpkey_expire)) = 0))";

/// `RecordStore` over a SQLite database
pub struct SqliteRecordStore {
    conn: Connection,
}

fn store_error(operation: &'static str, error_code: u32) -> impl Fn(rusqlite::Error) -> KeyfixError {
    move |e| KeyfixError::persistence_failure(operation, &e.to_string(), error_code)
}

/// Render an instant the way the table stores it
pub fn format_stored_instant(instant: DateTime<Utc>) -> String {
    instant.format(STORED_INSTANT_FORMAT).to_string()
}

/// Parse a stored instant; RFC 3339 is accepted as well
pub fn parse_stored_instant(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, STORED_INSTANT_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .map(|at| at.with_timezone(&Utc))
                .ok()
        })
}

fn text_column(row: &Row<'_>, idx: usize) -> Option<String> {
    row.get::<_, Option<String>>(idx).ok().flatten()
}

// Decodes one row; failures are reported per row so a single bad row
// does not hide the others.
fn decode_row(row: &Row<'_>) -> FetchedRecord {
    let owner = text_column(row, 0).unwrap_or_default();
    let address = text_column(row, 1).unwrap_or_default();
    let stored_key_id = text_column(row, 2).unwrap_or_default();

    let unreadable = |cause: String| UnreadableRecord {
        owner: owner.clone(),
        address: address.clone(),
        stored_key_id: stored_key_id.clone(),
        cause,
    };

    let keyring = match row.get_ref(3) {
        Ok(ValueRef::Text(bytes)) | Ok(ValueRef::Blob(bytes)) => bytes.to_vec(),
        Ok(ValueRef::Null) => Vec::new(),
        Ok(other) => {
            return Err(unreadable(format!(
                "keyring column has type {}",
                other.data_type()
            )))
        }
        Err(e) => return Err(unreadable(e.to_string())),
    };

    let stored_expiration = match row.get_ref(4) {
        Ok(ValueRef::Null) => Expiration::Unknown,
        Ok(ValueRef::Integer(secs)) => match Expiration::from_unix_seconds(secs) {
            Some(expiration) => expiration,
            None => return Err(unreadable(format!("expiration {} is out of range", secs))),
        },
        Ok(ValueRef::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            match parse_stored_instant(&text) {
                Some(instant) => Expiration::from_stored(instant),
                None => return Err(unreadable(format!("cannot parse expiration '{}'", text))),
            }
        }
        Ok(other) => {
            return Err(unreadable(format!(
                "expiration column has type {}",
                other.data_type()
            )))
        }
        Err(e) => return Err(unreadable(e.to_string())),
    };

    Ok(StoredRecord {
        owner: owner.clone(),
        address: address.clone(),
        stored_key_id: stored_key_id.clone(),
        stored_expiration,
        keyring,
    })
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> KeyfixResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            KeyfixError::persistence_failure(
                "open",
                &format!("opening '{}': {}", path.display(), e),
                error_codes::STORE_OPEN_FAILED,
            )
        })?;

        Self::from_connection(conn)
    }

    /// A fresh in-memory database, with the schema in place
    pub fn open_in_memory() -> KeyfixResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(store_error("open", error_codes::STORE_OPEN_FAILED))?;

        let store = Self::from_connection(conn)?;
        store.ensure_schema()?;
        Ok(store)
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> KeyfixResult<Self> {
        conn.busy_timeout(BUSY_WAIT_TIME)
            .map_err(store_error("open", error_codes::STORE_OPEN_FAILED))?;

        Ok(Self { conn })
    }

    /// Create the `member_email` table if it does not exist
    pub fn ensure_schema(&self) -> KeyfixResult<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS member_email (
                    member TEXT NOT NULL,
                    email TEXT NOT NULL,
                    pgpkey_id TEXT NOT NULL DEFAULT '',
                    keyring TEXT NOT NULL DEFAULT '',
                    pgpkey_expire TEXT NOT NULL DEFAULT '1970-01-01 00:00:00',
                    PRIMARY KEY (member, email)
                 )",
            )
            .map_err(store_error("create schema", error_codes::STORE_OPEN_FAILED))
    }

    /// Insert or replace a record
    pub fn insert(&self, record: &StoredRecord) -> KeyfixResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO member_email
                    (member, email, pgpkey_id, keyring, pgpkey_expire)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.owner,
                    record.address,
                    record.stored_key_id,
                    record.keyring,
                    format_stored_instant(record.stored_expiration.to_stored()),
                ],
            )
            .map_err(store_error("insert", error_codes::STORE_INSERT_FAILED))?;

        Ok(())
    }

    /// Number of rows in the table
    pub fn count(&self) -> KeyfixResult<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM member_email", [], |row| row.get::<_, i64>(0))
            .map(|n| n.max(0) as u64)
            .map_err(store_error("count", error_codes::STORE_QUERY_FAILED))
    }
}

impl RecordStore for SqliteRecordStore {
    fn fetch(&self, filter: &RecordFilter) -> KeyfixResult<Vec<FetchedRecord>> {
        let mut sql = String::from(
            "SELECT member, email, pgpkey_id, keyring, pgpkey_expire \
             FROM member_email \
             WHERE length(keyring) > 0",
        );
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if filter.only_unset_expiration {
            sql.push_str(UNSET_EXPIRATION_PREDICATE);
        }
        if let Some(owner) = &filter.owner {
            sql.push_str(" AND member = ?");
            param_values.push(Box::new(owner.clone()));
        }
        sql.push_str(" ORDER BY member, email");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            param_values.push(Box::new(i64::from(limit)));
        }

        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(store_error("prepare fetch", error_codes::STORE_QUERY_FAILED))?;

        let rows = stmt
            .query_map(params_ref.as_slice(), |row| Ok(decode_row(row)))
            .map_err(store_error("fetch", error_codes::STORE_QUERY_FAILED))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(store_error("fetch", error_codes::STORE_QUERY_FAILED))
    }

    fn apply(&mut self, correction: &KeyCorrection) -> KeyfixResult<usize> {
        self.conn
            .execute(
                "UPDATE member_email
                    SET pgpkey_expire = ?1,
                        pgpkey_id = ?2
                  WHERE member = ?3
                    AND email = ?4
                    AND pgpkey_id = ?5",
                params![
                    format_stored_instant(correction.expiration.to_stored()),
                    correction.key_id.as_str(),
                    correction.owner,
                    correction.address,
                    correction.expected_key_id,
                ],
            )
            .map_err(store_error("update", error_codes::STORE_UPDATE_FAILED))
    }
}
