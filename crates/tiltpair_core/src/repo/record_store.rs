//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Read and write whole record tables addressed by `block@path`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Writing a block replaces that block atomically and leaves every other
//!   block of the same file untouched.
//! - Record enumeration order survives a write/read cycle.
//! - Reading never creates files.

use crate::db::{open_db, open_existing_db, DbError};
use crate::metadata::{Label, MdLocation, MdValue, MetaData, MetadataError, ObjectId};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Transport-level failures of the record store.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// File or block does not exist.
    NotFound(MdLocation),
    Io {
        location: MdLocation,
        source: std::io::Error,
    },
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(location) => write!(f, "record table not found: {location}"),
            Self::Io { location, source } => write!(f, "i/o error on {location}: {source}"),
            Self::InvalidData(message) => write!(f, "invalid stored record data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<MetadataError> for StoreError {
    fn from(value: MetadataError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// Whole-table access to record storage.
pub trait RecordStore {
    fn read(&self, location: &MdLocation) -> StoreResult<MetaData>;
    fn write(&self, md: &MetaData, location: &MdLocation) -> StoreResult<()>;
    fn exists(&self, location: &MdLocation) -> StoreResult<bool>;
    /// Drops one block; the file is deleted once it holds no block.
    ///
    /// Returns whether anything was removed.
    fn remove(&self, location: &MdLocation) -> StoreResult<bool>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn read(&self, location: &MdLocation) -> StoreResult<MetaData> {
        (**self).read(location)
    }

    fn write(&self, md: &MetaData, location: &MdLocation) -> StoreResult<()> {
        (**self).write(md, location)
    }

    fn exists(&self, location: &MdLocation) -> StoreResult<bool> {
        (**self).exists(location)
    }

    fn remove(&self, location: &MdLocation) -> StoreResult<bool> {
        (**self).remove(location)
    }
}

/// One SQLite file per path, one block per table name inside it.
///
/// Connections are opened per call and dropped before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteRecordStore;

impl SqliteRecordStore {
    pub fn new() -> Self {
        Self
    }

    fn open_existing(&self, location: &MdLocation) -> StoreResult<Option<Connection>> {
        if !location.path().is_file() {
            return Ok(None);
        }
        Ok(Some(open_existing_db(location.path())?))
    }
}

impl RecordStore for SqliteRecordStore {
    fn read(&self, location: &MdLocation) -> StoreResult<MetaData> {
        let Some(conn) = self.open_existing(location)? else {
            return Err(StoreError::NotFound(location.clone()));
        };
        if !block_exists(&conn, location.block())? {
            return Err(StoreError::NotFound(location.clone()));
        }

        let mut md = MetaData::new();
        let mut objects = conn.prepare(
            "SELECT obj_id FROM md_objects
             WHERE block = ?1
             ORDER BY position ASC, obj_id ASC;",
        )?;
        let mut rows = objects.query([location.block()])?;
        while let Some(row) = rows.next()? {
            let raw_id: i64 = row.get("obj_id")?;
            let id = u64::try_from(raw_id)
                .map(ObjectId)
                .map_err(|_| StoreError::InvalidData(format!("negative object id {raw_id}")))?;
            if !md.insert_object(id) {
                return Err(StoreError::InvalidData(format!(
                    "duplicate object id {id} in {location}"
                )));
            }
        }

        let mut values = conn.prepare(
            "SELECT obj_id, label, value FROM md_values
             WHERE block = ?1;",
        )?;
        let mut rows = values.query([location.block()])?;
        while let Some(row) = rows.next()? {
            let raw_id: i64 = row.get("obj_id")?;
            let label: String = row.get("label")?;
            let value = value_from_db(row.get("value")?).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "unsupported value type for `{label}` on record {raw_id} in {location}"
                ))
            })?;
            let id = u64::try_from(raw_id)
                .map(ObjectId)
                .map_err(|_| StoreError::InvalidData(format!("negative object id {raw_id}")))?;
            md.set_value(Label::parse(&label), value, id)?;
        }

        debug!(
            "event=md_read module=repo status=ok location={location} records={}",
            md.len()
        );
        Ok(md)
    }

    fn write(&self, md: &MetaData, location: &MdLocation) -> StoreResult<()> {
        let mut conn = open_db(location.path())?;
        let tx = conn.transaction()?;
        let block = location.block();

        tx.execute(
            "INSERT OR IGNORE INTO md_blocks (name) VALUES (?1);",
            [block],
        )?;
        tx.execute("DELETE FROM md_objects WHERE block = ?1;", [block])?;
        {
            let mut insert_object = tx.prepare(
                "INSERT INTO md_objects (block, obj_id, position) VALUES (?1, ?2, ?3);",
            )?;
            let mut insert_value = tx.prepare(
                "INSERT INTO md_values (block, obj_id, label, value) VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (position, id) in md.find_objects().into_iter().enumerate() {
                let raw_id = object_id_to_db(id)?;
                insert_object.execute(params![block, raw_id, position as i64])?;
                for (label, value) in md.values(id)? {
                    insert_value.execute(params![
                        block,
                        raw_id,
                        label.as_str(),
                        value_to_db(value)
                    ])?;
                }
            }
        }
        tx.commit()?;

        debug!(
            "event=md_write module=repo status=ok location={location} records={}",
            md.len()
        );
        Ok(())
    }

    fn exists(&self, location: &MdLocation) -> StoreResult<bool> {
        match self.open_existing(location)? {
            Some(conn) => block_exists(&conn, location.block()),
            None => Ok(false),
        }
    }

    fn remove(&self, location: &MdLocation) -> StoreResult<bool> {
        let Some(conn) = self.open_existing(location)? else {
            return Ok(false);
        };

        let removed = conn.execute(
            "DELETE FROM md_blocks WHERE name = ?1;",
            [location.block()],
        )?;
        let remaining: i64 =
            conn.query_row("SELECT COUNT(*) FROM md_blocks;", [], |row| row.get(0))?;
        drop(conn);

        if remaining == 0 {
            std::fs::remove_file(location.path()).map_err(|source| StoreError::Io {
                location: location.clone(),
                source,
            })?;
            debug!("event=md_remove module=repo status=ok location={location} file_deleted=true");
            return Ok(true);
        }

        debug!(
            "event=md_remove module=repo status=ok location={location} file_deleted=false removed={}",
            removed > 0
        );
        Ok(removed > 0)
    }
}

fn block_exists(conn: &Connection, block: &str) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM md_blocks WHERE name = ?1;",
            [block],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn object_id_to_db(id: ObjectId) -> StoreResult<i64> {
    i64::try_from(id.0).map_err(|_| StoreError::InvalidData(format!("object id {id} too large")))
}

fn value_to_db(value: &MdValue) -> Value {
    match value {
        MdValue::Int(value) => Value::Integer(*value),
        MdValue::Double(value) => Value::Real(*value),
        MdValue::Text(value) => Value::Text(value.clone()),
    }
}

fn value_from_db(value: Value) -> Option<MdValue> {
    match value {
        Value::Integer(value) => Some(MdValue::Int(value)),
        Value::Real(value) => Some(MdValue::Double(value)),
        Value::Text(value) => Some(MdValue::Text(value)),
        Value::Null | Value::Blob(_) => None,
    }
}
