//! In-memory record table.
//!
//! # Invariants
//! - Object ids are unique within a table and never reused.
//! - `find_objects` returns ids in insertion (enumeration) order.

use super::label::Label;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Record identifier inside one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum MdValue {
    Int(i64),
    Double(f64),
    Text(String),
}

impl MdValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Text(_) => "text",
        }
    }
}

impl From<i64> for MdValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for MdValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for MdValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for MdValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MdValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Field access errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataError {
    FieldMissing { label: Label, object: ObjectId },
    WrongType {
        label: Label,
        object: ObjectId,
        expected: &'static str,
        found: &'static str,
    },
    UnknownObject(ObjectId),
    /// Stored integer does not fit the requested width.
    OutOfRange { label: Label, object: ObjectId },
}

impl Display for MetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldMissing { label, object } => {
                write!(f, "field `{label}` missing on record {object}")
            }
            Self::WrongType {
                label,
                object,
                expected,
                found,
            } => write!(
                f,
                "field `{label}` on record {object} is {found}, expected {expected}"
            ),
            Self::UnknownObject(object) => write!(f, "record {object} does not exist"),
            Self::OutOfRange { label, object } => {
                write!(f, "field `{label}` on record {object} is out of range")
            }
        }
    }
}

impl Error for MetadataError {}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[derive(Debug, Clone, PartialEq)]
struct Record {
    id: ObjectId,
    values: BTreeMap<Label, MdValue>,
}

/// Ordered table of records with typed fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetaData {
    records: Vec<Record>,
    /// Position of each id in `records`.
    positions: HashMap<ObjectId, usize>,
    next_id: u64,
}

impl MetaData {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            positions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Appends an empty record and returns its id.
    pub fn add_object(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.push_record(id);
        id
    }

    /// Appends a record with a caller-provided id, as read back from storage.
    ///
    /// Returns `false` without inserting when `id` already exists.
    pub fn insert_object(&mut self, id: ObjectId) -> bool {
        if self.contains_object(id) {
            return false;
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.push_record(id);
        true
    }

    /// Record ids in enumeration order.
    pub fn find_objects(&self) -> Vec<ObjectId> {
        self.records.iter().map(|record| record.id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Fields of one record, ordered by label.
    pub fn values(
        &self,
        id: ObjectId,
    ) -> MetadataResult<impl Iterator<Item = (&Label, &MdValue)>> {
        Ok(self.record(id)?.values.iter())
    }

    pub fn get_value(&self, label: &Label, id: ObjectId) -> MetadataResult<&MdValue> {
        self.record(id)?
            .values
            .get(label)
            .ok_or_else(|| MetadataError::FieldMissing {
                label: label.clone(),
                object: id,
            })
    }

    pub fn get_string(&self, label: &Label, id: ObjectId) -> MetadataResult<&str> {
        match self.get_value(label, id)? {
            MdValue::Text(value) => Ok(value.as_str()),
            other => Err(wrong_type(label, id, "text", other)),
        }
    }

    pub fn get_int(&self, label: &Label, id: ObjectId) -> MetadataResult<i64> {
        match self.get_value(label, id)? {
            MdValue::Int(value) => Ok(*value),
            other => Err(wrong_type(label, id, "int", other)),
        }
    }

    /// Integer field narrowed to `i32` pixel coordinates.
    pub fn get_coordinate(&self, label: &Label, id: ObjectId) -> MetadataResult<i32> {
        let value = self.get_int(label, id)?;
        i32::try_from(value).map_err(|_| MetadataError::OutOfRange {
            label: label.clone(),
            object: id,
        })
    }

    /// Floating-point field; integer values are widened.
    pub fn get_double(&self, label: &Label, id: ObjectId) -> MetadataResult<f64> {
        match self.get_value(label, id)? {
            MdValue::Double(value) => Ok(*value),
            MdValue::Int(value) => Ok(*value as f64),
            other => Err(wrong_type(label, id, "double", other)),
        }
    }

    pub fn set_value(
        &mut self,
        label: Label,
        value: impl Into<MdValue>,
        id: ObjectId,
    ) -> MetadataResult<()> {
        let position = self.position(id)?;
        self.records[position].values.insert(label, value.into());
        Ok(())
    }

    fn push_record(&mut self, id: ObjectId) {
        self.positions.insert(id, self.records.len());
        self.records.push(Record {
            id,
            values: BTreeMap::new(),
        });
    }

    fn position(&self, id: ObjectId) -> MetadataResult<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or(MetadataError::UnknownObject(id))
    }

    fn record(&self, id: ObjectId) -> MetadataResult<&Record> {
        Ok(&self.records[self.position(id)?])
    }
}

fn wrong_type(
    label: &Label,
    id: ObjectId,
    expected: &'static str,
    found: &MdValue,
) -> MetadataError {
    MetadataError::WrongType {
        label: label.clone(),
        object: id,
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Label, MdValue, MetaData, MetadataError, ObjectId};

    #[test]
    fn add_object_assigns_increasing_ids_in_order() {
        let mut md = MetaData::new();
        let first = md.add_object();
        let second = md.add_object();
        assert!(second > first);
        assert_eq!(md.find_objects(), vec![first, second]);
    }

    #[test]
    fn typed_getters_check_presence_and_type() {
        let mut md = MetaData::new();
        let id = md.add_object();
        md.set_value(Label::XInt, 12, id).unwrap();
        md.set_value(Label::Micrograph, "mic1.img", id).unwrap();

        assert_eq!(md.get_int(&Label::XInt, id).unwrap(), 12);
        assert_eq!(md.get_double(&Label::XInt, id).unwrap(), 12.0);
        assert_eq!(md.get_string(&Label::Micrograph, id).unwrap(), "mic1.img");

        let missing = md.get_int(&Label::YInt, id).unwrap_err();
        assert_eq!(
            missing,
            MetadataError::FieldMissing {
                label: Label::YInt,
                object: id
            }
        );
        assert!(matches!(
            md.get_string(&Label::XInt, id),
            Err(MetadataError::WrongType { .. })
        ));
    }

    #[test]
    fn insert_object_keeps_ids_unique_and_advances_counter() {
        let mut md = MetaData::new();
        assert!(md.insert_object(ObjectId(7)));
        assert!(!md.insert_object(ObjectId(7)));
        assert_eq!(md.add_object(), ObjectId(8));
    }

    #[test]
    fn lookups_follow_ids_across_many_records() {
        let mut md = MetaData::new();
        assert!(md.insert_object(ObjectId(40)));
        let ids: Vec<_> = (0..500).map(|_| md.add_object()).collect();
        for (n, id) in ids.iter().enumerate().rev() {
            md.set_value(Label::XInt, n as i64, *id).unwrap();
        }

        assert_eq!(md.len(), 501);
        assert!(md.contains_object(ObjectId(40)));
        assert_eq!(md.find_objects()[1], ObjectId(41));
        assert_eq!(md.get_int(&Label::XInt, ids[0]).unwrap(), 0);
        assert_eq!(md.get_int(&Label::XInt, ids[499]).unwrap(), 499);
        assert!(md.get_int(&Label::XInt, ObjectId(40)).is_err());
    }

    #[test]
    fn set_value_on_unknown_object_fails() {
        let mut md = MetaData::new();
        let err = md
            .set_value(Label::AngleY, MdValue::Double(1.0), ObjectId(4))
            .unwrap_err();
        assert_eq!(err, MetadataError::UnknownObject(ObjectId(4)));
    }

    #[test]
    fn coordinate_rejects_values_outside_i32() {
        let mut md = MetaData::new();
        let id = md.add_object();
        md.set_value(Label::XInt, i64::MAX, id).unwrap();
        assert!(matches!(
            md.get_coordinate(&Label::XInt, id),
            Err(MetadataError::OutOfRange { .. })
        ));
    }
}
