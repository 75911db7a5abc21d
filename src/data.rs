use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::aggregate::ROW_WRAPPER_FIELD;
use crate::types::RowOffset;

/// One dataset row as an opaque field map.
///
/// Only a couple of fields are read downstream; everything else is carried
/// untouched and ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Build a record from a raw JSON value.
    ///
    /// A `{ "row": { ... } }` wrapper is unwrapped one level. Values that are
    /// not objects produce an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => {
                if matches!(map.get(ROW_WRAPPER_FIELD), Some(Value::Object(_)))
                    && let Some(Value::Object(inner)) = map.remove(ROW_WRAPPER_FIELD)
                {
                    return Self { fields: inner };
                }
                Self { fields: map }
            }
            _ => Self::default(),
        }
    }

    /// Field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Number of fields carried by the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` when the record carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Records returned by one fetch call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    /// Offset of the first record within the remote split.
    pub offset: RowOffset,
    /// Records in remote order.
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(offset: RowOffset, records: Vec<Record>) -> Self {
        Self { offset, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
