use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Field name under which servers place a record's identifier unless
/// configured otherwise.
pub const DEFAULT_ID_FIELD: &str = "_id";

/// A record's field map, as carried on the wire.
pub type Fields = Map<String, Value>;

/// Server-assigned identifier of a record, unique within its collection.
///
/// Servers may key records by string or by number. The identifier keeps the
/// scalar it was read from and sends it back unchanged; equality, hashing
/// and ordering use the decimal/string form, so `12` and `"12"` name the
/// same record locally.
#[derive(Clone, Debug)]
pub struct RecordId {
    key: String,
    value: Value,
}

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        let key = id.into();
        Self {
            value: Value::String(key.clone()),
            key,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The identifier as it appears in a field map or request argument.
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }

    pub fn is_numeric(&self) -> bool {
        self.value.is_number()
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        scalar_id(&value)
            .ok_or_else(|| de::Error::custom("expected a non-empty string or a number"))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self {
            key: id.to_string(),
            value: Value::from(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self {
            key: id.to_string(),
            value: Value::from(id),
        }
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

/// Extracts an identifier from a broadcast or ack entry.
///
/// Accepts a record object carrying `id_field`, or a bare string / number
/// identifier. Empty strings count as absent.
pub fn record_id(value: &Value, id_field: &str) -> Option<RecordId> {
    match value {
        Value::Object(fields) => fields_id(fields, id_field),
        other => scalar_id(other),
    }
}

/// Identifier carried by a field map under `id_field`.
pub fn fields_id(fields: &Fields, id_field: &str) -> Option<RecordId> {
    fields.get(id_field).and_then(scalar_id)
}

fn scalar_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::String(id) if !id.is_empty() => Some(RecordId::new(id.clone())),
        Value::Number(id) => Some(RecordId {
            key: id.to_string(),
            value: value.clone(),
        }),
        _ => None,
    }
}
