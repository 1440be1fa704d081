use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// FieldValue – a single field of a channel record
// ---------------------------------------------------------------------------

/// A dynamically-typed field mirroring what the instrument software writes.
///
/// Sequences keep their raw JSON elements: the merge only concatenates them,
/// and the numeric views below convert on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    Sequence(Vec<JsonValue>),
    Nested(BTreeMap<String, FieldValue>),
}

impl From<JsonValue> for FieldValue {
    fn from(val: JsonValue) -> Self {
        match val {
            JsonValue::String(s) => FieldValue::Text(s),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Text(n.to_string())
                }
            }
            JsonValue::Bool(b) => FieldValue::Bool(b),
            JsonValue::Null => FieldValue::Null,
            JsonValue::Array(items) => FieldValue::Sequence(items),
            JsonValue::Object(map) => FieldValue::Nested(
                map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect(),
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Null => write!(f, "<null>"),
            FieldValue::Sequence(items) => write!(f, "[{} items]", items.len()),
            FieldValue::Nested(map) => write!(f, "{{{} fields}}", map.len()),
        }
    }
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[JsonValue]> {
        match self {
            FieldValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Nested(map) => Some(map),
            _ => None,
        }
    }

    /// Interpret a 1-D sequence as floats. `null` elements become NaN.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        self.as_sequence()?.iter().map(json_to_f64).collect()
    }

    /// Interpret a 2-D sequence (list of rows) as floats. `null` cells become NaN.
    pub fn as_f64_matrix(&self) -> Option<Vec<Vec<f64>>> {
        self.as_sequence()?
            .iter()
            .map(|row| -> Option<Vec<f64>> { row.as_array()?.iter().map(json_to_f64).collect() })
            .collect()
    }
}

fn json_to_f64(val: &JsonValue) -> Option<f64> {
    match val {
        JsonValue::Null => Some(f64::NAN),
        other => other.as_f64(),
    }
}

// ---------------------------------------------------------------------------
// ChannelRecord – everything recorded for one detection channel
// ---------------------------------------------------------------------------

/// Name of the nested sub-record holding the time-indexed intensity data.
pub const DP: &str = "DP";
pub const DP_TIME: &str = "time";
pub const DP_DATA: &str = "data";
pub const LIDAR_RANGE: &str = "lidar_range";

/// All fields recorded for one channel: metadata strings, the `DP` sub-record
/// and the `lidar_range` altitude axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChannelRecord {
    pub fields: BTreeMap<String, FieldValue>,
}

impl ChannelRecord {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn nested(&self, name: &str) -> Option<&BTreeMap<String, FieldValue>> {
        self.field(name)?.as_nested()
    }

    fn dp_field(&self, name: &str) -> Option<&FieldValue> {
        self.nested(DP)?.get(name)
    }

    /// Profile timestamps in seconds since the Unix epoch (`DP.time`).
    pub fn time(&self) -> Option<Vec<f64>> {
        self.dp_field(DP_TIME)?.as_f64_vec()
    }

    /// Backscatter matrix, one row per profile (`DP.data`).
    pub fn data(&self) -> Option<Vec<Vec<f64>>> {
        self.dp_field(DP_DATA)?.as_f64_matrix()
    }

    /// Altitude of each range bin in metres.
    pub fn lidar_range(&self) -> Option<Vec<f64>> {
        self.field(LIDAR_RANGE)?.as_f64_vec()
    }

    /// Number of profiles in `DP.time`, without converting the elements.
    pub fn profile_count(&self) -> usize {
        self.dp_field(DP_TIME)
            .and_then(FieldValue::as_sequence)
            .map_or(0, <[JsonValue]>::len)
    }
}

// ---------------------------------------------------------------------------
// MeasurementSet – the data of one input file
// ---------------------------------------------------------------------------

/// Channel id → record, as loaded from a single file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MeasurementSet {
    pub channels: BTreeMap<String, ChannelRecord>,
}

/// The result of merging several [`MeasurementSet`]s in file order.
pub type JoinedMeasurementSet = MeasurementSet;

/// Free-form file metadata (`metadata_dict`).
pub type Metadata = BTreeMap<String, FieldValue>;

impl MeasurementSet {
    pub fn channel(&self, id: &str) -> Option<&ChannelRecord> {
        self.channels.get(id)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// On-disk layout of one file, as written by the instrument software.
#[derive(Debug, Clone, Serialize)]
pub struct DataFile {
    pub data_dict: MeasurementSet,
    pub metadata_dict: Metadata,
}
