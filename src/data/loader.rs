use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::model::{ChannelRecord, FieldValue, MeasurementSet, Metadata};

/// Top-level key holding channel id → channel record.
pub const DATA_KEY: &str = "data_dict";
/// Top-level key holding free-form file metadata.
pub const METADATA_KEY: &str = "metadata_dict";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid JSON", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}: {problem}", path.display())]
    Schema { path: PathBuf, problem: String },
    #[error("{}: unsupported file extension '.{ext}'", path.display())]
    Unsupported { path: PathBuf, ext: String },
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load one measurement file.  Dispatch by extension.
///
/// Only `.json` files as written by the instrument software are read. Either
/// the whole file loads or an error is returned; there are no partial results.
pub fn load_file(path: &Path) -> Result<(MeasurementSet, Metadata), LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => load_json(path),
        other => Err(LoadError::Unsupported {
            path: path.to_path_buf(),
            ext: other.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema:
///
/// ```json
/// {
///   "data_dict": {
///     "1": {
///       "serial_number": "A1",
///       "DP": { "time": [1700000000.0, ...], "data": [[...], ...] },
///       "lidar_range": [7.5, 22.5, ...]
///     },
///     ...
///   },
///   "metadata_dict": { ... }
/// }
/// ```
fn load_json(path: &Path) -> Result<(MeasurementSet, Metadata), LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let root: JsonValue =
        serde_json::from_str(&sanitize_non_finite(&text)).map_err(|source| LoadError::Format {
            path: path.to_path_buf(),
            source,
        })?;

    let (set, metadata) = parse_document(root).map_err(|problem| LoadError::Schema {
        path: path.to_path_buf(),
        problem,
    })?;

    debug!(
        "{}: {} channels, {} metadata keys",
        path.display(),
        set.len(),
        metadata.len()
    );
    Ok((set, metadata))
}

fn parse_document(root: JsonValue) -> Result<(MeasurementSet, Metadata), String> {
    let JsonValue::Object(mut top) = root else {
        return Err("expected a top-level JSON object".to_string());
    };

    let data = take_object(&mut top, DATA_KEY)?;
    let metadata = take_object(&mut top, METADATA_KEY)?;

    let mut channels = BTreeMap::new();
    for (id, value) in data {
        let JsonValue::Object(fields) = value else {
            return Err(format!("channel '{id}' is not an object"));
        };
        channels.insert(id, ChannelRecord { fields: into_fields(fields) });
    }

    Ok((MeasurementSet { channels }, into_fields(metadata)))
}

fn take_object(top: &mut Map<String, JsonValue>, key: &str) -> Result<Map<String, JsonValue>, String> {
    match top.remove(key) {
        Some(JsonValue::Object(map)) => Ok(map),
        Some(_) => Err(format!("top-level key '{key}' is not an object")),
        None => Err(format!("missing top-level key '{key}'")),
    }
}

fn into_fields(map: Map<String, JsonValue>) -> BTreeMap<String, FieldValue> {
    map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect()
}

/// Python's `json` module writes non-finite floats as bare `NaN`, `Infinity`
/// and `-Infinity`, which are not JSON. Replace them with `null` outside of
/// string literals.
fn sanitize_non_finite(text: &str) -> Cow<'_, str> {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

    let bytes = text.as_bytes();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        if b == b'"' {
            in_string = true;
            i += 1;
            continue;
        }
        if let Some(tok) = TOKENS.iter().find(|t| bytes[i..].starts_with(t.as_bytes())) {
            let buf = out.get_or_insert_with(|| String::with_capacity(text.len()));
            buf.push_str(&text[copied..i]);
            buf.push_str("null");
            i += tok.len();
            copied = i;
            continue;
        }
        i += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&text[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_channels_and_metadata() {
        let file = write_temp(
            ".json",
            r#"{
                "data_dict": {
                    "1":  { "serial_number": "A1", "DP": { "time": [0, 1], "data": [[1], [2]] }, "lidar_range": [15] },
                    "11": { "serial_number": "A1", "DP": { "time": [0, 1], "data": [[3], [4]] }, "lidar_range": [15] }
                },
                "metadata_dict": { "site": "chilbolton" }
            }"#,
        );

        let (set, metadata) = load_file(file.path()).unwrap();
        assert_eq!(set.channel_ids().collect::<Vec<_>>(), vec!["1", "11"]);
        assert_eq!(set.channel("11").unwrap().time(), Some(vec![0.0, 1.0]));
        assert_eq!(metadata["site"], FieldValue::Text("chilbolton".into()));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let file = write_temp(".JSON", r#"{ "data_dict": {}, "metadata_dict": {} }"#);
        let (set, _) = load_file(file.path()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn non_finite_tokens_read_as_nan() {
        let file = write_temp(
            ".json",
            r#"{ "data_dict": { "1": { "note": "NaN stays", "DP": { "time": [0], "data": [[NaN, -Infinity, 2]] } } },
                 "metadata_dict": {} }"#,
        );

        let (set, _) = load_file(file.path()).unwrap();
        let rec = set.channel("1").unwrap();
        let row = &rec.data().unwrap()[0];
        assert!(row[0].is_nan());
        assert!(row[1].is_nan());
        assert_eq!(row[2], 2.0);
        assert_eq!(rec.field("note"), Some(&FieldValue::Text("NaN stays".into())));
    }

    #[test]
    fn unparseable_file_is_a_format_error() {
        let file = write_temp(".json", "{ \"data_dict\": ");
        assert!(matches!(load_file(file.path()), Err(LoadError::Format { .. })));
    }

    #[test]
    fn missing_metadata_key_is_a_schema_error() {
        let file = write_temp(".json", r#"{ "data_dict": {} }"#);
        match load_file(file.path()) {
            Err(LoadError::Schema { problem, .. }) => assert!(problem.contains(METADATA_KEY)),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn channel_must_be_an_object() {
        let file = write_temp(".json", r#"{ "data_dict": { "2": [1, 2] }, "metadata_dict": {} }"#);
        match load_file(file.path()) {
            Err(LoadError::Schema { problem, .. }) => assert!(problem.contains("'2'")),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn top_level_array_is_a_schema_error() {
        let file = write_temp(".json", "[1, 2, 3]");
        assert!(matches!(load_file(file.path()), Err(LoadError::Schema { .. })));
    }

    #[test]
    fn netcdf_is_unsupported() {
        let file = write_temp(".nc", "");
        match load_file(file.path()) {
            Err(LoadError::Unsupported { ext, .. }) => assert_eq!(ext, "nc"),
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_file(Path::new("/nonexistent/lidar.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn sanitize_leaves_clean_text_borrowed() {
        let text = r#"{"a": [1, 2.5e3, null], "b": "Infinity"}"#;
        assert!(matches!(sanitize_non_finite(text), Cow::Borrowed(_)));
    }

    #[test]
    fn sanitize_respects_escaped_quotes() {
        let text = r#"["say \"NaN\"", NaN]"#;
        assert_eq!(sanitize_non_finite(text), r#"["say \"NaN\"", null]"#);
    }
}
