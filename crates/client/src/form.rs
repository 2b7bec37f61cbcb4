//! Request payloads and multipart form encoding
//!
//! [`FormValue`] is the payload tree accepted by every request verb. It is sent
//! as a JSON body, flattened into query parameters for `GET`, or flattened into
//! multipart fields by [`create_form_data`] for uploads.

use crate::Result;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::multipart::{Form, Part};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// An in-memory file attached to a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl FileData {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }
}

/// Request payload tree
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Date(DateTime<Utc>),
    File(FileData),
    Files(Vec<FileData>),
    List(Vec<FormValue>),
    /// Keys keep their insertion order
    Object(Vec<(String, FormValue)>),
}

impl FormValue {
    /// Build an object from key/value pairs
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<FormValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Empty object, the payload used when a call carries no data
    pub fn empty() -> Self {
        Self::Object(Vec::new())
    }

    /// `null`, `false`, zero and the empty string
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Look up a top-level key of an object
    pub fn get(&self, key: &str) -> Option<&FormValue> {
        match self {
            Self::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// String form used for multipart text fields and query parameters
    fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Date(d) => Some(iso_8601(d)),
            Self::File(f) => Some(f.file_name.clone()),
            _ => None,
        }
    }
}

/// Millisecond precision with a `Z` suffix
pub fn iso_8601(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<serde_json::Value> for FormValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FormValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FormValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for FormValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for FormValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for FormValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<DateTime<Utc>> for FormValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<FileData> for FormValue {
    fn from(value: FileData) -> Self {
        Self::File(value)
    }
}

impl From<Vec<FileData>> for FormValue {
    fn from(value: Vec<FileData>) -> Self {
        Self::Files(value)
    }
}

impl<T: Into<FormValue>> From<Option<T>> for FormValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl Serialize for FormValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&iso_8601(d)),
            Self::File(f) => serializer.serialize_str(&f.file_name),
            Self::Files(files) => {
                let mut seq = serializer.serialize_seq(Some(files.len()))?;
                for file in files {
                    seq.serialize_element(&file.file_name)?;
                }
                seq.end()
            }
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Value of one flattened multipart field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(FileData),
}

/// One flattened multipart field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

/// Flatten a nested payload into multipart fields
///
/// Falsy values are skipped. Dates become ISO-8601 strings, file lists are
/// appended under `key[]` and nested objects produce `parent[child]` keys.
/// Lists recurse by index.
pub fn create_form_data(value: &FormValue) -> Vec<FormField> {
    let mut fields = Vec::new();
    append_children(&mut fields, value, None);
    fields
}

fn append_children(fields: &mut Vec<FormField>, value: &FormValue, namespace: Option<&str>) {
    match value {
        FormValue::Object(entries) => {
            for (key, child) in entries {
                append_entry(fields, key, child, namespace);
            }
        }
        FormValue::List(items) => {
            for (index, child) in items.iter().enumerate() {
                append_entry(fields, &index.to_string(), child, namespace);
            }
        }
        _ => {}
    }
}

fn append_entry(fields: &mut Vec<FormField>, property: &str, value: &FormValue, namespace: Option<&str>) {
    if value.is_falsy() {
        return;
    }

    let key = match namespace {
        Some(ns) => format!("{ns}[{property}]"),
        None => property.to_string(),
    };

    match value {
        FormValue::Object(_) | FormValue::List(_) => append_children(fields, value, Some(&key)),
        FormValue::Files(files) => {
            let name = format!("{key}[]");
            fields.extend(files.iter().map(|file| FormField {
                name: name.clone(),
                value: FieldValue::File(file.clone()),
            }));
        }
        FormValue::File(file) => fields.push(FormField {
            name: key,
            value: FieldValue::File(file.clone()),
        }),
        other => {
            if let Some(text) = other.scalar_text() {
                fields.push(FormField {
                    name: key,
                    value: FieldValue::Text(text),
                });
            }
        }
    }
}

/// Build a `reqwest` multipart form from flattened fields
///
/// # Errors
///
/// Returns an error if a file carries an unparseable MIME type
pub fn into_multipart(fields: Vec<FormField>) -> Result<Form> {
    let mut form = Form::new();
    for field in fields {
        form = match field.value {
            FieldValue::Text(text) => form.text(field.name, text),
            FieldValue::File(file) => {
                let part = Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name)
                    .mime_str(&file.mime)?;
                form.part(field.name, part)
            }
        };
    }
    Ok(form)
}

/// Flatten the top level of a payload into query parameters
///
/// Null entries are dropped, lists repeat their key and nested objects are
/// sent as JSON text.
pub fn query_pairs(value: &FormValue) -> Result<Vec<(String, String)>> {
    let FormValue::Object(entries) = value else {
        return Ok(Vec::new());
    };

    let mut pairs = Vec::new();
    for (key, value) in entries {
        match value {
            FormValue::Null => {}
            FormValue::List(items) => {
                for item in items {
                    if let Some(text) = item.scalar_text() {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            FormValue::Files(files) => {
                pairs.extend(files.iter().map(|f| (key.clone(), f.file_name.clone())));
            }
            FormValue::Object(_) => pairs.push((key.clone(), serde_json::to_string(value)?)),
            other => {
                if let Some(text) = other.scalar_text() {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    Ok(pairs)
}
