//! Opaque child-resource templates and the field-path interpreter used to read
//! values out of them (and out of created children) without knowing their schema
//! at compile time.
//!
//! Deliberately not a full JSONPath engine: dot-separated
//! keys, integer array indices, and a single-predicate array filter
//! (`[?(@.key=="value")]`) are all real usage needs; globs and recursive descent
//! are not.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// An embedded, schema-less child-resource declaration (`spec.template`).
///
/// Represented as a raw [`serde_json::Value`] rather than a concrete Kubernetes
/// type: the CronAnything reducer never deserializes the body into a typed
/// struct, it only stamps metadata onto it and hands it to the API as a
/// [`kube::core::DynamicObject`]-shaped document.
#[derive(Clone, Debug, Serialize, Deserialize, schemars::JsonSchema, PartialEq)]
#[serde(transparent)]
pub struct ChildTemplate(pub Value);

/// Errors raised while reading `apiVersion`/`kind` out of a [`ChildTemplate`].
#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    /// The template's body isn't a JSON object.
    #[error("template body is not an object")]
    NotAnObject,
    /// `apiVersion` was missing or not a string.
    #[error("template is missing a string .apiVersion")]
    MissingApiVersion,
    /// `kind` was missing or not a string.
    #[error("template is missing a string .kind")]
    MissingKind,
}

impl ChildTemplate {
    /// Splits `apiVersion` into `(group, version)`; `group` is empty for core/v1 kinds.
    pub fn group_version(&self) -> Result<(String, String), TemplateError> {
        let api_version = self
            .0
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or(TemplateError::MissingApiVersion)?;
        Ok(match api_version.split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), api_version.to_string()),
        })
    }

    /// The template's `kind`.
    pub fn kind(&self) -> Result<String, TemplateError> {
        self.0
            .get("kind")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(TemplateError::MissingKind)
    }

    /// Structural equality used by the BackupSchedule reducer to decide whether a
    /// generated template differs from what's already persisted on a CronAnything.
    ///
    /// `serde_json::Value`'s `PartialEq` already compares objects by key/value sets
    /// rather than by serialized byte order, so whitespace and key reordering never
    /// trip this comparison — no separate canonicalization pass is needed.
    pub fn structurally_eq(&self, other: &ChildTemplate) -> bool {
        self.0 == other.0
    }

    /// Returns a copy of the template body with `.metadata.name`, `.metadata.labels`,
    /// and (optionally) an owner reference stamped on, ready to submit as a create.
    pub fn stamp(
        &self,
        name: &str,
        namespace: &str,
        labels: BTreeMap<String, String>,
        owner: Option<OwnerReference>,
    ) -> Result<Value, TemplateError> {
        let mut body = self.0.clone();
        let obj = body.as_object_mut().ok_or(TemplateError::NotAnObject)?;
        let metadata = obj
            .entry("metadata")
            .or_insert_with(|| Value::Object(Default::default()));
        let metadata = metadata.as_object_mut().ok_or(TemplateError::NotAnObject)?;
        metadata.insert("name".into(), Value::String(name.to_string()));
        metadata.insert("namespace".into(), Value::String(namespace.to_string()));
        metadata.insert(
            "labels".into(),
            serde_json::to_value(labels).expect("string map always serializes"),
        );
        if let Some(owner) = owner {
            metadata.insert(
                "ownerReferences".into(),
                serde_json::to_value([owner]).expect("OwnerReference always serializes"),
            );
        }
        Ok(body)
    }
}

/// One segment of a parsed field path.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    Predicate { key: String, value: String },
}

/// A parsed field-path expression, e.g. `.status.conditions[?(@.type=="Ready")].status`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath(Vec<Segment>);

/// A malformed field-path expression (not an extraction-time error: missing data
/// at eval time is handled by returning `None`/empty).
#[derive(Debug, Error, PartialEq)]
#[error("invalid field path {0:?}")]
pub struct FieldPathParseError(String);

impl FieldPath {
    /// Parses a dot-separated field path with optional `[N]` indices and a single
    /// `[?(@.key=="value")]` predicate per segment.
    pub fn parse(path: &str) -> Result<Self, FieldPathParseError> {
        let path = path.strip_prefix('.').unwrap_or(path);
        if path.is_empty() {
            return Ok(FieldPath(Vec::new()));
        }
        let mut segments = Vec::new();
        for raw in path.split('.') {
            if raw.is_empty() {
                return Err(FieldPathParseError(path.to_string()));
            }
            let (key_part, mut rest) = match raw.find('[') {
                Some(idx) => (&raw[..idx], &raw[idx..]),
                None => (raw, ""),
            };
            if !key_part.is_empty() {
                segments.push(Segment::Key(key_part.to_string()));
            }
            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| FieldPathParseError(path.to_string()))?;
                let bracket = &rest[1..close];
                segments.push(parse_bracket(bracket, path)?);
                rest = &rest[close + 1..];
            }
        }
        Ok(FieldPath(segments))
    }

    /// Evaluates the path against `value`, returning the rendered string form of
    /// whatever is found (numbers/bools are stringified, missing data yields
    /// `None` — never an error, per the "missing keys yield empty strings" rule).
    pub fn extract<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut cur = value;
        for seg in &self.0 {
            cur = match seg {
                Segment::Key(k) => cur.get(k)?,
                Segment::Index(i) => cur.get(*i)?,
                Segment::Predicate { key, value } => cur
                    .as_array()?
                    .iter()
                    .find(|item| item.get(key).and_then(Value::as_str) == Some(value.as_str()))?,
            };
        }
        Some(cur)
    }

    /// [`Self::extract`], rendered to a string (empty string if missing, matching
    /// the "missing keys yield empty strings, never errors" contract).
    pub fn extract_string(&self, value: &Value) -> String {
        match self.extract(value) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

fn parse_bracket(bracket: &str, whole: &str) -> Result<Segment, FieldPathParseError> {
    if let Some(pred) = bracket.strip_prefix("?(@.") {
        let pred = pred
            .strip_suffix(')')
            .ok_or_else(|| FieldPathParseError(whole.to_string()))?;
        let (key, value) = pred
            .split_once("==")
            .ok_or_else(|| FieldPathParseError(whole.to_string()))?;
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        return Ok(Segment::Predicate {
            key: key.trim().to_string(),
            value: value.to_string(),
        });
    }
    bracket
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| FieldPathParseError(whole.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_keys() {
        let v = json!({"status": {"phase": "Succeeded"}});
        let fp = FieldPath::parse(".status.phase").unwrap();
        assert_eq!(fp.extract_string(&v), "Succeeded");
    }

    #[test]
    fn missing_key_is_empty_not_error() {
        let v = json!({"status": {}});
        let fp = FieldPath::parse(".status.phase").unwrap();
        assert_eq!(fp.extract_string(&v), "");
    }

    #[test]
    fn array_index() {
        let v = json!({"items": ["a", "b", "c"]});
        let fp = FieldPath::parse(".items[1]").unwrap();
        assert_eq!(fp.extract_string(&v), "b");
    }

    #[test]
    fn predicate_filter() {
        let v = json!({"status": {"conditions": [
            {"type": "Stalled", "status": "False"},
            {"type": "Ready", "status": "True"},
        ]}});
        let fp = FieldPath::parse(r#".status.conditions[?(@.type=="Ready")].status"#).unwrap();
        assert_eq!(fp.extract_string(&v), "True");
    }

    #[test]
    fn predicate_no_match_is_empty() {
        let v = json!({"status": {"conditions": []}});
        let fp = FieldPath::parse(r#".status.conditions[?(@.type=="Ready")].status"#).unwrap();
        assert_eq!(fp.extract_string(&v), "");
    }

    #[test]
    fn structural_equality_ignores_key_order() {
        let a = ChildTemplate(json!({"apiVersion": "v1", "kind": "Backup", "spec": {"a": 1, "b": 2}}));
        let b = ChildTemplate(json!({"kind": "Backup", "spec": {"b": 2, "a": 1}, "apiVersion": "v1"}));
        assert!(a.structurally_eq(&b));
    }

    #[test]
    fn structural_equality_detects_real_change() {
        let a = ChildTemplate(json!({"apiVersion": "v1", "kind": "Backup", "spec": {"a": 1}}));
        let b = ChildTemplate(json!({"apiVersion": "v1", "kind": "Backup", "spec": {"a": 2}}));
        assert!(!a.structurally_eq(&b));
    }

    #[test]
    fn group_version_splits_core_and_grouped() {
        let core = ChildTemplate(json!({"apiVersion": "v1", "kind": "Backup"}));
        assert_eq!(core.group_version().unwrap(), (String::new(), "v1".to_string()));
        let grouped = ChildTemplate(json!({"apiVersion": "database.oracle.com/v1alpha1", "kind": "Backup"}));
        assert_eq!(
            grouped.group_version().unwrap(),
            ("database.oracle.com".to_string(), "v1alpha1".to_string())
        );
    }

    #[test]
    fn stamp_sets_name_namespace_labels() {
        let tpl = ChildTemplate(json!({"apiVersion": "v1", "kind": "Backup", "spec": {}}));
        let mut labels = BTreeMap::new();
        labels.insert("createdBy".to_string(), "my-cron".to_string());
        let stamped = tpl.stamp("my-cron-123", "default", labels, None).unwrap();
        assert_eq!(stamped["metadata"]["name"], "my-cron-123");
        assert_eq!(stamped["metadata"]["namespace"], "default");
        assert_eq!(stamped["metadata"]["labels"]["createdBy"], "my-cron");
    }
}
