//! Structural paths into data environments.
//!
//! A path is an ordered list of steps. Field steps descend into objects and
//! index steps descend into arrays. The first step of a path handed to the
//! resolver names a root in the data environment.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::StrapiError;

/// One step of an [`ObjectPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathStep {
    /// Repetition index into an array.
    Index(usize),
    /// Object field name.
    Field(String),
}

impl PathStep {
    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathStep::Field(name) => Some(name),
            PathStep::Index(_) => None,
        }
    }
}

impl From<&str> for PathStep {
    fn from(value: &str) -> Self {
        PathStep::Field(value.to_string())
    }
}

impl From<String> for PathStep {
    fn from(value: String) -> Self {
        PathStep::Field(value)
    }
}

impl From<usize> for PathStep {
    fn from(value: usize) -> Self {
        PathStep::Index(value)
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Field(name) => write!(f, "{name}"),
            PathStep::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Ordered sequence of field and index steps.
///
/// Serializes as a JSON array such as `["strapiItem", "tags", 0, "name"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectPath(Vec<PathStep>);

impl ObjectPath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathStep> {
        self.0.iter()
    }

    /// Splits the path into its root selector and the remaining steps.
    pub fn split_root(&self) -> Option<(&PathStep, &[PathStep])> {
        self.0.split_first()
    }

    pub fn push(&mut self, step: impl Into<PathStep>) {
        self.0.push(step.into());
    }

    /// Parses dotted text such as `strapiItem.attributes.tags[0].name`.
    ///
    /// Only bracketed numbers become index steps; `a.0` is the field `"0"`.
    pub fn parse(text: &str) -> Result<Self, StrapiError> {
        let trimmed = text.trim();
        let mut steps = Vec::new();
        let mut pos = 0;

        for caps in step_regex().captures_iter(trimmed) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() != pos {
                return Err(StrapiError::PathError(format!(
                    "unexpected text '{}' in path '{}'",
                    &trimmed[pos..whole.start()],
                    trimmed
                )));
            }
            pos = whole.end();

            if let Some(field) = caps.get(1) {
                steps.push(PathStep::Field(field.as_str().to_string()));
            } else if let Some(index) = caps.get(2) {
                let index = index.as_str().parse::<usize>().map_err(|e| {
                    StrapiError::PathError(format!(
                        "invalid index '{}' in path '{}': {e}",
                        index.as_str(),
                        trimmed
                    ))
                })?;
                steps.push(PathStep::Index(index));
            }
        }

        if pos != trimmed.len() {
            return Err(StrapiError::PathError(format!(
                "unexpected text '{}' in path '{}'",
                &trimmed[pos..],
                trimmed
            )));
        }

        Ok(Self(steps))
    }
}

impl From<Vec<PathStep>> for ObjectPath {
    fn from(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }
}

impl<'a> IntoIterator for &'a ObjectPath {
    type Item = &'a PathStep;
    type IntoIter = std::slice::Iter<'a, PathStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Field(_) if i > 0 => write!(f, ".{step}")?,
                _ => write!(f, "{step}")?,
            }
        }
        Ok(())
    }
}

/// Builds an [`ObjectPath`] from a mix of field names and indices.
///
/// ```ignore
/// let path = object_path!["strapiItem", "tags", 0, "name"];
/// ```
#[macro_export]
macro_rules! object_path {
    ($($step:expr),* $(,)?) => {
        $crate::path::ObjectPath::new(vec![$($crate::path::PathStep::from($step)),*])
    };
}

fn step_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\.)([^.\[\]]+)|\[(\d+)\]").expect("path step regex must compile")
    })
}

/// Looks up a single step in a JSON value.
///
/// Field steps that spell a number index into arrays, and index steps look up
/// the stringified key on objects.
pub fn get_step<'a>(value: &'a JsonValue, step: &PathStep) -> Option<&'a JsonValue> {
    match (value, step) {
        (JsonValue::Object(map), PathStep::Field(name)) => map.get(name),
        (JsonValue::Object(map), PathStep::Index(i)) => map.get(&i.to_string()),
        (JsonValue::Array(items), PathStep::Index(i)) => items.get(*i),
        (JsonValue::Array(items), PathStep::Field(name)) => {
            name.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    }
}

/// Follows every step of `path` from `value`.
pub fn get_path<'a>(value: &'a JsonValue, path: &ObjectPath) -> Option<&'a JsonValue> {
    path.iter().try_fold(value, |current, step| get_step(current, step))
}

/// JavaScript-style truthiness of a JSON value.
pub(crate) fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_fields_and_indices() {
        let path = ObjectPath::parse("strapiItem.attributes.tags[0].name").unwrap();
        assert_eq!(
            path,
            object_path!["strapiItem", "attributes", "tags", 0usize, "name"]
        );
        assert_eq!(path.to_string(), "strapiItem.attributes.tags[0].name");
    }

    #[test]
    fn empty_text_is_empty_path() {
        assert!(ObjectPath::parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_text() {
        let err = ObjectPath::parse("a..b").unwrap_err();
        assert!(err.to_string().contains("path error"));
        assert!(ObjectPath::parse("a[0]b").is_err());
        assert!(ObjectPath::parse("a[x]").is_err());
    }

    #[test]
    fn deserializes_mixed_json_array() {
        let path: ObjectPath = serde_json::from_value(json!(["currentItem", "item", 2])).unwrap();
        assert_eq!(path, object_path!["currentItem", "item", 2usize]);
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            json!(["currentItem", "item", 2])
        );
    }

    #[test]
    fn get_path_follows_objects_and_arrays() {
        let value = json!({"a": {"list": [{"x": 1}, {"x": 2}]}});
        assert_eq!(
            get_path(&value, &object_path!["a", "list", 1usize, "x"]),
            Some(&json!(2))
        );
        assert_eq!(
            get_path(&value, &object_path!["a", "list", "0", "x"]),
            Some(&json!(1))
        );
        assert_eq!(get_path(&value, &object_path!["a", "missing"]), None);
    }

    #[test]
    fn truthiness_matches_javascript() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!("x")));
    }
}
