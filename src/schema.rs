//! CMS schema trees.
//!
//! The CMS schema endpoint describes a content type as nested JSON:
//! - strings are leaf types (`"string"`, `"media"`, `"richtext"`, ...);
//! - objects map field names to schema nodes and may carry a `__uid`
//!   relation marker and/or a `__component` dynamic-zone discriminator;
//! - arrays hold either one repeated shape, a relation template (elements
//!   carry `__uid`), or the alternatives of a dynamic zone (elements carry
//!   `__component`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use crate::error::StrapiError;
use crate::path::is_truthy;

/// Relation marker: the content-type uid an object schema points to.
pub const UID_KEY: &str = "__uid";
/// Dynamic-zone discriminator on schema alternatives and data elements.
pub const COMPONENT_KEY: &str = "__component";
/// Tag placed on every object node of a substituted placeholder subtree.
pub const PLACEHOLDER_KEY: &str = "__schema";

const MAX_SCHEMA_DEPTH: usize = 64;

/// One node of a CMS schema tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub enum SchemaNode {
    /// Opaque leaf type such as `string` or `media`.
    Leaf(String),
    /// Field mapping, optionally marked as a relation or a dynamic-zone entry.
    Object(ObjectSchema),
    /// Plain repeatable field with a single element shape.
    Repeated(Box<SchemaNode>),
    /// To-many relation; the template carries the relation marker.
    RelationArray(Box<SchemaNode>),
    /// Dynamic zone; each alternative is selected by its discriminator.
    DynamicZone(Vec<SchemaNode>),
}

/// Object schema with its optional markers split out of the field map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub content_type_uid: Option<String>,
    pub component: Option<String>,
    pub fields: BTreeMap<String, SchemaNode>,
}

impl SchemaNode {
    /// Content-type uid when this node is a relation marker.
    pub fn content_type_uid(&self) -> Option<&str> {
        match self {
            SchemaNode::Object(obj) => obj.content_type_uid.as_deref(),
            _ => None,
        }
    }

    /// Dynamic-zone discriminator declared on this node.
    pub fn component(&self) -> Option<&str> {
        match self {
            SchemaNode::Object(obj) => obj.component.as_deref(),
            _ => None,
        }
    }

    /// Schema of a named field; only object nodes have fields.
    pub fn field(&self, name: &str) -> Option<&SchemaNode> {
        match self {
            SchemaNode::Object(obj) => obj.fields.get(name),
            _ => None,
        }
    }

    /// Candidate element shapes of an array node, in declaration order.
    fn element_candidates(&self) -> &[SchemaNode] {
        match self {
            SchemaNode::Repeated(template) | SchemaNode::RelationArray(template) => {
                std::slice::from_ref(&**template)
            }
            SchemaNode::DynamicZone(alternatives) => alternatives,
            SchemaNode::Leaf(_) | SchemaNode::Object(_) => &[],
        }
    }

    /// First element shape of an array node.
    pub fn first_element(&self) -> Option<&SchemaNode> {
        self.element_candidates().first()
    }

    /// Element shape whose discriminator equals `component`.
    pub fn alternative(&self, component: &str) -> Option<&SchemaNode> {
        self.element_candidates()
            .iter()
            .find(|candidate| candidate.component() == Some(component))
    }

    /// Renders the node back to the CMS JSON shape.
    pub fn to_json(&self) -> JsonValue {
        self.render(false)
    }

    /// Renders the node with [`PLACEHOLDER_KEY`] set on every object node.
    pub fn to_placeholder_json(&self) -> JsonValue {
        self.render(true)
    }

    fn render(&self, tagged: bool) -> JsonValue {
        match self {
            SchemaNode::Leaf(name) => JsonValue::String(name.clone()),
            SchemaNode::Object(obj) => {
                let mut out = JsonMap::new();
                for (key, child) in &obj.fields {
                    out.insert(key.clone(), child.render(tagged));
                }
                if let Some(uid) = &obj.content_type_uid {
                    out.insert(UID_KEY.to_string(), JsonValue::String(uid.clone()));
                }
                if let Some(component) = &obj.component {
                    out.insert(
                        COMPONENT_KEY.to_string(),
                        JsonValue::String(component.clone()),
                    );
                }
                if tagged {
                    out.insert(PLACEHOLDER_KEY.to_string(), JsonValue::Bool(true));
                }
                JsonValue::Object(out)
            }
            SchemaNode::Repeated(template) | SchemaNode::RelationArray(template) => {
                JsonValue::Array(vec![template.render(tagged)])
            }
            SchemaNode::DynamicZone(alternatives) => JsonValue::Array(
                alternatives.iter().map(|alt| alt.render(tagged)).collect(),
            ),
        }
    }
}

impl TryFrom<JsonValue> for SchemaNode {
    type Error = StrapiError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        parse_schema(&value)
    }
}

impl From<SchemaNode> for JsonValue {
    fn from(node: SchemaNode) -> Self {
        node.to_json()
    }
}

/// Returns `true` when `value` is an object tagged as a placeholder.
pub fn is_placeholder_tagged(value: &JsonValue) -> bool {
    value
        .get(PLACEHOLDER_KEY)
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
}

/// Parses a CMS schema JSON value into a [`SchemaNode`] tree.
pub fn parse_schema(value: &JsonValue) -> Result<SchemaNode, StrapiError> {
    parse_node(value, "$", 0)
}

fn parse_node(value: &JsonValue, path: &str, depth: usize) -> Result<SchemaNode, StrapiError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(StrapiError::SchemaError(format!(
            "schema nesting depth exceeds maximum ({MAX_SCHEMA_DEPTH}) at {path}"
        )));
    }

    match value {
        JsonValue::String(name) => Ok(SchemaNode::Leaf(name.clone())),
        JsonValue::Object(map) => parse_object(map, path, depth).map(SchemaNode::Object),
        JsonValue::Array(items) => parse_array(items, path, depth),
        other => Err(StrapiError::SchemaError(format!(
            "schema node at {path} must be a string, object or array, got {other}"
        ))),
    }
}

fn parse_object(
    map: &JsonMap<String, JsonValue>,
    path: &str,
    depth: usize,
) -> Result<ObjectSchema, StrapiError> {
    let mut obj = ObjectSchema::default();

    for (key, child) in map {
        match key.as_str() {
            UID_KEY => obj.content_type_uid = Some(marker_string(child, path, UID_KEY)?),
            COMPONENT_KEY => obj.component = Some(marker_string(child, path, COMPONENT_KEY)?),
            // Tagged placeholders fed back in keep their shape.
            PLACEHOLDER_KEY => {}
            // Falsy entries declare nothing; data under them passes through.
            _ if !is_truthy(child) => {
                debug!(path, field = key.as_str(), "ignoring empty schema entry");
            }
            _ => {
                let child_path = format!("{path}.{key}");
                obj.fields
                    .insert(key.clone(), parse_node(child, &child_path, depth + 1)?);
            }
        }
    }

    Ok(obj)
}

fn marker_string(value: &JsonValue, path: &str, key: &str) -> Result<String, StrapiError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        StrapiError::SchemaError(format!("'{key}' at {path} must be a string"))
    })
}

fn parse_array(items: &[JsonValue], path: &str, depth: usize) -> Result<SchemaNode, StrapiError> {
    if items.is_empty() {
        return Err(StrapiError::SchemaError(format!(
            "array schema at {path} must declare at least one element shape"
        )));
    }

    let has_marker = |key: &str| {
        items
            .iter()
            .any(|item| item.as_object().is_some_and(|m| m.contains_key(key)))
    };

    if has_marker(UID_KEY) {
        let template = parse_node(&items[0], &format!("{path}[0]"), depth + 1)?;
        return Ok(SchemaNode::RelationArray(Box::new(template)));
    }

    if has_marker(COMPONENT_KEY) {
        let mut alternatives = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            alternatives.push(parse_node(item, &format!("{path}[{i}]"), depth + 1)?);
        }
        return Ok(SchemaNode::DynamicZone(alternatives));
    }

    let template = parse_node(&items[0], &format!("{path}[0]"), depth + 1)?;
    Ok(SchemaNode::Repeated(Box::new(template)))
}
