//! Schema-path resolution.
//!
//! Walks a root's data and schema in lockstep along a path, collecting the
//! content-type references crossed on the way.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, trace};

use crate::env::{ContentTypeRef, DataEnv, EnvEntry, RootInfo, CURRENT_ITEM};
use crate::error::StrapiError;
use crate::path::{get_step, is_truthy, ObjectPath, PathStep};
use crate::schema::{ObjectSchema, SchemaNode, COMPONENT_KEY};

/// Key wrapping the element data of a repeated element.
pub const ITEM_KEY: &str = "item";

/// Outcome of [`traverse_schema`].
///
/// Two sentinels mean "nothing resolved": the *empty* resolution (an empty
/// object schema and no content types) and the *unresolved* one (both
/// `None`). Callers must treat both the same way.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResolution {
    pub schema: Option<SchemaNode>,
    pub content_types: Option<Vec<ContentTypeRef>>,
}

impl PathResolution {
    fn resolved(schema: Option<SchemaNode>, content_types: Vec<ContentTypeRef>) -> Self {
        Self {
            schema,
            content_types: Some(content_types),
        }
    }

    /// The `currentItem` shape mismatch or a falsy repeated element.
    pub fn empty() -> Self {
        Self {
            schema: Some(SchemaNode::Object(ObjectSchema::default())),
            content_types: Some(Vec::new()),
        }
    }

    /// Data or schema ran out before the path did.
    pub fn unresolved() -> Self {
        Self {
            schema: None,
            content_types: None,
        }
    }

    /// `true` when the path landed on a non-empty schema node.
    pub fn is_resolved(&self) -> bool {
        match &self.schema {
            None => false,
            Some(SchemaNode::Object(obj)) => {
                !(obj.fields.is_empty() && obj.content_type_uid.is_none() && obj.component.is_none())
            }
            Some(_) => true,
        }
    }
}

/// Resolves `path` inside one root.
///
/// `root_tag` selects the `currentItem` unwrapping: that root's schema is the
/// single-element array of the repeated field and its data is
/// `{ index, item }`, so a path into it must start with `item`.
///
/// A relation marker is recorded when it is the current schema cursor *before*
/// a step is consumed; a path ending on a relation does not record it.
pub fn traverse_schema(
    root_tag: &str,
    data: Option<&JsonValue>,
    schema: Option<&SchemaNode>,
    path: &[PathStep],
) -> PathResolution {
    if path.is_empty() {
        return PathResolution::resolved(schema.cloned(), Vec::new());
    }

    let (Some(data), Some(schema)) = (data, schema) else {
        debug!(root = root_tag, "root has no data or schema");
        return PathResolution::unresolved();
    };
    let mut cursor = (Some(data), Some(schema));
    let mut steps = path;

    if root_tag == CURRENT_ITEM {
        if steps[0].as_field() != Some(ITEM_KEY) {
            debug!(root = root_tag, "path into repeated element does not start with 'item'");
            return PathResolution::empty();
        }
        cursor = (data.get(ITEM_KEY), schema.first_element());
        steps = &steps[1..];
    }

    let mut content_types = Vec::new();

    for step in steps {
        let (Some(data), Some(schema)) = cursor else {
            debug!(root = root_tag, step = %step, "path left the data or schema");
            return PathResolution::unresolved();
        };
        if !is_truthy(data) {
            debug!(root = root_tag, step = %step, "path reached empty data");
            return PathResolution::unresolved();
        }

        if let Some(uid) = schema.content_type_uid() {
            let id = data.get("id").cloned().unwrap_or(JsonValue::Null);
            trace!(uid, %id, "crossing relation");
            content_types.push(ContentTypeRef::new(uid, id));
        }

        cursor = match step {
            PathStep::Field(name) => (get_step(data, step), schema.field(name)),
            PathStep::Index(_) => {
                let element = match data.as_object() {
                    Some(map) if map.contains_key(ITEM_KEY) => map.get(ITEM_KEY),
                    _ => get_step(data, step),
                };
                let Some(element) = element.filter(|v| is_truthy(v)) else {
                    debug!(root = root_tag, step = %step, "no element at index");
                    return PathResolution::empty();
                };
                (Some(element), element_schema(schema, element))
            }
        };
    }

    PathResolution::resolved(cursor.1.cloned(), content_types)
}

/// Picks the schema for one array element: the dynamic-zone alternative when
/// the element carries a discriminator, the template otherwise.
fn element_schema<'a>(schema: &'a SchemaNode, element: &JsonValue) -> Option<&'a SchemaNode> {
    match element.as_object() {
        Some(map) if map.contains_key(COMPONENT_KEY) => {
            let found = map
                .get(COMPONENT_KEY)
                .and_then(JsonValue::as_str)
                .and_then(|component| schema.alternative(component));
            if found.is_none() {
                debug!(component = ?map.get(COMPONENT_KEY), "no schema alternative for element");
            }
            found
        }
        _ => schema.first_element(),
    }
}

/// Computes the schema and inherited content types of a root being created.
///
/// An empty `path` starts a new root with `schema`. Otherwise the first step
/// must name an existing CMS root; anything else is a configuration error.
pub fn compute_root_info(
    env: &DataEnv,
    path: &ObjectPath,
    schema: Option<SchemaNode>,
) -> Result<RootInfo, StrapiError> {
    let Some((selector, rest)) = path.split_root() else {
        return Ok(RootInfo {
            root_schema: schema,
            content_types: Vec::new(),
        });
    };

    let tag = selector.to_string();
    let parent = match env.get(&tag) {
        Some(EnvEntry::Cms(item)) => item,
        Some(EnvEntry::Plain(_)) => {
            return Err(StrapiError::ConfigError(format!(
                "root '{tag}' in path '{path}' is not backed by the CMS"
            )))
        }
        None => {
            return Err(StrapiError::ConfigError(format!(
                "root '{tag}' in path '{path}' is not in the data environment; a new root can't have a path"
            )))
        }
    };

    let resolution = traverse_schema(
        &tag,
        Some(&parent.item),
        parent.info.root_schema.as_ref(),
        rest,
    );
    if !resolution.is_resolved() {
        debug!(path = %path, "new root has no schema at its path");
    }

    let mut content_types = parent.info.content_types.clone();
    content_types.extend(resolution.content_types.unwrap_or_default());

    Ok(RootInfo {
        root_schema: resolution.schema,
        content_types,
    })
}

/// Content types touched by `path`, inherited ones first.
///
/// Returns an empty list when the root is missing or not CMS-backed.
pub fn get_all_content_types(env: &DataEnv, path: &ObjectPath) -> Vec<ContentTypeRef> {
    let Some((selector, rest)) = path.split_root() else {
        return Vec::new();
    };
    let tag = selector.to_string();
    let Some(parent) = env.cms_item(&tag) else {
        return Vec::new();
    };

    let mut content_types = parent.info.content_types.clone();
    content_types.extend(
        traverse_schema(
            &tag,
            Some(&parent.item),
            parent.info.root_schema.as_ref(),
            rest,
        )
        .content_types
        .unwrap_or_default(),
    );
    content_types
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object_path;
    use crate::schema::parse_schema;

    fn schema(value: JsonValue) -> SchemaNode {
        parse_schema(&value).unwrap()
    }

    #[test]
    fn empty_path_returns_schema_unchanged() {
        let s = schema(json!({"name": "string"}));
        let res = traverse_schema("strapiItem", Some(&json!({})), Some(&s), &[]);
        assert_eq!(res.schema, Some(s));
        assert_eq!(res.content_types, Some(vec![]));
    }

    #[test]
    fn field_steps_descend_both_cursors() {
        let s = schema(json!({"seo": {"title": "string"}}));
        let data = json!({"seo": {"title": "Hello"}});
        let res = traverse_schema(
            "strapiItem",
            Some(&data),
            Some(&s),
            object_path!["seo", "title"].steps(),
        );
        assert_eq!(res.schema, Some(SchemaNode::Leaf("string".to_string())));
        assert_eq!(res.content_types, Some(vec![]));
        assert!(res.is_resolved());
    }

    #[test]
    fn relation_recorded_before_consuming_next_step() {
        let s = schema(json!({
            "__uid": "api::restaurant.restaurant",
            "owner": {"__uid": "api::owner.owner", "name": "string"}
        }));
        let data = json!({"id": 4, "owner": {"id": 9, "name": "Ann"}});

        let at_owner = traverse_schema("strapiItem", Some(&data), Some(&s), object_path!["owner"].steps());
        assert_eq!(
            at_owner.content_types,
            Some(vec![ContentTypeRef::new("api::restaurant.restaurant", json!(4))])
        );

        let past_owner = traverse_schema(
            "strapiItem",
            Some(&data),
            Some(&s),
            object_path!["owner", "name"].steps(),
        );
        assert_eq!(
            past_owner.content_types,
            Some(vec![
                ContentTypeRef::new("api::restaurant.restaurant", json!(4)),
                ContentTypeRef::new("api::owner.owner", json!(9)),
            ])
        );
    }

    #[test]
    fn dynamic_zone_selects_alternative_by_discriminator() {
        let s = schema(json!({
            "blocks": [
                {"__component": "A", "text": "string"},
                {"__component": "B", "image": "media"}
            ]
        }));
        let data = json!({"blocks": [{"__component": "B", "image": {"url": "/x.png"}}]});
        let res = traverse_schema(
            "strapiItem",
            Some(&data),
            Some(&s),
            object_path!["blocks", 0usize].steps(),
        );
        assert_eq!(res.schema.unwrap().component(), Some("B"));
    }

    #[test]
    fn current_item_requires_item_marker() {
        let s = schema(json!([{"label": "string"}]));
        let data = json!({"index": 1, "item": {"label": "One"}});

        let ok = traverse_schema(CURRENT_ITEM, Some(&data), Some(&s), object_path!["item", "label"].steps());
        assert_eq!(ok.schema, Some(SchemaNode::Leaf("string".to_string())));

        let bad = traverse_schema(CURRENT_ITEM, Some(&data), Some(&s), object_path!["label"].steps());
        assert_eq!(bad, PathResolution::empty());
        assert!(!bad.is_resolved());
    }

    #[test]
    fn missing_data_terminates_unresolved() {
        let s = schema(json!({"seo": {"title": "string"}}));
        let data = json!({"seo": null});
        let res = traverse_schema("strapiItem", Some(&data), Some(&s), object_path!["seo", "title"].steps());
        assert_eq!(res, PathResolution::unresolved());
    }

    #[test]
    fn missing_element_is_empty_resolution() {
        let s = schema(json!({"tags": ["string"]}));
        let data = json!({"tags": []});
        let res = traverse_schema("strapiItem", Some(&data), Some(&s), object_path!["tags", 0usize].steps());
        assert_eq!(res, PathResolution::empty());
    }

    #[test]
    fn index_step_unwraps_nested_item() {
        let s = schema(json!({"entries": [{"title": "string"}]}));
        let data = json!({"entries": {"item": {"title": "wrapped"}}});
        let res = traverse_schema(
            "strapiItem",
            Some(&data),
            Some(&s),
            object_path!["entries", 3usize, "title"].steps(),
        );
        assert_eq!(res.schema, Some(SchemaNode::Leaf("string".to_string())));
    }
}
