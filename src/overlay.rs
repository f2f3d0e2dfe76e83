//! Schema overlay of data environments.
//!
//! Every field that has no real data is replaced by its schema shape so that
//! value lookups and placeholder checks work on a single tree. Substituted
//! subtrees can be tagged with `__schema: true` on every object node.

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};

use crate::env::{cms_items, DataEnv, EnvEntry, CURRENT_ITEM};
use crate::path::{get_step, ObjectPath, PathStep};
use crate::schema::{is_placeholder_tagged, ObjectSchema, SchemaNode, COMPONENT_KEY, UID_KEY};
use crate::traverse::ITEM_KEY;

const INDEX_KEY: &str = "index";

/// Options for [`fill_missing_data_with_schema`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayOptions {
    /// Tag substituted schema subtrees as placeholders.
    pub tag_placeholders: bool,
}

impl OverlayOptions {
    pub fn tagged() -> Self {
        Self {
            tag_placeholders: true,
        }
    }
}

/// Merges `data` against `schema`, substituting schema shapes for missing data.
///
/// Without a schema the data is returned unchanged.
pub fn fill_missing_data_with_schema(
    data: &JsonValue,
    schema: Option<&SchemaNode>,
    opts: OverlayOptions,
) -> JsonValue {
    match schema {
        Some(schema) => merge_value(Some(data), schema, opts),
        None => data.clone(),
    }
}

fn substitute(schema: &SchemaNode, opts: OverlayOptions) -> JsonValue {
    if opts.tag_placeholders {
        schema.to_placeholder_json()
    } else {
        schema.to_json()
    }
}

fn merge_value(data: Option<&JsonValue>, schema: &SchemaNode, opts: OverlayOptions) -> JsonValue {
    let value = match data {
        None | Some(JsonValue::Null) => return substitute(schema, opts),
        Some(value) => value,
    };

    match (value, schema) {
        (_, SchemaNode::Leaf(_)) => value.clone(),
        (JsonValue::Object(map), SchemaNode::Object(obj)) => merge_object(map, obj, opts),
        (JsonValue::Array(items), _) if items.is_empty() => substitute(schema, opts),
        (
            JsonValue::Array(items),
            SchemaNode::Repeated(template) | SchemaNode::RelationArray(template),
        ) => JsonValue::Array(
            items
                .iter()
                .map(|item| merge_value(Some(item), template, opts))
                .collect(),
        ),
        (JsonValue::Array(items), SchemaNode::DynamicZone(_)) => JsonValue::Array(
            items
                .iter()
                .map(|item| merge_dynamic_zone_entry(item, schema, opts))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Merges one dynamic-zone entry against the alternative its `__component`
/// names. An entry with no matching alternative keeps its data unchanged
/// instead of collapsing to an empty object.
fn merge_dynamic_zone_entry(item: &JsonValue, zone: &SchemaNode, opts: OverlayOptions) -> JsonValue {
    let component = item.get(COMPONENT_KEY).and_then(JsonValue::as_str);
    match component.and_then(|c| zone.alternative(c)) {
        Some(alternative) => merge_value(Some(item), alternative, opts),
        None => {
            warn!(component = ?component, "dynamic zone entry has no matching schema; keeping data");
            item.clone()
        }
    }
}

fn merge_object(
    data: &JsonMap<String, JsonValue>,
    schema: &ObjectSchema,
    opts: OverlayOptions,
) -> JsonValue {
    let mut out = JsonMap::new();

    if let Some(component) = &schema.component {
        let value = match data.get(COMPONENT_KEY) {
            Some(existing) if !existing.is_null() => existing.clone(),
            _ => JsonValue::String(component.clone()),
        };
        out.insert(COMPONENT_KEY.to_string(), value);
    }

    for (key, field_schema) in &schema.fields {
        out.insert(key.clone(), merge_value(data.get(key), field_schema, opts));
    }

    for (key, value) in data {
        let declared = schema.fields.contains_key(key)
            || (key == UID_KEY && schema.content_type_uid.is_some())
            || (key == COMPONENT_KEY && schema.component.is_some());
        if !declared {
            out.insert(key.clone(), value.clone());
        }
    }

    JsonValue::Object(out)
}

/// Overlays every CMS-backed root of `env`.
///
/// `currentItem` roots keep their `index` and overlay only `item`, against the
/// element shape of the repeated field they were created from.
pub fn fill_data_env_with_schema(env: &DataEnv, opts: OverlayOptions) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();

    for (tag, entry) in env.iter() {
        let EnvEntry::Cms(root) = entry else {
            continue;
        };
        let schema = root.info.root_schema.as_ref();

        let merged = if tag == CURRENT_ITEM {
            let mut wrapper = JsonMap::new();
            if let Some(index) = root.item.get(INDEX_KEY) {
                wrapper.insert(INDEX_KEY.to_string(), index.clone());
            }
            let element_schema = schema.and_then(SchemaNode::first_element);
            let inner = match root.item.get(ITEM_KEY) {
                Some(item) => fill_missing_data_with_schema(item, element_schema, opts),
                None => fill_missing_data_with_schema(&JsonValue::Null, element_schema, opts),
            };
            wrapper.insert(ITEM_KEY.to_string(), inner);
            JsonValue::Object(wrapper)
        } else {
            fill_missing_data_with_schema(&root.item, schema, opts)
        };

        out.insert(tag.to_string(), merged);
    }

    out
}

/// Reports whether `path` lands on placeholder content.
///
/// True when any node along the overlaid path is tagged, or when the overlaid
/// value exists but the raw data has nothing there (untagged leaf shapes such
/// as the `"string"` of a repeated text field). Roots flagged as placeholders
/// count as filler below their item; for `currentItem` the `index` stays real.
pub fn is_placeholder(env: &DataEnv, path: &ObjectPath) -> bool {
    if in_placeholder_root(env, path) {
        debug!(path = %path, "path is inside a placeholder root");
        return true;
    }

    let overlaid = JsonValue::Object(fill_data_env_with_schema(env, OverlayOptions::tagged()));
    let raw = JsonValue::Object(cms_items(env));

    let mut current = Some(&overlaid);
    let mut raw_current = Some(&raw);

    for step in path {
        match current {
            Some(value) if is_placeholder_tagged(value) => return true,
            Some(value) => current = get_step(value, step),
            None => return false,
        }
        raw_current = raw_current.and_then(|value| get_step(value, step));
    }

    match current {
        Some(value) if is_placeholder_tagged(value) => true,
        Some(_) => {
            let missing = raw_current.map_or(true, JsonValue::is_null);
            if missing {
                debug!(path = %path, "value only exists in the schema overlay");
            }
            missing
        }
        None => false,
    }
}

fn in_placeholder_root(env: &DataEnv, path: &ObjectPath) -> bool {
    let mut steps = path.iter();
    let Some(tag) = steps.next().and_then(PathStep::as_field) else {
        return false;
    };
    let Some(root) = env.cms_item(tag) else {
        return false;
    };
    if !root.placeholder {
        return false;
    }
    tag != CURRENT_ITEM || steps.next().and_then(PathStep::as_field) == Some(ITEM_KEY)
}
