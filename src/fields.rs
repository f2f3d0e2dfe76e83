//! Consumer decisions built on the resolver and the overlay.
//!
//! These mirror what the page-builder components do with a data environment:
//! pick what a field shows, expand repeated elements and collections into
//! child scopes, and read link targets.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::env::{cms_items, ContentTypeRef, DataEnv, CURRENT_ITEM, STRAPI_ITEM};
use crate::error::StrapiError;
use crate::overlay::{fill_data_env_with_schema, is_placeholder, OverlayOptions};
use crate::path::{get_path, is_truthy, ObjectPath};
use crate::schema::SchemaNode;
use crate::traverse::get_all_content_types;

/// What a field component renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldView {
    /// No collection entry in scope.
    OutsideCollection,
    /// No field selected.
    MissingPath,
    /// Nothing at the selected path.
    InvalidField,
    /// Schema filler standing in for missing data.
    Placeholder { value: JsonValue },
    /// Image media with an absolute URL.
    Image {
        url: String,
        width: Option<u64>,
        height: Option<u64>,
    },
    /// The path selects an object or list rather than a value.
    NotALeaf,
    Text { text: String },
}

/// Field decision plus the entries an editor may open for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRender {
    pub view: FieldView,
    pub content_types: Vec<ContentTypeRef>,
}

/// Decides what the field at `path` renders.
///
/// `host` prefixes relative media URLs.
pub fn resolve_field(env: &DataEnv, path: Option<&ObjectPath>, host: Option<&str>) -> FieldRender {
    let render = |view| FieldRender {
        view,
        content_types: Vec::new(),
    };

    if env.is_empty() || !env.contains(STRAPI_ITEM) {
        return render(FieldView::OutsideCollection);
    }
    let Some(path) = path.filter(|p| !p.is_empty()) else {
        return render(FieldView::MissingPath);
    };

    let overlaid = JsonValue::Object(fill_data_env_with_schema(env, OverlayOptions::tagged()));
    let content_types = get_all_content_types(env, path);
    let data = get_path(&overlaid, path).filter(|v| is_truthy(v));

    let view = match data {
        None => FieldView::InvalidField,
        Some(value) if is_placeholder(env, path) => FieldView::Placeholder {
            value: value.clone(),
        },
        Some(value) => match image_attributes(value) {
            Some(attrs) => image_view(attrs, host),
            None if value.is_object() || value.is_array() => FieldView::NotALeaf,
            None => FieldView::Text {
                text: scalar_text(value),
            },
        },
    };
    debug!(path = %path, view = ?view, "resolved field");

    FieldRender {
        view,
        content_types,
    }
}

fn image_attributes(value: &JsonValue) -> Option<&JsonValue> {
    let attrs = value.get("data")?.get("attributes")?;
    let mime = attrs.get("mime")?.as_str()?;
    mime.starts_with("image").then_some(attrs)
}

fn image_view(attrs: &JsonValue, host: Option<&str>) -> FieldView {
    let url = attrs.get("url").and_then(JsonValue::as_str).unwrap_or_default();
    let url = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("{}{}", host.unwrap_or_default(), url)
    };
    FieldView::Image {
        url,
        width: attrs.get("width").and_then(JsonValue::as_u64),
        height: attrs.get("height").and_then(JsonValue::as_u64),
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One child scope produced by a repeater.
#[derive(Debug, Clone)]
pub struct RepeatedScope {
    /// Zero-based position among the repeats.
    pub position: usize,
    /// The first repeat is the one edited at design time.
    pub primary: bool,
    /// The element only exists in the schema overlay.
    pub placeholder: bool,
    pub env: DataEnv,
}

/// Outcome of [`repeat_elements`].
#[derive(Debug, Clone)]
pub enum RepeatedElements {
    MissingPath,
    /// The overlaid value at the path is not a list.
    InvalidField,
    Scopes(Vec<RepeatedScope>),
}

/// Expands the list at `path` into one `currentItem` scope per element.
///
/// Each scope publishes `{ index: position + 1, item }` where `item` comes
/// from the overlaid environment, so empty lists repeat their schema shape.
/// Scopes built from schema filler are flagged so fields inside them still
/// render as placeholders.
pub fn repeat_elements(
    env: &DataEnv,
    path: Option<&ObjectPath>,
) -> Result<RepeatedElements, StrapiError> {
    let Some(path) = path.filter(|p| !p.is_empty()) else {
        return Ok(RepeatedElements::MissingPath);
    };

    let overlaid = JsonValue::Object(fill_data_env_with_schema(env, OverlayOptions::tagged()));
    let Some(JsonValue::Array(items)) = get_path(&overlaid, path) else {
        return Ok(RepeatedElements::InvalidField);
    };

    let mut scopes = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let mut element_path = path.clone();
        element_path.push(position);
        let placeholder = is_placeholder(env, &element_path);

        let data = serde_json::json!({ "index": position + 1, "item": item });
        let mut scope = env.provide_item(CURRENT_ITEM, data, None, path)?;
        if placeholder {
            scope = scope.with_placeholder_root(CURRENT_ITEM);
        }
        scopes.push(RepeatedScope {
            position,
            primary: position == 0,
            placeholder,
            env: scope,
        });
    }
    debug!(path = %path, count = scopes.len(), "expanded repeated elements");

    Ok(RepeatedElements::Scopes(scopes))
}

/// Expands a collection response into one `strapiItem` scope per entry.
///
/// Every entry becomes a new root carrying the collection schema.
pub fn collection_scopes(
    env: &DataEnv,
    response: &JsonValue,
    schema: Option<&SchemaNode>,
) -> Result<Vec<RepeatedScope>, StrapiError> {
    let entries = response
        .get("data")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| {
            StrapiError::FetchError("collection response has no 'data' list".to_string())
        })?;

    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| -> Result<RepeatedScope, StrapiError> {
            Ok(RepeatedScope {
                position,
                primary: position == 0,
                placeholder: false,
                env: env.provide_item(
                    STRAPI_ITEM,
                    entry.clone(),
                    schema.cloned(),
                    &ObjectPath::default(),
                )?,
            })
        })
        .collect()
}

/// Link target at `path`, read from the raw CMS items.
pub fn link_href(env: &DataEnv, path: Option<&ObjectPath>) -> Option<String> {
    let path = path.filter(|p| !p.is_empty())?;
    let items = JsonValue::Object(cms_items(env));
    get_path(&items, path)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}
