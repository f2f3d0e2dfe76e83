//! Data environments: the named roots visible to a component.
//!
//! A [`DataEnv`] is immutable. Providers never mutate the mapping they
//! receive; they return a new one that shadows the tag they publish.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use crate::error::StrapiError;
use crate::path::ObjectPath;
use crate::schema::SchemaNode;
use crate::traverse::compute_root_info;

/// Tag of the root published once per fetched collection entry.
pub const STRAPI_ITEM: &str = "strapiItem";
/// Tag of the root published once per repeated element.
pub const CURRENT_ITEM: &str = "currentItem";

const CMS_FLAG_KEY: &str = "isStrapiItem";

/// A CMS entry reachable from a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeRef {
    /// Content-type uid declared by the schema relation marker.
    pub uid: String,
    /// Record id read from the data at the relation.
    #[serde(default)]
    pub id: JsonValue,
}

impl ContentTypeRef {
    pub fn new(uid: impl Into<String>, id: JsonValue) -> Self {
        Self {
            uid: uid.into(),
            id,
        }
    }

    /// Admin panel URL that edits this entry.
    pub fn edit_url(&self, host: &str) -> String {
        format!(
            "{}/admin/content-manager/collectionType/{}/{}",
            host.trim_end_matches('/'),
            self.uid,
            id_text(&self.id)
        )
    }
}

impl fmt::Display for ContentTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.uid, id_text(&self.id))
    }
}

fn id_text(id: &JsonValue) -> String {
    match id {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => "undefined".to_string(),
        other => other.to_string(),
    }
}

/// Schema and ancestry carried by a CMS-backed root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    #[serde(default)]
    pub root_schema: Option<SchemaNode>,
    #[serde(default)]
    pub content_types: Vec<ContentTypeRef>,
}

/// A CMS-backed named root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmsItem {
    pub item: JsonValue,
    #[serde(default)]
    pub info: RootInfo,
    /// The item is schema filler repeated from an empty or missing list.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

/// One entry of the data environment.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvEntry {
    /// Root published by a CMS provider.
    Cms(CmsItem),
    /// Scope published by any other provider; never overlaid.
    Plain(JsonValue),
}

/// Immutable tag-to-root mapping.
#[derive(Debug, Clone, Default)]
pub struct DataEnv {
    roots: BTreeMap<String, Arc<EnvEntry>>,
}

impl DataEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &str) -> Option<&EnvEntry> {
        self.roots.get(tag).map(Arc::as_ref)
    }

    /// CMS-backed root published under `tag`, if any.
    pub fn cms_item(&self, tag: &str) -> Option<&CmsItem> {
        match self.get(tag)? {
            EnvEntry::Cms(item) => Some(item),
            EnvEntry::Plain(_) => None,
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.roots.contains_key(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvEntry)> {
        self.roots.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Returns a new environment where `tag` resolves to `entry`.
    pub fn with_entry(&self, tag: impl Into<String>, entry: EnvEntry) -> Self {
        let mut roots = self.roots.clone();
        roots.insert(tag.into(), Arc::new(entry));
        Self { roots }
    }

    pub fn with_plain(&self, tag: impl Into<String>, value: JsonValue) -> Self {
        self.with_entry(tag, EnvEntry::Plain(value))
    }

    /// Publishes a CMS root under `name`.
    ///
    /// With an empty `path` the root is new and takes `schema`. Otherwise the
    /// first step names the parent root and the schema and inherited content
    /// types are resolved along the rest of the path.
    pub fn provide_item(
        &self,
        name: &str,
        data: JsonValue,
        schema: Option<SchemaNode>,
        path: &ObjectPath,
    ) -> Result<Self, StrapiError> {
        let info = compute_root_info(self, path, schema)?;
        debug!(
            root = name,
            path = %path,
            content_types = info.content_types.len(),
            has_schema = info.root_schema.is_some(),
            "providing CMS root"
        );
        Ok(self.with_entry(
            name,
            EnvEntry::Cms(CmsItem {
                item: data,
                info,
                placeholder: false,
            }),
        ))
    }

    /// Returns a new environment where the CMS root `tag` is flagged as
    /// placeholder content. Plain or missing roots are left as they are.
    pub fn with_placeholder_root(&self, tag: &str) -> Self {
        match self.cms_item(tag) {
            Some(item) => {
                let mut item = item.clone();
                item.placeholder = true;
                self.with_entry(tag, EnvEntry::Cms(item))
            }
            None => self.clone(),
        }
    }

    /// Reads a data-environment document.
    ///
    /// Entries flagged with `"isStrapiItem": true` are CMS roots with `item`
    /// and `info`; anything else is kept as a plain scope.
    pub fn from_json(value: &JsonValue) -> Result<Self, StrapiError> {
        let map = value.as_object().ok_or_else(|| {
            StrapiError::EnvError("data environment must be a mapping/object".to_string())
        })?;

        let mut roots = BTreeMap::new();
        for (tag, entry) in map {
            let is_cms = entry
                .get(CMS_FLAG_KEY)
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            let parsed = if is_cms {
                let item: CmsItem = serde_json::from_value(entry.clone()).map_err(|e| {
                    StrapiError::EnvError(format!("invalid CMS root '{tag}': {e}"))
                })?;
                EnvEntry::Cms(item)
            } else {
                EnvEntry::Plain(entry.clone())
            };
            roots.insert(tag.clone(), Arc::new(parsed));
        }

        Ok(Self { roots })
    }

    /// Writes the environment back in the [`DataEnv::from_json`] shape.
    pub fn to_json(&self) -> Result<JsonValue, StrapiError> {
        let mut out = JsonMap::new();
        for (tag, entry) in self.iter() {
            let value = match entry {
                EnvEntry::Cms(item) => {
                    let mut value = serde_json::to_value(item)
                        .map_err(|e| StrapiError::SerializationError(e.to_string()))?;
                    if let Some(obj) = value.as_object_mut() {
                        obj.insert(CMS_FLAG_KEY.to_string(), JsonValue::Bool(true));
                    }
                    value
                }
                EnvEntry::Plain(value) => value.clone(),
            };
            out.insert(tag.to_string(), value);
        }
        Ok(JsonValue::Object(out))
    }
}

/// Raw items of every CMS-backed root, keyed by tag.
pub fn cms_items(env: &DataEnv) -> JsonMap<String, JsonValue> {
    env.iter()
        .filter_map(|(tag, entry)| match entry {
            EnvEntry::Cms(item) => Some((tag.to_string(), item.item.clone())),
            EnvEntry::Plain(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object_path;

    #[test]
    fn nested_providers_shadow_without_mutating_parent() {
        let outer = DataEnv::new()
            .provide_item(STRAPI_ITEM, json!({"id": 1}), None, &ObjectPath::default())
            .unwrap();
        let inner = outer
            .provide_item(STRAPI_ITEM, json!({"id": 2}), None, &ObjectPath::default())
            .unwrap();

        assert_eq!(outer.cms_item(STRAPI_ITEM).unwrap().item, json!({"id": 1}));
        assert_eq!(inner.cms_item(STRAPI_ITEM).unwrap().item, json!({"id": 2}));
    }

    #[test]
    fn from_json_separates_cms_and_plain_roots() {
        let env = DataEnv::from_json(&json!({
            "strapiItem": {
                "isStrapiItem": true,
                "item": {"id": 3, "name": "Acme"},
                "info": {"rootSchema": {"name": "string"}, "contentTypes": []}
            },
            "$queries": {"anything": true}
        }))
        .unwrap();

        let item = env.cms_item(STRAPI_ITEM).unwrap();
        assert_eq!(item.item["name"], json!("Acme"));
        assert!(item.info.root_schema.is_some());
        assert!(matches!(env.get("$queries"), Some(EnvEntry::Plain(_))));
        assert_eq!(cms_items(&env).len(), 1);

        let round = env.to_json().unwrap();
        assert_eq!(round["strapiItem"]["isStrapiItem"], json!(true));
        assert_eq!(round["strapiItem"]["info"]["rootSchema"], json!({"name": "string"}));
    }

    #[test]
    fn placeholder_flag_is_per_root_and_survives_json() {
        let env = DataEnv::new()
            .provide_item(STRAPI_ITEM, json!({"id": 1}), None, &ObjectPath::default())
            .unwrap()
            .with_plain("$state", json!({}));
        let flagged = env
            .with_placeholder_root(STRAPI_ITEM)
            .with_placeholder_root("$state");

        assert!(!env.cms_item(STRAPI_ITEM).unwrap().placeholder);
        assert!(flagged.cms_item(STRAPI_ITEM).unwrap().placeholder);
        assert!(matches!(flagged.get("$state"), Some(EnvEntry::Plain(_))));

        let round = DataEnv::from_json(&flagged.to_json().unwrap()).unwrap();
        assert!(round.cms_item(STRAPI_ITEM).unwrap().placeholder);
        assert!(env.to_json().unwrap()[STRAPI_ITEM].get("placeholder").is_none());
    }

    #[test]
    fn from_json_rejects_non_object() {
        let err = DataEnv::from_json(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("environment error"));
    }

    #[test]
    fn edit_url_and_display() {
        let ct = ContentTypeRef::new("api::product.product", json!(12));
        assert_eq!(ct.to_string(), "api::product.product/12");
        assert_eq!(
            ct.edit_url("https://cms.example.com/"),
            "https://cms.example.com/admin/content-manager/collectionType/api::product.product/12"
        );
    }

    #[test]
    fn provide_item_with_unknown_parent_fails() {
        let err = DataEnv::new()
            .provide_item(CURRENT_ITEM, json!({}), None, &object_path!["ghostRoot", "field"])
            .unwrap_err();
        assert!(err.to_string().contains("configuration error"));
    }
}
