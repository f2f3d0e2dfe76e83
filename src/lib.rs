pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod fields;
pub mod overlay;
pub mod path;
pub mod query;
pub mod schema;
pub mod traverse;

use serde_json::Value as JsonValue;

pub use config::{Credentials, EnvProvider, MapEnvProvider, ProcessEnvProvider};
pub use env::{cms_items, CmsItem, ContentTypeRef, DataEnv, EnvEntry, RootInfo};
pub use error::StrapiError;
pub use fetch::{QueryCache, StrapiClient};
pub use fields::{link_href, repeat_elements, resolve_field, FieldRender, FieldView};
pub use overlay::{
    fill_data_env_with_schema, fill_missing_data_with_schema, is_placeholder, OverlayOptions,
};
pub use path::{get_path, ObjectPath, PathStep};
pub use schema::{parse_schema, SchemaNode};
pub use traverse::{compute_root_info, get_all_content_types, traverse_schema, PathResolution};

/// Reads a data-environment document from JSON text.
pub fn load_data_env(input: &str) -> Result<DataEnv, StrapiError> {
    let value: JsonValue = serde_json::from_str(input)
        .map_err(|e| StrapiError::EnvError(format!("invalid data environment JSON: {e}")))?;
    DataEnv::from_json(&value)
}

/// Overlays every CMS root of `env` and serializes the result.
pub fn overlay_env_to_json(
    env: &DataEnv,
    opts: OverlayOptions,
    pretty: bool,
) -> Result<String, StrapiError> {
    let value = JsonValue::Object(fill_data_env_with_schema(env, opts));
    to_json_string(&value, pretty)
}

/// Serializes any value to JSON text.
///
/// When `pretty` is `true`, output is formatted with indentation.
pub fn to_json_string<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, StrapiError> {
    if pretty {
        serde_json::to_string_pretty(value)
            .map_err(|e| StrapiError::SerializationError(e.to_string()))
    } else {
        serde_json::to_string(value).map_err(|e| StrapiError::SerializationError(e.to_string()))
    }
}
