//! Query-string serialization in the bracket style the CMS REST API reads.
//!
//! `{"filters": {"name": {"$eq": "Acme"}}, "populate": ["cover"]}` becomes
//! `filters[name][$eq]=Acme&populate[0]=cover` (keys percent-encoded unless
//! [`QsOptions::encode_values_only`] is set).

use serde_json::Value as JsonValue;

/// Options for [`stringify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QsOptions {
    /// Leave keys (and their brackets) unencoded.
    pub encode_values_only: bool,
}

/// Serializes an object into a query string. Non-objects produce `""`.
pub fn stringify(value: &JsonValue, opts: QsOptions) -> String {
    let Some(map) = value.as_object() else {
        return String::new();
    };

    let mut pairs = Vec::new();
    for (key, child) in map {
        collect_pairs(key, child, opts, &mut pairs);
    }
    pairs.join("&")
}

fn collect_pairs(prefix: &str, value: &JsonValue, opts: QsOptions, out: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                collect_pairs(&format!("{prefix}[{key}]"), child, opts, out);
            }
        }
        JsonValue::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_pairs(&format!("{prefix}[{i}]"), child, opts, out);
            }
        }
        scalar => {
            let key = if opts.encode_values_only {
                prefix.to_string()
            } else {
                percent_encode(prefix)
            };
            out.push(format!("{key}={}", percent_encode(&scalar_text(scalar))));
        }
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// RFC 3986 encoding: unreserved characters pass, everything else is `%XX`.
pub fn percent_encode(text: &str) -> String {
    urlencoding::encode(text).into_owned()
}
