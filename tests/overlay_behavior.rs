use serde_json::{json, Value as JsonValue};

use strapi_schema::env::{CURRENT_ITEM, STRAPI_ITEM};
use strapi_schema::fields::{repeat_elements, RepeatedElements};
use strapi_schema::{
    fill_data_env_with_schema, fill_missing_data_with_schema, is_placeholder, object_path,
    parse_schema, resolve_field, DataEnv, FieldView, ObjectPath, OverlayOptions, SchemaNode,
};

fn schema(value: JsonValue) -> SchemaNode {
    parse_schema(&value).unwrap()
}

fn nav_schema() -> SchemaNode {
    schema(json!({
        "__uid": "api::nav.nav",
        "title": "string",
        "logo": {"__uid": "media-model"},
        "tags": ["string"],
        "menu": [{"__uid": "api::link.link", "label": "string", "children": [{"label": "string"}]}]
    }))
}

fn nav_env(item: JsonValue) -> DataEnv {
    DataEnv::new()
        .provide_item(STRAPI_ITEM, item, Some(nav_schema()), &ObjectPath::default())
        .unwrap()
}

#[test]
fn end_to_end_null_relation_example() {
    let s = schema(json!({"name": "string", "cover": {"__uid": "media-model"}}));
    let out = fill_missing_data_with_schema(
        &json!({"name": "Acme", "cover": null}),
        Some(&s),
        OverlayOptions::tagged(),
    );
    assert_eq!(
        out,
        json!({"name": "Acme", "cover": {"__uid": "media-model", "__schema": true}})
    );
}

#[test]
fn empty_repeated_leaf_is_placeholder() {
    let env = nav_env(json!({"id": 1, "title": "Main", "tags": []}));
    let overlaid = fill_data_env_with_schema(&env, OverlayOptions::tagged());
    assert_eq!(overlaid[STRAPI_ITEM]["tags"], json!(["string"]));
    assert!(is_placeholder(&env, &object_path![STRAPI_ITEM, "tags", 0usize]));
    assert!(!is_placeholder(&env, &object_path![STRAPI_ITEM, "title"]));
}

#[test]
fn deep_lookup_into_substituted_subtree_sees_tag() {
    let env = nav_env(json!({"id": 1, "title": "Main"}));
    let overlaid = fill_data_env_with_schema(&env, OverlayOptions::tagged());
    assert_eq!(overlaid[STRAPI_ITEM]["menu"][0]["children"][0]["__schema"], json!(true));
    assert!(is_placeholder(
        &env,
        &object_path![STRAPI_ITEM, "menu", 0usize, "children", 0usize, "label"]
    ));
    assert!(is_placeholder(&env, &object_path![STRAPI_ITEM, "logo"]));
}

#[test]
fn non_cms_roots_are_left_out() {
    let env = nav_env(json!({"id": 1})).with_plain("$ctx", json!({"x": 1}));
    let overlaid = fill_data_env_with_schema(&env, OverlayOptions::default());
    assert!(overlaid.contains_key(STRAPI_ITEM));
    assert!(!overlaid.contains_key("$ctx"));
}

#[test]
fn current_item_overlays_only_inner_item() {
    let env = nav_env(json!({
        "id": 1,
        "menu": [{"id": 5, "label": "Home", "children": []}]
    }));
    let RepeatedElements::Scopes(scopes) =
        repeat_elements(&env, Some(&object_path![STRAPI_ITEM, "menu"])).unwrap()
    else {
        panic!("expected scopes");
    };
    assert_eq!(scopes.len(), 1);

    let scope = &scopes[0].env;
    let overlaid = fill_data_env_with_schema(scope, OverlayOptions::tagged());
    let current = &overlaid[CURRENT_ITEM];
    assert_eq!(current["index"], json!(1));
    assert_eq!(current["item"]["label"], json!("Home"));
    assert_eq!(
        current["item"]["children"],
        json!([{"label": "string", "__schema": true}])
    );

    assert!(!is_placeholder(scope, &object_path![CURRENT_ITEM, "item", "label"]));
    assert!(is_placeholder(
        scope,
        &object_path![CURRENT_ITEM, "item", "children", 0usize, "label"]
    ));
}

#[test]
fn repeating_a_placeholder_list_keeps_the_tag() {
    let env = nav_env(json!({"id": 1, "menu": []}));
    let RepeatedElements::Scopes(scopes) =
        repeat_elements(&env, Some(&object_path![STRAPI_ITEM, "menu"])).unwrap()
    else {
        panic!("expected scopes");
    };
    assert_eq!(scopes.len(), 1);
    assert!(scopes[0].primary);
    assert!(is_placeholder(
        &scopes[0].env,
        &object_path![CURRENT_ITEM, "item", "label"]
    ));
}

#[test]
fn repeating_an_empty_leaf_list_keeps_placeholder_status() {
    let env = nav_env(json!({"id": 1, "title": "Main", "tags": []}));
    let RepeatedElements::Scopes(scopes) =
        repeat_elements(&env, Some(&object_path![STRAPI_ITEM, "tags"])).unwrap()
    else {
        panic!("expected scopes");
    };
    assert_eq!(scopes.len(), 1);
    assert!(scopes[0].placeholder);

    let scope = &scopes[0].env;
    assert!(is_placeholder(scope, &object_path![CURRENT_ITEM, "item"]));
    assert!(!is_placeholder(scope, &object_path![CURRENT_ITEM, "index"]));
    assert!(!is_placeholder(scope, &object_path![STRAPI_ITEM, "title"]));
    assert_eq!(
        resolve_field(scope, Some(&object_path![CURRENT_ITEM, "item"]), None).view,
        FieldView::Placeholder {
            value: json!("string")
        }
    );
}

#[test]
fn repeating_real_leaves_is_not_placeholder() {
    let env = nav_env(json!({"id": 1, "tags": ["news"]}));
    let RepeatedElements::Scopes(scopes) =
        repeat_elements(&env, Some(&object_path![STRAPI_ITEM, "tags"])).unwrap()
    else {
        panic!("expected scopes");
    };
    assert!(!scopes[0].placeholder);
    assert_eq!(
        resolve_field(&scopes[0].env, Some(&object_path![CURRENT_ITEM, "item"]), None).view,
        FieldView::Text {
            text: "news".to_string()
        }
    );
}

#[test]
fn overlay_is_repeatable() {
    let env = nav_env(json!({"id": 1, "title": "Main", "tags": ["a"]}));
    let first = fill_data_env_with_schema(&env, OverlayOptions::tagged());
    let second = fill_data_env_with_schema(&env, OverlayOptions::tagged());
    assert_eq!(first, second);
}
