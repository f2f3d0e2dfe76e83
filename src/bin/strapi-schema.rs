use std::{env, fs, path::PathBuf, process::ExitCode};

use serde_json::{json, Value as JsonValue};
use tracing::debug;

use strapi_schema::config::TOKEN_ENV_KEY;
use strapi_schema::{
    compute_root_info, get_all_content_types, load_data_env, overlay_env_to_json, resolve_field,
    to_json_string, Credentials, DataEnv, EnvProvider, MapEnvProvider, ObjectPath,
    OverlayOptions, ProcessEnvProvider, QueryCache, StrapiClient,
};

#[derive(Debug, Default)]
struct OutputOptions {
    pretty: bool,
    tag_placeholders: bool,
    host: Option<String>,
    query: Option<JsonValue>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    if args.len() < 3 {
        return Err("not enough arguments".to_string());
    }

    let command = args[1].as_str();
    debug!(command, "running");

    match command {
        "resolve" | "content-types" | "field" => {
            if args.len() < 4 {
                return Err(format!("{command} requires an environment file and a path"));
            }
            let data_env = read_env(&PathBuf::from(&args[2]))?;
            let path = parse_path_arg(&args[3])?;
            let options = parse_options(&args[4..])?;
            match command {
                "resolve" => run_resolve(&data_env, &path, &options),
                "content-types" => run_content_types(&data_env, &path, &options),
                _ => run_field(&data_env, &path, &options),
            }
        }
        "overlay" => {
            let data_env = read_env(&PathBuf::from(&args[2]))?;
            let options = parse_options(&args[3..])?;
            run_overlay(&data_env, &options)
        }
        "fetch-schema" => {
            let options = parse_options(&args[3..])?;
            run_fetch_schema(&args[2], &options)
        }
        "fetch-collection" => {
            let options = parse_options(&args[3..])?;
            run_fetch_collection(&args[2], &options)
        }
        other => Err(format!("unknown command '{other}'")),
    }
}

fn read_env(file: &PathBuf) -> Result<DataEnv, String> {
    let input = fs::read_to_string(file)
        .map_err(|e| format!("failed to read '{}': {e}", file.display()))?;
    load_data_env(&input).map_err(|e| e.to_string())
}

/// Accepts either a JSON array (`["strapiItem", "tags", 0]`) or dotted text.
fn parse_path_arg(raw: &str) -> Result<ObjectPath, String> {
    if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON path '{raw}': {e}"))
    } else {
        ObjectPath::parse(raw).map_err(|e| e.to_string())
    }
}

fn parse_options(args: &[String]) -> Result<OutputOptions, String> {
    let mut options = OutputOptions::default();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--pretty" => {
                options.pretty = true;
                i += 1;
            }
            "--tag-placeholders" => {
                options.tag_placeholders = true;
                i += 1;
            }
            "--host" => {
                let value = args.get(i + 1).ok_or("--host requires a URL")?;
                options.host = Some(value.clone());
                i += 2;
            }
            "--query" => {
                let value = args.get(i + 1).ok_or("--query requires a JSON object")?;
                let query = serde_json::from_str(value)
                    .map_err(|e| format!("invalid --query JSON: {e}"))?;
                options.query = Some(query);
                i += 2;
            }
            other => return Err(format!("unknown option '{other}'")),
        }
    }

    Ok(options)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), String> {
    let text = to_json_string(value, pretty).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

fn run_resolve(data_env: &DataEnv, path: &ObjectPath, options: &OutputOptions) -> Result<(), String> {
    let info = compute_root_info(data_env, path, None).map_err(|e| e.to_string())?;
    print_json(&info, options.pretty)
}

fn run_content_types(
    data_env: &DataEnv,
    path: &ObjectPath,
    options: &OutputOptions,
) -> Result<(), String> {
    print_json(&get_all_content_types(data_env, path), options.pretty)
}

fn run_field(data_env: &DataEnv, path: &ObjectPath, options: &OutputOptions) -> Result<(), String> {
    let host = options.host.clone().or_else(|| {
        Credentials::from_env(&ProcessEnvProvider)
            .ok()
            .map(|creds| creds.host)
    });
    let render = resolve_field(data_env, Some(path), host.as_deref());
    print_json(&render, options.pretty)
}

fn run_overlay(data_env: &DataEnv, options: &OutputOptions) -> Result<(), String> {
    let overlay_options = OverlayOptions {
        tag_placeholders: options.tag_placeholders,
    };
    let text = overlay_env_to_json(data_env, overlay_options, options.pretty)
        .map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

/// `--host` overrides `STRAPI_HOST`; the token still comes from the process.
fn client(options: &OutputOptions) -> Result<StrapiClient<strapi_schema::fetch::UreqTransport>, String> {
    let creds = match &options.host {
        Some(host) => {
            let token = ProcessEnvProvider.get(TOKEN_ENV_KEY);
            Credentials::from_env(&MapEnvProvider::for_host(host, token.as_deref()))
        }
        None => Credentials::from_env(&ProcessEnvProvider),
    }
    .map_err(|e| e.to_string())?;
    Ok(StrapiClient::new(creds))
}

fn run_fetch_schema(model: &str, options: &OutputOptions) -> Result<(), String> {
    let raw = client(options)?
        .get_model_schema_json(model, options.query.as_ref())
        .map_err(|e| e.to_string())?;
    strapi_schema::parse_schema(&raw).map_err(|e| e.to_string())?;
    print_json(&raw, options.pretty)
}

fn run_fetch_collection(name: &str, options: &OutputOptions) -> Result<(), String> {
    let client = client(options)?;
    let mut cache = QueryCache::new();
    let collection = client
        .load_collection(&mut cache, name, options.query.as_ref())
        .map_err(|e| e.to_string())?;
    print_json(
        &json!({
            "response": collection.response,
            "schema": collection.schema,
        }),
        options.pretty,
    )
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  strapi-schema resolve <env.json> <path> [--pretty]");
    eprintln!("  strapi-schema content-types <env.json> <path> [--pretty]");
    eprintln!("  strapi-schema field <env.json> <path> [--host <url>] [--pretty]");
    eprintln!("  strapi-schema overlay <env.json> [--tag-placeholders] [--pretty]");
    eprintln!("  strapi-schema fetch-schema <model> [--host <url>] [--query <json>] [--pretty]");
    eprintln!("  strapi-schema fetch-collection <name> [--host <url>] [--query <json>] [--pretty]");
    eprintln!();
    eprintln!("paths are dotted text (strapiItem.tags[0].name) or a JSON array.");
    eprintln!("fetch commands read STRAPI_HOST and STRAPI_TOKEN from the environment.");
    eprintln!("set RUST_LOG=debug for resolution traces.");
}
