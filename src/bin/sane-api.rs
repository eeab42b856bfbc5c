//! Sane API CLI
//!
//! Command-line interface for parsing selections, rendering entities and
//! accepting write payloads against schema descriptors.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sane_api::{
    accept, load_json, load_schema_auto, render, render_many, AcceptError, Capability, Entity,
    Grants, Method, Principal, Request, Selection, WithCapabilities, FIELDS_PARAM,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sane-api")]
#[command(about = "Render and accept entities through field-selecting schemas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a selection string and print its tree as JSON
    Fields {
        /// Selection string, e.g. "one,two{one,two},three"
        selection: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Render an entity (or a list of entities) through a schema
    Render {
        /// Schema descriptor: file path or URL (http:// or https://)
        schema: String,

        /// Entity file: a JSON object, or an array of objects
        entity: PathBuf,

        /// Selection string, as sent in the `fields` query parameter (all readable fields if omitted)
        #[arg(long = FIELDS_PARAM, short)]
        fields: Option<String>,

        /// Request method
        #[arg(long, short, default_value = "GET")]
        method: Method,

        /// Acting principal id (anonymous if omitted)
        #[arg(long)]
        principal: Option<String>,

        /// Capability granted on top-level entities (destroy, retrieve, update).
        /// Nested entities get no grants, so rendering a readable nested
        /// `permissions` fails with exit code 1.
        #[arg(long = "grant")]
        grants: Vec<Capability>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Filter and validate a write payload through a schema
    Accept {
        /// Schema descriptor: file path or URL (http:// or https://)
        schema: String,

        /// Payload file to accept
        payload: PathBuf,

        /// Request method
        #[arg(long, short, default_value = "POST")]
        method: Method,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fields { selection, pretty } => run_fields(&selection, pretty),
        Commands::Render {
            schema,
            entity,
            fields,
            method,
            principal,
            grants,
            output,
            pretty,
        } => run_render(RenderArgs {
            schema,
            entity,
            fields,
            method,
            principal,
            grants,
            output,
            pretty,
        }),
        Commands::Accept {
            schema,
            payload,
            method,
            json,
        } => run_accept(&schema, &payload, method, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_fields(selection: &str, pretty: bool) -> Result<(), u8> {
    let tree = Selection::parse(selection).map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;
    println!("{}", to_json(&tree, pretty)?);
    Ok(())
}

struct RenderArgs {
    schema: String,
    entity: PathBuf,
    fields: Option<String>,
    method: Method,
    principal: Option<String>,
    grants: Vec<Capability>,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_render(args: RenderArgs) -> Result<(), u8> {
    let RenderArgs {
        schema: schema_source,
        entity: entity_path,
        fields,
        method,
        principal,
        grants,
        output,
        pretty,
    } = args;

    let schema = load_schema_auto(&schema_source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let document = load_json(&entity_path).map_err(|e| {
        eprintln!("Error loading entity: {}", e);
        e.exit_code() as u8
    })?;
    let selection = Selection::parse_opt(fields.as_deref()).map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;

    let mut request = Request::new(method);
    if let Some(fields) = fields {
        request = request.fields(fields);
    }
    if let Some(id) = principal {
        request = request.principal(Principal::new(id));
    }
    let grants: Grants = grants.into_iter().collect();

    let rendered = match document {
        Value::Array(items) => {
            let entities: Vec<_> = items
                .into_iter()
                .map(|item| WithCapabilities::new(item, grants.clone()))
                .collect();
            render_many(
                &schema,
                entities.iter().map(|e| e as &dyn Entity),
                &request,
                selection.as_ref(),
            )
            .map(Value::Array)
        }
        single => {
            let entity = WithCapabilities::new(single, grants);
            render(&schema, &entity, &request, selection.as_ref()).map(Value::Object)
        }
    }
    .map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = to_json(&rendered, pretty)?;
    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_accept(
    schema_source: &str,
    payload_path: &Path,
    method: Method,
    json_output: bool,
) -> Result<(), u8> {
    let schema = load_schema_auto(schema_source).map_err(|e| {
        report_error(json_output, &format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;
    let payload = load_json(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    let request = Request::new(method).payload(payload);

    match accept(&schema, &request) {
        Ok(validated) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": true,
                    "data": validated
                });
                println!("{}", output);
            } else {
                println!("{}", Value::Object(validated));
            }
            Ok(())
        }
        Err(AcceptError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
