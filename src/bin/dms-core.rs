//! DMS Core CLI
//!
//! Command-line tooling over an ApiSchema: dependency ordering, document
//! validation, identity derivation and schema linting.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dms_core::{
    calculate_dependencies, coerce_from_strings, extract_document_info, lint, load_json,
    merge_errors, to_schema_errors, validate_decimals, validate_document,
    validate_equality_constraints, ApiSchemaDocument, CompiledSchema, CoreConfig, FileStatus,
    RequestMethod, Severity,
};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dms-core")]
#[command(about = "Validate documents and inspect resources of an ApiSchema")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the load order of every resource
    Dependencies {
        /// ApiSchema source: file path or URL (default: api_schema_path from config)
        #[arg(long, short)]
        schema: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a document against a resource schema
    Validate {
        /// Document file to validate
        payload: PathBuf,

        /// Resource as `{project}/{endpoint}`, e.g. `ed-fi/schools`
        #[arg(long, short)]
        resource: String,

        /// ApiSchema source: file path or URL (default: api_schema_path from config)
        #[arg(long, short)]
        schema: Option<String>,

        /// Validate as POST or PUT
        #[arg(long, default_value = "post")]
        method: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Print the identity, referential id and references of a document
    Identity {
        /// Document file
        payload: PathBuf,

        /// Resource as `{project}/{endpoint}`, e.g. `ed-fi/schools`
        #[arg(long, short)]
        resource: String,

        /// ApiSchema source: file path or URL (default: api_schema_path from config)
        #[arg(long, short)]
        schema: Option<String>,
    },

    /// Lint ApiSchema files for errors
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Dependencies { schema, pretty } => run_dependencies(&config, schema, pretty),
        Commands::Validate {
            payload,
            resource,
            schema,
            method,
            json,
        } => run_validate(&config, &payload, &resource, schema, &method, json),
        Commands::Identity {
            payload,
            resource,
            schema,
        } => run_identity(&config, &payload, &resource, schema),
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_config(path: Option<&Path>) -> Result<CoreConfig, u8> {
    let Some(path) = path else {
        return Ok(CoreConfig::default());
    };
    CoreConfig::load(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn load_schema(config: &CoreConfig, schema: Option<String>) -> Result<ApiSchemaDocument, u8> {
    let Some(source) = schema.or_else(|| config.api_schema_path.clone()) else {
        eprintln!("Error: no ApiSchema given: pass --schema or set api_schema_path");
        return Err(2);
    };
    debug!(%source, "loading ApiSchema");
    ApiSchemaDocument::load(&source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
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

fn run_dependencies(config: &CoreConfig, schema: Option<String>, pretty: bool) -> Result<(), u8> {
    let document = load_schema(config, schema)?;
    let dependencies = calculate_dependencies(&document).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    println!("{}", to_json(&dependencies, pretty)?);
    Ok(())
}

/// Split `ed-fi/schools` into project and endpoint.
fn split_resource(resource: &str) -> Result<(&str, &str), u8> {
    match resource.trim_matches('/').split_once('/') {
        Some((project, endpoint)) if !project.is_empty() && !endpoint.is_empty() => {
            Ok((project, endpoint))
        }
        _ => {
            eprintln!("Error: resource must be `{{project}}/{{endpoint}}`, got `{}`", resource);
            Err(2)
        }
    }
}

fn run_validate(
    config: &CoreConfig,
    payload_path: &Path,
    resource: &str,
    schema: Option<String>,
    method: &str,
    json_output: bool,
) -> Result<(), u8> {
    let method = match RequestMethod::parse(method) {
        Some(m @ (RequestMethod::Post | RequestMethod::Put)) => m,
        _ => {
            report_error(json_output, &format!("method must be post or put, got {}", method));
            return Err(2);
        }
    };
    let (project_endpoint, endpoint) = split_resource(resource)?;
    let document = load_schema(config, schema)?;

    let Some(project) = document.find_project_schema(project_endpoint) else {
        report_error(json_output, &format!("unknown project: {}", project_endpoint));
        return Err(2);
    };
    let Some(resource_schema) = project.find_resource_schema(endpoint) else {
        report_error(json_output, &format!("unknown resource: {}", resource));
        return Err(2);
    };

    let mut payload = load_json(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    if !config.bypass_string_type_coercion {
        coerce_from_strings(resource_schema, &mut payload);
    }

    let compiled = CompiledSchema::compile(
        &resource_schema.resource_name,
        method,
        resource_schema.json_schema_for(method),
    )
    .map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    let mut validation = validate_document(&compiled, &mut payload);
    merge_errors(&mut validation.errors, validate_decimals(resource_schema, &payload));
    if validation.is_valid() {
        merge_errors(
            &mut validation.errors,
            validate_equality_constraints(resource_schema, &payload),
        );
    }

    if validation.is_valid() {
        if json_output {
            let output = serde_json::json!({ "valid": true, "document": payload });
            println!("{}", output);
        } else {
            println!("Valid");
        }
        return Ok(());
    }

    let errors = to_schema_errors(&validation.errors);
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

fn run_identity(
    config: &CoreConfig,
    payload_path: &Path,
    resource: &str,
    schema: Option<String>,
) -> Result<(), u8> {
    let (project_endpoint, endpoint) = split_resource(resource)?;
    let document = load_schema(config, schema)?;

    let Some(project) = document.find_project_schema(project_endpoint) else {
        eprintln!("Error: unknown project: {}", project_endpoint);
        return Err(2);
    };
    let Some(resource_schema) = project.find_resource_schema(endpoint) else {
        eprintln!("Error: unknown resource: {}", resource);
        return Err(2);
    };

    let mut payload = load_json(payload_path).map_err(|e| {
        eprintln!("Error: loading payload: {}", e);
        e.exit_code() as u8
    })?;
    if !config.bypass_string_type_coercion {
        coerce_from_strings(resource_schema, &mut payload);
    }

    let info = extract_document_info(&project.project_name, resource_schema, &payload).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    println!("{}", to_json(&info, true)?);
    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        println!("{}", to_json(&result, true)?);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!(
                    "  {} {} ({} resources)",
                    status_icon,
                    file_result.file.display(),
                    file_result.resources_checked
                );
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
