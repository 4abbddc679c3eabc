//! ApiSchema linting - static analysis of ApiSchema files.
//!
//! Checks each file for:
//! - JSON syntax errors
//! - Resource schemas missing required fields
//! - `jsonSchemaForInsert` documents that do not compile
//! - Non-descriptor resources without identity paths

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::compiled_cache::CompiledSchema;
use crate::json_path::escape_pointer_token;
use crate::loader::load_json;
use crate::resource_schema::ResourceSchema;
use crate::types::{json_type_name, RequestMethod};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON pointer to the issue (e.g., "/projectSchemas/ed-fi/resourceSchemas/schools")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    pub resources_checked: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, warnings count as failures.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_schema_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += count(&file_result.diagnostics, Severity::Error);
        total_warnings += count(&file_result.diagnostics, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

struct Collector<'a> {
    file: &'a Path,
    diagnostics: Vec<Diagnostic>,
}

impl Collector<'_> {
    fn push(&mut self, severity: Severity, code: &str, path: String, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.to_path_buf(),
            path,
            message,
        });
    }
}

/// Lint a single ApiSchema file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut collector = Collector {
        file,
        diagnostics: Vec::new(),
    };
    let mut resources_checked = 0;

    match load_json(file) {
        Ok(root) => resources_checked = check_api_schema(&root, &mut collector),
        Err(e) => collector.push(
            Severity::Error,
            "E001",
            "/".to_string(),
            format!("syntax error: {}", e),
        ),
    }

    let diagnostics = collector.diagnostics;
    let status = if count(&diagnostics, Severity::Error) > 0 {
        FileStatus::Error
    } else if count(&diagnostics, Severity::Warning) > 0 {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        resources_checked,
        diagnostics,
    }
}

/// Check every resource schema under `projectSchemas`. Returns how many were seen.
fn check_api_schema(root: &Value, collector: &mut Collector<'_>) -> usize {
    let Some(projects) = root.get("projectSchemas") else {
        collector.push(
            Severity::Error,
            "E002",
            "/".to_string(),
            "missing field `projectSchemas`".to_string(),
        );
        return 0;
    };
    let Value::Object(projects) = projects else {
        collector.push(
            Severity::Error,
            "E002",
            "/projectSchemas".to_string(),
            format!("expected object, got {}", json_type_name(projects)),
        );
        return 0;
    };

    let mut checked = 0;
    for (endpoint, project) in projects {
        let project_path = format!("/projectSchemas/{}", escape_pointer_token(endpoint));
        let Some(Value::Object(resources)) = project.get("resourceSchemas") else {
            collector.push(
                Severity::Error,
                "E002",
                project_path,
                "missing or malformed `resourceSchemas`".to_string(),
            );
            continue;
        };

        for (resource_endpoint, node) in resources {
            let path = format!(
                "{}/resourceSchemas/{}",
                project_path,
                escape_pointer_token(resource_endpoint)
            );
            checked += 1;
            check_resource(&path, node, collector);
        }
    }
    checked
}

fn check_resource(path: &str, node: &Value, collector: &mut Collector<'_>) {
    let schema = match ResourceSchema::from_node(path, node) {
        Ok(schema) => schema,
        Err(e) => {
            collector.push(Severity::Error, "E002", path.to_string(), e.to_string());
            return;
        }
    };

    if let Err(e) = CompiledSchema::compile(
        &schema.resource_name,
        RequestMethod::Post,
        &schema.json_schema_for_insert,
    ) {
        collector.push(
            Severity::Error,
            "E003",
            format!("{}/jsonSchemaForInsert", path),
            e.to_string(),
        );
    }

    if !schema.is_descriptor
        && !schema.is_school_year_enumeration
        && schema.identity_json_paths.is_empty()
    {
        collector.push(
            Severity::Warning,
            "W001",
            format!("{}/identityJsonPaths", path),
            format!("resource {} declares no identity paths", schema.resource_name),
        );
    }
}

/// Collect all .json files in a path (file or directory).
fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}
