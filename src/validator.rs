//! Document validation against compiled resource schemas.
//!
//! Validation may mutate the body. One pass each of overpost pruning, null
//! pruning and whitespace trimming runs, in that order; a pass that changes
//! the body triggers exactly one re-evaluation. Whatever fails after the
//! last pass is rendered into a path -> messages map.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use jsonschema::error::ValidationErrorKind;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::compiled_cache::CompiledSchema;
use crate::error::SchemaError;
use crate::json_path::{
    escape_pointer_token, pointer_to_json_path, pointer_tokens, remove_at_pointer, split_pointer,
    value_at_pointer,
};
use crate::resource_schema::ResourceSchema;

/// Path (`$.a.b`) -> messages for that path.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

/// String fields whose surrounding whitespace is silently trimmed.
pub const TRIMMABLE_FIELDS: &[&str] = &["codeValue", "shortDescription"];

/// What the pruning passes removed or changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub overposted: usize,
    pub nulls: usize,
    pub trimmed: usize,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.overposted == 0 && self.nulls == 0 && self.trimmed == 0
    }
}

/// Result of validating one document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocumentValidation {
    pub errors: ValidationErrors,
    pub pruned: PruneReport,
}

impl DocumentValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FailureKind {
    AdditionalProperties(Vec<String>),
    Required(String),
    Pattern,
    Type,
    MinItems,
    Other,
}

/// An owned copy of a validation error, so the document can be mutated.
#[derive(Debug, Clone)]
struct Failure {
    pointer: String,
    kind: FailureKind,
    message: String,
}

fn evaluate(compiled: &CompiledSchema, document: &Value) -> Vec<Failure> {
    compiled
        .validator()
        .iter_errors(document)
        .map(|e| {
            let kind = match &e.kind {
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    FailureKind::AdditionalProperties(unexpected.clone())
                }
                ValidationErrorKind::Required { property } => FailureKind::Required(
                    property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string()),
                ),
                ValidationErrorKind::Pattern { .. } => FailureKind::Pattern,
                ValidationErrorKind::Type { .. } => FailureKind::Type,
                ValidationErrorKind::MinItems { .. } => FailureKind::MinItems,
                _ => FailureKind::Other,
            };
            Failure {
                pointer: e.instance_path.to_string(),
                kind,
                message: e.to_string(),
            }
        })
        .collect()
}

/// Validate `document` in place, pruning and trimming as described above.
pub fn validate_document(compiled: &CompiledSchema, document: &mut Value) -> DocumentValidation {
    let mut pruned = PruneReport::default();
    let mut failures = evaluate(compiled, document);

    if !failures.is_empty() {
        pruned.overposted = prune_overposted(document, &failures);
        if pruned.overposted > 0 {
            debug!(count = pruned.overposted, "pruned overposted data");
            failures = evaluate(compiled, document);
        }
    }

    if !failures.is_empty() {
        pruned.nulls = prune_nulls(document, &failures);
        if pruned.nulls > 0 {
            debug!(count = pruned.nulls, "pruned null values");
            failures = evaluate(compiled, document);
        }
    }

    if !failures.is_empty() {
        pruned.trimmed = trim_whitespace(document, &failures);
        if pruned.trimmed > 0 {
            debug!(count = pruned.trimmed, "trimmed whitespace");
            failures = evaluate(compiled, document);
        }
    }

    DocumentValidation {
        errors: render(&failures, document),
        pruned,
    }
}

/// Whether `value` is an array that holds nothing but empty objects, or nothing at all.
fn is_empty_array(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .all(|item| item.as_object().is_some_and(|o| o.is_empty())),
        _ => false,
    }
}

/// The array holding the item at `pointer`, when the last token is an index.
fn enclosing_array(pointer: &str) -> Option<String> {
    let (array_pointer, index) = split_pointer(pointer)?;
    (!index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())).then_some(array_pointer)
}

/// Remove properties the schema does not define, and arrays the evaluation
/// reports at, or inside, that are empty or hold only empty objects.
fn prune_overposted(document: &mut Value, failures: &[Failure]) -> usize {
    let mut removed = 0;
    let mut candidates = BTreeSet::new();

    for failure in failures {
        if let FailureKind::AdditionalProperties(unexpected) = &failure.kind {
            for property in unexpected {
                let pointer = format!("{}/{}", failure.pointer, escape_pointer_token(property));
                if remove_at_pointer(document, &pointer) {
                    removed += 1;
                }
            }
        }
        candidates.insert(failure.pointer.clone());
        if let Some(array_pointer) = enclosing_array(&failure.pointer) {
            candidates.insert(array_pointer);
        }
    }

    // Checked after property removal, so objects emptied above count as empty.
    let empty_arrays: Vec<String> = candidates
        .into_iter()
        .filter(|pointer| is_empty_array(value_at_pointer(document, pointer)))
        .collect();

    for pointer in empty_arrays {
        if remove_at_pointer(document, &pointer) {
            removed += 1;
        }
    }

    removed
}

/// Remove object properties whose value is null.
fn prune_nulls(document: &mut Value, failures: &[Failure]) -> usize {
    let mut null_properties = BTreeSet::new();
    for failure in failures.iter().filter(|f| f.kind == FailureKind::Type) {
        if !matches!(value_at_pointer(document, &failure.pointer), Some(Value::Null)) {
            continue;
        }
        let Some((parent, _)) = split_pointer(&failure.pointer) else {
            continue;
        };
        if matches!(value_at_pointer(document, &parent), Some(Value::Object(_))) {
            null_properties.insert(failure.pointer.clone());
        }
    }

    null_properties
        .iter()
        .filter(|pointer| remove_at_pointer(document, pointer))
        .count()
}

/// Trim trimmable string fields that failed their pattern.
fn trim_whitespace(document: &mut Value, failures: &[Failure]) -> usize {
    let mut trimmed = 0;
    for failure in failures.iter().filter(|f| f.kind == FailureKind::Pattern) {
        let is_trimmable = pointer_tokens(&failure.pointer)
            .last()
            .is_some_and(|name| TRIMMABLE_FIELDS.contains(&name.as_str()));
        if !is_trimmable {
            continue;
        }
        if let Some(Value::String(s)) = document.pointer_mut(&failure.pointer) {
            let clean = s.trim();
            if clean.len() != s.len() {
                *s = clean.to_string();
                trimmed += 1;
            }
        }
    }
    trimmed
}

/// The nearest non-index token of a pointer, used to name the offending property.
fn property_name(pointer: &str) -> String {
    pointer_tokens(pointer)
        .into_iter()
        .rev()
        .find(|t| !t.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or_default()
}

fn render(failures: &[Failure], document: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for failure in failures {
        let path = pointer_to_json_path(&failure.pointer);
        let (key, message) = match &failure.kind {
            FailureKind::Required(property) => (
                format!("{}.{}", path, property),
                format!("{} is required.", property),
            ),
            FailureKind::Pattern => {
                let property = property_name(&failure.pointer);
                let message = match value_at_pointer(document, &failure.pointer) {
                    Some(Value::String(s)) if s.is_empty() => {
                        format!("{} is required and should not be left empty.", property)
                    }
                    _ => format!("{} cannot contain leading or trailing spaces.", property),
                };
                (path, message)
            }
            _ => {
                let property = property_name(&failure.pointer);
                let message = if property.is_empty() {
                    failure.message.clone()
                } else {
                    format!("{} {}", property, failure.message)
                };
                (path, message)
            }
        };

        let messages = errors.entry(key).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    errors
}

/// Flatten an error map into `SchemaError` records.
pub fn to_schema_errors(errors: &ValidationErrors) -> Vec<SchemaError> {
    errors
        .iter()
        .flat_map(|(path, messages)| {
            messages.iter().map(move |message| SchemaError {
                path: path.clone(),
                message: message.clone(),
            })
        })
        .collect()
}

/// Largest magnitude a decimal with this precision can hold:
/// `10^(total_digits - decimal_places) - 10^-decimal_places`.
pub fn decimal_bound(total_digits: u32, decimal_places: u32) -> Option<Decimal> {
    if decimal_places > total_digits {
        return None;
    }
    let mantissa = 10_i128.checked_pow(total_digits)?.checked_sub(1)?;
    Decimal::try_from_i128_with_scale(mantissa, decimal_places).ok()
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Check decimal-typed properties against their total-digits/decimal-places envelope.
pub fn validate_decimals(schema: &ResourceSchema, document: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for info in &schema.decimal_validation_infos {
        let (Some(total_digits), Some(decimal_places)) = (info.total_digits, info.decimal_places)
        else {
            continue;
        };
        let Some(max) = decimal_bound(total_digits, decimal_places) else {
            warn!(
                path = %info.path,
                total_digits,
                decimal_places,
                "unusable decimal precision in resource schema"
            );
            continue;
        };
        let min = -max;
        let property = info.path.last_property_name().unwrap_or_default();

        for (path, value) in info.path.select_with_paths(document) {
            let Value::Number(number) = value else {
                continue;
            };
            let in_range = parse_decimal(&number.to_string())
                .is_some_and(|decimal| decimal >= min && decimal <= max);
            if !in_range {
                errors.entry(path).or_default().push(format!(
                    "{} must be between {} and {}.",
                    property, min, max
                ));
            }
        }
    }

    errors
}

/// Merge `other` into `errors`, keeping messages unique per path.
pub fn merge_errors(errors: &mut ValidationErrors, other: ValidationErrors) {
    for (path, messages) in other {
        let entry = errors.entry(path).or_default();
        for message in messages {
            if !entry.contains(&message) {
                entry.push(message);
            }
        }
    }
}
