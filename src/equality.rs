//! Equality constraints between values in different parts of a document.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::resource_schema::{EqualityConstraint, ResourceSchema};
use crate::validator::ValidationErrors;

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Distinct values found across both sides of a constraint, in sorted order.
fn distinct_values(constraint: &EqualityConstraint, document: &Value) -> BTreeSet<String> {
    constraint
        .source_json_path
        .select(document)
        .into_iter()
        .chain(constraint.target_json_path.select(document))
        .map(value_text)
        .collect()
}

/// Check every equality constraint of `schema`.
///
/// A failing constraint reports the same message under both its source and
/// target paths.
pub fn validate_equality_constraints(schema: &ResourceSchema, document: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for constraint in &schema.equality_constraints {
        let values = distinct_values(constraint, document);
        if values.len() <= 1 {
            continue;
        }

        let field = constraint
            .target_json_path
            .last_property_name()
            .unwrap_or_default();
        let conflicting = values
            .iter()
            .map(|v| format!("'{}'", v))
            .collect::<Vec<_>>()
            .join(", ");
        let message = format!(
            "All values supplied for '{}' must match. Review all references (including those higher up in the resource's data) and align the following conflicting values: {}",
            field, conflicting
        );

        for path in [&constraint.source_json_path, &constraint.target_json_path] {
            let messages = errors.entry(path.to_string()).or_default();
            if !messages.contains(&message) {
                messages.push(message.clone());
            }
        }
    }

    errors
}
