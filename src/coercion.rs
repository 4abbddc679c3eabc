//! Coercion of string-typed booleans and numbers.
//!
//! Some clients send `"true"` or `"42"` where the schema expects a boolean
//! or number. Values at the resource's boolean and numeric paths are
//! converted before validation; anything that does not parse is left for
//! the validator to reject.

use serde_json::{Number, Value};

use crate::resource_schema::ResourceSchema;

fn coerce_boolean(value: &mut Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let parsed = match s.to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => return false,
    };
    *value = Value::Bool(parsed);
    true
}

fn coerce_number(value: &mut Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let text = s.trim();
    let number = if let Ok(i) = text.parse::<i64>() {
        Number::from(i)
    } else if let Ok(u) = text.parse::<u64>() {
        Number::from(u)
    } else {
        match text.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => n,
            None => return false,
        }
    };
    *value = Value::Number(number);
    true
}

/// Convert string values at the schema's boolean and numeric paths in place.
///
/// Returns how many values changed.
pub fn coerce_from_strings(schema: &ResourceSchema, document: &mut Value) -> usize {
    let mut coerced = 0;
    for path in &schema.boolean_json_paths {
        path.for_each_mut(document, &mut |v| {
            if coerce_boolean(v) {
                coerced += 1;
            }
        });
    }
    for path in &schema.numeric_json_paths {
        path.for_each_mut(document, &mut |v| {
            if coerce_number(v) {
                coerced += 1;
            }
        });
    }
    coerced
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::from_node(
            "/r",
            &json!({
                "resourceName": "Student",
                "isDescriptor": false,
                "isSchoolYearEnumeration": false,
                "allowIdentityUpdates": false,
                "jsonSchemaForInsert": { "type": "object" },
                "identityJsonPaths": [],
                "booleanJsonPaths": ["$.hispanicLatinoEthnicity", "$.flags[*].active"],
                "numericJsonPaths": ["$.schoolId", "$.birthWeight"],
                "documentPathsMapping": {},
                "queryFieldMapping": {},
                "equalityConstraints": [],
                "isSubclass": false
            }),
        )
        .unwrap()
    }

    #[test]
    fn coerces_booleans_and_numbers() {
        let mut doc = json!({
            "hispanicLatinoEthnicity": "True",
            "flags": [ { "active": "false" }, { "active": true } ],
            "schoolId": "255901",
            "birthWeight": "3.25"
        });
        let changed = coerce_from_strings(&schema(), &mut doc);

        assert_eq!(changed, 4);
        assert_eq!(
            doc,
            json!({
                "hispanicLatinoEthnicity": true,
                "flags": [ { "active": false }, { "active": true } ],
                "schoolId": 255901,
                "birthWeight": 3.25
            })
        );
    }

    #[test]
    fn leaves_unparseable_values() {
        let mut doc = json!({ "hispanicLatinoEthnicity": "yes", "schoolId": "abc" });
        assert_eq!(coerce_from_strings(&schema(), &mut doc), 0);
        assert_eq!(doc["hispanicLatinoEthnicity"], "yes");
        assert_eq!(doc["schoolId"], "abc");
    }
}
