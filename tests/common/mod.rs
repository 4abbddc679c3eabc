//! ApiSchema fixtures shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};

pub const CATEGORY_URI: &str = "uri://ed-fi.org/EducationOrganizationCategoryDescriptor#School";

/// An ApiSchema with a single `ed-fi` project holding `resources`.
pub fn api_schema(resources: Value) -> Value {
    json!({
        "projectNameMapping": { "Ed-Fi": "ed-fi" },
        "projectSchemas": {
            "ed-fi": {
                "projectName": "Ed-Fi",
                "projectVersion": "5.0.0",
                "isExtensionProject": false,
                "description": "Ed-Fi data standard",
                "resourceSchemas": resources
            }
        }
    })
}

/// A resource node with every required field, ready to be patched.
pub fn resource(resource_name: &str, identity: &[&str], json_schema: Value) -> Value {
    json!({
        "resourceName": resource_name,
        "isDescriptor": false,
        "isSchoolYearEnumeration": false,
        "allowIdentityUpdates": false,
        "jsonSchemaForInsert": json_schema,
        "identityJsonPaths": identity,
        "booleanJsonPaths": [],
        "numericJsonPaths": [],
        "documentPathsMapping": {},
        "queryFieldMapping": {},
        "equalityConstraints": [],
        "isSubclass": false
    })
}

fn set(node: &mut Value, key: &str, value: Value) {
    node.as_object_mut().unwrap().insert(key.to_string(), value);
}

fn no_surrounding_whitespace() -> Value {
    json!({ "type": "string", "pattern": "^\\S(.*\\S)?$" })
}

fn category_descriptor_mapping(path: &str) -> Value {
    json!({
        "isReference": true,
        "isDescriptor": true,
        "projectName": "Ed-Fi",
        "resourceName": "EducationOrganizationCategoryDescriptor",
        "path": path
    })
}

fn categories_schema() -> Value {
    json!({
        "type": "array",
        "minItems": 1,
        "items": {
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "educationOrganizationCategoryDescriptor": { "type": "string" }
            },
            "required": ["educationOrganizationCategoryDescriptor"]
        }
    })
}

fn make_education_organization_subclass(node: &mut Value) {
    set(node, "isSubclass", json!(true));
    set(node, "subclassType", json!("domainEntity"));
    set(node, "superclassProjectName", json!("Ed-Fi"));
    set(node, "superclassResourceName", json!("EducationOrganization"));
    set(node, "superclassIdentityJsonPath", json!("$.educationOrganizationId"));
}

pub fn education_organization_category_descriptor() -> Value {
    let mut node = resource(
        "EducationOrganizationCategoryDescriptor",
        &[],
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "namespace": { "type": "string" },
                "codeValue": no_surrounding_whitespace(),
                "shortDescription": no_surrounding_whitespace(),
                "description": { "type": "string" }
            },
            "required": ["namespace", "codeValue", "shortDescription"]
        }),
    );
    set(&mut node, "isDescriptor", json!(true));
    node
}

pub fn local_education_agency() -> Value {
    let mut node = resource(
        "LocalEducationAgency",
        &["$.localEducationAgencyId"],
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "localEducationAgencyId": { "type": "integer" },
                "nameOfInstitution": { "type": "string" },
                "categories": categories_schema()
            },
            "required": ["localEducationAgencyId", "nameOfInstitution", "categories"]
        }),
    );
    set(&mut node, "numericJsonPaths", json!(["$.localEducationAgencyId"]));
    set(
        &mut node,
        "documentPathsMapping",
        json!({
            "LocalEducationAgencyId": { "isReference": false, "path": "$.localEducationAgencyId" },
            "EducationOrganizationCategoryDescriptor":
                category_descriptor_mapping("$.categories[*].educationOrganizationCategoryDescriptor")
        }),
    );
    make_education_organization_subclass(&mut node);
    node
}

pub fn school() -> Value {
    let mut node = resource(
        "School",
        &["$.schoolId"],
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "schoolId": { "type": "integer" },
                "nameOfInstitution": { "type": "string" },
                "localEducationAgencyReference": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": { "localEducationAgencyId": { "type": "integer" } },
                    "required": ["localEducationAgencyId"]
                },
                "categories": categories_schema()
            },
            "required": ["schoolId", "nameOfInstitution", "categories"]
        }),
    );
    set(
        &mut node,
        "numericJsonPaths",
        json!(["$.schoolId", "$.localEducationAgencyReference.localEducationAgencyId"]),
    );
    set(
        &mut node,
        "documentPathsMapping",
        json!({
            "SchoolId": { "isReference": false, "path": "$.schoolId" },
            "LocalEducationAgency": {
                "isReference": true,
                "isDescriptor": false,
                "projectName": "Ed-Fi",
                "resourceName": "LocalEducationAgency",
                "referenceJsonPaths": [{
                    "identityJsonPath": "$.localEducationAgencyId",
                    "referenceJsonPath": "$.localEducationAgencyReference.localEducationAgencyId"
                }]
            },
            "EducationOrganizationCategoryDescriptor":
                category_descriptor_mapping("$.categories[*].educationOrganizationCategoryDescriptor")
        }),
    );
    set(
        &mut node,
        "queryFieldMapping",
        json!({
            "schoolId": [{ "path": "$.schoolId", "type": "number" }],
            "nameOfInstitution": [{ "path": "$.nameOfInstitution", "type": "string" }],
            "openDate": [{ "path": "$.openDate", "type": "date" }]
        }),
    );
    make_education_organization_subclass(&mut node);
    node
}

pub fn bell_schedule() -> Value {
    let mut node = resource(
        "BellSchedule",
        &["$.bellScheduleName", "$.schoolReference.schoolId"],
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "bellScheduleName": { "type": "string" },
                "schoolReference": {
                    "type": "object",
                    "properties": { "schoolId": { "type": "integer" } },
                    "required": ["schoolId"]
                },
                "classPeriods": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "classPeriodReference": {
                                "type": "object",
                                "properties": {
                                    "classPeriodName": { "type": "string" },
                                    "schoolId": { "type": "integer" }
                                }
                            }
                        }
                    }
                }
            },
            "required": ["bellScheduleName", "schoolReference"]
        }),
    );
    set(
        &mut node,
        "documentPathsMapping",
        json!({
            "School": {
                "isReference": true,
                "isDescriptor": false,
                "projectName": "Ed-Fi",
                "resourceName": "School",
                "referenceJsonPaths": [{
                    "identityJsonPath": "$.schoolId",
                    "referenceJsonPath": "$.schoolReference.schoolId"
                }]
            }
        }),
    );
    set(
        &mut node,
        "equalityConstraints",
        json!([{
            "sourceJsonPath": "$.classPeriods[*].classPeriodReference.schoolId",
            "targetJsonPath": "$.schoolReference.schoolId"
        }]),
    );
    node
}

pub fn graduation_plan() -> Value {
    let mut node = resource(
        "GraduationPlan",
        &["$.graduationPlanName"],
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "graduationPlanName": { "type": "string" },
                "totalRequiredCredits": { "type": "number" }
            },
            "required": ["graduationPlanName", "totalRequiredCredits"]
        }),
    );
    set(&mut node, "numericJsonPaths", json!(["$.totalRequiredCredits"]));
    set(
        &mut node,
        "decimalPropertyValidationInfos",
        json!([{ "path": "$.totalRequiredCredits", "totalDigits": 5, "decimalPlaces": 2 }]),
    );
    node
}

/// Descriptor, LEA and School only.
pub fn education_organization_schema() -> Value {
    api_schema(json!({
        "educationOrganizationCategoryDescriptors": education_organization_category_descriptor(),
        "localEducationAgencies": local_education_agency(),
        "schools": school()
    }))
}

/// Every fixture resource.
pub fn full_api_schema() -> Value {
    api_schema(json!({
        "educationOrganizationCategoryDescriptors": education_organization_category_descriptor(),
        "localEducationAgencies": local_education_agency(),
        "schools": school(),
        "bellSchedules": bell_schedule(),
        "graduationPlans": graduation_plan()
    }))
}

pub fn school_document(school_id: i64) -> Value {
    json!({
        "schoolId": school_id,
        "nameOfInstitution": "Grand Bend High School",
        "localEducationAgencyReference": { "localEducationAgencyId": 255901 },
        "categories": [ { "educationOrganizationCategoryDescriptor": CATEGORY_URI } ]
    })
}

pub fn bell_schedule_document(class_period_school_id: i64) -> Value {
    json!({
        "bellScheduleName": "Normal Schedule",
        "schoolReference": { "schoolId": 255901001 },
        "classPeriods": [
            { "classPeriodReference": { "classPeriodName": "01 - Traditional", "schoolId": class_period_school_id } }
        ]
    })
}
