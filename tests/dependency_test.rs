//! Dependency ordering over whole ApiSchemas.

mod common;

use common::*;
use dms_core::{calculate_dependencies, ApiSchemaDocument, DependencyError};
use serde_json::json;

fn dependencies_of(root: serde_json::Value) -> Vec<(String, u32)> {
    let document = ApiSchemaDocument::from_value(&root).unwrap();
    calculate_dependencies(&document)
        .unwrap()
        .into_iter()
        .map(|d| (d.resource, d.order))
        .collect()
}

fn referencing(name: &str, target: &str) -> serde_json::Value {
    let mut node = resource(name, &["$.id"], json!({ "type": "object" }));
    node["documentPathsMapping"] = json!({
        target: {
            "isReference": true,
            "isDescriptor": false,
            "projectName": "Ed-Fi",
            "resourceName": target,
            "referenceJsonPaths": [{
                "identityJsonPath": "$.id",
                "referenceJsonPath": format!("$.{}Reference.id", target.to_lowercase())
            }]
        }
    });
    node
}

mod ordering {
    use super::*;

    #[test]
    fn education_organization_scenario() {
        let document = ApiSchemaDocument::from_value(&education_organization_schema()).unwrap();
        let dependencies = calculate_dependencies(&document).unwrap();

        assert_eq!(
            serde_json::to_value(&dependencies).unwrap(),
            json!([
                {
                    "resource": "/ed-fi/educationOrganizationCategoryDescriptor",
                    "order": 1,
                    "operations": ["Create", "Update"]
                },
                {
                    "resource": "/ed-fi/localEducationAgency",
                    "order": 2,
                    "operations": ["Create", "Update"]
                },
                {
                    "resource": "/ed-fi/school",
                    "order": 3,
                    "operations": ["Create", "Update"]
                }
            ])
        );
    }

    #[test]
    fn chain_orders_strictly_increase() {
        let root = api_schema(json!({
            "as": resource("A", &["$.id"], json!({ "type": "object" })),
            "bs": referencing("B", "A"),
            "cs": referencing("C", "B")
        }));

        assert_eq!(
            dependencies_of(root),
            vec![
                ("/ed-fi/a".to_string(), 1),
                ("/ed-fi/b".to_string(), 2),
                ("/ed-fi/c".to_string(), 3),
            ]
        );
    }

    #[test]
    fn equal_orders_sort_by_resource() {
        let root = api_schema(json!({
            "zs": resource("Zebra", &["$.id"], json!({ "type": "object" })),
            "as": resource("Aardvark", &["$.id"], json!({ "type": "object" }))
        }));

        assert_eq!(
            dependencies_of(root),
            vec![
                ("/ed-fi/aardvark".to_string(), 1),
                ("/ed-fi/zebra".to_string(), 1),
            ]
        );
    }

    #[test]
    fn abstract_supertype_reference_orders_after_school() {
        let root = api_schema(json!({
            "educationOrganizationCategoryDescriptors": education_organization_category_descriptor(),
            "localEducationAgencies": local_education_agency(),
            "schools": school(),
            "staffs": referencing("StaffEducationOrganizationAssignment", "EducationOrganization")
        }));

        let dependencies = dependencies_of(root);
        let assignment = dependencies
            .iter()
            .find(|(r, _)| r == "/ed-fi/staffEducationOrganizationAssignment")
            .unwrap();
        assert_eq!(assignment.1, 4);
    }

    #[test]
    fn reference_outside_schema_contributes_nothing() {
        let root = api_schema(json!({
            "bs": referencing("B", "Missing")
        }));
        assert_eq!(dependencies_of(root), vec![("/ed-fi/b".to_string(), 1)]);
    }

    #[test]
    fn cycle_terminates() {
        let root = api_schema(json!({
            "as": referencing("A", "B"),
            "bs": referencing("B", "A")
        }));
        let dependencies = dependencies_of(root);
        assert_eq!(dependencies.len(), 2);
        assert!(dependencies.iter().all(|(_, order)| *order >= 1));
    }
}

mod errors {
    use super::*;

    #[test]
    fn project_without_resources_fails() {
        let document = ApiSchemaDocument::from_value(&api_schema(json!({}))).unwrap();
        let err = calculate_dependencies(&document).unwrap_err();
        assert!(matches!(err, DependencyError::NoResourceSchemas { ref project } if project == "ed-fi"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn schema_without_projects_fails() {
        let root = json!({ "projectNameMapping": {}, "projectSchemas": {} });
        let document = ApiSchemaDocument::from_value(&root).unwrap();
        assert!(matches!(
            calculate_dependencies(&document),
            Err(DependencyError::NoProjectSchemas)
        ));
    }
}
