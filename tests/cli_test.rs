//! CLI integration tests for the dms-core binary.

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("dms-core"))
}

fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> std::path::PathBuf {
    write_temp_file(dir, name, &serde_json::to_string_pretty(value).unwrap())
}

mod dependencies_command {
    use super::*;

    #[test]
    fn prints_load_order() {
        let dir = TempDir::new().unwrap();
        let schema = write_json(&dir, "ApiSchema.json", &education_organization_schema());

        let output = cmd()
            .args(["dependencies", "--schema", schema.to_str().unwrap()])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let dependencies: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(dependencies[0]["resource"], "/ed-fi/educationOrganizationCategoryDescriptor");
        assert_eq!(dependencies[1]["order"], 2);
        assert_eq!(dependencies[2]["resource"], "/ed-fi/school");
        assert_eq!(dependencies[2]["operations"], json!(["Create", "Update"]));
    }

    #[test]
    fn pretty_output() {
        let dir = TempDir::new().unwrap();
        let schema = write_json(&dir, "ApiSchema.json", &education_organization_schema());

        cmd()
            .args(["dependencies", "--schema", schema.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[\n"));
    }

    #[test]
    fn schema_path_from_config() {
        let dir = TempDir::new().unwrap();
        let schema = write_json(&dir, "ApiSchema.json", &education_organization_schema());
        let config = write_temp_file(
            &dir,
            "dms.toml",
            &format!("api_schema_path = {:?}\n", schema.to_str().unwrap()),
        );

        cmd()
            .args(["--config", config.to_str().unwrap(), "dependencies"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/ed-fi/localEducationAgency"));
    }

    #[test]
    fn project_without_resources_fails() {
        let dir = TempDir::new().unwrap();
        let schema = write_json(&dir, "ApiSchema.json", &api_schema(json!({})));

        cmd()
            .args(["dependencies", "--schema", schema.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no resource schemas"));
    }
}

mod validate_command {
    use super::*;

    fn validate(dir: &TempDir, document: &Value, extra: &[&str]) -> assert_cmd::assert::Assert {
        let schema = write_json(dir, "ApiSchema.json", &full_api_schema());
        let payload = write_json(dir, "payload.json", document);
        let mut args = vec![
            "validate".to_string(),
            payload.to_str().unwrap().to_string(),
            "--schema".to_string(),
            schema.to_str().unwrap().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        cmd().args(args).assert()
    }

    #[test]
    fn valid_document() {
        let dir = TempDir::new().unwrap();
        validate(&dir, &school_document(255901001), &["--resource", "ed-fi/schools"])
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn json_output_contains_normalized_document() {
        let dir = TempDir::new().unwrap();
        let mut document = school_document(255901001);
        document["schoolId"] = json!("255901001");
        document["unknownProperty"] = json!(true);

        let output = validate(&dir, &document, &["--resource", "ed-fi/schools", "--json"])
            .success()
            .get_output()
            .stdout
            .clone();

        let result: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(result["valid"], true);
        assert_eq!(result["document"], school_document(255901001));
    }

    #[test]
    fn missing_required_property() {
        let dir = TempDir::new().unwrap();
        validate(
            &dir,
            &json!({ "schoolId": 1, "categories": [] }),
            &["--resource", "ed-fi/schools"],
        )
        .code(1)
        .stderr(predicate::str::contains("Validation failed"))
        .stderr(predicate::str::contains("nameOfInstitution"));
    }

    #[test]
    fn put_requires_id() {
        let dir = TempDir::new().unwrap();
        validate(
            &dir,
            &school_document(255901001),
            &["--resource", "ed-fi/schools", "--method", "put", "--json"],
        )
        .code(1)
        .stdout(predicate::str::contains(r#""valid":false"#))
        .stdout(predicate::str::contains("$.id"));
    }

    #[test]
    fn equality_constraint_failure() {
        let dir = TempDir::new().unwrap();
        validate(&dir, &bell_schedule_document(1), &["--resource", "ed-fi/bellSchedules"])
            .code(1)
            .stderr(predicate::str::contains("must match"));
    }

    #[test]
    fn decimal_out_of_range() {
        let dir = TempDir::new().unwrap();
        validate(
            &dir,
            &json!({ "graduationPlanName": "Standard", "totalRequiredCredits": 1000 }),
            &["--resource", "ed-fi/graduationPlans"],
        )
        .code(1)
        .stderr(predicate::str::contains("between -999.99 and 999.99"));
    }

    #[test]
    fn unknown_resource() {
        let dir = TempDir::new().unwrap();
        validate(&dir, &json!({}), &["--resource", "ed-fi/unicorns"])
            .code(2)
            .stderr(predicate::str::contains("unknown resource"));
    }

    #[test]
    fn malformed_resource_argument() {
        let dir = TempDir::new().unwrap();
        validate(&dir, &json!({}), &["--resource", "schools"]).code(2);
    }

    #[test]
    fn unsupported_method() {
        let dir = TempDir::new().unwrap();
        validate(&dir, &json!({}), &["--resource", "ed-fi/schools", "--method", "delete"])
            .code(2)
            .stderr(predicate::str::contains("post or put"));
    }
}

mod identity_command {
    use super::*;

    #[test]
    fn prints_document_info() {
        let dir = TempDir::new().unwrap();
        let schema = write_json(&dir, "ApiSchema.json", &full_api_schema());
        let payload = write_json(&dir, "school.json", &school_document(255901001));

        let output = cmd()
            .args([
                "identity",
                payload.to_str().unwrap(),
                "--resource",
                "ed-fi/schools",
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let info: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(
            info["documentIdentity"],
            json!([{ "identityJsonPath": "$.schoolId", "identityValue": "255901001" }])
        );
        assert!(info["referentialId"].is_string());
        assert_eq!(
            info["documentReferences"][0]["resourceInfo"]["resourceName"],
            "LocalEducationAgency"
        );
        assert_eq!(
            info["descriptorReferences"][0]["path"],
            "$.categories[0].educationOrganizationCategoryDescriptor"
        );
        assert_eq!(
            info["superclassIdentity"]["resourceInfo"]["resourceName"],
            "EducationOrganization"
        );
    }

    #[test]
    fn missing_identity_value() {
        let dir = TempDir::new().unwrap();
        let schema = write_json(&dir, "ApiSchema.json", &full_api_schema());
        let payload = write_json(&dir, "school.json", &json!({ "nameOfInstitution": "No Id" }));

        cmd()
            .args([
                "identity",
                payload.to_str().unwrap(),
                "--resource",
                "ed-fi/schools",
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("$.schoolId"));
    }
}

mod lint_command {
    use super::*;

    #[test]
    fn clean_schema_passes() {
        let dir = TempDir::new().unwrap();
        write_json(&dir, "ApiSchema.json", &full_api_schema());

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("all passed"));
    }

    #[test]
    fn syntax_error_fails() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "ApiSchema.json", "{ not json");

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--format", "json"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E001"));
    }

    #[test]
    fn warnings_fail_only_in_strict_mode() {
        let dir = TempDir::new().unwrap();
        let root = api_schema(json!({
            "sessions": resource("Session", &[], json!({ "type": "object" }))
        }));
        write_json(&dir, "ApiSchema.json", &root);

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("W001"));

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--strict"])
            .assert()
            .code(1);
    }

    #[test]
    fn quiet_hides_passing_files() {
        let dir = TempDir::new().unwrap();
        write_json(&dir, "ApiSchema.json", &full_api_schema());

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--quiet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Linting").not())
            .stdout(predicate::str::contains("ApiSchema.json").not());
    }

    #[test]
    fn missing_path() {
        cmd()
            .args(["lint", "/nonexistent/schemas"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("path not found"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn schema_file_not_found() {
        cmd()
            .args(["dependencies", "--schema", "/nonexistent/ApiSchema.json"])
            .assert()
            .code(3)
            .stderr(
                predicate::str::contains("not found").or(predicate::str::contains("No such file")),
            );
    }

    #[test]
    fn schema_with_invalid_json() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "ApiSchema.json", "{ not valid json");

        cmd()
            .args(["dependencies", "--schema", schema.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn structurally_invalid_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_json(&dir, "ApiSchema.json", &json!({ "projectSchemas": [] }));

        cmd()
            .args(["dependencies", "--schema", schema.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn no_schema_given() {
        cmd()
            .args(["dependencies"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("--schema"));
    }

    #[test]
    fn config_not_found() {
        cmd()
            .args(["--config", "/nonexistent/dms.toml", "dependencies"])
            .assert()
            .code(3);
    }

    #[test]
    fn config_with_unknown_key() {
        let dir = TempDir::new().unwrap();
        let config = write_temp_file(&dir, "dms.toml", "unknown_setting = true\n");

        cmd()
            .args(["--config", config.to_str().unwrap(), "dependencies"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid config"));
    }
}

mod required_args {
    use super::*;

    #[test]
    fn missing_resource_for_validate() {
        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(&dir, "payload.json", "{}");

        cmd()
            .args(["validate", payload.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--resource"));
    }

    #[test]
    fn missing_payload_for_identity() {
        cmd()
            .args(["identity", "--resource", "ed-fi/schools"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("PAYLOAD"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Validate documents and inspect resources"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dms-core"));
    }

    #[test]
    fn validate_help() {
        cmd()
            .args(["validate", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--resource"))
            .stdout(predicate::str::contains("--method"))
            .stdout(predicate::str::contains("--json"));
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;

    #[test]
    fn dependencies_from_url() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/ApiSchema.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(education_organization_schema().to_string())
            .create();

        cmd()
            .args(["dependencies", "--schema", &format!("{}/ApiSchema.json", server.url())])
            .assert()
            .success()
            .stdout(predicate::str::contains("/ed-fi/school"));
    }

    #[test]
    fn url_not_found() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/ApiSchema.json").with_status(404).create();

        cmd()
            .args(["dependencies", "--schema", &format!("{}/ApiSchema.json", server.url())])
            .assert()
            .code(3);
    }
}
