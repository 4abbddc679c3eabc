//! Resource load order derived from the reference graph.
//!
//! Every resource gets an order such that it sorts strictly after every
//! resource it references, directly or transitively. Bulk loaders use it to
//! insert referenced documents first.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::api_schema::ApiSchemaDocument;
use crate::error::DependencyError;

/// Operations every resource in the dependency listing supports.
pub const DEPENDENCY_OPERATIONS: &[&str] = &["Create", "Update"];

/// Abstract supertypes have no resource schema of their own; references to
/// them are ordered as references to a concrete representative.
const SUPERTYPE_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("EducationOrganization", "School"),
    ("GeneralStudentProgramAssociation", "StudentProgramAssociation"),
];

/// One entry of the dependency listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDependency {
    /// `/{projectEndpoint}/{camelCaseResourceName}`
    pub resource: String,
    pub order: u32,
    pub operations: Vec<String>,
}

/// Resource name -> referenced resource names, after supertype substitution.
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

fn substitute_supertype(resource_name: &str) -> &str {
    SUPERTYPE_SUBSTITUTIONS
        .iter()
        .find(|(abstract_name, _)| *abstract_name == resource_name)
        .map(|(_, concrete)| *concrete)
        .unwrap_or(resource_name)
}

/// `School` -> `school`, `EducationOrganizationCategoryDescriptor` -> `educationOrganizationCategoryDescriptor`.
fn camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build the reference graph of every resource in every project.
///
/// Returns the graph and the project endpoint each resource belongs to.
///
/// # Errors
///
/// A project without resource schemas is a configuration error.
pub fn build_dependency_graph(
    document: &ApiSchemaDocument,
) -> Result<(DependencyGraph, HashMap<String, String>), DependencyError> {
    let projects = document.all_project_schemas();
    if projects.is_empty() {
        return Err(DependencyError::NoProjectSchemas);
    }

    let mut graph = DependencyGraph::new();
    let mut endpoints = HashMap::new();

    for project in projects {
        if project.resource_count() == 0 {
            return Err(DependencyError::NoResourceSchemas {
                project: project.project_endpoint_name.clone(),
            });
        }
        for (_, resource) in project.resource_schemas() {
            let mut references: Vec<String> = resource
                .referenced_resource_names()
                .into_iter()
                .map(|name| substitute_supertype(name).to_string())
                .collect();
            references.sort();
            references.dedup();

            endpoints.insert(
                resource.resource_name.clone(),
                project.project_endpoint_name.clone(),
            );
            graph.insert(resource.resource_name.clone(), references);
        }
    }

    Ok((graph, endpoints))
}

/// Assign an order to every resource of `graph`.
///
/// Traversal starts from the resources with the fewest dependencies,
/// alphabetically among equals. A dependency still being visited (a cycle,
/// including a self-reference) or absent from the graph contributes 0.
pub fn order_resources(graph: &DependencyGraph) -> HashMap<String, u32> {
    let mut start: Vec<(&String, &Vec<String>)> = graph.iter().collect();
    start.sort_by(|(a_name, a_deps), (b_name, b_deps)| {
        a_deps.len().cmp(&b_deps.len()).then_with(|| a_name.cmp(b_name))
    });

    let mut visited = HashSet::new();
    let mut orders = HashMap::new();
    for (name, _) in start {
        visit(name, graph, &mut visited, &mut orders);
    }
    orders
}

fn visit(
    name: &str,
    graph: &DependencyGraph,
    visited: &mut HashSet<String>,
    orders: &mut HashMap<String, u32>,
) -> u32 {
    if let Some(order) = orders.get(name) {
        return *order;
    }
    let Some(dependencies) = graph.get(name) else {
        debug!(resource = name, "reference to resource outside the schema");
        return 0;
    };
    if !visited.insert(name.to_string()) {
        // In progress further up the stack.
        return 0;
    }

    let deepest = dependencies
        .iter()
        .map(|dependency| visit(dependency, graph, visited, orders))
        .max()
        .unwrap_or(0);

    let order = deepest + 1;
    orders.insert(name.to_string(), order);
    order
}

/// The dependency listing: every resource with its order, sorted by order
/// then resource path.
pub fn calculate_dependencies(
    document: &ApiSchemaDocument,
) -> Result<Vec<ResourceDependency>, DependencyError> {
    let (graph, endpoints) = build_dependency_graph(document)?;
    let orders = order_resources(&graph);

    let mut dependencies: Vec<ResourceDependency> = orders
        .into_iter()
        .map(|(name, order)| {
            let endpoint = endpoints.get(&name).map(String::as_str).unwrap_or_default();
            ResourceDependency {
                resource: format!("/{}/{}", endpoint, camel_case(&name)),
                order,
                operations: DEPENDENCY_OPERATIONS.iter().map(|s| s.to_string()).collect(),
            }
        })
        .collect();

    dependencies.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.resource.cmp(&b.resource)));
    Ok(dependencies)
}
