//! Structural-reference graph and cycle detection.
//!
//! Before any substitution happens, the resolver builds a directed graph of
//! "entity X's values reference entity Y" edges from the structural tokens in
//! the descriptor and rejects cycles up front with a descriptive error. The
//! one-hop substitution rule would terminate on a cyclic descriptor anyway,
//! but silently producing half-substituted values is worse than failing fast.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::core::{ResolveError, Result};
use crate::descriptor::DeploymentDescriptor;

use super::placeholders::structural_targets;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is currently being visited (in the DFS stack).
    Gray,
    /// Node has been fully visited.
    Black,
}

/// Directed graph of structural references between descriptor entities.
pub(crate) struct ReferenceGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl ReferenceGraph {
    /// Build the reference graph for a descriptor.
    pub(crate) fn from_descriptor(descriptor: &DeploymentDescriptor) -> Self {
        let mut graph = Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        };

        for module in &descriptor.modules {
            graph.add_entity_edges(&module.name, &module.properties, None);
            graph.add_entity_edges(&module.name, &module.parameters, None);
            for dependency in &module.required_dependencies {
                graph.add_entity_edges(&module.name, &dependency.properties, Some(&dependency.name));
                graph.add_entity_edges(&module.name, &dependency.parameters, Some(&dependency.name));
            }
            for provided in &module.provided_dependencies {
                graph.add_entity_edges(&provided.name, &provided.properties, None);
                graph.add_entity_edges(&provided.name, &provided.parameters, None);
            }
        }
        for resource in &descriptor.resources {
            graph.add_entity_edges(&resource.name, &resource.properties, None);
            graph.add_entity_edges(&resource.name, &resource.parameters, None);
            for dependency in &resource.required_dependencies {
                graph.add_entity_edges(
                    &resource.name,
                    &dependency.properties,
                    Some(&dependency.name),
                );
                graph.add_entity_edges(
                    &resource.name,
                    &dependency.parameters,
                    Some(&dependency.name),
                );
            }
        }

        graph
    }

    fn add_entity_edges(
        &mut self,
        owner: &str,
        map: &crate::descriptor::PropertiesMap,
        default_target: Option<&str>,
    ) {
        for target in structural_targets(map, default_target) {
            let from = self.ensure_node(owner);
            let to = self.ensure_node(&target);
            if !self.graph.contains_edge(from, to) {
                self.graph.add_edge(from, to, ());
            }
        }
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(name) {
            index
        } else {
            let index = self.graph.add_node(name.to_string());
            self.node_map.insert(name.to_string(), index);
            index
        }
    }

    /// Detect cycles using DFS with colors.
    ///
    /// Returns an error naming the cycle path if one is found.
    pub(crate) fn detect_cycles(&self) -> Result<()> {
        let mut colors: HashMap<NodeIndex, Color> = HashMap::new();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            colors.insert(node, Color::White);
        }

        for node in self.graph.node_indices() {
            if colors.get(&node) == Some(&Color::White)
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                let cycle_path = cycle
                    .iter()
                    .map(|index| self.graph[*index].as_str())
                    .collect::<Vec<_>>()
                    .join(" → ");
                return Err(ResolveError::CircularReference {
                    path: cycle_path,
                });
            }
        }

        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    // Found a cycle; close it so the path reads a → b → a.
                    let cycle_start =
                        path.iter().position(|n| *n == neighbor).expect("gray node is on the path");
                    let mut cycle = path[cycle_start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::descriptor::{DeploymentDescriptor, Module, Resource};
    use crate::schema::SchemaVersion;

    fn descriptor() -> DeploymentDescriptor {
        DeploymentDescriptor::new(
            "com.acme.shop",
            semver::Version::new(1, 0, 0),
            SchemaVersion::new(3, 1),
        )
    }

    fn module_with_property(name: &str, key: &str, value: &str) -> Module {
        let mut module = Module::new(name, "java.tomcat");
        module.properties.insert(key.to_string(), json!(value));
        module
    }

    #[test]
    fn acyclic_references_pass() {
        let mut descriptor = descriptor();
        descriptor.modules.push(module_with_property("app", "db-host", "~{db/host}"));
        let mut db = Resource::new("db");
        db.properties.insert("host".to_string(), json!("db.internal"));
        descriptor.resources.push(db);

        assert!(ReferenceGraph::from_descriptor(&descriptor).detect_cycles().is_ok());
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let mut descriptor = descriptor();
        descriptor.modules.push(module_with_property("a", "value", "~{b/value}"));
        descriptor.modules.push(module_with_property("b", "value", "~{a/value}"));

        let err = ReferenceGraph::from_descriptor(&descriptor).detect_cycles().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Circular reference detected: "), "{message}");
        assert!(message.contains("a → b → a") || message.contains("b → a → b"), "{message}");
    }

    #[test]
    fn self_reference_is_detected() {
        let mut descriptor = descriptor();
        descriptor.modules.push(module_with_property("a", "value", "~{a/value}"));

        let err = ReferenceGraph::from_descriptor(&descriptor).detect_cycles().unwrap_err();
        assert!(err.to_string().contains("a → a"));
    }

    #[test]
    fn diamond_references_are_not_a_cycle() {
        let mut descriptor = descriptor();
        descriptor.modules.push(module_with_property("a", "b", "~{b/value} ~{c/value}"));
        descriptor.modules.push(module_with_property("b", "value", "~{d/value}"));
        descriptor.modules.push(module_with_property("c", "value", "~{d/value}"));
        let mut d = Resource::new("d");
        d.properties.insert("value".to_string(), json!("leaf"));
        descriptor.resources.push(d);

        assert!(ReferenceGraph::from_descriptor(&descriptor).detect_cycles().is_ok());
    }
}
