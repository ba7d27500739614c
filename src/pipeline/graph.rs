// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Dependency graph and layered execution plan
//!
//! Builds the induced dependency subgraph of a merged definition
//! (selection closure minus the ignored set) and compiles it into an
//! ordered sequence of layers, each a set of mutually independent
//! steps whose dependencies are satisfied by earlier layers.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::errors::{DerrickError, DerrickResult};
use crate::pipeline::PipelineDefinition;

/// Ordered layers of step names; all steps of a layer may run
/// concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    layers: Vec<Vec<String>>,
}

impl ExecutionPlan {
    /// The layers, dependency order.
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// All step names in plan order (layers flattened, names sorted
    /// within each layer).
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().flatten().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|layer| layer.iter().any(|n| n == name))
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Builder for the dependency graph of a pipeline definition.
pub struct GraphBuilder {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl GraphBuilder {
    /// Build the induced subgraph for `definition`.
    ///
    /// With a non-empty `selected` set, only the selected steps and
    /// their transitive dependencies are included. Steps in `ignored`
    /// are removed with cascade: edges from or to them vanish with
    /// the node.
    pub fn build(
        definition: &PipelineDefinition,
        selected: &BTreeSet<String>,
        ignored: &BTreeSet<String>,
    ) -> DerrickResult<Self> {
        for name in selected {
            if definition.step(name).is_none() {
                return Err(DerrickError::UnknownSelection { name: name.clone() });
            }
        }
        for (name, step) in definition.all_steps() {
            for dependency in step.dependencies() {
                if dependency == name {
                    return Err(DerrickError::SelfDependency { step: name.clone() });
                }
                if definition.step(dependency).is_none() {
                    return Err(DerrickError::UnknownDependency {
                        step: name.clone(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }

        let needed = needed_steps(definition, selected, ignored);

        let mut builder = Self {
            graph: DiGraph::new(),
            indices: HashMap::new(),
        };
        for name in &needed {
            let index = builder.graph.add_node(name.clone());
            builder.indices.insert(name.clone(), index);
        }
        for name in &needed {
            let step = definition
                .step(name)
                .ok_or_else(|| DerrickError::StepNotFound { step: name.clone() })?;
            let step_index = builder.indices[name];
            for dependency in step.dependencies() {
                // Edges referencing excluded steps are dropped with
                // the node (cascade removal).
                if let Some(dep_index) = builder.indices.get(dependency) {
                    if !builder.graph.contains_edge(*dep_index, step_index) {
                        builder.graph.add_edge(*dep_index, step_index, ());
                    }
                }
            }
        }
        Ok(builder)
    }

    /// Compile the graph into layers via Kahn's algorithm, grouping
    /// in-degree-zero waves; names sort lexicographically within a
    /// wave for determinism.
    pub fn plan(&self) -> DerrickResult<ExecutionPlan> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| {
                let degree = self
                    .graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .count();
                (index, degree)
            })
            .collect();

        let mut layers = Vec::new();
        let mut remaining = in_degree.len();
        let mut wave: Vec<NodeIndex> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| *index)
            .collect();

        while !wave.is_empty() {
            let mut names: Vec<String> = wave.iter().map(|i| self.graph[*i].clone()).collect();
            names.sort();
            remaining -= wave.len();

            let mut next: VecDeque<NodeIndex> = VecDeque::new();
            for index in wave.drain(..) {
                for successor in self
                    .graph
                    .neighbors_directed(index, petgraph::Direction::Outgoing)
                {
                    let degree = in_degree
                        .get_mut(&successor)
                        .expect("successor has a tracked in-degree");
                    *degree -= 1;
                    if *degree == 0 {
                        next.push_back(successor);
                    }
                }
            }
            layers.push(names);
            wave = next.into_iter().collect();
        }

        if remaining > 0 {
            let planned: BTreeSet<&str> = layers
                .iter()
                .flatten()
                .map(String::as_str)
                .collect();
            let mut steps: Vec<String> = self
                .graph
                .node_indices()
                .map(|index| self.graph[index].clone())
                .filter(|name| !planned.contains(name.as_str()))
                .collect();
            steps.sort();
            return Err(DerrickError::Cycle { steps });
        }

        Ok(ExecutionPlan { layers })
    }
}

/// Transitive dependency closure of the selected set (or every step
/// when nothing is selected), minus the ignored set.
fn needed_steps(
    definition: &PipelineDefinition,
    selected: &BTreeSet<String>,
    ignored: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut needed: BTreeSet<String> = if selected.is_empty() {
        definition.all_steps().map(|(name, _)| name.clone()).collect()
    } else {
        let mut closure = BTreeSet::new();
        let mut queue: VecDeque<String> = selected.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if !closure.insert(name.clone()) {
                continue;
            }
            if let Some(step) = definition.step(&name) {
                for dependency in step.dependencies() {
                    queue.push_back(dependency.to_string());
                }
            }
        }
        closure
    };
    for name in ignored {
        needed.remove(name);
    }
    needed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(steps: Vec<(&str, Vec<&str>)>) -> PipelineDefinition {
        let yaml_steps = steps
            .into_iter()
            .map(|(name, deps)| {
                let after = deps
                    .iter()
                    .map(|d| format!("\n      - {d}"))
                    .collect::<String>();
                if after.is_empty() {
                    format!("  {name}:\n    image: alpine\n")
                } else {
                    format!("  {name}:\n    image: alpine\n    after:{after}\n")
                }
            })
            .collect::<String>();
        PipelineDefinition::from_yaml(&format!("version: \"2.0\"\nsteps:\n{yaml_steps}")).unwrap()
    }

    fn plan(
        steps: Vec<(&str, Vec<&str>)>,
        selected: &[&str],
        ignored: &[&str],
    ) -> DerrickResult<ExecutionPlan> {
        let definition = definition(steps);
        let selected = selected.iter().map(|s| s.to_string()).collect();
        let ignored = ignored.iter().map(|s| s.to_string()).collect();
        GraphBuilder::build(&definition, &selected, &ignored)?.plan()
    }

    #[test]
    fn test_linear_layers() {
        let plan = plan(
            vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])],
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(plan.layers(), &[vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn test_diamond_layers() {
        let plan = plan(
            vec![
                ("a", vec![]),
                ("b", vec!["a"]),
                ("c", vec!["a"]),
                ("d", vec!["b", "c"]),
            ],
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(plan.layers(), &[vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn test_wave_names_sorted() {
        let plan = plan(vec![("z", vec![]), ("m", vec![]), ("a", vec![])], &[], &[]).unwrap();
        assert_eq!(plan.layers(), &[vec!["a", "m", "z"]]);
    }

    #[test]
    fn test_cycle_reports_members() {
        let err = plan(
            vec![("a", vec!["b"]), ("b", vec!["a"]), ("c", vec![])],
            &[],
            &[],
        )
        .unwrap_err();
        match err {
            DerrickError::Cycle { steps } => assert_eq!(steps, vec!["a", "b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency() {
        let err = plan(vec![("a", vec!["a"])], &[], &[]).unwrap_err();
        assert!(matches!(err, DerrickError::SelfDependency { step } if step == "a"));
    }

    #[test]
    fn test_selection_closure() {
        let plan = plan(
            vec![
                ("a", vec![]),
                ("b", vec!["a"]),
                ("c", vec!["b"]),
                ("x", vec![]),
            ],
            &["c"],
            &[],
        )
        .unwrap();
        assert_eq!(plan.layers(), &[vec!["a"], vec!["b"], vec!["c"]]);
        assert!(!plan.contains("x"));
    }

    #[test]
    fn test_unknown_selection() {
        let err = plan(vec![("a", vec![])], &["ghost"], &[]).unwrap_err();
        assert!(matches!(err, DerrickError::UnknownSelection { name } if name == "ghost"));
    }

    #[test]
    fn test_ignored_cascade() {
        // Ignoring b drops it and both of its edges; a and c become
        // independent.
        let plan = plan(
            vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])],
            &[],
            &["b"],
        )
        .unwrap();
        assert_eq!(plan.layers(), &[vec!["a", "c"]]);
    }

    #[test]
    fn test_depends_on_and_after_both_form_edges() {
        let definition = PipelineDefinition::from_yaml(
            "version: \"2.0\"\nsteps:\n  a:\n    image: alpine\n  b:\n    image: alpine\n    after: [a]\nservices:\n  c:\n    build: ./d\n    depends_on: [b]\n",
        )
        .unwrap();
        let plan = GraphBuilder::build(&definition, &BTreeSet::new(), &BTreeSet::new())
            .unwrap()
            .plan()
            .unwrap();
        assert_eq!(plan.layers(), &[vec!["a"], vec!["b"], vec!["c"]]);
    }
}
