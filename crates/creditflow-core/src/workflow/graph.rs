//! Workflow graph arena and structural validation.
//!
//! Nodes and edges are loaded into a `petgraph` `DiGraph` keyed by node id,
//! so edge lookup by source, de-duplication and cycle detection work on
//! integer handles instead of references into the workflow.

use std::collections::{HashMap, HashSet};

use creditflow_types::workflow::{
    Edge, Node, NodeKind, NodeType, ValidationIssue, ValidationReport, Workflow,
};
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Indexed view over a workflow's nodes and edges.
pub struct WorkflowGraph<'a> {
    graph: DiGraph<&'a Node, &'a Edge>,
    index: HashMap<&'a str, NodeIndex>,
    /// Problems found while loading (duplicate ids, dangling or repeated edges).
    load_issues: Vec<Severity>,
}

enum Severity {
    Error(ValidationIssue),
    Warning(ValidationIssue),
}

impl<'a> WorkflowGraph<'a> {
    /// Build the arena. Duplicate node ids keep the first occurrence;
    /// dangling and exact-duplicate edges are skipped.
    pub fn build(workflow: &'a Workflow) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut load_issues = Vec::new();

        for node in &workflow.nodes {
            if index.contains_key(node.node_id.as_str()) {
                load_issues.push(Severity::Error(ValidationIssue::DuplicateNodeId {
                    node_id: node.node_id.clone(),
                }));
                continue;
            }
            let idx = graph.add_node(node);
            index.insert(node.node_id.as_str(), idx);
        }

        let mut seen = HashSet::new();
        for edge in &workflow.edges {
            let endpoints = [&edge.source, &edge.target];
            if let Some(missing) = endpoints.iter().find(|id| !index.contains_key(id.as_str())) {
                load_issues.push(Severity::Error(ValidationIssue::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: (*missing).clone(),
                }));
                continue;
            }

            let key = (
                edge.source.as_str(),
                edge.target.as_str(),
                edge.source_handle.as_deref(),
                edge.condition(),
            );
            if !seen.insert(key) {
                load_issues.push(Severity::Warning(ValidationIssue::DuplicateEdge {
                    edge_id: edge.id.clone(),
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                }));
                continue;
            }

            graph.add_edge(index[edge.source.as_str()], index[edge.target.as_str()], edge);
        }

        Self {
            graph,
            index,
            load_issues,
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&'a Node> {
        self.index.get(node_id).map(|idx| self.graph[*idx])
    }

    /// Outgoing edges in declaration order.
    pub fn outgoing(&self, node_id: &str) -> Vec<&'a Edge> {
        let Some(idx) = self.index.get(node_id) else {
            return Vec::new();
        };
        // petgraph iterates edges newest-first; restore insertion order.
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(*idx, Direction::Outgoing)
            .map(|e| (e.id(), *e.weight()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, edge)| edge).collect()
    }

    fn in_degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    fn out_degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a workflow's structure.
///
/// Errors block activation and execution; warnings are informational.
pub fn validate(workflow: &Workflow) -> ValidationReport {
    let graph = WorkflowGraph::build(workflow);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for issue in &graph.load_issues {
        match issue {
            Severity::Error(i) => errors.push(i.clone()),
            Severity::Warning(i) => warnings.push(i.clone()),
        }
    }

    // Start node
    let starts: Vec<NodeIndex> = graph
        .graph
        .node_indices()
        .filter(|idx| graph.graph[*idx].node_type() == NodeType::Start)
        .collect();
    match starts.len() {
        0 => errors.push(ValidationIssue::MissingStartNode),
        1 => {
            if graph.out_degree(starts[0]) == 0 {
                errors.push(ValidationIssue::StartWithoutOutgoing {
                    node_id: graph.graph[starts[0]].node_id.clone(),
                });
            }
        }
        count => errors.push(ValidationIssue::DuplicateStartNode { count }),
    }

    // End nodes
    let has_end = graph
        .graph
        .node_weights()
        .any(|n| n.node_type() == NodeType::End);
    if !has_end {
        warnings.push(ValidationIssue::NoEndNode);
    }

    // Per-node checks
    for idx in graph.graph.node_indices() {
        let node = graph.graph[idx];
        let out = graph.outgoing(&node.node_id);

        if node.node_type() != NodeType::Start && graph.in_degree(idx) == 0 && out.is_empty() {
            warnings.push(ValidationIssue::IsolatedNode {
                node_id: node.node_id.clone(),
            });
        }

        match &node.kind {
            NodeKind::Decision(config) => {
                let has_node_condition = config
                    .condition
                    .as_deref()
                    .is_some_and(|c| !c.trim().is_empty());
                // Exact duplicates never reach the graph, so every edge here is distinct.
                if out.len() < 2 {
                    errors.push(ValidationIssue::DecisionTooFewBranches {
                        node_id: node.node_id.clone(),
                        count: out.len(),
                    });
                }
                let defaults = out
                    .iter()
                    .filter(|e| !is_conditioned(e, has_node_condition))
                    .count();
                if defaults > 1 {
                    errors.push(ValidationIssue::DecisionMultipleDefaults {
                        node_id: node.node_id.clone(),
                        count: defaults,
                    });
                }
            }
            NodeKind::End(_) => {
                if !out.is_empty() {
                    warnings.push(ValidationIssue::EndWithOutgoing {
                        node_id: node.node_id.clone(),
                    });
                }
            }
            NodeKind::Start(_) | NodeKind::Score(_) | NodeKind::Api(_) => {
                if out.len() > 1 {
                    warnings.push(ValidationIssue::MultipleOutgoing {
                        node_id: node.node_id.clone(),
                        node_type: node.node_type(),
                        count: out.len(),
                    });
                }
            }
        }
    }

    // Cycles
    if let Err(cycle) = toposort(&graph.graph, None) {
        errors.push(ValidationIssue::CyclicWorkflow {
            node_id: graph.graph[cycle.node_id()].node_id.clone(),
        });
    }

    // Reachability from the single start node
    if let [start] = starts.as_slice() {
        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(&graph.graph, *start);
        while let Some(idx) = dfs.next(&graph.graph) {
            reachable.insert(idx);
        }
        for idx in graph.graph.node_indices() {
            let node = graph.graph[idx];
            let isolated = graph.in_degree(idx) == 0 && graph.out_degree(idx) == 0;
            if !reachable.contains(&idx) && !isolated {
                warnings.push(ValidationIssue::UnreachableNode {
                    node_id: node.node_id.clone(),
                });
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Whether an edge out of a decision node carries a branch condition.
///
/// Boolean source handles count as conditions only when the node itself has
/// a condition to evaluate.
pub fn is_conditioned(edge: &Edge, has_node_condition: bool) -> bool {
    edge.condition().is_some() || (has_node_condition && edge.boolean_handle().is_some())
}
