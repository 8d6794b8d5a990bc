//! Static dispatch graph for a flow.
//!
//! One supervisor node fans out to every registered entity and every entity
//! reports back to the supervisor. The graph is built once per router
//! configuration and only consulted for validation and introspection; the
//! routing loop itself walks supervisor -> entity -> supervisor.

use std::collections::HashSet;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::Direction;
use thiserror::Error;

/// Errors raised while building a [`DispatchGraph`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("flow has no teams or agents to route to")]
    Empty,

    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),

    #[error("entity {0} is not reachable from the supervisor")]
    Unreachable(String),
}

/// What kind of entity a node dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Team,
    Agent,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Team => write!(f, "team"),
            EntityKind::Agent => write!(f, "agent"),
        }
    }
}

/// A node in the dispatch graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphNode {
    Supervisor,
    Entity { name: String, kind: EntityKind },
}

impl GraphNode {
    pub fn name(&self) -> &str {
        match self {
            GraphNode::Supervisor => "supervisor",
            GraphNode::Entity { name, .. } => name,
        }
    }
}

/// Validated supervisor/entity graph.
#[derive(Debug, Clone)]
pub struct DispatchGraph {
    graph: DiGraph<GraphNode, ()>,
    supervisor: NodeIndex,
    entities: Vec<NodeIndex>,
}

impl DispatchGraph {
    /// Build the graph for `entities`, in registration order.
    pub fn build<'a, I>(entities: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (&'a str, EntityKind)>,
    {
        let mut graph = DiGraph::<GraphNode, ()>::new();
        let supervisor = graph.add_node(GraphNode::Supervisor);
        let mut seen = HashSet::new();
        let mut indices = Vec::new();

        for (name, kind) in entities {
            if !seen.insert(name.to_lowercase()) {
                return Err(GraphError::DuplicateEntity(name.to_string()));
            }
            let idx = graph.add_node(GraphNode::Entity {
                name: name.to_string(),
                kind,
            });
            graph.add_edge(supervisor, idx, ());
            graph.add_edge(idx, supervisor, ());
            indices.push(idx);
        }

        if indices.is_empty() {
            return Err(GraphError::Empty);
        }

        let built = Self {
            graph,
            supervisor,
            entities: indices,
        };
        built.verify_reachable()?;
        Ok(built)
    }

    fn verify_reachable(&self) -> Result<(), GraphError> {
        let mut reached = HashSet::new();
        let mut bfs = Bfs::new(&self.graph, self.supervisor);
        while let Some(idx) = bfs.next(&self.graph) {
            reached.insert(idx);
        }
        match self.entities.iter().find(|idx| !reached.contains(*idx)) {
            Some(&idx) => Err(GraphError::Unreachable(self.graph[idx].name().to_string())),
            None => Ok(()),
        }
    }

    /// Entity names in registration order.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities
            .iter()
            .map(|idx| self.graph[*idx].name())
            .collect()
    }

    pub fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        self.entities.iter().find_map(|idx| match &self.graph[*idx] {
            GraphNode::Entity { name: n, kind } if n == name => Some(*kind),
            _ => None,
        })
    }

    /// Names the supervisor can dispatch to directly.
    pub fn routes_from_supervisor(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(self.supervisor, Direction::Outgoing)
            .map(|idx| self.graph[idx].name())
            .collect();
        // petgraph yields neighbors newest-first.
        names.reverse();
        names
    }

    /// Whether `name` hands control back to the supervisor.
    pub fn returns_to_supervisor(&self, name: &str) -> bool {
        self.entities
            .iter()
            .find(|idx| self.graph[**idx].name() == name)
            .is_some_and(|idx| self.graph.contains_edge(*idx, self.supervisor))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_hub_and_spoke() {
        let graph = DispatchGraph::build([
            ("research", EntityKind::Team),
            ("writer", EntityKind::Agent),
        ])
        .unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.entity_names(), vec!["research", "writer"]);
        assert_eq!(graph.routes_from_supervisor(), vec!["research", "writer"]);
        assert!(graph.returns_to_supervisor("writer"));
        assert!(!graph.returns_to_supervisor("missing"));
        assert_eq!(graph.entity_kind("research"), Some(EntityKind::Team));
        assert_eq!(graph.entity_kind("writer"), Some(EntityKind::Agent));
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(
            DispatchGraph::build(Vec::<(&str, EntityKind)>::new()).unwrap_err(),
            GraphError::Empty
        );
        assert_eq!(
            DispatchGraph::build([("ops", EntityKind::Team), ("OPS", EntityKind::Agent)])
                .unwrap_err(),
            GraphError::DuplicateEntity("OPS".to_string())
        );
    }
}
