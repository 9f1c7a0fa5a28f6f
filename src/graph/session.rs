//! Incremental session graph: the accumulating view behind a selection UI.
//!
//! Each selection runs a traversal and merges the result additively into
//! the session. Merging is first-seen-wins on both node ids and edge
//! pairs, so re-selecting an entity never mutates what is already shown.

use std::collections::HashMap;

use crate::catalog::{EntityCatalog, RelationSource};
use crate::error::Result;
use crate::graph::traversal::TraversalEngine;
use crate::types::{
    Direction, Entity, EntityId, GraphSnapshot, Relation, StopConditions, TraversalResult,
};

// ---------------------------------------------------------------------------
// SessionGraph
// ---------------------------------------------------------------------------

/// The merged node/edge store for one session.
///
/// Insertion order is preserved: snapshots list nodes and edges in the
/// order they first entered the session.
#[derive(Debug, Default)]
pub struct SessionGraph {
    node_order: Vec<EntityId>,
    nodes: HashMap<EntityId, Entity>,
    edge_order: Vec<(EntityId, EntityId)>,
    edges: HashMap<(EntityId, EntityId), Relation>,
}

impl SessionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a traversal result additively. Nodes and edges already present
    /// keep their first-seen version; returns how many of each were new.
    pub fn merge(&mut self, result: &TraversalResult) -> (usize, usize) {
        let mut new_nodes = 0;
        for node in &result.nodes {
            if self.nodes.contains_key(&node.id) {
                continue;
            }
            self.node_order.push(node.id);
            self.nodes.insert(node.id, node.clone());
            new_nodes += 1;
        }

        let mut new_edges = 0;
        for edge in &result.edges {
            let pair = edge.pair();
            if self.edges.contains_key(&pair) {
                continue;
            }
            // Edges whose endpoints are not (or no longer) in the session
            // are dropped rather than left dangling.
            if !self.nodes.contains_key(&edge.from) || !self.nodes.contains_key(&edge.to) {
                continue;
            }
            self.edge_order.push(pair);
            self.edges.insert(pair, edge.clone());
            new_edges += 1;
        }

        (new_nodes, new_edges)
    }

    /// Remove one node and every edge touching it. Unknown ids are a no-op.
    pub fn remove_entity(&mut self, id: EntityId) {
        if self.nodes.remove(&id).is_none() {
            return;
        }
        self.node_order.retain(|&n| n != id);
        let edges = &mut self.edges;
        self.edge_order.retain(|&(from, to)| {
            if from == id || to == id {
                edges.remove(&(from, to));
                false
            } else {
                true
            }
        });
    }

    pub fn clear(&mut self) {
        self.node_order.clear();
        self.nodes.clear();
        self.edge_order.clear();
        self.edges.clear();
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach or overwrite one display-metadata key on a node already in
    /// the session. Returns false when the node is absent.
    pub fn set_extra(&mut self, id: EntityId, key: &str, value: &str) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.extra.insert(key.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    /// Copy-out view in first-insertion order.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .node_order
                .iter()
                .map(|id| self.nodes[id].clone())
                .collect(),
            edges: self
                .edge_order
                .iter()
                .map(|pair| self.edges[pair].clone())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// TraversalSession
// ---------------------------------------------------------------------------

/// A session graph plus the traversal options driving it.
///
/// Changing direction or options affects future selections only; the
/// merged graph is never retroactively re-filtered.
#[derive(Debug)]
pub struct TraversalSession {
    graph: SessionGraph,
    direction: Direction,
    options: StopConditions,
    seeds: Vec<EntityId>,
}

impl TraversalSession {
    pub fn new(direction: Direction, options: StopConditions) -> Self {
        Self {
            graph: SessionGraph::new(),
            direction,
            options,
            seeds: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn options(&self) -> &StopConditions {
        &self.options
    }

    pub fn set_options(&mut self, options: StopConditions) {
        self.options = options;
    }

    pub fn seeds(&self) -> &[EntityId] {
        &self.seeds
    }

    pub fn graph(&self) -> &SessionGraph {
        &self.graph
    }

    /// Select an entity: traverse from it alone under the current options
    /// and merge the result. The session is untouched when the traversal
    /// fails.
    pub fn select(
        &mut self,
        id: EntityId,
        catalog: &EntityCatalog,
        source: &dyn RelationSource,
    ) -> Result<(usize, usize)> {
        let engine = TraversalEngine::new(catalog, source);
        let result = engine.traverse(&[id], self.direction, &self.options)?;
        if !self.seeds.contains(&id) {
            self.seeds.push(id);
        }
        let added = self.graph.merge(&result);
        tracing::debug!(
            entity = id,
            new_nodes = added.0,
            new_edges = added.1,
            "selection merged"
        );
        Ok(added)
    }

    /// Remove a node (and its edges) from the session view. The id also
    /// stops counting as a seed.
    pub fn remove(&mut self, id: EntityId) {
        self.seeds.retain(|&s| s != id);
        self.graph.remove_entity(id);
    }

    pub fn clear(&mut self) {
        self.seeds.clear();
        self.graph.clear();
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
