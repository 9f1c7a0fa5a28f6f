//! Bounded breadth-first traversal over the relation graph.
//!
//! The engine resolves every id against an in-memory [`EntityCatalog`] and
//! pulls relations lazily from a [`RelationSource`]. Output ordering is
//! deterministic: nodes and edges appear in first-discovery order, and a
//! given `(seeds, direction, stop)` triple always yields the same result.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::catalog::{EntityCatalog, RelationSource};
use crate::error::{GraphError, Result};
use crate::types::{
    Direction, Entity, EntityId, Relation, RelationKind, StopConditions, StopRule, TraversalResult,
};

// ---------------------------------------------------------------------------
// TraversalEngine
// ---------------------------------------------------------------------------

/// Stateless traversal over a catalog snapshot and a relation source.
///
/// Borrowing both keeps the engine trivially cheap to construct per call;
/// all state lives in the traversal itself.
pub struct TraversalEngine<'a> {
    catalog: &'a EntityCatalog,
    source: &'a dyn RelationSource,
}

impl<'a> TraversalEngine<'a> {
    pub fn new(catalog: &'a EntityCatalog, source: &'a dyn RelationSource) -> Self {
        Self { catalog, source }
    }

    /// Walk the graph from `seeds` under `stop`, returning the induced
    /// subgraph.
    ///
    /// Seeds are validated up front and deduplicated preserving order. A
    /// seed is always expanded once regardless of stop rules; only the
    /// depth bound gates it (`max_depth = Some(0)` returns the seeds with
    /// no edges at all). Non-seed nodes matching a stop rule are included
    /// but not expanded; nodes matching an exclusion filter are dropped
    /// entirely, edge included.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidSeed`] when any seed id is absent from the
    /// catalog; backend errors pass through.
    pub fn traverse(
        &self,
        seeds: &[EntityId],
        direction: Direction,
        stop: &StopConditions,
    ) -> Result<TraversalResult> {
        let mut seen_seeds: HashSet<EntityId> = HashSet::new();
        let mut roots: Vec<EntityId> = Vec::new();
        for &seed in seeds {
            if !self.catalog.contains(seed) {
                return Err(GraphError::InvalidSeed(seed));
            }
            if seen_seeds.insert(seed) {
                roots.push(seed);
            }
        }

        let mut result = TraversalResult::default();
        // id -> depth at first discovery
        let mut visited: HashMap<EntityId, u32> = HashMap::new();
        // BFS discovery tree, used for cycle tagging
        let mut parent: HashMap<EntityId, EntityId> = HashMap::new();
        let mut emitted: HashSet<(EntityId, EntityId)> = HashSet::new();
        let mut queue: VecDeque<EntityId> = VecDeque::new();

        for &root in &roots {
            visited.insert(root, 0);
            result.nodes.push(self.catalog.by_id(root)?.clone());
            queue.push_back(root);
        }

        while let Some(current) = queue.pop_front() {
            let depth = visited[&current];

            if let Some(max) = stop.max_depth {
                if depth >= max {
                    continue;
                }
            }
            // Stop rules never gate a seed.
            if depth > 0 {
                let entity = self.catalog.by_id(current)?;
                if matches_stop_rule(stop, entity) {
                    continue;
                }
            }

            let relations = match direction {
                Direction::Forward => self.source.outgoing(current)?,
                Direction::Reverse => self.source.incoming(current)?,
            };

            for relation in relations {
                let neighbor = match direction {
                    Direction::Forward => relation.to,
                    Direction::Reverse => relation.from,
                };

                let Some(entity) = self.catalog.get(neighbor) else {
                    tracing::warn!(
                        from = relation.from,
                        to = relation.to,
                        "skipping relation with endpoint missing from catalog"
                    );
                    continue;
                };

                if stop.exclude.iter().any(|f| f.matches(entity)) {
                    continue;
                }

                if !emitted.insert(relation.pair()) {
                    continue;
                }

                let mut edge = relation.clone();
                if is_ancestor(&parent, current, neighbor) {
                    edge.kind = RelationKind::Cycle;
                }
                result.edges.push(edge);

                if !visited.contains_key(&neighbor) {
                    visited.insert(neighbor, depth + 1);
                    parent.insert(neighbor, current);
                    result.nodes.push(entity.clone());
                    queue.push_back(neighbor);
                }
            }
        }

        tracing::debug!(
            seeds = roots.len(),
            nodes = result.nodes.len(),
            edges = result.edges.len(),
            "traversal complete"
        );
        Ok(result)
    }
}

/// True when `candidate` lies on the discovery path from a seed down to
/// `node` (inclusive). An edge back into such a node closes a cycle.
fn is_ancestor(
    parent: &HashMap<EntityId, EntityId>,
    node: EntityId,
    candidate: EntityId,
) -> bool {
    let mut cursor = node;
    loop {
        if cursor == candidate {
            return true;
        }
        match parent.get(&cursor) {
            Some(&up) => cursor = up,
            None => return false,
        }
    }
}

/// Checked in precedence order: installed state, category, non-custom,
/// domain. A match blocks expansion past the node, nothing more.
fn matches_stop_rule(stop: &StopConditions, entity: &Entity) -> bool {
    stop.rules.iter().any(|rule| match rule {
        StopRule::InstalledState => entity.state == Some(crate::types::EntityState::Installed),
        StopRule::Category(category_id) => entity.category_id == Some(*category_id),
        StopRule::NonCustom => !entity.custom.unwrap_or(false),
        StopRule::Domain(filter) => filter.matches(entity),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainClause, DomainFilter, DomainField, CmpOp, EntityKind, EntityState};

    struct MapSource {
        outgoing: HashMap<EntityId, Vec<Relation>>,
        incoming: HashMap<EntityId, Vec<Relation>>,
    }

    impl MapSource {
        fn from_edges(edges: &[Relation]) -> Self {
            let mut outgoing: HashMap<EntityId, Vec<Relation>> = HashMap::new();
            let mut incoming: HashMap<EntityId, Vec<Relation>> = HashMap::new();
            for edge in edges {
                outgoing.entry(edge.from).or_default().push(edge.clone());
                incoming.entry(edge.to).or_default().push(edge.clone());
            }
            Self { outgoing, incoming }
        }
    }

    impl RelationSource for MapSource {
        fn outgoing(&self, id: EntityId) -> Result<Vec<Relation>> {
            Ok(self.outgoing.get(&id).cloned().unwrap_or_default())
        }

        fn incoming(&self, id: EntityId) -> Result<Vec<Relation>> {
            Ok(self.incoming.get(&id).cloned().unwrap_or_default())
        }
    }

    fn make_module(id: EntityId, label: &str, state: EntityState) -> Entity {
        let mut e = Entity::new(id, label, EntityKind::Module);
        e.state = Some(state);
        e
    }

    fn dep(from: EntityId, to: EntityId) -> Relation {
        Relation::new(from, to, RelationKind::DependsOn)
    }

    /// Chain 1 -> 2 -> 3, plus 1 -> 4.
    fn chain_fixture() -> (EntityCatalog, MapSource) {
        let catalog = EntityCatalog::from_entities(vec![
            make_module(1, "sale", EntityState::Installed),
            make_module(2, "account", EntityState::Installed),
            make_module(3, "base", EntityState::Installed),
            make_module(4, "web", EntityState::Uninstalled),
        ]);
        let source = MapSource::from_edges(&[dep(1, 2), dep(2, 3), dep(1, 4)]);
        (catalog, source)
    }

    fn node_ids(result: &TraversalResult) -> Vec<EntityId> {
        result.nodes.iter().map(|n| n.id).collect()
    }

    fn edge_pairs(result: &TraversalResult) -> Vec<(EntityId, EntityId)> {
        result.edges.iter().map(Relation::pair).collect()
    }

    // -- basic walks --------------------------------------------------------

    #[test]
    fn forward_walk_covers_reachable_subgraph() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[1], Direction::Forward, &StopConditions::unbounded())
            .unwrap();

        assert_eq!(node_ids(&result), vec![1, 2, 4, 3]);
        assert_eq!(edge_pairs(&result), vec![(1, 2), (1, 4), (2, 3)]);
    }

    #[test]
    fn reverse_walk_finds_dependents() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[3], Direction::Reverse, &StopConditions::unbounded())
            .unwrap();

        assert_eq!(node_ids(&result), vec![3, 2, 1]);
        // Edges keep their natural direction even in a reverse walk.
        assert_eq!(edge_pairs(&result), vec![(2, 3), (1, 2)]);
    }

    #[test]
    fn repeated_traversal_is_deterministic() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);
        let stop = StopConditions::unbounded();

        let a = engine.traverse(&[1], Direction::Forward, &stop).unwrap();
        let b = engine.traverse(&[1], Direction::Forward, &stop).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn multiple_seeds_merge_into_one_result() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[3, 4], Direction::Forward, &StopConditions::unbounded())
            .unwrap();

        assert_eq!(node_ids(&result), vec![3, 4]);
        assert!(result.edges.is_empty());
    }

    #[test]
    fn duplicate_seeds_are_collapsed() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[1, 1, 1], Direction::Forward, &StopConditions::unbounded())
            .unwrap();
        assert_eq!(node_ids(&result), vec![1, 2, 4, 3]);
    }

    #[test]
    fn unknown_seed_is_rejected() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let err = engine
            .traverse(&[99], Direction::Forward, &StopConditions::unbounded())
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidSeed(99)));
    }

    #[test]
    fn empty_seed_list_yields_empty_result() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[], Direction::Forward, &StopConditions::unbounded())
            .unwrap();
        assert!(result.nodes.is_empty());
        assert!(result.edges.is_empty());
    }

    // -- depth bounds -------------------------------------------------------

    #[test]
    fn depth_zero_returns_seeds_without_edges() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(
                &[1],
                Direction::Forward,
                &StopConditions::unbounded().with_max_depth(0),
            )
            .unwrap();
        assert_eq!(node_ids(&result), vec![1]);
        assert!(result.edges.is_empty());
    }

    #[test]
    fn depth_one_stops_past_direct_neighbors() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(
                &[1],
                Direction::Forward,
                &StopConditions::unbounded().with_max_depth(1),
            )
            .unwrap();
        assert_eq!(node_ids(&result), vec![1, 2, 4]);
        assert_eq!(edge_pairs(&result), vec![(1, 2), (1, 4)]);
    }

    #[test]
    fn deeper_bound_never_shrinks_the_result() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let mut previous = 0;
        for depth in 0..4 {
            let result = engine
                .traverse(
                    &[1],
                    Direction::Forward,
                    &StopConditions::unbounded().with_max_depth(depth),
                )
                .unwrap();
            assert!(result.nodes.len() >= previous);
            previous = result.nodes.len();
        }
    }

    // -- stop rules ---------------------------------------------------------

    #[test]
    fn installed_seed_is_still_expanded() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(
                &[1],
                Direction::Forward,
                &StopConditions::unbounded().stop_on_installed(),
            )
            .unwrap();
        // Seed 1 (installed) expands once; installed neighbor 2 is kept but
        // not expanded, so 3 never appears.
        assert_eq!(node_ids(&result), vec![1, 2, 4]);
        assert_eq!(edge_pairs(&result), vec![(1, 2), (1, 4)]);
    }

    #[test]
    fn category_stop_blocks_expansion_past_match() {
        let catalog = EntityCatalog::from_entities(vec![
            make_module(1, "a", EntityState::Installed),
            {
                let mut e = make_module(2, "b", EntityState::Installed);
                e.category_id = Some(7);
                e
            },
            make_module(3, "c", EntityState::Installed),
        ]);
        let source = MapSource::from_edges(&[dep(1, 2), dep(2, 3)]);
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(
                &[1],
                Direction::Forward,
                &StopConditions::unbounded().stop_on_category(7),
            )
            .unwrap();
        assert_eq!(node_ids(&result), vec![1, 2]);
    }

    #[test]
    fn non_custom_stop_keeps_custom_chain_alive() {
        let custom = |id, label| {
            let mut e = make_module(id, label, EntityState::Installed);
            e.custom = Some(true);
            e
        };
        let catalog = EntityCatalog::from_entities(vec![
            custom(1, "a"),
            custom(2, "b"),
            make_module(3, "stock", EntityState::Installed),
            custom(4, "d"),
        ]);
        let source = MapSource::from_edges(&[dep(1, 2), dep(2, 3), dep(3, 4)]);
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(
                &[1],
                Direction::Forward,
                &StopConditions::unbounded().stop_on_non_custom(),
            )
            .unwrap();
        // Stops past stock module 3: custom node 4 behind it stays hidden.
        assert_eq!(node_ids(&result), vec![1, 2, 3]);
    }

    #[test]
    fn domain_stop_rule_matches_labels() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let filter = DomainFilter::new(vec![DomainClause {
            field: DomainField::Label,
            op: CmpOp::ILike,
            value: serde_json::json!("account"),
        }]);
        let result = engine
            .traverse(
                &[1],
                Direction::Forward,
                &StopConditions::unbounded().stop_on_domain(filter),
            )
            .unwrap();
        assert_eq!(node_ids(&result), vec![1, 2, 4]);
    }

    // -- exclusion filters --------------------------------------------------

    #[test]
    fn excluded_entity_is_dropped_with_its_edge() {
        let (catalog, source) = chain_fixture();
        let engine = TraversalEngine::new(&catalog, &source);

        let filter = DomainFilter::new(vec![DomainClause {
            field: DomainField::State,
            op: CmpOp::Eq,
            value: serde_json::json!("uninstalled"),
        }]);
        let result = engine
            .traverse(
                &[1],
                Direction::Forward,
                &StopConditions::unbounded().exclude_domain(filter),
            )
            .unwrap();
        // Module 4 (uninstalled) vanishes entirely, edge included.
        assert_eq!(node_ids(&result), vec![1, 2, 3]);
        assert_eq!(edge_pairs(&result), vec![(1, 2), (2, 3)]);
    }

    // -- cycles -------------------------------------------------------------

    #[test]
    fn back_edge_to_ancestor_is_tagged_cycle() {
        let catalog = EntityCatalog::from_entities(vec![
            make_module(1, "a", EntityState::Installed),
            make_module(2, "b", EntityState::Installed),
        ]);
        let source = MapSource::from_edges(&[dep(1, 2), dep(2, 1)]);
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[1], Direction::Forward, &StopConditions::unbounded())
            .unwrap();

        assert_eq!(node_ids(&result), vec![1, 2]);
        assert_eq!(result.edges.len(), 2);
        assert_eq!(result.edges[0].kind, RelationKind::DependsOn);
        assert_eq!(result.edges[1].pair(), (2, 1));
        assert_eq!(result.edges[1].kind, RelationKind::Cycle);
    }

    #[test]
    fn self_loop_is_tagged_cycle() {
        let catalog =
            EntityCatalog::from_entities(vec![make_module(1, "a", EntityState::Installed)]);
        let source = MapSource::from_edges(&[dep(1, 1)]);
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[1], Direction::Forward, &StopConditions::unbounded())
            .unwrap();
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].kind, RelationKind::Cycle);
    }

    #[test]
    fn cross_edge_between_branches_keeps_its_kind() {
        // Diamond: 1 -> 2, 1 -> 3, 2 -> 3. The 2 -> 3 edge joins two
        // branches without closing a cycle.
        let catalog = EntityCatalog::from_entities(vec![
            make_module(1, "a", EntityState::Installed),
            make_module(2, "b", EntityState::Installed),
            make_module(3, "c", EntityState::Installed),
        ]);
        let source = MapSource::from_edges(&[dep(1, 2), dep(1, 3), dep(2, 3)]);
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[1], Direction::Forward, &StopConditions::unbounded())
            .unwrap();

        assert_eq!(node_ids(&result), vec![1, 2, 3]);
        assert_eq!(edge_pairs(&result), vec![(1, 2), (1, 3), (2, 3)]);
        assert!(result.edges.iter().all(|e| e.kind == RelationKind::DependsOn));
    }

    // -- dangling relations -------------------------------------------------

    #[test]
    fn relation_to_uncataloged_entity_is_skipped() {
        let catalog =
            EntityCatalog::from_entities(vec![make_module(1, "a", EntityState::Installed)]);
        let source = MapSource::from_edges(&[dep(1, 42)]);
        let engine = TraversalEngine::new(&catalog, &source);

        let result = engine
            .traverse(&[1], Direction::Forward, &StopConditions::unbounded())
            .unwrap();
        assert_eq!(node_ids(&result), vec![1]);
        assert!(result.edges.is_empty());
    }
}
