//! Entity catalog: the load-once snapshot of all selectable entities.
//!
//! Traversal never fetches entities on the fly — it resolves every id
//! against a catalog loaded up front. A refresh builds a fresh catalog and
//! swaps it in atomically; readers holding the old `Arc` keep a consistent
//! view until they drop it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{GraphError, Result};
use crate::types::{Entity, EntityId, Relation};

// ---------------------------------------------------------------------------
// Source traits
// ---------------------------------------------------------------------------

/// Anything that can enumerate the full entity population.
///
/// The SQLite store is the only production implementor; tests substitute
/// in-memory fakes.
pub trait CatalogSource {
    /// Fetch every entity, ordered by label then id.
    fn fetch_all(&self) -> Result<Vec<Entity>>;
}

/// Anything that can answer per-entity relation queries.
pub trait RelationSource {
    /// Relations whose `from` endpoint is `id`, in stored order.
    fn outgoing(&self, id: EntityId) -> Result<Vec<Relation>>;
    /// Relations whose `to` endpoint is `id`, in stored order.
    fn incoming(&self, id: EntityId) -> Result<Vec<Relation>>;
}

// ---------------------------------------------------------------------------
// EntityCatalog
// ---------------------------------------------------------------------------

/// Immutable snapshot of the entity population with O(1) id lookup.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl EntityCatalog {
    /// Build a catalog from a pre-fetched entity list. Duplicate ids keep
    /// the first occurrence.
    pub fn from_entities(entities: Vec<Entity>) -> Self {
        let mut deduped: Vec<Entity> = Vec::with_capacity(entities.len());
        let mut index: HashMap<EntityId, usize> = HashMap::with_capacity(entities.len());
        for entity in entities {
            if index.contains_key(&entity.id) {
                continue;
            }
            index.insert(entity.id, deduped.len());
            deduped.push(entity);
        }
        Self {
            entities: deduped,
            index,
        }
    }

    /// Fetch the full population from `source` and build a catalog.
    pub fn load(source: &dyn CatalogSource) -> Result<Self> {
        Ok(Self::from_entities(source.fetch_all()?))
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    /// Like [`get`](Self::get) but an error when absent.
    pub fn by_id(&self, id: EntityId) -> Result<&Entity> {
        self.get(id).ok_or(GraphError::NotFound(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// All entities in source order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SharedCatalog
// ---------------------------------------------------------------------------

/// Thread-safe slot holding the current catalog snapshot.
///
/// `get` hands out a cheap `Arc` clone; `refresh` swaps the slot in one
/// write-lock critical section, so a failed fetch leaves the previous
/// snapshot in place.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    slot: RwLock<Option<Arc<EntityCatalog>>>,
}

impl SharedCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The current snapshot.
    ///
    /// # Errors
    ///
    /// [`GraphError::Fetch`] when no catalog has been loaded yet.
    pub fn get(&self) -> Result<Arc<EntityCatalog>> {
        let guard = self.slot.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| GraphError::Fetch("catalog not loaded".into()))
    }

    pub fn is_loaded(&self) -> bool {
        let guard = self.slot.read().unwrap_or_else(|e| e.into_inner());
        guard.is_some()
    }

    /// Install a snapshot, replacing any previous one.
    pub fn replace(&self, catalog: Arc<EntityCatalog>) {
        let mut guard = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(catalog);
    }

    /// Fetch from `source` and install the result. On error the previous
    /// snapshot stays current.
    pub fn refresh(&self, source: &dyn CatalogSource) -> Result<Arc<EntityCatalog>> {
        let fresh = Arc::new(EntityCatalog::load(source)?);
        tracing::info!(entities = fresh.len(), "catalog refreshed");
        self.replace(Arc::clone(&fresh));
        Ok(fresh)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
