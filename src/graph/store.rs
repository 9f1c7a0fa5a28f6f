//! SQLite CRUD layer for the entity/relation backend.
//!
//! Uses `rusqlite` with `prepare_cached` for automatic statement caching —
//! the first call compiles each statement and later calls reuse it from the
//! connection's internal cache.

use rusqlite::{params, Connection};

use crate::catalog::{CatalogSource, RelationSource};
use crate::db::converters::{row_to_entity, row_to_relation};
use crate::db::schema::initialize_database;
use crate::error::Result;
use crate::types::{Entity, EntityId, Relation};

// ---------------------------------------------------------------------------
// BackendStats
// ---------------------------------------------------------------------------

/// Aggregate statistics about the stored graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BackendStats {
    pub entities: usize,
    pub relations: usize,
}

// ---------------------------------------------------------------------------
// GraphBackend
// ---------------------------------------------------------------------------

/// Typed CRUD wrapper around the backend SQLite database.
///
/// Implements [`CatalogSource`] and [`RelationSource`], so the catalog and
/// the traversal engine only ever see the traits.
pub struct GraphBackend {
    pub conn: Connection,
}

impl std::fmt::Debug for GraphBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBackend").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const UPSERT_ENTITY_SQL: &str = "\
INSERT INTO entities (id, label, kind, state, category_id, category, description, application, custom, extra)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(id) DO UPDATE SET
  label = excluded.label,
  kind = excluded.kind,
  state = excluded.state,
  category_id = excluded.category_id,
  category = excluded.category,
  description = excluded.description,
  application = excluded.application,
  custom = excluded.custom,
  extra = excluded.extra";

// OR IGNORE + the unique (from_id, to_id) index: the first stored relation
// over a pair wins, matching the merge discipline everywhere else.
const INSERT_RELATION_SQL: &str = "\
INSERT OR IGNORE INTO relations (from_id, to_id, kind, label)
VALUES (?1, ?2, ?3, ?4)";

const SELECT_ENTITY_COLS: &str = "\
id, label, kind, state, category_id, category, description, application, custom, extra";

const DELETE_ENTITY_SQL: &str = "DELETE FROM entities WHERE id = ?1";

const DELETE_RELATIONS_OF_ENTITY_SQL: &str = "\
DELETE FROM relations WHERE from_id = ?1 OR to_id = ?1";

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl GraphBackend {
    /// Open (creating if needed) the database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = initialize_database(db_path)?;
        Ok(Self { conn })
    }

    /// Wrap an already-initialized connection (tests use `:memory:`).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    // -- writes -------------------------------------------------------------

    /// Insert or update one entity.
    pub fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        let extra_json = if entity.extra.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&entity.extra)?)
        };
        let mut stmt = self.conn.prepare_cached(UPSERT_ENTITY_SQL)?;
        stmt.execute(params![
            entity.id,
            entity.label,
            entity.kind.as_str(),
            entity.state.map(|s| s.as_str()),
            entity.category_id,
            entity.category,
            entity.description,
            entity.application,
            entity.custom,
            extra_json,
        ])?;
        Ok(())
    }

    /// Upsert a batch inside one transaction.
    pub fn upsert_entities(&mut self, entities: &[Entity]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_ENTITY_SQL)?;
            for entity in entities {
                let extra_json = if entity.extra.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&entity.extra)?)
                };
                stmt.execute(params![
                    entity.id,
                    entity.label,
                    entity.kind.as_str(),
                    entity.state.map(|s| s.as_str()),
                    entity.category_id,
                    entity.category,
                    entity.description,
                    entity.application,
                    entity.custom,
                    extra_json,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert one relation. A relation over an already-stored `(from, to)`
    /// pair is silently ignored.
    pub fn insert_relation(&self, relation: &Relation) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(INSERT_RELATION_SQL)?;
        stmt.execute(params![
            relation.from,
            relation.to,
            relation.kind.as_str(),
            relation.label,
        ])?;
        Ok(())
    }

    /// Insert a batch inside one transaction.
    pub fn insert_relations(&mut self, relations: &[Relation]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_RELATION_SQL)?;
            for relation in relations {
                stmt.execute(params![
                    relation.from,
                    relation.to,
                    relation.kind.as_str(),
                    relation.label,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove an entity and every relation touching it.
    pub fn delete_entity(&mut self, id: EntityId) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.prepare_cached(DELETE_RELATIONS_OF_ENTITY_SQL)?
            .execute(params![id])?;
        tx.prepare_cached(DELETE_ENTITY_SQL)?.execute(params![id])?;
        tx.commit()?;
        Ok(())
    }

    // -- reads --------------------------------------------------------------

    /// Fetch one entity by id.
    pub fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        let sql = format!("SELECT {SELECT_ENTITY_COLS} FROM entities WHERE id = ?1");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query_map(params![id], row_to_entity)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn stats(&self) -> Result<BackendStats> {
        let entities: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        let relations: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))?;
        Ok(BackendStats {
            entities,
            relations,
        })
    }
}

impl CatalogSource for GraphBackend {
    fn fetch_all(&self) -> Result<Vec<Entity>> {
        let sql = format!("SELECT {SELECT_ENTITY_COLS} FROM entities ORDER BY label, id");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([], row_to_entity)?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(row?);
        }
        Ok(entities)
    }
}

impl RelationSource for GraphBackend {
    fn outgoing(&self, id: EntityId) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT from_id, to_id, kind, label FROM relations WHERE from_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![id], row_to_relation)?;
        let mut relations = Vec::new();
        for row in rows {
            relations.push(row?);
        }
        Ok(relations)
    }

    fn incoming(&self, id: EntityId) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT from_id, to_id, kind, label FROM relations WHERE to_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![id], row_to_relation)?;
        let mut relations = Vec::new();
        for row in rows {
            relations.push(row?);
        }
        Ok(relations)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, EntityState, RelationKind};

    fn setup() -> GraphBackend {
        GraphBackend::from_connection(initialize_database(":memory:").unwrap())
    }

    fn make_module(id: EntityId, label: &str) -> Entity {
        let mut e = Entity::new(id, label, EntityKind::Module);
        e.state = Some(EntityState::Installed);
        e
    }

    // -- entities -----------------------------------------------------------

    #[test]
    fn upsert_then_get_round_trips() {
        let backend = setup();
        let mut entity = make_module(1, "base");
        entity.extra.insert("icon".into(), "/base/icon.png".into());
        backend.upsert_entity(&entity).unwrap();

        let fetched = backend.get_entity(1).unwrap().unwrap();
        assert_eq!(fetched, entity);
    }

    #[test]
    fn upsert_overwrites_existing_row() {
        let backend = setup();
        backend.upsert_entity(&make_module(1, "base")).unwrap();

        let mut updated = make_module(1, "base");
        updated.state = Some(EntityState::ToUpgrade);
        backend.upsert_entity(&updated).unwrap();

        let fetched = backend.get_entity(1).unwrap().unwrap();
        assert_eq!(fetched.state, Some(EntityState::ToUpgrade));
        assert_eq!(backend.stats().unwrap().entities, 1);
    }

    #[test]
    fn fetch_all_orders_by_label() {
        let mut backend = setup();
        backend
            .upsert_entities(&[
                make_module(3, "zebra"),
                make_module(1, "alpha"),
                make_module(2, "mango"),
            ])
            .unwrap();

        let all = backend.fetch_all().unwrap();
        let labels: Vec<&str> = all.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "mango", "zebra"]);
    }

    #[test]
    fn missing_entity_is_none() {
        let backend = setup();
        assert!(backend.get_entity(404).unwrap().is_none());
    }

    // -- relations ----------------------------------------------------------

    #[test]
    fn first_relation_over_pair_wins() {
        let backend = setup();
        backend
            .insert_relation(&Relation::new(1, 2, RelationKind::DependsOn))
            .unwrap();
        backend
            .insert_relation(&Relation::new(1, 2, RelationKind::Exclusion))
            .unwrap();

        let out = backend.outgoing(1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, RelationKind::DependsOn);
    }

    #[test]
    fn outgoing_and_incoming_are_disjoint_views() {
        let mut backend = setup();
        backend
            .insert_relations(&[
                Relation::new(1, 2, RelationKind::DependsOn),
                Relation::new(3, 1, RelationKind::DependsOn),
            ])
            .unwrap();

        let out: Vec<_> = backend.outgoing(1).unwrap();
        let inc: Vec<_> = backend.incoming(1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pair(), (1, 2));
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].pair(), (3, 1));
    }

    #[test]
    fn relations_come_back_in_insert_order() {
        let mut backend = setup();
        backend
            .insert_relations(&[
                Relation::new(1, 5, RelationKind::DependsOn),
                Relation::new(1, 2, RelationKind::DependsOn),
                Relation::new(1, 9, RelationKind::DependsOn),
            ])
            .unwrap();

        let targets: Vec<EntityId> = backend.outgoing(1).unwrap().iter().map(|r| r.to).collect();
        assert_eq!(targets, vec![5, 2, 9]);
    }

    #[test]
    fn delete_entity_cascades_to_relations() {
        let mut backend = setup();
        backend.upsert_entity(&make_module(1, "base")).unwrap();
        backend.upsert_entity(&make_module(2, "sale")).unwrap();
        backend
            .insert_relations(&[
                Relation::new(2, 1, RelationKind::DependsOn),
                Relation::new(1, 2, RelationKind::Exclusion),
            ])
            .unwrap();

        backend.delete_entity(1).unwrap();

        let stats = backend.stats().unwrap();
        assert_eq!(stats.entities, 1);
        assert_eq!(stats.relations, 0);
    }

    #[test]
    fn stats_counts_rows() {
        let mut backend = setup();
        backend
            .upsert_entities(&[make_module(1, "a"), make_module(2, "b")])
            .unwrap();
        backend
            .insert_relation(&Relation::new(1, 2, RelationKind::DependsOn))
            .unwrap();

        let stats = backend.stats().unwrap();
        assert_eq!(
            stats,
            BackendStats {
                entities: 2,
                relations: 1
            }
        );
    }
}
