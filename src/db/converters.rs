//! Row-to-domain converters shared by the store queries.
//!
//! Column order is fixed by the SELECT constants in `graph::store`; the
//! converters index positionally rather than by name so `prepare_cached`
//! statements stay cheap.

use std::collections::BTreeMap;

use rusqlite::Row;

use crate::types::{Entity, EntityKind, EntityState, Relation, RelationKind};

/// Convert a row of `SELECT id, label, kind, state, category_id, category,
/// description, application, custom, extra FROM entities` into an [`Entity`].
///
/// Unknown `kind` strings fall back to [`EntityKind::Module`]; unknown
/// `state` strings become `None`. Both can appear when the backend was
/// loaded from a dump produced by a newer schema.
pub fn row_to_entity(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let kind_str: String = row.get(2)?;
    let state_str: Option<String> = row.get(3)?;
    let extra_json: Option<String> = row.get(9)?;

    let extra: BTreeMap<String, String> = match extra_json {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        None => BTreeMap::new(),
    };

    Ok(Entity {
        id: row.get(0)?,
        label: row.get(1)?,
        kind: EntityKind::from_str_loose(&kind_str).unwrap_or(EntityKind::Module),
        state: state_str.as_deref().and_then(EntityState::from_str_loose),
        category_id: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        application: row.get(7)?,
        custom: row.get(8)?,
        extra,
    })
}

/// Convert a row of `SELECT from_id, to_id, kind, label FROM relations`
/// into a [`Relation`]. Unknown kinds fall back to
/// [`RelationKind::DependsOn`].
pub fn row_to_relation(row: &Row<'_>) -> rusqlite::Result<Relation> {
    let kind_str: String = row.get(2)?;
    Ok(Relation {
        from: row.get(0)?,
        to: row.get(1)?,
        kind: RelationKind::from_str_loose(&kind_str).unwrap_or(RelationKind::DependsOn),
        label: row.get(3)?,
    })
}
