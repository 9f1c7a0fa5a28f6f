//! Pure catalog filtering for pick-lists and search boxes.
//!
//! No filter here touches the session graph; everything operates on a
//! borrowed entity slice and returns references in input order.

use std::collections::HashSet;

use crate::types::{Entity, EntityState};

/// A conjunctive query over the catalog.
///
/// `None` on a dimension means "don't care"; an empty include set also
/// passes everything, so a UI can clear a facet without rebuilding the
/// query.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    /// Case-insensitive substring over label and description.
    pub text: String,
    pub state_include: Option<HashSet<EntityState>>,
    pub category_include: Option<HashSet<i64>>,
    /// `Some(true)` keeps applications only, `Some(false)` non-applications.
    pub application_only: Option<bool>,
}

impl EntityQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.text.is_empty() {
            let needle = self.text.to_lowercase();
            let in_label = entity.label.to_lowercase().contains(&needle);
            let in_description = entity
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_label && !in_description {
                return false;
            }
        }

        if let Some(states) = &self.state_include {
            if !states.is_empty() {
                match entity.state {
                    Some(state) if states.contains(&state) => {}
                    _ => return false,
                }
            }
        }

        if let Some(categories) = &self.category_include {
            if !categories.is_empty() {
                match entity.category_id {
                    Some(category) if categories.contains(&category) => {}
                    _ => return false,
                }
            }
        }

        if let Some(want_app) = self.application_only {
            if entity.application.unwrap_or(false) != want_app {
                return false;
            }
        }

        true
    }
}

/// Filter `entities` down to those matching `query`, preserving order.
pub fn apply<'a>(entities: &'a [Entity], query: &EntityQuery) -> Vec<&'a Entity> {
    entities.iter().filter(|e| query.matches(e)).collect()
}
