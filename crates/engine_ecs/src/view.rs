//! Live per-family entity views.
//!
//! The engine keeps one view per distinct [`EntityFamily`] ever requested.
//! Views are updated incrementally on registration and removal, so they stay
//! in registration order and never need a rescan.

use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::entity::{Entity, EntityId};
use crate::family::EntityFamily;

new_key_type! {
    /// Durable handle to the live view of one family.
    pub struct ViewId;
}

struct View {
    family: EntityFamily,
    entities: Vec<EntityId>,
}

#[derive(Default)]
pub(crate) struct ViewCache {
    views: SlotMap<ViewId, View>,
    by_family: HashMap<EntityFamily, ViewId>,
}

impl ViewCache {
    pub(crate) fn lookup(&self, family: &EntityFamily) -> Option<ViewId> {
        self.by_family.get(family).copied()
    }

    /// Insert a view for `family`, populated with `entities`.
    pub(crate) fn insert(&mut self, family: EntityFamily, entities: Vec<EntityId>) -> ViewId {
        let id = self.views.insert(View {
            family: family.clone(),
            entities,
        });
        self.by_family.insert(family, id);
        id
    }

    pub(crate) fn get(&self, id: ViewId) -> Option<&[EntityId]> {
        self.views.get(id).map(|view| view.entities.as_slice())
    }

    /// Append a newly registered entity to every view whose family it joins.
    pub(crate) fn entity_added(&mut self, id: EntityId, entity: &Entity) {
        for view in self.views.values_mut() {
            if view.family.is_member(entity) {
                view.entities.push(id);
            }
        }
    }

    pub(crate) fn entity_removed(&mut self, id: EntityId) {
        for view in self.views.values_mut() {
            if let Some(pos) = view.entities.iter().position(|&e| e == id) {
                view.entities.remove(pos);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.views.len()
    }

    pub(crate) fn clear(&mut self) {
        self.views.clear();
        self.by_family.clear();
    }
}
