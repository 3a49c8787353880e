use std::collections::HashMap;

use super::entity::{EntityId, EntityKind};

/// Index from identifier to live entity.
///
/// The registry does not own entities; the player and ball managers do. It
/// records which manager holds each identifier so lookups resolve the kind
/// once, at registration, instead of re-parsing the identifier.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    entries: HashMap<EntityId, EntityKind>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and leaves the index untouched if `id` is empty or
    /// already registered. The first registration wins.
    pub fn register(&mut self, id: &EntityId, kind: EntityKind) -> bool {
        if id.is_empty() {
            log::warn!("Refusing to register entity with empty identifier");
            return false;
        }

        if self.entries.contains_key(id) {
            log::warn!("Entity {} is already registered", id);
            return false;
        }

        self.entries.insert(id.clone(), kind);
        log::debug!("Registered {:?} {}", kind, id);
        true
    }

    pub fn unregister(&mut self, id: &EntityId) -> Option<EntityKind> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            log::debug!("Unregistered {}", id);
        }
        removed
    }

    pub fn get(&self, id: &EntityId) -> Option<EntityKind> {
        self.entries.get(id).copied()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered entries ordered by identifier.
    pub fn all(&self) -> Vec<(EntityId, EntityKind)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(id, kind)| (id.clone(), *kind))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.keys()
    }

    /// Replaces the whole index with the given live entities, skipping empty
    /// identifiers. Returns the number of tracked entities.
    pub fn rebuild(&mut self, live: impl IntoIterator<Item = (EntityId, EntityKind)>) -> usize {
        self.entries.clear();
        for (id, kind) in live {
            if !id.is_empty() {
                self.entries.insert(id, kind);
            }
        }
        log::info!("Rebuilt object registry: {} entities tracked", self.entries.len());
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_keeps_first_entry() {
        let mut registry = ObjectRegistry::new();
        let id = EntityId::from("thing");

        assert!(registry.register(&id, EntityKind::Prop));
        assert!(!registry.register(&id, EntityKind::Ball));
        assert_eq!(registry.get(&id), Some(EntityKind::Prop));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let mut registry = ObjectRegistry::new();
        assert!(!registry.register(&EntityId::default(), EntityKind::Player));
        assert!(registry.is_empty());
    }

    #[test]
    fn unregistering_unknown_id_is_noop() {
        let mut registry = ObjectRegistry::new();
        registry.register(&EntityId::player(0), EntityKind::Player);

        assert_eq!(registry.unregister(&EntityId::ball(9)), None);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.unregister(&EntityId::player(0)), Some(EntityKind::Player));
        assert_eq!(registry.unregister(&EntityId::player(0)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn rebuild_replaces_index() {
        let mut registry = ObjectRegistry::new();
        registry.register(&EntityId::from("stale"), EntityKind::Prop);

        let count = registry.rebuild([
            (EntityId::player(0), EntityKind::Player),
            (EntityId::default(), EntityKind::Prop),
            (EntityId::ball(0), EntityKind::Ball),
        ]);

        assert_eq!(count, 2);
        assert!(!registry.contains(&EntityId::from("stale")));
        let ids: Vec<_> = registry.all().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![EntityId::ball(0), EntityId::player(0)]);
    }
}
