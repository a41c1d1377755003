//! Per-entity move watchers.

use std::collections::HashMap;
use std::rc::Rc;

use super::{Board, EntityId, Pos};

/// Handle of a registered watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

/// Relocation of a watched entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEvent {
    pub entity: EntityId,
    pub from: Option<Pos>,
    pub to: Option<Pos>,
    /// Set on the final event before the entity is torn down
    pub torn_down: bool,
}

/// Watcher callback. Gets the board so it can unwatch or spawn.
pub type WatchFn = Rc<dyn Fn(&mut Board, &MoveEvent)>;

/// Observer registry keyed by entity.
#[derive(Default)]
pub(crate) struct WatcherRegistry {
    next_id: u64,
    by_entity: HashMap<EntityId, Vec<(WatcherId, WatchFn)>>,
}

impl WatcherRegistry {
    pub(crate) fn add(&mut self, entity: EntityId, watcher: WatchFn) -> WatcherId {
        self.next_id += 1;
        let id = WatcherId(self.next_id);
        self.by_entity.entry(entity).or_default().push((id, watcher));
        id
    }

    pub(crate) fn remove(&mut self, entity: EntityId, id: WatcherId) -> bool {
        let Some(list) = self.by_entity.get_mut(&entity) else {
            return false;
        };
        let before = list.len();
        list.retain(|(wid, _)| *wid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_entity.remove(&entity);
        }
        removed
    }

    /// Copy of the current registrations, so callbacks can mutate the
    /// registry while being notified.
    pub(crate) fn snapshot(&self, entity: EntityId) -> Vec<WatchFn> {
        self.by_entity
            .get(&entity)
            .map(|list| list.iter().map(|(_, w)| Rc::clone(w)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, entity: EntityId) -> usize {
        self.by_entity.get(&entity).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&mut self, entity: EntityId) {
        self.by_entity.remove(&entity);
    }
}
