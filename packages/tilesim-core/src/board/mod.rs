//! Tile board: entity arena, tile contents and move watchers.
//!
//! Placement is only mutated through write operations and claim
//! resolution; everything public here is either a query or bookkeeping
//! that does not change what sits on a tile.

mod entity;
mod pos;
mod watch;

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::Serialize;

use crate::error::{Result, SimError};

pub use entity::{Entity, EntityId, EntityKind};
pub use pos::Pos;
pub use watch::{MoveEvent, WatchFn, WatcherId};

use watch::WatcherRegistry;

/// State types that carry a board.
///
/// Write operations, claims and guards reach the board through this seam,
/// so game state can wrap the board with its own data.
pub trait BoardAccess {
    fn board(&self) -> &Board;
    fn board_mut(&mut self) -> &mut Board;
}

impl BoardAccess for Board {
    fn board(&self) -> &Board {
        self
    }

    fn board_mut(&mut self) -> &mut Board {
        self
    }
}

/// Drawable content of one tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSnapshot {
    pub pos: Pos,
    pub sprites: Vec<String>,
}

/// Shared tile-addressed state.
#[derive(Default)]
pub struct Board {
    /// Live entities
    entities: HashMap<EntityId, Entity>,
    /// Ordered contents of each occupied tile
    tiles: HashMap<Pos, Vec<EntityId>>,
    /// Last handed-out entity id
    next_id: u64,
    /// Inclusive min / exclusive max of every tile ever occupied
    bounds: Option<(Pos, Pos)>,
    watchers: WatcherRegistry,
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a live, unplaced entity.
    pub fn spawn(&mut self, kind: EntityKind) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(id, Entity { kind, pos: None });
        id
    }

    /// Whether `id` has not been torn down.
    pub fn is_live(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn pos(&self, id: EntityId) -> Option<Pos> {
        self.entities.get(&id).and_then(|e| e.pos)
    }

    pub fn kind(&self, id: EntityId) -> Option<&EntityKind> {
        self.entities.get(&id).map(|e| &e.kind)
    }

    /// Number of live entities, claim tokens included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Inclusive min and exclusive max of every tile ever occupied.
    pub fn bounds(&self) -> Option<(Pos, Pos)> {
        self.bounds
    }

    /// Entities on a tile in placement order. Claim tokens are excluded.
    pub fn contents(&self, pos: Pos) -> impl Iterator<Item = EntityId> + '_ {
        self.tile_ids(pos)
            .filter(move |id| !self.kind(*id).is_some_and(EntityKind::is_claim_token))
    }

    /// Claim tokens currently on a tile.
    pub fn claim_tokens(&self, pos: Pos) -> impl Iterator<Item = EntityId> + '_ {
        self.tile_ids(pos)
            .filter(move |id| self.kind(*id).is_some_and(EntityKind::is_claim_token))
    }

    /// Whether a tile holds a sprite with the given name.
    pub fn has_sprite(&self, pos: Pos, name: &str) -> bool {
        self.contents(pos)
            .any(|id| self.kind(id).and_then(EntityKind::sprite) == Some(name))
    }

    fn tile_ids(&self, pos: Pos) -> impl Iterator<Item = EntityId> + '_ {
        self.tiles.get(&pos).into_iter().flatten().copied()
    }

    /// Registers a move watcher on a live entity.
    pub fn watch(&mut self, entity: EntityId, watcher: WatchFn) -> Result<WatcherId> {
        if !self.is_live(entity) {
            return Err(SimError::EntityNotFound(entity));
        }
        Ok(self.watchers.add(entity, watcher))
    }

    /// Registers a move watcher from a closure.
    pub fn watch_with<F>(&mut self, entity: EntityId, watcher: F) -> Result<WatcherId>
    where
        F: Fn(&mut Board, &MoveEvent) + 'static,
    {
        self.watch(entity, Rc::new(watcher))
    }

    /// Removes a watcher. Returns false if it was not registered.
    pub fn unwatch(&mut self, entity: EntityId, id: WatcherId) -> bool {
        self.watchers.remove(entity, id)
    }

    pub fn watcher_count(&self, entity: EntityId) -> usize {
        self.watchers.count(entity)
    }

    /// Drawable content of every occupied tile, ordered by position.
    pub fn render(&self) -> Vec<TileSnapshot> {
        let mut tiles: BTreeMap<Pos, Vec<String>> = BTreeMap::new();
        for (pos, ids) in &self.tiles {
            let sprites: Vec<String> = ids
                .iter()
                .filter_map(|id| self.kind(*id).and_then(EntityKind::sprite))
                .map(str::to_string)
                .collect();
            if !sprites.is_empty() {
                tiles.insert(*pos, sprites);
            }
        }
        tiles
            .into_iter()
            .map(|(pos, sprites)| TileSnapshot { pos, sprites })
            .collect()
    }

    /// Moves an entity to `to`, detaching it from its current tile.
    ///
    /// Moving a torn-down entity to "nowhere" is a no-op.
    pub(crate) fn relocate(&mut self, id: EntityId, to: Option<Pos>) -> Result<()> {
        self.move_entity(id, to, false)
    }

    /// Moves an entity off the board and drops it and its watchers.
    /// Tearing down an already torn-down entity is a no-op.
    pub(crate) fn teardown(&mut self, id: EntityId) -> Result<()> {
        if !self.is_live(id) {
            return Ok(());
        }
        self.move_entity(id, None, true)?;
        self.entities.remove(&id);
        self.watchers.clear(id);
        Ok(())
    }

    fn move_entity(&mut self, id: EntityId, to: Option<Pos>, torn_down: bool) -> Result<()> {
        let Some(entity) = self.entities.get_mut(&id) else {
            return match to {
                None => Ok(()),
                Some(_) => Err(SimError::EntityNotFound(id)),
            };
        };
        let from = entity.pos;
        entity.pos = to;

        if let Some(old) = from {
            self.detach(id, old);
        }
        if let Some(new) = to {
            self.attach(id, new);
        }

        self.notify(MoveEvent {
            entity: id,
            from,
            to,
            torn_down,
        });
        Ok(())
    }

    fn detach(&mut self, id: EntityId, pos: Pos) {
        if let Some(ids) = self.tiles.get_mut(&pos) {
            ids.retain(|e| *e != id);
            if ids.is_empty() {
                self.tiles.remove(&pos);
            }
        }
    }

    fn attach(&mut self, id: EntityId, pos: Pos) {
        self.tiles.entry(pos).or_default().push(id);
        self.bounds = Some(match self.bounds {
            None => (pos, Pos::new(pos.x + 1, pos.y + 1)),
            Some((min, max)) => (
                Pos::new(min.x.min(pos.x), min.y.min(pos.y)),
                Pos::new(max.x.max(pos.x + 1), max.y.max(pos.y + 1)),
            ),
        });
    }

    fn notify(&mut self, event: MoveEvent) {
        for watcher in self.watchers.snapshot(event.entity) {
            watcher(self, &event);
        }
    }

    /// Places a fresh claim token on `pos`.
    ///
    /// Any tokens already on the tile are invalidated, and so is the new
    /// one: two claims on one tile in the same round both lose.
    pub(crate) fn place_claim_token(&mut self, pos: Pos) -> EntityId {
        let rivals: Vec<EntityId> = self.claim_tokens(pos).collect();
        let valid = rivals.is_empty();
        for rival in rivals {
            if let Some(entity) = self.entities.get_mut(&rival) {
                entity.kind = EntityKind::ClaimToken { valid: false };
            }
        }

        let token = self.spawn(EntityKind::ClaimToken { valid });
        if let Some(entity) = self.entities.get_mut(&token) {
            entity.pos = Some(pos);
        }
        self.tiles.entry(pos).or_default().push(token);
        token
    }

    /// Validity of a live claim token.
    pub(crate) fn token_valid(&self, id: EntityId) -> Option<bool> {
        match self.kind(id)? {
            EntityKind::ClaimToken { valid } => Some(*valid),
            _ => None,
        }
    }
}

impl core::fmt::Debug for Board {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Board")
            .field("entities", &self.entities.len())
            .field("tiles", &self.tiles.len())
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}
