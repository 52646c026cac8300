//! Keyed storage for navigation tiles
//!
//! Tiles live in a slot vector addressed through a position lookup, the same
//! layout a tile cache uses for its entries. Freed slots are reused, so scans
//! visit tiles in slot order and "first found" is deterministic.

use crate::agent::AgentType;
use crate::tile::{NavTile, TileKey};
use glam::Vec3;
use std::collections::HashMap;

#[derive(Debug)]
pub struct TileStore {
    tile_size: f32,
    slots: Vec<Option<NavTile>>,
    free_slots: Vec<usize>,
    lookup: HashMap<TileKey, usize>,
    /// Slot of the most recently accessed key
    last: Option<(TileKey, usize)>,
    next_generation: u64,
}

impl TileStore {
    pub fn new(tile_size: f32) -> Self {
        Self {
            tile_size,
            slots: Vec::new(),
            free_slots: Vec::new(),
            lookup: HashMap::new(),
            last: None,
            next_generation: 1,
        }
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn tile_coord_for(&self, pos: Vec3, agent: AgentType) -> TileKey {
        TileKey::for_position(pos, self.tile_size, agent)
    }

    fn slot_of(&mut self, key: &TileKey) -> Option<usize> {
        if let Some((last_key, slot)) = self.last {
            if last_key == *key {
                return Some(slot);
            }
        }
        let slot = *self.lookup.get(key)?;
        self.last = Some((*key, slot));
        Some(slot)
    }

    pub fn get(&self, key: &TileKey) -> Option<&NavTile> {
        let slot = match self.last {
            Some((last_key, slot)) if last_key == *key => slot,
            _ => *self.lookup.get(key)?,
        };
        self.slots[slot].as_ref()
    }

    pub fn get_mut(&mut self, key: &TileKey) -> Option<&mut NavTile> {
        let slot = self.slot_of(key)?;
        self.slots[slot].as_mut()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.lookup.contains_key(key)
    }

    /// Returns the tile for `key`, creating an unbuilt one if absent.
    ///
    /// Creating a tile does not schedule a build.
    pub fn get_or_create(&mut self, key: TileKey, now: f64) -> &mut NavTile {
        let slot = match self.slot_of(&key) {
            Some(slot) => slot,
            None => self.insert(key, now),
        };
        self.slots[slot]
            .as_mut()
            .unwrap_or_else(|| unreachable!("lookup points at an empty slot"))
    }

    fn insert(&mut self, key: TileKey, now: f64) -> usize {
        let generation = self.next_generation;
        self.next_generation += 1;

        let tile = NavTile::new(key, generation, self.tile_size, now);
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(tile);
                slot
            }
            None => {
                self.slots.push(Some(tile));
                self.slots.len() - 1
            }
        };
        self.lookup.insert(key, slot);
        self.last = Some((key, slot));

        log::debug!("Created tile {} (generation {})", key, generation);
        slot
    }

    /// Marks one tile as recently used, creating it if needed
    pub fn touch(&mut self, key: TileKey, now: f64) {
        self.get_or_create(key, now).poke_time = now;
    }

    /// Marks a tile and its eight grid neighbours as recently used.
    ///
    /// Neighbours are kept warm so the edges the tile stitches against exist.
    pub fn poke(&mut self, key: TileKey, now: f64) {
        for neighbor in key.neighborhood() {
            self.touch(neighbor, now);
        }
    }

    /// Deletes the tile entry entirely; a later lookup creates a fresh tile
    pub fn remove(&mut self, key: &TileKey) -> Option<NavTile> {
        let slot = self.lookup.remove(key)?;
        if matches!(self.last, Some((last_key, _)) if last_key == *key) {
            self.last = None;
        }
        self.free_slots.push(slot);
        self.slots[slot].take()
    }

    /// Tiles in slot order
    pub fn iter(&self) -> impl Iterator<Item = &NavTile> {
        self.slots.iter().flatten()
    }

    pub fn keys(&self) -> Vec<TileKey> {
        self.iter().map(|t| t.key).collect()
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Key currently held by the last-access memo
    pub fn memo_key(&self) -> Option<TileKey> {
        self.last.map(|(key, _)| key)
    }
}
