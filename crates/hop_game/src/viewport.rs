//! Viewports and entity ownership.
//!
//! Every entity is owned by at most one viewport. The forward relation lives
//! in each viewport's insertion-ordered `owned` set; the entity keeps a plain
//! `owner` id as its back-reference. Both sides are only changed through
//! [`ViewportSet::adopt`] and [`ViewportSet::release`].
//!
//! Each tick, every viewport in registration order:
//!  1. takes movement input (WASD nudges the focused viewport),
//!  2. reads back its frame and drags tethered entities by its displacement,
//!  3. admits shared entities it now contains that no containing viewport
//!     already owns,
//!  4. evicts shared entities that left it.
//!
//! A final [`ViewportSet::reconcile`] sweep settles anything the passes left
//! unowned and checks that no entity ended up with two owners.

use std::collections::HashMap;

use glam::DVec2;
use hop_core::input::{InputState, Key};
use indexmap::IndexSet;

use crate::config::{EngineConfig, TetherPolicy};
use crate::entity::{Entity, EntityId};
use crate::host::{ViewportFrame, ViewportHost, WindowHandle};
use crate::registry::EntityRegistry;

/// Index in registration order; the first opened viewport is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub u32);

impl std::fmt::Display for ViewportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewport {}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    pub id: ViewportId,
    pub handle: WindowHandle,
    pub frame: ViewportFrame,
    pub allow_resize: bool,
    pub fullscreen: bool,
    pub last_teleport_tick: Option<u64>,
    owned: IndexSet<EntityId>,
    last_position: DVec2,
}

impl Viewport {
    pub fn new(
        id: ViewportId,
        handle: WindowHandle,
        frame: ViewportFrame,
        allow_resize: bool,
        fullscreen: bool,
    ) -> Self {
        Self {
            id,
            handle,
            frame,
            allow_resize,
            fullscreen,
            last_teleport_tick: None,
            owned: IndexSet::new(),
            last_position: frame.position,
        }
    }

    /// Inclusive: a point on the edge is inside.
    pub fn contains(&self, point: DVec2) -> bool {
        self.frame.bounds().contains_point(point)
    }

    pub fn owns(&self, id: EntityId) -> bool {
        self.owned.contains(&id)
    }

    pub fn owned(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.owned.iter().copied()
    }

    pub fn owned_count(&self) -> usize {
        self.owned.len()
    }

    fn refresh(&mut self, host: &dyn ViewportHost) {
        match host.frame(self.handle) {
            Some(frame) => self.frame = frame,
            None => self.frame.closed = true,
        }
    }

    /// Read the frame back from the host and return how far it moved since
    /// the last sync.
    fn sync(&mut self, host: &dyn ViewportHost) -> DVec2 {
        self.refresh(host);
        let delta = self.frame.position - self.last_position;
        self.last_position = self.frame.position;
        delta
    }
}

fn is_tethered(entity: &Entity, policy: TetherPolicy) -> bool {
    match policy {
        TetherPolicy::SharedOnly => entity.is_shared(),
        TetherPolicy::AllOwned => true,
    }
}

#[derive(Debug, Default)]
pub struct ViewportSet {
    viewports: Vec<Viewport>,
}

impl ViewportSet {
    pub fn register(
        &mut self,
        handle: WindowHandle,
        frame: ViewportFrame,
        allow_resize: bool,
        fullscreen: bool,
    ) -> ViewportId {
        let id = ViewportId(self.viewports.len() as u32);
        self.viewports
            .push(Viewport::new(id, handle, frame, allow_resize, fullscreen));
        id
    }

    pub fn get(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ViewportId) -> Option<&mut Viewport> {
        self.viewports.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Viewport> {
        self.viewports.iter()
    }

    pub fn len(&self) -> usize {
        self.viewports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }

    pub fn focused(&self) -> Option<ViewportId> {
        self.viewports
            .iter()
            .find(|viewport| viewport.frame.focused)
            .map(|viewport| viewport.id)
    }

    pub fn any_closed(&self) -> bool {
        self.viewports.iter().any(|viewport| viewport.frame.closed)
    }

    /// First viewport, in registration order, containing `point`.
    pub fn containing(&self, point: DVec2) -> Option<ViewportId> {
        self.viewports
            .iter()
            .find(|viewport| viewport.contains(point))
            .map(|viewport| viewport.id)
    }

    /// Make `id` the owner of `entity`, releasing any previous owner first.
    pub fn adopt(&mut self, id: ViewportId, entity: &mut Entity) {
        if entity.owner == Some(id) {
            return;
        }
        self.release(entity);
        if let Some(viewport) = self.get_mut(id) {
            viewport.owned.insert(entity.id);
            entity.owner = Some(id);
        }
    }

    pub fn release(&mut self, entity: &mut Entity) {
        if let Some(previous) = entity.owner.take() {
            if let Some(viewport) = self.get_mut(previous) {
                viewport.owned.shift_remove(&entity.id);
            }
        }
    }

    /// Drop a removed entity from its owner's set.
    pub fn forget(&mut self, id: EntityId, owner: Option<ViewportId>) {
        if let Some(viewport) = owner.and_then(|owner| self.get_mut(owner)) {
            viewport.owned.shift_remove(&id);
        }
    }

    /// Record a freshly added entity in the set its back-reference names.
    /// Entities pointing at an unknown viewport are left unowned.
    pub fn attach(&mut self, entity: &mut Entity) {
        match entity.owner.and_then(|owner| self.get_mut(owner)) {
            Some(viewport) => {
                viewport.owned.insert(entity.id);
            }
            None => entity.owner = None,
        }
    }

    /// Re-read every frame without consuming displacement. Used for the
    /// closed/focus checks that run before the viewport passes.
    pub fn refresh(&mut self, host: &dyn ViewportHost) {
        for viewport in &mut self.viewports {
            viewport.refresh(host);
        }
    }

    /// All viewport passes, then the reconciliation sweep.
    pub fn update(
        &mut self,
        host: &mut dyn ViewportHost,
        input: &InputState,
        registry: &mut EntityRegistry,
        config: &EngineConfig,
    ) {
        for index in 0..self.viewports.len() {
            self.pass(index, host, input, registry, config);
        }
        self.reconcile(registry);
    }

    fn pass(
        &mut self,
        index: usize,
        host: &mut dyn ViewportHost,
        input: &InputState,
        registry: &mut EntityRegistry,
        config: &EngineConfig,
    ) {
        let viewport = &self.viewports[index];
        if viewport.frame.focused {
            let dx = if input.is_held(Key::A) {
                -1.0
            } else if input.is_held(Key::D) {
                1.0
            } else {
                0.0
            };
            let dy = if input.is_held(Key::W) {
                -1.0
            } else if input.is_held(Key::S) {
                1.0
            } else {
                0.0
            };
            if dx != 0.0 || dy != 0.0 {
                host.move_by(viewport.handle, DVec2::new(dx, dy) * config.viewport_nudge);
            }
        }

        let viewport = &mut self.viewports[index];
        let delta = viewport.sync(host);
        let this = viewport.id;

        // Ids whose entity is gone are dropped here as well.
        let mut dead = Vec::new();
        for id in viewport.owned.iter().copied() {
            match registry.get_mut(id) {
                Some(entity) => {
                    if delta != DVec2::ZERO && is_tethered(entity, config.tether) {
                        entity.position += delta;
                        entity.on_viewport_moved(delta);
                    }
                }
                None => dead.push(id),
            }
        }
        for id in dead {
            viewport.owned.shift_remove(&id);
        }

        let viewport = &self.viewports[index];
        let admitted: Vec<EntityId> = registry
            .iter()
            .filter(|entity| entity.is_shared() && entity.owner != Some(this))
            .filter(|entity| {
                let held_elsewhere = entity
                    .owner
                    .and_then(|owner| self.get(owner))
                    .is_some_and(|owner| owner.contains(entity.position));
                !held_elsewhere && viewport.contains(entity.position)
            })
            .map(|entity| entity.id)
            .collect();
        for id in admitted {
            if let Some(entity) = registry.get_mut(id) {
                log::debug!("{this} admits entity {id}");
                self.adopt(this, entity);
            }
        }

        let viewport = &self.viewports[index];
        let evicted: Vec<EntityId> = viewport
            .owned
            .iter()
            .copied()
            .filter(|id| {
                registry
                    .get(*id)
                    .is_some_and(|entity| entity.is_shared() && !viewport.contains(entity.position))
            })
            .collect();
        for id in evicted {
            if let Some(entity) = registry.get_mut(id) {
                log::debug!("{this} evicts entity {id}");
                self.release(entity);
            }
        }
    }

    /// Restore the single-owner invariant and give every contained shared
    /// entity an owner. Returns how many ownership records had to be healed.
    pub fn reconcile(&mut self, registry: &mut EntityRegistry) -> usize {
        let mut healed = 0;

        // Forward sets: drop dead ids and second claims.
        let mut claimed: HashMap<EntityId, ViewportId> = HashMap::new();
        for viewport in &mut self.viewports {
            let this = viewport.id;
            viewport.owned.retain(|id| {
                if !registry.contains(*id) {
                    return false;
                }
                match claimed.get(id) {
                    Some(first) => {
                        debug_assert!(false, "entity {id} owned by {first} and {this}");
                        log::warn!("entity {id} owned by {first} and {this}; keeping {first}");
                        healed += 1;
                        false
                    }
                    None => {
                        claimed.insert(*id, this);
                        true
                    }
                }
            });
        }

        // Back-references must agree with the forward sets.
        for entity in registry.iter_mut() {
            let expected = claimed.get(&entity.id).copied();
            if entity.owner != expected {
                debug_assert!(
                    false,
                    "entity {} thinks it is owned by {:?}, sets say {:?}",
                    entity.id, entity.owner, expected
                );
                log::warn!(
                    "entity {} owner {:?} disagrees with {:?}; healing",
                    entity.id,
                    entity.owner,
                    expected
                );
                entity.owner = expected;
                healed += 1;
            }
        }

        // Shared entities belong to a viewport containing them, if any.
        for id in registry.ids_where(Entity::is_shared) {
            let Some(entity) = registry.get_mut(id) else {
                continue;
            };
            let owner_contains = entity
                .owner
                .and_then(|owner| self.get(owner))
                .is_some_and(|owner| owner.contains(entity.position));
            if owner_contains {
                continue;
            }
            match self.containing(entity.position) {
                Some(viewport) => self.adopt(viewport, entity),
                None => self.release(entity),
            }
        }

        healed
    }

    /// Close every viewport and clear the back-reference of everything they
    /// owned.
    pub fn teardown(&mut self, host: &mut dyn ViewportHost, registry: &mut EntityRegistry) {
        for viewport in self.viewports.drain(..) {
            host.close(viewport.handle);
            for id in viewport.owned {
                if let Some(entity) = registry.get_mut(id) {
                    entity.owner = None;
                }
            }
        }
    }

    /// Close viewports without touching entities, for aborted loads.
    pub fn close_all(&mut self, host: &mut dyn ViewportHost) {
        for viewport in self.viewports.drain(..) {
            host.close(viewport.handle);
        }
    }

    pub fn focus(&self, host: &mut dyn ViewportHost, id: ViewportId) {
        if let Some(viewport) = self.get(id) {
            host.focus(viewport.handle);
        }
    }

    /// Move focus `step` places along registration order, wrapping. With
    /// nothing focused the first viewport gets focus.
    pub fn cycle_focus(&self, host: &mut dyn ViewportHost, step: i32) {
        let count = self.viewports.len() as i32;
        if count == 0 {
            return;
        }
        let target = match self.focused() {
            Some(current) => (current.0 as i32 + step).rem_euclid(count),
            None => 0,
        };
        self.focus(host, ViewportId(target as u32));
    }

    /// Every viewport takes the position of the one before it; the first
    /// takes the last one's.
    pub fn rotate_positions(&self, host: &mut dyn ViewportHost) {
        if self.viewports.len() < 2 {
            return;
        }
        let positions: Vec<DVec2> = self
            .viewports
            .iter()
            .map(|viewport| {
                host.frame(viewport.handle)
                    .map(|frame| frame.position)
                    .unwrap_or(viewport.frame.position)
            })
            .collect();
        let count = positions.len();
        for (index, viewport) in self.viewports.iter().enumerate() {
            host.move_to(viewport.handle, positions[(index + count - 1) % count]);
        }
    }

    /// Teleport the focused viewport to another screen. Returns its centre
    /// before and after.
    pub fn teleport_focused(
        &mut self,
        host: &mut dyn ViewportHost,
        tick: u64,
    ) -> Option<(ViewportId, DVec2, DVec2)> {
        let id = self.focused()?;
        let viewport = self.get_mut(id)?;
        let (before, after) = host.teleport(viewport.handle)?;
        viewport.last_teleport_tick = Some(tick);
        log::info!("teleported {id}");
        Some((id, before, after))
    }

    /// Centre of a viewport as the host currently reports it.
    pub fn centre(&self, host: &dyn ViewportHost, id: ViewportId) -> Option<DVec2> {
        let viewport = self.get(id)?;
        host.frame(viewport.handle)
            .map(|frame| frame.bounds().center())
    }
}
