use std::rc::Rc;

use dragons_formats::ActorResource;
use log::debug;

use crate::actor::{Actor, ActorId};
use crate::error::{EngineError, Result};
use crate::flags::ActorFlags;
use crate::scene::Point;

pub const ACTOR_POOL_SIZE: usize = 64;
/// Slots the frame handler services every frame.
pub const BASE_ACTOR_SLOTS: usize = 23;
/// Slots reserved for the player characters.
pub const PLAYER_SLOTS: usize = 2;

/// Fixed arena of actor records addressed by slot index.
#[derive(Debug, Clone)]
pub struct ActorPool {
    actors: Vec<Actor>,
}

impl Default for ActorPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorPool {
    pub fn new() -> Self {
        Self {
            actors: (0..ACTOR_POOL_SIZE as ActorId).map(Actor::new).collect(),
        }
    }

    pub fn get(&self, id: ActorId) -> Result<&Actor> {
        self.actors
            .get(id as usize)
            .ok_or(EngineError::ActorOutOfRange(id))
    }

    pub fn get_mut(&mut self, id: ActorId) -> Result<&mut Actor> {
        self.actors
            .get_mut(id as usize)
            .ok_or(EngineError::ActorOutOfRange(id))
    }

    /// Claims `requested`, or the first free slot past the player slots.
    pub fn allocate(
        &mut self,
        requested: Option<ActorId>,
        resource: Rc<ActorResource>,
        position: Point,
        sequence_id: i16,
    ) -> Result<ActorId> {
        let id = match requested {
            Some(id) => {
                self.get(id)?;
                id
            }
            None => self
                .actors
                .iter()
                .skip(PLAYER_SLOTS)
                .find(|actor| !actor.is_in_use())
                .map(|actor| actor.id)
                .ok_or(EngineError::PoolExhausted)?,
        };

        let actor = self.get_mut(id)?;
        actor.reset();
        actor.flags.insert(ActorFlags::IN_USE);
        actor.resource = Some(resource);
        actor.set_position(position);
        actor.target = position;
        actor.facing_point = position;
        actor.update_sequence(sequence_id);
        debug!("allocated actor {id} at {position} with sequence {sequence_id}");
        Ok(id)
    }

    pub fn free(&mut self, id: ActorId) -> Result<()> {
        self.get_mut(id)?.reset();
        debug!("freed actor {id}");
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    /// Visible actors back to front: priority layer, then y, then slot.
    pub fn draw_order(&self) -> Vec<ActorId> {
        let mut visible: Vec<&Actor> = self
            .actors
            .iter()
            .filter(|actor| actor.is_in_use() && !actor.flags.contains(ActorFlags::HIDDEN))
            .collect();
        visible.sort_by_key(|actor| (actor.priority_layer, actor.position.y, actor.id));
        visible.into_iter().map(|actor| actor.id).collect()
    }
}
