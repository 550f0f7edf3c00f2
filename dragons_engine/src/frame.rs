use std::thread;
use std::time::{Duration, Instant};

use log::trace;

use crate::actor::ActorId;
use crate::error::Result;
use crate::flags::{ActorFlags, EngineFlags};
use crate::host::EngineHost;
use crate::pool::{ACTOR_POOL_SIZE, BASE_ACTOR_SLOTS, PLAYER_SLOTS};
use crate::sequence;
use crate::walk;
use crate::world::World;

/// Milliseconds between frames at the 60 Hz game tick.
pub const TICK_INTERVAL_MS: u64 = 1000 / 60;

/// Blocks the host thread until the next frame is due.
pub trait FramePacer {
    fn wait(&mut self);
}

/// Runs frames back to back; used by tests and offline simulation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPacer;

impl FramePacer for NoopPacer {
    fn wait(&mut self) {}
}

/// Sleeps to a deadline that advances by one tick per frame. A late frame
/// resets the deadline instead of trying to catch up.
#[derive(Debug, Default, Clone)]
pub struct RealtimePacer {
    next_deadline: Option<Instant>,
}

impl RealtimePacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FramePacer for RealtimePacer {
    fn wait(&mut self) {
        let interval = Duration::from_millis(TICK_INTERVAL_MS);
        let now = Instant::now();
        match self.next_deadline {
            Some(deadline) if deadline > now => {
                thread::sleep(deadline - now);
                self.next_deadline = Some(deadline + interval);
            }
            _ => self.next_deadline = Some(now + interval),
        }
    }
}

/// The per-frame handler. Owns the round-robin cursor of the sequence scan.
#[derive(Debug, Clone)]
pub struct FrameLoop {
    /// One past the slot the scan examines next.
    next_slot: usize,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            next_slot: ACTOR_POOL_SIZE,
        }
    }

    /// Advances the world by one frame.
    pub fn tick(&mut self, world: &mut World, host: &mut dyn EngineHost) -> Result<()> {
        let actors_enabled = world.flags.contains(EngineFlags::ACTORS_ENABLED);
        if actors_enabled {
            self.run_sequence_turn(world, host)?;
        }

        refresh_priority_layers(world);
        count_down_sequence_timers(world);

        if actors_enabled {
            for id in 0..BASE_ACTOR_SLOTS as ActorId {
                walk::tick(&world.scene, world.actors.get_mut(id)?)?;
            }
        }

        world.objects.tick(world.scene.id);
        world.frame += 1;
        Ok(())
    }

    /// Gives the next due actor, scanning slots downward, its sequence turn.
    /// Returns the slot that ran.
    fn run_sequence_turn(
        &mut self,
        world: &mut World,
        host: &mut dyn EngineHost,
    ) -> Result<Option<ActorId>> {
        let range = if world.flags.contains(EngineFlags::EXTENDED_ACTOR_RANGE) {
            ACTOR_POOL_SIZE
        } else {
            BASE_ACTOR_SLOTS
        };
        let skip_players = world.flags.contains(EngineFlags::SKIP_PLAYER_SLOTS);

        let mut slot = self.next_slot.min(range);
        for _ in 0..range {
            slot = if slot == 0 { range - 1 } else { slot - 1 };
            if skip_players && slot < PLAYER_SLOTS {
                continue;
            }
            let actor = world.actors.get_mut(slot as ActorId)?;
            if actor.sequence_turn_due() {
                self.next_slot = slot;
                trace!("frame {}: sequence turn for actor {slot}", world.frame);
                sequence::run_turn(actor, host)?;
                return Ok(Some(slot as ActorId));
            }
        }
        self.next_slot = slot;
        Ok(None)
    }
}

/// Base slots follow the priority map under their feet unless frozen.
fn refresh_priority_layers(world: &mut World) {
    for id in 0..BASE_ACTOR_SLOTS as ActorId {
        let Ok(actor) = world.actors.get_mut(id) else {
            continue;
        };
        if !actor.is_in_use() || actor.flags.contains(ActorFlags::PRIORITY_FROZEN) {
            continue;
        }
        let priority = world
            .scene
            .raw_priority(actor.position.x as i32, actor.position.y as i32);
        if priority != -1 {
            actor.priority_layer = priority;
        }
        if actor.priority_layer >= 17 {
            actor.priority_layer = 0;
        }
        if actor.priority_layer >= 9 {
            actor.priority_layer -= 8;
        }
    }
}

fn count_down_sequence_timers(world: &mut World) {
    let extended = world.flags.contains(EngineFlags::EXTENDED_ACTOR_RANGE);
    for id in 0..ACTOR_POOL_SIZE as ActorId {
        let Ok(actor) = world.actors.get_mut(id) else {
            continue;
        };
        let serviced = if (id as usize) < BASE_ACTOR_SLOTS {
            actor.is_in_use()
        } else {
            extended
        };
        if serviced && actor.sequence_timer != 0 {
            actor.sequence_timer -= 1;
        }
    }
}
