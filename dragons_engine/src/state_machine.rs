use log::debug;
use serde::Serialize;

use crate::actor::ActorId;
use crate::error::{EngineError, Result};
use crate::path::{self, WalkMode};
use crate::scene::Point;
use crate::world::World;

/// Walk lifecycle of one actor.
///
/// `Idle -> PlanningRequested` on a walk request, then `Walking` when the
/// planner commits or back to `Idle` when it does not. The walk driver moves
/// `Walking -> ArrivalPending -> Idle` on final arrival; the pending state
/// only lasts while the idle sequence is being derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum WalkState {
    #[default]
    Idle,
    PlanningRequested,
    Walking,
    ArrivalPending,
}

/// Asks the planner to walk actor `id` to `target`. A walking actor may be
/// redirected; `Ok(false)` leaves it where it is.
pub fn request_walk(world: &mut World, id: ActorId, target: Point, mode: WalkMode) -> Result<bool> {
    let actor = world.actors.get_mut(id)?;
    if !actor.is_in_use() {
        return Err(EngineError::ActorNotLoaded(id));
    }

    let previous = actor.walk_state;
    actor.walk_state = WalkState::PlanningRequested;
    debug!("actor {id}: {previous:?} -> PlanningRequested for {target} ({mode:?})");

    let committed = match path::plan(&world.scene, actor, target, mode) {
        Ok(committed) => committed,
        Err(err) => {
            actor.walk_state = WalkState::Idle;
            return Err(err);
        }
    };
    if !committed || !actor.is_walking() {
        actor.walk_state = WalkState::Idle;
    }
    debug!("actor {id}: -> {:?}", actor.walk_state);
    Ok(committed)
}
