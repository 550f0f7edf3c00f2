use log::{debug, trace};

use crate::actor::{Actor, NO_SEQUENCE, SCALE_IDENTITY};
use crate::direction::Facing;
use crate::error::Result;
use crate::fixed::{self, Fixed};
use crate::flags::ActorFlags;
use crate::scene::Scene;
use crate::state_machine::WalkState;

/// Frame-rate compensation applied to every step, as a ratio.
pub const FRAME_COMPENSATION: (Fixed, Fixed) = (5, 4);

/// Whether the walk driver services this actor on the current frame.
pub fn is_active(actor: &Actor) -> bool {
    actor.flags.contains(ActorFlags::IN_USE | ActorFlags::WALKING)
        && !actor.flags.intersects(ActorFlags::HIDDEN | ActorFlags::PAUSED)
}

/// Advances one frame toward the sub-target, switching legs or arriving when
/// it is reached.
pub fn tick(scene: &Scene, actor: &mut Actor) -> Result<()> {
    if !is_active(actor) {
        return Ok(());
    }

    actor.x_fixed = advance_axis(actor.x_fixed, actor.slope_x, actor.scale, actor.target.x);
    actor.y_fixed = advance_axis(actor.y_fixed, actor.slope_y, actor.scale, actor.target.y);
    actor.position.x = fixed::floor(actor.x_fixed) as i16;
    actor.position.y = fixed::floor(actor.y_fixed) as i16;
    trace!("actor {} at {}", actor.id, actor.position);

    if actor.position != actor.target {
        return Ok(());
    }
    actor.set_position(actor.target);

    if let Some(index) = actor.pop_walk_point() {
        actor.target = scene.waypoints.get(index as u16)?;
        debug!("actor {}: next waypoint {index} at {}", actor.id, actor.target);
        retarget(actor)
    } else if let Some(destination) = actor.queued_target.take() {
        actor.target = destination;
        debug!("actor {}: final leg to {destination}", actor.id);
        retarget(actor)
    } else {
        arrive(actor)
    }
}

fn advance_axis(accumulator: Fixed, slope: i32, scale: i32, destination: i16) -> Fixed {
    let step = (scale as Fixed * slope as Fixed) / SCALE_IDENTITY as Fixed;
    let step = step * FRAME_COMPENSATION.0 / FRAME_COMPENSATION.1;
    let next = accumulator + step;
    let destination = destination as i32;
    let current = fixed::floor(next);
    if (slope >= 0 && destination < current) || (slope < 0 && current < destination) {
        fixed::from_int(destination)
    } else {
        next
    }
}

/// Recomputes the per-axis slope toward the current sub-target and, unless the
/// sequence is locked, the matching walk sequence.
pub fn retarget(actor: &mut Actor) -> Result<()> {
    let dx = actor.target.x as i32 - actor.position.x as i32;
    let dy = actor.target.y as i32 - actor.position.y as i32;

    let (unit_x, unit_y) = if dx == 0 && dy == 0 {
        (0, 0)
    } else if dx.abs() >= dy.abs() {
        (fixed::from_int(dx.signum()), fixed::ratio(dy, dx))
    } else {
        (fixed::ratio(dx, dy), fixed::from_int(dy.signum()))
    };
    actor.slope_x = scaled_slope(unit_x, actor.walk_speed, dx);
    actor.slope_y = scaled_slope(unit_y, actor.walk_speed, dy);

    if actor.flags.contains(ActorFlags::SEQUENCE_LOCKED) {
        return Ok(());
    }
    if let Some(facing) = Facing::classify(actor.slope_x, actor.slope_y)? {
        let sequence = facing.walk_sequence();
        if actor.sequence_id != sequence {
            actor.update_sequence(sequence);
        }
    }
    Ok(())
}

/// Unit slope times speed, never rounded down to zero while the axis still
/// has distance to cover.
fn scaled_slope(unit: Fixed, speed: i32, delta: i32) -> i32 {
    let magnitude = fixed::mul(unit.abs(), speed as Fixed).max(i32::from(delta != 0) as Fixed);
    let magnitude = magnitude.min(i32::MAX as Fixed) as i32;
    if delta < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Ends the walk: the actor rests and turns toward its facing point, or plays
/// its requested arrival sequence.
pub fn arrive(actor: &mut Actor) -> Result<()> {
    actor.flags.remove(ActorFlags::WALKING);
    actor.flags.insert(ActorFlags::AT_REST);
    actor.walk_points_index = -1;
    actor.walk_state = WalkState::ArrivalPending;

    let sequence = if actor.target_sequence_id >= 0 {
        Some(std::mem::replace(&mut actor.target_sequence_id, NO_SEQUENCE))
    } else {
        let mut dx = actor.facing_point.x as i32 - actor.position.x as i32;
        let mut dy = actor.facing_point.y as i32 - actor.position.y as i32;
        if dx == 0 && dy == 0 {
            dx = actor.slope_x;
            dy = actor.slope_y;
        }
        Facing::classify(dx, dy)?.map(Facing::idle_sequence)
    };
    if let Some(sequence) = sequence {
        if actor.sequence_id != sequence {
            actor.update_sequence(sequence);
        }
    }

    if !actor.flags.contains(ActorFlags::SCREEN_SPACE) {
        actor.flags.remove(ActorFlags::FACE_TARGET);
    }
    actor.walk_state = WalkState::Idle;
    debug!("actor {} arrived at {}", actor.id, actor.position);
    Ok(())
}
