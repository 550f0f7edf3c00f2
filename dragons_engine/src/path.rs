//! Route planning over the waypoint table.
//!
//! [`search`] is pure: it reads the scene and returns a [`PlanOutcome`].
//! [`plan`] commits a successful outcome to an actor.

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, WALK_STACK_CAPACITY};
use crate::error::Result;
use crate::flags::ActorFlags;
use crate::line_of_sight::{visible, BandRule, SightMode};
use crate::scene::{Point, Scene};
use crate::state_machine::WalkState;
use crate::walk;

pub const SPIRAL_MAX_RADIUS: i32 = 319;
/// Squared distance under which a waypoint route to an unadjusted target is
/// not worth committing (25 pixels).
pub const DETOUR_THRESHOLD_SQ: i32 = 625;

/// `cos(k * 2pi / 32) * 16`, rounded.
const SPIRAL_COS: [i32; 32] = [
    16, 16, 15, 13, 11, 9, 6, 3, 0, -3, -6, -9, -11, -13, -15, -16, -16, -16, -15, -13, -11, -9,
    -6, -3, 0, 3, 6, 9, 11, 13, 15, 16,
];

/// Order in which single-pixel nudges are tried when no waypoint is in sight.
const COMPASS_NUDGES: [(i16, i16); 8] = [
    (0, -1),
    (0, 1),
    (1, 0),
    (-1, 0),
    (1, -1),
    (-1, -1),
    (1, 1),
    (-1, 1),
];

const UNIT_NUDGES: [i16; 3] = [-1, 0, 1];

/// Probe mode of a walk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WalkMode {
    /// Only bands 1..=8 are walkable.
    Strict,
    /// Bands 1..=16 are walkable.
    Relaxed,
    /// Walk straight to the target.
    Ignore,
}

impl WalkMode {
    /// Script operand encoding: 0, 1, anything else ignores priority.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => WalkMode::Strict,
            1 => WalkMode::Relaxed,
            _ => WalkMode::Ignore,
        }
    }

    pub fn sight(self) -> SightMode {
        SightMode::new(match self {
            WalkMode::Strict => BandRule::Strict,
            WalkMode::Relaxed => BandRule::Relaxed,
            WalkMode::Ignore => BandRule::Always,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWalk {
    /// Actor position, possibly nudged by a pixel.
    pub start: Point,
    /// Final destination, possibly moved onto walkable ground.
    pub target: Point,
    /// Waypoint indices; the last entry is walked to first.
    pub stack: Vec<u8>,
    pub direct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    AlreadyThere,
    Unreachable,
    /// A route exists but the detour is too small to be worth it.
    Rejected,
    Walk(PlannedWalk),
}

/// Plans a walk from `from` to `requested` without touching any actor.
pub fn search(scene: &Scene, from: Point, requested: Point, mode: WalkMode) -> PlanOutcome {
    if from == requested {
        return PlanOutcome::AlreadyThere;
    }

    let sight = mode.sight();
    let mut target = requested;
    if mode != WalkMode::Ignore
        && !sight
            .rule
            .accepts(scene.band_at(target.x as i32, target.y as i32))
    {
        match spiral_search(scene, target, sight.rule) {
            Some(adjusted) => {
                debug!("moved target {requested} onto walkable ground at {adjusted}");
                target = adjusted;
            }
            None => return PlanOutcome::Unreachable,
        }
    }
    if from == target {
        return PlanOutcome::AlreadyThere;
    }

    if visible(scene, from, target, sight) {
        return PlanOutcome::Walk(PlannedWalk {
            start: from,
            target,
            stack: Vec::new(),
            direct: true,
        });
    }
    if let Some((start, target)) = nudge_pair(scene, from, target, sight) {
        return PlanOutcome::Walk(PlannedWalk {
            start,
            target,
            stack: Vec::new(),
            direct: true,
        });
    }

    let Some(start) = nudge_into_waypoint_sight(scene, from, sight) else {
        return PlanOutcome::Unreachable;
    };
    let Some(target) = nudge_into_waypoint_sight(scene, target, sight) else {
        return PlanOutcome::Unreachable;
    };
    let Some(stack) = build_route(scene, start, target, sight) else {
        return PlanOutcome::Unreachable;
    };

    if target != requested || target.distance_squared(start) > DETOUR_THRESHOLD_SQ {
        PlanOutcome::Walk(PlannedWalk {
            start,
            target,
            stack,
            direct: false,
        })
    } else {
        PlanOutcome::Rejected
    }
}

/// Plans and commits a walk. `Ok(false)` means the actor stays put; errors
/// only come from sequence derivation on the first leg, and leave the actor
/// untouched apart from stopping a walk already in progress.
pub fn plan(scene: &Scene, actor: &mut Actor, requested: Point, mode: WalkMode) -> Result<bool> {
    let was_walking = actor.is_walking();

    let walk = match search(scene, actor.position, requested, mode) {
        PlanOutcome::Walk(walk) => walk,
        PlanOutcome::AlreadyThere => {
            if was_walking {
                actor.stop_walk();
            }
            return Ok(true);
        }
        outcome => {
            debug!(
                "actor {}: no walk from {} to {requested} ({outcome:?})",
                actor.id, actor.position
            );
            if was_walking {
                actor.stop_walk();
            }
            return Ok(false);
        }
    };

    let mut next = actor.clone();
    if let Err(err) = commit(scene, &mut next, &walk, requested) {
        warn!(
            "actor {}: walk {} -> {} abandoned: {err}",
            actor.id, walk.start, walk.target
        );
        if was_walking {
            actor.stop_walk();
        }
        return Err(err);
    }
    *actor = next;
    info!(
        "actor {}: walking {} -> {} via {:?}",
        actor.id, walk.start, walk.target, walk.stack
    );
    Ok(true)
}

fn commit(scene: &Scene, actor: &mut Actor, walk: &PlannedWalk, requested: Point) -> Result<()> {
    actor.set_position(walk.start);
    match walk.stack.split_last() {
        None => {
            actor.target = walk.target;
            actor.walk_points_index = -1;
            actor.queued_target = None;
        }
        Some((&first_leg, rest)) => {
            actor.target = scene.waypoints.get(first_leg as u16)?;
            actor.walk_points[..rest.len()].copy_from_slice(rest);
            actor.walk_points_index = rest.len() as i16 - 1;
            actor.queued_target = Some(walk.target);
        }
    }
    actor.flags.insert(ActorFlags::WALKING);
    actor.flags.remove(ActorFlags::AT_REST);
    if !actor.flags.contains(ActorFlags::FACE_TARGET) {
        actor.facing_point = requested;
    }
    actor.walk_state = WalkState::Walking;
    walk::retarget(actor)
}

/// First acceptable point on rings of growing radius around `target`.
fn spiral_search(scene: &Scene, target: Point, rule: BandRule) -> Option<Point> {
    for radius in 1..=SPIRAL_MAX_RADIUS {
        for angle in 0..SPIRAL_COS.len() {
            let dx = SPIRAL_COS[angle] * radius / 16;
            let dy = SPIRAL_COS[(angle + 24) % SPIRAL_COS.len()] * radius / 16;
            let x = target.x as i32 + dx;
            let y = target.y as i32 + dy;
            if rule.accepts(scene.band_at(x, y)) {
                return Some(Point::new(x as i16, y as i16));
            }
        }
    }
    None
}

/// Tries every one-pixel shift of both endpoints, actor offsets outermost.
fn nudge_pair(scene: &Scene, from: Point, to: Point, sight: SightMode) -> Option<(Point, Point)> {
    for ax in UNIT_NUDGES {
        for ay in UNIT_NUDGES {
            for tx in UNIT_NUDGES {
                for ty in UNIT_NUDGES {
                    if (ax, ay, tx, ty) == (0, 0, 0, 0) {
                        continue;
                    }
                    let start = from.offset(ax, ay);
                    let target = to.offset(tx, ty);
                    if visible(scene, start, target, sight) {
                        return Some((start, target));
                    }
                }
            }
        }
    }
    None
}

fn sees_any_waypoint(scene: &Scene, point: Point, sight: SightMode) -> bool {
    scene
        .waypoints
        .iter()
        .any(|(_, waypoint)| visible(scene, point, waypoint, sight))
}

/// `point` itself when some waypoint is visible from it, else the first
/// compass neighbour that can see one.
fn nudge_into_waypoint_sight(scene: &Scene, point: Point, sight: SightMode) -> Option<Point> {
    if sees_any_waypoint(scene, point, sight) {
        return Some(point);
    }
    COMPASS_NUDGES
        .iter()
        .map(|&(dx, dy)| point.offset(dx, dy))
        .find(|&nudged| sees_any_waypoint(scene, nudged, sight))
}

/// Grows a waypoint chain backward from `target` until `start` can see its
/// head. Returns `None` when the chain dead-ends or outgrows the walk stack.
fn build_route(scene: &Scene, start: Point, target: Point, sight: SightMode) -> Option<Vec<u8>> {
    let mut stack: Vec<u8> = Vec::new();
    let mut used = [false; dragons_formats::WAYPOINT_SLOTS];
    let mut head = target;

    while !visible(scene, start, head, sight) {
        let mut best: Option<(usize, Point, i32)> = None;
        for (index, waypoint) in scene.waypoints.iter() {
            if used[index] || !visible(scene, waypoint, head, sight) {
                continue;
            }
            let distance = waypoint.distance_squared(start);
            if best.map_or(true, |(_, _, closest)| distance < closest) {
                best = Some((index, waypoint, distance));
            }
        }
        let (index, waypoint, _) = best?;
        used[index] = true;

        // Drop entries the new waypoint can skip past.
        while !stack.is_empty() {
            let below = match stack.len() {
                1 => target,
                len => scene_waypoint(scene, stack[len - 2])?,
            };
            if visible(scene, waypoint, below, sight) {
                stack.pop();
            } else {
                break;
            }
        }

        if stack.len() == WALK_STACK_CAPACITY {
            debug!("route needs more than {WALK_STACK_CAPACITY} waypoints");
            return None;
        }
        stack.push(index as u8);
        head = waypoint;
    }
    Some(stack)
}

fn scene_waypoint(scene: &Scene, index: u8) -> Option<Point> {
    scene.waypoints.get(index as u16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{PriorityMap, WaypointTable};

    fn open_scene(waypoints: &[Point]) -> Scene {
        Scene::new(
            0,
            320,
            200,
            PriorityMap::uniform(320, 200, 5),
            WaypointTable::from_points(waypoints),
        )
    }

    /// 320x200 floor split by a vertical band-0 wall at x = 150 with a gap
    /// at y = 20..=30.
    fn walled_scene(waypoints: &[Point]) -> Scene {
        let mut bands = vec![5i16; 320 * 200];
        for y in 0..200usize {
            if !(20..=30).contains(&y) {
                bands[y * 320 + 150] = 0;
            }
        }
        Scene::new(
            0,
            320,
            200,
            PriorityMap::new(320, 200, bands),
            WaypointTable::from_points(waypoints),
        )
    }

    fn actor_at(x: i16, y: i16) -> Actor {
        let mut actor = Actor::new(5);
        actor.flags.insert(ActorFlags::IN_USE);
        actor.set_position(Point::new(x, y));
        actor.target = actor.position;
        actor
    }

    #[test]
    fn open_floor_walks_straight_to_target() {
        let scene = open_scene(&[]);
        let mut actor = actor_at(10, 10);
        assert!(plan(&scene, &mut actor, Point::new(300, 190), WalkMode::Strict).unwrap());
        assert!(actor.walk_stack().is_empty());
        assert_eq!(actor.target, Point::new(300, 190));
        assert_eq!(actor.queued_target, None);
        assert!(actor.is_walking());
        assert!(!actor.is_at_rest());
    }

    #[test]
    fn planning_to_own_position_changes_nothing() {
        let scene = open_scene(&[]);
        let mut actor = actor_at(10, 10);
        let before = actor.clone();
        assert!(plan(&scene, &mut actor, Point::new(10, 10), WalkMode::Strict).unwrap());
        assert_eq!(actor.target, before.target);
        assert_eq!(actor.flags, before.flags);
        assert!(actor.walk_stack().is_empty());
    }

    #[test]
    fn unwalkable_target_moves_onto_floor() {
        let mut bands = vec![5i16; 320 * 200];
        for y in 95..=105usize {
            for x in 95..=105usize {
                bands[y * 320 + x] = 0;
            }
        }
        let scene = Scene::new(
            0,
            320,
            200,
            PriorityMap::new(320, 200, bands),
            WaypointTable::default(),
        );
        let outcome = search(&scene, Point::new(300, 100), Point::new(100, 100), WalkMode::Strict);
        let PlanOutcome::Walk(walk) = outcome else {
            panic!("expected a walk, got {outcome:?}");
        };
        assert!(walk.direct);
        assert!(scene.band_at(walk.target.x as i32, walk.target.y as i32) == 5);
        // East is the first spiral angle; radius 6 clears the block.
        assert_eq!(walk.target, Point::new(106, 100));
    }

    #[test]
    fn wall_routes_through_gap_waypoint() {
        let gap = Point::new(150, 25);
        let scene = walled_scene(&[Point::new(10, 190), gap]);
        let mut actor = actor_at(100, 150);
        assert!(plan(&scene, &mut actor, Point::new(200, 150), WalkMode::Strict).unwrap());
        assert_eq!(actor.target, gap);
        assert!(actor.walk_stack().is_empty());
        assert_eq!(actor.queued_target, Some(Point::new(200, 150)));
    }

    #[test]
    fn blocked_without_waypoints_fails_and_leaves_actor() {
        let scene = walled_scene(&[]);
        let mut actor = actor_at(100, 150);
        assert!(!plan(&scene, &mut actor, Point::new(200, 150), WalkMode::Strict).unwrap());
        assert_eq!(actor.position, Point::new(100, 150));
        assert_eq!(actor.target, Point::new(100, 150));
        assert!(!actor.is_walking());
    }

    #[test]
    fn failed_replan_stops_a_walking_actor() {
        let scene = walled_scene(&[]);
        let mut actor = actor_at(100, 150);
        actor.flags.insert(ActorFlags::WALKING);
        actor.target = Point::new(120, 150);
        assert!(!plan(&scene, &mut actor, Point::new(200, 150), WalkMode::Strict).unwrap());
        assert!(!actor.is_walking());
        assert!(actor.is_at_rest());
        assert_eq!(actor.target, actor.position);
    }

    #[test]
    fn unsupported_first_leg_commits_nothing() {
        let scene = open_scene(&[]);
        let mut actor = actor_at(50, 50);
        let before = actor.clone();
        assert!(plan(&scene, &mut actor, Point::new(20, 20), WalkMode::Strict).is_err());
        assert_eq!(actor.position, before.position);
        assert_eq!(actor.target, before.target);
        assert_eq!(actor.flags, before.flags);
        assert_eq!(actor.walk_state, before.walk_state);
        assert_eq!(actor.sequence_id, before.sequence_id);
    }

    #[test]
    fn edge_nudge_stays_on_stage() {
        let mut bands = vec![5i16; 320 * 200];
        bands[100 * 320 + 100] = 0;
        let scene = Scene::new(
            0,
            320,
            200,
            PriorityMap::new(320, 200, bands),
            WaypointTable::default(),
        );
        let outcome = search(&scene, Point::new(0, 100), Point::new(200, 100), WalkMode::Strict);
        // Every x = -1 start is off stage; the next offsets in order are
        // start (0, -1) and target (-1, -1).
        assert_eq!(
            outcome,
            PlanOutcome::Walk(PlannedWalk {
                start: Point::new(0, 99),
                target: Point::new(199, 99),
                stack: Vec::new(),
                direct: true,
            })
        );

        let mut actor = actor_at(0, 100);
        assert!(plan(&scene, &mut actor, Point::new(200, 100), WalkMode::Strict).unwrap());
        assert!(scene.contains(actor.position));
        assert_eq!(actor.position, Point::new(0, 99));
    }

    /// Band-0 stage with one-pixel corridors: a start stub on row 100, a
    /// corridor on row 99 to the corner waypoint (90, 99), a column down
    /// x = 90 and a target stub on x = 91 beside its lower end.
    fn corridor_scene() -> Scene {
        let mut bands = vec![0i16; 200 * 200];
        let mut open = |x: usize, y: usize| bands[y * 200 + x] = 5;
        (0..=40).for_each(|x| open(x, 100));
        (0..=90).for_each(|x| open(x, 99));
        (99..=150).for_each(|y| open(90, y));
        (140..=160).for_each(|y| open(91, y));
        Scene::new(
            0,
            200,
            200,
            PriorityMap::new(200, 200, bands),
            WaypointTable::from_points(&[Point::new(90, 99)]),
        )
    }

    #[test]
    fn compass_nudges_bring_both_ends_into_waypoint_sight() {
        let scene = corridor_scene();
        let outcome = search(&scene, Point::new(20, 100), Point::new(91, 150), WalkMode::Strict);
        // The start needs the first compass step (north); the target only
        // sees the corner after the fourth (west).
        assert_eq!(
            outcome,
            PlanOutcome::Walk(PlannedWalk {
                start: Point::new(20, 99),
                target: Point::new(90, 150),
                stack: vec![0],
                direct: false,
            })
        );
    }

    #[test]
    fn no_walkable_ground_within_spiral_is_unreachable() {
        let scene = Scene::new(
            0,
            320,
            200,
            PriorityMap::uniform(320, 200, 12),
            WaypointTable::default(),
        );
        assert_eq!(
            search(&scene, Point::new(10, 10), Point::new(50, 50), WalkMode::Strict),
            PlanOutcome::Unreachable
        );
        assert!(matches!(
            search(&scene, Point::new(10, 10), Point::new(50, 50), WalkMode::Relaxed),
            PlanOutcome::Walk(PlannedWalk { direct: true, .. })
        ));
    }

    #[test]
    fn short_detour_to_exact_target_is_rejected() {
        let scene = walled_scene(&[Point::new(150, 25)]);
        let from = Point::new(145, 40);
        let to = Point::new(155, 40);
        assert!(to.distance_squared(from) <= DETOUR_THRESHOLD_SQ);
        assert_eq!(search(&scene, from, to, WalkMode::Strict), PlanOutcome::Rejected);

        let mut actor = actor_at(145, 40);
        assert!(!plan(&scene, &mut actor, to, WalkMode::Strict).unwrap());
        assert_eq!(actor.position, from);
        assert!(!actor.is_walking());

        // Farther away the same gap route is worth taking.
        assert!(matches!(
            search(&scene, Point::new(120, 40), to, WalkMode::Strict),
            PlanOutcome::Walk(PlannedWalk { direct: false, .. })
        ));
    }

    #[test]
    fn ignore_mode_walks_through_walls() {
        let scene = walled_scene(&[]);
        let outcome = search(&scene, Point::new(100, 150), Point::new(200, 150), WalkMode::Ignore);
        assert!(matches!(outcome, PlanOutcome::Walk(PlannedWalk { direct: true, .. })));
    }

    #[test]
    fn search_is_deterministic() {
        let scene = walled_scene(&[Point::new(150, 25), Point::new(140, 25), Point::new(160, 25)]);
        let first = search(&scene, Point::new(100, 150), Point::new(200, 150), WalkMode::Strict);
        for _ in 0..5 {
            assert_eq!(
                search(&scene, Point::new(100, 150), Point::new(200, 150), WalkMode::Strict),
                first
            );
        }
    }

    /// One-pixel staircase corridor. Corner `j` is `(5k, 5k)` for `j = 2k`
    /// and `(5k + 5, 5k)` for `j = 2k + 1`; no corner sees past its
    /// neighbours.
    fn staircase_corner(j: usize) -> Point {
        let k = (j / 2) as i16;
        Point::new(5 * k + 5 * (j % 2) as i16, 5 * k)
    }

    fn staircase_scene(waypoint_corners: std::ops::RangeInclusive<usize>) -> Scene {
        let mut bands = vec![0i16; 100 * 100];
        for k in 0..18usize {
            for step in 0..=5 {
                bands[5 * k * 100 + 5 * k + step] = 5;
                bands[(5 * k + step) * 100 + 5 * k + 5] = 5;
            }
        }
        let waypoints: Vec<Point> = waypoint_corners.map(staircase_corner).collect();
        Scene::new(
            0,
            100,
            100,
            PriorityMap::new(100, 100, bands),
            WaypointTable::from_points(&waypoints),
        )
    }

    #[test]
    fn staircase_route_fills_stack_in_order() {
        let scene = staircase_scene(1..=33);
        let outcome = search(
            &scene,
            staircase_corner(0),
            staircase_corner(10),
            WalkMode::Strict,
        );
        let PlanOutcome::Walk(walk) = outcome else {
            panic!("expected a walk, got {outcome:?}");
        };
        assert!(!walk.direct);
        // Slot i holds corner i + 1; the top of the stack is walked first.
        assert_eq!(walk.stack, vec![8, 7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn route_longer_than_walk_stack_is_unreachable() {
        let scene = staircase_scene(1..=33);
        let mut actor = actor_at(0, 0);
        let target = staircase_corner(34);
        assert_eq!(
            search(&scene, actor.position, target, WalkMode::Strict),
            PlanOutcome::Unreachable
        );
        assert!(!plan(&scene, &mut actor, target, WalkMode::Strict).unwrap());
        assert_eq!(actor.position, Point::new(0, 0));
        assert!(actor.walk_stack().is_empty());
    }

    #[test]
    fn raw_mode_decoding() {
        assert_eq!(WalkMode::from_raw(0), WalkMode::Strict);
        assert_eq!(WalkMode::from_raw(1), WalkMode::Relaxed);
        assert_eq!(WalkMode::from_raw(2), WalkMode::Ignore);
        assert_eq!(WalkMode::from_raw(0x8000), WalkMode::Ignore);
    }
}
