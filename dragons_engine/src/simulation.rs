//! Offline walk simulation: place one actor in a scene, optionally run a
//! script, request a walk and record where the actor is on every frame.

use std::rc::Rc;

use anyhow::{Context, Result};
use dragons_formats::{ActorResource, ProgramBuilder, SceneDescription};
use log::info;
use serde::Serialize;

use crate::actor::{ActorId, DEFAULT_WALK_SPEED};
use crate::engine::Engine;
use crate::flags::{ActorFlags, EngineFlags};
use crate::frame::{FramePacer, NoopPacer, RealtimePacer};
use crate::host::{EngineHost, FrameGeometry};
use crate::path::WalkMode;
use crate::scene::Point;
use crate::world::World;

/// Sequences in the built-in resource: four idle ones, four walk ones, and an
/// odd alias after each.
const DEFAULT_SEQUENCE_COUNT: usize = 16;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub scene: SceneDescription,
    /// Slot to place the actor in; the first free one when unset.
    pub actor: Option<ActorId>,
    pub resource: Option<ActorResource>,
    pub start: Point,
    pub target: Option<Point>,
    pub mode: WalkMode,
    /// 16.16 pixels per tick.
    pub speed: i32,
    pub frames: u32,
    pub script: Option<Vec<u8>>,
    pub realtime: bool,
}

impl SimulationConfig {
    pub fn new(scene: SceneDescription, start: Point) -> Self {
        Self {
            scene,
            actor: None,
            resource: None,
            start,
            target: None,
            mode: WalkMode::Strict,
            speed: DEFAULT_WALK_SPEED,
            frames: 600,
            script: None,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrajectorySample {
    pub frame: u64,
    pub x: i16,
    pub y: i16,
    pub sequence_id: i16,
    pub priority_layer: i16,
    pub walking: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scene_id: u16,
    pub actor: ActorId,
    pub start: Point,
    pub requested: Option<Point>,
    /// Whether the planner committed a walk.
    pub committed: bool,
    pub final_position: Point,
    pub arrived: bool,
    pub samples: Vec<TrajectorySample>,
}

/// Host that samples one actor every time a frame is presented.
struct TrajectoryHost {
    actor: ActorId,
    samples: Vec<TrajectorySample>,
}

impl EngineHost for TrajectoryHost {
    fn load_frame(&mut self, _actor: ActorId, _frame_offset: u16) -> FrameGeometry {
        FrameGeometry {
            width: 16,
            height: 48,
            origin_x: 8,
            origin_y: 47,
        }
    }

    fn present_frame(&mut self, world: &World) {
        let Ok(actor) = world.actors.get(self.actor) else {
            return;
        };
        self.samples.push(TrajectorySample {
            frame: world.frame,
            x: actor.position.x,
            y: actor.position.y,
            sequence_id: actor.sequence_id,
            priority_layer: actor.priority_layer,
            walking: actor.flags.contains(ActorFlags::WALKING),
        });
    }
}

/// A resource whose idle sequences show one frame and rest, and whose walk
/// sequences cycle two frames.
pub fn default_actor_resource() -> Result<ActorResource> {
    let mut offsets = vec![0u32; DEFAULT_SEQUENCE_COUNT];
    let mut builder = ProgramBuilder::new();
    for facing in 0..4usize {
        let frame = 0x100 * (facing as i16 + 1);

        offsets[facing * 2] = builder.position() as u32;
        builder = builder.op(4, &[8]).op(2, &[frame]).op(9, &[]);

        offsets[8 + facing * 2] = builder.position() as u32;
        builder = builder.op(4, &[4]);
        let cycle = builder.position() as i16;
        builder = builder
            .op(2, &[frame + 0x10])
            .op(2, &[frame + 0x20])
            .op(3, &[cycle]);
    }
    for odd in (1..DEFAULT_SEQUENCE_COUNT).step_by(2) {
        offsets[odd] = offsets[odd - 1];
    }
    ActorResource::from_parts(offsets, builder.finish())
}

pub fn run_simulation(config: SimulationConfig) -> Result<SimulationReport> {
    config.scene.validate().context("validating scene")?;
    let world = World::from_description(&config.scene);
    let pacer: Box<dyn FramePacer> = if config.realtime {
        Box::new(RealtimePacer::new())
    } else {
        Box::new(NoopPacer)
    };
    let mut engine = Engine::with_pacer(world, pacer);
    engine.world.flags.insert(EngineFlags::ACTORS_ENABLED);

    let resource = match config.resource {
        Some(resource) => resource,
        None => default_actor_resource()?,
    };
    let actor = engine
        .world
        .actors
        .allocate(config.actor, Rc::new(resource), config.start, 0)
        .context("placing actor")?;
    engine.world.actors.get_mut(actor)?.walk_speed = config.speed;
    info!("actor {actor} placed at {}", config.start);

    let mut host = TrajectoryHost {
        actor,
        samples: Vec::new(),
    };

    if let Some(script) = config.script.as_deref() {
        let result = engine
            .run_script(script, &mut host)
            .context("running placement script")?;
        info!("placement script finished with result {result:#06x}");
    }

    let committed = match config.target {
        Some(target) => engine
            .request_walk(actor, target, config.mode)
            .with_context(|| format!("requesting walk to {target}"))?,
        None => false,
    };

    for _ in 0..config.frames {
        engine.step_frame(&mut host)?;
        let state = engine.world.actors.get(actor)?;
        if !state.is_walking() && state.is_at_rest() {
            break;
        }
    }

    let state = engine.world.actors.get(actor)?;
    let final_position = state.position;
    let arrived = config.target == Some(final_position) && !state.is_walking();
    info!(
        "actor {actor} ended at {final_position} after {} frames",
        host.samples.len()
    );
    Ok(SimulationReport {
        scene_id: engine.world.scene.id,
        actor,
        start: config.start,
        requested: config.target,
        committed,
        final_position,
        arrived,
        samples: host.samples,
    })
}
