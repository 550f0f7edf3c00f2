use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dragons_formats::{ActorResource, SceneDescription};

use crate::actor::{ActorId, DEFAULT_WALK_SPEED};
use crate::path::WalkMode;
use crate::scene::Point;
use crate::simulation::{run_simulation, SimulationConfig, SimulationReport};

#[derive(Parser, Debug)]
#[command(
    about = "Walks an actor through a scene and records its trajectory",
    version
)]
pub struct Args {
    /// Scene description JSON (stage size, priority map, waypoints)
    #[arg(long)]
    pub scene: PathBuf,

    /// Pool slot to place the actor in (default: first free slot)
    #[arg(long)]
    pub actor: Option<ActorId>,

    /// Actor sequence resource; a built-in walk cycle is used when omitted
    #[arg(long)]
    pub actor_resource: Option<PathBuf>,

    /// Starting position as X,Y
    #[arg(long, value_parser = parse_point, default_value = "160,100")]
    pub start: Point,

    /// Walk target as X,Y
    #[arg(long, value_parser = parse_point)]
    pub target: Option<Point>,

    /// How the priority map limits the walk
    #[arg(long, value_enum, default_value_t = WalkMode::Strict)]
    pub mode: WalkMode,

    /// Walk speed in 16.16 pixels per tick
    #[arg(long, default_value_t = DEFAULT_WALK_SPEED)]
    pub speed: i32,

    /// Upper bound on simulated frames
    #[arg(long, default_value_t = 600)]
    pub frames: u32,

    /// Raw script buffer to run once after the actor is placed
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Path to write the per-frame trajectory as JSON
    #[arg(long)]
    pub trajectory_json: Option<PathBuf>,

    /// Pace frames at the 60 Hz game tick instead of running flat out
    #[arg(long)]
    pub realtime: bool,

    /// Log every executed opcode and walk decision
    #[arg(long)]
    pub verbose: bool,
}

pub fn parse_point(text: &str) -> Result<Point> {
    let Some((x, y)) = text.split_once(',') else {
        bail!("expected X,Y but got {text:?}");
    };
    let x = x.trim().parse().with_context(|| format!("parsing x of {text:?}"))?;
    let y = y.trim().parse().with_context(|| format!("parsing y of {text:?}"))?;
    Ok(Point::new(x, y))
}

pub fn run(args: Args) -> Result<()> {
    let scene = SceneDescription::load(&args.scene)?;
    let resource = args
        .actor_resource
        .as_ref()
        .map(ActorResource::open)
        .transpose()?;
    let script = args
        .script
        .as_ref()
        .map(|path| {
            fs::read(path).with_context(|| format!("reading script {}", path.display()))
        })
        .transpose()?;

    let mut config = SimulationConfig::new(scene, args.start);
    config.actor = args.actor;
    config.resource = resource;
    config.target = args.target;
    config.mode = args.mode;
    config.speed = args.speed;
    config.frames = args.frames;
    config.script = script;
    config.realtime = args.realtime;

    let report = run_simulation(config)?;
    describe(&report);

    if let Some(path) = args.trajectory_json.as_ref() {
        let json = serde_json::to_string_pretty(&report)
            .context("serializing trajectory to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing trajectory JSON to {}", path.display()))?;
        println!("Saved trajectory to {}", path.display());
    }
    Ok(())
}

fn describe(report: &SimulationReport) {
    println!("Scene {}: actor {} from {}", report.scene_id, report.actor, report.start);
    match report.requested {
        Some(target) if report.committed => println!("Walk to {target} committed"),
        Some(target) => println!("Walk to {target} rejected by the planner"),
        None => println!("No walk requested"),
    }
    println!(
        "Ended at {} after {} frames ({})",
        report.final_position,
        report.samples.len(),
        if report.arrived { "arrived" } else { "not arrived" }
    );
}
