use std::rc::Rc;

use anyhow::{Context, Result};
use dragons_engine::line_of_sight::{visible, BandRule, SightMode};
use dragons_engine::path::{search, PlanOutcome};
use dragons_engine::{
    ActorFlags, Engine, EngineError, NullHost, Point, SequenceError, WalkMode, World,
};
use dragons_formats::{ActorResource, ProgramBuilder, SceneDescription};

const OPEN_SCENE: &str = r#"{
  "width": 320,
  "height": 200,
  "priority": { "kind": "rects", "default": 5 }
}"#;

fn open_engine() -> Result<Engine> {
    let description = SceneDescription::from_json_str(OPEN_SCENE)?;
    Ok(Engine::new(World::from_description(&description)))
}

fn resting_resource() -> Rc<ActorResource> {
    let code = ProgramBuilder::new()
        .op(4, &[3])
        .op(2, &[0x10])
        .op(9, &[])
        .finish();
    Rc::new(ActorResource::from_parts(vec![0; 16], code).expect("valid resource"))
}

#[test]
fn open_floor_walk_is_direct_and_converges() -> Result<()> {
    let mut engine = open_engine()?;
    let actor = engine
        .world
        .actors
        .allocate(None, resting_resource(), Point::new(10, 10), 0)?;

    assert!(engine.request_walk(actor, Point::new(300, 190), WalkMode::Strict)?);
    {
        let state = engine.world.actors.get(actor)?;
        assert!(state.walk_stack().is_empty());
        assert_eq!(state.target, Point::new(300, 190));
    }

    let mut host = NullHost;
    let mut previous = Point::new(10, 10);
    for _ in 0..400 {
        engine.step_frame(&mut host)?;
        let state = engine.world.actors.get(actor)?;
        assert!(state.position.x >= previous.x && state.position.x <= 300);
        assert!(state.position.y >= previous.y && state.position.y <= 190);
        previous = state.position;
        if !state.is_walking() {
            break;
        }
    }
    let state = engine.world.actors.get(actor)?;
    assert_eq!(state.position, Point::new(300, 190));
    assert!(!state.is_walking());
    Ok(())
}

#[test]
fn walk_to_own_position_is_trivial() -> Result<()> {
    let mut engine = open_engine()?;
    let actor = engine
        .world
        .actors
        .allocate(None, resting_resource(), Point::new(10, 10), 0)?;
    assert!(engine.request_walk(actor, Point::new(10, 10), WalkMode::Strict)?);
    let state = engine.world.actors.get(actor)?;
    assert!(state.walk_stack().is_empty());
    assert_eq!(state.target, Point::new(10, 10));
    assert!(!state.flags.contains(ActorFlags::WALKING));
    Ok(())
}

#[test]
fn planning_is_a_pure_function_of_its_inputs() -> Result<()> {
    let description = SceneDescription::from_json_str(
        r#"{
          "width": 320, "height": 200,
          "priority": { "kind": "rects", "default": 5, "rects": [
            { "x": 150, "y": 0, "width": 1, "height": 20, "band": 0 },
            { "x": 150, "y": 31, "width": 1, "height": 169, "band": 0 }
          ] },
          "waypoints": [[10, 190], [150, 25], null, [300, 10]]
        }"#,
    )?;
    let world = World::from_description(&description);
    let first = search(&world.scene, Point::new(100, 150), Point::new(200, 150), WalkMode::Strict);
    assert!(matches!(first, PlanOutcome::Walk(_)));
    for _ in 0..10 {
        let again = search(&world.scene, Point::new(100, 150), Point::new(200, 150), WalkMode::Strict);
        assert_eq!(again, first);
    }
    Ok(())
}

#[test]
fn always_mode_sight_is_symmetric() -> Result<()> {
    let engine = open_engine()?;
    let always = SightMode::new(BandRule::Always);
    for (a, b) in [
        (Point::new(0, 0), Point::new(319, 199)),
        (Point::new(40, 7), Point::new(3, 180)),
        (Point::new(160, 100), Point::new(160, 100)),
    ] {
        assert!(visible(&engine.world.scene, a, b, always));
        assert!(visible(&engine.world.scene, b, a, always));
    }
    Ok(())
}

#[test]
fn unknown_sequence_opcode_ends_the_frame_with_an_error() -> Result<()> {
    let mut engine = open_engine()?;
    let code = ProgramBuilder::new().op(0xff, &[]).finish();
    let resource = Rc::new(ActorResource::from_parts(vec![0], code)?);
    let actor = engine
        .world
        .actors
        .allocate(None, resource, Point::new(20, 20), 0)?;

    let err = engine
        .step_frame(&mut NullHost)
        .err()
        .context("frame should fail on opcode 0xff")?;
    assert!(matches!(
        err,
        EngineError::Sequence(SequenceError::UnknownOpcode { opcode: 0xff, ip: 0, .. })
    ));
    assert_eq!(engine.world.actors.get(actor)?.sequence_ip, 0);
    Ok(())
}
