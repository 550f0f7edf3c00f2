//! Scene and object logic bytecode.
//!
//! A script runs synchronously to the end of its buffer or to its first stop.
//! Waiting opcodes pump whole frames through the [`Engine`] before returning
//! to the loop; there is no saved continuation.

use std::io;

use dragons_formats::{Instruction, HEADER_LEN};
use log::{debug, error, warn};

use crate::actor::ActorId;
use crate::engine::Engine;
use crate::error::{Result, ScriptError};
use crate::flags::{ActorFlags, EngineFlags};
use crate::host::EngineHost;
use crate::path::WalkMode;
use crate::scene::Point;

/// Opcodes at or past this value end the script without an error.
pub const SCRIPT_OPCODE_COUNT: u16 = 0x23;
/// Result bit that ends the loop after the current instruction.
pub const RESULT_STOP: u16 = 0x0001;
pub const MAX_SCRIPT_NESTING: usize = 16;

/// Cursor over one script buffer.
#[derive(Debug)]
pub struct ScriptOpCall<'a> {
    code: &'a [u8],
    pub ip: usize,
    pub end: usize,
    pub result: u16,
}

impl<'a> ScriptOpCall<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            ip: 0,
            end: code.len(),
            result: 0,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.result & RESULT_STOP != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOp {
    SetResult,
    RunObjectScript,
    ActorLoadSequence,
    SetVariable,
    RunSpecialOpcode,
    PlayOrStopSound,
    Delay,
    MoveActorToWaypoint,
    MoveActorToXy,
    LoadScene,
    IfVariableEquals,
    SetEngineFlags,
    ClearEngineFlags,
    WaitForSequence,
    WaitForWalk,
    SetActorFlags,
    ClearActorFlags,
    Stop,
}

impl TryFrom<u16> for ScriptOp {
    type Error = u16;

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            0x02 => ScriptOp::SetResult,
            0x04 => ScriptOp::RunObjectScript,
            0x08 => ScriptOp::ActorLoadSequence,
            0x0a => ScriptOp::SetVariable,
            0x0b => ScriptOp::RunSpecialOpcode,
            0x0c => ScriptOp::PlayOrStopSound,
            0x0d => ScriptOp::Delay,
            0x0e => ScriptOp::MoveActorToWaypoint,
            0x0f => ScriptOp::MoveActorToXy,
            0x12 => ScriptOp::LoadScene,
            0x13 => ScriptOp::IfVariableEquals,
            0x15 => ScriptOp::SetEngineFlags,
            0x16 => ScriptOp::ClearEngineFlags,
            0x17 => ScriptOp::WaitForSequence,
            0x1b => ScriptOp::WaitForWalk,
            0x1c => ScriptOp::SetActorFlags,
            0x1d => ScriptOp::ClearActorFlags,
            0x1e => ScriptOp::Stop,
            other => return Err(other),
        })
    }
}

#[derive(Debug, Default)]
pub struct ScriptInterpreter {
    depth: usize,
}

impl ScriptInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &mut self,
        engine: &mut Engine,
        host: &mut dyn EngineHost,
        call: &mut ScriptOpCall<'_>,
    ) -> Result<()> {
        if self.depth >= MAX_SCRIPT_NESTING {
            error!("script nesting passed {MAX_SCRIPT_NESTING} levels");
            return Err(ScriptError::NestingTooDeep(MAX_SCRIPT_NESTING).into());
        }

        call.end = call.end.min(call.code.len());
        while call.ip < call.end {
            let flags = engine.world.flags;
            if flags.contains(EngineFlags::ABORT_SCRIPTS) {
                debug!("script aborted at {:#06x}", call.ip);
                break;
            }
            if flags.contains(EngineFlags::FAST_FORWARD_ALLOWED) && host.fast_forward_pressed() {
                debug!("fast-forward aborts scripts at {:#06x}", call.ip);
                engine.world.flags.insert(EngineFlags::ABORT_SCRIPTS);
                break;
            }

            let ip = call.ip;
            let code = call.code;
            let code = &code[..call.end];
            let word = code
                .get(ip..ip + 2)
                .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
                .ok_or(ScriptError::TruncatedInstruction { ip })?;
            let opcode = word & 0x7fff;
            if opcode >= SCRIPT_OPCODE_COUNT {
                warn!(
                    "script opcode {opcode:#x} at {ip:#06x} is out of range; dropping the remaining {} bytes",
                    call.end - ip
                );
                call.ip = call.end;
                break;
            }
            let instruction =
                Instruction::decode(code, ip).ok_or(ScriptError::TruncatedInstruction { ip })?;
            let op = ScriptOp::try_from(opcode).map_err(|opcode| {
                error!("script opcode {opcode:#x} at {ip:#06x} has no handler");
                ScriptError::UnknownOpcode { opcode, ip }
            })?;
            debug!("script {ip:#06x} {op:?}");

            call.ip = instruction.next_offset();
            self.execute(engine, host, call, op, &instruction)?;
            if call.is_stopped() {
                break;
            }
        }
        Ok(())
    }

    fn execute(
        &mut self,
        engine: &mut Engine,
        host: &mut dyn EngineHost,
        call: &mut ScriptOpCall<'_>,
        op: ScriptOp,
        instruction: &Instruction<'_>,
    ) -> Result<()> {
        let ip = instruction.offset;
        let mut operands = instruction.operands();
        let truncated = |_: io::Error| ScriptError::TruncatedInstruction { ip };
        let world = &mut engine.world;

        match op {
            ScriptOp::SetResult => {
                call.result = operands.read_u16().map_err(truncated)?;
            }
            ScriptOp::RunObjectScript => {
                let object = operands.read_u16().map_err(truncated)?;
                let script = world.objects.script(object)?;
                debug!("entering script of object {object}");
                let mut nested = ScriptOpCall::new(&script);
                ScriptInterpreter {
                    depth: self.depth + 1,
                }
                .run(engine, host, &mut nested)?;
            }
            ScriptOp::ActorLoadSequence => {
                let actor = operands.read_u16().map_err(truncated)?;
                let sequence_id = operands.read_i16().map_err(truncated)?;
                world.actors.get_mut(actor)?.update_sequence(sequence_id);
            }
            ScriptOp::SetVariable => {
                let index = operands.read_u16().map_err(truncated)?;
                let value = operands.read_i16().map_err(truncated)?;
                world.set_variable(index, value)?;
            }
            ScriptOp::RunSpecialOpcode => {
                let opcode = operands.read_u16().map_err(truncated)?;
                host.run_special_opcode(world, opcode)?;
            }
            ScriptOp::PlayOrStopSound => {
                host.play_or_stop_sound(operands.read_u16().map_err(truncated)?);
            }
            ScriptOp::Delay => {
                let frames = operands.read_u16().map_err(truncated)?;
                engine.wait_for_frames(frames, host)?;
            }
            ScriptOp::MoveActorToWaypoint => {
                let actor = operands.read_u16().map_err(truncated)?;
                let waypoint = operands.read_u16().map_err(truncated)?;
                let mode = WalkMode::from_raw(operands.read_u16().map_err(truncated)?);
                let arrival = optional_i16(&mut operands);
                let target = world.scene.waypoints.get(waypoint)?;
                move_actor(engine, actor, target, mode, arrival)?;
            }
            ScriptOp::MoveActorToXy => {
                let actor = operands.read_u16().map_err(truncated)?;
                let x = operands.read_i16().map_err(truncated)?;
                let y = operands.read_i16().map_err(truncated)?;
                let mode = WalkMode::from_raw(operands.read_u16().map_err(truncated)?);
                let arrival = optional_i16(&mut operands);
                move_actor(engine, actor, Point::new(x, y), mode, arrival)?;
            }
            ScriptOp::LoadScene => {
                let scene_id = operands.read_u16().map_err(truncated)?;
                host.load_scene(world, scene_id)?;
            }
            ScriptOp::IfVariableEquals => {
                let index = operands.read_u16().map_err(truncated)?;
                let expected = operands.read_i16().map_err(truncated)?;
                let body_len = operands.read_u16().map_err(truncated)? as usize;
                if world.variable(index)? != expected {
                    let resume = call.ip + body_len;
                    if resume > call.end {
                        return Err(ScriptError::TruncatedInstruction { ip }.into());
                    }
                    call.ip = resume;
                }
            }
            ScriptOp::SetEngineFlags | ScriptOp::ClearEngineFlags => {
                let low = operands.read_u16().map_err(truncated)? as u32;
                let high = operands.read_u16().map_err(truncated)? as u32;
                let bits = EngineFlags::from_bits(high << 16 | low);
                if op == ScriptOp::SetEngineFlags {
                    world.flags.insert(bits);
                } else {
                    world.flags.remove(bits);
                }
            }
            ScriptOp::WaitForSequence => {
                let actor = operands.read_u16().map_err(truncated)?;
                wait_while(engine, host, actor, |flags| {
                    !flags.intersects(ActorFlags::AT_REST | ActorFlags::HIDDEN)
                })?;
            }
            ScriptOp::WaitForWalk => {
                let actor = operands.read_u16().map_err(truncated)?;
                wait_while(engine, host, actor, |flags| {
                    flags.contains(ActorFlags::WALKING) && !flags.contains(ActorFlags::HIDDEN)
                })?;
            }
            ScriptOp::SetActorFlags | ScriptOp::ClearActorFlags => {
                let actor = operands.read_u16().map_err(truncated)?;
                let bits = ActorFlags::from_bits(operands.read_u16().map_err(truncated)?);
                let flags = &mut world.actors.get_mut(actor)?.flags;
                if op == ScriptOp::SetActorFlags {
                    flags.insert(bits);
                } else {
                    flags.remove(bits);
                }
            }
            ScriptOp::Stop => {
                call.result |= RESULT_STOP;
            }
        }
        Ok(())
    }
}

fn optional_i16(operands: &mut dragons_formats::Operands<'_>) -> Option<i16> {
    if operands.remaining() >= 2 {
        operands.read_i16().ok()
    } else {
        None
    }
}

fn move_actor(
    engine: &mut Engine,
    actor: ActorId,
    target: Point,
    mode: WalkMode,
    arrival: Option<i16>,
) -> Result<()> {
    if let Some(sequence_id) = arrival {
        engine.world.actors.get_mut(actor)?.target_sequence_id = sequence_id;
    }
    let walking = engine.request_walk(actor, target, mode)?;
    debug!("script walk of actor {actor} to {target}: {walking}");
    Ok(())
}

/// Pumps single frames while `busy` holds for the actor's flags, the actor is
/// in use and scripts are not aborted.
fn wait_while(
    engine: &mut Engine,
    host: &mut dyn EngineHost,
    actor: ActorId,
    busy: impl Fn(ActorFlags) -> bool,
) -> Result<()> {
    loop {
        let flags = engine.world.actors.get(actor)?.flags;
        if !flags.contains(ActorFlags::IN_USE)
            || !busy(flags)
            || engine.world.flags.contains(EngineFlags::ABORT_SCRIPTS)
        {
            return Ok(());
        }
        engine.wait_for_frames(1, host)?;
    }
}

/// Size of an instruction with `operand_bytes` operand bytes, for callers
/// sizing conditional bodies.
pub const fn instruction_len(operand_bytes: usize) -> usize {
    HEADER_LEN + operand_bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use dragons_formats::{ActorResource, ProgramBuilder};

    use crate::error::EngineError;
    use crate::host::{HostEvent, RecordingHost};
    use crate::objects::{ObjectRecord, ObjectTable};
    use crate::scene::{PriorityMap, Scene, WaypointTable};
    use crate::world::World;

    fn engine_with(objects: Vec<ObjectRecord>) -> Engine {
        let scene = Scene::new(
            1,
            320,
            200,
            PriorityMap::uniform(320, 200, 5),
            WaypointTable::from_points(&[Point::new(250, 100)]),
        );
        Engine::new(World::new(scene, ObjectTable::new(objects)))
    }

    fn run(engine: &mut Engine, host: &mut RecordingHost, code: &[u8]) -> Result<u16> {
        engine.run_script(code, host)
    }

    fn idle_resource() -> Rc<ActorResource> {
        // Every sequence: timer 2, one frame, then rest.
        let code = ProgramBuilder::new()
            .op(4, &[2])
            .op(2, &[0x40])
            .op(9, &[])
            .finish();
        Rc::new(ActorResource::from_parts(vec![0; 16], code).unwrap())
    }

    #[test]
    fn out_of_range_opcode_swallows_the_tail() {
        let code = ProgramBuilder::new()
            .op(0x0a, &[1, 5])
            .op(0x30, &[])
            .op(0x0a, &[2, 6])
            .finish();
        let mut engine = engine_with(Vec::new());
        let mut call = ScriptOpCall::new(&code);
        ScriptInterpreter::new()
            .run(&mut engine, &mut RecordingHost::new(), &mut call)
            .unwrap();
        assert_eq!(engine.world.variable(1).unwrap(), 5);
        assert_eq!(engine.world.variable(2).unwrap(), 0);
        assert_eq!(call.ip, call.end);
    }

    #[test]
    fn end_past_the_buffer_is_clamped() {
        let code = ProgramBuilder::new().op(0x0a, &[1, 5]).finish();
        let mut engine = engine_with(Vec::new());
        let mut host = RecordingHost::new();
        let mut call = ScriptOpCall::new(&code);
        call.end = code.len() + 16;
        ScriptInterpreter::new()
            .run(&mut engine, &mut host, &mut call)
            .unwrap();
        assert_eq!(call.end, code.len());
        assert_eq!(call.ip, code.len());
        assert_eq!(engine.world.variable(1).unwrap(), 5);
    }

    #[test]
    fn unhandled_in_range_opcode_is_fatal() {
        let code = ProgramBuilder::new().op(0x0a, &[1, 5]).op(0x01, &[]).finish();
        let mut engine = engine_with(Vec::new());
        let err = run(&mut engine, &mut RecordingHost::new(), &code).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Script(ScriptError::UnknownOpcode { opcode: 1, ip: 8 })
        ));
    }

    #[test]
    fn stop_bit_ends_the_loop() {
        let mut engine = engine_with(Vec::new());
        let mut host = RecordingHost::new();

        let stopped = ProgramBuilder::new()
            .op(0x801e, &[])
            .op(0x0a, &[1, 1])
            .finish();
        assert_eq!(run(&mut engine, &mut host, &stopped).unwrap(), RESULT_STOP);
        assert_eq!(engine.world.variable(1).unwrap(), 0);

        let carries_on = ProgramBuilder::new()
            .op(0x02, &[2])
            .op(0x0a, &[1, 1])
            .finish();
        assert_eq!(run(&mut engine, &mut host, &carries_on).unwrap(), 2);
        assert_eq!(engine.world.variable(1).unwrap(), 1);
    }

    #[test]
    fn abort_flag_stops_following_instructions() {
        let code = ProgramBuilder::new()
            .op(0x15, &[0, 0x10])
            .op(0x0a, &[1, 1])
            .finish();
        let mut engine = engine_with(Vec::new());
        run(&mut engine, &mut RecordingHost::new(), &code).unwrap();
        assert!(engine.world.flags.contains(EngineFlags::ABORT_SCRIPTS));
        assert_eq!(engine.world.variable(1).unwrap(), 0);
    }

    #[test]
    fn fast_forward_sets_abort_when_allowed() {
        let code = ProgramBuilder::new().op(0x0a, &[1, 1]).finish();
        let mut host = RecordingHost {
            fast_forward_after_frames: Some(0),
            ..RecordingHost::default()
        };

        let mut engine = engine_with(Vec::new());
        run(&mut engine, &mut host, &code).unwrap();
        assert_eq!(engine.world.variable(1).unwrap(), 1, "not allowed yet");

        engine.world.set_variable(1, 0).unwrap();
        engine.world.flags.insert(EngineFlags::FAST_FORWARD_ALLOWED);
        run(&mut engine, &mut host, &code).unwrap();
        assert_eq!(engine.world.variable(1).unwrap(), 0);
        assert!(engine.world.flags.contains(EngineFlags::ABORT_SCRIPTS));
    }

    #[test]
    fn object_scripts_nest_and_return() {
        let inner = ProgramBuilder::new()
            .op(0x0a, &[1, 10])
            .op(0x1e, &[])
            .op(0x0a, &[1, 99])
            .finish();
        let outer = ProgramBuilder::new()
            .op(0x04, &[7])
            .op(0x0a, &[2, 20])
            .finish();
        let mut engine = engine_with(vec![ObjectRecord::new(7, 1, -1, Some(inner))]);
        let result = run(&mut engine, &mut RecordingHost::new(), &outer).unwrap();
        // The inner stop bit belongs to the inner call only.
        assert_eq!(result, 0);
        assert_eq!(engine.world.variable(1).unwrap(), 10);
        assert_eq!(engine.world.variable(2).unwrap(), 20);
    }

    #[test]
    fn runaway_recursion_is_an_error() {
        let recursive = ProgramBuilder::new().op(0x04, &[7]).finish();
        let mut engine = engine_with(vec![ObjectRecord::new(7, 1, -1, Some(recursive.clone()))]);
        let err = run(&mut engine, &mut RecordingHost::new(), &recursive).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Script(ScriptError::NestingTooDeep(MAX_SCRIPT_NESTING))
        ));

        let missing = ProgramBuilder::new().op(0x04, &[8]).finish();
        assert!(matches!(
            run(&mut engine, &mut RecordingHost::new(), &missing),
            Err(EngineError::Script(ScriptError::MissingObjectScript(8)))
        ));
    }

    #[test]
    fn conditional_skips_its_body() {
        let body = instruction_len(4) as i16;
        let code = ProgramBuilder::new()
            .op(0x13, &[3, 4, body])
            .op(0x0a, &[1, 1])
            .op(0x0a, &[2, 2])
            .finish();
        let mut engine = engine_with(Vec::new());
        let mut host = RecordingHost::new();
        run(&mut engine, &mut host, &code).unwrap();
        assert_eq!(engine.world.variable(1).unwrap(), 0);
        assert_eq!(engine.world.variable(2).unwrap(), 2);

        engine.world.set_variable(3, 4).unwrap();
        run(&mut engine, &mut host, &code).unwrap();
        assert_eq!(engine.world.variable(1).unwrap(), 1);
    }

    #[test]
    fn host_hooks_receive_their_operands() {
        let code = ProgramBuilder::new()
            .op(0x0c, &[0x21])
            .op(0x0b, &[0x45])
            .op(0x12, &[9])
            .finish();
        let mut engine = engine_with(Vec::new());
        let mut host = RecordingHost::new();
        run(&mut engine, &mut host, &code).unwrap();
        assert_eq!(
            host.events(),
            &[
                HostEvent::Sound { sound_id: 0x21 },
                HostEvent::SpecialOpcode { opcode: 0x45 },
                HostEvent::SceneLoad { scene_id: 9 },
            ]
        );
        assert_eq!(engine.world.scene.id, 9);
    }

    #[test]
    fn delay_pumps_frames() {
        let code = ProgramBuilder::new().op(0x0d, &[6]).finish();
        let mut engine = engine_with(Vec::new());
        let mut host = RecordingHost::new();
        run(&mut engine, &mut host, &code).unwrap();
        assert_eq!(host.presented_frames(), 6);
        assert_eq!(engine.world.frame, 6);
    }

    #[test]
    fn walk_then_wait_until_arrival() {
        let mut engine = engine_with(Vec::new());
        let id = engine
            .world
            .actors
            .allocate(None, idle_resource(), Point::new(20, 100), 0)
            .unwrap();
        let code = ProgramBuilder::new()
            .op(0x0e, &[id as i16, 0, 0, 4])
            .op(0x1b, &[id as i16])
            .op(0x17, &[id as i16])
            .finish();
        let mut host = RecordingHost::new();
        run(&mut engine, &mut host, &code).unwrap();

        let actor = engine.world.actors.get(id).unwrap();
        assert_eq!(actor.position, Point::new(250, 100));
        assert!(!actor.is_walking());
        assert!(actor.is_at_rest());
        assert_eq!(actor.sequence_id, 4);
        // 230 pixels at 1.25 per frame.
        assert!(host.presented_frames() >= 150);
    }

    #[test]
    fn actor_flag_ops_and_sequence_load() {
        let mut engine = engine_with(Vec::new());
        let id = engine
            .world
            .actors
            .allocate(None, idle_resource(), Point::new(5, 5), 0)
            .unwrap();
        let code = ProgramBuilder::new()
            .op(0x1c, &[id as i16, 0x1400])
            .op(0x1d, &[id as i16, 0x0400])
            .op(0x08, &[id as i16, 3])
            .finish();
        run(&mut engine, &mut RecordingHost::new(), &code).unwrap();
        let actor = engine.world.actors.get(id).unwrap();
        assert!(actor.flags.contains(ActorFlags::LOOP_HALTED));
        assert!(!actor.flags.contains(ActorFlags::HIDDEN));
        assert_eq!(actor.sequence_id, 3);
        assert!(actor.flags.contains(ActorFlags::RESET_SEQUENCE));
    }
}
