//! Per-actor animation bytecode.
//!
//! Opcodes are the low byte of the instruction word. A turn runs instructions
//! until one halts or the per-turn budget is spent.

use std::io;

use dragons_formats::Instruction;
use log::{debug, error, warn};

use crate::actor::Actor;
use crate::error::{EngineError, Result, SequenceError};
use crate::flags::ActorFlags;
use crate::host::EngineHost;

pub const MAX_SEQUENCE_OPS_PER_TURN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOp {
    SetFrame,
    SetFrameAndHalt,
    Jump,
    SetTimerStart,
    SetTimerAndHalt,
    MoveAndRearm,
    MoveAndRearmAndHalt,
    ArriveAndHalt,
    ArriveHidden,
    Unhide,
    ChangeSequence,
    SetUserWord,
    RestIfLoopHalted,
    PlaySound,
    Move,
    MoveAndHalt,
}

impl TryFrom<u8> for SequenceOp {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            1 => SequenceOp::SetFrame,
            2 => SequenceOp::SetFrameAndHalt,
            3 => SequenceOp::Jump,
            4 => SequenceOp::SetTimerStart,
            5 => SequenceOp::SetTimerAndHalt,
            6 => SequenceOp::MoveAndRearm,
            7 => SequenceOp::MoveAndRearmAndHalt,
            9 => SequenceOp::ArriveAndHalt,
            11 => SequenceOp::ArriveHidden,
            12 => SequenceOp::Unhide,
            13 => SequenceOp::ChangeSequence,
            15 => SequenceOp::SetUserWord,
            16 => SequenceOp::RestIfLoopHalted,
            17 => SequenceOp::PlaySound,
            18 => SequenceOp::Move,
            19 => SequenceOp::MoveAndHalt,
            other => return Err(other),
        })
    }
}

/// What the turn does after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    /// Advance past the instruction and end the turn.
    Halt,
    /// End the turn with the pointer still on the instruction.
    HaltInPlace,
    /// The instruction already moved the pointer.
    Jumped,
}

/// Runs one turn of the actor's current sequence.
pub fn run_turn(actor: &mut Actor, host: &mut dyn EngineHost) -> Result<()> {
    let resource = actor
        .resource
        .clone()
        .ok_or(EngineError::ActorNotLoaded(actor.id))?;

    if actor.flags.contains(ActorFlags::RESET_SEQUENCE) {
        let start = u16::try_from(actor.sequence_id)
            .ok()
            .and_then(|id| resource.sequence_offset(id))
            .ok_or(SequenceError::MissingSequence {
                actor: actor.id,
                sequence_id: actor.sequence_id,
            })?;
        actor.sequence_ip = start;
        actor.flags.remove(ActorFlags::RESTART_MASK);
        actor.user_word = 0;
    }

    let code = resource.code();
    for _ in 0..MAX_SEQUENCE_OPS_PER_TURN {
        let ip = actor.sequence_ip;
        if ip >= code.len() {
            return Err(SequenceError::IpOutOfBounds { actor: actor.id, ip }.into());
        }
        let instruction = Instruction::decode(code, ip)
            .ok_or(SequenceError::TruncatedInstruction { actor: actor.id, ip })?;
        let opcode = (instruction.word & 0xff) as u8;
        let op = SequenceOp::try_from(opcode).map_err(|opcode| {
            error!("actor {}: sequence opcode {opcode:#04x} at {ip:#06x} has no handler", actor.id);
            SequenceError::UnknownOpcode {
                actor: actor.id,
                opcode,
                ip,
            }
        })?;
        debug!("actor {}: {ip:#06x} {op:?}", actor.id);

        match execute(actor, op, &instruction, code.len(), host)? {
            Flow::Next => actor.sequence_ip = instruction.next_offset(),
            Flow::Halt => {
                actor.sequence_ip = instruction.next_offset();
                return Ok(());
            }
            Flow::HaltInPlace => return Ok(()),
            Flow::Jumped => {}
        }
    }

    warn!(
        "actor {}: sequence {} ran {MAX_SEQUENCE_OPS_PER_TURN} instructions without halting",
        actor.id, actor.sequence_id
    );
    Ok(())
}

fn execute(
    actor: &mut Actor,
    op: SequenceOp,
    instruction: &Instruction<'_>,
    code_len: usize,
    host: &mut dyn EngineHost,
) -> Result<Flow> {
    let id = actor.id;
    let ip = instruction.offset;
    let mut operands = instruction.operands();
    let truncated = |_: io::Error| SequenceError::TruncatedInstruction { actor: id, ip };

    let flow = match op {
        SequenceOp::SetFrame | SequenceOp::SetFrameAndHalt => {
            let frame_offset = operands.read_u16().map_err(truncated)?;
            actor.frame_offset = frame_offset;
            actor.frame = Some(host.load_frame(id, frame_offset));
            actor.flags.insert(ActorFlags::FRAME_DIRTY);
            actor.sequence_timer = actor.sequence_timer_start;
            halt_if(op == SequenceOp::SetFrameAndHalt)
        }
        SequenceOp::Jump => {
            let target = operands.read_u16().map_err(truncated)? as usize;
            if actor.flags.contains(ActorFlags::LOOP_HALTED) {
                Flow::Next
            } else if target >= code_len {
                return Err(SequenceError::IpOutOfBounds { actor: id, ip: target }.into());
            } else {
                actor.sequence_ip = target;
                Flow::Jumped
            }
        }
        SequenceOp::SetTimerStart => {
            actor.sequence_timer_start = operands.read_u16().map_err(truncated)?;
            Flow::Next
        }
        SequenceOp::SetTimerAndHalt => {
            actor.sequence_timer = operands.read_u16().map_err(truncated)?;
            Flow::Halt
        }
        SequenceOp::MoveAndRearm
        | SequenceOp::MoveAndRearmAndHalt
        | SequenceOp::Move
        | SequenceOp::MoveAndHalt => {
            let dx = operands.read_i16().map_err(truncated)?;
            let dy = operands.read_i16().map_err(truncated)?;
            actor.set_position(actor.position.offset(dx, dy));
            if matches!(
                op,
                SequenceOp::MoveAndRearm | SequenceOp::MoveAndRearmAndHalt
            ) {
                actor.sequence_timer = actor.sequence_timer_start;
            }
            halt_if(matches!(
                op,
                SequenceOp::MoveAndRearmAndHalt | SequenceOp::MoveAndHalt
            ))
        }
        SequenceOp::ArriveAndHalt => {
            actor.flags.insert(ActorFlags::AT_REST);
            Flow::HaltInPlace
        }
        SequenceOp::ArriveHidden => {
            actor.flags.insert(ActorFlags::AT_REST | ActorFlags::HIDDEN);
            Flow::HaltInPlace
        }
        SequenceOp::Unhide => {
            actor.flags.remove(ActorFlags::HIDDEN);
            Flow::Next
        }
        SequenceOp::ChangeSequence => {
            let sequence_id = operands.read_i16().map_err(truncated)?;
            actor.update_sequence(sequence_id);
            Flow::Halt
        }
        SequenceOp::SetUserWord => {
            actor.user_word = operands.read_i16().map_err(truncated)?;
            Flow::Next
        }
        SequenceOp::RestIfLoopHalted => {
            if actor.flags.contains(ActorFlags::LOOP_HALTED) {
                actor.flags.insert(ActorFlags::AT_REST);
                Flow::HaltInPlace
            } else {
                Flow::Next
            }
        }
        SequenceOp::PlaySound => {
            host.play_or_stop_sound(operands.read_u16().map_err(truncated)?);
            Flow::Next
        }
    };
    Ok(flow)
}

fn halt_if(halt: bool) -> Flow {
    if halt {
        Flow::Halt
    } else {
        Flow::Next
    }
}
