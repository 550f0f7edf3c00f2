use thiserror::Error;

use crate::actor::ActorId;

/// Failures surfaced by the engine core. An unreachable walk target is not one
/// of them; planning reports that as `Ok(false)`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("actor id {0} is outside the actor pool")]
    ActorOutOfRange(u16),
    #[error("no free actor slot left in the pool")]
    PoolExhausted,
    #[error("actor {0} has no sequence resource loaded")]
    ActorNotLoaded(ActorId),
    #[error("waypoint {0} is outside the waypoint table")]
    WaypointOutOfRange(u16),
    #[error("waypoint {0} is an unused slot")]
    WaypointUnused(u16),
    #[error("variable {0:#x} is outside the variable table")]
    VariableOutOfRange(u16),
    #[error("unsupported walk direction for delta ({dx}, {dy})")]
    UnsupportedDirection { dx: i32, dy: i32 },
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("actor {actor}: unknown sequence opcode {opcode:#04x} at {ip:#06x}")]
    UnknownOpcode { actor: ActorId, opcode: u8, ip: usize },
    #[error("actor {actor}: truncated sequence instruction at {ip:#06x}")]
    TruncatedInstruction { actor: ActorId, ip: usize },
    #[error("actor {actor}: sequence ip {ip:#06x} is outside its resource")]
    IpOutOfBounds { actor: ActorId, ip: usize },
    #[error("actor {actor}: sequence {sequence_id} is not in its resource")]
    MissingSequence { actor: ActorId, sequence_id: i16 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unknown script opcode {opcode:#04x} at {ip:#06x}")]
    UnknownOpcode { opcode: u16, ip: usize },
    #[error("truncated script instruction at {ip:#06x}")]
    TruncatedInstruction { ip: usize },
    #[error("object {0} has no script")]
    MissingObjectScript(u16),
    #[error("script nesting exceeded {0} levels")]
    NestingTooDeep(usize),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
